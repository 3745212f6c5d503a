//! Conversation graph engine.
//!
//! A support conversation is a directed graph of [`Node`]s. Each node is one
//! of three capabilities: model-routed (an LLM picks the next node among the
//! node's children, or answers in free text when it has none), a deterministic
//! action, or a vision delegate. Interactive nodes pause the turn and hand a
//! resume token back to the caller.
//!
//! The graph is assembled once with a [`GraphBuilder`], frozen into an
//! immutable [`Graph`], and shared by a [`GraphExecutor`] across any number of
//! conversations. Per-conversation state lives in a caller-owned [`Session`].

pub mod executor;
pub mod graph;
pub mod node;
pub mod schema;
pub mod session;
pub mod template;

pub use executor::{GraphExecutor, RunState, TurnInput, TurnOutcome};
pub use graph::{Graph, GraphBuilder};
pub use node::{
    Action, ActionContext, Capability, ModelRouted, Node, NodeKind, NodeOutput, NodeSpec,
    RetrievalBinding, BACKUP_NODE,
};
pub use schema::{ParamSchema, ParamSpec};
pub use session::{Session, SessionData};
