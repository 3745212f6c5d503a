//! The customer-support conversation: prompts, order actions and the graph
//! wiring them together.

pub mod actions;
pub mod prompts;
pub mod support;

pub use support::{build_support_graph, SupportDeps};
