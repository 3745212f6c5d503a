use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Construction errors (graph assembly)
    #[error("Naming error: '{0}' expected to match the pattern '^[a-zA-Z0-9_-]+$'")]
    InvalidNodeName(String),

    #[error("Parameter '{param}' of node {node} is malformed: {reason}")]
    MalformedParameter {
        node: String,
        param: String,
        reason: String,
    },

    #[error("Required parameter '{param}' not found in parameters of node {node}")]
    UnknownRequired { node: String, param: String },

    #[error("Reserved node name {name}: {reason}")]
    ReservedNode { name: String, reason: String },

    #[error("Interactive nodes, as {0}, must have one and only one connection")]
    InteractiveFanOut(String),

    #[error("{to} already connected from {from}")]
    DuplicateEdge { from: String, to: String },

    #[error("Node not found in graph: {0}")]
    NodeNotFound(String),

    // Configuration error detected while running a turn
    #[error("Interactive node {0} was invoked without exactly one connection")]
    InteractiveWiring(String),

    // Node runtime errors
    #[error("Template error in node {node}: {message}")]
    Template { node: String, message: String },

    #[error("Node {node} routed to {target}, which is not one of its children")]
    UnexpectedRoute { node: String, target: String },

    #[error("Missing input for node {node}: {field}")]
    MissingInput { node: String, field: String },

    #[error("Action failed in node {node}: {message}")]
    Action { node: String, message: String },

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // External collaborators
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Image analysis failed: {0}")]
    Vision(String),

    #[error("Order service error: {operation}: {message}")]
    OrderService { operation: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Errors raised while assembling nodes and wiring the graph.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidNodeName(_)
                | Self::MalformedParameter { .. }
                | Self::UnknownRequired { .. }
                | Self::ReservedNode { .. }
                | Self::InteractiveFanOut(_)
                | Self::DuplicateEdge { .. }
        )
    }

    /// Errors that abort a turn immediately instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InteractiveWiring(_))
    }

    /// Shorthand for an action failure inside a named node.
    pub fn action(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Action {
            node: node.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
