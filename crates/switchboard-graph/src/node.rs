use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use switchboard_core::config::ModelConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::{ImageAnalyzer, LlmClient, Retriever};
use switchboard_core::types::*;

use crate::schema::{self, ParamSchema};
use crate::session::SessionData;
use crate::template;

/// Reserved name of the escalation node.
pub const BACKUP_NODE: &str = "backup_system";

/// Base system instruction of every model-routed node.
pub const SUPPORT_AGENT_PROMPT: &str = "You are an e-commerce support assistant. Maintain a helpful, solution-focused approach with customers while following these guidelines:

Use a warm, professional tone with concise responses
Identify and address the customer's primary concern first
Ask clarifying questions when needed, one at a time
Provide direct solutions without unnecessary steps
Acknowledge when issues require human escalation
Confirm resolution before ending conversations
Never share sensitive customer information
Avoid making promises outside established policies

Your core function is resolving customer inquiries efficiently while creating positive experiences. Specific product details and company policies will be provided separately.";

const BACKUP_FIELDS: [&str; 3] = ["user_message", "route_info", "error_type"];

/// What a node invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    /// Next node to run; `None` marks a terminal leaf.
    pub next: Option<String>,
    /// Arguments for the next node, or the final answer of a leaf.
    pub payload: Value,
    /// Merged into the session by interactive nodes.
    pub callback: serde_json::Map<String, Value>,
}

impl NodeOutput {
    /// Continue at `next` with `payload` as its arguments.
    pub fn route(next: impl Into<String>, payload: Value) -> Self {
        Self {
            next: Some(next.into()),
            payload,
            callback: serde_json::Map::new(),
        }
    }

    /// End the turn with `payload` as the answer.
    pub fn finish(payload: Value) -> Self {
        Self {
            next: None,
            payload,
            callback: serde_json::Map::new(),
        }
    }

    pub fn with_callback(mut self, callback: serde_json::Map<String, Value>) -> Self {
        self.callback = callback;
        self
    }

    /// An empty next-node name also marks a terminal leaf.
    pub(crate) fn normalized(mut self) -> Self {
        if self.next.as_deref().is_some_and(str::is_empty) {
            self.next = None;
        }
        self
    }
}

/// Input of a deterministic action.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Name of the node running the action.
    pub node: String,
    pub args: Value,
    pub trace: bool,
    /// Descriptors of the nodes this node is connected to, in wiring order.
    pub children: Vec<ToolDefinition>,
}

impl ActionContext {
    /// Name of the first connected child; interactive nodes have exactly one.
    pub fn first_child(&self) -> Result<String> {
        self.children
            .first()
            .map(|c| c.name.clone())
            .ok_or_else(|| FlowError::action(&self.node, "node has no connected child"))
    }

    pub fn arg(&self, key: &str) -> Result<&Value> {
        self.args
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| FlowError::MissingInput {
                node: self.node.clone(),
                field: key.to_string(),
            })
    }

    pub fn str_arg(&self, key: &str) -> Result<&str> {
        self.arg(key)?.as_str().ok_or_else(|| FlowError::MissingInput {
            node: self.node.clone(),
            field: format!("{key} (expected a string)"),
        })
    }

    /// Optional string argument with a fallback.
    pub fn str_arg_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.args.get(key).and_then(|v| v.as_str()).unwrap_or(default)
    }

    /// Integer argument; numeric strings (as models sometimes emit) are accepted.
    pub fn int_arg(&self, key: &str) -> Result<i64> {
        let value = self.arg(key)?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| FlowError::MissingInput {
                node: self.node.clone(),
                field: format!("{key} (expected an integer)"),
            })
    }
}

/// A deterministic step. Implemented for any async closure
/// `Fn(ActionContext) -> impl Future<Output = Result<NodeOutput>>`.
pub trait Action: Send + Sync + 'static {
    fn run(&self, ctx: ActionContext) -> BoxFuture<'static, Result<NodeOutput>>;
}

impl<F, Fut> Action for F
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeOutput>> + Send + 'static,
{
    fn run(&self, ctx: ActionContext) -> BoxFuture<'static, Result<NodeOutput>> {
        Box::pin(self(ctx))
    }
}

/// Retrieval used by a model-routed node to ground its answer.
#[derive(Clone)]
pub struct RetrievalBinding {
    pub retriever: Arc<dyn Retriever>,
    pub top_k: usize,
    pub mode: SearchMode,
    pub filter: Option<String>,
}

impl RetrievalBinding {
    pub fn similarity(retriever: Arc<dyn Retriever>, top_k: usize, score_threshold: f32) -> Self {
        Self {
            retriever,
            top_k,
            mode: SearchMode::Similarity { score_threshold },
            filter: None,
        }
    }

    pub fn mmr(retriever: Arc<dyn Retriever>, top_k: usize, lambda_mult: f32) -> Self {
        Self {
            retriever,
            top_k,
            mode: SearchMode::Mmr { lambda_mult },
            filter: None,
        }
    }

    pub fn with_filter(mut self, category: impl Into<String>) -> Self {
        self.filter = Some(category.into());
        self
    }
}

/// LLM-backed step: renders its template, optionally retrieves context, and
/// lets the model choose a child (or answer, when it has none).
#[derive(Clone)]
pub struct ModelRouted {
    template: String,
    model: ModelConfig,
    llm: Arc<dyn LlmClient>,
    retrieval: Option<RetrievalBinding>,
}

impl ModelRouted {
    pub fn new(template: impl Into<String>, model: ModelConfig, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            template: template.into(),
            model,
            llm,
            retrieval: None,
        }
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalBinding) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// The three node variants sharing one call contract.
#[derive(Clone)]
pub enum Capability {
    ModelRouted(ModelRouted),
    Action(Arc<dyn Action>),
    Vision(Arc<dyn ImageAnalyzer>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    ModelRouted,
    Action,
    Vision,
}

impl Capability {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::ModelRouted(_) => NodeKind::ModelRouted,
            Self::Action(_) => NodeKind::Action,
            Self::Vision(_) => NodeKind::Vision,
        }
    }
}

/// Identity and interface of a node, validated when the node is built.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub description: String,
    pub params: ParamSchema,
    /// Empty means every parameter is required.
    pub required: Vec<String>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, params: ParamSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            required: Vec::new(),
        }
    }

    pub fn required(mut self, names: &[&str]) -> Self {
        self.required = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// One step of the conversation graph.
#[derive(Clone)]
pub struct Node {
    name: String,
    description: String,
    params: ParamSchema,
    required: Vec<String>,
    descriptor: ToolDefinition,
    children: Vec<ToolDefinition>,
    interactive: bool,
    capability: Capability,
}

impl Node {
    fn build(spec: NodeSpec, capability: Capability, interactive: bool) -> Result<Self> {
        schema::validate_name(&spec.name)?;
        let required = schema::resolve_required(&spec.name, &spec.params, &spec.required)?;

        if spec.name == BACKUP_NODE {
            validate_backup(&spec, capability.kind())?;
        }

        let descriptor = schema::descriptor(&spec.name, &spec.description, &spec.params, &required);
        Ok(Self {
            name: spec.name,
            description: spec.description,
            params: spec.params,
            required,
            descriptor,
            children: Vec::new(),
            interactive,
            capability,
        })
    }

    pub fn model_routed(spec: NodeSpec, routed: ModelRouted) -> Result<Self> {
        Self::build(spec, Capability::ModelRouted(routed), false)
    }

    pub fn action(spec: NodeSpec, action: impl Action) -> Result<Self> {
        Self::build(spec, Capability::Action(Arc::new(action)), false)
    }

    /// An action whose successful run pauses the turn for user input.
    pub fn interactive_action(spec: NodeSpec, action: impl Action) -> Result<Self> {
        Self::build(spec, Capability::Action(Arc::new(action)), true)
    }

    pub fn vision(spec: NodeSpec, analyzer: Arc<dyn ImageAnalyzer>) -> Result<Self> {
        Self::build(spec, Capability::Vision(analyzer), false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &ParamSchema {
        &self.params
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn descriptor(&self) -> &ToolDefinition {
        &self.descriptor
    }

    pub fn children(&self) -> &[ToolDefinition] {
        &self.children
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn kind(&self) -> NodeKind {
        self.capability.kind()
    }

    pub(crate) fn push_child(&mut self, child: ToolDefinition) {
        self.children.push(child);
    }

    /// Invoke the node.
    pub async fn call(
        &self,
        args: &Value,
        history: &[ChatMessage],
        trace: bool,
        session_data: &SessionData,
    ) -> Result<NodeOutput> {
        let output = match &self.capability {
            Capability::ModelRouted(routed) => {
                self.call_model(routed, args, history, trace, session_data)
                    .await?
            }
            Capability::Action(action) => {
                if self.interactive && self.children.len() != 1 {
                    return Err(FlowError::InteractiveWiring(self.name.clone()));
                }
                let ctx = ActionContext {
                    node: self.name.clone(),
                    args: args.clone(),
                    trace,
                    children: self.children.clone(),
                };
                action.run(ctx).await?
            }
            Capability::Vision(analyzer) => self.call_vision(analyzer.as_ref(), args).await?,
        };
        Ok(output.normalized())
    }

    async fn call_model(
        &self,
        routed: &ModelRouted,
        args: &Value,
        history: &[ChatMessage],
        trace: bool,
        session_data: &SessionData,
    ) -> Result<NodeOutput> {
        let mut request = template::render(&self.name, &routed.template, args)?;

        let system = match &routed.retrieval {
            Some(binding) => {
                let passages = binding
                    .retriever
                    .retrieve(RetrievalQuery {
                        query: request.clone(),
                        top_k: binding.top_k,
                        mode: binding.mode.clone(),
                        filter: binding.filter.clone(),
                    })
                    .await?;
                debug!(node = %self.name, passages = passages.len(), "Retrieved context");
                let context = passages
                    .iter()
                    .map(|p| p.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "{}\n\nAnswer the request based only on the following context:\n{}",
                    SUPPORT_AGENT_PROMPT, context
                )
            }
            None => SUPPORT_AGENT_PROMPT.to_string(),
        };

        if !session_data.is_empty() {
            request = format!(
                "If and only if it is necessary include System data/Order details: {}\n\n{}",
                session_data.to_json_string(),
                request
            );
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(request));

        let routing = !self.children.is_empty();
        let completion = routed
            .llm
            .complete(
                &routed.model,
                CompletionRequest {
                    messages,
                    tools: self.children.clone(),
                    tool_choice: if routing {
                        ToolChoice::Required
                    } else {
                        ToolChoice::Auto
                    },
                    store: trace,
                },
            )
            .await?;

        match completion {
            Completion::ToolCall { name, arguments } => {
                if routing && self.children.iter().any(|c| c.name == name) {
                    Ok(NodeOutput::route(name, arguments))
                } else {
                    Err(FlowError::UnexpectedRoute {
                        node: self.name.clone(),
                        target: name,
                    })
                }
            }
            Completion::Text(text) if !routing => Ok(NodeOutput::finish(Value::String(text))),
            Completion::Text(_) => Err(FlowError::LlmParse(format!(
                "{} expected a route to one of its children, got free text",
                self.name
            ))),
        }
    }

    async fn call_vision(&self, analyzer: &dyn ImageAnalyzer, args: &Value) -> Result<NodeOutput> {
        let image = args
            .get("image")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FlowError::MissingInput {
                node: self.name.clone(),
                field: "image".to_string(),
            })?;

        match analyzer.analyze(image).await? {
            ImageAnalysis::QualityIssue { message } => Ok(NodeOutput::finish(Value::String(message))),
            ImageAnalysis::Assessment(assessment) => {
                Ok(NodeOutput::finish(serde_json::to_value(assessment)?))
            }
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("interactive", &self.interactive)
            .field(
                "children",
                &self.children.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn validate_backup(spec: &NodeSpec, kind: NodeKind) -> Result<()> {
    let reserved = |reason: &str| FlowError::ReservedNode {
        name: BACKUP_NODE.to_string(),
        reason: reason.to_string(),
    };

    if kind != NodeKind::ModelRouted {
        return Err(reserved("backup_system node must be a model-routed node"));
    }
    let exact = spec.params.len() == BACKUP_FIELDS.len()
        && BACKUP_FIELDS
            .iter()
            .all(|f| spec.params.get(f).is_some_and(|p| p.kind == "string"));
    if !exact {
        return Err(reserved(
            "must have only 'user_message', 'route_info', 'error_type' keys (strings)",
        ));
    }
    Ok(())
}
