use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use switchboard_core::config::EngineConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::types::ChatMessage;

use crate::graph::Graph;
use crate::node::{Node, NodeOutput, BACKUP_NODE};
use crate::session::Session;

/// One user turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub message: String,
    pub history: Vec<ChatMessage>,
    /// Path or URL of an attached image.
    pub image: Option<String>,
    /// Where to continue after a pause; the root when `None`.
    pub resume_token: Option<String>,
}

impl TurnInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn resume(mut self, token: Option<String>) -> Self {
        self.resume_token = token;
        self
    }
}

/// Engine state. A returned outcome is always in one of the final three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Escalated,
    AwaitingInput,
    Terminal,
    Failed,
}

/// Result of one `run_from` call.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub state: RunState,
    /// Node the next turn starts at; set only when awaiting input.
    pub resume_token: Option<String>,
    /// Interactive node that paused the turn.
    pub paused_at: Option<String>,
    pub payload: Value,
    /// Every node entered during the turn, in order.
    pub path: Vec<String>,
    pub escalated: bool,
}

impl TurnOutcome {
    pub fn is_paused(&self) -> bool {
        self.state == RunState::AwaitingInput
    }

    /// Text to show the user.
    pub fn reply_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            Value::Object(obj) => match obj.get("system_message").and_then(|v| v.as_str()) {
                Some(msg) => msg.to_string(),
                None => self.payload.to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// Drives a shared [`Graph`] one turn at a time.
#[derive(Clone)]
pub struct GraphExecutor {
    graph: Arc<Graph>,
    config: EngineConfig,
}

impl GraphExecutor {
    pub fn new(graph: Arc<Graph>, config: EngineConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one turn until a terminal leaf, an interactive pause or an
    /// unrecoverable failure.
    ///
    /// Returns `Err` only for an unknown resume token or a miswired
    /// interactive node; every other failure is reported as
    /// [`RunState::Failed`].
    pub async fn run_from(&self, session: &mut Session, input: TurnInput) -> Result<TurnOutcome> {
        let graph = self.graph.as_ref();
        let mut current = match input.resume_token {
            Some(token) if graph.contains(&token) => token,
            Some(token) => return Err(FlowError::NodeNotFound(token)),
            None => graph.root().to_string(),
        };

        let original_args = json!({
            "user_message": input.message,
            "image": input.image,
        });
        let mut args = original_args.clone();

        // Backtracking stack: node name and the args it was entered with.
        let mut frames: Vec<(String, Value)> = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut visits: HashMap<String, usize> = HashMap::new();
        let mut state = RunState::Running;
        let mut escalated = false;

        info!(session = %session.id, start = %current, "Starting turn");

        let failed = |path: Vec<String>, escalated: bool| TurnOutcome {
            state: RunState::Failed,
            resume_token: None,
            paused_at: None,
            payload: original_args.clone(),
            path,
            escalated,
        };

        loop {
            let node = graph
                .node(&current)
                .ok_or_else(|| FlowError::NodeNotFound(current.clone()))?;

            if state == RunState::Escalated {
                debug!(node = %current, "Running backup node");
                state = RunState::Running;
            }

            if frames.last().map(|(name, _)| name) != Some(&current) {
                frames.push((current.clone(), args.clone()));
            }
            if path.last() != Some(&current) {
                path.push(current.clone());
            }

            let count = visits.entry(current.clone()).or_insert(0);
            *count += 1;
            if *count > self.config.max_node_visits {
                error!(
                    node = %current,
                    max_node_visits = self.config.max_node_visits,
                    "Node visited too many times, giving up"
                );
                return Ok(failed(path, escalated));
            }

            match self.call_with_retries(node, &args, &input.history, session).await {
                Ok(output) if node.is_interactive() => {
                    session.data_mut().merge(output.callback);
                    return Ok(match output.next {
                        Some(next) => {
                            info!(node = %current, resume = %next, "Awaiting user input");
                            TurnOutcome {
                                state: RunState::AwaitingInput,
                                resume_token: Some(next),
                                paused_at: Some(current),
                                payload: output.payload,
                                path,
                                escalated,
                            }
                        }
                        None => self.terminal(session, output.payload, path, escalated),
                    });
                }
                Ok(NodeOutput {
                    next: Some(next),
                    payload,
                    ..
                }) => {
                    debug!(from = %current, to = %next, "Routing");
                    current = next;
                    args = payload;
                }
                Ok(output) => return Ok(self.terminal(session, output.payload, path, escalated)),
                Err(e) if e.is_fatal() => {
                    error!(node = %current, error = %e, "Graph configuration error");
                    return Err(e);
                }
                Err(e) => {
                    if graph.has_backup() && !escalated && current != BACKUP_NODE {
                        info!(node = %current, error = %e, "Escalating to backup node");
                        // The backup takes the failed node's place on the stack
                        frames.pop();
                        args = json!({
                            "user_message": args.to_string(),
                            "route_info": format!("Error in node {}: {}", node.name(), node.description()),
                            "error_type": e.to_string(),
                        });
                        current = BACKUP_NODE.to_string();
                        escalated = true;
                        state = RunState::Escalated;
                    } else if frames.len() > 1 {
                        frames.pop();
                        if let Some((previous, previous_args)) = frames.last() {
                            warn!(failed = %current, node = %previous, "Backtracking");
                            current = previous.clone();
                            args = previous_args.clone();
                        }
                    } else {
                        error!(node = %current, error = %e, "Turn failed with no recovery left");
                        return Ok(failed(path, escalated));
                    }
                }
            }
        }
    }

    async fn call_with_retries(
        &self,
        node: &Node,
        args: &Value,
        history: &[ChatMessage],
        session: &Session,
    ) -> Result<NodeOutput> {
        let max_retries = self.config.max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(node = node.name(), attempt, max_retries, "Calling node");
            let result = node
                .call(args, history, self.config.trace, session.data())
                .await
                .and_then(|output| self.check_route(node, output));
            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(node = node.name(), attempt, max_retries, error = %e, "Node attempt failed");
                    if attempt >= max_retries {
                        return Err(e);
                    }
                }
            }
        }
    }

    fn check_route(&self, node: &Node, output: NodeOutput) -> Result<NodeOutput> {
        match &output.next {
            Some(next) if !self.graph.contains(next) => Err(FlowError::UnexpectedRoute {
                node: node.name().to_string(),
                target: next.clone(),
            }),
            _ => Ok(output),
        }
    }

    fn terminal(
        &self,
        session: &mut Session,
        payload: Value,
        path: Vec<String>,
        escalated: bool,
    ) -> TurnOutcome {
        session.data_mut().clear();
        info!(session = %session.id, nodes = path.len(), "Turn finished");
        TurnOutcome {
            state: RunState::Terminal,
            resume_token: None,
            paused_at: None,
            payload,
            path,
            escalated,
        }
    }
}
