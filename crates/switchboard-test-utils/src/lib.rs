//! Fakes and fixtures shared by the Switchboard test suites.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use futures::future::BoxFuture;

use switchboard_core::config::ModelConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::{ImageAnalyzer, LlmClient, OrderService, Retriever};
use switchboard_core::types::*;

type Handler = Box<dyn Fn(&CompletionRequest) -> Result<Completion> + Send + Sync>;

/// LLM that replays queued completions, then falls back to a handler.
///
/// Every request is recorded for later inspection.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<Completion>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted request with `handler`.
    pub fn with_handler(
        handler: impl Fn(&CompletionRequest) -> Result<Completion> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    pub fn then_route(self, name: &str, arguments: serde_json::Value) -> Self {
        self.push(Ok(Completion::ToolCall {
            name: name.to_string(),
            arguments,
        }))
    }

    pub fn then_text(self, text: &str) -> Self {
        self.push(Ok(Completion::Text(text.to_string())))
    }

    pub fn then_error(self, message: &str) -> Self {
        self.push(Err(FlowError::LlmRequest(message.to_string())))
    }

    fn push(self, item: Result<Completion>) -> Self {
        self.script.lock().unwrap().push_back(item);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(
        &self,
        _config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<Completion>> {
        Box::pin(async move {
            let scripted = self.script.lock().unwrap().pop_front();
            let result = match (scripted, &self.handler) {
                (Some(item), _) => item,
                (None, Some(handler)) => handler(&request),
                (None, None) => Err(FlowError::LlmRequest("script exhausted".into())),
            };
            self.requests.lock().unwrap().push(request);
            result
        })
    }
}

/// Retriever returning a fixed passage list.
#[derive(Default)]
pub struct StaticRetriever {
    passages: Vec<Passage>,
    failure: Option<String>,
    queries: Mutex<Vec<RetrievalQuery>>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<RetrievalQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<RetrievalQuery> {
        self.queries.lock().unwrap().last().cloned()
    }
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, query: RetrievalQuery) -> BoxFuture<'_, Result<Vec<Passage>>> {
        Box::pin(async move {
            let top_k = query.top_k;
            self.queries.lock().unwrap().push(query);
            match &self.failure {
                Some(message) => Err(FlowError::Retrieval(message.clone())),
                None => Ok(self.passages.iter().take(top_k).cloned().collect()),
            }
        })
    }
}

/// Image analyzer with a canned answer.
pub struct StubImageAnalyzer {
    analysis: ImageAnalysis,
    images: Mutex<Vec<String>>,
}

impl StubImageAnalyzer {
    pub fn new(analysis: ImageAnalysis) -> Self {
        Self {
            analysis,
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn quality_issue(message: &str) -> Self {
        Self::new(ImageAnalysis::QualityIssue {
            message: message.to_string(),
        })
    }

    pub fn assessment(product: &str, condition: &str) -> Self {
        Self::new(ImageAnalysis::Assessment(ConditionAssessment {
            product: product.to_string(),
            product_confidence: 0.9,
            condition: condition.to_string(),
            confidence: 0.8,
            description: format!("The {product} looks {condition}"),
            defects_found: Vec::new(),
            overall_assessment: format!("{condition} condition"),
        }))
    }

    pub fn images(&self) -> Vec<String> {
        self.images.lock().unwrap().clone()
    }
}

impl ImageAnalyzer for StubImageAnalyzer {
    fn analyze(&self, image: &str) -> BoxFuture<'_, Result<ImageAnalysis>> {
        let image = image.to_string();
        Box::pin(async move {
            self.images.lock().unwrap().push(image);
            Ok(self.analysis.clone())
        })
    }
}

/// Verification code accepted by [`InMemoryOrderService`].
pub const VALID_CODE: i64 = 123654;

/// Order API fake with the mock server's cancellation rules.
#[derive(Default)]
pub struct InMemoryOrderService {
    orders: Mutex<HashMap<i64, OrderDetails>>,
    sent_codes: Mutex<Vec<i64>>,
    cancellations: Mutex<Vec<(i64, String)>>,
}

impl InMemoryOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(self, order: OrderDetails) -> Self {
        self.orders.lock().unwrap().insert(order.order_id, order);
        self
    }

    pub fn order(&self, order_id: i64) -> Option<OrderDetails> {
        self.orders.lock().unwrap().get(&order_id).cloned()
    }

    /// Order ids a verification code was sent for.
    pub fn sent_codes(&self) -> Vec<i64> {
        self.sent_codes.lock().unwrap().clone()
    }

    pub fn cancellations(&self) -> Vec<(i64, String)> {
        self.cancellations.lock().unwrap().clone()
    }

    fn lookup(&self, operation: &str, order_id: i64) -> Result<OrderDetails> {
        self.order(order_id).ok_or_else(|| FlowError::OrderService {
            operation: operation.to_string(),
            message: format!("HTTP 404: order {order_id} not found"),
        })
    }
}

impl OrderService for InMemoryOrderService {
    fn order_details(&self, order_id: i64, include_tracking: bool) -> BoxFuture<'_, Result<OrderDetails>> {
        Box::pin(async move {
            let mut order = self.lookup("order details", order_id)?;
            if include_tracking && order.tracking_id.is_none() {
                order.tracking_id = Some(format!("TRACK-{order_id}"));
            }
            Ok(order)
        })
    }

    fn cancel_order(&self, order_id: i64, reason: &str) -> BoxFuture<'_, Result<OrderDetails>> {
        let reason = reason.to_string();
        Box::pin(async move {
            let mut order = self.lookup("cancel order", order_id)?;
            let status = order.status.clone().unwrap_or_default();
            if status != "shipped" && status != "delivered" {
                order.status = Some("cancelled".into());
                order.cancellation_reason = Some(reason.clone());
                self.orders.lock().unwrap().insert(order_id, order.clone());
            }
            self.cancellations.lock().unwrap().push((order_id, reason));
            Ok(order)
        })
    }

    fn track_order(&self, order_id: i64) -> BoxFuture<'_, Result<OrderTracking>> {
        Box::pin(async move {
            let order = self.lookup("track order", order_id)?;
            let status = order.status.unwrap_or_else(|| "pending".into());
            let mut events = vec![TrackingEvent {
                event: "Order placed".into(),
                timestamp: "2024-07-28T10:00:00".into(),
            }];
            if matches!(status.as_str(), "processing" | "shipped" | "delivered") {
                events.push(TrackingEvent {
                    event: "Order processed".into(),
                    timestamp: "2024-07-28T12:00:00".into(),
                });
            }
            if matches!(status.as_str(), "shipped" | "delivered") {
                events.push(TrackingEvent {
                    event: "Order shipped".into(),
                    timestamp: "2024-07-29T08:00:00".into(),
                });
            }
            Ok(OrderTracking {
                order_id,
                status,
                tracking_events: events,
            })
        })
    }

    fn send_two_step_code(&self, order_id: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.sent_codes.lock().unwrap().push(order_id);
            Ok(())
        })
    }

    fn verify_two_step_code(&self, _order_id: i64, code: i64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(code == VALID_CODE) })
    }
}

/// Write `contents` to a `switchboard.toml` inside a fresh temp dir.
pub fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("switchboard.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
