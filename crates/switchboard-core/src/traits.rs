use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM client: one chat completion per call, optionally forcing a tool call.
pub trait LlmClient: Send + Sync + 'static {
    fn complete(
        &self,
        config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<Completion>>;
}

/// Document retrieval: returns the passages ranked for a query.
pub trait Retriever: Send + Sync + 'static {
    fn retrieve(&self, query: RetrievalQuery) -> BoxFuture<'_, Result<Vec<Passage>>>;
}

/// Image analysis: object detection plus condition assessment of a product photo.
pub trait ImageAnalyzer: Send + Sync + 'static {
    /// `image` is a path, URL or data URI as supplied by the front-end.
    fn analyze(&self, image: &str) -> BoxFuture<'_, Result<ImageAnalysis>>;
}

/// Order management backend.
pub trait OrderService: Send + Sync + 'static {
    fn order_details(&self, order_id: i64, include_tracking: bool) -> BoxFuture<'_, Result<OrderDetails>>;

    /// Returns the order as it stands after the request; orders already
    /// shipped or delivered keep their status.
    fn cancel_order(&self, order_id: i64, reason: &str) -> BoxFuture<'_, Result<OrderDetails>>;

    fn track_order(&self, order_id: i64) -> BoxFuture<'_, Result<OrderTracking>>;

    /// Send the two-step verification code to the order's email address.
    fn send_two_step_code(&self, order_id: i64) -> BoxFuture<'_, Result<()>>;

    fn verify_two_step_code(&self, order_id: i64, code: i64) -> BoxFuture<'_, Result<bool>>;
}
