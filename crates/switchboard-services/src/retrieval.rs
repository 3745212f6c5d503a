use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use switchboard_core::config::RetrievalConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::Retriever;
use switchboard_core::types::{Passage, RetrievalQuery};

/// Retriever backed by a vector-search service, bound to one collection.
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl HttpRetriever {
    pub fn new(config: &RetrievalConfig, collection: &str) -> Self {
        Self {
            client: crate::http_client(config.timeout_secs),
            base_url: crate::trim_base(&config.base_url),
            api_key: config.api_key.clone(),
            collection: collection.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    collection: &'a str,
    #[serde(flatten)]
    query: &'a RetrievalQuery,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    passages: Vec<Passage>,
}

impl Retriever for HttpRetriever {
    fn retrieve(&self, query: RetrievalQuery) -> BoxFuture<'_, Result<Vec<Passage>>> {
        Box::pin(async move {
            let url = format!("{}/retrieve", self.base_url);

            let mut req = self.client.post(&url).json(&RetrieveRequest {
                collection: &self.collection,
                query: &query,
            });

            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| FlowError::Retrieval(format!("request failed: {}", e)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(FlowError::Retrieval(format!("HTTP {}: {}", status, body)));
            }

            let body: RetrieveResponse = resp
                .json()
                .await
                .map_err(|e| FlowError::Retrieval(format!("failed to parse response: {}", e)))?;

            debug!(
                collection = %self.collection,
                passages = body.passages.len(),
                "Retrieved passages"
            );
            Ok(body.passages)
        })
    }
}
