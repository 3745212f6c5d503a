//! HTTP implementations of the external collaborators used by the support
//! flow: the order management API, the retrieval service and the image
//! analysis service.

pub mod orders;
pub mod retrieval;
pub mod vision;

pub use orders::HttpOrderService;
pub use retrieval::HttpRetriever;
pub use vision::HttpImageAnalyzer;

use std::time::Duration;

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
