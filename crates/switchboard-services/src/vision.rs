use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use switchboard_core::config::ServiceConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::ImageAnalyzer;
use switchboard_core::types::ImageAnalysis;

/// Client for the product-photo analysis service.
pub struct HttpImageAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpImageAnalyzer {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            client: crate::http_client(config.timeout_secs),
            base_url: crate::trim_base(&config.base_url),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Serialize)]
struct AnalyzeRequest {
    image: String,
}

impl ImageAnalyzer for HttpImageAnalyzer {
    fn analyze(&self, image: &str) -> BoxFuture<'_, Result<ImageAnalysis>> {
        let image = image.to_string();
        Box::pin(async move {
            let url = format!("{}/analyze", self.base_url);
            debug!(image = %image, "Analyzing product image");

            let mut req = self.client.post(&url).json(&AnalyzeRequest { image });
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| FlowError::Vision(format!("request failed: {}", e)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(FlowError::Vision(format!("HTTP {}: {}", status, body)));
            }

            resp.json()
                .await
                .map_err(|e| FlowError::Vision(format!("failed to parse response: {}", e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_assessment_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(json!({"image": "uploads/laptop.jpg"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "assessment",
                "product": "laptop",
                "product_confidence": 0.91,
                "condition": "good",
                "confidence": 0.8,
                "description": "Light scratches on the lid",
                "defects_found": ["scratches"],
                "overall_assessment": "Eligible for return"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let analyzer = HttpImageAnalyzer::new(&ServiceConfig::new(server.uri()));
        let analysis = analyzer.analyze("uploads/laptop.jpg").await.unwrap();
        match analysis {
            ImageAnalysis::Assessment(a) => {
                assert_eq!(a.product, "laptop");
                assert_eq!(a.defects_found, vec!["scratches".to_string()]);
            }
            other => panic!("unexpected analysis: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quality_issue_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "quality_issue",
                "message": "The image is blurry, please retake it."
            })))
            .mount(&server)
            .await;

        let analyzer = HttpImageAnalyzer::new(&ServiceConfig::new(server.uri()));
        assert_eq!(
            analyzer.analyze("blurry.jpg").await.unwrap(),
            ImageAnalysis::QualityIssue {
                message: "The image is blurry, please retake it.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let analyzer = HttpImageAnalyzer::new(&ServiceConfig::new(server.uri()));
        let err = analyzer.analyze("photo.jpg").await.unwrap_err();
        assert!(matches!(err, FlowError::Vision(_)));
    }
}
