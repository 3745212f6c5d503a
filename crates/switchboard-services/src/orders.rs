use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use switchboard_core::config::ServiceConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::OrderService;
use switchboard_core::types::{OrderDetails, OrderTracking};

/// Client for the order management API.
pub struct HttpOrderService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpOrderService {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            client: crate::http_client(config.timeout_secs),
            base_url: crate::trim_base(&config.base_url),
            api_key: config.api_key.clone(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, req: reqwest::RequestBuilder) -> Result<T> {
        let fail = |message: String| FlowError::OrderService {
            operation: operation.to_string(),
            message,
        };

        let resp = req
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {}: {}", status, body)));
        }

        resp.json()
            .await
            .map_err(|e| fail(format!("failed to parse response: {}", e)))
    }
}

#[derive(Serialize)]
struct CancelRequest<'a> {
    order_id: i64,
    reason: &'a str,
}

#[derive(Serialize)]
struct CodeRequest {
    order_id: i64,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
}

impl OrderService for HttpOrderService {
    fn order_details(&self, order_id: i64, include_tracking: bool) -> BoxFuture<'_, Result<OrderDetails>> {
        Box::pin(async move {
            debug!(order_id, include_tracking, "Fetching order details");
            let mut req = self
                .get("/order/details")
                .query(&[("order_id", order_id.to_string())]);
            if include_tracking {
                req = req.query(&[("include_tracking", "true")]);
            }
            self.send("order details", req).await
        })
    }

    fn cancel_order(&self, order_id: i64, reason: &str) -> BoxFuture<'_, Result<OrderDetails>> {
        let reason = reason.to_string();
        Box::pin(async move {
            debug!(order_id, "Cancelling order");
            let req = self.post("/order/cancel").json(&CancelRequest {
                order_id,
                reason: &reason,
            });
            self.send("cancel order", req).await
        })
    }

    fn track_order(&self, order_id: i64) -> BoxFuture<'_, Result<OrderTracking>> {
        Box::pin(async move {
            debug!(order_id, "Tracking order");
            let req = self
                .get("/order/track")
                .query(&[("order_id", order_id.to_string())]);
            self.send("track order", req).await
        })
    }

    fn send_two_step_code(&self, order_id: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            debug!(order_id, "Sending verification code");
            let req = self
                .post("/security/send_2_steps_code")
                .json(&CodeRequest { order_id });
            let _: serde_json::Value = self.send("send verification code", req).await?;
            Ok(())
        })
    }

    fn verify_two_step_code(&self, order_id: i64, code: i64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let req = self.get("/security/verify_2_steps_code").query(&[
                ("order_id", order_id.to_string()),
                ("code", code.to_string()),
            ]);
            let resp: VerifyResponse = self.send("verify code", req).await?;
            debug!(order_id, verified = resp.verified, "Verification code checked");
            Ok(resp.verified)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpOrderService {
        HttpOrderService::new(&ServiceConfig::new(format!("{}/", server.uri())))
    }

    #[tokio::test]
    async fn test_order_details_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/order/details"))
            .and(query_param("order_id", "555"))
            .and(query_param("include_tracking", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order_id": 555,
                "status": "processing",
                "customer_name": "Ada"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = service(&server).order_details(555, true).await.unwrap();
        assert_eq!(details.order_id, 555);
        assert_eq!(details.status.as_deref(), Some("processing"));
    }

    #[tokio::test]
    async fn test_order_details_without_tracking() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/order/details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order_id": 7})))
            .mount(&server)
            .await;

        service(&server).order_details(7, false).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("order_id=7"));
    }

    #[tokio::test]
    async fn test_cancel_order_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order/cancel"))
            .and(body_json(json!({"order_id": 555, "reason": "found it cheaper"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order_id": 555,
                "status": "cancelled",
                "cancellation_reason": "found it cheaper"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = service(&server)
            .cancel_order(555, "found it cheaper")
            .await
            .unwrap();
        assert_eq!(details.status.as_deref(), Some("cancelled"));
        assert_eq!(details.cancellation_reason.as_deref(), Some("found it cheaper"));
    }

    #[tokio::test]
    async fn test_send_code_uses_the_real_order_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/security/send_2_steps_code"))
            .and(body_json(json!({"order_id": 555})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "2-step code sent successfully"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        service(&server).send_two_step_code(555).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/security/verify_2_steps_code"))
            .and(query_param("order_id", "555"))
            .and(query_param("code", "123654"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"order_id": 555, "verified": true})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/security/verify_2_steps_code"))
            .and(query_param("code", "111111"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"order_id": 555, "verified": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        assert!(svc.verify_two_step_code(555, 123654).await.unwrap());
        assert!(!svc.verify_two_step_code(555, 111111).await.unwrap());
    }

    #[tokio::test]
    async fn test_bearer_key_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/order/track"))
            .and(header("authorization", "Bearer orders-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order_id": 555,
                "status": "shipped",
                "tracking_events": [
                    {"event": "Order placed", "timestamp": "2024-05-01T10:00:00Z"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = ServiceConfig::new(server.uri());
        config.api_key = Some("orders-key".into());
        let tracking = HttpOrderService::new(&config).track_order(555).await.unwrap();
        assert_eq!(tracking.tracking_events.len(), 1);
    }

    #[tokio::test]
    async fn test_track_not_found_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/order/track"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"detail": "Tracking information not found for order 9"})),
            )
            .mount(&server)
            .await;

        let err = service(&server).track_order(9).await.unwrap_err();
        assert!(matches!(err, FlowError::OrderService { .. }));
        assert!(err.to_string().contains("404"));
    }
}
