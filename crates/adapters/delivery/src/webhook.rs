//! Webhook client backed by `reqwest`.

use formflow_app::ports::{WebhookClient, WebhookRequest};
use formflow_domain::error::ActionExecutionError;
use formflow_domain::pipeline::HttpMethod;

use crate::error::DeliveryError;

/// Calls webhook endpoints with a bounded timeout. The body, when present,
/// is sent as a JSON object.
#[derive(Clone)]
pub struct ReqwestWebhookClient {
    client: reqwest::Client,
}

impl ReqwestWebhookClient {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Http`] if the TLS backend cannot be initialised.
    pub fn new(timeout: std::time::Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("formflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

impl WebhookClient for ReqwestWebhookClient {
    async fn call(&self, request: WebhookRequest) -> Result<u16, ActionExecutionError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "calling webhook");

        let mut builder = self.client.request(method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if !request.body.is_empty() {
            builder = builder.json(&request.body);
        }

        let response = builder.send().await.map_err(DeliveryError::from)?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn serve(status: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let record = Arc::clone(&seen);
        let app = axum::Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let record = Arc::clone(&record);
                async move {
                    let token = headers
                        .get("x-token")
                        .and_then(|v| v.to_str().ok())
                        .map(ToString::to_string);
                    record.lock().unwrap().push((token, body));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/hook"), seen)
    }

    fn request(url: String) -> WebhookRequest {
        WebhookRequest {
            method: HttpMethod::Post,
            url,
            headers: BTreeMap::from([("x-token".to_string(), "abc".to_string())]),
            body: BTreeMap::from([("form".to_string(), "F1".to_string())]),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_send_headers_and_json_body() {
        let (url, seen) = serve(StatusCode::OK).await;
        let client = ReqwestWebhookClient::new(Duration::from_secs(5)).unwrap();

        let status = client.call(request(url)).await.unwrap();

        assert_eq!(status, 200);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("abc"));
        assert_eq!(seen[0].1, serde_json::json!({ "form": "F1" }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_report_non_success_status_without_error() {
        let (url, _) = serve(StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = ReqwestWebhookClient::new(Duration::from_secs(5)).unwrap();

        assert_eq!(client.call(request(url)).await.unwrap(), 500);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_fail_delivery_when_endpoint_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = ReqwestWebhookClient::new(Duration::from_secs(2)).unwrap();

        let err = client
            .call(request(format!("http://{addr}/hook")))
            .await
            .unwrap_err();

        assert!(matches!(err, ActionExecutionError::Delivery(_)));
    }
}
