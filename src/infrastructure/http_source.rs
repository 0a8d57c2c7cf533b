// HTTP telemetry source backed by reqwest
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::error::FeedError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;

/// Longest slice of an error body carried into a `NetworkFailure` message.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpTelemetrySource {
    client: reqwest::Client,
    base_url: String,
    path: String,
}

impl HttpTelemetrySource {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path: format!("/{}", path.trim_start_matches('/')),
        })
    }

    fn build_query_url(&self, days: u32) -> String {
        format!("{}{}?days={}", self.base_url, self.path, days)
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn fetch_graph_data(&self, days: u32) -> Result<Value, FeedError> {
        let url = self.build_query_url(days);
        tracing::debug!("Fetching telemetry from {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FeedError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(FeedError::NetworkFailure(format!(
                "graph_data request failed with status {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedError::NetworkFailure(e.to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| FeedError::InvalidResponseShape(format!("body is not JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source(base_url: &str) -> HttpTelemetrySource {
        HttpTelemetrySource::new(base_url, "api/graph_data", Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_build_query_url() {
        let s = HttpTelemetrySource::new(
            "http://meter.local/",
            "/api/graph_data",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(s.build_query_url(1), "http://meter.local/api/graph_data?days=1");
    }

    #[tokio::test]
    async fn test_fetch_sends_days_and_returns_body() {
        let router = Router::new().route(
            "/api/graph_data",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({ "kw_values": [1.5], "days": params.get("days") }))
            }),
        );
        let base = serve(router).await;

        let body = source(&base).fetch_graph_data(1).await.unwrap();

        assert_eq!(body, json!({ "kw_values": [1.5], "days": "1" }));
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_failure() {
        let router = Router::new().route(
            "/api/graph_data",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream meter offline") }),
        );
        let base = serve(router).await;

        let err = source(&base).fetch_graph_data(1).await.unwrap_err();

        match err {
            FeedError::NetworkFailure(msg) => {
                assert!(msg.contains("502"));
                assert!(msg.contains("upstream meter offline"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_shape() {
        let router = Router::new().route("/api/graph_data", get(|| async { "<html>login</html>" }));
        let base = serve(router).await;

        let err = source(&base).fetch_graph_data(1).await.unwrap_err();

        assert!(matches!(err, FeedError::InvalidResponseShape(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = source(&format!("http://{}", addr))
            .fetch_graph_data(1)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::NetworkFailure(_)));
    }
}
