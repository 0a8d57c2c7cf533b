// Source trait for raw telemetry payloads
use crate::domain::error::FeedError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the trailing `days` of telemetry as an untyped JSON body.
    /// Transport problems are `NetworkFailure`; a body that is not JSON
    /// is `InvalidResponseShape`.
    async fn fetch_graph_data(&self, days: u32) -> Result<Value, FeedError>;
}
