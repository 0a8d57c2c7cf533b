// Domain layer - telemetry types and boundary coercion
pub mod error;
pub mod payload;
pub mod telemetry;
pub mod time_basis;
