// Application layer - feed lifecycle and normalization
pub mod clock;
pub mod feed_service;
pub mod normalizer;
pub mod telemetry_source;
