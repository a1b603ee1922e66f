pub(crate) mod api;
pub mod config;
pub mod fraud_detector;
pub mod metrics;
pub mod telemetry;

pub use config::Config;
pub use fraud_detector::FraudDetector;
pub use metrics::Metrics;
