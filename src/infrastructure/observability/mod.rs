//! Push-based observability for the validator
//!
//! Observability through **outbound data only**: no HTTP server, no incoming
//! requests. Metrics are kept in a Prometheus registry and pushed as
//! periodic structured JSON logs to stdout.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
