//! Service layer: database access and metrics.

pub mod database;
pub mod metrics;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics, track_http_metrics};
