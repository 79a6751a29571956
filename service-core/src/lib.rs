//! service-core: Shared infrastructure for invoice-system services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
