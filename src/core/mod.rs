//! Core utilities, configuration, and common functionality

pub mod cleanup;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod subscription;
pub mod traffic;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
pub use traffic::{QuotaDecision, TrafficLedger, UserRef};
