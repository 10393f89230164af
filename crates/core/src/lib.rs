//! Meeple Core Library
//!
//! This crate provides the foundational utilities shared by every Meeple crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Bounded retry for calls to external gateways

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use retry::RetryPolicy;
