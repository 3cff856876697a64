//! # Utility Modules
//!
//! Supporting utilities shared by applications embedding the crate.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)

pub mod logging;
