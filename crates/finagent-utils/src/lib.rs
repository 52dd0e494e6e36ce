//! Shared utilities for finagent
//!
//! This crate provides common functionality used across the finagent workspace:
//! tracing setup and the application-level configuration that drives it.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use logging::{init_tracing, init_tracing_with};
