//! Little Threads backend library.
//!
//! Order ledger, coupon pricing, and multi-gateway payment orchestration for
//! the storefront. The binary in `main.rs` wires these modules into an axum
//! service; integration tests exercise them directly.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod services;

pub use crate::config::AppConfig;
pub use crate::error::{AppError, AppErrorKind};
