//! Transport layer for dotpool.
//!
//! Provides HTTP transport via axum.

pub mod http;

pub use http::{ServerConfig, routes, serve};
