//! HTTP transport: routes and server loop.

mod routes;
mod server;

pub use routes::{ChangeResponse, HealthCheckResponse, MultiplyRequest, MultiplyResponse, routes};
pub use server::{ServerConfig, ShutdownReason, serve};
