//! dotpool-server: process entry point for the dotpool HTTP service.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dotpool::{
    DEFAULT_MAX_WORKERS, DEFAULT_WORKERS, MultiplyService, ServiceConfig, VersionInfo,
    transport::{ServerConfig, serve},
};

#[derive(Debug, Parser)]
#[command(name = "dotpool", version, about = "Matrix multiplication over a bounded worker pool")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "DOTPOOL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "DOTPOOL_PORT", default_value_t = 8080)]
    port: u16,

    /// Worker pool capacity at startup.
    #[arg(long, env = "DOTPOOL_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Largest pool /change may build; bigger requests are clamped.
    #[arg(long, env = "DOTPOOL_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    max_workers: usize,

    /// Deadline for one multiplication, in milliseconds.
    #[arg(long, env = "DOTPOOL_DISPATCH_TIMEOUT_MS")]
    dispatch_timeout_ms: Option<u64>,

    /// Ignore SIGTERM; stop only on SIGINT or POST /shutdown.
    #[arg(long, env = "DOTPOOL_AWAIT_EXPLICIT_SHUTDOWN")]
    await_explicit_shutdown: bool,

    /// Build tag reported by /health-check.
    #[arg(long, env = "DOTPOOL_BUILD")]
    build: Option<String>,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            await_explicit_shutdown: self.await_explicit_shutdown,
        }
    }

    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            default_workers: self.workers,
            dispatch_timeout: self.dispatch_timeout_ms.map(Duration::from_millis),
            max_workers: self.max_workers,
        }
    }

    fn version(&self) -> VersionInfo {
        match &self.build {
            Some(build) => VersionInfo::new().with_build(build.clone()),
            None => VersionInfo::new(),
        }
    }
}

/// Initialize tracing with DOTPOOL_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("DOTPOOL_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("dotpool={level},dotpool_server={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    info!("dotpool {}", env!("CARGO_PKG_VERSION"));

    let service =
        Arc::new(MultiplyService::new(args.service_config()).with_version(args.version()));
    serve(args.server_config(), service).await
}
