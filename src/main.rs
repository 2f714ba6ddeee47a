//! # HID+ Bridge
//!
//! Drive a virtual game controller from UDP commands on a local network.
//!
//! This application registers one virtual controller with the platform's input
//! layer and keeps its state in sync with commands sent by a remote client.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use hidplus_bridge::config::{Config, LoggingConfig};
use hidplus_bridge::device::SimulatedInjector;
use hidplus_bridge::diagnostics::sink_from_config;
use hidplus_bridge::service::Service;

/// Configuration loaded when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for HID+ Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, else `config/default.toml`, else defaults)
///    - Set up logging with tracing subscriber
///    - Attach the virtual controller and bind the command endpoint
///
/// 2. **Main Loop**
///    - Ingestion and publishing run on their own tasks
///    - The driving loop idles on a coarse tick until Ctrl+C or SIGTERM
///
/// 3. **Graceful Shutdown**
///    - Stop both tasks, then detach the virtual controller
///
/// # Errors
///
/// Returns error (non-zero exit) if:
/// - Configuration cannot be loaded or is invalid
/// - The virtual controller cannot be attached
/// - The command endpoint cannot be bound
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO hidplus_bridge: HID+ Bridge v0.1.0 starting...
/// INFO hidplus_bridge::device::session: Virtual ProController attached (session 1, device 0x2)
/// INFO hidplus_bridge::service: Service ready, listening on 0.0.0.0:8910
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;

    let _log_guard = init_logging(&config.logging).context("Failed to initialize logging")?;
    info!("HID+ Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let diagnostics = sink_from_config(&config.diagnostics);

    // No privileged input service exists off-console; the simulated backend
    // stands in for it.
    let injector = SimulatedInjector::new();

    let service = match Service::start(&config, injector, diagnostics.clone()).await {
        Ok(service) => service,
        Err(e) => {
            error!("Start-up failed: {}", e);
            diagnostics.log(&format!("fatal: {}", e));
            return Err(e).context("Service start-up failed");
        }
    };

    info!("Press Ctrl+C to exit");
    let report = service.run_until(shutdown_signal()).await?;
    info!(
        "Applied {} commands, rejected {}, pushed {} states",
        report.ingest.applied, report.ingest.rejected, report.publish.pushes
    );

    Ok(())
}

fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("Cannot load {}", path));
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Cannot load {}", DEFAULT_CONFIG_PATH));
    }

    Ok(Config::default())
}

/// Initialize tracing, optionally writing to a file through a non-blocking appender.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = config
        .level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", config.level))?;
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if config.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let path = PathBuf::from(&config.file);
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file '{}' has no file name", config.file))?
        .to_owned();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
    }
}
