//! AirMouse Server
//!
//! Entry point for the server binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airmouse_server::config::Config;
use airmouse_server::server::AirMouseServer;
use airmouse_server::session::{RegistryEvent, SessionRegistry};
use std::sync::Arc;

/// Command-line arguments for airmouse-server
#[derive(Parser, Debug)]
#[command(name = "airmouse-server")]
#[command(version, about = "Phone motion to desktop pointer server", long_about = None)]
pub struct Args {
    /// Configuration file path (defaults are used when absent)
    #[arg(short, long, env = "AIRMOUSE_CONFIG")]
    pub config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "AIRMOUSE_LISTEN_ADDR")]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short, long, env = "AIRMOUSE_PORT")]
    pub port: Option<u16>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration before logging so [logging] can take effect
    let (config, load_error) = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default_config()?, Some(e)),
        },
        None => (Config::default_config()?, None),
    };
    let config = config.with_overrides(args.listen.clone(), args.port);

    let _log_guard = init_logging(&args, &config)?;

    info!("════════════════════════════════════════════════════════");
    info!("  airmouse-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {}", env!("AIRMOUSE_BUILD_STAMP"));
    info!("  Revision: {}", env!("AIRMOUSE_REVISION"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    if let Some(e) = load_error {
        warn!("Failed to load config: {:#}, using defaults", e);
    }
    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    let server = match AirMouseServer::new(config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", airmouse_server::utils::format_user_error(&e));
            return Err(e);
        }
    };

    tokio::spawn(log_session_changes(server.registry()));

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    info!("Starting AirMouse server");
    if let Err(e) = server.run().await {
        eprintln!("{}", airmouse_server::utils::format_user_error(&e));
        return Err(e);
    }

    info!("AirMouse server shut down");
    Ok(())
}

/// Status reporter: logs every registry change
async fn log_session_changes(registry: Arc<SessionRegistry>) {
    let mut events = registry.subscribe();
    loop {
        match events.recv().await {
            Ok(RegistryEvent::Added(s)) => info!("Device connected: {} ({})", s.id, s.peer),
            Ok(RegistryEvent::Removed(s)) => info!(
                "Device disconnected: {} (moved {}, {})",
                s.id, s.moved_x, s.moved_y
            ),
            Ok(RegistryEvent::Updated(s)) => debug!(
                "Session {}: phase={:?} moved=({}, {}) last_button={:?}",
                s.id, s.phase, s.moved_x, s.moved_y, s.last_button
            ),
            Err(RecvError::Lagged(skipped)) => debug!("Status reporter skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<Option<WorkerGuard>> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Our crate at the requested level, WebSocket internals quieter
        tracing_subscriber::EnvFilter::new(format!(
            "airmouse_server={level},airmouse={level},tungstenite=info,tokio_tungstenite=info,warn",
            level = log_level
        ))
    });

    // Rolling file from [logging].log_dir
    let (rolling, guard) = match &config.logging.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "airmouse-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };

    // If log file is specified, write to both stdout and file
    let file = match &args.log_file {
        Some(path) => Some(
            File::create(Path::new(path))
                .with_context(|| format!("Failed to create log file {}", path))?,
        ),
        None => None,
    };
    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(rolling)
        .with(file_layer);

    match args.log_format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }

    if let Some(path) = &args.log_file {
        info!("Logging to file: {}", path);
    }
    if let Some(dir) = &config.logging.log_dir {
        info!("Logging to directory: {}", dir.display());
    }

    Ok(guard)
}
