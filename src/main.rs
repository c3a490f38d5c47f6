//! Supervised file upload service.
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGHUP ─┐                    ┌────────────────────────────────────────┐
//!   SIGINT ─┼─▶ intents ────────▶│               Supervisor               │
//!   SIGTERM ┘   (coalescing)     │  load config → build instance → run    │
//!   config file change ─┘        │  wait: failure | reload | shutdown     │
//!                                └───────┬────────────────────┬───────────┘
//!                                        │ swap               │ lifecycle
//!                                        ▼                    ▼
//!   Client ──▶ ParentRouter ──▶ HandlerIndirection ──▶ UploadServer (gen N)
//!              (--mount only)                           UploadServer (gen N-1, draining)
//!
//!   Client ──▶ UploadServer listener (standalone)
//! ```
//!
//! Standalone mode binds `server.listen_address` per instance. With `--mount`,
//! a shared router is served on the given address and the uploader is mounted
//! under its base path.

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use fileuploader::config::watcher::ConfigWatcher;
use fileuploader::config::{ConfigSource, FileConfig};
use fileuploader::lifecycle::{intent_channel, IntentReceiver, OsSignals, Supervisor};
use fileuploader::observability::{init_logging, init_metrics};
use fileuploader::{ParentRouter, UploadServerFactory};

#[derive(Parser, Debug)]
#[command(name = "fileuploader", version, about = "Supervised file upload service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "fileuploader.toml")]
    config: PathBuf,

    /// Serve a shared router on this address and mount the uploader on it.
    #[arg(long)]
    mount: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let source = FileConfig::new(&cli.config);

    // Only logging and metrics come from this first read. The supervisor
    // loads the file again and reports any error through the subscriber.
    let initial = source.load().unwrap_or_default();
    init_logging(&initial.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "fileuploader starting"
    );

    if initial.observability.metrics_enabled {
        init_metrics(initial.observability.metrics_address.parse()?)?;
    }

    let (intents, intent_rx) = intent_channel();
    OsSignals.install(intents.clone())?;

    let _watcher = if initial.reload.watch_config {
        Some(ConfigWatcher::new(&cli.config, intents.clone()).run()?)
    } else {
        None
    };

    match cli.mount {
        None => {
            Supervisor::standalone(UploadServerFactory, source)
                .run(intent_rx)
                .await?
        }
        Some(addr) => run_mounted(addr, source, intent_rx).await?,
    }

    Ok(())
}

async fn run_mounted(
    addr: SocketAddr,
    source: FileConfig,
    intents: IntentReceiver,
) -> Result<(), Box<dyn Error>> {
    let parent = ParentRouter::new();
    let supervisor = Supervisor::shared(UploadServerFactory, source, Arc::new(parent.clone()));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Shared router listening");

    let stop = CancellationToken::new();
    let server = tokio::spawn({
        let stop = stop.clone();
        async move {
            axum::serve(listener, parent.into_router())
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
        }
    });

    let outcome = supervisor.run(intents).await;
    stop.cancel();
    server.await??;
    outcome?;
    Ok(())
}
