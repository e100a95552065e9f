//! Viscostream CLI
//!
//! Runs the streaming prediction agent: reading ingestion, the periodic
//! snapshot broadcaster, and the HTTP/WebSocket server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use viscostream::{
    broadcast::Broadcaster,
    config::Config,
    core::predictor::LinearModel,
    ingest::{IngestWorker, GROUP_SIZE},
    server::{self, ServerConfig, ServerState},
    storage::{MemoryStore, ReadingStore},
    VERSION,
};

#[derive(Parser)]
#[command(name = "viscostream")]
#[command(version = VERSION)]
#[command(about = "Streaming viscosity prediction agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent: broadcaster, server, and (optionally) a simulated feed
    Serve {
        /// Port for the HTTP/WebSocket server
        #[arg(long)]
        port: Option<u16>,

        /// Seconds between broadcast ticks
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Readings per statistics window
        #[arg(long)]
        window_size: Option<usize>,

        /// Latest readings per broadcast snapshot
        #[arg(long)]
        batch_size: Option<usize>,

        /// Path to the JSON model artifact
        #[arg(long)]
        model: Option<PathBuf>,

        /// Feed synthetic instrument readings instead of a serial link
        #[arg(long)]
        simulate: bool,
    },

    /// Show effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "viscostream=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            poll_interval,
            window_size,
            batch_size,
            model,
            simulate,
        } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(secs) = poll_interval {
                config.poll_interval = Duration::from_secs(secs);
            }
            if let Some(window_size) = window_size {
                config.window_size = window_size;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(model) = model {
                config.model_path = model;
            }
            cmd_serve(config, simulate).await
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn cmd_serve(config: Config, simulate: bool) -> anyhow::Result<()> {
    let store: Arc<dyn ReadingStore> = Arc::new(MemoryStore::new());

    let model = if config.model_path.exists() {
        LinearModel::from_file(&config.model_path)
            .map_err(|e| anyhow::anyhow!("loading model {:?}: {e}", config.model_path))?
    } else {
        tracing::warn!(
            path = %config.model_path.display(),
            "model artifact not found, using baseline model"
        );
        LinearModel::baseline()
    };

    let broadcaster = Arc::new(Broadcaster::new(
        Arc::clone(&store),
        Arc::new(model.clone()),
        config.broadcast_config(),
    ));

    let (broadcast_shutdown_tx, broadcast_shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(Arc::clone(&broadcaster).run(broadcast_shutdown_rx));

    if simulate {
        let (line_tx, line_rx) = crossbeam_channel::unbounded();
        let worker = IngestWorker::new(Arc::clone(&store));
        thread::spawn(move || worker.run(line_rx));
        thread::spawn(move || simulate_instrument(line_tx));
        tracing::info!("simulated instrument feed started");
    }

    let server_config = ServerConfig::new(config.port, config.window_size);
    let state = ServerState::new(
        &server_config,
        store,
        Arc::new(model),
        Arc::clone(&broadcaster),
    );
    let (addr, server_shutdown_tx) = server::run(server_config, state).await?;
    tracing::info!(%addr, "agent running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    let _ = broadcast_shutdown_tx.send(());
    let _ = server_shutdown_tx.send(());

    Ok(())
}

/// Emit synthetic serial lines: one six-value reading per second, with a
/// slow drift so windows have non-zero variance.
fn simulate_instrument(lines: crossbeam_channel::Sender<String>) {
    let mut tick: u64 = 0;
    loop {
        let t = tick as f64;
        let values: [f64; GROUP_SIZE] = [
            t,                               // elapsedtime
            2.0 + (t * 0.3).sin() * 0.5,     // velocity
            0.998 + (t * 0.05).cos() * 0.01, // density
            12.0 + (t * 0.1).sin() * 2.0,    // viscosity
            0.35 + (t * 0.2).cos() * 0.05,   // tds
            150.0,                           // mass
        ];

        for value in values {
            // Trailing comma matches the instrument's line format
            if lines.send(format!("{value:.4},")).is_err() {
                return;
            }
        }

        tick += 1;
        thread::sleep(Duration::from_secs(1));
    }
}
