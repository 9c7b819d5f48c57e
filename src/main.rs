//! munin-poll binary entry point.
//!
//! Polls every enabled node from the configuration file and writes the
//! collected records to stdout as JSON lines. Errors are logged to stderr.

use std::io::Write;

use clap::Parser;
use munin_client::{NodeCollector, config::AppConfig, sink};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// munin-poll - Munin node poller
#[derive(Parser, Debug)]
#[command(name = "munin-poll", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/munin.yaml",
        env = "MUNIN_POLL_CONFIG"
    )]
    config: String,

    /// Run a single collection cycle per node, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is reserved for records
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,munin_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let config = AppConfig::load(&cli.config)?;

    let (record_sink, stream) = sink::channel(config.channel_capacity);
    let (mut records, mut errors) = stream.split();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    for node in config.enabled_nodes() {
        let collector = NodeCollector::new(node.clone(), record_sink.clone());
        if cli.once {
            tasks.push(tokio::spawn(async move {
                collector.collect_and_report().await;
            }));
        } else {
            tasks.push(tokio::spawn(collector.run(shutdown_rx.clone())));
        }
    }
    tracing::info!("Polling {} nodes", tasks.len());

    // The streams end once every collector has dropped its sink.
    drop(record_sink);
    drop(shutdown_rx);

    let errors_task = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(e) = errors.recv().await {
            tracing::warn!(node = %e.node(), kind = ?e.kind(), error = %e, "Collection error");
            count += 1;
        }
        count
    });

    let output = async {
        let stdout = std::io::stdout();
        while let Some(record) = records.recv().await {
            let line = serde_json::to_string(&record)?;
            let mut out = stdout.lock();
            writeln!(out, "{line}")?;
        }
        Ok::<_, Box<dyn std::error::Error>>(())
    };

    tokio::select! {
        result = output => result?,
        _ = shutdown_signal() => {
            tracing::info!("Shutting down collectors...");
            let _ = shutdown_tx.send(true);
        }
    }
    // Unblock collectors waiting on a full record channel.
    drop(records);

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Collector task failed: {}", e);
        }
    }
    let error_count = errors_task.await?;

    tracing::info!(errors = error_count, "Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
