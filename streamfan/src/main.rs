mod server;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use streamfan_core::{
    bootstrap::{config::log_summary, init_services, load_config},
    logging,
};

/// How long outstanding delivery retries get after the loop stops
const RETRY_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "streamfan", version, about = "Fan stream records out to webhook subscribers")]
struct Cli {
    /// Config file (YAML/TOML/JSON); environment variables override it
    #[arg(short, long, env = "STREAMFAN_CONFIG_PATH")]
    config: Option<String>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = load_config(cli.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("streamfan starting...");
    log_summary(&config);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server::shutdown_signal().await;
            shutdown.cancel();
        });
    }

    // 3. Initialize services
    let Some(services) = init_services(&config, &shutdown).await? else {
        warn!("Shutdown requested during startup");
        return Ok(());
    };

    // 4. Restore state
    let mut poll_loop = services.poll_loop(&config);
    poll_loop.restore().await;
    let dispatcher = poll_loop.dispatcher().clone();

    if cli.once {
        match poll_loop.run_cycle(&shutdown).await {
            Some(report) => info!(
                streams = report.streams,
                records = report.records,
                deliveries_failed = report.deliveries_failed,
                "Single cycle finished"
            ),
            None => warn!("Shutdown requested before the cycle completed"),
        }
        drain_retries(&dispatcher).await;
        return Ok(());
    }

    // 5. Registration API
    let http_handle = if config.server.enabled {
        Some(
            server::start_http_server(
                &config.http_address(),
                services.registry.clone(),
                shutdown.clone(),
            )
            .await?,
        )
    } else {
        info!("Registration API disabled");
        None
    };

    // 6. Poll until shutdown; the loop saves a final checkpoint on exit
    let streams = poll_loop.run(shutdown.clone()).await;
    info!(streams = streams.len(), "Poll loop stopped");

    shutdown.cancel();
    if let Some(handle) = http_handle {
        if let Err(e) = handle.await {
            error!("HTTP server task failed: {}", e);
        }
    }

    drain_retries(&dispatcher).await;
    info!("streamfan stopped");
    Ok(())
}

async fn drain_retries(dispatcher: &streamfan_core::service::DeliveryDispatcher) {
    let pending = dispatcher.pending_retries();
    if pending > 0 {
        info!(pending, "Waiting for delivery retries");
    }
    if !dispatcher.drain(RETRY_GRACE).await {
        warn!(
            pending = dispatcher.pending_retries(),
            "Delivery retries still running after grace period, abandoning them"
        );
    }
}
