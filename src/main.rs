mod api;
mod collector;
mod config;
mod error;
mod pipeline;
mod publish;
mod refresh;
mod scorer;
mod signals;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::RefreshStatus;
use crate::api::latency::CycleTimings;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::refresh::{RefreshHandle, RefreshOrchestrator};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let paths = cfg.data_paths();
    std::fs::create_dir_all(paths.dir())?;

    let status = Arc::new(RefreshStatus::new());
    let timings = Arc::new(CycleTimings::new());

    // --- Refresh loop ---
    match cfg.refresh_interval {
        Some(interval) => info!(
            "Refreshing every {} minutes into {}",
            interval.as_secs() / 60,
            paths.dir().display()
        ),
        None => info!("Single refresh run into {}", paths.dir().display()),
    }
    let sources: Vec<String> = cfg.collectors.iter().map(|(s, _)| s.to_string()).collect();
    info!("Collectors (in order): {}", sources.join(", "));

    let refresher = RefreshHandle::new();
    refresher.start(RefreshOrchestrator::from_config(
        &cfg,
        Arc::clone(&status),
        Arc::clone(&timings),
    ));

    if !cfg.api_enabled {
        tokio::select! {
            _ = refresher.wait() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping after the current cycle");
                refresher.stop().await;
            }
        }
        return Ok(());
    }

    // --- HTTP API ---
    let app = router(ApiState {
        paths,
        status,
        timings,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl-C received, shutting down");
        })
        .await?;

    refresher.stop().await;
    Ok(())
}
