use tbtc_common::config::AppConfig;
use tbtc_scanner::report::ReportOptions;
use tbtc_scanner::watcher::SnapshotWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tbtc_scanner=info,tbtc_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("tBTC liquidation scanner starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let options = ReportOptions {
        top_n: config.scanner_top_n,
        vending_machine_address: config.vending_machine_address.clone(),
    };
    let mut watcher = SnapshotWatcher::new(&config.snapshot_path, config.scanner_poll_interval_ms, options);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = watcher.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Snapshot watcher exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("tBTC liquidation scanner stopped.");
    Ok(())
}
