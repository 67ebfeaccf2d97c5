mod config;
mod main_lib;
mod scheduler;

use chrono::Utc;
use tokio::sync::watch;

use config::Config;
use main_lib::{build_coordinator, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let coordinator = build_coordinator(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let on_signal = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight stages");
            on_signal.cancel();
            let _ = shutdown_tx.send(true);
        }
    });

    if config.run_once {
        scheduler::run_cycle(&coordinator, Utc::now().date_naive()).await?;
    } else {
        let interval_days = config.pipeline.schedule_interval_days;
        scheduler::run_forever(coordinator, interval_days, shutdown_rx).await?;
    }
    Ok(())
}
