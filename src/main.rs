use std::{env, sync::Arc};

use anyhow::Result;
use tokio_cron_scheduler::JobScheduler;

use crate::{
    crawler::alpha_vantage::AlphaVantage, database::PostgresSQL, event::intraday_quote::Ingestor,
};

pub mod config;
pub mod crawler;
pub mod database;
pub mod error;
pub mod event;
pub mod logging;
pub mod scheduler;
pub mod util;

#[cfg(test)]
mod testing;

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let settings = match config::App::load() {
        Ok(settings) => settings,
        Err(why) => {
            logging::error_console(format!("Failed to load settings because {}", why));
            return Err(why.into());
        }
    };
    logging::debug_file_async(format!("{:?}", settings));

    let source = Arc::new(AlphaVantage::from_settings(&settings.alpha_vantage));
    let store = Arc::new(PostgresSQL::new(&settings.postgresql));
    let ingestor = Arc::new(Ingestor::new(
        settings.alpha_vantage.symbol.clone(),
        source,
        store,
    ));

    let mut sched = JobScheduler::new().await?;
    scheduler::start(&sched, ingestor, &settings.schedule).await?;

    let banner = format!(
        "{} {} started on {}/{}, ingesting {} with cron '{}'",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env::consts::OS,
        env::consts::ARCH,
        settings.alpha_vantage.symbol,
        settings.schedule.cron
    );
    logging::info_file_async(banner.clone());
    logging::info_console(banner);

    wait_for_shutdown().await?;

    logging::info_console("Shutting down the scheduler".to_string());
    sched.shutdown().await?;
    logging::info_file_async("Scheduler stopped");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => logging::info_file_async("Received Ctrl+C"),
        _ = sigterm.recv() => logging::info_file_async("Received SIGTERM"),
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    logging::info_file_async("Received Ctrl+C");

    Ok(())
}
