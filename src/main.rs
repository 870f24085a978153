//! EdgeScan - end-of-day / pre-market equity screener.
//!
//! Scores a watchlist every evening for the next session, confirms the
//! shortlist against pre-market data every morning, and feeds realized
//! outcomes back into the scoring model.

use anyhow::Result;
use edgescan::config::AppConfig;
use edgescan::logging::init_logging;
use edgescan::ScannerService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = AppConfig::load(None)?;

    init_logging(&config.logging.level, &config.logging.format);

    tracing::info!("EdgeScan v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.port,
        watchlist = config.watchlist().len(),
        data_dir = %config.data_dir().display(),
        "configuration loaded"
    );

    let service = ScannerService::new(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
