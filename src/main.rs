use std::path::Path;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oi_screener::config::Config;
use oi_screener::error::Result;
use oi_screener::export::export_report;
use oi_screener::run_screener;
use oi_screener::source::NseClient;
use oi_screener::types::{MoverDirection, ScreenerReport};

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
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cfg).await {
        error!("Screener failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let params = cfg.screener_params()?;
    let nse = NseClient::from_config(&cfg)?;

    let report = run_screener(&nse, &nse, params).await?;
    log_movers(&report);

    let paths = export_report(Path::new(&cfg.export_dir), &report)?;
    info!(
        "Wrote {} and {}",
        paths.report.display(),
        paths.movers.display()
    );
    Ok(())
}

fn log_movers(report: &ScreenerReport) {
    for m in &report.movers {
        let label = match m.direction {
            MoverDirection::Gainer => "BUILD-UP",
            MoverDirection::Loser => "UNWINDING",
        };
        info!(
            event = "OI_MOVER",
            symbol = %m.symbol,
            percent_change = m.percent_change,
            direction = %m.direction,
            "OI MOVER | {:<12} | {:>+8.2}% | {}",
            m.symbol, m.percent_change, label,
        );
    }
}
