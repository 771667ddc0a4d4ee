use tracing::info;

use crate::aggregator::aggregate;
use crate::error::Result;
use crate::source::{MarketDataSource, SymbolSource};
use crate::types::{ScreenerParams, ScreenerReport};

/// One screener run: fetch universe and bhavcopy, then aggregate.
///
/// The two fetches run concurrently; the first failure aborts the run and is
/// returned unchanged so the caller can tell the error kinds apart.
pub async fn run_screener<S, M>(symbols: &S, data: &M, params: ScreenerParams) -> Result<ScreenerReport>
where
    S: SymbolSource + ?Sized,
    M: MarketDataSource + ?Sized,
{
    info!(date = %params.date, "Fetching F&O symbols and bhavcopy");
    let (universe, rows) = tokio::try_join!(
        symbols.list_universe_symbols(),
        data.fetch_contract_rows(params.date),
    )?;

    let report = aggregate(&universe, &rows, params.date, params.thresholds);
    log_summary(&report);
    Ok(report)
}

fn log_summary(r: &ScreenerReport) {
    info!(
        event = "SCREENER_RUN",
        date = %r.date,
        symbols = r.total_symbols(),
        gainers = r.gainers(),
        losers = r.losers(),
        "SCREENER RUN | date: {} | stocks: {} | OI gainers (>= {:.0}%): {} | OI losers (<= {:.0}%): {}",
        r.date,
        r.total_symbols(),
        r.thresholds.gain(),
        r.gainers(),
        r.thresholds.loss(),
        r.losers(),
    );
    info!(
        "[ROWS] total={} options_excluded={} matched={} outside_universe={} duplicate_symbols={}",
        r.stats.rows_total,
        r.stats.option_rows,
        r.stats.matched_rows,
        r.stats.unmatched_rows,
        r.stats.duplicate_symbols,
    );
}
