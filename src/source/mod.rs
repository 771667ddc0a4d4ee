pub mod bhavcopy;
pub mod nse;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContractRow, TradeDate};

pub use bhavcopy::parse_bhavcopy;
pub use nse::NseClient;

/// Provides the universe of F&O underlyings to screen.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    async fn list_universe_symbols(&self) -> Result<Vec<String>>;
}

/// Provides the contract-level bhavcopy rows for a trade date.
///
/// Must fail with `InvalidDate` or `DataSourceUnavailable` rather than return
/// an empty table when nothing was published.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_contract_rows(&self, date: TradeDate) -> Result<Vec<ContractRow>>;
}
