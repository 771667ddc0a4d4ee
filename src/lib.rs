pub mod aggregator;
pub mod config;
pub mod error;
pub mod export;
pub mod screener;
pub mod source;
pub mod types;

pub use aggregator::aggregate;
pub use error::{AppError, Result};
pub use screener::run_screener;
