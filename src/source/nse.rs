use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{Config, UDIFF_FIRST_DATE, USER_AGENT};
use crate::error::{AppError, Result};
use crate::source::bhavcopy::parse_bhavcopy;
use crate::source::{MarketDataSource, SymbolSource};
use crate::types::{ContractRow, TradeDate};

#[derive(Debug, Deserialize)]
struct UnderlyingInfoResponse {
    data: UnderlyingData,
}

#[derive(Debug, Deserialize)]
struct UnderlyingData {
    #[serde(rename = "UnderlyingList")]
    underlying_list: Vec<Underlying>,
}

#[derive(Debug, Deserialize)]
struct Underlying {
    symbol: String,
}

/// NSE website + archive client. Serves both the F&O universe and the daily bhavcopy.
pub struct NseClient {
    client: reqwest::Client,
    base_url: String,
    archive_url: String,
}

impl NseClient {
    pub fn new(base_url: &str, archive_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            archive_url: archive_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.nse_base_url, &cfg.nse_archive_url, cfg.http_timeout)
    }

    /// The NSE API only answers requests that carry the session cookies set by the home page.
    async fn prime_cookies(&self) -> Result<()> {
        let resp = self.client.get(&self.base_url).send().await?;
        if !resp.status().is_success() {
            warn!("NSE home page returned HTTP {}, continuing without session cookies", resp.status());
        }
        Ok(())
    }
}

#[async_trait]
impl SymbolSource for NseClient {
    async fn list_universe_symbols(&self) -> Result<Vec<String>> {
        self.prime_cookies().await?;

        let url = format!("{}/api/underlying-information", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header(
                REFERER,
                format!("{}/products-services/equity-derivatives-list-underlyings-information", self.base_url),
            )
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::DataSourceUnavailable(format!(
                "F&O symbol list returned HTTP {status}"
            )));
        }

        let body: UnderlyingInfoResponse = resp.json().await?;
        let symbols: Vec<String> = body
            .data
            .underlying_list
            .into_iter()
            .map(|u| u.symbol.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if symbols.is_empty() {
            return Err(AppError::DataSourceUnavailable(
                "F&O symbol list was empty".to_string(),
            ));
        }

        info!("Fetched {} F&O underlyings", symbols.len());
        Ok(symbols)
    }
}

#[async_trait]
impl MarketDataSource for NseClient {
    async fn fetch_contract_rows(&self, date: TradeDate) -> Result<Vec<ContractRow>> {
        let url = format!("{}/{}", self.archive_url, bhavcopy_path(date));
        debug!("Downloading bhavcopy {url}");

        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AppError::InvalidDate(format!(
                    "no bhavcopy published for {date} (market holiday or not yet available)"
                )))
            }
            s => {
                return Err(AppError::DataSourceUnavailable(format!(
                    "bhavcopy download for {date} returned HTTP {s}"
                )))
            }
        }

        let bytes = resp.bytes().await?;
        let rows = unzip_bhavcopy(&bytes)?;
        info!("Bhavcopy {date}: {} contract rows", rows.len());
        Ok(rows)
    }
}

/// Archive path of the zipped F&O bhavcopy for `date`, relative to the archive host.
pub fn bhavcopy_path(date: TradeDate) -> String {
    let d = date.naive();
    let (y, m, dd) = UDIFF_FIRST_DATE;
    let udiff_start = NaiveDate::from_ymd_opt(y, m, dd).unwrap_or(NaiveDate::MIN);

    if d >= udiff_start {
        format!("content/fo/BhavCopy_NSE_FO_0_0_0_{}_F_0000.csv.zip", date.compact())
    } else {
        let mon = d.format("%b").to_string().to_uppercase();
        format!(
            "content/historical/DERIVATIVES/{year}/{mon}/fo{day}{mon}{year}bhav.csv.zip",
            year = d.format("%Y"),
            day = d.format("%d"),
        )
    }
}

/// Parse the single CSV entry of a bhavcopy archive.
fn unzip_bhavcopy(bytes: &[u8]) -> Result<Vec<ContractRow>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    if archive.is_empty() {
        return Err(AppError::DataSourceUnavailable("bhavcopy archive is empty".to_string()));
    }
    let entry = archive.by_index(0)?;
    parse_bhavcopy(entry)
}
