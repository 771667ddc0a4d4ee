use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc, Weekday};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Contract rows (validated bhavcopy rows)
// ---------------------------------------------------------------------------

/// Option marker of a bhavcopy row. Futures and every other instrument are `NonOption`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentType {
    /// CE
    CallOption,
    /// PE
    PutOption,
    NonOption,
}

impl InstrumentType {
    pub fn from_option_marker(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("CE") {
            InstrumentType::CallOption
        } else if raw.eq_ignore_ascii_case("PE") {
            InstrumentType::PutOption
        } else {
            InstrumentType::NonOption
        }
    }

    pub fn is_option(self) -> bool {
        matches!(self, InstrumentType::CallOption | InstrumentType::PutOption)
    }
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstrumentType::CallOption => "CE",
            InstrumentType::PutOption => "PE",
            InstrumentType::NonOption => "FUT",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRow {
    pub instrument_type: InstrumentType,
    pub underlying_symbol: String,
    pub open_interest: u64,
    pub change_in_open_interest: i64,
}

// ---------------------------------------------------------------------------
// Aggregation output
// ---------------------------------------------------------------------------

/// Combined (non-option) OI for one underlying.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAggregate {
    pub symbol: String,
    pub combined_open_interest: i64,
    pub combined_change_in_open_interest: i64,
    pub previous_open_interest: i64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoverDirection {
    Gainer,
    Loser,
}

impl std::fmt::Display for MoverDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoverDirection::Gainer => write!(f, "gainer"),
            MoverDirection::Loser => write!(f, "loser"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoverEntry {
    pub date: TradeDate,
    pub symbol: String,
    pub percent_change: f64,
    pub direction: MoverDirection,
}

/// One row per universe symbol, sorted by percent change descending.
pub type ReportTable = Vec<SymbolAggregate>;
/// Symbols whose percent change crossed a threshold, in universe order.
pub type MoversTable = Vec<MoverEntry>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub rows_total: usize,
    pub option_rows: usize,
    pub matched_rows: usize,
    /// Non-option rows whose symbol is not in the universe.
    pub unmatched_rows: usize,
    /// Repeated universe entries collapsed into the first occurrence.
    pub duplicate_symbols: usize,
}

#[derive(Debug, Clone)]
pub struct ScreenerReport {
    pub date: TradeDate,
    pub thresholds: Thresholds,
    pub report: ReportTable,
    pub movers: MoversTable,
    pub stats: AggregateStats,
}

impl ScreenerReport {
    pub fn total_symbols(&self) -> usize {
        self.report.len()
    }

    pub fn gainers(&self) -> usize {
        self.movers.iter().filter(|m| m.direction == MoverDirection::Gainer).count()
    }

    pub fn losers(&self) -> usize {
        self.movers.iter().filter(|m| m.direction == MoverDirection::Loser).count()
    }
}

// ---------------------------------------------------------------------------
// Run parameters
// ---------------------------------------------------------------------------

/// IST, the exchange's calendar. Trade dates are judged against it, not the local zone.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Calendar date at the exchange for the instant `now`.
pub fn exchange_today(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(IST_OFFSET_SECS) {
        Some(ist) => now.with_timezone(&ist).date_naive(),
        None => now.date_naive(),
    }
}

/// A bhavcopy date. Always a past-or-present weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TradeDate(NaiveDate);

impl TradeDate {
    /// Parse `DD-MM-YYYY`, rejecting future dates and weekends.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_as_of(raw, exchange_today(Utc::now()))
    }

    pub fn parse_as_of(raw: &str, today: NaiveDate) -> Result<Self> {
        let raw = raw.trim();
        let date = NaiveDate::parse_from_str(raw, "%d-%m-%Y").map_err(|_| {
            AppError::InvalidDate(format!("{raw:?} is not a DD-MM-YYYY date"))
        })?;
        if date > today {
            return Err(AppError::InvalidDate(format!("{raw} is in the future")));
        }
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(AppError::InvalidDate(format!(
                "{raw} is a {}, no bhavcopy is published on weekends",
                date.weekday()
            )));
        }
        Ok(Self(date))
    }

    pub fn today_string() -> String {
        exchange_today(Utc::now()).format("%d-%m-%Y").to_string()
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD`, as used in UDiFF archive names.
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

impl std::fmt::Display for TradeDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%d-%m-%Y"))
    }
}

/// Gain/loss cut-offs in percent. Independent, not required to be symmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    gain: f64,
    loss: f64,
}

impl Thresholds {
    pub fn new(gain: f64, loss: f64) -> Result<Self> {
        if !gain.is_finite() || gain <= 0.0 {
            return Err(AppError::Config(format!("gain threshold must be a positive percentage, got {gain}")));
        }
        if !loss.is_finite() || loss >= 0.0 {
            return Err(AppError::Config(format!("loss threshold must be a negative percentage, got {loss}")));
        }
        Ok(Self { gain, loss })
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn classify(&self, percent_change: f64) -> Option<MoverDirection> {
        if percent_change >= self.gain {
            Some(MoverDirection::Gainer)
        } else if percent_change <= self.loss {
            Some(MoverDirection::Loser)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenerParams {
    pub date: TradeDate,
    pub thresholds: Thresholds,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
    }

    #[test]
    fn option_markers() {
        assert_eq!(InstrumentType::from_option_marker("CE"), InstrumentType::CallOption);
        assert_eq!(InstrumentType::from_option_marker(" pe "), InstrumentType::PutOption);
        assert_eq!(InstrumentType::from_option_marker(""), InstrumentType::NonOption);
        assert_eq!(InstrumentType::from_option_marker("XX"), InstrumentType::NonOption);
        assert!(!InstrumentType::NonOption.is_option());
    }

    #[test]
    fn trade_date_round_trips_display() {
        let d = TradeDate::parse_as_of("05-07-2024", today()).unwrap();
        assert_eq!(d.to_string(), "05-07-2024");
        assert_eq!(d.compact(), "20240705");
    }

    #[test]
    fn trade_date_rejects_weekend() {
        let err = TradeDate::parse_as_of("06-07-2024", today()).unwrap_err();
        assert!(matches!(err, AppError::InvalidDate(_)));
    }

    #[test]
    fn trade_date_rejects_future() {
        let err = TradeDate::parse_as_of("11-07-2024", today()).unwrap_err();
        assert!(matches!(err, AppError::InvalidDate(_)));
    }

    #[test]
    fn exchange_today_uses_ist() {
        use chrono::TimeZone;
        // 20:00 UTC on Monday is already Tuesday 01:30 in Mumbai
        let late_utc = Utc.with_ymd_and_hms(2024, 7, 8, 20, 0, 0).unwrap();
        assert_eq!(exchange_today(late_utc), NaiveDate::from_ymd_opt(2024, 7, 9).unwrap());
        assert!(TradeDate::parse_as_of("09-07-2024", exchange_today(late_utc)).is_ok());

        // 18:00 UTC on Monday is still 23:30 Monday in Mumbai
        let early_utc = Utc.with_ymd_and_hms(2024, 7, 8, 18, 0, 0).unwrap();
        assert_eq!(exchange_today(early_utc), NaiveDate::from_ymd_opt(2024, 7, 8).unwrap());
        assert!(TradeDate::parse_as_of("09-07-2024", exchange_today(early_utc)).is_err());
    }

    #[test]
    fn trade_date_rejects_wrong_format() {
        assert!(TradeDate::parse_as_of("2024-07-05", today()).is_err());
        assert!(TradeDate::parse_as_of("31-02-2024", today()).is_err());
        assert!(TradeDate::parse_as_of("", today()).is_err());
    }

    #[test]
    fn thresholds_classify_inclusive_bounds() {
        let t = Thresholds::new(10.0, -5.0).unwrap();
        assert_eq!(t.classify(10.0), Some(MoverDirection::Gainer));
        assert_eq!(t.classify(-5.0), Some(MoverDirection::Loser));
        assert_eq!(t.classify(9.99), None);
        assert_eq!(t.classify(0.0), None);
    }

    #[test]
    fn thresholds_reject_wrong_signs() {
        assert!(Thresholds::new(0.0, -5.0).is_err());
        assert!(Thresholds::new(10.0, 0.0).is_err());
        assert!(Thresholds::new(f64::NAN, -5.0).is_err());
    }
}
