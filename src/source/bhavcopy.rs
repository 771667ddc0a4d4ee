use std::io::Read;

use crate::error::{AppError, Result};
use crate::types::{ContractRow, InstrumentType};

// Accepted header names per field: UDiFF layout first, then the pre-July-2024 layout.
const SYMBOL_HEADERS: &[&str] = &["TckrSymb", "SYMBOL"];
const OPTION_TYPE_HEADERS: &[&str] = &["OptnTp", "OPTION_TYP"];
const OPEN_INTEREST_HEADERS: &[&str] = &["OpnIntrst", "OPEN_INT"];
const CHANGE_IN_OI_HEADERS: &[&str] = &["ChngInOpnIntrst", "CHG_IN_OI"];

struct Columns {
    symbol: usize,
    option_type: usize,
    open_interest: usize,
    change_in_oi: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        Ok(Self {
            symbol: find_column(headers, SYMBOL_HEADERS)?,
            option_type: find_column(headers, OPTION_TYPE_HEADERS)?,
            open_interest: find_column(headers, OPEN_INTEREST_HEADERS)?,
            change_in_oi: find_column(headers, CHANGE_IN_OI_HEADERS)?,
        })
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        .ok_or_else(|| AppError::MalformedRow {
            line: 1,
            reason: format!("header is missing required column {}", names.join(" / ")),
        })
}

/// Parse an F&O bhavcopy CSV into typed contract rows.
///
/// Columns are matched by header name, so both the UDiFF and the legacy
/// layouts parse. Any row with a missing symbol or a non-integer OI field
/// fails the whole parse.
pub fn parse_bhavcopy<R: Read>(reader: R) -> Result<Vec<ContractRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(malformed)?.clone();
    let cols = Columns::locate(&headers)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(malformed)?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push(parse_record(&record, &cols, line)?);
    }
    Ok(rows)
}

fn parse_record(record: &csv::StringRecord, cols: &Columns, line: u64) -> Result<ContractRow> {
    let symbol = field(record, cols.symbol, "symbol", line)?;
    if symbol.is_empty() {
        return Err(AppError::MalformedRow { line, reason: "symbol is empty".to_string() });
    }

    let instrument_type = InstrumentType::from_option_marker(field(record, cols.option_type, "option type", line)?);

    let open_interest = parse_integer(field(record, cols.open_interest, "open interest", line)?, "open interest", line)?;
    let open_interest = u64::try_from(open_interest).map_err(|_| AppError::MalformedRow {
        line,
        reason: format!("open interest is negative: {open_interest}"),
    })?;

    let change_in_open_interest =
        parse_integer(field(record, cols.change_in_oi, "change in OI", line)?, "change in OI", line)?;

    Ok(ContractRow {
        instrument_type,
        underlying_symbol: symbol.to_string(),
        open_interest,
        change_in_open_interest,
    })
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<&'r str> {
    record.get(idx).ok_or_else(|| AppError::MalformedRow {
        line,
        reason: format!("{name} column missing from row"),
    })
}

/// Integer field, also accepting integral decimals such as `1200.0`.
fn parse_integer(raw: &str, name: &str, line: u64) -> Result<i64> {
    if raw.is_empty() {
        return Err(AppError::MalformedRow { line, reason: format!("{name} is empty") });
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(AppError::MalformedRow {
            line,
            reason: format!("{name} is not an integer: {raw:?}"),
        }),
    }
}

fn malformed(e: csv::Error) -> AppError {
    AppError::MalformedRow {
        line: e.position().map_or(0, |p| p.line()),
        reason: e.to_string(),
    }
}
