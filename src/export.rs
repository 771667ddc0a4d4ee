use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::info;

use crate::config::{MOVERS_FILE_PREFIX, REPORT_FILE_PREFIX};
use crate::error::Result;
use crate::types::{ScreenerReport, TradeDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub report: PathBuf,
    pub movers: PathBuf,
}

pub fn report_file_name(date: TradeDate) -> String {
    format!("{REPORT_FILE_PREFIX}_{date}.csv")
}

pub fn movers_file_name(date: TradeDate) -> String {
    format!("{MOVERS_FILE_PREFIX}_{date}.csv")
}

/// Write the full OI table and the movers table as CSV files into `dir`.
///
/// Existing files for the same date are overwritten.
pub fn export_report(dir: &Path, report: &ScreenerReport) -> Result<ExportPaths> {
    fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        report: dir.join(report_file_name(report.date)),
        movers: dir.join(movers_file_name(report.date)),
    };

    let mut w = Writer::from_writer(File::create(&paths.report)?);
    w.write_record([
        "Symbol",
        "Combined OI",
        "Combined Change in OI",
        "Previous Day OI",
        "% Change in OI",
    ])?;
    for agg in &report.report {
        w.write_record(&[
            agg.symbol.clone(),
            agg.combined_open_interest.to_string(),
            agg.combined_change_in_open_interest.to_string(),
            agg.previous_open_interest.to_string(),
            agg.percent_change.to_string(),
        ])?;
    }
    w.flush()?;

    let mut w = Writer::from_writer(File::create(&paths.movers)?);
    w.write_record(["Date", "Symbol", "% Change in OI"])?;
    for m in &report.movers {
        w.write_record(&[m.date.to_string(), m.symbol.clone(), m.percent_change.to_string()])?;
    }
    w.flush()?;

    info!(
        "Exported {} rows to {} and {} movers to {}",
        report.report.len(),
        paths.report.display(),
        report.movers.len(),
        paths.movers.display(),
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::types::{ContractRow, InstrumentType, Thresholds};
    use chrono::NaiveDate;

    fn sample_report() -> ScreenerReport {
        let date = TradeDate::parse_as_of("05-07-2024", NaiveDate::from_ymd_opt(2024, 7, 10).unwrap())
            .unwrap();
        let rows = vec![ContractRow {
            instrument_type: InstrumentType::NonOption,
            underlying_symbol: "AAA".to_string(),
            open_interest: 100,
            change_in_open_interest: 20,
        }];
        aggregate(
            &["AAA".to_string(), "BBB".to_string()],
            &rows,
            date,
            Thresholds::new(10.0, -5.0).unwrap(),
        )
    }

    #[test]
    fn file_names_follow_convention() {
        let report = sample_report();
        assert_eq!(report_file_name(report.date), "OI_Data_05-07-2024.csv");
        assert_eq!(movers_file_name(report.date), "OI_Winners_05-07-2024.csv");
    }

    #[test]
    fn writes_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let paths = export_report(&out, &sample_report()).unwrap();

        let data = std::fs::read_to_string(&paths.report).unwrap();
        let lines: Vec<_> = data.lines().collect();
        assert_eq!(
            lines[0],
            "Symbol,Combined OI,Combined Change in OI,Previous Day OI,% Change in OI"
        );
        assert_eq!(lines[1], "AAA,100,20,80,25");
        assert_eq!(lines[2], "BBB,0,0,0,0");

        let winners = std::fs::read_to_string(&paths.movers).unwrap();
        let lines: Vec<_> = winners.lines().collect();
        assert_eq!(lines, vec!["Date,Symbol,% Change in OI", "05-07-2024,AAA,25"]);
    }
}
