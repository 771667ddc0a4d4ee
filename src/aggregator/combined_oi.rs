use std::collections::HashMap;

use tracing::{debug, warn};

use crate::types::{
    AggregateStats, ContractRow, MoverEntry, ScreenerReport, SymbolAggregate, Thresholds,
    TradeDate,
};

/// Aggregate non-option OI per universe symbol and pick out threshold movers.
///
/// Every universe symbol gets exactly one report row, zero-filled when no rows
/// matched it. Repeated universe symbols collapse into their first occurrence.
/// The report is sorted by percent change descending (stable, so ties keep
/// universe order); movers are emitted in universe order.
pub fn aggregate(
    universe: &[String],
    rows: &[ContractRow],
    date: TradeDate,
    thresholds: Thresholds,
) -> ScreenerReport {
    let mut stats = AggregateStats::default();

    let mut slots: Vec<SymbolAggregate> = Vec::with_capacity(universe.len());
    // (combined OI, combined change) per slot; i128 so summing i64-range rows cannot overflow
    let mut sums: Vec<(i128, i128)> = Vec::with_capacity(universe.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(universe.len());
    for symbol in universe {
        if index.contains_key(symbol.as_str()) {
            stats.duplicate_symbols += 1;
            continue;
        }
        index.insert(symbol.as_str(), slots.len());
        slots.push(SymbolAggregate {
            symbol: symbol.clone(),
            combined_open_interest: 0,
            combined_change_in_open_interest: 0,
            previous_open_interest: 0,
            percent_change: 0.0,
        });
        sums.push((0, 0));
    }
    if stats.duplicate_symbols > 0 {
        warn!(
            duplicates = stats.duplicate_symbols,
            "universe contains repeated symbols, counting each once"
        );
    }

    for row in rows {
        stats.rows_total += 1;
        if row.instrument_type.is_option() {
            stats.option_rows += 1;
            continue;
        }
        match index.get(row.underlying_symbol.as_str()) {
            Some(&i) => {
                let (oi, change) = &mut sums[i];
                *oi += i128::from(row.open_interest);
                *change += i128::from(row.change_in_open_interest);
                stats.matched_rows += 1;
            }
            None => stats.unmatched_rows += 1,
        }
    }

    let mut movers = Vec::new();
    for (slot, &(oi, change)) in slots.iter_mut().zip(&sums) {
        let previous = oi - change;
        slot.combined_open_interest = saturate(oi);
        slot.combined_change_in_open_interest = saturate(change);
        slot.previous_open_interest = saturate(previous);
        slot.percent_change = percent_change(change, previous);

        if let Some(direction) = thresholds.classify(slot.percent_change) {
            movers.push(MoverEntry {
                date,
                symbol: slot.symbol.clone(),
                percent_change: slot.percent_change,
                direction,
            });
        }
    }

    // sort_by is stable
    slots.sort_by(|a, b| b.percent_change.total_cmp(&a.percent_change));

    debug!(
        rows = stats.rows_total,
        options = stats.option_rows,
        matched = stats.matched_rows,
        unmatched = stats.unmatched_rows,
        "aggregation pass complete"
    );

    ScreenerReport {
        date,
        thresholds,
        report: slots,
        movers,
        stats,
    }
}

/// `change / previous * 100`, or 0 when there is no previous level to compare against.
fn percent_change(change: i128, previous: i128) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    change as f64 / previous as f64 * 100.0
}

/// Clamp a combined figure into the i64 range of the report columns.
fn saturate(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstrumentType, MoverDirection};
    use chrono::NaiveDate;

    fn date() -> TradeDate {
        TradeDate::parse_as_of("05-07-2024", NaiveDate::from_ymd_opt(2024, 7, 10).unwrap())
            .unwrap()
    }

    fn thresholds() -> Thresholds {
        Thresholds::new(10.0, -5.0).unwrap()
    }

    fn universe(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn row(kind: InstrumentType, symbol: &str, oi: u64, chg: i64) -> ContractRow {
        ContractRow {
            instrument_type: kind,
            underlying_symbol: symbol.to_string(),
            open_interest: oi,
            change_in_open_interest: chg,
        }
    }

    fn find<'a>(report: &'a ScreenerReport, symbol: &str) -> &'a SymbolAggregate {
        report.report.iter().find(|a| a.symbol == symbol).unwrap()
    }

    #[test]
    fn empty_rows_give_zero_rows_and_no_movers() {
        let out = aggregate(&universe(&["AAA", "BBB", "CCC"]), &[], date(), thresholds());
        assert_eq!(out.report.len(), 3);
        for agg in &out.report {
            assert_eq!(agg.combined_open_interest, 0);
            assert_eq!(agg.combined_change_in_open_interest, 0);
            assert_eq!(agg.previous_open_interest, 0);
            assert_eq!(agg.percent_change, 0.0);
        }
        assert!(out.movers.is_empty());
    }

    #[test]
    fn futures_counted_options_ignored() {
        let rows = vec![
            row(InstrumentType::NonOption, "AAA", 100, 20),
            row(InstrumentType::CallOption, "AAA", 999, 999),
        ];
        let out = aggregate(&universe(&["AAA", "BBB"]), &rows, date(), thresholds());

        let aaa = find(&out, "AAA");
        assert_eq!(aaa.combined_open_interest, 100);
        assert_eq!(aaa.combined_change_in_open_interest, 20);
        assert_eq!(aaa.previous_open_interest, 80);
        assert!((aaa.percent_change - 25.0).abs() < 1e-9);

        let bbb = find(&out, "BBB");
        assert_eq!(bbb.combined_open_interest, 0);
        assert_eq!(bbb.percent_change, 0.0);

        assert_eq!(out.movers.len(), 1);
        assert_eq!(out.movers[0].symbol, "AAA");
        assert_eq!(out.movers[0].direction, MoverDirection::Gainer);
        assert_eq!(out.movers[0].date, date());
    }

    #[test]
    fn option_rows_never_change_the_result() {
        let u = universe(&["AAA", "BBB"]);
        let base = vec![
            row(InstrumentType::NonOption, "AAA", 500, -40),
            row(InstrumentType::NonOption, "BBB", 300, 30),
        ];
        let mut noisy = base.clone();
        noisy.push(row(InstrumentType::CallOption, "AAA", 10_000, 5_000));
        noisy.push(row(InstrumentType::PutOption, "BBB", 7_000, -6_000));

        let a = aggregate(&u, &base, date(), thresholds());
        let b = aggregate(&u, &noisy, date(), thresholds());
        assert_eq!(a.report, b.report);
        assert_eq!(a.movers, b.movers);
        assert_eq!(b.stats.option_rows, 2);
    }

    #[test]
    fn zero_previous_oi_gives_zero_percent() {
        let rows = vec![row(InstrumentType::NonOption, "NEW", 250, 250)];
        let out = aggregate(&universe(&["NEW"]), &rows, date(), thresholds());
        let agg = find(&out, "NEW");
        assert_eq!(agg.previous_open_interest, 0);
        assert_eq!(agg.percent_change, 0.0);
        assert!(out.movers.is_empty());
    }

    #[test]
    fn previous_oi_invariant_and_descending_sort() {
        let rows = vec![
            row(InstrumentType::NonOption, "AAA", 110, 10),
            row(InstrumentType::NonOption, "BBB", 90, -10),
            row(InstrumentType::NonOption, "CCC", 150, 50),
            row(InstrumentType::NonOption, "CCC", 50, 0),
            row(InstrumentType::NonOption, "DDD", 100, 0),
        ];
        let out = aggregate(&universe(&["AAA", "BBB", "CCC", "DDD", "EEE"]), &rows, date(), thresholds());

        for agg in &out.report {
            assert_eq!(
                agg.previous_open_interest,
                agg.combined_open_interest - agg.combined_change_in_open_interest
            );
        }
        for pair in out.report.windows(2) {
            assert!(pair[0].percent_change >= pair[1].percent_change);
        }
        assert_eq!(out.report[0].symbol, "CCC");
        assert_eq!(out.report.last().unwrap().symbol, "BBB");
    }

    #[test]
    fn ties_keep_universe_order() {
        let out = aggregate(&universe(&["ZZZ", "AAA", "MMM"]), &[], date(), thresholds());
        let order: Vec<_> = out.report.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(order, vec!["ZZZ", "AAA", "MMM"]);
    }

    #[test]
    fn movers_are_exactly_threshold_crossers() {
        // previous = 100 for each, so percent == change
        let rows = vec![
            row(InstrumentType::NonOption, "UP10", 110, 10),
            row(InstrumentType::NonOption, "UP9", 109, 9),
            row(InstrumentType::NonOption, "DN5", 95, -5),
            row(InstrumentType::NonOption, "DN4", 96, -4),
            row(InstrumentType::NonOption, "DN30", 70, -30),
        ];
        let u = universe(&["UP10", "UP9", "DN5", "DN4", "DN30"]);
        let out = aggregate(&u, &rows, date(), thresholds());

        let movers: Vec<_> = out.movers.iter().map(|m| (m.symbol.as_str(), m.direction)).collect();
        assert_eq!(
            movers,
            vec![
                ("UP10", MoverDirection::Gainer),
                ("DN5", MoverDirection::Loser),
                ("DN30", MoverDirection::Loser),
            ]
        );
        assert_eq!(out.gainers(), 1);
        assert_eq!(out.losers(), 2);
        assert_eq!(out.total_symbols(), 5);
    }

    #[test]
    fn unknown_symbols_skipped() {
        let rows = vec![
            row(InstrumentType::NonOption, "AAA", 100, 20),
            row(InstrumentType::NonOption, "NIFTY", 9_000, 100),
        ];
        let out = aggregate(&universe(&["AAA"]), &rows, date(), thresholds());
        assert_eq!(out.report.len(), 1);
        assert_eq!(out.stats.unmatched_rows, 1);
        assert_eq!(out.stats.matched_rows, 1);
    }

    #[test]
    fn symbol_match_is_exact() {
        let rows = vec![row(InstrumentType::NonOption, "aaa", 100, 20)];
        let out = aggregate(&universe(&["AAA"]), &rows, date(), thresholds());
        assert_eq!(find(&out, "AAA").combined_open_interest, 0);
    }

    #[test]
    fn near_limit_values_do_not_overflow() {
        let huge = 5_000_000_000_000_000_000u64;
        let rows = vec![
            row(InstrumentType::NonOption, "AAA", huge, 0),
            row(InstrumentType::NonOption, "AAA", huge, 0),
            row(InstrumentType::NonOption, "BBB", i64::MAX as u64, i64::MIN),
            row(InstrumentType::NonOption, "CCC", 1_000, i64::MIN),
        ];
        let out = aggregate(&universe(&["AAA", "BBB", "CCC"]), &rows, date(), thresholds());

        let aaa = find(&out, "AAA");
        assert_eq!(aaa.combined_open_interest, i64::MAX);
        assert_eq!(aaa.combined_change_in_open_interest, 0);
        assert_eq!(aaa.percent_change, 0.0);

        let bbb = find(&out, "BBB");
        assert_eq!(bbb.combined_open_interest, i64::MAX);
        assert_eq!(bbb.combined_change_in_open_interest, i64::MIN);
        assert_eq!(bbb.previous_open_interest, i64::MAX);
        assert!(bbb.percent_change < 0.0 && bbb.percent_change.is_finite());

        let ccc = find(&out, "CCC");
        assert_eq!(ccc.previous_open_interest, i64::MAX);
        assert!(ccc.percent_change.is_finite());
    }

    #[test]
    fn huge_rows_from_bhavcopy_aggregate() {
        let csv = "TckrSymb,OptnTp,OpnIntrst,ChngInOpnIntrst\n\
                   AAA,,5000000000000000000,0\n\
                   AAA,,5000000000000000000,0\n";
        let rows = crate::source::parse_bhavcopy(csv.as_bytes()).unwrap();
        let out = aggregate(&universe(&["AAA"]), &rows, date(), thresholds());
        assert_eq!(find(&out, "AAA").combined_open_interest, i64::MAX);
    }

    #[test]
    fn duplicate_universe_symbols_collapse() {
        let rows = vec![row(InstrumentType::NonOption, "AAA", 100, 20)];
        let out = aggregate(&universe(&["AAA", "BBB", "AAA"]), &rows, date(), thresholds());
        assert_eq!(out.report.len(), 2);
        assert_eq!(out.stats.duplicate_symbols, 1);
        assert_eq!(find(&out, "AAA").combined_open_interest, 100);
        assert_eq!(out.movers.len(), 1);
    }
}
