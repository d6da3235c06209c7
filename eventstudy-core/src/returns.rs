//! ReturnBuilder: daily simple stock returns inner-joined with the benchmark.
//!
//! `ret[i] = close[i] / close[i-1] - 1` over the date-sorted price table. The
//! first row has no prior observation and never reaches the output. A date
//! survives only if it has both a defined return and a market return.

use crate::config::PathResolver;
use crate::data::ingest::{factors_from_frame, prices_from_frame, read_table};
use crate::data::schema::TableSchema;
use crate::domain::{FactorRecord, PriceRecord, ReturnRecord};
use crate::error::{Artifact, PipelineError};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// Stock return for one date before the benchmark join.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyReturn {
    pub date: NaiveDate,
    /// `None` for the first row, after a missing close, or after a zero close.
    pub ret: Option<f64>,
}

/// Joined returns table, date ascending, no missing values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnTable {
    rows: Vec<ReturnRecord>,
}

impl ReturnTable {
    pub fn rows(&self) -> &[ReturnRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}

/// Simple returns over prices sorted ascending by date.
///
/// Duplicate dates are rejected: the price table is keyed by trading day.
/// A missing close leaves its own return and the next one undefined (no
/// forward-fill).
pub fn simple_returns(prices: &[PriceRecord]) -> Result<Vec<DailyReturn>, PipelineError> {
    let mut sorted: Vec<&PriceRecord> = prices.iter().collect();
    sorted.sort_by_key(|p| p.date);

    if let Some(pair) = sorted.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(PipelineError::malformed(
            Artifact::Prices,
            format!("duplicate date {}", pair[0].date),
        ));
    }

    let mut prev_close: Option<f64> = None;
    let returns = sorted
        .into_iter()
        .map(|p| {
            let ret = match (prev_close, p.close) {
                (Some(prev), Some(close)) if prev != 0.0 => Some(close / prev - 1.0),
                _ => None,
            };
            prev_close = p.close;
            DailyReturn { date: p.date, ret }
        })
        .collect();

    Ok(returns)
}

/// Inner-join stock returns with market returns on date, dropping any row
/// where either side is missing.
pub fn join_market(
    returns: &[DailyReturn],
    factors: &[FactorRecord],
) -> Result<ReturnTable, PipelineError> {
    let mut mkt_by_date: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for f in factors {
        if mkt_by_date.insert(f.date, f.mkt).is_some() {
            return Err(PipelineError::malformed(
                Artifact::Factors,
                format!("duplicate date {}", f.date),
            ));
        }
    }

    let mut rows: Vec<ReturnRecord> = returns
        .iter()
        .filter_map(|r| {
            let ret = r.ret?;
            let mkt = (*mkt_by_date.get(&r.date)?)?;
            Some(ReturnRecord {
                date: r.date,
                ret,
                mkt,
            })
        })
        .collect();
    rows.sort_by_key(|r| r.date);

    Ok(ReturnTable { rows })
}

/// Builds a ticker's returns table from its price artifact and the shared
/// factor table.
pub struct ReturnBuilder<'a> {
    resolver: &'a dyn PathResolver,
}

impl<'a> ReturnBuilder<'a> {
    pub fn new(resolver: &'a dyn PathResolver) -> Self {
        Self { resolver }
    }

    pub fn build_returns(&self, ticker: &str) -> Result<ReturnTable, PipelineError> {
        let prc_csv = self.resolver.artifacts(ticker).prc_csv;
        let prices = read_table(&prc_csv, &TableSchema::PRICES)?;
        let factors = read_table(&self.resolver.factors_csv(), &TableSchema::FACTORS)?;

        let table = Self::from_frames(&prices, &factors)?;
        tracing::info!(
            ticker,
            price_rows = prices.height(),
            factor_rows = factors.height(),
            rows = table.len(),
            "returns table built"
        );
        Ok(table)
    }

    /// Same as `build_returns` but over already-normalized frames.
    pub fn from_frames(
        prices: &DataFrame,
        factors: &DataFrame,
    ) -> Result<ReturnTable, PipelineError> {
        let prices = prices_from_frame(prices)?;
        let factors = factors_from_frame(factors)?;
        Self::from_records(&prices, &factors)
    }

    pub fn from_records(
        prices: &[PriceRecord],
        factors: &[FactorRecord],
    ) -> Result<ReturnTable, PipelineError> {
        let returns = simple_returns(prices)?;
        join_market(&returns, factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn prices(closes: &[(&str, f64)]) -> Vec<PriceRecord> {
        closes
            .iter()
            .map(|(d, c)| PriceRecord::from_close(date(d), *c))
            .collect()
    }

    fn factors(mkts: &[(&str, f64)]) -> Vec<FactorRecord> {
        mkts.iter()
            .map(|(d, m)| FactorRecord {
                date: date(d),
                mkt: Some(*m),
            })
            .collect()
    }

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn returns_from_closes() {
        let p = prices(&[("2024-01-02", 100.0), ("2024-01-03", 110.0), ("2024-01-04", 99.0)]);
        let rets = simple_returns(&p).unwrap();

        assert_eq!(rets.len(), 3);
        assert_eq!(rets[0].ret, None);
        assert!(close_to(rets[1].ret.unwrap(), 0.10));
        assert!(close_to(rets[2].ret.unwrap(), -0.10));
    }

    #[test]
    fn returns_sort_unordered_input() {
        let p = prices(&[("2024-01-04", 99.0), ("2024-01-02", 100.0), ("2024-01-03", 110.0)]);
        let rets = simple_returns(&p).unwrap();

        assert_eq!(rets[0].date, date("2024-01-02"));
        assert!(close_to(rets[2].ret.unwrap(), -0.10));
    }

    #[test]
    fn duplicate_price_date_is_malformed() {
        let p = prices(&[("2024-01-02", 100.0), ("2024-01-02", 101.0)]);
        assert!(matches!(
            simple_returns(&p),
            Err(PipelineError::MalformedInput { artifact: Artifact::Prices, .. })
        ));
    }

    #[test]
    fn missing_close_breaks_two_returns() {
        let mut p = prices(&[
            ("2024-01-02", 100.0),
            ("2024-01-03", 0.0),
            ("2024-01-04", 99.0),
            ("2024-01-05", 99.0),
        ]);
        p[1].close = None;
        let rets = simple_returns(&p).unwrap();

        assert_eq!(rets[1].ret, None);
        assert_eq!(rets[2].ret, None);
        assert_eq!(rets[3].ret, Some(0.0));
    }

    #[test]
    fn zero_previous_close_leaves_return_undefined() {
        let p = prices(&[("2024-01-02", 100.0), ("2024-01-03", 0.0), ("2024-01-04", 50.0)]);
        let rets = simple_returns(&p).unwrap();

        assert_eq!(rets[1].ret, Some(-1.0));
        assert_eq!(rets[2].ret, None);

        let f = factors(&[("2024-01-03", 0.1), ("2024-01-04", 0.2)]);
        let table = join_market(&rets, &f).unwrap();
        assert_eq!(table.dates(), vec![date("2024-01-03")]);
        assert!(table.rows().iter().all(|r| r.ret.is_finite()));
    }

    #[test]
    fn first_row_excluded_even_when_benchmark_covers_it() {
        let p = prices(&[("2024-01-02", 100.0), ("2024-01-03", 110.0), ("2024-01-04", 99.0)]);
        let f = factors(&[("2024-01-02", 0.5), ("2024-01-03", 0.1), ("2024-01-04", -0.2)]);
        let table = ReturnBuilder::from_records(&p, &f).unwrap();

        assert_eq!(table.dates(), vec![date("2024-01-03"), date("2024-01-04")]);
        assert!(close_to(table.rows()[0].ret, 0.10));
        assert_eq!(table.rows()[0].mkt, 0.1);
    }

    #[test]
    fn inner_join_keeps_common_dates_only() {
        // returns defined on D1..D3 (D0 is the undefined first row)
        let p = prices(&[
            ("2024-01-01", 100.0),
            ("2024-01-02", 101.0),
            ("2024-01-03", 102.0),
            ("2024-01-04", 103.0),
        ]);
        let f = factors(&[("2024-01-03", 0.1), ("2024-01-04", 0.2), ("2024-01-05", 0.3)]);
        let table = ReturnBuilder::from_records(&p, &f).unwrap();

        assert_eq!(table.dates(), vec![date("2024-01-03"), date("2024-01-04")]);
    }

    #[test]
    fn missing_market_value_is_dropped() {
        let p = prices(&[("2024-01-02", 100.0), ("2024-01-03", 110.0), ("2024-01-04", 99.0)]);
        let mut f = factors(&[("2024-01-03", 0.1), ("2024-01-04", 0.2)]);
        f[0].mkt = None;
        let table = ReturnBuilder::from_records(&p, &f).unwrap();

        assert_eq!(table.dates(), vec![date("2024-01-04")]);
    }

    #[test]
    fn duplicate_factor_date_is_malformed() {
        let p = prices(&[("2024-01-02", 100.0), ("2024-01-03", 110.0)]);
        let f = factors(&[("2024-01-03", 0.1), ("2024-01-03", 0.2)]);
        assert!(matches!(
            ReturnBuilder::from_records(&p, &f),
            Err(PipelineError::MalformedInput { artifact: Artifact::Factors, .. })
        ));
    }

    #[test]
    fn from_frames_normalized_columns() {
        let prices = TableSchema::PRICES
            .normalize(
                df!(
                    "Date" => &["2024-01-02", "2024-01-03"],
                    "Close" => &["100", "105"],
                )
                .unwrap(),
            )
            .unwrap();
        let factors = TableSchema::FACTORS
            .normalize(
                df!(
                    "Date" => &["2024-01-03"],
                    "mkt" => &["0.25"],
                )
                .unwrap(),
            )
            .unwrap();

        let table = ReturnBuilder::from_frames(&prices, &factors).unwrap();
        assert_eq!(table.len(), 1);
        assert!(close_to(table.rows()[0].ret, 0.05));
        assert_eq!(table.rows()[0].mkt, 0.25);
    }

    #[test]
    fn price_frame_without_close_is_malformed() {
        let prices = df!("date" => &["2024-01-02"], "open" => &["1"]).unwrap();
        let factors = df!("date" => &["2024-01-02"], "mkt" => &["0.1"]).unwrap();
        assert!(matches!(
            ReturnBuilder::from_frames(&prices, &factors),
            Err(PipelineError::MalformedInput { artifact: Artifact::Prices, .. })
        ));
    }
}
