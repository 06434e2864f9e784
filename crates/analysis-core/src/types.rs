use crate::{stats, AnalysisError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Whether statement columns are fiscal quarters or fiscal years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportingBasis {
    #[default]
    Quarterly,
    Annual,
}

impl ReportingBasis {
    pub fn periods_per_year(&self) -> usize {
        match self {
            ReportingBasis::Quarterly => 4,
            ReportingBasis::Annual => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingBasis::Quarterly => "quarterly",
            ReportingBasis::Annual => "annual",
        }
    }
}

impl FromStr for ReportingBasis {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quarterly" | "quarter" | "q" => Ok(ReportingBasis::Quarterly),
            "annual" | "yearly" | "a" => Ok(ReportingBasis::Annual),
            other => Err(AnalysisError::Config(format!("unknown reporting basis '{}'", other))),
        }
    }
}

/// One line item of a financial statement, most recent period first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

impl StatementRow {
    /// A row with no non-null period value carries no information.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.first().copied().flatten()
    }
}

/// A financial statement: line-item rows by reporting-period columns.
///
/// Columns are ordered most recent first. The label set is whatever the
/// provider returned for this ticker, so lookups go through ordered
/// candidate lists rather than a fixed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    periods: Vec<NaiveDate>,
    rows: Vec<StatementRow>,
}

impl StatementTable {
    pub fn new(periods: Vec<NaiveDate>) -> Self {
        Self {
            periods,
            rows: Vec::new(),
        }
    }

    /// Builder-style variant of [`StatementTable::insert_row`].
    pub fn with_row(mut self, label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.insert_row(label, values);
        self
    }

    /// Builder shorthand for rows where every period has a value.
    pub fn with_values(self, label: impl Into<String>, values: &[f64]) -> Self {
        self.with_row(label, values.iter().copied().map(Some).collect())
    }

    /// Insert or replace a row. Values are padded/truncated to the period
    /// count and non-finite numbers are stored as missing.
    pub fn insert_row(&mut self, label: impl Into<String>, mut values: Vec<Option<f64>>) {
        let label = label.into();
        values.resize(self.periods.len(), None);
        for v in values.iter_mut() {
            *v = v.filter(|x| x.is_finite());
        }

        match self.rows.iter_mut().find(|r| r.label == label) {
            Some(existing) => existing.values = values,
            None => self.rows.push(StatementRow { label, values }),
        }
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn latest_period(&self) -> Option<NaiveDate> {
        self.periods.first().copied()
    }

    pub fn rows(&self) -> &[StatementRow] {
        &self.rows
    }

    pub fn row(&self, label: &str) -> Option<&StatementRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.rows.iter().all(StatementRow::is_empty)
    }

    /// First row, in candidate order, that exists and is non-empty.
    ///
    /// First match wins: a later candidate is never preferred because it
    /// happens to have more data.
    pub fn find(&self, candidates: &[&str]) -> Option<&StatementRow> {
        candidates
            .iter()
            .filter_map(|label| self.row(label))
            .find(|row| !row.is_empty())
    }

    /// Most recent value of the first matching candidate label.
    pub fn value_in(&self, candidates: &[&str]) -> Option<f64> {
        self.find(candidates).and_then(StatementRow::latest)
    }

    /// Full period history of the first matching candidate label.
    pub fn series_in(&self, candidates: &[&str]) -> Option<&[Option<f64>]> {
        self.find(candidates).map(|row| row.values.as_slice())
    }
}

/// Scalar from the provider's descriptive key/value blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl InfoValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Bool(b) => write!(f, "{}", b),
            InfoValue::Number(n) => write!(f, "{}", n),
            InfoValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for InfoValue {
    fn from(v: f64) -> Self {
        InfoValue::Number(v)
    }
}

impl From<&str> for InfoValue {
    fn from(v: &str) -> Self {
        InfoValue::Text(v.to_string())
    }
}

impl From<String> for InfoValue {
    fn from(v: String) -> Self {
        InfoValue::Text(v)
    }
}

impl From<bool> for InfoValue {
    fn from(v: bool) -> Self {
        InfoValue::Bool(v)
    }
}

pub type InfoMap = HashMap<String, InfoValue>;

/// The three statement tables for one ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statements {
    pub balance_sheet: StatementTable,
    pub income_statement: StatementTable,
    pub cash_flow: StatementTable,
    pub basis: ReportingBasis,
}

impl Statements {
    pub fn is_empty(&self) -> bool {
        self.balance_sheet.is_empty() && self.income_statement.is_empty() && self.cash_flow.is_empty()
    }
}

/// Everything fetched for one ticker. Built once by the gateway and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFinancials {
    pub ticker: String,
    pub balance_sheet: StatementTable,
    pub income_statement: StatementTable,
    pub cash_flow: StatementTable,
    pub info: InfoMap,
    pub basis: ReportingBasis,
}

impl RawFinancials {
    pub fn empty(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    pub fn from_parts(ticker: &str, statements: Statements, info: InfoMap) -> Self {
        Self {
            ticker: ticker.to_string(),
            balance_sheet: statements.balance_sheet,
            income_statement: statements.income_statement,
            cash_flow: statements.cash_flow,
            info,
            basis: statements.basis,
        }
    }

    pub fn has_statements(&self) -> bool {
        !(self.balance_sheet.is_empty() && self.income_statement.is_empty() && self.cash_flow.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_statements() && self.info.is_empty()
    }
}

/// Daily close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Closing prices, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self { points }
    }

    pub fn from_closes(closes: &[(NaiveDate, f64)]) -> Self {
        Self::new(
            closes
                .iter()
                .map(|&(date, close)| PricePoint { date, close })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Day-over-day simple returns keyed by the later date. The first
    /// observation has no return and is dropped.
    pub fn returns(&self) -> Vec<(NaiveDate, f64)> {
        self.points
            .windows(2)
            .filter_map(|w| {
                let r = (w[1].close - w[0].close) / w[0].close;
                r.is_finite().then_some((w[1].date, r))
            })
            .collect()
    }
}

/// A metric value as it appears in a report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
    Missing,
}

impl MetricValue {
    /// `None` and non-finite numbers both become `Missing`.
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => MetricValue::Number(v),
            _ => MetricValue::Missing,
        }
    }

    pub fn text(value: Option<impl Into<String>>) -> Self {
        value.map_or(MetricValue::Missing, |s| MetricValue::Text(s.into()))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, MetricValue::Missing)
    }

    pub fn rounded(self, decimals: u32) -> Self {
        match self {
            MetricValue::Number(v) => MetricValue::Number(stats::round_to(v, decimals)),
            other => other,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Missing => f.write_str("N/A"),
        }
    }
}

/// Flat metric row for one ticker, columns in catalog order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub ticker: String,
    values: Vec<(String, MetricValue)>,
}

impl MetricRecord {
    pub fn new(ticker: &str, values: Vec<(String, MetricValue)>) -> Self {
        Self {
            ticker: ticker.to_string(),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn values(&self) -> &[(String, MetricValue)] {
        &self.values
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn rounded(self, decimals: u32) -> Self {
        Self {
            ticker: self.ticker,
            values: self
                .values
                .into_iter()
                .map(|(n, v)| (n, v.rounded(decimals)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub ticker: String,
    pub error: String,
}

/// One row of the batch table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchRow {
    Metrics(MetricRecord),
    Error(ErrorRecord),
}

impl BatchRow {
    pub fn error(ticker: &str, error: impl fmt::Display) -> Self {
        BatchRow::Error(ErrorRecord {
            ticker: ticker.to_string(),
            error: error.to_string(),
        })
    }

    pub fn ticker(&self) -> &str {
        match self {
            BatchRow::Metrics(r) => &r.ticker,
            BatchRow::Error(e) => &e.ticker,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BatchRow::Error(_))
    }

    pub fn rounded(self, decimals: u32) -> Self {
        match self {
            BatchRow::Metrics(r) => BatchRow::Metrics(r.rounded(decimals)),
            e => e,
        }
    }
}

/// Result table for a whole run. Row order is completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    rows: Vec<BatchRow>,
}

impl BatchResult {
    pub fn new(rows: Vec<BatchRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[BatchRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, ticker: &str) -> Option<&BatchRow> {
        self.rows.iter().find(|r| r.ticker().eq_ignore_ascii_case(ticker))
    }

    pub fn records(&self) -> impl Iterator<Item = &MetricRecord> {
        self.rows.iter().filter_map(|r| match r {
            BatchRow::Metrics(m) => Some(m),
            BatchRow::Error(_) => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.rows.iter().filter_map(|r| match r {
            BatchRow::Error(e) => Some(e),
            BatchRow::Metrics(_) => None,
        })
    }

    /// Union of metric column names, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in self.records() {
            for name in record.columns() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        columns
    }

    pub fn rounded(self, decimals: u32) -> Self {
        Self {
            rows: self.rows.into_iter().map(|r| r.rounded(decimals)).collect(),
        }
    }

    pub fn sorted_by_ticker(mut self) -> Self {
        self.rows.sort_by(|a, b| a.ticker().cmp(b.ticker()));
        self
    }
}

/// Upper-cased, trimmed ticker symbol.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}
