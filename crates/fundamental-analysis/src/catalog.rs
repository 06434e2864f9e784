use crate::format::format_large_number;
use crate::metrics::{FinancialMetrics, MetricResult};
use analysis_core::{AnalysisError, MetricValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type NumberFn = fn(&FinancialMetrics<'_>) -> MetricResult;
pub type TextFn = fn(&FinancialMetrics<'_>) -> Result<Option<String>, AnalysisError>;

/// How a metric is rendered in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// Plain number.
    Ratio,
    /// Number rendered with a B/M suffix.
    Magnitude,
    Text,
}

#[derive(Clone, Copy)]
enum Compute {
    Number(NumberFn),
    Text(TextFn),
}

/// One named entry of the catalog.
#[derive(Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub kind: MetricKind,
    compute: Compute,
}

impl fmt::Debug for MetricDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl MetricDef {
    pub fn ratio(name: &'static str, compute: NumberFn) -> Self {
        Self {
            name,
            kind: MetricKind::Ratio,
            compute: Compute::Number(compute),
        }
    }

    pub fn magnitude(name: &'static str, compute: NumberFn) -> Self {
        Self {
            name,
            kind: MetricKind::Magnitude,
            compute: Compute::Number(compute),
        }
    }

    pub fn text(name: &'static str, compute: TextFn) -> Self {
        Self {
            name,
            kind: MetricKind::Text,
            compute: Compute::Text(compute),
        }
    }

    pub fn evaluate(&self, metrics: &FinancialMetrics<'_>) -> Result<MetricValue, AnalysisError> {
        Ok(match self.compute {
            Compute::Number(f) => {
                let value = f(metrics)?;
                match self.kind {
                    MetricKind::Magnitude => MetricValue::text(value.filter(|v| v.is_finite()).map(format_large_number)),
                    _ => MetricValue::from_option(value),
                }
            }
            Compute::Text(f) => MetricValue::text(f(metrics)?),
        })
    }
}

/// Selectable column sets for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSet {
    /// Quality and valuation snapshot.
    #[default]
    Compact,
    /// Compact set led by price, P/E and EPS.
    Default,
    /// Growth and quality.
    Growth,
    /// Every metric in the catalog.
    Full,
}

impl MetricSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricSet::Compact => "compact",
            MetricSet::Default => "default",
            MetricSet::Growth => "growth",
            MetricSet::Full => "full",
        }
    }

    fn names(&self) -> &'static [&'static str] {
        match self {
            MetricSet::Compact => COMPACT,
            MetricSet::Default => DEFAULT,
            MetricSet::Growth => GROWTH,
            MetricSet::Full => FULL,
        }
    }
}

impl FromStr for MetricSet {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "first" => Ok(MetricSet::Compact),
            "default" => Ok(MetricSet::Default),
            "growth" => Ok(MetricSet::Growth),
            "full" | "all" => Ok(MetricSet::Full),
            other => Err(AnalysisError::Config(format!(
                "unknown metric set '{}' (expected compact, default, growth or full)",
                other
            ))),
        }
    }
}

impl fmt::Display for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMPACT: &[&str] = &[
    "Industry",
    "DE Ratio",
    "ROE",
    "Earnings Yield",
    "Dividend Yield",
    "Current Ratio",
    "PE to Growth",
    "Price to Book",
    "Price to Sales (P/S)",
    "EV/EBITDA",
    "Price to Free Cash Flow",
    "Curr Liabilities",
    "Total Liabilities",
    "Curr Assets",
    "Total Stockholder Equity",
    "Total Shares Outstanding",
    "Book Value Per Share",
    "Payout Ratio",
    "Beta (Volatility)",
    "Institutional Ownership",
    "Insider Buying/Selling",
    "Asset Turnover Ratio",
    "Free Cash Flow",
];

const DEFAULT: &[&str] = &[
    "Stock Price",
    "PE Ratio",
    "EPS",
    "DE Ratio",
    "ROE",
    "Earnings Yield",
    "Dividend Yield",
    "Current Ratio",
    "PE to Growth",
    "Price to Book",
    "Price to Sales (P/S)",
    "EV/EBITDA",
    "Price to Free Cash Flow",
    "Curr Liabilities",
    "Total Liabilities",
    "Curr Assets",
    "Total Stockholder Equity",
    "Total Shares Outstanding",
    "Book Value Per Share",
    "Payout Ratio",
    "Beta (Volatility)",
    "Institutional Ownership",
    "Insider Buying/Selling",
    "Asset Turnover Ratio",
];

const GROWTH: &[&str] = &[
    "Short Name",
    "Industry",
    "Revenue Growth (YoY)",
    "Revenue Growth (QoQ)",
    "EPS Growth (YoY)",
    "EPS Growth (QoQ)",
    "FCF Growth (YoY)",
    "FCF Growth (QoQ)",
    "Gross Margin",
    "Operating Margin",
    "Net Profit Margin",
    "ROE",
    "ROIC",
    "Sustainable Growth Rate",
    "PE to Growth",
    "Altman Z-Score",
];

const FULL: &[&str] = &[
    "Short Name",
    "Sector",
    "Industry",
    "Stock Price",
    "Market Cap",
    "Enterprise Value",
    "Revenue",
    "Operating Income",
    "Net Income",
    "EPS",
    "PE Ratio",
    "Earnings Yield",
    "PE to Growth",
    "Price to Book",
    "Price to Sales (P/S)",
    "Price to Free Cash Flow",
    "EV/EBITDA",
    "Gross Margin",
    "Operating Margin",
    "Net Profit Margin",
    "ROA",
    "ROE",
    "ROIC",
    "Effective Tax Rate",
    "Asset Turnover Ratio",
    "DE Ratio",
    "Current Ratio",
    "Interest Coverage",
    "Curr Assets",
    "Curr Liabilities",
    "Total Assets",
    "Total Liabilities",
    "Total Stockholder Equity",
    "Total Shares Outstanding",
    "Book Value Per Share",
    "Free Cash Flow",
    "Dividend Yield",
    "Payout Ratio",
    "Sustainable Growth Rate",
    "Beta (Volatility)",
    "Institutional Ownership",
    "Insider Buying/Selling",
    "Revenue Growth (YoY)",
    "Revenue Growth (QoQ)",
    "EPS Growth (YoY)",
    "EPS Growth (QoQ)",
    "FCF Growth (YoY)",
    "FCF Growth (QoQ)",
    "Altman Z-Score",
];

/// Every metric the extraction layer knows how to compute.
fn registry() -> Vec<MetricDef> {
    vec![
        MetricDef::text("Short Name", |m| Ok(m.info_text("shortName"))),
        MetricDef::text("Sector", |m| Ok(m.info_text("sector"))),
        MetricDef::text("Industry", |m| Ok(m.info_text("industry"))),
        MetricDef::ratio("Stock Price", |m| m.stock_price()),
        MetricDef::magnitude("Market Cap", |m| m.market_cap()),
        MetricDef::magnitude("Enterprise Value", |m| m.enterprise_value()),
        MetricDef::magnitude("Revenue", |m| m.revenue()),
        MetricDef::magnitude("Operating Income", |m| m.operating_income()),
        MetricDef::magnitude("Net Income", |m| m.net_income()),
        MetricDef::ratio("EPS", |m| m.eps()),
        MetricDef::ratio("PE Ratio", |m| m.pe_ratio()),
        MetricDef::ratio("Earnings Yield", |m| m.earnings_yield()),
        MetricDef::ratio("PE to Growth", |m| m.peg_ratio()),
        MetricDef::ratio("Price to Book", |m| m.price_to_book()),
        MetricDef::ratio("Price to Sales (P/S)", |m| m.price_to_sales()),
        MetricDef::ratio("Price to Free Cash Flow", |m| m.price_to_free_cash_flow()),
        MetricDef::ratio("EV/EBITDA", |m| m.ev_to_ebitda()),
        MetricDef::ratio("Gross Margin", |m| m.gross_margin()),
        MetricDef::ratio("Operating Margin", |m| m.operating_margin()),
        MetricDef::ratio("Net Profit Margin", |m| m.net_profit_margin()),
        MetricDef::ratio("ROA", |m| m.roa()),
        MetricDef::ratio("ROE", |m| m.roe()),
        MetricDef::ratio("ROIC", |m| m.roic()),
        MetricDef::ratio("Effective Tax Rate", |m| m.effective_tax_rate()),
        MetricDef::ratio("Asset Turnover Ratio", |m| m.asset_turnover()),
        MetricDef::ratio("DE Ratio", |m| m.debt_to_equity()),
        MetricDef::ratio("Current Ratio", |m| m.current_ratio()),
        MetricDef::ratio("Interest Coverage", |m| m.interest_coverage()),
        MetricDef::magnitude("Curr Assets", |m| m.current_assets()),
        MetricDef::magnitude("Curr Liabilities", |m| m.current_liabilities()),
        MetricDef::magnitude("Total Assets", |m| m.total_assets()),
        MetricDef::magnitude("Total Liabilities", |m| m.total_liabilities()),
        MetricDef::magnitude("Total Stockholder Equity", |m| m.total_equity()),
        MetricDef::magnitude("Total Shares Outstanding", |m| m.shares_outstanding()),
        MetricDef::ratio("Book Value Per Share", |m| m.book_value_per_share()),
        MetricDef::ratio("Free Cash Flow", |m| m.free_cash_flow()),
        MetricDef::ratio("Dividend Yield", |m| m.dividend_yield()),
        MetricDef::ratio("Payout Ratio", |m| m.payout_ratio()),
        MetricDef::ratio("Sustainable Growth Rate", |m| m.sustainable_growth_rate()),
        MetricDef::ratio("Beta (Volatility)", |m| m.beta()),
        MetricDef::ratio("Institutional Ownership", |m| m.institutional_ownership()),
        MetricDef::ratio("Insider Buying/Selling", |m| m.insider_ownership()),
        MetricDef::ratio("Revenue Growth (YoY)", |m| m.revenue_growth_yoy()),
        MetricDef::ratio("Revenue Growth (QoQ)", |m| m.revenue_growth_qoq()),
        MetricDef::ratio("EPS Growth (YoY)", |m| m.eps_growth_yoy()),
        MetricDef::ratio("EPS Growth (QoQ)", |m| m.eps_growth_qoq()),
        MetricDef::ratio("FCF Growth (YoY)", |m| m.fcf_growth_yoy()),
        MetricDef::ratio("FCF Growth (QoQ)", |m| m.fcf_growth_qoq()),
        MetricDef::ratio("Altman Z-Score", |m| m.altman_z_score()),
    ]
}

/// Ordered list of metrics evaluated for every ticker.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    metrics: Vec<MetricDef>,
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::for_set(MetricSet::default())
    }
}

impl MetricCatalog {
    pub fn empty() -> Self {
        Self { metrics: Vec::new() }
    }

    pub fn for_set(set: MetricSet) -> Self {
        let registry = registry();
        let metrics = set
            .names()
            .iter()
            .filter_map(|name| registry.iter().find(|def| def.name == *name).copied())
            .collect();
        Self { metrics }
    }

    /// Append a metric, or replace the one with the same name in place.
    pub fn with_metric(mut self, def: MetricDef) -> Self {
        match self.metrics.iter_mut().find(|m| m.name == def.name) {
            Some(existing) => *existing = def,
            None => self.metrics.push(def),
        }
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.metrics.retain(|m| m.name != name);
        self
    }

    pub fn metrics(&self) -> &[MetricDef] {
        &self.metrics
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.name).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Evaluate every metric in order. The first fault aborts the record.
    pub fn evaluate(&self, metrics: &FinancialMetrics<'_>) -> Result<Vec<(String, MetricValue)>, AnalysisError> {
        let mut values = Vec::with_capacity(self.metrics.len());
        for def in &self.metrics {
            let value = def.evaluate(metrics).map_err(|e| {
                tracing::debug!("{}: metric '{}' failed: {}", metrics.ticker(), def.name, e);
                e
            })?;
            values.push((def.name.to_string(), value));
        }
        Ok(values)
    }
}
