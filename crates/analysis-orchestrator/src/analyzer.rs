use analysis_core::{AnalysisError, BatchRow, MetricRecord, MetricValue, RawFinancials};
use fundamental_analysis::{labels, FinancialMetrics, MetricCatalog, MetricSet};
use quant_analysis::RiskMetrics;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Turns one ticker's raw data into a batch row.
#[derive(Debug, Clone, Default)]
pub struct StockAnalyzer {
    catalog: MetricCatalog,
}

impl StockAnalyzer {
    pub fn new(catalog: MetricCatalog) -> Self {
        Self { catalog }
    }

    pub fn for_set(set: MetricSet) -> Self {
        Self::new(MetricCatalog::for_set(set))
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Evaluate the catalog for `ticker`. A metric fault or a panic during
    /// evaluation yields an error row; risk columns are appended when given.
    pub fn analyze(&self, ticker: &str, raw: &RawFinancials, risk: Option<&RiskMetrics>) -> BatchRow {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.catalog.evaluate(&FinancialMetrics::new(raw))
        }));

        match outcome {
            Ok(Ok(mut values)) => {
                if let Some(risk) = risk {
                    values.extend(risk.columns());
                }
                BatchRow::Metrics(MetricRecord::new(ticker, values))
            }
            Ok(Err(e)) => {
                tracing::warn!("{}: metric computation failed: {}", ticker, e);
                BatchRow::error(ticker, e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("{}: metric computation panicked: {}", ticker, message);
                BatchRow::error(ticker, AnalysisError::TaskFailed(message))
            }
        }
    }

    /// Descriptive listing for a single ticker: names, the latest period's
    /// headline figures, effective tax rate. A ticker with neither statements
    /// nor info is `InsufficientData`.
    pub fn describe(raw: &RawFinancials) -> Result<Vec<(&'static str, MetricValue)>, AnalysisError> {
        if raw.is_empty() {
            return Err(AnalysisError::InsufficientData(format!(
                "no statements or info for {}",
                raw.ticker
            )));
        }
        let m = FinancialMetrics::new(raw);
        let income = &raw.income_statement;
        let balance = &raw.balance_sheet;

        Ok(vec![
            ("Short Name", MetricValue::text(m.info_text("shortName"))),
            ("Sector", MetricValue::text(m.info_text("sector"))),
            ("Industry", MetricValue::text(m.info_text("industry"))),
            ("End Date", MetricValue::text(m.latest_period().map(|d| d.to_string()))),
            ("Revenue", MetricValue::from_option(income.value_in(labels::REVENUE))),
            ("Operating Income", MetricValue::from_option(income.value_in(labels::OPERATING_INCOME))),
            ("Interest Expense", MetricValue::from_option(income.value_in(labels::INTEREST_EXPENSE))),
            ("Book Value of Equity", MetricValue::from_option(balance.value_in(labels::STOCKHOLDERS_EQUITY))),
            ("Book Value of Debt", MetricValue::from_option(balance.value_in(labels::TOTAL_DEBT))),
            ("Total Liabilities", MetricValue::from_option(balance.value_in(labels::TOTAL_LIABILITIES))),
            ("Cash", MetricValue::from_option(balance.value_in(labels::CASH))),
            ("Short-Term Investments", MetricValue::from_option(balance.value_in(labels::SHORT_TERM_INVESTMENTS))),
            ("Effective Tax Rate", MetricValue::from_option(m.effective_tax_rate()?)),
            ("R&D Expense", MetricValue::from_option(income.value_in(labels::RESEARCH_AND_DEVELOPMENT))),
        ])
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
