use async_trait::async_trait;
use chrono::NaiveDate;
use crate::{AnalysisError, InfoMap, PriceSeries, Statements};

/// Trait for remote market-data providers.
///
/// Implementations may return empty tables, fail on unknown tickers, or rename
/// line items between periods; callers go through [`crate::FinanceClient`]
/// which absorbs all of that.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Balance sheet, income statement and cash flow, most recent period first.
    async fn financial_statements(&self, ticker: &str) -> Result<Statements, AnalysisError>;

    /// Descriptive key/value blob (name, industry, market cap, price, ...).
    async fn company_info(&self, ticker: &str) -> Result<InfoMap, AnalysisError>;

    /// Daily closes between `from` and `to`, inclusive.
    async fn price_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError>;
}
