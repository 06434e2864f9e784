use analysis_core::{
    normalize_ticker, AnalysisError, InfoMap, MarketDataProvider, PriceSeries, Statements,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub mod fixtures;

/// Instruction for how a provider method should behave for a given ticker.
#[derive(Debug, Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value.
    Return(T),
    /// Fail with the provided error.
    Fail(AnalysisError),
}

impl<T: Clone> MockBehavior<T> {
    fn resolve(&self) -> Result<T, AnalysisError> {
        match self {
            MockBehavior::Return(v) => Ok(v.clone()),
            MockBehavior::Fail(e) => Err(e.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TickerRules {
    statements: Option<MockBehavior<Statements>>,
    info: Option<MockBehavior<InfoMap>>,
    prices: Option<MockBehavior<PriceSeries>>,
}

/// In-memory provider serving fixed per-ticker data. Tickers with no rule for
/// a capability answer `NotFound`, like a real provider asked for an unknown
/// symbol.
#[derive(Debug, Default)]
pub struct StaticProvider {
    rules: HashMap<String, TickerRules>,
    statement_calls: AtomicUsize,
    info_calls: AtomicUsize,
    price_calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn rules_mut(&mut self, ticker: &str) -> &mut TickerRules {
        self.rules.entry(normalize_ticker(ticker)).or_default()
    }

    /// Statements and info that are both returned as given.
    pub fn with_company(self, ticker: &str, statements: Statements, info: InfoMap) -> Self {
        self.with_statements(ticker, MockBehavior::Return(statements))
            .with_info(ticker, MockBehavior::Return(info))
    }

    pub fn with_statements(mut self, ticker: &str, behavior: MockBehavior<Statements>) -> Self {
        self.rules_mut(ticker).statements = Some(behavior);
        self
    }

    pub fn with_info(mut self, ticker: &str, behavior: MockBehavior<InfoMap>) -> Self {
        self.rules_mut(ticker).info = Some(behavior);
        self
    }

    pub fn with_prices(mut self, ticker: &str, behavior: MockBehavior<PriceSeries>) -> Self {
        self.rules_mut(ticker).prices = Some(behavior);
        self
    }

    pub fn statement_calls(&self) -> usize {
        self.statement_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    fn lookup<T: Clone>(
        &self,
        ticker: &str,
        pick: impl Fn(&TickerRules) -> Option<&MockBehavior<T>>,
        what: &str,
    ) -> Result<T, AnalysisError> {
        let symbol = normalize_ticker(ticker);
        self.rules
            .get(&symbol)
            .and_then(pick)
            .ok_or_else(|| AnalysisError::NotFound(format!("no {} for {}", what, symbol)))?
            .resolve()
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn financial_statements(&self, ticker: &str) -> Result<Statements, AnalysisError> {
        self.statement_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(ticker, |r| r.statements.as_ref(), "statements")
    }

    async fn company_info(&self, ticker: &str) -> Result<InfoMap, AnalysisError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(ticker, |r| r.info.as_ref(), "info")
    }

    async fn price_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        let series = self.lookup(ticker, |r| r.prices.as_ref(), "price history")?;
        Ok(PriceSeries::new(
            series
                .points
                .into_iter()
                .filter(|p| p.date >= from && p.date <= to)
                .collect(),
        ))
    }
}
