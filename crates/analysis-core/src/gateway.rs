//! Data access gateway: the only place that talks to a [`MarketDataProvider`].
//!
//! Provider failures never escape this module. A ticker that cannot be
//! resolved, a transport error and a malformed payload all come back as a
//! [`RawFinancials`] with empty tables, which the extraction layer turns into
//! missing metrics.

use crate::{normalize_ticker, AnalysisError, InfoMap, MarketDataProvider, RawFinancials, Statements};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fixed-delay re-fetch when a provider answers with no statement data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-fetches after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Reads `FETCH_RETRY_ATTEMPTS` and `FETCH_RETRY_DELAY_MS`, falling back
    /// to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_retries = std::env::var("FETCH_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);
        let delay = std::env::var("FETCH_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.delay);

        Self { max_retries, delay }
    }
}

#[derive(Clone)]
pub struct FinanceClient {
    provider: Arc<dyn MarketDataProvider>,
    retry: RetryPolicy,
}

impl FinanceClient {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch statements and info for one ticker. Never fails.
    pub async fn fetch(&self, ticker: &str) -> RawFinancials {
        let symbol = normalize_ticker(ticker);
        let (statements, info) = tokio::join!(self.fetch_statements(&symbol), self.fetch_info(&symbol));

        tracing::debug!(
            "Fetched {}: balance_sheet={} rows, income_statement={} rows, cash_flow={} rows, info={} keys",
            symbol,
            statements.balance_sheet.rows().len(),
            statements.income_statement.rows().len(),
            statements.cash_flow.rows().len(),
            info.len()
        );

        RawFinancials::from_parts(&symbol, statements, info)
    }

    /// Fetch every ticker over the shared provider session, at most
    /// `concurrency` at a time. Lookups on the returned batch are independent
    /// per ticker.
    pub async fn fetch_batch(&self, tickers: &[String], concurrency: usize) -> TickerBatch {
        let mut symbols: Vec<String> = tickers.iter().map(|t| normalize_ticker(t)).collect();
        symbols.sort();
        symbols.dedup();

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for symbol in symbols {
            let client = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (symbol.clone(), RawFinancials::empty(&symbol));
                };
                let raw = client.fetch(&symbol).await;
                (symbol, raw)
            });
        }

        let mut data = HashMap::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((symbol, raw)) => {
                    data.insert(symbol, raw);
                }
                Err(e) => tracing::error!("Batch fetch task error: {}", e),
            }
        }

        tracing::info!("Batch fetch complete: {} tickers", data.len());
        TickerBatch { data }
    }

    async fn fetch_statements(&self, symbol: &str) -> Statements {
        let mut attempt = 0;
        loop {
            let statements = match self.provider.financial_statements(symbol).await {
                Ok(statements) => statements,
                Err(AnalysisError::NotFound(msg)) => {
                    tracing::warn!("{} not found by provider: {}", symbol, msg);
                    return Statements::default();
                }
                Err(e) => {
                    tracing::error!("Error fetching statements for {}: {}", symbol, e);
                    Statements::default()
                }
            };

            if !statements.is_empty() {
                return statements;
            }
            if attempt >= self.retry.max_retries {
                tracing::warn!("No statement data for {} after {} attempts", symbol, attempt + 1);
                return statements;
            }

            attempt += 1;
            tracing::warn!(
                "Empty statements for {}, retrying in {:?} ({}/{})",
                symbol,
                self.retry.delay,
                attempt,
                self.retry.max_retries
            );
            tokio::time::sleep(self.retry.delay).await;
        }
    }

    async fn fetch_info(&self, symbol: &str) -> InfoMap {
        match self.provider.company_info(symbol).await {
            Ok(info) => info,
            Err(e) => {
                tracing::error!("Error fetching info for {}: {}", symbol, e);
                InfoMap::new()
            }
        }
    }
}

/// Per-run result of [`FinanceClient::fetch_batch`]
#[derive(Debug, Clone, Default)]
pub struct TickerBatch {
    data: HashMap<String, RawFinancials>,
}

impl TickerBatch {
    /// Data for `ticker`, or an empty record if it was not part of the batch.
    pub fn get(&self, ticker: &str) -> RawFinancials {
        let symbol = normalize_ticker(ticker);
        match self.data.get(&symbol) {
            Some(raw) => raw.clone(),
            None => {
                tracing::error!("Ticker {} not found in batch.", symbol);
                RawFinancials::empty(&symbol)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
