use analysis_core::{
    normalize_ticker, AnalysisError, BatchResult, BatchRow, FinanceClient, MarketDataProvider, MetricValue,
};
use fundamental_analysis::MetricCatalog;
use quant_analysis::RiskMetricsCalculator;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub mod analyzer;
pub mod config;

pub use analyzer::StockAnalyzer;
pub use config::{default_concurrency, AnalyzerConfig};

/// Descriptive listing for one ticker, or the fault that prevented it.
pub type Description = Result<Vec<(&'static str, MetricValue)>, AnalysisError>;

/// Runs [`StockAnalyzer`] over many tickers on a bounded pool of tasks.
pub struct MultiStockAnalyzer {
    client: FinanceClient,
    analyzer: Arc<StockAnalyzer>,
    risk: Option<Arc<RiskMetricsCalculator>>,
    concurrency: usize,
    decimals: u32,
}

impl MultiStockAnalyzer {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: AnalyzerConfig) -> Self {
        let client = FinanceClient::new(Arc::clone(&provider)).with_retry(config.retry);
        let risk = config
            .include_risk
            .then(|| Arc::new(RiskMetricsCalculator::new(provider, config.risk.clone())));

        Self {
            client,
            analyzer: Arc::new(StockAnalyzer::for_set(config.metric_set)),
            risk,
            concurrency: config.concurrency.max(1),
            decimals: config.decimals,
        }
    }

    /// Replace the metric catalog chosen by the config's metric set.
    pub fn with_catalog(mut self, catalog: MetricCatalog) -> Self {
        self.analyzer = Arc::new(StockAnalyzer::new(catalog));
        self
    }

    /// Fetch and analyze a single ticker.
    pub async fn analyze_ticker(&self, ticker: &str) -> BatchRow {
        let symbol = normalize_ticker(ticker);
        let row = analyze_one(&self.client, &self.analyzer, self.risk.as_deref(), &symbol).await;
        row.rounded(self.decimals)
    }

    /// Analyze every ticker, one task each, at most `concurrency` at a time.
    ///
    /// The result has exactly one row per distinct requested ticker, in
    /// completion order. A ticker's failure never affects the others.
    pub async fn analyze_all(&self, tickers: &[String]) -> BatchResult {
        let requested = dedupe_tickers(tickers);
        let total = requested.len();
        tracing::info!("Analyzing {} tickers with {} workers", total, self.concurrency);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for ticker in requested.iter().cloned() {
            let client = self.client.clone();
            let analyzer = Arc::clone(&self.analyzer);
            let risk = self.risk.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return BatchRow::error(&ticker, AnalysisError::TaskFailed(e.to_string())),
                };
                analyze_one(&client, &analyzer, risk.as_deref(), &ticker).await
            });
        }

        let mut rows: Vec<BatchRow> = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(row) => {
                    if row.is_error() {
                        tracing::warn!("[{}/{}] {} failed", rows.len() + 1, total, row.ticker());
                    } else {
                        tracing::info!("[{}/{}] {} done", rows.len() + 1, total, row.ticker());
                    }
                    rows.push(row);
                }
                Err(e) => tracing::error!("Analysis task error: {}", e),
            }
        }

        for ticker in &requested {
            if !rows.iter().any(|r| r.ticker() == ticker) {
                rows.push(BatchRow::error(
                    ticker,
                    AnalysisError::TaskFailed("analysis task did not complete".to_string()),
                ));
            }
        }

        let result = BatchResult::new(rows).rounded(self.decimals);
        tracing::info!(
            "Batch complete: {} records, {} errors",
            result.records().count(),
            result.errors().count()
        );
        result
    }

    /// Descriptive listing per ticker over one batch fetch, in request order.
    pub async fn describe_all(&self, tickers: &[String]) -> Vec<(String, Description)> {
        let requested = dedupe_tickers(tickers);
        let batch = self.client.fetch_batch(&requested, self.concurrency).await;

        requested
            .into_iter()
            .map(|ticker| {
                let raw = batch.get(&ticker);
                let description = StockAnalyzer::describe(&raw);
                (ticker, description)
            })
            .collect()
    }
}

async fn analyze_one(
    client: &FinanceClient,
    analyzer: &StockAnalyzer,
    risk: Option<&RiskMetricsCalculator>,
    ticker: &str,
) -> BatchRow {
    let raw = client.fetch(ticker).await;
    if !raw.has_statements() {
        tracing::warn!("{}: no statement data, statement metrics will be missing", ticker);
    }

    let risk_metrics = match risk {
        Some(calculator) => match calculator.compute(ticker).await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                tracing::warn!("{}: risk metrics skipped: {}", ticker, e);
                None
            }
        },
        None => None,
    };

    analyzer.analyze(ticker, &raw, risk_metrics.as_ref())
}

/// Normalized tickers, first occurrence kept, blanks dropped.
fn dedupe_tickers(tickers: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let symbol = normalize_ticker(ticker);
        if !symbol.is_empty() && !seen.contains(&symbol) {
            seen.push(symbol);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{RetryPolicy, Statements};
    use chrono::{Duration, Utc};
    use fundamental_analysis::{MetricDef, MetricSet};
    use mock_provider::{fixtures, MockBehavior, StaticProvider};

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn provider(list: &[&str]) -> StaticProvider {
        list.iter().fold(StaticProvider::new(), |p, t| {
            let (statements, info) = fixtures::sample_company(t);
            p.with_company(t, statements, info)
        })
    }

    fn config(concurrency: usize) -> AnalyzerConfig {
        AnalyzerConfig {
            concurrency,
            retry: RetryPolicy::none(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_faulty_ticker() {
        let symbols = ["AAA", "BBB", "KKK", "DDD", "EEE"];
        let catalog = MetricCatalog::for_set(MetricSet::Compact).with_metric(MetricDef::ratio("Fragile", |m| {
            if m.ticker() == "KKK" {
                Err(AnalysisError::CalculationError("unexpected statement layout".to_string()))
            } else {
                Ok(Some(1.0))
            }
        }));
        let multi = MultiStockAnalyzer::new(Arc::new(provider(&symbols)), config(2)).with_catalog(catalog);

        let result = multi.analyze_all(&tickers(&symbols)).await;

        assert_eq!(result.len(), 5);
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].ticker, "KKK");
        assert_eq!(result.records().count(), 4);
    }

    #[tokio::test]
    async fn test_panicking_ticker_is_isolated() {
        let symbols = ["AAA", "PPP", "CCC"];
        let catalog = MetricCatalog::empty().with_metric(MetricDef::ratio("Fragile", |m| {
            if m.ticker() == "PPP" {
                panic!("slice index out of range");
            }
            Ok(None)
        }));
        let multi = MultiStockAnalyzer::new(Arc::new(provider(&symbols)), config(3)).with_catalog(catalog);

        let result = multi.analyze_all(&tickers(&symbols)).await;
        assert_eq!(result.len(), 3);
        assert!(result.get("PPP").unwrap().is_error());
        assert!(!result.get("AAA").unwrap().is_error());
    }

    #[tokio::test]
    async fn test_one_row_per_distinct_ticker() {
        let multi = MultiStockAnalyzer::new(Arc::new(provider(&["AAPL"])), config(1));
        let result = multi
            .analyze_all(&tickers(&["AAPL", "aapl", "UNKNOWN", " "]))
            .await;

        assert_eq!(result.len(), 2);
        // Unknown tickers come back as records full of missing values
        let Some(BatchRow::Metrics(unknown)) = result.get("UNKNOWN") else {
            panic!("expected metrics row for UNKNOWN");
        };
        assert!(unknown.values().iter().all(|(_, v)| v.is_missing()));
    }

    #[tokio::test]
    async fn test_numbers_rounded_to_four_places() {
        let catalog = MetricCatalog::empty().with_metric(MetricDef::ratio("Precise", |_| Ok(Some(0.123456789))));
        let multi = MultiStockAnalyzer::new(Arc::new(provider(&["AAPL"])), config(1)).with_catalog(catalog);

        let row = multi.analyze_ticker("aapl").await;
        let BatchRow::Metrics(record) = row else {
            panic!("expected metrics row");
        };
        assert_eq!(record.ticker, "AAPL");
        assert_eq!(record.get("Precise"), Some(&MetricValue::Number(0.1235)));
    }

    #[tokio::test]
    async fn test_risk_failure_is_skipped_not_escalated() {
        let start = Utc::now().date_naive() - Duration::days(60);
        let provider = provider(&["AAPL", "MSFT"])
            .with_prices("AAPL", MockBehavior::Return(fixtures::price_walk(start, 60, 100.0, &[0.02, -0.01, 0.005])))
            .with_prices("SPY", MockBehavior::Return(fixtures::price_walk(start, 60, 400.0, &[0.01, -0.005, 0.0025])))
            .with_prices("MSFT", MockBehavior::Fail(AnalysisError::ApiError("HTTP 500".to_string())));
        let config = AnalyzerConfig {
            include_risk: true,
            ..config(2)
        };
        let multi = MultiStockAnalyzer::new(Arc::new(provider), config);

        let result = multi.analyze_all(&tickers(&["AAPL", "MSFT"])).await;

        let Some(BatchRow::Metrics(aapl)) = result.get("AAPL") else {
            panic!("expected metrics row for AAPL");
        };
        assert!(aapl.get("Sharpe Ratio").is_some());
        assert!(matches!(aapl.get("Beta"), Some(MetricValue::Number(_))));

        let Some(BatchRow::Metrics(msft)) = result.get("MSFT") else {
            panic!("expected metrics row for MSFT");
        };
        assert!(msft.get("Sharpe Ratio").is_none());
        assert!(msft.get("DE Ratio").is_some());
    }

    #[tokio::test]
    async fn test_statement_fault_still_reports_info_metrics() {
        let (_, info) = fixtures::sample_company("AAPL");
        let provider = StaticProvider::new()
            .with_statements("AAPL", MockBehavior::Fail(AnalysisError::ApiError("timeout".to_string())))
            .with_info("AAPL", MockBehavior::Return(info));
        let multi = MultiStockAnalyzer::new(Arc::new(provider), config(1));

        let BatchRow::Metrics(record) = multi.analyze_ticker("AAPL").await else {
            panic!("expected metrics row");
        };
        assert_eq!(record.get("Beta (Volatility)"), Some(&MetricValue::Number(1.2)));
        assert_eq!(record.get("DE Ratio"), Some(&MetricValue::Missing));
    }

    #[tokio::test]
    async fn test_describe_all_in_request_order() {
        let provider = provider(&["MSFT", "AAPL"]).with_statements("EMPTY", MockBehavior::Return(Statements::default()));
        let multi = MultiStockAnalyzer::new(Arc::new(provider), config(2));

        let listings = multi.describe_all(&tickers(&["msft", "AAPL", "EMPTY"])).await;

        let order: Vec<&str> = listings.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(order, vec!["MSFT", "AAPL", "EMPTY"]);
        let (_, empty) = &listings[2];
        assert!(matches!(empty, Err(AnalysisError::InsufficientData(_))));
    }
}
