use analysis_core::stats::{finite, percentile_value, ratio};
use analysis_core::{AnalysisError, MarketDataProvider, MetricValue, PriceSeries};
use chrono::{Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

const TRADING_DAYS: f64 = 252.0;

/// Risk calculation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub confidence_level: f64,
    /// Annual risk-free rate, e.g. 0.02 for 2%
    pub risk_free_rate: f64,
    pub lookback_days: i64,
    pub benchmark: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            risk_free_rate: 0.02,
            lookback_days: 365,
            benchmark: "SPY".to_string(),
        }
    }
}

impl RiskConfig {
    /// Reads `RISK_CONFIDENCE`, `RISK_FREE_RATE`, `RISK_LOOKBACK_DAYS` and
    /// `RISK_BENCHMARK`, keeping defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            confidence_level: std::env::var("RISK_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.confidence_level),
            risk_free_rate: std::env::var("RISK_FREE_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.risk_free_rate),
            lookback_days: std::env::var("RISK_LOOKBACK_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lookback_days),
            benchmark: std::env::var("RISK_BENCHMARK")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().to_ascii_uppercase())
                .unwrap_or(defaults.benchmark),
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisError::Config(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.lookback_days <= 0 {
            return Err(AnalysisError::Config(format!(
                "lookback must be positive, got {} days",
                self.lookback_days
            )));
        }
        Ok(())
    }
}

/// Tail-risk and risk-adjusted return statistics for one ticker.
/// Every field is missing when it cannot be computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub var_historical: Option<f64>,
    pub var_parametric: Option<f64>,
    pub cvar: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
}

impl RiskMetrics {
    pub fn from_series(
        asset: &PriceSeries,
        benchmark: &PriceSeries,
        config: &RiskConfig,
    ) -> Result<Self, AnalysisError> {
        let dated = asset.returns();
        if dated.is_empty() {
            return Ok(Self::default());
        }
        let returns: Vec<f64> = dated.iter().map(|(_, r)| *r).collect();

        let var_historical = historical_var(&returns, config.confidence_level);
        let (asset_aligned, bench_aligned) = aligned_returns(&dated, &benchmark.returns());
        let (beta, correlation) = beta_and_correlation(&asset_aligned, &bench_aligned);

        Ok(Self {
            var_historical,
            var_parametric: parametric_var(&returns, config.confidence_level)?,
            cvar: var_historical.and_then(|threshold| conditional_var(&returns, threshold)),
            sharpe_ratio: sharpe_ratio(&returns, config.risk_free_rate),
            sortino_ratio: sortino_ratio(&returns, config.risk_free_rate),
            beta,
            correlation,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Named columns merged into a ticker's record.
    pub fn columns(&self) -> Vec<(String, MetricValue)> {
        [
            ("Value at Risk (Historical)", self.var_historical),
            ("Value at Risk (Parametric)", self.var_parametric),
            ("Conditional VaR", self.cvar),
            ("Sharpe Ratio", self.sharpe_ratio),
            ("Sortino Ratio", self.sortino_ratio),
            ("Beta", self.beta),
            ("Market Correlation", self.correlation),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), MetricValue::from_option(value)))
        .collect()
    }
}

/// Empirical return at the `1 - confidence` percentile.
pub fn historical_var(returns: &[f64], confidence: f64) -> Option<f64> {
    percentile_value(returns, (1.0 - confidence) * 100.0)
}

/// `mean - z * sigma` with `z` the standard normal quantile at `confidence`.
pub fn parametric_var(returns: &[f64], confidence: f64) -> Result<Option<f64>, AnalysisError> {
    if returns.len() < 2 {
        return Ok(None);
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| AnalysisError::CalculationError(e.to_string()))?;
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(AnalysisError::CalculationError(format!(
            "confidence level {} outside (0, 1)",
            confidence
        )));
    }
    let z = normal.inverse_cdf(confidence);
    let mean = returns.mean();
    let std_dev = returns.std_dev();
    Ok(finite(mean - z * std_dev))
}

/// Mean of the returns at or below the VaR threshold.
pub fn conditional_var(returns: &[f64], threshold: f64) -> Option<f64> {
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= threshold).collect();
    if tail.is_empty() {
        return None;
    }
    finite(tail.mean())
}

fn daily_risk_free(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / TRADING_DAYS) - 1.0
}

fn excess_returns(returns: &[f64], annual_rate: f64) -> Vec<f64> {
    let daily_rf = daily_risk_free(annual_rate);
    returns.iter().map(|r| r - daily_rf).collect()
}

/// Annualized Sharpe ratio of daily returns.
pub fn sharpe_ratio(returns: &[f64], annual_risk_free: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let excess = excess_returns(returns, annual_risk_free);
    let mean = excess.iter().mean();
    let std_dev = excess.iter().std_dev();
    ratio(Some(mean), Some(std_dev)).map(|s| s * TRADING_DAYS.sqrt())
}

/// Annualized Sortino ratio: downside deviation is the root mean square of
/// the negative excess returns only.
pub fn sortino_ratio(returns: &[f64], annual_risk_free: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let excess = excess_returns(returns, annual_risk_free);
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return None;
    }
    let downside_dev = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
    ratio(Some(excess.iter().mean()), Some(downside_dev)).map(|s| s * TRADING_DAYS.sqrt())
}

/// Pair asset and benchmark returns by date, keeping only common dates.
pub fn aligned_returns(
    asset: &[(NaiveDate, f64)],
    benchmark: &[(NaiveDate, f64)],
) -> (Vec<f64>, Vec<f64>) {
    let bench_by_date: HashMap<NaiveDate, f64> = benchmark.iter().copied().collect();
    asset
        .iter()
        .filter_map(|(date, r)| bench_by_date.get(date).map(|b| (*r, *b)))
        .unzip()
}

/// `cov(asset, bench) / var(bench)` and Pearson correlation.
pub fn beta_and_correlation(asset: &[f64], benchmark: &[f64]) -> (Option<f64>, Option<f64>) {
    if asset.len() != benchmark.len() || asset.len() < 2 {
        return (None, None);
    }

    let covariance = asset.iter().covariance(benchmark.iter());
    let bench_variance = benchmark.iter().variance();
    let asset_std = asset.iter().std_dev();

    let beta = ratio(Some(covariance), Some(bench_variance));
    let correlation = ratio(Some(covariance), Some(asset_std * bench_variance.sqrt()));
    (beta, correlation)
}

type BenchmarkSlot = Arc<OnceCell<PriceSeries>>;

/// Computes [`RiskMetrics`] from provider price history. The benchmark
/// series is fetched once per window and reused across tickers for the
/// lifetime of the calculator, including when the fetch failed.
pub struct RiskMetricsCalculator {
    provider: Arc<dyn MarketDataProvider>,
    config: RiskConfig,
    benchmark_cache: DashMap<(NaiveDate, NaiveDate), BenchmarkSlot>,
}

impl RiskMetricsCalculator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: RiskConfig) -> Self {
        Self {
            provider,
            config,
            benchmark_cache: DashMap::new(),
        }
    }

    /// Risk metrics over the configured lookback ending today.
    pub async fn compute(&self, ticker: &str) -> Result<RiskMetrics, AnalysisError> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(self.config.lookback_days);
        self.compute_between(ticker, from, to).await
    }

    pub async fn compute_between(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RiskMetrics, AnalysisError> {
        let prices = self.provider.price_history(ticker, from, to).await?;
        if prices.len() < 2 {
            tracing::warn!("{}: no price history between {} and {}, risk metrics empty", ticker, from, to);
            return Ok(RiskMetrics::default());
        }

        let benchmark = self.benchmark_prices(from, to).await;
        let metrics = RiskMetrics::from_series(&prices, &benchmark, &self.config)?;
        tracing::debug!(
            "{}: risk over {} closes, VaR {:?}, Sharpe {:?}, beta {:?}",
            ticker,
            prices.len(),
            metrics.var_historical,
            metrics.sharpe_ratio,
            metrics.beta
        );
        Ok(metrics)
    }

    async fn benchmark_prices(&self, from: NaiveDate, to: NaiveDate) -> PriceSeries {
        // The map guard is released before awaiting; concurrent callers wait on the cell.
        let slot = Arc::clone(self.benchmark_cache.entry((from, to)).or_default().value());

        slot.get_or_init(|| async {
            match self.provider.price_history(&self.config.benchmark, from, to).await {
                Ok(series) => series,
                Err(e) => {
                    tracing::warn!("Benchmark {} history unavailable: {}", self.config.benchmark, e);
                    PriceSeries::default()
                }
            }
        })
        .await
        .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use analysis_core::{InfoMap, Statements};
    use async_trait::async_trait;
    use mock_provider::{fixtures, MockBehavior, StaticProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn test_beta_equals_cov_over_var() {
        let bench = [0.010, -0.020, 0.015, 0.005, -0.010, 0.020];
        let noise = [0.001, -0.002, 0.000, 0.003, -0.001, 0.001];
        let asset: Vec<f64> = bench.iter().zip(noise).map(|(b, n)| 1.5 * b + n).collect();

        let (beta, correlation) = beta_and_correlation(&asset, &bench);

        let ma = asset.iter().mean();
        let mb = bench.iter().mean();
        let cov: f64 = asset.iter().zip(bench).map(|(a, b)| (a - ma) * (b - mb)).sum::<f64>() / 5.0;
        let var: f64 = bench.iter().map(|b| (b - mb).powi(2)).sum::<f64>() / 5.0;
        assert_relative_eq!(beta.unwrap(), cov / var, epsilon = 1e-12);
        assert!(correlation.unwrap() > 0.9 && correlation.unwrap() <= 1.0);
    }

    #[test]
    fn test_perfectly_scaled_asset() {
        let bench = [0.01, -0.02, 0.03, 0.00];
        let asset: Vec<f64> = bench.iter().map(|b| 2.0 * b).collect();
        let (beta, correlation) = beta_and_correlation(&asset, &bench);
        assert_relative_eq!(beta.unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(correlation.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_returns_aligned_on_common_dates() {
        let asset = [(day(2), 0.01), (day(3), 0.02), (day(4), 0.03)];
        let bench = [(day(3), -0.01), (day(4), -0.02), (day(5), -0.03)];
        let (a, b) = aligned_returns(&asset, &bench);
        assert_eq!(a, vec![0.02, 0.03]);
        assert_eq!(b, vec![-0.01, -0.02]);
    }

    #[test]
    fn test_sharpe_and_sortino_hand_computed() {
        let returns = [0.01, -0.02, 0.03, 0.00];
        // mean 0.005, sample variance 0.0013 / 3
        let expected_sharpe = 252f64.sqrt() * 0.005 / (0.0013f64 / 3.0).sqrt();
        assert_relative_eq!(sharpe_ratio(&returns, 0.0).unwrap(), expected_sharpe, epsilon = 1e-9);

        // single negative excess return of -0.02
        let expected_sortino = 252f64.sqrt() * 0.005 / 0.02;
        assert_relative_eq!(sortino_ratio(&returns, 0.0).unwrap(), expected_sortino, epsilon = 1e-9);
    }

    #[test]
    fn test_sharpe_with_risk_free_rate() {
        let returns = [0.01, -0.02, 0.03, 0.00];
        let daily_rf = 1.02f64.powf(1.0 / 252.0) - 1.0;
        let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
        let expected = 252f64.sqrt() * excess.iter().mean() / excess.iter().std_dev();
        assert_relative_eq!(sharpe_ratio(&returns, 0.02).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_sortino_without_downside_is_missing() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03], 0.0), None);
        assert_eq!(sharpe_ratio(&[0.01], 0.0), None);
    }

    #[test]
    fn test_var_family() {
        let returns: Vec<f64> = (-10..=10).map(|i| i as f64 / 100.0).collect();

        let var = historical_var(&returns, 0.95).unwrap();
        assert_relative_eq!(var, -0.09, epsilon = 1e-12);
        assert_relative_eq!(conditional_var(&returns, var).unwrap(), -0.095, epsilon = 1e-12);

        let sigma = returns.iter().std_dev();
        let parametric = parametric_var(&returns, 0.95).unwrap().unwrap();
        assert_relative_eq!(parametric, -1.6448536269514722 * sigma, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_series_gives_empty_metrics() {
        let metrics = RiskMetrics::from_series(&PriceSeries::default(), &PriceSeries::default(), &RiskConfig::default()).unwrap();
        assert!(metrics.is_empty());
        assert!(metrics.columns().iter().all(|(_, v)| v.is_missing()));
        assert_eq!(metrics.columns()[0].0, "Value at Risk (Historical)");
    }

    #[test]
    fn test_config_validate() {
        assert!(RiskConfig::default().validate().is_ok());
        let bad = RiskConfig {
            confidence_level: 1.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(AnalysisError::Config(_))));
    }

    fn provider_with_prices() -> StaticProvider {
        let start = day(1);
        StaticProvider::new()
            .with_prices("AAPL", MockBehavior::Return(fixtures::price_walk(start, 30, 100.0, &[0.02, -0.01, 0.015, -0.025])))
            .with_prices("SPY", MockBehavior::Return(fixtures::price_walk(start, 30, 400.0, &[0.01, -0.005, 0.0075, -0.0125])))
            .with_prices("FLAT", MockBehavior::Return(PriceSeries::default()))
    }

    #[tokio::test]
    async fn test_calculator_reuses_benchmark() {
        let provider = Arc::new(provider_with_prices());
        let calculator = RiskMetricsCalculator::new(provider.clone(), RiskConfig::default());

        let first = calculator.compute_between("AAPL", day(1), day(30)).await.unwrap();
        let second = calculator.compute_between("AAPL", day(1), day(30)).await.unwrap();

        assert_eq!(first, second);
        // asset twice, benchmark once
        assert_eq!(provider.price_calls(), 3);
        // asset pattern is exactly twice the benchmark pattern
        assert_relative_eq!(first.beta.unwrap(), 2.0, epsilon = 1e-9);
        assert!(first.var_historical.unwrap() < 0.0);
    }

    #[tokio::test]
    async fn test_calculator_empty_history() {
        let calculator = RiskMetricsCalculator::new(Arc::new(provider_with_prices()), RiskConfig::default());
        let metrics = calculator.compute_between("FLAT", day(1), day(30)).await.unwrap();
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_calculator_missing_benchmark_keeps_other_metrics() {
        let config = RiskConfig {
            benchmark: "QQQ".to_string(),
            ..Default::default()
        };
        let calculator = RiskMetricsCalculator::new(Arc::new(provider_with_prices()), config);
        let metrics = calculator.compute_between("AAPL", day(1), day(30)).await.unwrap();
        assert_eq!(metrics.beta, None);
        assert!(metrics.sharpe_ratio.is_some());
    }

    #[tokio::test]
    async fn test_calculator_unknown_ticker_errors() {
        let calculator = RiskMetricsCalculator::new(Arc::new(provider_with_prices()), RiskConfig::default());
        let result = calculator.compute_between("ZZZZ", day(1), day(30)).await;
        assert!(matches!(result, Err(AnalysisError::NotFound(_))));
    }

    /// Serves fixed closes, with a slow and optionally failing benchmark.
    struct SlowBenchmarkProvider {
        asset: PriceSeries,
        benchmark: Option<PriceSeries>,
        benchmark_calls: AtomicUsize,
    }

    impl SlowBenchmarkProvider {
        fn new(benchmark_available: bool) -> Self {
            Self {
                asset: fixtures::price_walk(day(1), 30, 100.0, &[0.02, -0.01, 0.015, -0.025]),
                benchmark: benchmark_available
                    .then(|| fixtures::price_walk(day(1), 30, 400.0, &[0.01, -0.005, 0.0075, -0.0125])),
                benchmark_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for SlowBenchmarkProvider {
        async fn financial_statements(&self, ticker: &str) -> Result<Statements, AnalysisError> {
            Err(AnalysisError::NotFound(ticker.to_string()))
        }

        async fn company_info(&self, ticker: &str) -> Result<InfoMap, AnalysisError> {
            Err(AnalysisError::NotFound(ticker.to_string()))
        }

        async fn price_history(&self, ticker: &str, _: NaiveDate, _: NaiveDate) -> Result<PriceSeries, AnalysisError> {
            if ticker != "SPY" {
                return Ok(self.asset.clone());
            }
            self.benchmark_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.benchmark
                .clone()
                .ok_or_else(|| AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_tickers_share_one_benchmark_fetch() {
        let provider = Arc::new(SlowBenchmarkProvider::new(true));
        let calculator = RiskMetricsCalculator::new(provider.clone(), RiskConfig::default());

        let (a, b, c, d) = tokio::join!(
            calculator.compute_between("AAPL", day(1), day(30)),
            calculator.compute_between("MSFT", day(1), day(30)),
            calculator.compute_between("NVDA", day(1), day(30)),
            calculator.compute_between("AMZN", day(1), day(30)),
        );

        assert_eq!(provider.benchmark_calls.load(Ordering::SeqCst), 1);
        for metrics in [a, b, c, d] {
            assert_relative_eq!(metrics.unwrap().beta.unwrap(), 2.0, epsilon = 1e-9);
        }
    }

    #[tokio::test]
    async fn test_failed_benchmark_is_not_refetched() {
        let provider = Arc::new(SlowBenchmarkProvider::new(false));
        let calculator = Arc::new(RiskMetricsCalculator::new(provider.clone(), RiskConfig::default()));

        let mut tasks = tokio::task::JoinSet::new();
        for ticker in ["AAPL", "MSFT", "NVDA"] {
            let calculator = Arc::clone(&calculator);
            tasks.spawn(async move { calculator.compute_between(ticker, day(1), day(30)).await });
        }
        while let Some(joined) = tasks.join_next().await {
            let metrics = joined.unwrap().unwrap();
            assert_eq!(metrics.beta, None);
            assert!(metrics.var_historical.is_some());
        }
        let later = calculator.compute_between("TSLA", day(1), day(30)).await.unwrap();

        assert_eq!(later.beta, None);
        assert_eq!(provider.benchmark_calls.load(Ordering::SeqCst), 1);
    }
}
