use analysis_core::{AnalysisError, RetryPolicy};
use fundamental_analysis::MetricSet;
use quant_analysis::RiskConfig;

/// Worker count when nothing else is configured.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Settings for one batch run
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub metric_set: MetricSet,
    /// Maximum tickers analyzed at once
    pub concurrency: usize,
    /// Merge risk statistics into each record
    pub include_risk: bool,
    pub risk: RiskConfig,
    pub retry: RetryPolicy,
    /// Decimal places numbers are rounded to in the final table
    pub decimals: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            metric_set: MetricSet::default(),
            concurrency: default_concurrency(),
            include_risk: false,
            risk: RiskConfig::default(),
            retry: RetryPolicy::default(),
            decimals: 4,
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overridden by `ANALYSIS_CONCURRENCY`, `ANALYSIS_METRIC_SET`,
    /// the `RISK_*` variables and the `FETCH_RETRY_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            metric_set: std::env::var("ANALYSIS_METRIC_SET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metric_set),
            concurrency: std::env::var("ANALYSIS_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.concurrency),
            risk: RiskConfig::from_env(),
            retry: RetryPolicy::from_env(),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.concurrency == 0 {
            return Err(AnalysisError::Config("concurrency must be at least 1".to_string()));
        }
        if self.include_risk {
            self.risk.validate()?;
        }
        Ok(())
    }
}
