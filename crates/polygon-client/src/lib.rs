use analysis_core::{
    AnalysisError, InfoMap, InfoValue, MarketDataProvider, PricePoint, PriceSeries, ReportingBasis,
    StatementTable, Statements,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";

/// Quarters fetched per statement request; enough for TTM plus a
/// year-over-year comparison.
const FINANCIALS_LIMIT: u32 = 10;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: std::time::Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Need to wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + std::time::Duration::from_millis(50),
                None => std::time::Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Polygon.io REST client. Cloning shares the HTTP connection pool and the
/// rate limiter, so one instance serves a whole batch.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
    timeframe: ReportingBasis,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        // Default 500 req/min for Starter plan.
        // Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let timeframe = std::env::var("POLYGON_TIMEFRAME")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
            timeframe,
        }
    }

    /// Build from `POLYGON_API_KEY`.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let api_key = std::env::var("POLYGON_API_KEY")
            .map_err(|_| AnalysisError::Config("POLYGON_API_KEY must be set".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_timeframe(mut self, timeframe: ReportingBasis) -> Self {
        self.timeframe = timeframe;
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    /// Decode a JSON body, mapping 404 to `NotFound` and other failures to `ApiError`.
    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        what: &str,
        symbol: &str,
    ) -> Result<T, AnalysisError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, what, symbol, &body));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(format!("{} for {}: {}", what, symbol, e)))
    }

    /// Get daily aggregates (bars) for a symbol as a close-price series
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ])
        ).await?;

        let agg_response: AggregateResponse = self.read_json(response, "Aggregates", symbol).await?;
        Ok(price_series_from_aggregates(agg_response.results))
    }

    /// Get company financial statements
    pub async fn get_financials(&self, symbol: &str) -> Result<Statements, AnalysisError> {
        let url = format!("{}/vX/reference/financials", BASE_URL);

        let limit = FINANCIALS_LIMIT.to_string();
        let response = self.send_request(
            self.client.get(&url).query(&[
                ("ticker", symbol),
                ("timeframe", self.timeframe.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("limit", limit.as_str()),
                ("order", "desc"),
                ("sort", "period_of_report_date"),
            ])
        ).await?;

        if is_entitlement_denied(response.status()) {
            tracing::info!(
                "Polygon financials not available for {} (HTTP {}), skipping",
                symbol,
                response.status()
            );
            return Ok(Statements::default());
        }

        let fin_response: FinancialsResponse = self.read_json(response, "Financials", symbol).await?;
        Ok(statements_from_results(fin_response.results, self.timeframe))
    }

    /// Get ticker details
    pub async fn get_ticker_details(&self, symbol: &str) -> Result<TickerDetails, AnalysisError> {
        let url = format!("{}/v3/reference/tickers/{}", BASE_URL, symbol);

        let response = self.send_request(
            self.client.get(&url).query(&[("apiKey", self.api_key.as_str())])
        ).await?;

        let details_response: TickerDetailsResponse = self.read_json(response, "Ticker details", symbol).await?;
        Ok(details_response.results)
    }

    /// Previous trading day's close
    pub async fn get_previous_close(&self, symbol: &str) -> Result<Option<f64>, AnalysisError> {
        let url = format!("{}/v2/aggs/ticker/{}/prev", BASE_URL, symbol);

        let response = self.send_request(
            self.client.get(&url).query(&[("apiKey", self.api_key.as_str()), ("adjusted", "true")])
        ).await?;

        let prev: AggregateResponse = self.read_json(response, "Previous close", symbol).await?;
        Ok(prev.results.first().map(|r| r.c))
    }

    /// Get dividend history for a symbol
    pub async fn get_dividends(&self, symbol: &str, limit: u32) -> Result<Vec<DividendInfo>, AnalysisError> {
        let url = format!("{}/v3/reference/dividends", BASE_URL);

        let limit = limit.to_string();
        let response = self.send_request(
            self.client.get(&url).query(&[
                ("ticker", symbol),
                ("apiKey", self.api_key.as_str()),
                ("limit", limit.as_str()),
                ("order", "desc"),
            ])
        ).await?;

        if is_entitlement_denied(response.status()) {
            return Ok(Vec::new());
        }

        let div_response: DividendResponse = self.read_json(response, "Dividends", symbol).await?;
        Ok(div_response.results)
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn financial_statements(&self, ticker: &str) -> Result<Statements, AnalysisError> {
        self.get_financials(ticker).await
    }

    async fn company_info(&self, ticker: &str) -> Result<InfoMap, AnalysisError> {
        let (details, prev_close, dividends) = tokio::join!(
            self.get_ticker_details(ticker),
            self.get_previous_close(ticker),
            self.get_dividends(ticker, 12),
        );

        merge_company_info(ticker, details, prev_close, dividends, Utc::now().date_naive())
    }

    async fn price_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError> {
        self.get_aggregates(ticker, from, to).await
    }
}

/// Plan-level refusals. Polygon answers these for endpoints outside the
/// subscription; callers treat them as "no data" rather than a failure.
fn is_entitlement_denied(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Error for a non-success response: 404 is `NotFound`, anything else `ApiError`.
fn status_error(status: StatusCode, what: &str, symbol: &str, body: &str) -> AnalysisError {
    if status == StatusCode::NOT_FOUND {
        AnalysisError::NotFound(format!("{} for {}", what, symbol))
    } else {
        AnalysisError::ApiError(format!("{} HTTP {}: {}", what, status, body))
    }
}

/// Info map from the three info sub-requests. Only a ticker-details failure
/// fails the whole lookup; the others are logged and left out.
fn merge_company_info(
    ticker: &str,
    details: Result<TickerDetails, AnalysisError>,
    prev_close: Result<Option<f64>, AnalysisError>,
    dividends: Result<Vec<DividendInfo>, AnalysisError>,
    today: NaiveDate,
) -> Result<InfoMap, AnalysisError> {
    let mut info = info_from_details(&details?);

    match prev_close {
        Ok(Some(price)) => {
            info.insert("currentPrice".to_string(), InfoValue::Number(price));
        }
        Ok(None) => tracing::debug!("No previous close for {}", ticker),
        Err(e) => tracing::warn!("Previous close unavailable for {}: {}", ticker, e),
    }

    match dividends {
        Ok(divs) => {
            if let Some(rate) = trailing_dividend_rate(&divs, today) {
                info.insert("trailingAnnualDividendRate".to_string(), InfoValue::Number(rate));
            }
        }
        Err(e) => tracing::warn!("Dividends unavailable for {}: {}", ticker, e),
    }

    Ok(info)
}

/// Convert financials results into statement tables, most recent period first.
fn statements_from_results(mut results: Vec<FinancialResult>, basis: ReportingBasis) -> Statements {
    results.retain(|r| r.period_end().is_some());
    results.sort_by_key(|r| std::cmp::Reverse(r.period_end()));
    results.dedup_by_key(|r| r.period_end());

    let periods: Vec<NaiveDate> = results.iter().filter_map(FinancialResult::period_end).collect();
    tracing::debug!("Building statements from {} reporting periods", periods.len());

    let balance: Vec<&HashMap<String, LineItem>> = results.iter().map(|r| &r.financials.balance_sheet).collect();
    let income: Vec<&HashMap<String, LineItem>> = results.iter().map(|r| &r.financials.income_statement).collect();
    let cash: Vec<&HashMap<String, LineItem>> = results.iter().map(|r| &r.financials.cash_flow_statement).collect();

    Statements {
        balance_sheet: build_table(&periods, &balance),
        income_statement: build_table(&periods, &income),
        cash_flow: build_table(&periods, &cash),
        basis,
    }
}

/// One row per line-item label, one column per period. Rows follow the
/// provider's `order` field so the table reads like the filed statement.
fn build_table(periods: &[NaiveDate], columns: &[&HashMap<String, LineItem>]) -> StatementTable {
    let mut rows: HashMap<String, (i64, Vec<Option<f64>>)> = HashMap::new();

    for (col, items) in columns.iter().enumerate() {
        for (key, item) in items.iter() {
            let label = item.label.clone().unwrap_or_else(|| key.clone());
            let entry = rows
                .entry(label)
                .or_insert_with(|| (item.order.unwrap_or(i64::MAX), vec![None; periods.len()]));
            entry.1[col] = item.value;
        }
    }

    let mut ordered: Vec<(String, (i64, Vec<Option<f64>>))> = rows.into_iter().collect();
    ordered.sort_by(|a, b| a.1 .0.cmp(&b.1 .0).then_with(|| a.0.cmp(&b.0)));

    let mut table = StatementTable::new(periods.to_vec());
    for (label, (_, values)) in ordered {
        table.insert_row(label, values);
    }
    table
}

fn price_series_from_aggregates(results: Vec<AggregateResult>) -> PriceSeries {
    PriceSeries::new(
        results
            .into_iter()
            .filter_map(|r| {
                let date = DateTime::from_timestamp_millis(r.t)?.date_naive();
                Some(PricePoint { date, close: r.c })
            })
            .collect(),
    )
}

fn info_from_details(details: &TickerDetails) -> InfoMap {
    let mut info = InfoMap::new();
    info.insert("symbol".to_string(), InfoValue::from(details.ticker.as_str()));
    if let Some(name) = &details.name {
        info.insert("shortName".to_string(), InfoValue::from(name.as_str()));
        info.insert("longName".to_string(), InfoValue::from(name.as_str()));
    }
    if let Some(industry) = &details.sic_description {
        info.insert("industry".to_string(), InfoValue::from(industry.as_str()));
    }
    if let Some(exchange) = &details.primary_exchange {
        info.insert("exchange".to_string(), InfoValue::from(exchange.as_str()));
    }
    if let Some(currency) = &details.currency_name {
        info.insert("currency".to_string(), InfoValue::from(currency.to_ascii_uppercase()));
    }
    if let Some(market_cap) = details.market_cap {
        info.insert("marketCap".to_string(), InfoValue::Number(market_cap));
    }
    if let Some(shares) = details.weighted_shares_outstanding.or(details.share_class_shares_outstanding) {
        info.insert("sharesOutstanding".to_string(), InfoValue::Number(shares));
    }
    info
}

/// Sum of cash dividends with an ex-date in the year before `today`.
fn trailing_dividend_rate(dividends: &[DividendInfo], today: NaiveDate) -> Option<f64> {
    let cutoff = today - ChronoDuration::days(365);
    let amounts: Vec<f64> = dividends
        .iter()
        .filter(|d| {
            d.ex_dividend_date
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .is_some_and(|ex| ex > cutoff && ex <= today)
        })
        .filter_map(|d| d.cash_amount)
        .collect();

    if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum())
    }
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    c: f64, // close
}

#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialResult>,
}

#[derive(Debug, Deserialize)]
struct FinancialResult {
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    financials: FinancialStatements,
}

impl FinancialResult {
    fn period_end(&self) -> Option<NaiveDate> {
        self.end_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FinancialStatements {
    #[serde(default)]
    income_statement: HashMap<String, LineItem>,
    #[serde(default)]
    balance_sheet: HashMap<String, LineItem>,
    #[serde(default)]
    cash_flow_statement: HashMap<String, LineItem>,
}

#[derive(Debug, Deserialize)]
struct LineItem {
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    order: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub primary_exchange: Option<String>,
    #[serde(default)]
    pub currency_name: Option<String>,
    #[serde(default)]
    pub sic_description: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub share_class_shares_outstanding: Option<f64>,
    #[serde(default)]
    pub weighted_shares_outstanding: Option<f64>,
}

// Dividend types
#[derive(Debug, Deserialize)]
struct DividendResponse {
    #[serde(default)]
    results: Vec<DividendInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendInfo {
    pub cash_amount: Option<f64>,
    pub ex_dividend_date: Option<String>,
    pub pay_date: Option<String>,
    pub frequency: Option<i32>,
}
