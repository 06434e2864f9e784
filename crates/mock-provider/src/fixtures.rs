//! Deterministic sample data shaped like a large-cap filer's quarterly
//! statements. Values are in dollars; share counts in shares.

use analysis_core::{
    InfoMap, InfoValue, PricePoint, PriceSeries, ReportingBasis, StatementTable, Statements,
};
use chrono::{Duration, NaiveDate};

const MILLION: f64 = 1_000_000.0;

/// Quarter-end dates, most recent first.
pub fn quarter_ends(count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let (mut year, mut month) = (2024, 12);
    for _ in 0..count {
        let last_day = match month {
            3 | 12 => 31,
            _ => 30,
        };
        dates.push(NaiveDate::from_ymd_opt(year, month, last_day).unwrap_or_default());
        if month == 3 {
            year -= 1;
            month = 12;
        } else {
            month -= 3;
        }
    }
    dates
}

/// Eight quarters of statements plus a matching info blob.
///
/// Revenue grows by 1,000M each quarter (91,000M oldest, 98,000M latest) and
/// every other income line is a fixed fraction of revenue, so derived ratios
/// are easy to check by hand.
pub fn sample_company(ticker: &str) -> (Statements, InfoMap) {
    let periods = quarter_ends(8);
    let revenue: Vec<f64> = (0..8).map(|i| (98_000.0 - 1_000.0 * i as f64) * MILLION).collect();
    let scaled = |factor: f64| -> Vec<f64> { revenue.iter().map(|r| r * factor).collect() };
    let flat = |value: f64| -> Vec<f64> { vec![value * MILLION; 8] };

    let operating_income = scaled(0.30);
    let net_income = scaled(0.25);
    let diluted_eps: Vec<f64> = net_income.iter().map(|n| n / (15_000.0 * MILLION)).collect();
    let ebitda: Vec<f64> = operating_income.iter().map(|o| o + 3_000.0 * MILLION).collect();

    let income_statement = StatementTable::new(periods.clone())
        .with_values("Total Revenue", &revenue)
        .with_values("Gross Profit", &scaled(0.45))
        .with_values("Operating Income", &operating_income)
        .with_values("Pretax Income", &scaled(0.30))
        .with_values("Tax Provision", &scaled(0.045))
        .with_values("Net Income", &net_income)
        .with_values("Diluted EPS", &diluted_eps)
        .with_values("Interest Expense", &flat(1_000.0))
        .with_values("Research And Development", &flat(8_000.0))
        .with_values("Reconciled Depreciation", &flat(3_000.0))
        .with_values("EBITDA", &ebitda);

    let balance_sheet = StatementTable::new(periods.clone())
        .with_values("Total Assets", &flat(350_000.0))
        .with_values("Current Assets", &flat(140_000.0))
        .with_values("Total Liabilities Net Minority Interest", &flat(280_000.0))
        .with_values("Current Liabilities", &flat(150_000.0))
        .with_values("Common Stock Equity", &flat(70_000.0))
        .with_values("Working Capital", &flat(-10_000.0))
        .with_values("Retained Earnings", &flat(-5_000.0))
        .with_values("Total Debt", &flat(100_000.0))
        .with_values("Cash And Cash Equivalents", &flat(30_000.0))
        .with_values("Other Short Term Investments", &flat(35_000.0))
        .with_values("Ordinary Shares Number", &flat(15_000.0));

    let operating_cash_flow = scaled(0.30);
    let free_cash_flow: Vec<f64> = operating_cash_flow.iter().map(|o| o - 2_500.0 * MILLION).collect();
    let cash_flow = StatementTable::new(periods)
        .with_values("Operating Cash Flow", &operating_cash_flow)
        .with_values("Capital Expenditure", &flat(-2_500.0))
        .with_values("Free Cash Flow", &free_cash_flow)
        .with_values("Cash Dividends Paid", &flat(-3_800.0));

    let statements = Statements {
        balance_sheet,
        income_statement,
        cash_flow,
        basis: ReportingBasis::Quarterly,
    };

    (statements, sample_info(ticker))
}

pub fn sample_info(ticker: &str) -> InfoMap {
    let mut info = InfoMap::new();
    let mut set = |key: &str, value: InfoValue| {
        info.insert(key.to_string(), value);
    };
    set("symbol", InfoValue::from(ticker));
    set("shortName", InfoValue::from(format!("{} Inc.", ticker)));
    set("longName", InfoValue::from(format!("{} Incorporated", ticker)));
    set("sector", InfoValue::from("Technology"));
    set("industry", InfoValue::from("Consumer Electronics"));
    set("currency", InfoValue::from("USD"));
    set("currentPrice", InfoValue::Number(200.0));
    set("marketCap", InfoValue::Number(3_000_000.0 * MILLION));
    set("sharesOutstanding", InfoValue::Number(15_000.0 * MILLION));
    set("beta", InfoValue::Number(1.2));
    set("trailingPE", InfoValue::Number(30.0));
    set("heldPercentInstitutions", InfoValue::Number(0.6));
    set("heldPercentInsiders", InfoValue::Number(0.02));
    set("dividendYield", InfoValue::Number(0.005));
    set("payoutRatio", InfoValue::Number(0.15));
    info
}

/// Daily closes starting at `start`, applying `pattern` returns cyclically.
pub fn price_walk(start: NaiveDate, days: usize, first_close: f64, pattern: &[f64]) -> PriceSeries {
    let mut close = first_close;
    let mut points = Vec::with_capacity(days);
    for day in 0..days {
        if day > 0 && !pattern.is_empty() {
            close *= 1.0 + pattern[(day - 1) % pattern.len()];
        }
        points.push(PricePoint {
            date: start + Duration::days(day as i64),
            close,
        });
    }
    PriceSeries::new(points)
}
