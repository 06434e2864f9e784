use crate::labels;
use analysis_core::stats::{finite, ratio};
use analysis_core::{AnalysisError, InfoValue, RawFinancials, ReportingBasis, StatementTable};
use chrono::NaiveDate;

/// Tax rate assumed for NOPAT when the statements don't give one.
const DEFAULT_TAX_RATE: f64 = 0.25;

/// Growth needs at least this many non-null observations of the quantity.
const MIN_GROWTH_OBSERVATIONS: usize = 5;

/// `Ok(None)` is a missing metric; `Err` is a fault that aborts the ticker's record.
pub type MetricResult = Result<Option<f64>, AnalysisError>;

/// Read-only view over one ticker's [`RawFinancials`] that derives ratios.
///
/// Flow items (revenue, income, cash flow) are trailing twelve months:
/// the sum of the four latest quarters on a quarterly basis, or the latest
/// fiscal year on an annual basis. Balance-sheet items are the latest period.
#[derive(Debug, Clone, Copy)]
pub struct FinancialMetrics<'a> {
    raw: &'a RawFinancials,
}

impl<'a> FinancialMetrics<'a> {
    pub fn new(raw: &'a RawFinancials) -> Self {
        Self { raw }
    }

    pub fn ticker(&self) -> &'a str {
        &self.raw.ticker
    }

    pub fn raw(&self) -> &'a RawFinancials {
        self.raw
    }

    pub fn basis(&self) -> ReportingBasis {
        self.raw.basis
    }

    /// End date of the most recent reported period across the three statements.
    pub fn latest_period(&self) -> Option<NaiveDate> {
        [
            &self.raw.balance_sheet,
            &self.raw.income_statement,
            &self.raw.cash_flow,
        ]
        .iter()
        .filter_map(|t| t.latest_period())
        .max()
    }

    // ── Info lookups ────────────────────────────────────────────────

    pub fn info_value(&self, key: &str) -> Option<&'a InfoValue> {
        self.raw.info.get(key)
    }

    pub fn info_text(&self, key: &str) -> Option<String> {
        self.info_value(key).map(|v| v.to_string())
    }

    /// Numeric info field. Numeric strings are accepted; any other
    /// non-numeric value is a data fault.
    pub fn info_number(&self, key: &str) -> MetricResult {
        match self.info_value(key) {
            None => Ok(None),
            Some(InfoValue::Number(n)) => Ok(finite(*n)),
            Some(InfoValue::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(InfoValue::Text(s)) => s.trim().parse::<f64>().map(finite).map_err(|_| {
                AnalysisError::InvalidData(format!(
                    "{}: info field '{}' is not numeric: '{}'",
                    self.ticker(),
                    key,
                    s
                ))
            }),
            Some(InfoValue::Bool(b)) => Err(AnalysisError::InvalidData(format!(
                "{}: info field '{}' is not numeric: {}",
                self.ticker(),
                key,
                b
            ))),
        }
    }

    // ── Statement lookups ──────────────────────────────────────────

    /// Trailing-twelve-month value of the first matching row. On a quarterly
    /// basis all four latest quarters must be present.
    pub fn trailing(&self, table: &StatementTable, candidates: &[&str]) -> Option<f64> {
        let series = table.series_in(candidates)?;
        match self.basis() {
            ReportingBasis::Annual => series.first().copied().flatten(),
            ReportingBasis::Quarterly => {
                if series.len() < 4 {
                    return None;
                }
                series[..4].iter().copied().sum::<Option<f64>>().and_then(finite)
            }
        }
    }

    fn balance(&self, candidates: &[&str]) -> Option<f64> {
        self.raw.balance_sheet.value_in(candidates)
    }

    fn income_ttm(&self, candidates: &[&str]) -> Option<f64> {
        self.trailing(&self.raw.income_statement, candidates)
    }

    fn cash_flow_ttm(&self, candidates: &[&str]) -> Option<f64> {
        self.trailing(&self.raw.cash_flow, candidates)
    }

    // ── Basic figures ──────────────────────────────────────────────

    pub fn stock_price(&self) -> MetricResult {
        Ok(self.info_number("currentPrice")?.or(self.info_number("regularMarketPrice")?))
    }

    pub fn shares_outstanding(&self) -> MetricResult {
        Ok(self.info_number("sharesOutstanding")?.or_else(|| self.balance(labels::SHARES_OUTSTANDING)))
    }

    pub fn market_cap(&self) -> MetricResult {
        if let Some(market_cap) = self.info_number("marketCap")? {
            return Ok(Some(market_cap));
        }
        Ok(match (self.stock_price()?, self.shares_outstanding()?) {
            (Some(price), Some(shares)) => finite(price * shares),
            _ => None,
        })
    }

    pub fn enterprise_value(&self) -> MetricResult {
        if let Some(ev) = self.info_number("enterpriseValue")? {
            return Ok(Some(ev));
        }
        Ok(match (self.market_cap()?, self.total_debt()?, self.cash()?) {
            (Some(mc), Some(debt), Some(cash)) => finite(mc + debt - cash),
            _ => None,
        })
    }

    pub fn eps(&self) -> MetricResult {
        Ok(self.info_number("trailingEps")?.or_else(|| self.income_ttm(labels::DILUTED_EPS)))
    }

    pub fn revenue(&self) -> MetricResult {
        Ok(self.income_ttm(labels::REVENUE))
    }

    pub fn gross_profit(&self) -> MetricResult {
        if let Some(gp) = self.income_ttm(labels::GROSS_PROFIT) {
            return Ok(Some(gp));
        }
        Ok(match (self.revenue()?, self.income_ttm(labels::COST_OF_REVENUE)) {
            (Some(revenue), Some(cogs)) => finite(revenue - cogs),
            _ => None,
        })
    }

    pub fn operating_income(&self) -> MetricResult {
        Ok(self.income_ttm(labels::OPERATING_INCOME))
    }

    pub fn net_income(&self) -> MetricResult {
        Ok(self.income_ttm(labels::NET_INCOME))
    }

    /// Reported as a positive expense regardless of the provider's sign.
    pub fn interest_expense(&self) -> MetricResult {
        Ok(self.income_ttm(labels::INTEREST_EXPENSE).map(f64::abs))
    }

    pub fn ebitda(&self) -> MetricResult {
        if let Some(ebitda) = self.income_ttm(labels::EBITDA) {
            return Ok(Some(ebitda));
        }
        let depreciation = self
            .income_ttm(labels::DEPRECIATION)
            .or_else(|| self.cash_flow_ttm(labels::DEPRECIATION));
        Ok(match (self.operating_income()?, depreciation) {
            (Some(oi), Some(da)) => finite(oi + da.abs()),
            _ => None,
        })
    }

    pub fn total_assets(&self) -> MetricResult {
        Ok(self.balance(labels::TOTAL_ASSETS))
    }

    pub fn total_liabilities(&self) -> MetricResult {
        Ok(self.balance(labels::TOTAL_LIABILITIES))
    }

    pub fn total_equity(&self) -> MetricResult {
        Ok(self.balance(labels::STOCKHOLDERS_EQUITY))
    }

    pub fn current_assets(&self) -> MetricResult {
        Ok(self.balance(labels::CURRENT_ASSETS))
    }

    pub fn current_liabilities(&self) -> MetricResult {
        Ok(self.balance(labels::CURRENT_LIABILITIES))
    }

    pub fn working_capital(&self) -> MetricResult {
        if let Some(wc) = self.balance(labels::WORKING_CAPITAL) {
            return Ok(Some(wc));
        }
        Ok(match (self.current_assets()?, self.current_liabilities()?) {
            (Some(ca), Some(cl)) => finite(ca - cl),
            _ => None,
        })
    }

    pub fn retained_earnings(&self) -> MetricResult {
        Ok(self.balance(labels::RETAINED_EARNINGS))
    }

    pub fn total_debt(&self) -> MetricResult {
        Ok(self.balance(labels::TOTAL_DEBT))
    }

    pub fn cash(&self) -> MetricResult {
        Ok(self.balance(labels::CASH))
    }

    pub fn short_term_investments(&self) -> MetricResult {
        Ok(self.balance(labels::SHORT_TERM_INVESTMENTS))
    }

    pub fn operating_cash_flow(&self) -> MetricResult {
        Ok(self.cash_flow_ttm(labels::OPERATING_CASH_FLOW))
    }

    /// Operating cash flow minus capital expenditure (capex taken as an
    /// outflow whatever its sign in the statement).
    pub fn free_cash_flow(&self) -> MetricResult {
        let capex = self.cash_flow_ttm(labels::CAPITAL_EXPENDITURE);
        Ok(match (self.operating_cash_flow()?, capex) {
            (Some(ocf), Some(capex)) => finite(ocf - capex.abs()),
            _ => self.cash_flow_ttm(labels::FREE_CASH_FLOW),
        })
    }

    pub fn book_value_per_share(&self) -> MetricResult {
        Ok(ratio(self.total_equity()?, self.shares_outstanding()?))
    }

    // ── Profitability ──────────────────────────────────────────────

    pub fn gross_margin(&self) -> MetricResult {
        Ok(ratio(self.gross_profit()?, self.revenue()?))
    }

    pub fn operating_margin(&self) -> MetricResult {
        Ok(ratio(self.operating_income()?, self.revenue()?))
    }

    pub fn net_profit_margin(&self) -> MetricResult {
        Ok(ratio(self.net_income()?, self.revenue()?))
    }

    pub fn roa(&self) -> MetricResult {
        Ok(ratio(self.net_income()?, self.total_assets()?))
    }

    pub fn roe(&self) -> MetricResult {
        Ok(ratio(self.net_income()?, self.total_equity()?))
    }

    pub fn effective_tax_rate(&self) -> MetricResult {
        let tax = self
            .income_ttm(labels::TAX_PROVISION)
            .or_else(|| self.cash_flow_ttm(labels::TAX_PAID));
        Ok(ratio(tax, self.income_ttm(labels::PRETAX_INCOME)))
    }

    /// NOPAT over invested capital (equity plus total liabilities).
    pub fn roic(&self) -> MetricResult {
        let tax_rate = self.effective_tax_rate()?.unwrap_or(DEFAULT_TAX_RATE);
        let nopat = self.operating_income()?.map(|oi| oi * (1.0 - tax_rate));
        let invested_capital = match (self.total_equity()?, self.total_liabilities()?) {
            (Some(equity), Some(liabilities)) => Some(equity + liabilities),
            _ => None,
        };
        Ok(ratio(nopat, invested_capital))
    }

    pub fn asset_turnover(&self) -> MetricResult {
        Ok(ratio(self.revenue()?, self.total_assets()?))
    }

    // ── Leverage and coverage ──────────────────────────────────────

    pub fn debt_to_equity(&self) -> MetricResult {
        Ok(ratio(self.total_liabilities()?, self.total_equity()?))
    }

    pub fn current_ratio(&self) -> MetricResult {
        Ok(ratio(self.current_assets()?, self.current_liabilities()?))
    }

    pub fn interest_coverage(&self) -> MetricResult {
        Ok(ratio(self.operating_income()?, self.interest_expense()?))
    }

    // ── Valuation ──────────────────────────────────────────────────

    pub fn pe_ratio(&self) -> MetricResult {
        if let Some(pe) = self.info_number("trailingPE")? {
            return Ok(Some(pe));
        }
        Ok(ratio(self.stock_price()?, self.eps()?))
    }

    pub fn earnings_yield(&self) -> MetricResult {
        Ok(ratio(self.eps()?, self.stock_price()?))
    }

    /// P/E over earnings growth expressed in percent.
    pub fn peg_ratio(&self) -> MetricResult {
        let growth = match self.info_number("earningsQuarterlyGrowth")? {
            Some(g) => Some(g),
            None => self.eps_growth_yoy()?,
        };
        Ok(ratio(self.pe_ratio()?, growth.map(|g| g * 100.0)))
    }

    pub fn price_to_book(&self) -> MetricResult {
        if let Some(pb) = self.info_number("priceToBook")? {
            return Ok(Some(pb));
        }
        Ok(ratio(self.stock_price()?, self.book_value_per_share()?))
    }

    pub fn price_to_sales(&self) -> MetricResult {
        Ok(ratio(self.market_cap()?, self.revenue()?))
    }

    pub fn price_to_free_cash_flow(&self) -> MetricResult {
        Ok(ratio(self.market_cap()?, self.free_cash_flow()?))
    }

    pub fn ev_to_ebitda(&self) -> MetricResult {
        Ok(ratio(self.enterprise_value()?, self.ebitda()?))
    }

    pub fn dividend_yield(&self) -> MetricResult {
        if let Some(dy) = self.info_number("dividendYield")? {
            return Ok(Some(dy));
        }
        Ok(ratio(self.info_number("trailingAnnualDividendRate")?, self.stock_price()?))
    }

    pub fn payout_ratio(&self) -> MetricResult {
        if let Some(payout) = self.info_number("payoutRatio")? {
            return Ok(Some(payout));
        }
        let dividends = self.cash_flow_ttm(labels::DIVIDENDS_PAID).map(f64::abs);
        Ok(ratio(dividends, self.net_income()?))
    }

    /// ROE retained after dividends: ROE × (1 − payout ratio).
    pub fn sustainable_growth_rate(&self) -> MetricResult {
        Ok(match (self.roe()?, self.payout_ratio()?) {
            (Some(roe), Some(payout)) => finite(roe * (1.0 - payout)),
            _ => None,
        })
    }

    // ── Market and ownership ───────────────────────────────────────

    pub fn beta(&self) -> MetricResult {
        self.info_number("beta")
    }

    pub fn institutional_ownership(&self) -> MetricResult {
        self.info_number("heldPercentInstitutions")
    }

    pub fn insider_ownership(&self) -> MetricResult {
        self.info_number("heldPercentInsiders")
    }

    // ── Growth ─────────────────────────────────────────────────────

    fn yoy_lag(&self) -> usize {
        self.basis().periods_per_year()
    }

    fn qoq_lag(&self) -> Option<usize> {
        match self.basis() {
            ReportingBasis::Quarterly => Some(1),
            ReportingBasis::Annual => None,
        }
    }

    fn revenue_series(&self) -> Vec<Option<f64>> {
        self.raw
            .income_statement
            .series_in(labels::REVENUE)
            .map(<[Option<f64>]>::to_vec)
            .unwrap_or_default()
    }

    fn eps_series(&self) -> Vec<Option<f64>> {
        self.raw
            .income_statement
            .series_in(labels::DILUTED_EPS)
            .map(<[Option<f64>]>::to_vec)
            .unwrap_or_default()
    }

    fn fcf_series(&self) -> Vec<Option<f64>> {
        let cash_flow = &self.raw.cash_flow;
        match (
            cash_flow.series_in(labels::OPERATING_CASH_FLOW),
            cash_flow.series_in(labels::CAPITAL_EXPENDITURE),
        ) {
            (Some(ocf), Some(capex)) => ocf
                .iter()
                .zip(capex)
                .map(|(o, c)| match (o, c) {
                    (Some(o), Some(c)) => finite(o - c.abs()),
                    _ => None,
                })
                .collect(),
            _ => cash_flow
                .series_in(labels::FREE_CASH_FLOW)
                .map(<[Option<f64>]>::to_vec)
                .unwrap_or_default(),
        }
    }

    pub fn revenue_growth_yoy(&self) -> MetricResult {
        Ok(growth(&self.revenue_series(), Some(self.yoy_lag())))
    }

    pub fn revenue_growth_qoq(&self) -> MetricResult {
        Ok(growth(&self.revenue_series(), self.qoq_lag()))
    }

    pub fn eps_growth_yoy(&self) -> MetricResult {
        Ok(growth(&self.eps_series(), Some(self.yoy_lag())))
    }

    pub fn eps_growth_qoq(&self) -> MetricResult {
        Ok(growth(&self.eps_series(), self.qoq_lag()))
    }

    pub fn fcf_growth_yoy(&self) -> MetricResult {
        Ok(growth(&self.fcf_series(), Some(self.yoy_lag())))
    }

    pub fn fcf_growth_qoq(&self) -> MetricResult {
        Ok(growth(&self.fcf_series(), self.qoq_lag()))
    }

    // ── Distress ───────────────────────────────────────────────────

    /// Altman Z-Score. Missing if any of the five components is missing.
    pub fn altman_z_score(&self) -> MetricResult {
        let total_assets = self.total_assets()?;
        let weighted = [
            (1.2, self.working_capital()?),
            (1.4, self.retained_earnings()?),
            (3.3, self.operating_income()?),
            (1.0, self.revenue()?),
        ];

        let mut z = 0.0;
        for (weight, value) in weighted {
            match ratio(value, total_assets) {
                Some(r) => z += weight * r,
                None => return Ok(None),
            }
        }
        match ratio(self.market_cap()?, self.total_liabilities()?) {
            Some(r) => z += 0.6 * r,
            None => return Ok(None),
        }

        Ok(finite(z))
    }
}

/// `(current − base) / base` with `base` taken `lag` periods back.
fn growth(series: &[Option<f64>], lag: Option<usize>) -> Option<f64> {
    let lag = lag?;
    if series.iter().flatten().count() < MIN_GROWTH_OBSERVATIONS {
        return None;
    }
    let current = series.first().copied().flatten()?;
    let base = series.get(lag).copied().flatten()?;
    ratio(Some(current - base), Some(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{InfoMap, Statements};
    use approx::assert_relative_eq;
    use mock_provider::fixtures;

    fn raw(balance_sheet: StatementTable, income_statement: StatementTable, info: InfoMap) -> RawFinancials {
        RawFinancials::from_parts(
            "TEST",
            Statements {
                balance_sheet,
                income_statement,
                ..Default::default()
            },
            info,
        )
    }

    fn sample() -> RawFinancials {
        let (statements, info) = fixtures::sample_company("TEST");
        RawFinancials::from_parts("TEST", statements, info)
    }

    #[test]
    fn test_debt_to_equity_primary_label() {
        let bs = StatementTable::new(fixtures::quarter_ends(1))
            .with_values("Total Liabilities Net Minority Interest", &[100.0])
            .with_values("Common Stock Equity", &[50.0]);
        let raw = raw(bs, StatementTable::default(), InfoMap::new());
        assert_eq!(FinancialMetrics::new(&raw).debt_to_equity().unwrap(), Some(2.0));
    }

    #[test]
    fn test_debt_to_equity_fallback_label() {
        let bs = StatementTable::new(fixtures::quarter_ends(1))
            .with_values("Total Liabilities", &[120.0])
            .with_values("Common Stock Equity", &[50.0]);
        let raw = raw(bs, StatementTable::default(), InfoMap::new());
        assert_relative_eq!(FinancialMetrics::new(&raw).debt_to_equity().unwrap().unwrap(), 2.4);
    }

    #[test]
    fn test_ratio_missing_operand_and_zero_denominator() {
        let bs = StatementTable::new(fixtures::quarter_ends(1))
            .with_values("Total Liabilities", &[120.0])
            .with_values("Current Assets", &[10.0])
            .with_values("Current Liabilities", &[0.0]);
        let raw = raw(bs, StatementTable::default(), InfoMap::new());
        let m = FinancialMetrics::new(&raw);

        // no equity row
        assert_eq!(m.debt_to_equity().unwrap(), None);
        // zero denominator
        assert_eq!(m.current_ratio().unwrap(), None);
        // no income statement at all
        assert_eq!(m.net_profit_margin().unwrap(), None);
    }

    #[test]
    fn test_trailing_requires_four_quarters() {
        let income = StatementTable::new(fixtures::quarter_ends(4))
            .with_row("Total Revenue", vec![Some(10.0), Some(10.0), None, Some(10.0)])
            .with_values("Net Income", &[1.0, 2.0, 3.0, 4.0]);
        let raw = raw(StatementTable::default(), income, InfoMap::new());
        let m = FinancialMetrics::new(&raw);

        assert_eq!(m.revenue().unwrap(), None);
        assert_eq!(m.net_income().unwrap(), Some(10.0));
    }

    #[test]
    fn test_trailing_annual_uses_latest_year() {
        let mut raw = raw(
            StatementTable::default(),
            StatementTable::new(fixtures::quarter_ends(2)).with_values("Total Revenue", &[400.0, 380.0]),
            InfoMap::new(),
        );
        raw.basis = ReportingBasis::Annual;
        assert_eq!(FinancialMetrics::new(&raw).revenue().unwrap(), Some(400.0));
    }

    #[test]
    fn test_growth_needs_five_observations() {
        let income = StatementTable::new(fixtures::quarter_ends(4)).with_values("Total Revenue", &[130.0, 120.0, 110.0, 100.0]);
        let raw = raw(StatementTable::default(), income, InfoMap::new());
        let m = FinancialMetrics::new(&raw);
        assert_eq!(m.revenue_growth_yoy().unwrap(), None);
        assert_eq!(m.revenue_growth_qoq().unwrap(), None);
    }

    #[test]
    fn test_growth_yoy_and_qoq() {
        let income = StatementTable::new(fixtures::quarter_ends(5))
            .with_values("Total Revenue", &[150.0, 140.0, 130.0, 120.0, 100.0]);
        let raw = raw(StatementTable::default(), income, InfoMap::new());
        let m = FinancialMetrics::new(&raw);

        assert_relative_eq!(m.revenue_growth_yoy().unwrap().unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(m.revenue_growth_qoq().unwrap().unwrap(), 10.0 / 140.0, epsilon = 1e-12);
    }

    #[test]
    fn test_growth_annual_has_no_qoq() {
        let income = StatementTable::new(fixtures::quarter_ends(5))
            .with_values("Total Revenue", &[150.0, 140.0, 130.0, 120.0, 100.0]);
        let mut raw = raw(StatementTable::default(), income, InfoMap::new());
        raw.basis = ReportingBasis::Annual;
        let m = FinancialMetrics::new(&raw);

        assert_relative_eq!(m.revenue_growth_yoy().unwrap().unwrap(), 10.0 / 140.0, epsilon = 1e-12);
        assert_eq!(m.revenue_growth_qoq().unwrap(), None);
    }

    #[test]
    fn test_growth_zero_base_is_missing() {
        let income = StatementTable::new(fixtures::quarter_ends(5)).with_values("Diluted EPS", &[1.0, 0.5, 0.2, 0.1, 0.0]);
        let raw = raw(StatementTable::default(), income, InfoMap::new());
        assert_eq!(FinancialMetrics::new(&raw).eps_growth_yoy().unwrap(), None);
    }

    #[test]
    fn test_sample_company_ratios() {
        let raw = sample();
        let m = FinancialMetrics::new(&raw);

        // TTM revenue 98 + 97 + 96 + 95 = 386B
        assert_relative_eq!(m.revenue().unwrap().unwrap(), 386_000.0e6);
        assert_relative_eq!(m.debt_to_equity().unwrap().unwrap(), 4.0);
        assert_relative_eq!(m.operating_margin().unwrap().unwrap(), 0.30, epsilon = 1e-12);
        assert_relative_eq!(m.effective_tax_rate().unwrap().unwrap(), 0.15, epsilon = 1e-12);
        assert_relative_eq!(m.revenue_growth_yoy().unwrap().unwrap(), 4_000.0 / 94_000.0, epsilon = 1e-12);
        assert_relative_eq!(m.free_cash_flow().unwrap().unwrap(), 386_000.0e6 * 0.30 - 10_000.0e6, epsilon = 1e-3);
        // info value wins over the derived one
        assert_eq!(m.pe_ratio().unwrap(), Some(30.0));
    }

    #[test]
    fn test_roic_uses_effective_tax_rate() {
        let raw = sample();
        let m = FinancialMetrics::new(&raw);
        let nopat = 386_000.0e6 * 0.30 * 0.85;
        assert_relative_eq!(m.roic().unwrap().unwrap(), nopat / 350_000.0e6, epsilon = 1e-12);
    }

    #[test]
    fn test_sustainable_growth_rate() {
        let raw = sample();
        let m = FinancialMetrics::new(&raw);
        let roe = 386_000.0e6 * 0.25 / 70_000.0e6;
        assert_relative_eq!(m.sustainable_growth_rate().unwrap().unwrap(), roe * 0.85, epsilon = 1e-12);
    }

    #[test]
    fn test_altman_z_score() {
        let raw = sample();
        let m = FinancialMetrics::new(&raw);
        let ta = 350_000.0e6;
        let expected = 1.2 * (-10_000.0e6 / ta)
            + 1.4 * (-5_000.0e6 / ta)
            + 3.3 * (386_000.0e6 * 0.30 / ta)
            + 1.0 * (386_000.0e6 / ta)
            + 0.6 * (3_000_000.0e6 / 280_000.0e6);
        assert_relative_eq!(m.altman_z_score().unwrap().unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_altman_missing_component() {
        let mut raw = sample();
        raw.info.remove("marketCap");
        raw.info.remove("currentPrice");
        assert_eq!(FinancialMetrics::new(&raw).altman_z_score().unwrap(), None);

        let mut raw = sample();
        raw.balance_sheet.insert_row("Retained Earnings", vec![]);
        assert_eq!(FinancialMetrics::new(&raw).altman_z_score().unwrap(), None);
    }

    #[test]
    fn test_info_number_types() {
        let mut info = InfoMap::new();
        info.insert("marketCap".to_string(), InfoValue::from("1500"));
        info.insert("beta".to_string(), InfoValue::from("high"));
        info.insert("trailingPE".to_string(), InfoValue::from(true));
        let raw = raw(StatementTable::default(), StatementTable::default(), info);
        let m = FinancialMetrics::new(&raw);

        assert_eq!(m.info_number("marketCap").unwrap(), Some(1500.0));
        assert_eq!(m.info_number("sharesOutstanding").unwrap(), None);
        assert!(matches!(m.beta(), Err(AnalysisError::InvalidData(_))));
        assert!(matches!(m.pe_ratio(), Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_fallbacks_without_info() {
        let mut raw = sample();
        for key in ["dividendYield", "payoutRatio", "trailingPE", "marketCap"] {
            raw.info.remove(key);
        }
        raw.info.insert("trailingAnnualDividendRate".to_string(), InfoValue::Number(1.0));
        let m = FinancialMetrics::new(&raw);

        assert_relative_eq!(m.dividend_yield().unwrap().unwrap(), 1.0 / 200.0);
        // |dividends paid| TTM / net income TTM
        assert_relative_eq!(m.payout_ratio().unwrap().unwrap(), 15_200.0e6 / (386_000.0e6 * 0.25), epsilon = 1e-12);
        // market cap from price × shares
        assert_relative_eq!(m.market_cap().unwrap().unwrap(), 200.0 * 15_000.0e6);
        // P/E from price / TTM diluted EPS
        let eps = 386_000.0e6 * 0.25 / 15_000.0e6;
        assert_relative_eq!(m.pe_ratio().unwrap().unwrap(), 200.0 / eps, epsilon = 1e-9);
    }
}
