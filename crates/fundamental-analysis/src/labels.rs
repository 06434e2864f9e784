//! Ordered label aliases per logical line item.
//!
//! Current Yahoo-style labels come first, then older Yahoo spellings, then
//! the labels Polygon's financials endpoint uses. Lookups take the first
//! label present with data, so order matters.

// Balance sheet
pub const TOTAL_ASSETS: &[&str] = &["Total Assets", "Assets"];
pub const TOTAL_LIABILITIES: &[&str] = &[
    "Total Liabilities Net Minority Interest",
    "Total Liabilities",
    "Total Liab",
    "Liabilities",
];
pub const STOCKHOLDERS_EQUITY: &[&str] = &[
    "Common Stock Equity",
    "Stockholders Equity",
    "Total Stockholder Equity",
    "Equity Attributable To Parent",
    "Equity",
];
pub const CURRENT_ASSETS: &[&str] = &["Current Assets", "Total Current Assets"];
pub const CURRENT_LIABILITIES: &[&str] = &["Current Liabilities", "Total Current Liabilities"];
pub const WORKING_CAPITAL: &[&str] = &["Working Capital"];
pub const RETAINED_EARNINGS: &[&str] = &["Retained Earnings"];
pub const TOTAL_DEBT: &[&str] = &["Total Debt", "Long Term Debt", "Long-term Debt"];
pub const CASH: &[&str] = &[
    "Cash And Cash Equivalents",
    "Cash",
    "Cash Financial",
];
pub const SHORT_TERM_INVESTMENTS: &[&str] = &[
    "Other Short Term Investments",
    "Short Term Investments",
];
pub const SHARES_OUTSTANDING: &[&str] = &["Ordinary Shares Number", "Share Issued"];

// Income statement
pub const REVENUE: &[&str] = &["Total Revenue", "Operating Revenue", "Revenues", "Revenue"];
pub const COST_OF_REVENUE: &[&str] = &["Cost Of Revenue", "Reconciled Cost Of Revenue"];
pub const GROSS_PROFIT: &[&str] = &["Gross Profit"];
pub const OPERATING_INCOME: &[&str] = &["Operating Income", "Operating Income/Loss", "EBIT"];
pub const NET_INCOME: &[&str] = &[
    "Net Income",
    "Net Income Common Stockholders",
    "Net Income/Loss",
    "Net Income/Loss Attributable To Parent",
];
pub const DILUTED_EPS: &[&str] = &[
    "Diluted EPS",
    "Basic EPS",
    "Diluted Earnings Per Share",
    "Basic Earnings Per Share",
];
pub const INTEREST_EXPENSE: &[&str] = &[
    "Interest Expense",
    "Interest Expense Non Operating",
    "Interest Expense, Operating",
];
pub const PRETAX_INCOME: &[&str] = &[
    "Pretax Income",
    "Income Before Tax",
    "Income/Loss From Continuing Operations Before Tax",
];
pub const TAX_PROVISION: &[&str] = &["Tax Provision", "Income Tax Expense/Benefit"];
pub const RESEARCH_AND_DEVELOPMENT: &[&str] = &["Research And Development", "Research and Development"];
pub const EBITDA: &[&str] = &["EBITDA", "Normalized EBITDA"];
pub const DEPRECIATION: &[&str] = &[
    "Reconciled Depreciation",
    "Depreciation And Amortization",
    "Depreciation Amortization Depletion",
    "Depreciation and Amortization",
];

// Cash flow
pub const OPERATING_CASH_FLOW: &[&str] = &[
    "Operating Cash Flow",
    "Cash Flow From Continuing Operating Activities",
    "Net Cash Flow From Operating Activities",
];
pub const CAPITAL_EXPENDITURE: &[&str] = &["Capital Expenditure", "Capital Expenditures"];
pub const FREE_CASH_FLOW: &[&str] = &["Free Cash Flow"];
pub const DIVIDENDS_PAID: &[&str] = &["Cash Dividends Paid", "Common Stock Dividend Paid"];
pub const TAX_PAID: &[&str] = &["Income Tax Paid Supplemental Data", "Tax Paid"];
