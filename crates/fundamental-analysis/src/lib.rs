//! Metric extraction: ratios, growth and distress scores derived from one
//! ticker's raw statements and info, plus the catalog that names them.

pub mod catalog;
pub mod format;
pub mod labels;
pub mod metrics;

pub use catalog::{MetricCatalog, MetricDef, MetricKind, MetricSet};
pub use format::format_large_number;
pub use metrics::{FinancialMetrics, MetricResult};
