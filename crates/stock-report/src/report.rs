use analysis_core::{BatchResult, BatchRow, MetricValue};
use analysis_orchestrator::Description;
use fundamental_analysis::format_large_number;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

const TICKER_COLUMN: &str = "Ticker";
const ERROR_COLUMN: &str = "Error";

fn csv_cell(value: Option<&MetricValue>, zero_fill: bool) -> String {
    match value {
        Some(MetricValue::Number(v)) => v.to_string(),
        Some(MetricValue::Text(s)) => s.clone(),
        Some(MetricValue::Missing) | None if zero_fill => "0".to_string(),
        Some(MetricValue::Missing) | None => String::new(),
    }
}

/// Write the batch as CSV: `Ticker`, the union of metric columns, then `Error`.
pub fn write_csv<W: io::Write>(result: &BatchResult, writer: W, zero_fill: bool) -> anyhow::Result<()> {
    let columns = result.columns();
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(columns.len() + 2);
    header.push(TICKER_COLUMN);
    header.extend(columns.iter().map(|c| c.as_str()));
    header.push(ERROR_COLUMN);
    wtr.write_record(&header)?;

    for row in result.rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.ticker().to_string());
        match row {
            BatchRow::Metrics(metrics) => {
                record.extend(columns.iter().map(|c| csv_cell(metrics.get(c), zero_fill)));
                record.push(String::new());
            }
            BatchRow::Error(error) => {
                record.extend(columns.iter().map(|_| String::new()));
                record.push(error.error.clone());
            }
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file(result: &BatchResult, path: &Path, zero_fill: bool) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(result, io::BufWriter::new(file), zero_fill)
}

fn display_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Number(v) if v.abs() >= 1e6 => format_large_number(*v),
        MetricValue::Number(v) => v.to_string(),
        MetricValue::Text(s) => s.clone(),
        MetricValue::Missing => "N/A".to_string(),
    }
}

/// One block per ticker, `N/A` for missing values.
pub fn render_console(result: &BatchResult) -> String {
    let mut out = String::new();
    for row in result.rows() {
        let _ = writeln!(out, "{}", row.ticker());
        match row {
            BatchRow::Metrics(metrics) => {
                for (name, value) in metrics.values() {
                    let _ = writeln!(out, "  {}: {}", name, display_value(value));
                }
            }
            BatchRow::Error(error) => {
                let _ = writeln!(out, "  Error: {}", error.error);
            }
        }
        out.push('\n');
    }
    out
}

pub fn render_description(ticker: &str, description: &Description) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", ticker);
    match description {
        Ok(entries) => {
            for (name, value) in entries {
                let _ = writeln!(out, "  {}: {}", name, display_value(value));
            }
        }
        Err(e) => {
            let _ = writeln!(out, "  Error: {}", e);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, MetricRecord};

    fn sample_result() -> BatchResult {
        BatchResult::new(vec![
            BatchRow::Metrics(MetricRecord::new(
                "AAPL",
                vec![
                    ("Industry".to_string(), MetricValue::Text("Consumer Electronics".to_string())),
                    ("DE Ratio".to_string(), MetricValue::Number(4.0)),
                    ("ROE".to_string(), MetricValue::Missing),
                ],
            )),
            BatchRow::error("KKK", AnalysisError::NotFound("KKK".to_string())),
        ])
    }

    fn csv_string(result: &BatchResult, zero_fill: bool) -> String {
        let mut buf = Vec::new();
        write_csv(result, &mut buf, zero_fill).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let text = csv_string(&sample_result(), false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Ticker,Industry,DE Ratio,ROE,Error");
        assert_eq!(lines[1], "AAPL,Consumer Electronics,4,,");
        assert!(lines[2].starts_with("KKK,,,,"));
        assert!(lines[2].len() > "KKK,,,,".len());
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_zero_fill_only_touches_missing_metrics() {
        let text = csv_string(&sample_result(), true);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "AAPL,Consumer Electronics,4,0,");
        assert!(lines[2].starts_with("KKK,,,,"));
    }

    #[test]
    fn test_empty_batch_writes_header_only() {
        let text = csv_string(&BatchResult::default(), false);
        assert_eq!(text.trim_end(), "Ticker,Error");
    }

    #[test]
    fn test_console_uses_na_for_missing() {
        let text = render_console(&sample_result());

        assert!(text.contains("AAPL\n  Industry: Consumer Electronics\n  DE Ratio: 4\n  ROE: N/A\n"));
        assert!(text.contains("KKK\n  Error: "));
    }

    #[test]
    fn test_description_scales_large_numbers() {
        let description: Description = Ok(vec![
            ("Short Name", MetricValue::Text("Apple Inc.".to_string())),
            ("Revenue", MetricValue::Number(98_000_000_000.0)),
            ("Cash", MetricValue::Missing),
        ]);
        let text = render_description("AAPL", &description);

        assert_eq!(text, "AAPL\n  Short Name: Apple Inc.\n  Revenue: 98.0000B\n  Cash: N/A\n");
    }
}
