use anyhow::Context;
use fundamental_analysis::MetricSet;
use std::path::PathBuf;

pub const DEFAULT_SYMBOLS: &[&str] = &[
    "AAPL", "ADBE", "AMZN", "BRK.B", "COST", "TGT", "WMT", "GOOGL", "META", "MSFT",
    "NFLX", "NVDA", "TSLA", "UBER", "LYFT", "TSM", "INTC", "DLTR", "OLLI", "DG",
];

pub const DEFAULT_OUTPUT: &str = "stock_analysis.csv";

/// Command line options. Flags left unset fall back to the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub symbols: Vec<String>,
    pub metric_set: Option<MetricSet>,
    pub include_risk: bool,
    pub output: PathBuf,
    pub concurrency: Option<usize>,
    pub zero_fill: bool,
    pub describe: bool,
    pub help: bool,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Parse arguments, excluding the program name.
pub fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let symbols: Vec<String> = match args.iter().position(|a| a == "--symbols") {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
    };
    if symbols.is_empty() {
        anyhow::bail!("--symbols needs at least one ticker");
    }

    let metric_set = flag_value(args, "--metric-set")
        .map(|v| v.parse::<MetricSet>())
        .transpose()?;

    let concurrency = flag_value(args, "--concurrency")
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("invalid --concurrency value '{}'", v))
        })
        .transpose()?;

    let output = flag_value(args, "--output").unwrap_or(DEFAULT_OUTPUT).into();

    Ok(CliArgs {
        symbols,
        metric_set,
        include_risk: args.iter().any(|a| a == "--risk"),
        output,
        concurrency,
        zero_fill: args.iter().any(|a| a == "--zero-fill"),
        describe: args.iter().any(|a| a == "--describe"),
        help: args.iter().any(|a| a == "--help" || a == "-h"),
    })
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  stock-report                              Analyze the built-in {} symbols", DEFAULT_SYMBOLS.len());
    eprintln!("  stock-report --symbols AAPL MSFT ...      Specific symbols");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --metric-set compact|default|growth|full  Metric columns to compute (default: compact)");
    eprintln!("  --risk                                    Merge VaR, Sharpe, Sortino and beta columns");
    eprintln!("  --output PATH                             CSV path (default: {})", DEFAULT_OUTPUT);
    eprintln!("  --concurrency N                           Max tickers in flight");
    eprintln!("  --zero-fill                               Write 0 instead of empty cells for missing values");
    eprintln!("  --describe                                Print the descriptive listing per ticker instead");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_defaults() {
        let cli = parse_args(&[]).unwrap();
        assert_eq!(cli.symbols.len(), 20);
        assert_eq!(cli.symbols[3], "BRK.B");
        assert_eq!(cli.metric_set, None);
        assert_eq!(cli.output, PathBuf::from("stock_analysis.csv"));
        assert!(!cli.include_risk && !cli.zero_fill && !cli.describe);
    }

    #[test]
    fn test_symbols_stop_at_next_flag() {
        let cli = parse_args(&args("--symbols AAPL msft --risk --output out.csv")).unwrap();
        assert_eq!(cli.symbols, vec!["AAPL", "msft"]);
        assert!(cli.include_risk);
        assert_eq!(cli.output, PathBuf::from("out.csv"));
    }

    #[test]
    fn test_metric_set_and_concurrency() {
        let cli = parse_args(&args("--metric-set growth --concurrency 3 --zero-fill")).unwrap();
        assert_eq!(cli.metric_set, Some(MetricSet::Growth));
        assert_eq!(cli.concurrency, Some(3));
        assert!(cli.zero_fill);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_args(&args("--metric-set everything")).is_err());
        assert!(parse_args(&args("--concurrency many")).is_err());
        assert!(parse_args(&args("--symbols --risk")).is_err());
    }
}
