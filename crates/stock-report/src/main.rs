//! stock-report: fetch statements for a list of tickers from Polygon, compute
//! ratio, growth and optional risk metrics, and write a CSV table.
//!
//! Usage:
//!   cargo run -p stock-report -- --symbols AAPL MSFT GOOGL
//!   cargo run -p stock-report -- --metric-set full --risk --output report.csv
//!   cargo run -p stock-report -- --symbols NVDA --describe

mod cli;
mod report;

use analysis_core::MarketDataProvider;
use analysis_orchestrator::{AnalyzerConfig, MultiStockAnalyzer};
use anyhow::Context;
use polygon_client::PolygonClient;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_report=info,analysis_orchestrator=info,polygon_client=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match cli::parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {:#}", e);
            cli::print_usage();
            std::process::exit(1);
        }
    };
    if cli.help {
        cli::print_usage();
        return Ok(());
    }

    let mut config = AnalyzerConfig::from_env();
    if let Some(set) = cli.metric_set {
        config.metric_set = set;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.include_risk = cli.include_risk;
    config.validate().context("invalid configuration")?;

    let polygon = PolygonClient::from_env().context("failed to configure Polygon client")?;
    let provider: Arc<dyn MarketDataProvider> = Arc::new(polygon);
    let analyzer = MultiStockAnalyzer::new(provider, config.clone());

    if cli.describe {
        for (ticker, description) in analyzer.describe_all(&cli.symbols).await {
            println!("{}", report::render_description(&ticker, &description));
        }
        return Ok(());
    }

    tracing::info!(
        "stock-report: {} symbols, metric_set={}, risk={}, concurrency={}",
        cli.symbols.len(),
        config.metric_set,
        config.include_risk,
        config.concurrency
    );
    let started = Instant::now();

    let result = analyzer.analyze_all(&cli.symbols).await.sorted_by_ticker();
    let failed = result.errors().count();

    print!("{}", report::render_console(&result));
    report::write_csv_file(&result, &cli.output, cli.zero_fill)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    tracing::info!(
        "Done in {:.1}s: {} rows ({} failed) written to {}",
        started.elapsed().as_secs_f64(),
        result.len(),
        failed,
        cli.output.display()
    );

    Ok(())
}
