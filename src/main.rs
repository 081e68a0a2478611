use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};
use tracing_unwrap::ResultExt;
use usdt_price_scraper::app::App;
use usdt_price_scraper::config::Config;
use usdt_price_scraper::fetch::HttpFetcher;
use usdt_price_scraper::ledger::JsonLedger;

#[derive(Parser)]
#[command(about = "Scrapes USDT conversion prices into a rolling JSON ledger")]
struct Cli {
    #[arg(long, env = "CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,
    /// Run a single scrape cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    info!("Starting the application...");

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let fetcher = HttpFetcher::new(config.user_agent.clone());
    let ledger_path = config.ledger_path.clone();
    let ledger = JsonLedger::new(ledger_path.clone());

    let mut app = App::new(config, fetcher, ledger);

    if cli.once {
        let report = app.scrape_cycle().await;
        println!("{}", serde_json::to_string_pretty(&report.record)?);
        println!("{}", report.status);
        let record_count = report
            .record_count
            .unwrap_or_else(|| JsonLedger::load(&ledger_path).len());
        println!("Records: {record_count}");
        return Ok(());
    }

    let cancellation_token = CancellationToken::new();
    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap_or_log();
        info!("Ctrl-C received, shutting down");
        ctrl_c_token.cancel();
    });

    app.run(cancellation_token).await?;

    Ok(())
}
