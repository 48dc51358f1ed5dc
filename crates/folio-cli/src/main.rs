//! folio CLI entry point.
//!
//! This binary is intentionally thin: it sets up tracing, loads the
//! price catalog and the portfolio store from their directories, calls
//! one engine function per subcommand, and prints the result. All
//! calculation lives in the library crates; nothing here is interactive.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use folio_analytics::{
    allocation, crossovers, distribution, moving_average, performance, performance_series,
    portfolio_value, rebalance, RebalanceAction,
};
use folio_ledger::{PortfolioAggregate, ShareLedger};
use folio_md::{
    load_catalog_dir, AlphaVantageProvider, DailyProvider, FetchDailyRequest, PriceCatalog,
};
use folio_store::PortfolioStore;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Share-ledger valuation desk CLI", long_about = None)]
struct Cli {
    /// Directory of per-ticker daily bar CSVs (<TICKER>.csv)
    #[arg(long, default_value = "StockData")]
    data_dir: PathBuf,

    /// Directory of saved portfolio CSVs
    #[arg(long, default_value = "PortfolioData")]
    portfolio_dir: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily bars from the provider into the data directory
    Fetch {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },

    /// Summarize the bar files in the data directory
    Ingest,

    /// Trailing moving average of the (high+low)/2 midpoint
    MovingAverage {
        #[arg(long)]
        ticker: String,
        /// Anchor date; the window ends the day before
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        window: u32,
    },

    /// Dates where the close crosses above the trailing moving average
    Crossovers {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        window: u32,
    },

    /// close(end) - open(start) for one instrument
    Performance {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },

    /// Record a purchase in a portfolio (created on first buy)
    Buy {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        shares: f64,
    },

    /// Record a sale in a portfolio
    Sell {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        shares: f64,
    },

    /// Point-in-time portfolio value
    Value {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        date: NaiveDate,
    },

    /// Per-holding value distribution at a date
    Distribution {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        date: NaiveDate,
    },

    /// Time-bucketed performance series over a date range
    Series {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },

    /// Rebalance a portfolio to target percentages and save the result
    Rebalance {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        date: NaiveDate,
        /// Repeated TICKER=PCT pairs; must sum to 100
        #[arg(long = "target", value_parser = parse_target, required = true)]
        targets: Vec<(String, u32)>,
    },

    /// List saved portfolios
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (dev convenience). Silent if the file does
    // not exist — deployments inject env vars directly.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    let store = PortfolioStore::new(&cli.portfolio_dir);

    match cli.cmd {
        Commands::Fetch { ticker, start, end } => fetch(&cli.data_dir, &ticker, start, end).await,
        Commands::Ingest => {
            let (catalog, skipped) = load_catalog_dir(&cli.data_dir)?;
            for ticker in catalog.tickers() {
                let count = catalog.record_count(ticker);
                match (catalog.earliest_date(ticker), catalog.latest_date(ticker)) {
                    (Some(first), Some(last)) => {
                        println!("{ticker}: {count} bars, {first}..{last}")
                    }
                    _ => println!("{ticker}: no bars"),
                }
            }
            if skipped > 0 {
                println!("skipped {skipped} malformed rows");
            }
            Ok(())
        }
        Commands::MovingAverage {
            ticker,
            date,
            window,
        } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let avg = moving_average(&catalog, &ticker, date, window);
            println!("{window}-day moving average for {ticker} at {date}: {avg:.4}");
            Ok(())
        }
        Commands::Crossovers {
            ticker,
            start,
            end,
            window,
        } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let dates = crossovers(&catalog, &ticker, start, end, window)?;
            if dates.is_empty() {
                println!("no {window}-day crossovers for {ticker} in {start}..{end}");
            }
            for date in dates {
                println!("{date}");
            }
            Ok(())
        }
        Commands::Performance { ticker, start, end } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let delta = performance(&catalog, &ticker, start, end)?;
            println!("{ticker} performance {start}..{end}: {delta:+.4}");
            Ok(())
        }
        Commands::Buy {
            portfolio,
            ticker,
            date,
            shares,
        } => {
            let current = load_or_create(&store, &portfolio)?;
            let ledger = match current.holding(&ticker) {
                Some(existing) => existing.increase(date, shares)?,
                None => ShareLedger::opening(&ticker, date, shares)?,
            };
            let updated = current.with_added(ledger);
            store.save(&updated)?;
            println!("bought {shares} {ticker} at {date} into '{portfolio}'");
            Ok(())
        }
        Commands::Sell {
            portfolio,
            ticker,
            date,
            shares,
        } => {
            let current = store.load(&portfolio)?;
            let ledger = current
                .holding(&ticker)
                .ok_or_else(|| anyhow!("'{portfolio}' does not hold {ticker}"))?
                .decrease(date, shares)?;
            let updated = current.with_added(ledger);
            store.save(&updated)?;
            println!("sold {shares} {ticker} at {date} from '{portfolio}'");
            Ok(())
        }
        Commands::Value { portfolio, date } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let loaded = store.load(&portfolio)?;
            let value = portfolio_value(&catalog, &loaded, date)?;
            println!("'{portfolio}' value at {date}: {value:.2}");
            Ok(())
        }
        Commands::Distribution { portfolio, date } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let loaded = store.load(&portfolio)?;
            if !loaded.is_valid_for_all(&catalog, date) {
                bail!("{date} is not a trading day for every holding of '{portfolio}'");
            }
            let dist = distribution(&catalog, &loaded, date)?;
            for (ticker, value) in &dist.by_ticker {
                println!("{ticker}: {value:.2}");
            }
            println!("total: {:.2}", dist.total);
            Ok(())
        }
        Commands::Series {
            portfolio,
            start,
            end,
        } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let loaded = store.load(&portfolio)?;
            let series = performance_series(&catalog, &loaded, start, end)?;
            for point in &series.points {
                println!("{}: {:.2}", point.date, point.value);
            }
            Ok(())
        }
        Commands::Rebalance {
            portfolio,
            date,
            targets,
        } => {
            let catalog = load_catalog(&cli.data_dir)?;
            let loaded = store.load(&portfolio)?;
            let outcome = rebalance(&catalog, &loaded, date, &allocation(targets))?;
            for trade in &outcome.trades {
                let verb = match trade.action {
                    RebalanceAction::Buy => "bought",
                    RebalanceAction::Sell => "sold",
                };
                println!("{} {:.4} {} ({:.2})", verb, trade.shares, trade.ticker, trade.value);
            }
            store.save(&outcome.portfolio)?;
            println!("'{portfolio}' rebalanced at {date}");
            Ok(())
        }
        Commands::List => {
            for name in store.list()? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn load_catalog(data_dir: &PathBuf) -> Result<PriceCatalog> {
    let (catalog, skipped) = load_catalog_dir(data_dir)?;
    if skipped > 0 {
        info!(skipped, "skipped malformed bar rows during ingest");
    }
    Ok(catalog)
}

fn load_or_create(store: &PortfolioStore, name: &str) -> Result<PortfolioAggregate> {
    if store.contains(name) {
        store.load(name)
    } else {
        Ok(PortfolioAggregate::empty(name))
    }
}

async fn fetch(data_dir: &PathBuf, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
    let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
        .context("ALPHAVANTAGE_API_KEY is not set (see .env)")?;
    let provider = AlphaVantageProvider::new(api_key);

    let bars = provider
        .fetch_daily(&FetchDailyRequest {
            symbols: vec![ticker.to_string()],
            start,
            end,
        })
        .await?;
    info!(count = bars.len(), ticker, "fetched daily bars");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("create data directory '{}'", data_dir.display()))?;
    let path = data_dir.join(format!("{}.csv", ticker.to_ascii_uppercase()));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("open '{}' for writing", path.display()))?;
    writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    let mut rows = 0usize;
    for bar in bars {
        writer.write_record([
            bar.date.to_string(),
            bar.open.clone(),
            bar.high.clone(),
            bar.low.clone(),
            bar.close.clone(),
            bar.volume.to_string(),
        ])?;
        rows += 1;
    }
    writer.flush()?;
    println!("wrote {rows} bars to {}", path.display());
    Ok(())
}

fn parse_target(raw: &str) -> Result<(String, u32), String> {
    let (ticker, pct) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TICKER=PCT, got '{raw}'"))?;
    let pct: u32 = pct
        .trim()
        .parse()
        .map_err(|_| format!("'{pct}' is not a whole-number percentage"))?;
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(format!("expected TICKER=PCT, got '{raw}'"));
    }
    Ok((ticker.to_ascii_uppercase(), pct))
}
