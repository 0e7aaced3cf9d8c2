// Native binary for Walletdash - CLI host over SQLite

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use walletdash::{
    chains,
    config::{CliArgs, Config},
    format::{format_address, format_compact, format_usd},
    graph::{AggregateFetchFailure, GraphClient, HttpTransport},
    history::{HistoryStore, TxStatus},
    market::{MarketFeed, MarketSnapshot, Origin},
    platform::SqliteStore,
    price,
};

#[derive(Parser, Debug)]
#[command(name = "walletdash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wallet dashboard backend", long_about = None)]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top Uniswap V3 pools by volume
    Pools {
        /// Bypass the cache window
        #[arg(long)]
        refresh: bool,

        /// Re-poll every N seconds until Ctrl+C
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Current ETH/USD spot price
    Price {
        /// Keep polling at the standard price refresh interval until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
    /// Stored transaction history for one account
    History {
        #[arg(long, env = "WALLETDASH_ACCOUNT")]
        account: String,

        #[arg(long, default_value_t = chains::SEPOLIA)]
        chain_id: u64,

        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Print records, newest first
    List,
    /// Remove all records of the account
    Clear,
    /// Collapse duplicate hashes in storage
    Cleanup,
    /// Set the status of a stored transaction
    Status { hash: String, status: TxStatus },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_args(cli.args).context("Failed to load configuration")?;
    cfg.print_summary();

    match cli.command {
        Command::Pools { refresh, watch } => run_pools(&cfg, refresh, watch).await,
        Command::Price { watch } => run_price(&cfg, watch).await,
        Command::History {
            account,
            chain_id,
            action,
        } => run_history(&cfg, &account, chain_id, action),
    }
}

async fn run_pools(cfg: &Config, refresh: bool, watch: Option<u64>) -> Result<()> {
    let transport = HttpTransport::new()?;
    let client = GraphClient::new(transport, cfg.graph_endpoints.clone(), cfg.request_timeout());
    let mut feed = MarketFeed::new(client, cfg.cache_window());

    let Some(every) = watch else {
        let snapshot = feed.refresh(refresh).await.map_err(explain)?;
        print_pools(&snapshot);
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));
    let mut force = refresh;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match feed.refresh(force).await {
                    Ok(snapshot) => print_pools(&snapshot),
                    Err(e) => log::error!("[pools] {}", explain(e)),
                }
                force = false;
                log::info!("[pools] {}", feed.cache_status());
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("[pools] interrupted, exiting");
                return Ok(());
            }
        }
    }
}

/// Replace an aggregate fetch failure with its user-facing hint.
fn explain(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<AggregateFetchFailure>() {
        Some(failure) => {
            log::debug!("[pools] {failure}");
            anyhow::anyhow!(failure.user_message())
        }
        None => err,
    }
}

fn print_pools(snapshot: &MarketSnapshot) {
    if let Some(warning) = &snapshot.warning {
        eprintln!("warning: {warning}");
    }
    let origin = match snapshot.origin {
        Origin::Cached => "cached",
        Origin::Fresh => "live",
        Origin::Stale => "stale",
    };
    println!("Top pools ({origin})");
    println!(
        "{:<16} {:>7} {:>12} {:>12} {:>14}",
        "PAIR", "FEE", "VOLUME", "LIQUIDITY", "POOL"
    );
    for pool in &snapshot.pools {
        let fee = pool
            .fee_percent()
            .map(|f| format!("{f}%"))
            .unwrap_or_else(|| "?".into());
        println!(
            "{:<16} {:>7} {:>12} {:>12} {:>14}",
            pool.pair_label(),
            fee,
            format_usd(&pool.volume_usd, 2),
            format_compact(&pool.liquidity, 2),
            format_address(&pool.id, 4),
        );
    }
}

async fn run_price(cfg: &Config, watch: bool) -> Result<()> {
    let client = reqwest::Client::new();
    if !watch {
        print_price(price::fetch_eth_usd(&client, &cfg.price_url, cfg.request_timeout()).await?);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(price::PRICE_REFRESH_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match price::fetch_eth_usd(&client, &cfg.price_url, cfg.request_timeout()).await {
                    Ok(usd) => print_price(usd),
                    Err(e) => log::error!("[price] {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("[price] interrupted, exiting");
                return Ok(());
            }
        }
    }
}

fn print_price(usd: Option<f64>) {
    match usd {
        Some(usd) => println!("ETH/USD {usd:.2}"),
        None => println!("ETH/USD unavailable"),
    }
}

fn run_history(cfg: &Config, account: &str, chain_id: u64, action: HistoryAction) -> Result<()> {
    let storage = SqliteStore::open(&cfg.db_path)?;
    let mut store = HistoryStore::new(storage, cfg.history_cap);

    match action {
        HistoryAction::List => {
            let records = store.load(account, chain_id);
            if records.is_empty() {
                println!("no transactions for {} on chain {chain_id}", format_address(account, 4));
            }
            for r in &records {
                let when = chrono::DateTime::from_timestamp_millis(r.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "{when}  {:<9} {:<20} {} {}",
                    r.status.to_string(),
                    format!("{:?}", r.kind),
                    format_address(&r.hash, 6),
                    r.explorer_url.as_deref().unwrap_or(""),
                );
            }
        }
        HistoryAction::Clear => {
            store.clear(account);
            println!("history cleared for {}", format_address(account, 4));
        }
        HistoryAction::Cleanup => match store.cleanup_duplicates(account, chain_id) {
            Some(report) => println!("cleanup: {} -> {} records", report.before, report.after),
            None => println!("nothing to clean up"),
        },
        HistoryAction::Status { hash, status } => {
            if store.update_status(account, chain_id, &hash, status) {
                println!("{} -> {status}", format_address(&hash, 6));
            } else {
                println!("no stored transaction {hash}");
            }
        }
    }
    Ok(())
}
