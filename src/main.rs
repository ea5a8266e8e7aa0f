use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tokenomy_client::types::{format_f64, Pair};
use tokenomy_client::{
    sign, Environment, PublicEvent, PublicWebSocket, TokenomyClient, TokenomyV1Client,
};

#[derive(Parser)]
#[command(name = "tokenomy")]
#[command(version = "0.1.0")]
#[command(about = "Command line client for the Tokenomy exchange", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOKENOMY_* variables override it)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show last prices of every pair
    Prices,
    /// Show the 24h ticker of a pair
    Ticker {
        /// Pair name, e.g. ten_btc
        pair: String,
        /// Query the v1 trade API instead of v2
        #[arg(long)]
        legacy: bool,
    },
    /// Show the order book of a pair
    Depth {
        pair: String,
        /// Number of levels per side
        #[arg(short, long, default_value = "10")]
        levels: usize,
    },
    /// Show market summaries
    Summaries,
    /// Show account balances (requires API keys)
    Balances,
    /// Show open orders of a pair (requires API keys)
    OpenOrders {
        pair: String,
    },
    /// Stream depth and trade updates of a pair over WebSocket
    Watch {
        pair: String,
        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Sign a payload with the configured secret
    Sign {
        payload: String,
    },
    /// Format a number the way the exchange expects it
    Format {
        value: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let env = Environment::load(cli.config.as_deref())?;
    if env.debug > 0 {
        info!("Environment: {:?}", env);
    }

    match cli.command {
        Commands::Prices => show_prices(env).await?,
        Commands::Ticker { pair, legacy } => show_ticker(env, &pair, legacy).await?,
        Commands::Depth { pair, levels } => show_depth(env, &pair, levels).await?,
        Commands::Summaries => show_summaries(env).await?,
        Commands::Balances => show_balances(env).await?,
        Commands::OpenOrders { pair } => show_open_orders(env, &pair).await?,
        Commands::Watch { pair, seconds } => watch(env, &pair, seconds).await?,
        Commands::Sign { payload } => {
            if env.secret.is_empty() {
                bail!("TOKENOMY_SECRET is not set");
            }
            println!("{}", sign(&payload, &env.secret));
        }
        Commands::Format { value } => println!("{}", format_f64(value)),
    }

    Ok(())
}

async fn show_prices(env: Environment) -> Result<()> {
    let client = TokenomyClient::new(env)?;
    let prices = client.market_prices().await?;

    let mut pairs: Vec<_> = prices.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    println!("\n=== Current Prices ===");
    for (pair, price) in pairs {
        println!("{:<12} {}", pair, price);
    }
    Ok(())
}

async fn show_ticker(env: Environment, pair: &str, legacy: bool) -> Result<()> {
    if !env.is_valid_pair_name(pair) {
        warn!("{} is not a known pair, asking the server anyway", pair);
    }

    println!("\n=== {} ===", pair);
    if legacy {
        let tick = TokenomyV1Client::new(env)?.market_ticker(pair).await?;
        println!("Last:   {}", tick.last);
        println!("Buy:    {}", tick.buy);
        println!("Sell:   {}", tick.sell);
        println!("High:   {}", tick.high);
        println!("Low:    {}", tick.low);
        println!("Volume: {} / {}", tick.coin_volume(), tick.base_volume());
        return Ok(());
    }

    let tick = TokenomyClient::new(env)?.market_ticker(pair).await?;
    println!("Last:   {}", tick.last_price);
    println!("Bid:    {}", tick.bid);
    println!("Ask:    {}", tick.ask);
    println!("High:   {}", tick.high);
    println!("Low:    {}", tick.low);
    match pair.parse::<Pair>() {
        Ok(p) => println!("Volume: {} {} / {} {}", tick.volume_coin, p.coin(), tick.volume_base, p.base()),
        Err(_) => println!("Volume: {} / {}", tick.volume_coin, tick.volume_base),
    }
    Ok(())
}

async fn show_depth(env: Environment, pair: &str, levels: usize) -> Result<()> {
    let client = TokenomyClient::new(env)?;
    let depths = client.market_depths(pair).await?;

    println!("\n=== {} order book ===", pair);
    println!("{:>20} {:>20}", "price", "amount");
    for ask in depths.asks.iter().take(levels).rev() {
        println!("{:>20} {:>20}  ask", ask.price, ask.amount);
    }
    println!("{}", "-".repeat(46));
    for bid in depths.bids.iter().take(levels) {
        println!("{:>20} {:>20}  bid", bid.price, bid.amount);
    }
    Ok(())
}

async fn show_summaries(env: Environment) -> Result<()> {
    let client = TokenomyClient::new(env)?;
    let summaries = client.market_summaries().await?;

    let mut tickers: Vec<_> = summaries.tickers.into_iter().collect();
    tickers.sort_by(|a, b| a.0.cmp(&b.0));

    println!("\n=== Market Summaries ===");
    for (pair, tick) in tickers {
        let change = summaries
            .prices_changes
            .get(&pair)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<12} last {:<16} high {:<16} low {:<16} change {}",
            pair, tick.last_price, tick.high, tick.low, change
        );
    }
    Ok(())
}

async fn show_balances(env: Environment) -> Result<()> {
    let client = TokenomyClient::new(env)?;
    let user = client.authenticate().await?;

    let mut assets: Vec<_> = user.assets.balances.keys().collect();
    assets.extend(user.assets.frozen_balances.keys());
    assets.sort();
    assets.dedup();

    println!("\n=== Balances of {} ===", user.email);
    println!("{:<8} {:>20} {:>20}", "asset", "available", "frozen");
    for asset in assets {
        let (balance, frozen) = (user.assets.balance(asset), user.assets.frozen(asset));
        if balance.is_zero() && frozen.is_zero() {
            continue;
        }
        println!("{:<8} {:>20} {:>20}", asset, balance, frozen);
    }
    Ok(())
}

async fn show_open_orders(env: Environment, pair: &str) -> Result<()> {
    let client = TokenomyClient::new(env)?;
    let open = client.user_orders_open(pair).await?;

    for (pair, trades) in open {
        println!("\n=== Open orders {} ({}) ===", pair, trades.len());
        for t in trades.asks.iter().chain(trades.bids.iter()) {
            println!(
                "#{:<10} {:<5} price {:<16} amount {:<16} filled {}",
                t.id,
                t.trade_type.map(|t| t.as_str()).unwrap_or("-"),
                t.price,
                t.coin_amount,
                t.coin_filled
            );
        }
    }
    Ok(())
}

async fn watch(env: Environment, pair: &str, seconds: Option<u64>) -> Result<()> {
    let (ws, mut events) = PublicWebSocket::connect(&env).await?;
    ws.subscribe_depths(&[pair]).await?;
    let subs = ws.subscribe_trades(&[pair]).await?;
    info!("Subscribed to depths {:?} and trades {:?}", subs.depths, subs.trades);

    let deadline = tokio::time::sleep(seconds.map(Duration::from_secs).unwrap_or(Duration::MAX));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(PublicEvent::Depths(d)) => {
                    let ask = d.best_ask().map(|a| a.price.to_string()).unwrap_or_default();
                    let bid = d.best_bid().map(|b| b.price.to_string()).unwrap_or_default();
                    println!("[depth] {} bid {} ask {}", d.pair, bid, ask);
                }
                Some(PublicEvent::Trade(t)) => {
                    println!(
                        "[trade] {} #{} {} {} @ {} ({})",
                        t.pair,
                        t.id,
                        t.trade_type.map(|t| t.as_str()).unwrap_or("-"),
                        t.coin_amount,
                        t.price,
                        t.status
                    );
                }
                None => {
                    error!("Event stream closed");
                    break;
                }
            },
        }
    }

    if let Err(e) = ws.unsubscribe_depths(&[]).await {
        warn!("Failed to unsubscribe depths: {}", e);
    }
    if let Err(e) = ws.unsubscribe_trades(&[]).await {
        warn!("Failed to unsubscribe trades: {}", e);
    }
    ws.close().await;
    Ok(())
}
