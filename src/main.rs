use anyhow::Context;
use clap::{Parser, Subcommand};
use hypeharvest::domain::Address;
use hypeharvest::{
    api, config::Config, db::init_db, HarvestPool, HyperliquidClientFactory, ProxyDirectory,
    Repository, TradeRebuilder,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "hypeharvest")]
#[command(about = "Hyperliquid fill harvester and trade rebuilder")]
struct Cli {
    /// Override HARVEST_WORKERS
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Override REQUEST_DELAY_MS
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch new fills for every tracked address
    Harvest,
    /// Rebuild completed trades from stored fills
    Rebuild {
        /// Only rebuild this address
        #[arg(long)]
        address: Option<String>,
    },
    /// Serve the read-only HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Configuration error")?;
    if let Some(workers) = cli.workers {
        anyhow::ensure!(workers >= 1, "--workers must be >= 1");
        config.harvest_workers = workers;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.request_delay_ms = delay_ms;
    }

    // Store connectivity failures abort before any work starts
    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let seeds = parse_addresses(&config.tracked_addresses)?;
    if !seeds.is_empty() {
        let added = repo.upsert_tracked_addresses(&seeds).await?;
        tracing::info!("Seeded {} new tracked addresses", added);
    }

    match cli.command {
        Command::Harvest => run_harvest(repo, &config).await,
        Command::Rebuild { address } => run_rebuild(&repo, address.as_deref()).await,
        Command::Serve => serve(repo, &config).await,
    }
}

async fn run_harvest(repo: Arc<Repository>, config: &Config) -> anyhow::Result<()> {
    let proxies = ProxyDirectory::load(&repo)
        .await
        .context("Failed to load proxy directory")?;
    let addresses = repo.load_tracked_addresses().await?;

    let factory = Arc::new(HyperliquidClientFactory {
        base_url: config.hyperliquid_api_url.clone(),
        leaderboard_url: config.leaderboard_url.clone(),
        timeout: config.request_timeout(),
    });
    let pool = HarvestPool::new(repo, factory, proxies, config.harvest_config());

    let summary = pool.run(addresses).await;
    println!(
        "processed={} fills_saved={} failed={} already_current={} unreached={}",
        summary.processed,
        summary.fills_saved,
        summary.failed,
        summary.skipped_current,
        summary.unreached()
    );
    Ok(())
}

async fn run_rebuild(repo: &Repository, address: Option<&str>) -> anyhow::Result<()> {
    match address {
        Some(raw) => {
            let address = Address::parse(raw)?;
            let report = TradeRebuilder::rebuild(repo, &address).await?;
            println!(
                "fills={} trades={} orphan_closes={} skipped_fills={} open_positions={}",
                report.fills,
                report.trades,
                report.orphan_closes,
                report.skipped_fills,
                report.open_positions
            );
        }
        None => {
            let addresses = repo.load_tracked_addresses().await?;
            let rebuilt = TradeRebuilder::rebuild_all(repo, &addresses).await;
            println!("rebuilt={}/{}", rebuilt, addresses.len());
        }
    }
    Ok(())
}

async fn serve(repo: Arc<Repository>, config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let app = api::create_router(api::AppState::new(repo));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn parse_addresses(raw: &[String]) -> anyhow::Result<Vec<Address>> {
    raw.iter()
        .map(|s| Address::parse(s).with_context(|| format!("Bad tracked address {}", s)))
        .collect()
}
