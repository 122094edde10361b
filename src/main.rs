use clap::Parser;
use faircore::api::server::ApiServer;
use faircore::{
    BalanceLedger, BetService, ConfigLoader, RecordStore, ReplayService, RoundLog,
    SeedPairManager,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "faircore", about = "Provably-fair gaming engine", version)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the storage directory.
    #[arg(long)]
    data_dir: Option<String>,

    /// Override the API port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faircore=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    info!("Opening record store at {}", config.storage.data_dir);
    let store = RecordStore::open(&config.storage.data_dir, config.storage.sync_writes)?;

    let seeds = Arc::new(SeedPairManager::new(store.clone()));
    let ledger = Arc::new(BalanceLedger::new(store.clone(), config.ledger.clone()));
    let rounds = Arc::new(RoundLog::open(store)?);
    let bets = BetService::new(seeds.clone(), ledger.clone(), rounds.clone());
    let replay = ReplayService::new(rounds, seeds.clone());

    ApiServer::new(config.api, bets, seeds, ledger, replay)
        .run()
        .await
}
