//! Agora daemon: serves the proposal API and the realtime channel.

mod config;
mod shutdown;

use agora_api::AppState;
use agora_chain::ChainClient;
use agora_governance::ProposalService;
use agora_store_lmdb::{LmdbEnvironment, LmdbProposalStore};
use agora_types::SystemClock;
use agora_utils::LogFormat;
use agora_websocket::Broadcaster;
use anyhow::Context;
use clap::Parser;
use config::{DaemonConfig, Overrides, WeightingMode};
use shutdown::ShutdownController;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "agora-daemon", about = "Agora governance proposal server")]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "AGORA_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// HTTP port (the realtime channel is served at /ws on the same port).
    #[arg(long, env = "AGORA_PORT")]
    port: Option<u16>,

    /// Directory of the proposal store.
    #[arg(long, env = "AGORA_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// LMDB map size in MiB.
    #[arg(long, env = "AGORA_MAP_SIZE_MB")]
    map_size_mb: Option<usize>,

    /// Base URL of the chain API used for wallet balances.
    #[arg(long, env = "AGORA_CHAIN_API_URL")]
    chain_api_url: Option<String>,

    /// Seconds before a chain API request is abandoned.
    #[arg(long, env = "AGORA_CHAIN_TIMEOUT_SECS")]
    chain_timeout_secs: Option<u64>,

    /// Seconds before an HTTP request is answered with 408.
    #[arg(long, env = "AGORA_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Accept ballots without a wallet signature.
    #[arg(long, env = "AGORA_ALLOW_ANONYMOUS_VOTES")]
    allow_anonymous_votes: Option<bool>,

    /// Vote weighting for signed ballots.
    #[arg(long, value_enum, env = "AGORA_WEIGHTING")]
    weighting: Option<WeightingMode>,

    /// Balance per unit of vote weight under balance weighting.
    #[arg(long, env = "AGORA_WEIGHT_UNIT")]
    weight_unit: Option<u64>,

    /// Events buffered per realtime client.
    #[arg(long, env = "AGORA_BROADCAST_CAPACITY")]
    broadcast_capacity: Option<usize>,

    /// Log output: "human" or "json".
    #[arg(long, env = "AGORA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "AGORA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Serve Prometheus metrics at /metrics.
    #[arg(long, env = "AGORA_ENABLE_METRICS")]
    enable_metrics: Option<bool>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the server until SIGINT or SIGTERM.
    Run,
    /// Print the effective configuration as TOML and exit.
    Config,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            bind_address: self.bind_address.clone(),
            port: self.port,
            store_path: self.store_path.clone(),
            map_size_mb: self.map_size_mb,
            chain_api_url: self.chain_api_url.clone(),
            chain_timeout_secs: self.chain_timeout_secs,
            request_timeout_secs: self.request_timeout_secs,
            allow_anonymous_votes: self.allow_anonymous_votes,
            weighting: self.weighting,
            weight_unit: self.weight_unit,
            broadcast_capacity: self.broadcast_capacity,
            log_format: self.log_format,
            log_level: self.log_level.clone(),
            enable_metrics: self.enable_metrics,
        }
    }

    fn resolve_config(&self) -> anyhow::Result<DaemonConfig> {
        let base = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)?,
            None => DaemonConfig::default(),
        };
        let config = self.overrides().apply(base);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Run => {
            agora_utils::init_logging(config.log_format, &config.log_level)
                .context("failed to initialise logging")?;
            if let Some(path) = &cli.config {
                info!(path = %path.display(), "loaded config file");
            }
            run(config).await
        }
    }
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let env = LmdbEnvironment::open(&config.store_path, config.map_size_bytes())
        .with_context(|| format!("cannot open store at {}", config.store_path.display()))?;
    let store = Arc::new(LmdbProposalStore::new(env, Arc::new(SystemClock)));

    let policy = config.vote_policy();
    policy.validate()?;
    let mut service = ProposalService::new(store, policy);
    match config.chain_api_url.as_deref() {
        Some(url) if !url.is_empty() => {
            info!(url, "using chain API for wallet balances");
            let chain = ChainClient::with_timeout(url, config.chain_timeout())
                .context("cannot set up the chain API client")?;
            service = service.with_oracle(Arc::new(chain));
        }
        _ => warn!("no chain API configured, balance lookups will answer 503"),
    }

    let broadcaster = Arc::new(Broadcaster::new(config.broadcast_capacity));
    let state = AppState::new(Arc::new(service), broadcaster);
    let app = agora_api::router(state, &config.api_config());

    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .with_context(|| format!("cannot bind {}:{}", config.bind_address, config.port))?;
    info!(
        addr = %listener.local_addr()?,
        store = %config.store_path.display(),
        weighting = ?config.weighting,
        anonymous_votes = config.allow_anonymous_votes,
        metrics = config.enable_metrics,
        "Agora server listening"
    );

    let controller = Arc::new(ShutdownController::new());
    let stopped = controller.signalled();
    let signals = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.wait_for_signal().await })
    };

    agora_api::serve(listener, app, stopped).await?;
    signals.abort();

    info!("Agora daemon exited cleanly");
    Ok(())
}
