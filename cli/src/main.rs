//! `agora`: command-line client for an Agora server.

use agora_client::views::{render_detail, render_error, render_panel, render_sidebar};
use agora_client::{
    ApiClient, BallotRequest, ClientError, ProposalDetail, ProposalDraft, ProposalList,
    RealtimeConnection, VoteAction, VoteLedger, VotingPanel, Wallet,
};
use agora_types::{ProposalId, ServerEvent, Timestamp, VoteType};
use agora_utils::LogFormat;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "agora", about = "Browse and vote on Agora governance proposals")]
struct Cli {
    /// Base URL of the Agora server.
    #[arg(long, default_value = "http://127.0.0.1:5001", env = "AGORA_SERVER")]
    server: String,

    /// Wallet key file used to sign ballots.
    #[arg(long, default_value = "agora-wallet.json", env = "AGORA_WALLET")]
    wallet: PathBuf,

    /// Passphrase that seals the wallet key file.
    #[arg(long, env = "AGORA_WALLET_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Local record of the votes cast from this machine.
    #[arg(long, default_value = "agora-votes.json", env = "AGORA_LEDGER")]
    ledger: PathBuf,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 10, env = "AGORA_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Log level for diagnostics on stderr.
    #[arg(long, default_value = "warn", env = "AGORA_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every proposal.
    List,
    /// Show one proposal with its tally and your voting status.
    Show { id: String },
    /// Submit a new proposal.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        summary: String,
        #[arg(long = "abstract")]
        abstract_text: String,
        #[arg(long)]
        full_proposal: String,
        /// Creator address; defaults to the wallet's address.
        #[arg(long)]
        creator: Option<String>,
    },
    /// Cast a vote.
    Vote {
        id: String,
        /// yes, no or abstain.
        vote: String,
        /// Weight you expect the server to apply; the ballot is refused if it differs.
        #[arg(long)]
        weight: Option<u64>,
        /// Vote without signing (only if the server accepts anonymous votes).
        #[arg(long)]
        anonymous: bool,
    },
    /// Print proposals and tallies as they change, until Ctrl-C.
    Watch {
        /// Only follow vote updates for these proposals.
        #[arg(long = "proposal")]
        proposals: Vec<String>,
    },
    /// Create a wallet key file.
    Keygen {
        /// Replace an existing key file.
        #[arg(long)]
        force: bool,
    },
    /// Show a wallet's chain balance.
    Balance {
        /// Wallet address; defaults to the wallet's address.
        wallet: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    agora_utils::init_logging(LogFormat::Human, &cli.log_level)
        .context("failed to initialise logging")?;

    let api = ApiClient::with_timeout(&cli.server, Duration::from_secs(cli.timeout_secs))?;
    debug!(server = api.base_url(), timeout_secs = cli.timeout_secs, "client ready");

    match &cli.command {
        Command::List => {
            let mut list = ProposalList::new();
            list.load(&api).await;
            if let Some(err) = &list.error {
                eprint!("{}", render_error(err));
                bail!("could not list proposals");
            }
            print!("{}", render_sidebar(&list.proposals));
        }
        Command::Show { id } => show(&cli, &api, id).await?,
        Command::Create {
            title,
            summary,
            abstract_text,
            full_proposal,
            creator,
        } => {
            let draft = ProposalDraft {
                title: title.clone(),
                summary: summary.clone(),
                abstract_text: abstract_text.clone(),
                full_proposal: full_proposal.clone(),
            };
            let content = match draft.validate() {
                Ok(content) => content,
                Err(missing) => bail!("required fields are blank: {}", missing.join(", ")),
            };
            let creator = match creator {
                Some(c) => c.clone(),
                None => load_wallet(&cli)?
                    .map(|w| w.address().to_string())
                    .context("pass --creator or create a wallet with `agora keygen`")?,
            };
            let proposal = api.create_proposal(&content, &creator).await?;
            println!("created {}", proposal.id);
        }
        Command::Vote {
            id,
            vote,
            weight,
            anonymous,
        } => cast(&cli, &api, id, vote, *weight, *anonymous).await?,
        Command::Watch { proposals } => watch(&api, proposals).await?,
        Command::Keygen { force } => {
            if cli.wallet.exists() && !force {
                bail!(
                    "{} already exists; pass --force to replace it",
                    cli.wallet.display()
                );
            }
            let passphrase = cli
                .passphrase
                .as_deref()
                .filter(|p| !p.is_empty())
                .context("set a passphrase with --passphrase or AGORA_WALLET_PASSPHRASE")?;
            let wallet = Wallet::generate();
            wallet.save(&cli.wallet, passphrase)?;
            println!("address {}", wallet.address());
            println!("saved to {}", cli.wallet.display());
        }
        Command::Balance { wallet } => {
            let address = match wallet {
                Some(w) => w.clone(),
                None => load_wallet(&cli)?
                    .map(|w| w.address().to_string())
                    .context("pass a wallet address or create one with `agora keygen`")?,
            };
            let info = api.balance(&address).await?;
            println!("{} {}", info.address, info.balance);
        }
    }
    Ok(())
}

/// The wallet at `--wallet`, or `None` when no key file exists there.
fn load_wallet(cli: &Cli) -> anyhow::Result<Option<Wallet>> {
    if !cli.wallet.exists() {
        return Ok(None);
    }
    let passphrase = cli.passphrase.as_deref().with_context(|| {
        format!(
            "{} is sealed; pass --passphrase or set AGORA_WALLET_PASSPHRASE",
            cli.wallet.display()
        )
    })?;
    Ok(Some(Wallet::load(&cli.wallet, passphrase)?))
}

async fn show(cli: &Cli, api: &ApiClient, id: &str) -> anyhow::Result<()> {
    let mut detail = ProposalDetail::new(id);
    detail.load(api).await;
    let proposal = match (&detail.proposal, &detail.error) {
        (Some(p), _) => p.clone(),
        (None, Some(err)) => {
            eprint!("{}", render_error(err));
            bail!("could not load proposal {id}");
        }
        (None, None) => bail!("proposal {id} not loaded"),
    };

    let wallet = load_wallet(cli)?;
    let mut ledger = VoteLedger::open(&cli.ledger)?;
    let mut panel = VotingPanel::new(proposal.id, &ledger);
    if let Some(w) = &wallet {
        panel.sync_with_server(api, w, &mut ledger).await?;
    }

    print!("{}", render_detail(&proposal, Timestamp::now()));
    println!();
    print!(
        "{}",
        render_panel(&proposal, &panel, wallet.as_ref().map(|w| w.address()))
    );
    Ok(())
}

async fn cast(
    cli: &Cli,
    api: &ApiClient,
    id: &str,
    vote: &str,
    weight: Option<u64>,
    anonymous: bool,
) -> anyhow::Result<()> {
    let vote_type: VoteType = vote
        .parse()
        .with_context(|| format!("vote must be yes, no or abstain, not {vote:?}"))?;

    if anonymous {
        let ballot = BallotRequest {
            weight,
            ..BallotRequest::anonymous(vote_type.as_str())
        };
        let proposal = api.cast_vote(id, &ballot).await?;
        let s = proposal.voting_stats;
        println!(
            "recorded; yes {} no {} abstain {} total {}",
            s.yes, s.no, s.abstain, s.total_votes
        );
        return Ok(());
    }

    let proposal_id = ProposalId::parse(id).with_context(|| format!("{id:?} is not a proposal id"))?;
    let wallet = load_wallet(cli)?;
    let mut ledger = VoteLedger::open(&cli.ledger)?;
    debug!(ledger = %cli.ledger.display(), votes = ledger.len(), "vote ledger loaded");
    let mut panel = VotingPanel::new(proposal_id, &ledger);
    if let Some(w) = &wallet {
        panel.sync_with_server(api, w, &mut ledger).await?;
    }

    let mut action = VoteAction::new();
    match panel
        .submit(&mut action, api, vote_type, wallet.as_ref(), weight, &mut ledger)
        .await
    {
        Ok(proposal) => {
            print!(
                "{}",
                render_panel(&proposal, &panel, wallet.as_ref().map(|w| w.address()))
            );
            Ok(())
        }
        Err(ClientError::AlreadyVoted) => bail!("you have already voted on {proposal_id}"),
        Err(ClientError::WalletNotConnected) => bail!(
            "no wallet at {}; run `agora keygen` or vote with --anonymous",
            cli.wallet.display()
        ),
        Err(e) => {
            eprint!("{}", render_error(&e.to_string()));
            Err(e.into())
        }
    }
}

async fn watch(api: &ApiClient, proposals: &[String]) -> anyhow::Result<()> {
    let ids = proposals
        .iter()
        .map(|p| ProposalId::parse(p).with_context(|| format!("{p:?} is not a proposal id")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let conn = RealtimeConnection::connect(&api.realtime_url()).await?;
    let mut events = conn.subscribe();
    if !ids.is_empty() {
        conn.watch_proposals(ids)?;
    }

    let mut list = ProposalList::new();
    list.load(api).await;
    match &list.error {
        Some(err) => eprint!("{}", render_error(err)),
        None => print!("{}", render_sidebar(&list.proposals)),
    }
    println!("-- watching {} (Ctrl-C to stop)", api.realtime_url());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    list.apply(&event);
                    print_event(&event);
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(missed = n, "realtime events dropped");
                    println!("-- missed {n} events, reloading");
                    list.load(api).await;
                    print!("{}", render_sidebar(&list.proposals));
                }
                Err(RecvError::Closed) => {
                    eprintln!("-- connection closed by server");
                    break;
                }
            },
        }
    }

    conn.close().await;
    Ok(())
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::ProposalCreated(p) => println!("new   {}  {}", p.id, p.content.title),
        ServerEvent::VoteUpdate(p) => {
            let s = p.voting_stats;
            println!(
                "vote  {}  yes {} no {} abstain {} total {}",
                p.id, s.yes, s.no, s.abstain, s.total_votes
            );
        }
        ServerEvent::Error { message } => eprintln!("server: {message}"),
        _ => {}
    }
}
