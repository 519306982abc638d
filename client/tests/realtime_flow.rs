//! End-to-end: the client library against a real server on 127.0.0.1:0.

use agora_api::{router, ApiConfig, AppState};
use agora_client::{
    ApiClient, BallotRequest, ClientError, PanelState, ProposalDetail, ProposalDraft,
    ProposalList, RealtimeConnection, VoteAction, VoteLedger, VotingPanel, Wallet,
};
use agora_governance::{ProposalService, VotePolicy, WeightPolicy};
use agora_nullables::{NullBalanceOracle, NullProposalStore};
use agora_types::{ProposalContent, ServerEvent, VoteType};
use agora_websocket::Broadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

struct Server {
    api: ApiClient,
    broadcaster: Arc<Broadcaster>,
    _stop: oneshot::Sender<()>,
}

async fn start(service: ProposalService) -> Server {
    let broadcaster = Arc::new(Broadcaster::new(64));
    let state = AppState::new(Arc::new(service), broadcaster.clone());
    let app = router(state, &ApiConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(agora_api::serve(listener, app, async move {
        let _ = stopped.await;
    }));
    Server {
        api: ApiClient::new(format!("http://{addr}")).unwrap(),
        broadcaster,
        _stop: stop,
    }
}

async fn start_default() -> Server {
    start(ProposalService::new(
        Arc::new(NullProposalStore::new()),
        VotePolicy::default(),
    ))
    .await
}

fn content(title: &str) -> ProposalContent {
    ProposalDraft {
        title: title.into(),
        summary: "S".into(),
        abstract_text: "A".into(),
        full_proposal: "F".into(),
    }
    .validate()
    .unwrap()
}

async fn next_event(rx: &mut broadcast::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within 5s")
        .expect("event stream closed")
}

#[tokio::test(flavor = "multi_thread")]
async fn hooks_follow_creation_and_votes() {
    let server = start_default().await;
    let api = &server.api;
    let conn = RealtimeConnection::connect(&api.realtime_url()).await.unwrap();
    let mut events = conn.subscribe();

    let mut list = ProposalList::new();
    list.load(api).await;
    assert!(list.error.is_none());
    assert!(list.proposals.is_empty());

    let created = api.create_proposal(&content("T"), "addr1").await.unwrap();
    assert_eq!(created.voting_stats.total_votes, 0);
    let event = next_event(&mut events).await;
    assert!(matches!(&event, ServerEvent::ProposalCreated(p) if p.id == created.id));
    assert!(list.apply(&event));
    assert_eq!(list.proposals.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let mut ledger = VoteLedger::open(dir.path().join("votes.json")).unwrap();
    let wallet = Wallet::from_seed(&[21u8; 32]);
    let mut panel = VotingPanel::new(created.id, &ledger);
    let mut action = VoteAction::new();

    let voted = panel
        .submit(&mut action, api, VoteType::Yes, Some(&wallet), None, &mut ledger)
        .await
        .unwrap();
    assert_eq!(voted.voting_stats.yes, 1);
    assert_eq!(voted.voting_stats.total_votes, 1);
    assert_eq!(panel.state(), PanelState::Voted(Some(VoteType::Yes)));
    assert!(ledger.has_voted(&created.id));

    let update = next_event(&mut events).await;
    assert!(list.apply(&update));
    assert_eq!(list.proposals[0].voting_stats, voted.voting_stats);

    // The pushed tally matches what a fresh fetch returns.
    let mut detail = ProposalDetail::new(created.id.to_string());
    detail.load(api).await;
    assert_eq!(
        detail.proposal.as_ref().unwrap().voting_stats,
        list.proposals[0].voting_stats
    );

    // A second device with an empty ledger learns about the vote from the server.
    let mut other_ledger = VoteLedger::in_memory();
    let mut other_panel = VotingPanel::new(created.id, &other_ledger);
    assert!(other_panel.can_vote());
    other_panel
        .sync_with_server(api, &wallet, &mut other_ledger)
        .await
        .unwrap();
    assert_eq!(other_panel.state(), PanelState::Voted(Some(VoteType::Yes)));

    let err = action
        .vote(api, &created.id, VoteType::No, Some(&wallet), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AlreadyVoted));
    assert_eq!(api.get_proposal(&created.id.to_string()).await.unwrap().voting_stats.total_votes, 1);

    conn.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn vote_without_wallet_changes_nothing() {
    let server = start_default().await;
    let created = server.api.create_proposal(&content("T"), "addr1").await.unwrap();

    let mut ledger = VoteLedger::in_memory();
    let mut panel = VotingPanel::new(created.id, &ledger);
    let mut action = VoteAction::new();
    let err = panel
        .submit(&mut action, &server.api, VoteType::Yes, None, None, &mut ledger)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::WalletNotConnected));
    assert!(panel.can_vote());
    let fetched = server.api.get_proposal(&created.id.to_string()).await.unwrap();
    assert_eq!(fetched.voting_stats.total_votes, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn wallet_update_reaches_only_the_announcer() {
    let server = start_default().await;
    let url = server.api.realtime_url();
    let alice = RealtimeConnection::connect(&url).await.unwrap();
    let bob = RealtimeConnection::connect(&url).await.unwrap();
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    let wallet = Wallet::from_seed(&[5u8; 32]);
    alice.announce_wallet(wallet.announcement()).unwrap();
    match next_event(&mut alice_events).await {
        ServerEvent::WalletUpdate(info) => {
            assert_eq!(info["address"], wallet.address().as_str())
        }
        other => panic!("expected wallet_update, got {other:?}"),
    }

    // Bob's next frame is the answer to his own ping, nothing in between.
    bob.ping().unwrap();
    assert_eq!(next_event(&mut bob_events).await, ServerEvent::Pong);
}

#[tokio::test(flavor = "multi_thread")]
async fn watching_narrows_vote_updates() {
    let server = start_default().await;
    let api = &server.api;
    let watched = api.create_proposal(&content("watched"), "addr1").await.unwrap();
    let ignored = api.create_proposal(&content("ignored"), "addr1").await.unwrap();

    let conn = RealtimeConnection::connect(&api.realtime_url()).await.unwrap();
    let mut events = conn.subscribe();
    conn.watch_proposals(vec![watched.id]).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ServerEvent::Ack {
            action: "subscribe".into()
        }
    );

    api.cast_vote(&ignored.id.to_string(), &BallotRequest::anonymous("no"))
        .await
        .unwrap();
    api.cast_vote(&watched.id.to_string(), &BallotRequest::anonymous("yes"))
        .await
        .unwrap();
    match next_event(&mut events).await {
        ServerEvent::VoteUpdate(p) => assert_eq!(p.id, watched.id),
        other => panic!("expected voteUpdate, got {other:?}"),
    }

    // New proposals are always delivered.
    let fresh = api.create_proposal(&content("fresh"), "addr1").await.unwrap();
    assert!(matches!(next_event(&mut events).await, ServerEvent::ProposalCreated(p) if p.id == fresh.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn balance_weighting_end_to_end() {
    let wallet = Wallet::from_seed(&[8u8; 32]);
    let oracle = Arc::new(NullBalanceOracle::new().with_balance(wallet.address(), 730));
    let service = ProposalService::new(
        Arc::new(NullProposalStore::new()),
        VotePolicy {
            allow_anonymous: false,
            weighting: WeightPolicy::Balance { unit: 100 },
        },
    )
    .with_oracle(oracle);
    let server = start(service).await;
    let api = &server.api;

    let balance = api.balance(wallet.address().as_str()).await.unwrap();
    assert_eq!(balance.balance, 730);

    let created = api.create_proposal(&content("T"), "addr1").await.unwrap();
    let mut action = VoteAction::new();

    // A claimed weight that disagrees with the server is refused.
    let err = action
        .vote(api, &created.id, VoteType::Yes, Some(&wallet), Some(1_000))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(action.error.is_some());

    let voted = action
        .vote(api, &created.id, VoteType::Yes, Some(&wallet), Some(7))
        .await
        .unwrap();
    assert_eq!(voted.voting_stats.yes, 7);
    assert!(action.error.is_none());

    let receipt = api
        .receipt(&created.id.to_string(), wallet.address().as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.weight, 7);

    let err = api
        .cast_vote(&created.id.to_string(), &BallotRequest::anonymous("no"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_messages_reach_hooks_verbatim() {
    let server = start_default().await;

    let mut detail = ProposalDetail::new("01HZY3J6X8Q2V9T4M7N5K1B0CD");
    detail.load(&server.api).await;
    assert!(detail.proposal.is_none());
    assert!(detail.error.is_some());

    let blank = ProposalContent {
        title: "  ".into(),
        ..content("T")
    };
    let err = server.api.create_proposal(&blank, "addr1").await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "title is required");
    assert!(server.api.list_proposals().await.unwrap().is_empty());

    let missing = server
        .api
        .receipt("01HZY3J6X8Q2V9T4M7N5K1B0CD", "addr1")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_server_times_out() {
    use axum::routing::get;

    let app = axum::Router::new().route(
        "/api/proposals",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "[]"
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let api = ApiClient::with_timeout(format!("http://{addr}"), Duration::from_millis(200)).unwrap();
    let mut list = ProposalList::new();
    list.load(&api).await;
    assert_eq!(list.error.as_deref(), Some("request timed out"));
    assert!(!list.loading);
}

#[tokio::test(flavor = "multi_thread")]
async fn closing_releases_the_server_slot() {
    let server = start_default().await;
    let conn = RealtimeConnection::connect(&server.api.realtime_url()).await.unwrap();
    assert_eq!(conn.clients_at_connect(), 1);
    assert!(conn.is_open());
    conn.close().await;

    for _ in 0..50 {
        if server.broadcaster.connected_clients() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server still counts the closed connection");
}
