//! WebSocket endpoint and the broadcaster behind it.
//!
//! Accepts WebSocket connections at `/ws`. Each connection gets a forwarder
//! task that reads the shared broadcast channel and sends the events its
//! filter allows. Client commands are handled on the connection task itself.

use agora_types::{ClientCommand, Proposal, ProposalId, ServerEvent};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, warn};

use crate::ProposalFilter;

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// An event serialized once and shared by every connection.
#[derive(Debug)]
pub struct OutboundEvent {
    pub name: &'static str,
    /// Proposal the event is scoped to, for filtering. `None` reaches everyone.
    pub scope: Option<ProposalId>,
    pub payload: String,
}

/// Fans store mutations out to every connected client.
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<OutboundEvent>>,
    clients: AtomicUsize,
}

impl Broadcaster {
    /// Create a broadcaster whose per-client backlog holds `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            clients: AtomicUsize::new(0),
        }
    }

    /// Emit `proposalCreated` to every connection.
    pub fn publish_proposal_created(&self, proposal: &Proposal) -> usize {
        self.publish(&ServerEvent::ProposalCreated(proposal.clone()), None)
    }

    /// Emit `voteUpdate` to every connection whose filter includes the proposal.
    pub fn publish_vote_update(&self, proposal: &Proposal) -> usize {
        self.publish(&ServerEvent::VoteUpdate(proposal.clone()), Some(proposal.id))
    }

    /// Returns the number of connections the event was queued for.
    fn publish(&self, event: &ServerEvent, scope: Option<ProposalId>) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to serialize event");
                return 0;
            }
        };
        let outbound = Arc::new(OutboundEvent {
            name: event.name(),
            scope,
            payload,
        });
        // No receivers is not an error; nobody is listening right now.
        self.tx.send(outbound).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OutboundEvent>> {
        self.tx.subscribe()
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    fn register(self: &Arc<Self>) -> ClientGuard {
        self.clients.fetch_add(1, Ordering::SeqCst);
        ClientGuard(Arc::clone(self))
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Keeps the client count honest however the connection ends.
struct ClientGuard(Arc<Broadcaster>);

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.0.clients.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Router serving `/ws`. Merge it into the HTTP router.
pub fn router<S>(broadcaster: Arc<Broadcaster>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(broadcaster)
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Arc<Broadcaster>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

/// Handle a single WebSocket connection.
///
/// The flow:
/// 1. Subscribe to the broadcast channel, then greet with `connected`, so
///    every event published after the greeting reaches this client.
/// 2. Spawn the forwarder, which applies the connection's current filter.
/// 3. Answer client commands until the client goes away.
/// 4. Abort the forwarder.
async fn handle_socket(socket: WebSocket, broadcaster: Arc<Broadcaster>) {
    let _guard = broadcaster.register();
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSink = Arc::new(Mutex::new(ws_sender));

    let rx = broadcaster.subscribe();
    let greeting = ServerEvent::Connected {
        clients: broadcaster.connected_clients(),
    };
    if !send_event(&ws_sender, &greeting).await {
        return;
    }

    let (filter_tx, filter_rx) = watch::channel(ProposalFilter::All);
    let forwarder = tokio::spawn(forward_events(rx, ws_sender.clone(), filter_rx));

    debug!(clients = broadcaster.connected_clients(), "realtime client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                if !handle_text_message(&text, &filter_tx, &ws_sender).await {
                    break;
                }
            }
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    forwarder.abort();
    debug!("realtime client disconnected");
}

/// Process one text frame. Returns `false` once the client is unreachable.
async fn handle_text_message(
    text: &str,
    filter_tx: &watch::Sender<ProposalFilter>,
    ws_sender: &WsSink,
) -> bool {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            let reply = ServerEvent::Error {
                message: format!("invalid message: {e}"),
            };
            return send_event(ws_sender, &reply).await;
        }
    };

    let reply = match command {
        ClientCommand::WalletConnected(info) => {
            debug!("wallet announced on realtime channel");
            // Echoed to the announcing connection only.
            ServerEvent::WalletUpdate(info)
        }
        ClientCommand::Subscribe { proposals } => {
            debug!(count = proposals.len(), "client narrowed vote updates");
            filter_tx.send_replace(ProposalFilter::only(proposals));
            ServerEvent::Ack {
                action: "subscribe".to_string(),
            }
        }
        ClientCommand::Unsubscribe => {
            filter_tx.send_replace(ProposalFilter::All);
            ServerEvent::Ack {
                action: "unsubscribe".to_string(),
            }
        }
        ClientCommand::Ping => ServerEvent::Pong,
    };
    send_event(ws_sender, &reply).await
}

async fn send_event(ws_sender: &WsSink, event: &ServerEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(t) => t,
        Err(e) => {
            warn!(event = event.name(), error = %e, "failed to serialize event");
            return true;
        }
    };
    let mut sender = ws_sender.lock().await;
    sender.send(Message::Text(text)).await.is_ok()
}

/// Forwarder task: reads events from the broadcast receiver and sends the
/// ones the connection's filter allows.
async fn forward_events(
    mut rx: broadcast::Receiver<Arc<OutboundEvent>>,
    ws_sender: WsSink,
    filter: watch::Receiver<ProposalFilter>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let allowed = filter.borrow().allows(&event);
                if !allowed {
                    continue;
                }
                let mut sender = ws_sender.lock().await;
                if sender
                    .send(Message::Text(event.payload.clone()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "realtime client lagged, oldest events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("broadcast channel closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::{ProposalContent, Timestamp, VotingStats, WalletAddress};

    fn proposal() -> Proposal {
        Proposal {
            id: ProposalId::new(ulid::Ulid::new()),
            content: ProposalContent {
                title: "T".into(),
                summary: "S".into(),
                abstract_text: "A".into(),
                full_proposal: "F".into(),
            },
            voting_stats: VotingStats::default(),
            creator: WalletAddress::parse("addr1").unwrap(),
            created_at: Timestamp::new(1),
            updated_at: Timestamp::new(1),
        }
    }

    #[test]
    fn publish_without_listeners_is_fine() {
        let b = Broadcaster::new(8);
        assert_eq!(b.publish_proposal_created(&proposal()), 0);
    }

    #[tokio::test]
    async fn events_are_serialized_once_and_scoped() {
        let b = Broadcaster::new(8);
        let mut rx = b.subscribe();
        let p = proposal();

        assert_eq!(b.publish_proposal_created(&p), 1);
        b.publish_vote_update(&p);

        let created = rx.recv().await.unwrap();
        assert_eq!(created.name, "proposalCreated");
        assert_eq!(created.scope, None);
        let v: serde_json::Value = serde_json::from_str(&created.payload).unwrap();
        assert_eq!(v["event"], "proposalCreated");
        assert_eq!(v["data"]["id"], p.id.to_string());

        let update = rx.recv().await.unwrap();
        assert_eq!(update.name, "voteUpdate");
        assert_eq!(update.scope, Some(p.id));
    }

    #[test]
    fn guard_tracks_client_count() {
        let b = Arc::new(Broadcaster::new(8));
        let g1 = b.register();
        let g2 = b.register();
        assert_eq!(b.connected_clients(), 2);
        drop(g1);
        assert_eq!(b.connected_clients(), 1);
        drop(g2);
        assert_eq!(b.connected_clients(), 0);
    }
}
