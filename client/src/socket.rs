//! Owned realtime connection.
//!
//! A [`RealtimeConnection`] is created explicitly, handed to whatever needs
//! events, and torn down by [`close`](RealtimeConnection::close) or by being
//! dropped. There is no process-wide socket.

use agora_types::{ClientCommand, ProposalId, ServerEvent};
use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

use crate::ClientError;

/// How long [`RealtimeConnection::connect`] waits for the `connected` greeting.
pub const GREETING_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_BUFFER: usize = 256;

pub struct RealtimeConnection {
    outgoing: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<ServerEvent>,
    /// Receiver created before the reader started, so the first subscriber
    /// sees every event that follows the greeting.
    first: Mutex<Option<broadcast::Receiver<ServerEvent>>>,
    clients_at_connect: usize,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Open the channel at `url` (e.g. `ws://127.0.0.1:5001/ws`) and wait for
    /// the server's greeting.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut source) = stream.split();

        let clients_at_connect = tokio::time::timeout(GREETING_TIMEOUT, read_greeting(&mut source))
            .await
            .map_err(|_| ClientError::Timeout)??;

        let (events, first) = broadcast::channel(EVENT_BUFFER);
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!(error = %e, "realtime send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = {
            let events = events.clone();
            tokio::spawn(async move {
                while let Some(frame) = source.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                            // No subscribers is fine; the event is simply missed.
                            Ok(event) => {
                                let _ = events.send(event);
                            }
                            Err(e) => warn!(error = %e, "unrecognised realtime event"),
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            debug!(error = %e, "realtime receive failed");
                            break;
                        }
                    }
                }
                debug!("realtime reader finished");
            })
        };

        debug!(url, clients = clients_at_connect, "realtime channel connected");
        Ok(Self {
            outgoing,
            events,
            first: Mutex::new(Some(first)),
            clients_at_connect,
            reader,
            writer,
        })
    }

    /// Client count the server reported in its greeting.
    pub fn clients_at_connect(&self) -> usize {
        self.clients_at_connect
    }

    /// A stream of server events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        let first = self.first.lock().ok().and_then(|mut slot| slot.take());
        first.unwrap_or_else(|| self.events.subscribe())
    }

    pub fn is_open(&self) -> bool {
        !self.reader.is_finished() && !self.writer.is_finished()
    }

    pub fn send(&self, command: &ClientCommand) -> Result<(), ClientError> {
        let text = serde_json::to_string(command)
            .map_err(|e| ClientError::Realtime(format!("cannot encode command: {e}")))?;
        self.outgoing
            .send(Message::Text(text))
            .map_err(|_| ClientError::Realtime("connection closed".into()))
    }

    /// Tell the server which wallet this client uses. Only this connection
    /// receives the `wallet_update` reply.
    pub fn announce_wallet(&self, info: serde_json::Value) -> Result<(), ClientError> {
        self.send(&ClientCommand::WalletConnected(info))
    }

    /// Receive `voteUpdate` only for these proposals.
    pub fn watch_proposals(&self, proposals: Vec<ProposalId>) -> Result<(), ClientError> {
        self.send(&ClientCommand::Subscribe { proposals })
    }

    /// Receive every `voteUpdate` again.
    pub fn watch_all(&self) -> Result<(), ClientError> {
        self.send(&ClientCommand::Unsubscribe)
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        self.send(&ClientCommand::Ping)
    }

    /// Send a close frame and stop the background tasks.
    pub async fn close(mut self) {
        let _ = self.outgoing.send(Message::Close(None));
        if tokio::time::timeout(Duration::from_secs(2), &mut self.writer)
            .await
            .is_err()
        {
            self.writer.abort();
        }
        self.reader.abort();
        debug!("realtime channel closed");
    }
}

/// Wait for the `connected` event and return the client count it carries.
async fn read_greeting<S>(source: &mut S) -> Result<usize, ClientError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = source.next().await {
        if let Message::Text(text) = frame? {
            return match serde_json::from_str::<ServerEvent>(&text) {
                Ok(ServerEvent::Connected { clients }) => Ok(clients),
                Ok(other) => Err(ClientError::Realtime(format!(
                    "expected greeting, got {}",
                    other.name()
                ))),
                Err(e) => Err(ClientError::Realtime(format!("bad greeting: {e}"))),
            };
        }
    }
    Err(ClientError::Realtime("closed before greeting".into()))
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
