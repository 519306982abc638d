//! Realtime wire events.
//!
//! Every WebSocket text frame carries one event, adjacently tagged:
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::{Proposal, ProposalId};

/// Server → client events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Greeting sent once the connection receives broadcasts.
    #[serde(rename = "connected")]
    Connected { clients: usize },
    #[serde(rename = "proposalCreated")]
    ProposalCreated(Proposal),
    #[serde(rename = "voteUpdate")]
    VoteUpdate(Proposal),
    /// Reply to `wallet_connected`, delivered to the announcing connection only.
    #[serde(rename = "wallet_update")]
    WalletUpdate(serde_json::Value),
    #[serde(rename = "ack")]
    Ack { action: String },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ProposalCreated(_) => "proposalCreated",
            Self::VoteUpdate(_) => "voteUpdate",
            Self::WalletUpdate(_) => "wallet_update",
            Self::Ack { .. } => "ack",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }

    /// The proposal this event concerns, if any.
    pub fn proposal_id(&self) -> Option<ProposalId> {
        match self {
            Self::ProposalCreated(p) | Self::VoteUpdate(p) => Some(p.id),
            _ => None,
        }
    }
}

/// Client → server commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    /// Opaque wallet info announced by the client.
    #[serde(rename = "wallet_connected")]
    WalletConnected(serde_json::Value),
    /// Restrict `voteUpdate` events to these proposals.
    #[serde(rename = "subscribe")]
    Subscribe { proposals: Vec<ProposalId> },
    /// Drop any restriction and receive every event again.
    #[serde(rename = "unsubscribe")]
    Unsubscribe,
    #[serde(rename = "ping")]
    Ping,
}
