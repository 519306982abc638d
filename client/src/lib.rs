//! Client library for Agora.
//!
//! - [`ApiClient`]: typed HTTP client for the proposal API
//! - [`RealtimeConnection`]: owned WebSocket connection with explicit lifecycle
//! - Hooks ([`ProposalList`], [`ProposalDetail`], [`VoteAction`]) holding the
//!   state a view renders
//! - [`VotingPanel`] state machine and the local [`VoteLedger`]
//! - [`Wallet`] for signing ballots, stored in an encrypted [`keystore`]
//! - Plain-text [`views`]

pub mod api;
pub mod error;
pub mod hooks;
pub mod keystore;
pub mod ledger;
pub mod panel;
pub mod socket;
pub mod views;
pub mod wallet;

pub use api::{ApiClient, BallotRequest, WalletBalance};
pub use error::ClientError;
pub use hooks::{ProposalDetail, ProposalList, VoteAction};
pub use ledger::{LedgerEntry, VoteLedger};
pub use panel::{PanelState, VotingPanel};
pub use socket::RealtimeConnection;
pub use views::ProposalDraft;
pub use wallet::Wallet;
