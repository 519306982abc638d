//! Realtime updates over WebSockets.
//!
//! Every connection receives:
//! - `proposalCreated` for each new proposal
//! - `voteUpdate` for each successful vote, optionally restricted to a set of
//!   proposals with a `subscribe` command
//!
//! Delivery is best-effort. A client that disconnects or lags misses events
//! and reconciles on its next fetch.

pub mod server;
pub mod subscriptions;

pub use server::{router, Broadcaster, OutboundEvent};
pub use subscriptions::ProposalFilter;
