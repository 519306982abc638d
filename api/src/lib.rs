//! HTTP API for Agora.
//!
//! Provides endpoints for:
//! - Proposal creation, listing and lookup
//! - Vote casting (anonymous or wallet-signed) and vote receipts
//! - Wallet balances and chain health, proxied to the chain API
//! - Liveness and Prometheus metrics
//!
//! The realtime channel (`/ws`) is mounted on the same router.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use metrics::ApiMetrics;
pub use server::{router, serve, ApiConfig};
pub use state::AppState;
