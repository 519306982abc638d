//! Shared handler state.

use agora_governance::ProposalService;
use agora_websocket::Broadcaster;
use std::sync::Arc;

use crate::ApiMetrics;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProposalService>,
    pub broadcaster: Arc<Broadcaster>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(service: Arc<ProposalService>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            service,
            broadcaster,
            metrics: Arc::new(ApiMetrics::new()),
        }
    }
}
