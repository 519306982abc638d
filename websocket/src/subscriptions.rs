//! Per-connection event filtering.

use agora_types::ProposalId;
use std::collections::HashSet;

use crate::OutboundEvent;

/// Which proposal-scoped events a connection wants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProposalFilter {
    /// Everything (the initial state, and the state after `unsubscribe`).
    #[default]
    All,
    /// Only tally updates for these proposals.
    Only(HashSet<ProposalId>),
}

impl ProposalFilter {
    pub fn only(ids: impl IntoIterator<Item = ProposalId>) -> Self {
        Self::Only(ids.into_iter().collect())
    }

    /// Unscoped events (such as `proposalCreated`) always pass.
    pub fn allows(&self, event: &OutboundEvent) -> bool {
        match (self, event.scope) {
            (Self::All, _) | (_, None) => true,
            (Self::Only(ids), Some(id)) => ids.contains(&id),
        }
    }
}
