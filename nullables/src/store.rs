//! Nullable store: thread-safe in-memory proposal storage for testing.

use agora_store::{IdGenerator, ProposalStore, StoreError};
use agora_types::{
    Clock, NewProposal, Proposal, ProposalId, SystemClock, TallyIncrement, VoteReceipt,
    VotingStats, WalletAddress,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    /// Keyed by id; ULID order is creation order.
    proposals: BTreeMap<ProposalId, Proposal>,
    receipts: HashMap<(ProposalId, WalletAddress), VoteReceipt>,
}

/// An in-memory proposal store for testing.
///
/// One mutex guards both tables, so `apply_vote` is atomic exactly like the
/// LMDB write transaction it stands in for.
pub struct NullProposalStore {
    tables: Mutex<Tables>,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

impl NullProposalStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            ids: IdGenerator::new(),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("null store lock poisoned".into()))
    }
}

impl Default for NullProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalStore for NullProposalStore {
    fn insert_proposal(&self, proposal: NewProposal) -> Result<Proposal, StoreError> {
        let now = self.clock.now();
        let stored = Proposal {
            id: self.ids.next_id()?,
            content: proposal.content,
            voting_stats: VotingStats::default(),
            creator: proposal.creator,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.lock()?;
        if tables.proposals.contains_key(&stored.id) {
            return Err(StoreError::Duplicate(stored.id.to_string()));
        }
        tables.proposals.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, StoreError> {
        self.lock()?
            .proposals
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        Ok(self.lock()?.proposals.values().cloned().collect())
    }

    fn proposal_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.proposals.len() as u64)
    }

    fn apply_vote(
        &self,
        id: &ProposalId,
        increment: &TallyIncrement,
    ) -> Result<Proposal, StoreError> {
        let now = self.clock.now();
        let mut tables = self.lock()?;

        let current = tables
            .proposals
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(voter) = &increment.voter {
            if tables.receipts.contains_key(&(*id, voter.clone())) {
                return Err(StoreError::Duplicate(format!("{id}/{voter}")));
            }
        }

        let stats = current
            .voting_stats
            .with_vote(increment.vote, increment.weight)
            .ok_or_else(|| StoreError::Overflow(id.to_string()))?;
        let mut updated = current.clone();
        updated.voting_stats = stats;
        updated.updated_at = now.max(updated.updated_at);

        if let Some(voter) = &increment.voter {
            tables.receipts.insert(
                (*id, voter.clone()),
                VoteReceipt {
                    proposal_id: *id,
                    voter: voter.clone(),
                    vote: increment.vote,
                    weight: increment.weight,
                    cast_at: now,
                },
            );
        }
        tables.proposals.insert(*id, updated.clone());
        Ok(updated)
    }

    fn get_receipt(
        &self,
        id: &ProposalId,
        voter: &WalletAddress,
    ) -> Result<Option<VoteReceipt>, StoreError> {
        Ok(self.lock()?.receipts.get(&(*id, voter.clone())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullClock;
    use agora_types::{ProposalContent, VoteType};

    fn draft(title: &str) -> NewProposal {
        NewProposal {
            content: ProposalContent {
                title: title.into(),
                summary: "s".into(),
                abstract_text: "a".into(),
                full_proposal: "f".into(),
            },
            creator: WalletAddress::parse("addr1").unwrap(),
        }
    }

    #[test]
    fn lists_in_creation_order() {
        let store = NullProposalStore::new();
        for t in ["a", "b", "c"] {
            store.insert_proposal(draft(t)).unwrap();
        }
        let titles: Vec<_> = store
            .list_proposals()
            .unwrap()
            .into_iter()
            .map(|p| p.content.title)
            .collect();
        assert_eq!(titles, ["a", "b", "c"]);
        assert_eq!(store.proposal_count().unwrap(), 3);
    }

    #[test]
    fn vote_uses_injected_clock_and_records_receipt() {
        let clock = Arc::new(NullClock::new(50));
        let store = NullProposalStore::with_clock(clock.clone());
        let p = store.insert_proposal(draft("t")).unwrap();
        assert_eq!(p.created_at.as_secs(), 50);

        clock.advance(10);
        let voter = WalletAddress::parse("alice").unwrap();
        let inc = TallyIncrement {
            vote: VoteType::No,
            weight: 4,
            voter: Some(voter.clone()),
        };
        let updated = store.apply_vote(&p.id, &inc).unwrap();
        assert_eq!(updated.updated_at.as_secs(), 60);
        assert_eq!(updated.voting_stats.no, 4);

        let receipt = store.get_receipt(&p.id, &voter).unwrap().unwrap();
        assert_eq!(receipt.cast_at.as_secs(), 60);
        assert!(matches!(
            store.apply_vote(&p.id, &inc),
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.get_proposal(&p.id).unwrap().voting_stats.total_votes, 4);
    }
}
