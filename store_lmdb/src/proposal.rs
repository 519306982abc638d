//! LMDB implementation of ProposalStore.

use agora_store::{receipt_key, IdGenerator, ProposalStore, StoreError};
use agora_types::{
    Clock, NewProposal, Proposal, ProposalId, TallyIncrement, VoteReceipt, VotingStats,
    WalletAddress,
};
use std::sync::Arc;
use tracing::debug;

use crate::{LmdbEnvironment, LmdbError};

/// Proposals keyed by id, receipts keyed by `{id}/{voter}`; values are JSON.
///
/// Every vote runs inside one LMDB write transaction. LMDB admits a single
/// writer at a time, which makes the read-increment-write sequence atomic.
pub struct LmdbProposalStore {
    env: LmdbEnvironment,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corruption(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| LmdbError::from(e).into())
}

fn heed_err(e: heed::Error) -> StoreError {
    LmdbError::from(e).into()
}

impl LmdbProposalStore {
    pub fn new(env: LmdbEnvironment, clock: Arc<dyn Clock>) -> Self {
        Self {
            env,
            ids: IdGenerator::new(),
            clock,
        }
    }

    pub fn environment(&self) -> &LmdbEnvironment {
        &self.env
    }
}

impl ProposalStore for LmdbProposalStore {
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
        let key = stored.id.to_string();
        let bytes = encode(&stored)?;

        let mut wtxn = self.env.env.write_txn().map_err(heed_err)?;
        if self
            .env
            .proposals
            .get(&wtxn, &key)
            .map_err(heed_err)?
            .is_some()
        {
            return Err(StoreError::Duplicate(key));
        }
        self.env
            .proposals
            .put(&mut wtxn, &key, &bytes)
            .map_err(heed_err)?;
        wtxn.commit().map_err(heed_err)?;

        debug!(id = %stored.id, "stored proposal");
        Ok(stored)
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, StoreError> {
        let key = id.to_string();
        let rtxn = self.env.env.read_txn().map_err(heed_err)?;
        match self.env.proposals.get(&rtxn, &key).map_err(heed_err)? {
            Some(bytes) => decode(bytes),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(heed_err)?;
        let mut out = Vec::new();
        for entry in self.env.proposals.iter(&rtxn).map_err(heed_err)? {
            let (_key, bytes) = entry.map_err(heed_err)?;
            out.push(decode(bytes)?);
        }
        Ok(out)
    }

    fn proposal_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(heed_err)?;
        self.env.proposals.len(&rtxn).map_err(heed_err)
    }

    fn apply_vote(
        &self,
        id: &ProposalId,
        increment: &TallyIncrement,
    ) -> Result<Proposal, StoreError> {
        let key = id.to_string();
        let mut wtxn = self.env.env.write_txn().map_err(heed_err)?;

        let mut proposal: Proposal = match self.env.proposals.get(&wtxn, &key).map_err(heed_err)? {
            Some(bytes) => decode(bytes)?,
            None => return Err(StoreError::NotFound(key)),
        };

        let now = self.clock.now();
        let receipt = match &increment.voter {
            Some(voter) => {
                let rkey = receipt_key(id, voter);
                if self
                    .env
                    .receipts
                    .get(&wtxn, &rkey)
                    .map_err(heed_err)?
                    .is_some()
                {
                    return Err(StoreError::Duplicate(rkey));
                }
                Some((
                    rkey,
                    VoteReceipt {
                        proposal_id: *id,
                        voter: voter.clone(),
                        vote: increment.vote,
                        weight: increment.weight,
                        cast_at: now,
                    },
                ))
            }
            None => None,
        };

        proposal.voting_stats = proposal
            .voting_stats
            .with_vote(increment.vote, increment.weight)
            .ok_or_else(|| StoreError::Overflow(key.clone()))?;
        proposal.updated_at = now.max(proposal.updated_at);

        let bytes = encode(&proposal)?;
        self.env
            .proposals
            .put(&mut wtxn, &key, &bytes)
            .map_err(heed_err)?;
        if let Some((rkey, receipt)) = receipt {
            let rbytes = encode(&receipt)?;
            self.env
                .receipts
                .put(&mut wtxn, &rkey, &rbytes)
                .map_err(heed_err)?;
        }
        wtxn.commit().map_err(heed_err)?;

        Ok(proposal)
    }

    fn get_receipt(
        &self,
        id: &ProposalId,
        voter: &WalletAddress,
    ) -> Result<Option<VoteReceipt>, StoreError> {
        let rkey = receipt_key(id, voter);
        let rtxn = self.env.env.read_txn().map_err(heed_err)?;
        self.env
            .receipts
            .get(&rtxn, &rkey)
            .map_err(heed_err)?
            .map(decode)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::DEFAULT_MAP_SIZE;
    use agora_types::{ProposalContent, Timestamp, VoteType};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct StepClock(AtomicU64);

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn temp_store() -> (tempfile::TempDir, LmdbProposalStore) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("failed to open env");
        let store = LmdbProposalStore::new(env, Arc::new(StepClock(AtomicU64::new(1_000))));
        (dir, store)
    }

    fn draft(title: &str) -> NewProposal {
        NewProposal {
            content: ProposalContent {
                title: title.to_string(),
                summary: "summary".to_string(),
                abstract_text: "abstract".to_string(),
                full_proposal: "full text".to_string(),
            },
            creator: WalletAddress::parse("creator-1").unwrap(),
        }
    }

    fn yes(weight: u64, voter: Option<&str>) -> TallyIncrement {
        TallyIncrement {
            vote: VoteType::Yes,
            weight,
            voter: voter.map(|v| WalletAddress::parse(v).unwrap()),
        }
    }

    #[test]
    fn insert_then_get_roundtrip() {
        let (_dir, store) = temp_store();
        let created = store.insert_proposal(draft("Fund the bridge")).unwrap();
        assert_eq!(created.voting_stats, VotingStats::default());
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.get_proposal(&created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(store.proposal_count().unwrap(), 1);
    }

    #[test]
    fn list_is_in_creation_order() {
        let (_dir, store) = temp_store();
        let titles = ["first", "second", "third", "fourth"];
        for t in titles {
            store.insert_proposal(draft(t)).unwrap();
        }
        let listed: Vec<String> = store
            .list_proposals()
            .unwrap()
            .into_iter()
            .map(|p| p.content.title)
            .collect();
        assert_eq!(listed, titles);
    }

    #[test]
    fn missing_proposal_is_not_found() {
        let (_dir, store) = temp_store();
        let id = ProposalId::parse("01HZY3J6X8Q2V9T4M7N5K1B0CD").unwrap();
        assert!(matches!(store.get_proposal(&id), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.apply_vote(&id, &yes(1, None)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn vote_updates_tally_and_timestamp() {
        let (_dir, store) = temp_store();
        let p = store.insert_proposal(draft("t")).unwrap();
        let updated = store.apply_vote(&p.id, &yes(3, None)).unwrap();
        assert_eq!(updated.voting_stats.yes, 3);
        assert_eq!(updated.voting_stats.total_votes, 3);
        assert!(updated.updated_at > p.updated_at);
        assert_eq!(store.get_proposal(&p.id).unwrap(), updated);
    }

    #[test]
    fn second_vote_from_same_wallet_is_rejected() {
        let (_dir, store) = temp_store();
        let p = store.insert_proposal(draft("t")).unwrap();
        store.apply_vote(&p.id, &yes(1, Some("alice"))).unwrap();

        let err = store.apply_vote(&p.id, &yes(1, Some("alice"))).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        // the rejected vote left no trace
        assert_eq!(store.get_proposal(&p.id).unwrap().voting_stats.total_votes, 1);

        let receipt = store
            .get_receipt(&p.id, &WalletAddress::parse("alice").unwrap())
            .unwrap()
            .expect("receipt stored");
        assert_eq!(receipt.vote, VoteType::Yes);
        assert_eq!(receipt.weight, 1);
        assert!(store
            .get_receipt(&p.id, &WalletAddress::parse("bob").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn overflow_aborts_the_transaction() {
        let (_dir, store) = temp_store();
        let p = store.insert_proposal(draft("t")).unwrap();
        store.apply_vote(&p.id, &yes(u64::MAX, None)).unwrap();
        let err = store.apply_vote(&p.id, &yes(1, Some("carol"))).unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));
        assert!(store
            .get_receipt(&p.id, &WalletAddress::parse("carol").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn concurrent_votes_are_not_lost() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        let p = store.insert_proposal(draft("t")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                let id = p.id;
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let vote = VoteType::ALL[(t + i) % 3];
                        let inc = TallyIncrement {
                            vote,
                            weight: 1,
                            voter: None,
                        };
                        store.apply_vote(&id, &inc).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = store.get_proposal(&p.id).unwrap().voting_stats;
        assert_eq!(stats.total_votes, 200);
        assert!(stats.is_consistent());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
            let store = LmdbProposalStore::new(env, Arc::new(StepClock(AtomicU64::new(1))));
            let p = store.insert_proposal(draft("persisted")).unwrap();
            store.apply_vote(&p.id, &yes(2, Some("dave"))).unwrap();
            p.id
        };

        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        let store = LmdbProposalStore::new(env, Arc::new(StepClock(AtomicU64::new(100))));
        let p = store.get_proposal(&id).unwrap();
        assert_eq!(p.content.title, "persisted");
        assert_eq!(p.voting_stats.yes, 2);
        assert!(store
            .get_receipt(&id, &WalletAddress::parse("dave").unwrap())
            .unwrap()
            .is_some());
    }
}
