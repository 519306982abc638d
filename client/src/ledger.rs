//! Local record of the votes this client cast.
//!
//! Advisory only: it lets the voting panel start in the `Voted` state across
//! restarts. The server's receipts decide whether a wallet may vote.

use agora_types::{ProposalId, Timestamp, VoteType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ClientError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub vote: VoteType,
    pub cast_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct VoteLedger {
    path: Option<PathBuf>,
    votes: BTreeMap<ProposalId, LedgerEntry>,
}

impl VoteLedger {
    /// A ledger that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the ledger at `path`. A missing file is an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let votes = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                ClientError::Ledger(format!("corrupt ledger {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ClientError::Ledger(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path: Some(path),
            votes,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has_voted(&self, id: &ProposalId) -> bool {
        self.votes.contains_key(id)
    }

    pub fn entry(&self, id: &ProposalId) -> Option<&LedgerEntry> {
        self.votes.get(id)
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Remember a vote and persist the ledger. The first vote recorded for a
    /// proposal wins.
    pub fn record(&mut self, id: ProposalId, vote: VoteType, cast_at: Timestamp) -> Result<(), ClientError> {
        if self.votes.contains_key(&id) {
            return Ok(());
        }
        self.votes.insert(id, LedgerEntry { vote, cast_at });
        self.persist()
    }

    fn persist(&self) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.votes)
            .map_err(|e| ClientError::Ledger(format!("cannot encode ledger: {e}")))?;
        // Write-then-rename so a crash never leaves a truncated ledger.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| ClientError::Ledger(format!("cannot write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ProposalId {
        ProposalId::parse("01HZY3J6X8Q2V9T4M7N5K1B0CD").unwrap()
    }

    #[test]
    fn missing_file_is_empty_and_records_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.json");

        let mut ledger = VoteLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        ledger.record(id(), VoteType::Yes, Timestamp::new(5)).unwrap();

        let reopened = VoteLedger::open(&path).unwrap();
        assert!(reopened.has_voted(&id()));
        assert_eq!(reopened.entry(&id()).unwrap().vote, VoteType::Yes);
    }

    #[test]
    fn first_vote_wins() {
        let mut ledger = VoteLedger::in_memory();
        ledger.record(id(), VoteType::No, Timestamp::new(1)).unwrap();
        ledger.record(id(), VoteType::Yes, Timestamp::new(2)).unwrap();
        assert_eq!(ledger.entry(&id()).unwrap().vote, VoteType::No);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(VoteLedger::open(&path), Err(ClientError::Ledger(_))));
    }
}
