//! Proposal id allocation.

use agora_types::ProposalId;
use std::sync::Mutex;
use ulid::Generator;

use crate::StoreError;

/// Hands out strictly increasing ULIDs, even within one millisecond.
///
/// Backends share one generator per store so that the key order of the
/// proposals table equals creation order.
pub struct IdGenerator {
    inner: Mutex<Generator>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    pub fn next_id(&self) -> Result<ProposalId, StoreError> {
        let mut generator = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("id generator lock poisoned".into()))?;
        generator
            .generate()
            .map(ProposalId::new)
            .map_err(|e| StoreError::Backend(format!("id generation failed: {e}")))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = IdGenerator::new();
        let mut prev = ids.next_id().unwrap();
        for _ in 0..1000 {
            let next = ids.next_id().unwrap();
            assert!(next > prev);
            assert!(next.to_string() > prev.to_string());
            prev = next;
        }
    }
}
