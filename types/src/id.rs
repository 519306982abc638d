//! Proposal identifiers.
//!
//! Ids are ULIDs: 128-bit, lexicographically sortable, and generated
//! monotonically by the store so that key order equals creation order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::ParseError;

/// Identifier of a stored proposal, assigned by the store on creation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(Ulid);

impl ProposalId {
    pub fn new(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Parse the canonical 26-character form.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|_| ParseError::InvalidProposalId(s.to_string()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl FromStr for ProposalId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProposalId({})", self.0)
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
