//! Who may vote and how much a vote weighs.

use serde::{Deserialize, Serialize};

use crate::GovernanceError;

/// How the weight of a signed ballot is derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Every ballot weighs 1.
    #[default]
    Unweighted,
    /// Weight is `floor(balance / unit)`, with the balance read from the
    /// chain when the ballot arrives. The weight is frozen at that moment.
    Balance { unit: u64 },
}

impl WeightPolicy {
    /// Weight for a wallet holding `balance`. Always 1 when unweighted.
    pub fn weight_for(&self, balance: u64) -> u64 {
        match self {
            Self::Unweighted => 1,
            Self::Balance { unit } => balance / (*unit).max(1),
        }
    }

    pub fn needs_balance(&self) -> bool {
        matches!(self, Self::Balance { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotePolicy {
    /// Accept ballots without a wallet signature (weight 1, no receipt).
    pub allow_anonymous: bool,
    pub weighting: WeightPolicy,
}

impl Default for VotePolicy {
    fn default() -> Self {
        Self {
            allow_anonymous: true,
            weighting: WeightPolicy::Unweighted,
        }
    }
}

impl VotePolicy {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if let WeightPolicy::Balance { unit: 0 } = self.weighting {
            return Err(GovernanceError::Validation(
                "balance weighting unit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
