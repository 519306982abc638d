//! The proposal service.

use agora_chain::{BalanceOracle, ChainError};
use agora_crypto::{address_from_public_key, public_key_from_address, verify_ballot};
use agora_store::{ProposalStore, StoreError};
use agora_types::{
    Proposal, ProposalContent, ProposalId, Signature, TallyIncrement, VoteReceipt, VoteType,
    WalletAddress,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::validation::{validate_proposal, ContentLimits};
use crate::{GovernanceError, VotePolicy};

/// Wallet proof attached to a signed ballot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterProof {
    /// Hex Ed25519 public key of the voter.
    pub wallet: String,
    /// Hex signature over `agora-ballot:v1:{proposal_id}:{vote}`.
    pub signature: String,
}

/// A vote request as received from a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub vote: String,
    pub voter: Option<VoterProof>,
    /// Weight the client believes it has. Only compared, never applied.
    pub claimed_weight: Option<u64>,
}

impl Ballot {
    pub fn anonymous(vote: impl Into<String>) -> Self {
        Self {
            vote: vote.into(),
            voter: None,
            claimed_weight: None,
        }
    }
}

/// What a successful ballot did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BallotOutcome {
    pub proposal: Proposal,
    pub vote: VoteType,
    /// Weight added to the tally.
    pub weight: u64,
    /// Verified voter, `None` for anonymous ballots.
    pub voter: Option<WalletAddress>,
}

fn parse_vote(raw: &str) -> Result<VoteType, GovernanceError> {
    raw.parse()
        .map_err(|e: agora_types::ParseError| GovernanceError::InvalidVote(e.to_string()))
}

/// A malformed id cannot name a stored proposal.
fn parse_id(raw: &str) -> Result<ProposalId, GovernanceError> {
    ProposalId::parse(raw).map_err(|_| GovernanceError::NotFound(raw.to_string()))
}

/// Proposal CRUD and vote tallying on top of a [`ProposalStore`].
pub struct ProposalService {
    store: Arc<dyn ProposalStore>,
    oracle: Option<Arc<dyn BalanceOracle>>,
    policy: VotePolicy,
    limits: ContentLimits,
}

impl ProposalService {
    pub fn new(store: Arc<dyn ProposalStore>, policy: VotePolicy) -> Self {
        Self {
            store,
            oracle: None,
            policy,
            limits: ContentLimits::default(),
        }
    }

    /// Attach the chain balance source used for weighting and balance queries.
    pub fn with_oracle(mut self, oracle: Arc<dyn BalanceOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_limits(mut self, limits: ContentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn policy(&self) -> &VotePolicy {
        &self.policy
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// Validate and persist a new proposal with a zeroed tally.
    pub fn create(
        &self,
        content: ProposalContent,
        creator: &str,
    ) -> Result<Proposal, GovernanceError> {
        let new = validate_proposal(content, creator, &self.limits)?;
        let stored = self.store.insert_proposal(new)?;
        info!(id = %stored.id, creator = %stored.creator, "proposal created");
        Ok(stored)
    }

    /// Every proposal, oldest first.
    pub fn list(&self) -> Result<Vec<Proposal>, GovernanceError> {
        Ok(self.store.list_proposals()?)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Proposal, GovernanceError> {
        let id = parse_id(id)?;
        Ok(self.store.get_proposal(&id)?)
    }

    pub fn count(&self) -> Result<u64, GovernanceError> {
        Ok(self.store.proposal_count()?)
    }

    /// Add `weight` to the `vote_type` tally of `id` in one atomic store write.
    ///
    /// The vote type is checked before the store is touched.
    pub fn cast_vote(
        &self,
        id: &str,
        vote_type: &str,
        weight: u64,
    ) -> Result<Proposal, GovernanceError> {
        let vote = parse_vote(vote_type)?;
        if weight == 0 {
            return Err(GovernanceError::Validation(
                "vote weight must be at least 1".into(),
            ));
        }
        let id = parse_id(id)?;
        self.apply(&id, vote, weight, None)
    }

    /// Full vote path: signature check, weighting, vote-once, atomic tally.
    pub async fn cast_ballot(
        &self,
        id: &str,
        ballot: &Ballot,
    ) -> Result<Proposal, GovernanceError> {
        self.submit_ballot(id, ballot).await.map(|o| o.proposal)
    }

    /// [`cast_ballot`](Self::cast_ballot), also reporting the applied weight.
    pub async fn submit_ballot(
        &self,
        id: &str,
        ballot: &Ballot,
    ) -> Result<BallotOutcome, GovernanceError> {
        let vote = parse_vote(&ballot.vote)?;
        let id = parse_id(id)?;
        // Fail fast before any chain lookup.
        self.store.get_proposal(&id)?;

        let (weight, voter) = match &ballot.voter {
            None => {
                if !self.policy.allow_anonymous {
                    return Err(GovernanceError::Unauthorized(
                        "anonymous votes are disabled; sign the ballot with a wallet".into(),
                    ));
                }
                (1, None)
            }
            Some(proof) => {
                let voter = self.verify_proof(&id, vote, proof)?;
                if self.store.get_receipt(&id, &voter)?.is_some() {
                    return Err(GovernanceError::AlreadyVoted(voter.to_string()));
                }
                let weight = self.weight_of(&voter).await?;
                (weight, Some(voter))
            }
        };

        if let Some(claimed) = ballot.claimed_weight {
            if claimed != weight {
                return Err(GovernanceError::Validation(format!(
                    "claimed weight {claimed} does not match server weight {weight}"
                )));
            }
        }

        let proposal = self.apply(&id, vote, weight, voter.clone())?;
        Ok(BallotOutcome {
            proposal,
            vote,
            weight,
            voter,
        })
    }

    /// Receipt of `wallet`'s vote on `id`, if it voted with a signed ballot.
    pub fn receipt(
        &self,
        id: &str,
        wallet: &str,
    ) -> Result<Option<VoteReceipt>, GovernanceError> {
        let id = parse_id(id)?;
        let wallet = canonical_voter(wallet)?;
        Ok(self.store.get_receipt(&id, &wallet)?)
    }

    /// Current chain balance of `wallet`.
    pub async fn balance(&self, wallet: &str) -> Result<(WalletAddress, u64), GovernanceError> {
        let address = WalletAddress::parse(wallet)
            .map_err(|e| GovernanceError::Validation(e.to_string()))?;
        let balance = self.oracle()?.balance(&address).await?;
        Ok((address, balance))
    }

    /// Probe the chain API.
    pub async fn chain_health(&self) -> Result<(), GovernanceError> {
        Ok(self.oracle()?.health().await?)
    }

    fn oracle(&self) -> Result<&Arc<dyn BalanceOracle>, GovernanceError> {
        self.oracle
            .as_ref()
            .ok_or_else(|| ChainError::NotConfigured.into())
    }

    fn verify_proof(
        &self,
        id: &ProposalId,
        vote: VoteType,
        proof: &VoterProof,
    ) -> Result<WalletAddress, GovernanceError> {
        let address = WalletAddress::parse(&proof.wallet)
            .map_err(|e| GovernanceError::Validation(e.to_string()))?;
        let public_key = public_key_from_address(&address)
            .map_err(|e| GovernanceError::Unauthorized(e.to_string()))?;
        let signature = Signature::from_hex(&proof.signature)
            .map_err(|e| GovernanceError::Unauthorized(e.to_string()))?;
        if !verify_ballot(id, vote, &signature, &public_key) {
            debug!(%id, wallet = %address, "ballot signature rejected");
            return Err(GovernanceError::Unauthorized(
                "ballot signature does not match wallet".into(),
            ));
        }
        Ok(address_from_public_key(&public_key))
    }

    async fn weight_of(&self, voter: &WalletAddress) -> Result<u64, GovernanceError> {
        if !self.policy.weighting.needs_balance() {
            return Ok(1);
        }
        let balance = self.oracle()?.balance(voter).await?;
        let weight = self.policy.weighting.weight_for(balance);
        if weight == 0 {
            return Err(GovernanceError::Validation(format!(
                "wallet {} has no voting weight (balance {balance})",
                voter.abbreviated()
            )));
        }
        Ok(weight)
    }

    fn apply(
        &self,
        id: &ProposalId,
        vote: VoteType,
        weight: u64,
        voter: Option<WalletAddress>,
    ) -> Result<Proposal, GovernanceError> {
        let increment = TallyIncrement {
            vote,
            weight,
            voter,
        };
        match self.store.apply_vote(id, &increment) {
            Ok(updated) => {
                debug!(%id, %vote, weight, "vote applied");
                Ok(updated)
            }
            Err(StoreError::Duplicate(_)) => Err(GovernanceError::AlreadyVoted(
                increment
                    .voter
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Receipts are keyed by the lowercase hex key, whatever form the caller used.
fn canonical_voter(wallet: &str) -> Result<WalletAddress, GovernanceError> {
    let address =
        WalletAddress::parse(wallet).map_err(|e| GovernanceError::Validation(e.to_string()))?;
    Ok(match public_key_from_address(&address) {
        Ok(pk) => address_from_public_key(&pk),
        Err(_) => address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_nullables::{NullBalanceOracle, NullProposalStore, OracleMode};
    use agora_types::KeyPair;
    use crate::WeightPolicy;

    fn content() -> ProposalContent {
        ProposalContent {
            title: "T".into(),
            summary: "S".into(),
            abstract_text: "A".into(),
            full_proposal: "F".into(),
        }
    }

    fn service(policy: VotePolicy) -> ProposalService {
        ProposalService::new(Arc::new(NullProposalStore::new()), policy)
    }

    fn signed(kp: &KeyPair, id: &ProposalId, vote: VoteType) -> Ballot {
        Ballot {
            vote: vote.as_str().into(),
            voter: Some(VoterProof {
                wallet: kp.public.to_hex(),
                signature: agora_crypto::sign_ballot(id, vote, &kp.private).to_hex(),
            }),
            claimed_weight: None,
        }
    }

    #[test]
    fn create_then_fetch_roundtrip() {
        let svc = service(VotePolicy::default());
        let p = svc.create(content(), "addr1").unwrap();
        let fetched = svc.get_by_id(&p.id.to_string()).unwrap();
        assert_eq!(fetched.content, content());
        assert_eq!(fetched.voting_stats.total_votes, 0);
        assert_eq!(svc.count().unwrap(), 1);
    }

    #[test]
    fn invalid_create_persists_nothing() {
        let svc = service(VotePolicy::default());
        let mut c = content();
        c.title = "".into();
        assert!(matches!(
            svc.create(c, "addr1"),
            Err(GovernanceError::Validation(_))
        ));
        assert_eq!(svc.count().unwrap(), 0);
    }

    #[test]
    fn malformed_id_is_not_found() {
        let svc = service(VotePolicy::default());
        assert!(matches!(
            svc.get_by_id("not-an-id"),
            Err(GovernanceError::NotFound(_))
        ));
        assert!(matches!(
            svc.get_by_id("01HZY3J6X8Q2V9T4M7N5K1B0CD"),
            Err(GovernanceError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_vote_type_leaves_tally_alone() {
        let svc = service(VotePolicy::default());
        let p = svc.create(content(), "addr1").unwrap();
        let id = p.id.to_string();
        for bad in ["maybe", "YES", ""] {
            assert!(matches!(
                svc.cast_vote(&id, bad, 1),
                Err(GovernanceError::InvalidVote(_))
            ));
        }
        assert_eq!(svc.get_by_id(&id).unwrap(), p);
    }

    #[test]
    fn zero_weight_is_rejected() {
        let svc = service(VotePolicy::default());
        let p = svc.create(content(), "addr1").unwrap();
        assert!(matches!(
            svc.cast_vote(&p.id.to_string(), "yes", 0),
            Err(GovernanceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn anonymous_ballot_counts_once() {
        let svc = service(VotePolicy::default());
        let p = svc.create(content(), "addr1").unwrap();
        let updated = svc
            .cast_ballot(&p.id.to_string(), &Ballot::anonymous("yes"))
            .await
            .unwrap();
        assert_eq!(updated.voting_stats.yes, 1);
        assert_eq!(updated.voting_stats.total_votes, 1);
    }

    #[tokio::test]
    async fn anonymous_ballot_refused_when_disabled() {
        let svc = service(VotePolicy {
            allow_anonymous: false,
            ..VotePolicy::default()
        });
        let p = svc.create(content(), "addr1").unwrap();
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &Ballot::anonymous("no")).await,
            Err(GovernanceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn signed_ballot_is_counted_once_per_wallet() {
        let svc = service(VotePolicy::default());
        let p = svc.create(content(), "addr1").unwrap();
        let kp = agora_crypto::keypair_from_seed(&[1u8; 32]);
        let ballot = signed(&kp, &p.id, VoteType::No);

        let updated = svc.cast_ballot(&p.id.to_string(), &ballot).await.unwrap();
        assert_eq!(updated.voting_stats.no, 1);

        let again = svc.cast_ballot(&p.id.to_string(), &ballot).await;
        assert!(matches!(again, Err(GovernanceError::AlreadyVoted(_))));

        let receipt = svc
            .receipt(&p.id.to_string(), &kp.public.to_hex().to_uppercase())
            .unwrap()
            .unwrap();
        assert_eq!(receipt.vote, VoteType::No);
        assert_eq!(receipt.weight, 1);
    }

    #[tokio::test]
    async fn forged_signature_is_unauthorized() {
        let svc = service(VotePolicy::default());
        let p = svc.create(content(), "addr1").unwrap();
        let kp = agora_crypto::keypair_from_seed(&[1u8; 32]);
        let mallory = agora_crypto::keypair_from_seed(&[2u8; 32]);

        // Signed by mallory, claims kp's wallet.
        let mut ballot = signed(&mallory, &p.id, VoteType::Yes);
        if let Some(proof) = ballot.voter.as_mut() {
            proof.wallet = kp.public.to_hex();
        }
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &ballot).await,
            Err(GovernanceError::Unauthorized(_))
        ));

        // Signature for "yes" replayed as "no".
        let mut ballot = signed(&kp, &p.id, VoteType::Yes);
        ballot.vote = "no".into();
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &ballot).await,
            Err(GovernanceError::Unauthorized(_))
        ));
        assert_eq!(svc.get_by_id(&p.id.to_string()).unwrap().voting_stats.total_votes, 0);
    }

    #[tokio::test]
    async fn balance_weighting_uses_chain_balance() {
        let kp = agora_crypto::keypair_from_seed(&[4u8; 32]);
        let voter = address_from_public_key(&kp.public);
        let oracle = Arc::new(NullBalanceOracle::new().with_balance(&voter, 1_250));
        let svc = service(VotePolicy {
            allow_anonymous: true,
            weighting: WeightPolicy::Balance { unit: 100 },
        })
        .with_oracle(oracle.clone());
        let p = svc.create(content(), "addr1").unwrap();

        let mut ballot = signed(&kp, &p.id, VoteType::Yes);
        ballot.claimed_weight = Some(999);
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &ballot).await,
            Err(GovernanceError::Validation(_))
        ));

        ballot.claimed_weight = Some(12);
        let updated = svc.cast_ballot(&p.id.to_string(), &ballot).await.unwrap();
        assert_eq!(updated.voting_stats.yes, 12);
        assert_eq!(updated.voting_stats.total_votes, 12);

        // Later balance changes do not touch influence already cast.
        oracle.set_balance(&voter, 10_000_000);
        let receipt = svc
            .receipt(&p.id.to_string(), voter.as_str())
            .unwrap()
            .unwrap();
        assert_eq!(receipt.weight, 12);
    }

    #[tokio::test]
    async fn empty_wallet_has_no_weight() {
        let kp = agora_crypto::keypair_from_seed(&[5u8; 32]);
        let svc = service(VotePolicy {
            allow_anonymous: true,
            weighting: WeightPolicy::Balance { unit: 1 },
        })
        .with_oracle(Arc::new(NullBalanceOracle::new()));
        let p = svc.create(content(), "addr1").unwrap();
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &signed(&kp, &p.id, VoteType::Yes))
                .await,
            Err(GovernanceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn chain_failures_map_to_upstream_errors() {
        let kp = agora_crypto::keypair_from_seed(&[6u8; 32]);
        let oracle = Arc::new(NullBalanceOracle::new());
        let svc = service(VotePolicy {
            allow_anonymous: true,
            weighting: WeightPolicy::Balance { unit: 1 },
        })
        .with_oracle(oracle.clone());
        let p = svc.create(content(), "addr1").unwrap();
        let ballot = signed(&kp, &p.id, VoteType::Abstain);

        oracle.set_mode(OracleMode::Unreachable);
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &ballot).await,
            Err(GovernanceError::UpstreamUnavailable(_))
        ));
        oracle.set_mode(OracleMode::Broken);
        assert!(matches!(
            svc.cast_ballot(&p.id.to_string(), &ballot).await,
            Err(GovernanceError::UpstreamFailed(_))
        ));
        assert!(svc.receipt(&p.id.to_string(), &kp.public.to_hex()).unwrap().is_none());
    }

    #[tokio::test]
    async fn balance_without_oracle_is_unavailable() {
        let svc = service(VotePolicy::default());
        assert!(matches!(
            svc.balance("abc").await,
            Err(GovernanceError::UpstreamUnavailable(_))
        ));
        assert!(matches!(
            svc.chain_health().await,
            Err(GovernanceError::UpstreamUnavailable(_))
        ));
    }
}
