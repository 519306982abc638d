//! HTTP request handlers.
//!
//! Every JSON body is parsed into a typed request that rejects unknown
//! fields. Parse failures become 400 responses with a JSON error body.

use agora_governance::{Ballot, GovernanceError, VoterProof};
use agora_types::{Proposal, ProposalContent, VoteReceipt};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{ApiError, AppState};

// ── Proposals ────────────────────────────────────────────────────────────

/// Missing content fields are reported by validation, not by the parser, so
/// the client learns which field is missing.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub full_proposal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProposalRequest {
    #[serde(default)]
    pub content: Option<ContentRequest>,
    /// Accepted and ignored; tallies always start at zero.
    #[serde(default)]
    pub voting_stats: Option<serde_json::Value>,
    #[serde(default)]
    pub creator: Option<String>,
}

impl CreateProposalRequest {
    fn into_parts(self) -> (ProposalContent, String) {
        let c = self.content.unwrap_or_default();
        let content = ProposalContent {
            title: c.title.unwrap_or_default(),
            summary: c.summary.unwrap_or_default(),
            abstract_text: c.abstract_text.unwrap_or_default(),
            full_proposal: c.full_proposal.unwrap_or_default(),
        };
        (content, self.creator.unwrap_or_default())
    }
}

/// `POST /api/proposals`
pub async fn create_proposal(
    State(state): State<AppState>,
    payload: Result<Json<CreateProposalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Proposal>), ApiError> {
    let Json(req) = payload?;
    let (content, creator) = req.into_parts();
    let proposal = state.service.create(content, &creator)?;

    state.metrics.proposals_created.inc();
    state.broadcaster.publish_proposal_created(&proposal);
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// `GET /api/proposals`
pub async fn list_proposals(
    State(state): State<AppState>,
) -> Result<Json<Vec<Proposal>>, ApiError> {
    Ok(Json(state.service.list()?))
}

/// `GET /api/proposals/:id`
pub async fn get_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Proposal>, ApiError> {
    Ok(Json(state.service.get_by_id(&id)?))
}

// ── Voting ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    pub vote: String,
    /// Hex public key of a signing wallet. Requires `signature`.
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    /// Client-claimed weight, checked against the server's.
    #[serde(default)]
    pub weight: Option<u64>,
}

impl TryFrom<VoteRequest> for Ballot {
    type Error = ApiError;

    fn try_from(req: VoteRequest) -> Result<Self, Self::Error> {
        let voter = match (req.wallet, req.signature) {
            (Some(wallet), Some(signature)) => Some(VoterProof { wallet, signature }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ApiError::BadRequest(
                    "wallet given without signature".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(ApiError::BadRequest(
                    "signature given without wallet".into(),
                ))
            }
        };
        Ok(Ballot {
            vote: req.vote,
            voter,
            claimed_weight: req.weight,
        })
    }
}

fn rejection_reason(e: &GovernanceError) -> &'static str {
    match e {
        GovernanceError::Validation(_) => "validation",
        GovernanceError::NotFound(_) => "not_found",
        GovernanceError::InvalidVote(_) => "invalid_vote",
        GovernanceError::AlreadyVoted(_) => "already_voted",
        GovernanceError::Unauthorized(_) => "unauthorized",
        GovernanceError::Store(_) => "store",
        GovernanceError::UpstreamUnavailable(_) | GovernanceError::UpstreamFailed(_) => "chain",
    }
}

/// `PUT /api/proposals/:id/vote`
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<Proposal>, ApiError> {
    let Json(req) = payload?;
    let ballot = Ballot::try_from(req)?;

    let outcome = match state.service.submit_ballot(&id, &ballot).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state
                .metrics
                .ballots_rejected
                .with_label_values(&[rejection_reason(&e)])
                .inc();
            return Err(e.into());
        }
    };

    state
        .metrics
        .ballots_accepted
        .with_label_values(&[outcome.vote.as_str()])
        .inc();
    state.metrics.vote_weight_total.inc_by(outcome.weight);
    state.broadcaster.publish_vote_update(&outcome.proposal);
    Ok(Json(outcome.proposal))
}

/// `GET /api/proposals/:id/votes/:wallet`
pub async fn get_receipt(
    State(state): State<AppState>,
    Path((id, wallet)): Path<(String, String)>,
) -> Result<Json<VoteReceipt>, ApiError> {
    state
        .service
        .receipt(&id, &wallet)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no vote recorded for wallet {wallet}")))
}

// ── Chain ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

/// `GET /api/wallets/:wallet/balance`
pub async fn wallet_balance(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let (address, balance) = state.service.balance(&wallet).await?;
    Ok(Json(BalanceResponse {
        address: address.to_string(),
        balance,
    }))
}

/// `GET /chain/health`
pub async fn chain_health(State(state): State<AppState>) -> Response {
    match state.service.chain_health().await {
        Ok(()) => Json(json!({ "chain_status": "ok" })).into_response(),
        Err(e) => {
            let message = e.to_string();
            let status = ApiError::from(e).status();
            info!(%status, error = %message, "chain health probe failed");
            let label = if status == StatusCode::SERVICE_UNAVAILABLE {
                "unavailable"
            } else {
                "error"
            };
            (
                status,
                Json(json!({ "chain_status": label, "message": message })),
            )
                .into_response()
        }
    }
}

// ── Node ─────────────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    state
        .metrics
        .realtime_clients
        .set(state.broadcaster.connected_clients() as i64);
    if let Ok(count) = state.service.count() {
        state.metrics.proposals_stored.set(count as i64);
    }
    let body = state
        .metrics
        .encode()
        .map_err(|e| ApiError::Internal(format!("metrics encoding failed: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_tolerates_missing_fields() {
        let req: CreateProposalRequest =
            serde_json::from_str(r#"{"content":{"title":"T"}}"#).unwrap();
        let (content, creator) = req.into_parts();
        assert_eq!(content.title, "T");
        assert!(content.summary.is_empty());
        assert!(creator.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<CreateProposalRequest>(r#"{"owner":"x"}"#).is_err());
        assert!(serde_json::from_str::<VoteRequest>(r#"{"vote":"yes","boost":9}"#).is_err());
    }

    #[test]
    fn half_a_signature_is_a_bad_request() {
        let req = VoteRequest {
            vote: "yes".into(),
            wallet: Some("abc".into()),
            signature: None,
            weight: None,
        };
        assert!(matches!(Ballot::try_from(req), Err(ApiError::BadRequest(_))));
    }
}
