//! Proposal content validation.

use agora_types::{NewProposal, ProposalContent, WalletAddress};

use crate::GovernanceError;

/// Maximum field lengths, in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentLimits {
    pub title: usize,
    pub summary: usize,
    pub abstract_text: usize,
    pub full_proposal: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            title: 256,
            summary: 2_000,
            abstract_text: 8_000,
            full_proposal: 100_000,
        }
    }
}

fn check_field(name: &str, value: &str, max: usize) -> Result<(), GovernanceError> {
    if value.trim().is_empty() {
        return Err(GovernanceError::Validation(format!("{name} is required")));
    }
    if value.chars().count() > max {
        return Err(GovernanceError::Validation(format!(
            "{name} exceeds {max} characters"
        )));
    }
    Ok(())
}

/// Check every required field and turn the submission into a storable record.
///
/// Nothing is persisted here; a failure leaves the store untouched.
pub fn validate_proposal(
    content: ProposalContent,
    creator: &str,
    limits: &ContentLimits,
) -> Result<NewProposal, GovernanceError> {
    check_field("title", &content.title, limits.title)?;
    check_field("summary", &content.summary, limits.summary)?;
    check_field("abstract", &content.abstract_text, limits.abstract_text)?;
    check_field("full_proposal", &content.full_proposal, limits.full_proposal)?;
    check_field("creator", creator, WalletAddress::MAX_LEN)?;

    let creator = WalletAddress::parse(creator)
        .map_err(|e| GovernanceError::Validation(format!("creator: {e}")))?;

    Ok(NewProposal { content, creator })
}
