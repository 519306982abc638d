//! Plain-text renderings of proposals and the voting panel.

use agora_types::{Proposal, ProposalContent, Timestamp, VoteType, WalletAddress};
use agora_utils::format_age;
use std::fmt::Write;

use crate::{PanelState, VotingPanel};

const BAR_WIDTH: usize = 20;

/// One line per proposal: id, title and summary.
pub fn render_sidebar(proposals: &[Proposal]) -> String {
    if proposals.is_empty() {
        return "No proposals yet.\n".to_string();
    }
    let mut out = String::new();
    for p in proposals {
        let _ = writeln!(
            out,
            "{}  {}: {}",
            p.id,
            one_line(&p.content.title, 48),
            one_line(&p.content.summary, 64)
        );
    }
    out
}

/// Full content of a proposal followed by its tally.
pub fn render_detail(proposal: &Proposal, now: Timestamp) -> String {
    let c = &proposal.content;
    let mut out = String::new();
    let _ = writeln!(out, "{}", c.title);
    let _ = writeln!(out, "{}", "=".repeat(c.title.chars().count().clamp(3, 72)));
    let _ = writeln!(
        out,
        "id {}  by {}  created {}",
        proposal.id,
        proposal.creator.abbreviated(),
        format_age(proposal.created_at.as_secs(), now.as_secs())
    );
    let _ = writeln!(out, "\nSummary\n{}", c.summary);
    let _ = writeln!(out, "\nAbstract\n{}", c.abstract_text);
    let _ = writeln!(out, "\nFull proposal\n{}", c.full_proposal);
    let s = &proposal.voting_stats;
    let _ = writeln!(
        out,
        "\nVotes: yes {}  no {}  abstain {}  total {}",
        s.yes, s.no, s.abstain, s.total_votes
    );
    out
}

/// Percentage bars for each option plus wallet and vote status.
pub fn render_panel(
    proposal: &Proposal,
    panel: &VotingPanel,
    wallet: Option<&WalletAddress>,
) -> String {
    let stats = &proposal.voting_stats;
    let mut out = String::new();
    for vote in VoteType::ALL {
        let pct = stats.percentage(vote);
        let _ = writeln!(
            out,
            "{:<8} {} {:>5.1}%  ({})",
            vote.as_str(),
            progress_bar(pct, BAR_WIDTH),
            pct,
            stats.get(vote)
        );
    }
    let _ = writeln!(out, "total    {}", stats.total_votes);

    match wallet {
        Some(addr) => {
            let _ = writeln!(out, "wallet   {}", addr.abbreviated());
        }
        None => {
            let _ = writeln!(out, "wallet   not connected (connect a wallet to vote)");
        }
    }
    let status = match panel.state() {
        PanelState::NotVoted => "not voted".to_string(),
        PanelState::Voting(vote) => format!("submitting {vote}..."),
        PanelState::Voted(Some(vote)) => format!("voted {vote}"),
        PanelState::Voted(None) => "voted".to_string(),
    };
    let _ = writeln!(out, "status   {status}");
    out
}

/// An error message with a hint to retry.
pub fn render_error(message: &str) -> String {
    format!("Error: {message}\nPress r to retry.\n")
}

/// `[#####.....]` filled to `pct` percent.
pub fn progress_bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

fn one_line(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Form state for a new proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProposalDraft {
    pub title: String,
    pub summary: String,
    pub abstract_text: String,
    pub full_proposal: String,
}

impl ProposalDraft {
    /// Names of required fields that are blank, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("summary", &self.summary),
            ("abstract", &self.abstract_text),
            ("full_proposal", &self.full_proposal),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// The content to submit, or the list of missing fields.
    pub fn validate(&self) -> Result<ProposalContent, Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(ProposalContent {
            title: self.title.trim().to_string(),
            summary: self.summary.trim().to_string(),
            abstract_text: self.abstract_text.trim().to_string(),
            full_proposal: self.full_proposal.trim().to_string(),
        })
    }
}
