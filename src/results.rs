use crate::capabilities::MatchScore;
use crate::model::ListingRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of one company's attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    Succeeded,
    PartiallyFailed,
    Aborted,
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationStop {
    /// End of results: no advance control or no new listings
    Exhausted,
    /// Page ceiling reached before the true end
    Truncated,
    /// A page yielded no listings even after a retry
    ExtractionFailed,
    /// The session crashed once and was restarted; results are partial
    SessionRestarted,
    Cancelled,
}

/// Whether the description of a listing was fully extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionStatus {
    Complete,
    ExtractionIncomplete,
}

/// Result of the match-scoring hand-off for one listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    Scored(MatchScore),
    Unscored { reason: String },
}

impl MatchOutcome {
    pub fn score(&self) -> Option<u8> {
        match self {
            MatchOutcome::Scored(score) => Some(score.match_score),
            MatchOutcome::Unscored { .. } => None,
        }
    }
}

/// A new listing with its description, handed to persistence and notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedListing {
    pub record: ListingRecord,
    pub description: String,
    pub extraction: ExtractionStatus,
    pub matching: MatchOutcome,
    /// When the listing was first reported
    #[serde(default = "Utc::now")]
    pub found_at: DateTime<Utc>,
}

/// Per-company run record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAttempt {
    pub company_id: String,
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub actions_taken: usize,
    pub pages_visited: usize,
    pub listings_found: usize,
    pub listings_new: usize,
    pub session_restarts: u32,
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_stop: Option<PaginationStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ScanAttempt {
    pub fn new(company_id: &str) -> Self {
        Self {
            company_id: company_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            actions_taken: 0,
            pages_visited: 0,
            listings_found: 0,
            listings_new: 0,
            session_restarts: 0,
            status: ScanStatus::Succeeded,
            pagination_stop: None,
            failure: None,
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.status = ScanStatus::Aborted;
        self.failure = Some(reason.into());
    }

    /// Stamps the end of the attempt
    pub fn complete(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Downgrades a successful attempt; never upgrades an aborted one
    pub fn mark_partial(&mut self, reason: impl Into<String>) {
        if self.status == ScanStatus::Succeeded {
            self.status = ScanStatus::PartiallyFailed;
            self.failure = Some(reason.into());
        }
    }
}

/// Attempt plus the listings it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyReport {
    pub attempt: ScanAttempt,
    pub listings: Vec<ScannedListing>,
}

/// Outcome of one batch over many companies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub companies: Vec<CompanyReport>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn report(&self, company_id: &str) -> Option<&CompanyReport> {
        self.companies
            .iter()
            .find(|r| r.attempt.company_id == company_id)
    }

    pub fn count(&self, status: ScanStatus) -> usize {
        self.companies
            .iter()
            .filter(|r| r.attempt.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_does_not_hide_abort() {
        let mut attempt = ScanAttempt::new("acme");
        attempt.abort("budget exceeded");
        attempt.mark_partial("extraction failed");
        assert_eq!(attempt.status, ScanStatus::Aborted);
        assert_eq!(attempt.failure.as_deref(), Some("budget exceeded"));
    }

    #[test]
    fn test_attempt_timestamps() {
        let mut attempt = ScanAttempt::new("acme");
        assert!(attempt.finished_at.is_none());
        attempt.complete();
        assert!(attempt.finished_at.is_some_and(|end| end >= attempt.started_at));

        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"finished_at\""));
    }

    #[test]
    fn test_match_outcome_score() {
        let unscored = MatchOutcome::Unscored {
            reason: "timeout".to_string(),
        };
        assert_eq!(unscored.score(), None);
    }
}
