use crate::model::Company;
use crate::results::{MatchOutcome, ScannedListing};
use async_trait::async_trait;

/// Receives the listings that matched well enough to tell someone about
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, company: &Company, matched: &[ScannedListing]);
}

/// Writes matches to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, company: &Company, matched: &[ScannedListing]) {
        for listing in matched {
            ::log::info!(
                "Match at {}: {} ({}) score {} - {}",
                company.name,
                listing.record.title,
                listing.record.detail_url,
                listing.matching.score().unwrap_or_default(),
                match &listing.matching {
                    MatchOutcome::Scored(score) => score.reasoning.as_str(),
                    MatchOutcome::Unscored { reason } => reason.as_str(),
                }
            );
        }
    }
}
