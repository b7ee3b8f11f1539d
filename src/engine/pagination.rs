use crate::browser::{ActionOutcome, BrowserSession};
use crate::capabilities::{DecisionPhase, HistoryEntry};
use crate::config::ScanConfig;
use crate::engine::ActionResolver;
use crate::error::SessionError;
use crate::filter::DedupFilter;
use crate::model::{ListingRecord, NavigationAction, NavigationGoal};
use crate::parsers::ListingExtractor;
use crate::parsers::listings::{advance_action, scroll_action};
use crate::results::PaginationStop;
use crate::utils::backoff_delay;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct PaginationReport {
    /// Every distinct listing seen, in page order
    pub records: Vec<ListingRecord>,
    pub pages_visited: usize,
    /// Advance actions that were applied
    pub advances: usize,
    pub stop: PaginationStop,
}

/// Collects listings across result pages
pub struct Paginator<'a> {
    resolver: &'a ActionResolver,
    extractor: &'a ListingExtractor,
    normalizer: &'a DedupFilter,
    max_pages: usize,
    use_resolver: bool,
    scroll_fallback: bool,
    step_retries: u32,
    backoff: Duration,
}

impl<'a> Paginator<'a> {
    pub fn new(
        resolver: &'a ActionResolver,
        extractor: &'a ListingExtractor,
        normalizer: &'a DedupFilter,
        config: &ScanConfig,
    ) -> Self {
        Self {
            resolver,
            extractor,
            normalizer,
            max_pages: config.max_pages.max(1),
            use_resolver: config.pagination_uses_resolver,
            scroll_fallback: config.scroll_fallback,
            step_retries: config.step_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Starts on the listing view reached by navigation. Only a second crash
    /// is an error; every other stop reason comes back in the report.
    pub async fn paginate(
        &self,
        session: &mut BrowserSession,
        company_id: &str,
        goal: &NavigationGoal,
        cancel: &CancellationToken,
    ) -> Result<PaginationReport, SessionError> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut pages_visited = 0;
        let mut advances = 0;
        let mut clicked = false;
        let mut history: Vec<HistoryEntry> = Vec::new();

        let stop = loop {
            if cancel.is_cancelled() {
                break PaginationStop::Cancelled;
            }
            pages_visited += 1;

            let mut batch = self.extractor.extract(session.current(), company_id, self.normalizer);
            if batch.is_empty() {
                ::log::debug!(
                    "[{}] no listings on page {}, reading it again",
                    session.label(),
                    pages_visited
                );
                if session.refresh().await == ActionOutcome::CrashedSession {
                    session.recover().await?;
                    break PaginationStop::SessionRestarted;
                }
                batch = self.extractor.extract(session.current(), company_id, self.normalizer);
            }
            if batch.is_empty() && pages_visited == 1 {
                break PaginationStop::ExtractionFailed;
            }

            let fresh: Vec<ListingRecord> = batch
                .into_iter()
                .filter(|r| seen.insert(r.detail_url.clone()))
                .collect();
            ::log::info!(
                "[{}] page {}: {} new listing(s)",
                session.label(),
                pages_visited,
                fresh.len()
            );
            if fresh.is_empty() && pages_visited > 1 {
                break PaginationStop::Exhausted;
            }
            records.extend(fresh);

            let Some(action) = self.next_action(session, goal, &history, clicked).await else {
                break PaginationStop::Exhausted;
            };
            if pages_visited >= self.max_pages {
                break PaginationStop::Truncated;
            }

            let summary = session.current().summary();
            let outcome = self.advance(session, &action).await;
            history.push(HistoryEntry {
                snapshot_summary: summary,
                action: action.clone(),
                outcome,
            });
            match outcome {
                ActionOutcome::Applied => {
                    advances += 1;
                    clicked |= matches!(action, NavigationAction::Click(_));
                }
                ActionOutcome::ElementNotFound | ActionOutcome::NavigationTimeout => {
                    break PaginationStop::Exhausted;
                }
                ActionOutcome::CrashedSession => {
                    session.recover().await?;
                    break PaginationStop::SessionRestarted;
                }
            }
        };

        ::log::info!(
            "[{}] pagination stopped ({:?}) after {} page(s), {} listing(s)",
            session.label(),
            stop,
            pages_visited,
            records.len()
        );
        Ok(PaginationReport {
            records,
            pages_visited,
            advances,
            stop,
        })
    }

    /// Next-page control by label first, then the resolver, then scrolling
    /// on pages that never showed a pager
    async fn next_action(
        &self,
        session: &BrowserSession,
        goal: &NavigationGoal,
        history: &[HistoryEntry],
        clicked: bool,
    ) -> Option<NavigationAction> {
        if let Some(action) = advance_action(session.current()) {
            return Some(action);
        }
        if self.use_resolver {
            match self
                .resolver
                .resolve(session.current(), goal, history, DecisionPhase::Paginate)
                .await
            {
                Ok(action) if !action.is_terminal() => return Some(action),
                Ok(_) => return None,
                Err(e) => {
                    ::log::warn!("[{}] no pagination decision: {}", session.label(), e)
                }
            }
        }
        if self.scroll_fallback && !clicked {
            return Some(scroll_action());
        }
        None
    }

    async fn advance(&self, session: &mut BrowserSession, action: &NavigationAction) -> ActionOutcome {
        let mut attempt = 0;
        loop {
            let outcome = session.apply(action).await;
            if !outcome.is_recoverable_step() || attempt >= self.step_retries {
                return outcome;
            }
            tokio::time::sleep(backoff_delay(self.backoff, attempt)).await;
            attempt += 1;
        }
    }
}
