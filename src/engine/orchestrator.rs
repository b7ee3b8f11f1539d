use crate::browser::{BrowserSession, SessionFactory};
use crate::capabilities::{DecisionCapability, MatchScorer};
use crate::config::ScanConfig;
use crate::engine::{
    ActionResolver, DescriptionFetcher, FetchedDescription, NavigationOutcome, Navigator,
    Paginator,
};
use crate::error::{ConfigError, ScanError, ScoringError};
use crate::filter::DedupFilter;
use crate::model::{Company, NavigationGoal, UserProfile};
use crate::notify::Notifier;
use crate::parsers::ListingExtractor;
use crate::results::{
    BatchReport, CompanyReport, MatchOutcome, PaginationStop, ScanAttempt, ScanStatus,
    ScannedListing,
};
use crate::store::ListingStore;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Runs scan batches: one browser session per company, a bounded number of
/// companies at a time
pub struct ScanOrchestrator {
    config: ScanConfig,
    factory: Arc<dyn SessionFactory>,
    resolver: ActionResolver,
    scorer: Arc<dyn MatchScorer>,
    store: Arc<dyn ListingStore>,
    notifier: Arc<dyn Notifier>,
    extractor: ListingExtractor,
    filter: DedupFilter,
    goal: Option<NavigationGoal>,
}

impl ScanOrchestrator {
    pub fn new(
        config: ScanConfig,
        factory: Arc<dyn SessionFactory>,
        decision: Arc<dyn DecisionCapability>,
        scorer: Arc<dyn MatchScorer>,
        store: Arc<dyn ListingStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        let extractor =
            ListingExtractor::new(&config.listing_patterns, &config.listing_exclude_patterns)?;
        let filter = DedupFilter::new(&config.extra_tracking_params)?;
        let resolver = ActionResolver::new(decision, &config);

        Ok(Self {
            config,
            factory,
            resolver,
            scorer,
            store,
            notifier,
            extractor,
            filter,
            goal: None,
        })
    }

    /// Uses this goal instead of the one derived from the profile preferences
    pub fn with_goal(mut self, goal: NavigationGoal) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Scans every active company. Failures stay inside the company's report;
    /// the batch itself always completes.
    pub async fn run_batch(
        &self,
        companies: &[Company],
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let goal = self
            .goal
            .clone()
            .unwrap_or_else(|| NavigationGoal::from_preferences(&profile.preferences));
        let profile_text = profile.as_text();
        let (goal, profile_text) = (&goal, profile_text.as_str());
        let limit = self.config.company_concurrency.max(1);
        ::log::info!(
            "Starting batch of {} companies for {} ({} at a time)",
            companies.len(),
            goal.describe(),
            limit
        );

        let mut futures = FuturesUnordered::new();
        let mut reports = Vec::new();
        let mut cancelled = false;

        for (index, company) in companies.iter().enumerate() {
            if !company.is_active {
                ::log::debug!("Skipping inactive company {}", company.id);
                continue;
            }
            if cancel.is_cancelled() {
                ::log::warn!("Batch cancelled, {} not started", company.id);
                cancelled = true;
                break;
            }

            futures.push(async move {
                let report = self.scan_company(company, profile_text, goal, cancel).await;
                (index, report)
            });

            while futures.len() >= limit {
                if let Some(done) = futures.next().await {
                    reports.push(done);
                }
            }
        }

        while let Some(done) = futures.next().await {
            reports.push(done);
        }
        reports.sort_by_key(|(index, _)| *index);

        let report = BatchReport {
            companies: reports.into_iter().map(|(_, report)| report).collect(),
            cancelled: cancelled || cancel.is_cancelled(),
        };
        ::log::info!(
            "Batch finished: {} succeeded, {} partially failed, {} aborted",
            report.count(ScanStatus::Succeeded),
            report.count(ScanStatus::PartiallyFailed),
            report.count(ScanStatus::Aborted)
        );
        report
    }

    /// One company's attempt, from opening a session to notification
    pub async fn scan_company(
        &self,
        company: &Company,
        profile_text: &str,
        goal: &NavigationGoal,
        cancel: &CancellationToken,
    ) -> CompanyReport {
        let mut attempt = ScanAttempt::new(&company.id);
        ::log::info!("Scanning {} at {}", company.name, company.career_page_url);

        let driver = match self.factory.create().await {
            Ok(driver) => driver,
            Err(e) => {
                attempt.abort(ScanError::Driver(e).to_string());
                return self.finish(company, attempt, Vec::new()).await;
            }
        };
        let mut session =
            BrowserSession::new(driver, &company.id, self.config.navigation_timeout());

        let described = self
            .discover(&mut session, company, goal, cancel, &mut attempt)
            .await;
        attempt.session_restarts = session.restarts();
        session.close().await;

        let mut listings = Vec::with_capacity(described.len());
        for item in described {
            let matching = self.score(&item, profile_text).await;
            listings.push(ScannedListing {
                record: item.record,
                description: item.text,
                extraction: item.status,
                matching,
                found_at: Utc::now(),
            });
        }

        self.finish(company, attempt, listings).await
    }

    /// Navigate, paginate, deduplicate and fetch descriptions. Anything
    /// that aborts the attempt yields no listings.
    async fn discover(
        &self,
        session: &mut BrowserSession,
        company: &Company,
        goal: &NavigationGoal,
        cancel: &CancellationToken,
        attempt: &mut ScanAttempt,
    ) -> Vec<FetchedDescription> {
        let known = match self.store.known_index(company).await {
            Ok(known) => known,
            Err(e) => {
                attempt.abort(ScanError::Store(e).to_string());
                return Vec::new();
            }
        };

        let navigation = Navigator::new(&self.resolver, &self.config)
            .navigate(session, &company.career_page_url, goal)
            .await;
        attempt.actions_taken = navigation.actions_taken;
        match navigation.outcome {
            NavigationOutcome::Ready => {}
            NavigationOutcome::Exhausted => {
                ::log::info!("[{}] no listings for {}", company.id, goal.describe());
                return Vec::new();
            }
            NavigationOutcome::Aborted(reason) => {
                attempt.abort(ScanError::Navigation(reason.to_string()).to_string());
                return Vec::new();
            }
        }

        let paginator = Paginator::new(&self.resolver, &self.extractor, &self.filter, &self.config);
        let pages = match paginator.paginate(session, &company.id, goal, cancel).await {
            Ok(pages) => pages,
            Err(e) => {
                attempt.abort(ScanError::Session(e).to_string());
                return Vec::new();
            }
        };
        attempt.pages_visited = pages.pages_visited;
        attempt.listings_found = pages.records.len();
        attempt.pagination_stop = Some(pages.stop);
        match pages.stop {
            PaginationStop::ExtractionFailed => attempt.mark_partial("no listings could be extracted"),
            PaginationStop::SessionRestarted => {
                attempt.mark_partial("session restarted during pagination")
            }
            PaginationStop::Cancelled => attempt.mark_partial("cancelled during pagination"),
            PaginationStop::Exhausted | PaginationStop::Truncated => {}
        }

        let fresh = self.filter.filter(&pages.records, &known);
        attempt.listings_new = fresh.len();
        ::log::info!(
            "[{}] {} listing(s) found, {} new",
            company.id,
            attempt.listings_found,
            attempt.listings_new
        );
        if fresh.is_empty() {
            return Vec::new();
        }
        if cancel.is_cancelled() {
            attempt.mark_partial("cancelled before descriptions were fetched");
            return Vec::new();
        }

        match DescriptionFetcher::new(self.factory.as_ref(), &self.config)
            .fetch(session, fresh)
            .await
        {
            Ok(described) => described,
            Err(e) => {
                attempt.abort(ScanError::Session(e).to_string());
                Vec::new()
            }
        }
    }

    async fn score(&self, item: &FetchedDescription, profile_text: &str) -> MatchOutcome {
        if item.text.trim().is_empty() {
            return MatchOutcome::Unscored {
                reason: "no description text".to_string(),
            };
        }
        let limit = self.config.scoring_timeout();
        let result = match timeout(limit, self.scorer.score(&item.text, profile_text)).await {
            Ok(result) => result,
            Err(_) => Err(ScoringError::Timeout(limit)),
        };
        match result {
            Ok(score) => MatchOutcome::Scored(score),
            Err(e) => {
                ::log::warn!("Could not score {}: {}", item.record.detail_url, e);
                MatchOutcome::Unscored {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Hands the attempt to the store and the matches to the notifier
    async fn finish(
        &self,
        company: &Company,
        mut attempt: ScanAttempt,
        listings: Vec<ScannedListing>,
    ) -> CompanyReport {
        attempt.complete();
        if let Err(e) = self.store.record(company, &attempt, &listings).await {
            ::log::error!("[{}] failed to store results: {}", company.id, e);
            attempt.mark_partial(format!("results not stored: {e}"));
        }

        let matched: Vec<ScannedListing> = listings
            .iter()
            .filter(|l| {
                l.matching
                    .score()
                    .is_some_and(|s| s >= self.config.notify_threshold)
            })
            .cloned()
            .collect();
        if !matched.is_empty() {
            self.notifier.notify(company, &matched).await;
        }

        ::log::info!(
            "[{}] {:?}: {} action(s), {} page(s), {} found, {} new, {} matched{}",
            company.id,
            attempt.status,
            attempt.actions_taken,
            attempt.pages_visited,
            attempt.listings_found,
            attempt.listings_new,
            matched.len(),
            attempt
                .failure
                .as_deref()
                .map(|f| format!(" ({f})"))
                .unwrap_or_default()
        );
        CompanyReport { attempt, listings }
    }
}
