mod common;

use careerscan::browser::ActionOutcome;
use careerscan::model::{NavigationAction, TerminalOutcome, UserProfile};
use careerscan::notify::Notifier;
use careerscan::results::{ExtractionStatus, MatchOutcome, PaginationStop, ScanStatus};
use careerscan::snapshot::ElementRef;
use careerscan::store::{ListingStore, MemoryStore};
use careerscan::{KnownListingIndex, ScanAttempt, ScanConfig, ScanOrchestrator, ScannedListing};
use common::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn profile() -> UserProfile {
    UserProfile {
        name: "Test User".to_string(),
        resume_text: "Ten years of Rust and distributed systems.".to_string(),
        preferences: "Rust, remote".to_string(),
    }
}

fn ready() -> NavigationAction {
    NavigationAction::Terminal(TerminalOutcome::Ready)
}

fn orchestrator(
    config: ScanConfig,
    factory: Arc<FakeFactory>,
    decider: Arc<ScriptedDecider>,
    scorer: Arc<FixedScorer>,
    store: Arc<dyn ListingStore>,
    notifier: Arc<dyn Notifier>,
) -> ScanOrchestrator {
    ScanOrchestrator::new(config, factory, decider, scorer, store, notifier).unwrap()
}

#[tokio::test]
async fn test_three_pages_then_rescan_finds_nothing_new() {
    let site = FakeSite::new();
    let start = paged_site(&site, "acme.test", 3, 5);
    let factory = FakeFactory::new(site.clone());
    let decider = ScriptedDecider::new(vec![ready(), ready()]);
    let scorer = FixedScorer::new(85);
    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::new();
    let scanner = orchestrator(
        test_config(),
        factory.clone(),
        decider.clone(),
        scorer.clone(),
        store.clone(),
        notifier.clone(),
    );
    let companies = vec![company("acme", &start)];

    let first = scanner
        .run_batch(&companies, &profile(), &CancellationToken::new())
        .await;
    let report = first.report("acme").unwrap();
    let attempt = &report.attempt;

    assert_eq!(attempt.status, ScanStatus::Succeeded);
    assert_eq!(decider.calls(), 1);
    assert_eq!(attempt.actions_taken, 0);
    assert_eq!(attempt.pages_visited, 3);
    assert_eq!(attempt.pagination_stop, Some(PaginationStop::Exhausted));
    assert_eq!(attempt.listings_found, 15);
    assert_eq!(attempt.listings_new, 15);
    assert_eq!(report.listings.len(), 15);

    // two "next" clicks, nothing else
    let clicks = site.applied();
    assert_eq!(clicks.len(), 2);
    assert!(clicks.iter().all(|a| matches!(a, NavigationAction::Click(_))));

    // tracking parameters are gone and order follows the pages
    assert_eq!(
        report.listings[0].record.detail_url,
        detail_url("acme.test", 1, 1)
    );
    assert_eq!(
        report.listings[14].record.detail_url,
        detail_url("acme.test", 3, 5)
    );
    assert!(report.listings.iter().all(|l| {
        l.extraction == ExtractionStatus::Complete
            && l.description.contains("distributed systems in Rust")
            && l.matching.score() == Some(85)
    }));
    assert_eq!(scorer.calls(), 15);
    assert_eq!(notifier.notified(), vec![("acme".to_string(), 15)]);
    assert_eq!(factory.created(), factory.closed());

    let detail = detail_url("acme.test", 2, 3);
    let visits_before = site.visit_count(&detail);
    assert_eq!(visits_before, 1);

    let second = scanner
        .run_batch(&companies, &profile(), &CancellationToken::new())
        .await;
    let attempt = &second.report("acme").unwrap().attempt;
    assert_eq!(attempt.status, ScanStatus::Succeeded);
    assert_eq!(attempt.listings_found, 15);
    assert_eq!(attempt.listings_new, 0);
    assert!(second.report("acme").unwrap().listings.is_empty());
    assert_eq!(site.visit_count(&detail), visits_before);
    assert_eq!(scorer.calls(), 15);
    assert_eq!(notifier.notified().len(), 1);

    let stored = store.company("acme").await.unwrap();
    assert_eq!(stored.known.len(), 15);
    assert_eq!(stored.attempts.len(), 2);
}

#[tokio::test]
async fn test_immediate_exhaustion_is_success() {
    let site = FakeSite::new();
    site.page(
        "https://empty.test/careers",
        "<html><body><p>No open positions right now.</p></body></html>",
    );
    let factory = FakeFactory::new(site.clone());
    let scorer = FixedScorer::new(90);
    let scanner = orchestrator(
        test_config(),
        factory.clone(),
        ScriptedDecider::new(vec![NavigationAction::Terminal(TerminalOutcome::Exhausted)]),
        scorer.clone(),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(
            &[company("empty", "https://empty.test/careers")],
            &profile(),
            &CancellationToken::new(),
        )
        .await;
    let report = batch.report("empty").unwrap();

    assert_eq!(report.attempt.status, ScanStatus::Succeeded);
    assert_eq!(report.attempt.listings_found, 0);
    assert!(report.attempt.failure.is_none());
    assert!(report.listings.is_empty());
    assert_eq!(scorer.calls(), 0);
    assert_eq!(factory.closed(), 1);
}

#[tokio::test]
async fn test_second_crash_aborts_after_one_restart() {
    let site = FakeSite::new();
    site.page(
        "https://crashy.test/",
        "<html><body><button>Show jobs</button></body></html>",
    );
    site.force_apply(&[ActionOutcome::CrashedSession, ActionOutcome::CrashedSession]);
    let factory = FakeFactory::new(site.clone());
    let click = NavigationAction::Click(ElementRef::new("e0"));
    let store = Arc::new(MemoryStore::new());
    let scanner = orchestrator(
        test_config(),
        factory.clone(),
        ScriptedDecider::with_fallback(vec![], click),
        FixedScorer::new(90),
        store.clone(),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(
            &[company("crashy", "https://crashy.test/")],
            &profile(),
            &CancellationToken::new(),
        )
        .await;
    let report = batch.report("crashy").unwrap();

    assert_eq!(report.attempt.status, ScanStatus::Aborted);
    assert_eq!(report.attempt.session_restarts, 1);
    assert_eq!(report.attempt.actions_taken, 2);
    assert!(report.listings.is_empty());
    assert_eq!(site.applied().len(), 2);
    assert_eq!(factory.closed(), 1);

    let stored = store.company("crashy").await.unwrap();
    assert!(stored.known.is_empty());
    assert_eq!(stored.attempts[0].status, ScanStatus::Aborted);
}

#[tokio::test]
async fn test_crash_during_pagination_keeps_partial_results() {
    let site = FakeSite::new();
    let start = paged_site(&site, "restart.test", 2, 3);
    site.force_apply(&[ActionOutcome::CrashedSession]);
    let scanner = orchestrator(
        test_config(),
        FakeFactory::new(site.clone()),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::new(40),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(
            &[company("restart", &start)],
            &profile(),
            &CancellationToken::new(),
        )
        .await;
    let report = batch.report("restart").unwrap();

    assert_eq!(report.attempt.status, ScanStatus::PartiallyFailed);
    assert_eq!(
        report.attempt.pagination_stop,
        Some(PaginationStop::SessionRestarted)
    );
    assert_eq!(report.attempt.session_restarts, 1);
    assert_eq!(report.listings.len(), 3);
    assert!(report
        .listings
        .iter()
        .all(|l| l.extraction == ExtractionStatus::Complete));
}

#[tokio::test]
async fn test_detail_session_crash_spends_the_company_restart() {
    let site = FakeSite::new();
    let start = paged_site(&site, "lanes.test", 1, 3);
    // index 1 goes to the extra detail session
    site.crash_on_open(&detail_url("lanes.test", 1, 2));
    let factory = FakeFactory::new(site.clone());
    let scanner = orchestrator(
        test_config(),
        factory.clone(),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::new(40),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(&[company("lanes", &start)], &profile(), &CancellationToken::new())
        .await;
    let report = batch.report("lanes").unwrap();

    assert_eq!(report.attempt.status, ScanStatus::Succeeded);
    assert_eq!(report.attempt.session_restarts, 1);
    assert_eq!(site.restarts(), 1);
    assert_eq!(factory.created(), 2);
    assert!(report
        .listings
        .iter()
        .all(|l| l.extraction == ExtractionStatus::Complete));
}

#[tokio::test]
async fn test_detail_session_gets_no_restart_after_pagination_used_it() {
    let site = FakeSite::new();
    let start = paged_site(&site, "twice.test", 2, 3);
    site.force_apply(&[ActionOutcome::CrashedSession]);
    site.crash_on_open(&detail_url("twice.test", 1, 2));
    let scanner = orchestrator(
        test_config(),
        FakeFactory::new(site.clone()),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::new(40),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(&[company("twice", &start)], &profile(), &CancellationToken::new())
        .await;
    let report = batch.report("twice").unwrap();

    assert_eq!(report.attempt.status, ScanStatus::PartiallyFailed);
    assert_eq!(report.attempt.session_restarts, 1);
    assert_eq!(site.restarts(), 1);
    assert_eq!(report.listings.len(), 3);
    let incomplete: Vec<&str> = report
        .listings
        .iter()
        .filter(|l| l.extraction == ExtractionStatus::ExtractionIncomplete)
        .map(|l| l.record.detail_url.as_str())
        .collect();
    assert_eq!(incomplete, vec![detail_url("twice.test", 1, 2).as_str()]);
}

#[tokio::test]
async fn test_page_ceiling_truncates() {
    let site = FakeSite::new();
    let start = paged_site(&site, "big.test", 4, 2);
    let config = ScanConfig {
        max_pages: 2,
        ..test_config()
    };
    let scanner = orchestrator(
        config,
        FakeFactory::new(site.clone()),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::new(10),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(&[company("big", &start)], &profile(), &CancellationToken::new())
        .await;
    let attempt = &batch.report("big").unwrap().attempt;

    assert_eq!(attempt.status, ScanStatus::Succeeded);
    assert_eq!(attempt.pagination_stop, Some(PaginationStop::Truncated));
    assert_eq!(attempt.pages_visited, 2);
    assert_eq!(attempt.listings_new, 4);
}

#[tokio::test]
async fn test_scoring_failure_and_missing_detail_page() {
    let site = FakeSite::new();
    let start = paged_site(&site, "flaky.test", 1, 2);
    // the second detail page renders blank
    let missing = detail_url("flaky.test", 1, 2);
    site.page(&missing, "");
    let scanner = orchestrator(
        test_config(),
        FakeFactory::new(site.clone()),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::failing(),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(&[company("flaky", &start)], &profile(), &CancellationToken::new())
        .await;
    let report = batch.report("flaky").unwrap();

    assert_eq!(report.attempt.status, ScanStatus::Succeeded);
    assert_eq!(report.listings.len(), 2);
    assert_eq!(report.listings[0].extraction, ExtractionStatus::Complete);
    assert!(matches!(
        &report.listings[0].matching,
        MatchOutcome::Unscored { reason } if reason.contains("503")
    ));
    assert_eq!(
        report.listings[1].extraction,
        ExtractionStatus::ExtractionIncomplete
    );
    assert_eq!(report.listings[1].record.detail_url, missing);
}

#[tokio::test]
async fn test_known_listings_are_not_fetched_again() {
    let site = FakeSite::new();
    let start = paged_site(&site, "known.test", 1, 3);
    let store = Arc::new(
        MemoryStore::new()
            .with_known("known", [detail_url("known.test", 1, 1)])
            .await,
    );
    let scorer = FixedScorer::new(75);
    let scanner = orchestrator(
        test_config(),
        FakeFactory::new(site.clone()),
        ScriptedDecider::new(vec![ready()]),
        scorer.clone(),
        store,
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(&[company("known", &start)], &profile(), &CancellationToken::new())
        .await;
    let report = batch.report("known").unwrap();

    assert_eq!(report.attempt.listings_found, 3);
    assert_eq!(report.attempt.listings_new, 2);
    assert_eq!(site.visit_count(&detail_url("known.test", 1, 1)), 0);
    assert_eq!(scorer.calls(), 2);
}

#[tokio::test]
async fn test_cancelled_batch_starts_nothing() {
    let site = FakeSite::new();
    let start = paged_site(&site, "acme.test", 1, 1);
    let factory = FakeFactory::new(site.clone());
    let scanner = orchestrator(
        test_config(),
        factory.clone(),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::new(90),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let batch = scanner
        .run_batch(&[company("acme", &start)], &profile(), &cancel)
        .await;

    assert!(batch.cancelled);
    assert!(batch.companies.is_empty());
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let site = FakeSite::new();
    let good = paged_site(&site, "good.test", 1, 2);
    let mut inactive = company("sleepy", &good);
    inactive.is_active = false;
    let config = ScanConfig {
        company_concurrency: 2,
        ..test_config()
    };
    let scanner = orchestrator(
        config,
        FakeFactory::new(site.clone()),
        ScriptedDecider::with_fallback(vec![], ready()),
        FixedScorer::new(50),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(
            &[
                company("missing", "https://missing.test/careers"),
                inactive,
                company("good", &good),
            ],
            &profile(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(batch.companies.len(), 2);
    assert_eq!(batch.companies[0].attempt.company_id, "missing");
    assert_eq!(batch.companies[0].attempt.status, ScanStatus::Aborted);
    assert!(batch.report("sleepy").is_none());
    assert_eq!(
        batch.report("good").unwrap().attempt.status,
        ScanStatus::Succeeded
    );
    assert_eq!(batch.report("good").unwrap().listings.len(), 2);
}

#[tokio::test]
async fn test_session_creation_failure_aborts() {
    let site = FakeSite::new();
    let scanner = orchestrator(
        test_config(),
        FakeFactory::failing(site),
        ScriptedDecider::new(vec![ready()]),
        FixedScorer::new(90),
        Arc::new(MemoryStore::new()),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(
            &[company("acme", "https://acme.test/careers")],
            &profile(),
            &CancellationToken::new(),
        )
        .await;
    let attempt = &batch.report("acme").unwrap().attempt;

    assert_eq!(attempt.status, ScanStatus::Aborted);
    assert!(attempt.failure.as_deref().unwrap().contains("WebDriver"));
}

struct BrokenStore;

#[async_trait::async_trait]
impl ListingStore for BrokenStore {
    async fn known_index(
        &self,
        _company: &careerscan::Company,
    ) -> Result<KnownListingIndex, careerscan::error::StoreError> {
        Err(careerscan::error::StoreError::Io(std::io::Error::other(
            "disk on fire",
        )))
    }

    async fn record(
        &self,
        _company: &careerscan::Company,
        _attempt: &ScanAttempt,
        _listings: &[ScannedListing],
    ) -> Result<(), careerscan::error::StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_unreadable_known_index_aborts() {
    let site = FakeSite::new();
    let start = paged_site(&site, "acme.test", 1, 2);
    let decider = ScriptedDecider::new(vec![ready()]);
    let scanner = orchestrator(
        test_config(),
        FakeFactory::new(site.clone()),
        decider.clone(),
        FixedScorer::new(90),
        Arc::new(BrokenStore),
        RecordingNotifier::new(),
    );

    let batch = scanner
        .run_batch(&[company("acme", &start)], &profile(), &CancellationToken::new())
        .await;

    assert_eq!(
        batch.report("acme").unwrap().attempt.status,
        ScanStatus::Aborted
    );
    assert_eq!(decider.calls(), 0);
}
