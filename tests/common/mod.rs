#![allow(dead_code)]

use async_trait::async_trait;
use careerscan::browser::{ActionOutcome, DriverStep, PageDriver, SessionFactory};
use careerscan::capabilities::{DecisionCapability, DecisionRequest, MatchScore, MatchScorer};
use careerscan::error::{DecisionError, DriverError, ScoringError};
use careerscan::model::{Company, NavigationAction, ScrollDirection, TerminalOutcome};
use careerscan::notify::Notifier;
use careerscan::parsers;
use careerscan::results::ScannedListing;
use careerscan::snapshot::PageSnapshot;
use careerscan::ScanConfig;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory career site: pages by URL, plus outcomes forced onto the next
/// browser commands
#[derive(Default)]
pub struct FakeSite {
    pages: Mutex<HashMap<String, String>>,
    scroll_targets: Mutex<HashMap<String, String>>,
    forced_open: Mutex<VecDeque<ActionOutcome>>,
    forced_apply: Mutex<VecDeque<ActionOutcome>>,
    visits: Mutex<Vec<String>>,
    applied: Mutex<Vec<NavigationAction>>,
    crash_once: Mutex<HashSet<String>>,
    restarts: AtomicUsize,
    pub fail_restart: Mutex<bool>,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page(&self, url: &str, html: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.to_string(), html.into());
    }

    /// Scrolling on `from` loads `to`
    pub fn scroll_loads(&self, from: &str, to: &str) {
        self.scroll_targets
            .lock()
            .unwrap()
            .insert(from.to_string(), to.to_string());
    }

    pub fn force_open(&self, outcomes: &[ActionOutcome]) {
        self.forced_open.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn force_apply(&self, outcomes: &[ActionOutcome]) {
        self.forced_apply.lock().unwrap().extend(outcomes.iter().copied());
    }

    /// The next open of `url` crashes the browser
    pub fn crash_on_open(&self, url: &str) {
        self.crash_once.lock().unwrap().insert(url.to_string());
    }

    /// Browser restarts across every driver of this site
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn visit_count(&self, url: &str) -> usize {
        self.visits().iter().filter(|v| v.as_str() == url).count()
    }

    pub fn applied(&self) -> Vec<NavigationAction> {
        self.applied.lock().unwrap().clone()
    }

    fn load(&self, url: &str) -> Option<PageSnapshot> {
        self.visits.lock().unwrap().push(url.to_string());
        let pages = self.pages.lock().unwrap();
        pages.get(url).map(|html| parsers::snapshot(html, url))
    }
}

pub struct FakeDriver {
    site: Arc<FakeSite>,
    last: PageSnapshot,
    closed: Arc<AtomicUsize>,
}

impl FakeDriver {
    fn go(&mut self, url: &str) -> DriverStep {
        match self.site.load(url) {
            Some(snapshot) => {
                self.last = snapshot.clone();
                (snapshot, ActionOutcome::Applied)
            }
            None => (PageSnapshot::default(), ActionOutcome::NavigationTimeout),
        }
    }

    fn stay(&self) -> DriverStep {
        (self.last.clone(), ActionOutcome::Applied)
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn open(&mut self, url: &str) -> DriverStep {
        let forced = self.site.forced_open.lock().unwrap().pop_front();
        if let Some(outcome) = forced.filter(|o| *o != ActionOutcome::Applied) {
            return (self.last.clone(), outcome);
        }
        if self.site.crash_once.lock().unwrap().remove(url) {
            return (self.last.clone(), ActionOutcome::CrashedSession);
        }
        self.go(url)
    }

    async fn apply(&mut self, action: &NavigationAction) -> DriverStep {
        self.site.applied.lock().unwrap().push(action.clone());
        let forced = self.site.forced_apply.lock().unwrap().pop_front();
        if let Some(outcome) = forced.filter(|o| *o != ActionOutcome::Applied) {
            return (self.last.clone(), outcome);
        }

        match action {
            NavigationAction::Click(reference) => {
                let Some(element) = self.last.element(reference).cloned() else {
                    return (self.last.clone(), ActionOutcome::ElementNotFound);
                };
                match element.href {
                    Some(href) => self.go(&href),
                    None => self.stay(),
                }
            }
            NavigationAction::TypeText(reference, _)
            | NavigationAction::SelectOption(reference, _) => {
                if self.last.contains(reference) {
                    self.stay()
                } else {
                    (self.last.clone(), ActionOutcome::ElementNotFound)
                }
            }
            NavigationAction::Scroll(ScrollDirection::Down) => {
                let target = self
                    .site
                    .scroll_targets
                    .lock()
                    .unwrap()
                    .get(&self.last.url)
                    .cloned();
                match target {
                    Some(url) => self.go(&url),
                    None => self.stay(),
                }
            }
            NavigationAction::Scroll(ScrollDirection::Up) | NavigationAction::Terminal(_) => {
                self.stay()
            }
        }
    }

    async fn snapshot(&mut self) -> DriverStep {
        self.stay()
    }

    async fn restart(&mut self) -> Result<(), DriverError> {
        if *self.site.fail_restart.lock().unwrap() {
            return Err(DriverError::Connect("browser gone".to_string()));
        }
        self.site.restarts.fetch_add(1, Ordering::SeqCst);
        self.last = PageSnapshot::default();
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeFactory {
    pub site: Arc<FakeSite>,
    pub created: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FakeFactory {
    pub fn new(site: Arc<FakeSite>) -> Arc<Self> {
        Arc::new(Self {
            site,
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            fail: false,
        })
    }

    pub fn failing(site: Arc<FakeSite>) -> Arc<Self> {
        Arc::new(Self {
            site,
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            fail: true,
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if self.fail {
            return Err(DriverError::Connect("no WebDriver server".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDriver {
            site: self.site.clone(),
            last: PageSnapshot::default(),
            closed: self.closed.clone(),
        }))
    }
}

/// Replays a fixed list of decisions, then repeats the fallback
pub struct ScriptedDecider {
    replies: Mutex<VecDeque<NavigationAction>>,
    fallback: NavigationAction,
    calls: AtomicUsize,
}

impl ScriptedDecider {
    pub fn new(replies: Vec<NavigationAction>) -> Arc<Self> {
        Self::with_fallback(replies, NavigationAction::Terminal(TerminalOutcome::Exhausted))
    }

    pub fn with_fallback(replies: Vec<NavigationAction>, fallback: NavigationAction) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionCapability for ScriptedDecider {
    async fn decide(&self, _request: DecisionRequest<'_>) -> Result<NavigationAction, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Scores every description the same, or fails every call
pub struct FixedScorer {
    score: Option<u8>,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub fn new(score: u8) -> Arc<Self> {
        Arc::new(Self {
            score: Some(score),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            score: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchScorer for FixedScorer {
    async fn score(&self, _description: &str, _profile: &str) -> Result<MatchScore, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.score {
            Some(match_score) => Ok(MatchScore {
                match_score,
                reasoning: "fixed".to_string(),
                missing_skills: Vec::new(),
            }),
            None => Err(ScoringError::Api {
                status: 503,
                message: "unavailable".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notified: Mutex<Vec<(String, usize)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notified(&self) -> Vec<(String, usize)> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, company: &Company, matched: &[ScannedListing]) {
        self.notified
            .lock()
            .unwrap()
            .push((company.id.clone(), matched.len()));
    }
}

/// Config with test-sized delays
pub fn test_config() -> ScanConfig {
    ScanConfig {
        retry_backoff_ms: 1,
        settle_delay_ms: 0,
        navigation_timeout_secs: 5,
        decision_timeout_secs: 5,
        scoring_timeout_secs: 5,
        company_concurrency: 1,
        detail_concurrency: 2,
        ..ScanConfig::default()
    }
}

pub fn company(id: &str, career_page_url: &str) -> Company {
    Company {
        id: id.to_string(),
        name: id.to_uppercase(),
        career_page_url: career_page_url.to_string(),
        is_active: true,
    }
}

pub fn detail_url(host: &str, page: usize, index: usize) -> String {
    format!("https://{host}/careers/jobs/{page}-{index}")
}

/// One page of `count` listings; links carry a tracking parameter
pub fn listing_page(host: &str, page: usize, count: usize, next: Option<&str>) -> String {
    let mut html = String::from("<html><head><title>Open roles</title></head><body><main><ul>");
    for index in 1..=count {
        html.push_str(&format!(
            "<li class=\"job\"><a href=\"{}?utm_source=board\">Engineer {page}-{index}</a><span>Remote</span></li>",
            detail_url(host, page, index)
        ));
    }
    html.push_str("</ul>");
    if let Some(next) = next {
        html.push_str(&format!("<a href=\"{next}\">Next</a>"));
    }
    html.push_str("</main></body></html>");
    html
}

pub fn detail_page(title: &str) -> String {
    format!(
        "<html><body><nav><a href=\"/\">Home</a></nav><main><h1>{title}</h1>\
         <p>We are looking for an engineer to build reliable distributed systems in Rust.</p>\
         <p>You will own services end to end.</p></main></body></html>"
    )
}

/// Registers a site with `pages` listing pages of `per_page` listings each,
/// plus every detail page. Returns the first listing page URL.
pub fn paged_site(site: &FakeSite, host: &str, pages: usize, per_page: usize) -> String {
    let url = |page: usize| {
        if page == 1 {
            format!("https://{host}/careers/jobs")
        } else {
            format!("https://{host}/careers/jobs?page={page}")
        }
    };
    for page in 1..=pages {
        let next = (page < pages).then(|| url(page + 1));
        site.page(&url(page), listing_page(host, page, per_page, next.as_deref()));
        for index in 1..=per_page {
            site.page(
                &detail_url(host, page, index),
                detail_page(&format!("Engineer {page}-{index}")),
            );
        }
    }
    url(1)
}
