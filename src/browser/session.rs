use crate::browser::{ActionOutcome, DriverStep, PageDriver};
use crate::error::{DriverError, SessionError};
use crate::model::NavigationAction;
use crate::snapshot::PageSnapshot;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::timeout;

/// Restarts allowed per company attempt before a crash becomes fatal
pub const MAX_RESTARTS: u32 = 1;

/// A browser session exclusively owned by one company attempt.
///
/// Every driver call is bounded by the navigation timeout, and the session
/// keeps the last good snapshot of the page. Sessions opened with
/// [`BrowserSession::sibling`] draw on the same restart allowance.
pub struct BrowserSession {
    driver: Box<dyn PageDriver>,
    label: String,
    timeout: Duration,
    current: PageSnapshot,
    restarts: Arc<AtomicU32>,
    closed: bool,
}

impl BrowserSession {
    pub fn new(driver: Box<dyn PageDriver>, label: &str, timeout: Duration) -> Self {
        Self {
            driver,
            label: label.to_string(),
            timeout,
            current: PageSnapshot::default(),
            restarts: Arc::new(AtomicU32::new(0)),
            closed: false,
        }
    }

    /// Another session for the same company attempt, sharing its restarts
    pub fn sibling(&self, driver: Box<dyn PageDriver>, label: &str) -> Self {
        Self {
            restarts: self.restarts.clone(),
            ..Self::new(driver, label, self.timeout)
        }
    }

    /// Last snapshot returned by a successful read of the page
    pub fn current(&self) -> &PageSnapshot {
        &self.current
    }

    /// Restarts used by this session and its siblings
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn open(&mut self, url: &str) -> ActionOutcome {
        ::log::debug!("[{}] open {}", self.label, url);
        let limit = self.timeout;
        let step = timeout(limit, self.driver.open(url)).await;
        self.settle(step)
    }

    pub async fn apply(&mut self, action: &NavigationAction) -> ActionOutcome {
        ::log::debug!("[{}] {}", self.label, action);
        let limit = self.timeout;
        let step = timeout(limit, self.driver.apply(action)).await;
        self.settle(step)
    }

    /// Re-reads the page without acting
    pub async fn refresh(&mut self) -> ActionOutcome {
        let limit = self.timeout;
        let step = timeout(limit, self.driver.snapshot()).await;
        self.settle(step)
    }

    fn settle(&mut self, step: Result<DriverStep, tokio::time::error::Elapsed>) -> ActionOutcome {
        match step {
            Ok((snapshot, outcome)) => {
                if matches!(outcome, ActionOutcome::Applied | ActionOutcome::ElementNotFound) {
                    self.current = snapshot;
                }
                if outcome != ActionOutcome::Applied {
                    ::log::warn!("[{}] browser reported {:?}", self.label, outcome);
                }
                outcome
            }
            Err(_) => {
                ::log::warn!(
                    "[{}] browser call exceeded {:?}",
                    self.label,
                    self.timeout
                );
                ActionOutcome::NavigationTimeout
            }
        }
    }

    /// Handles a crashed session: the first crash of the attempt restarts
    /// the browser context, any further crash is fatal
    pub async fn recover(&mut self) -> Result<(), SessionError> {
        let claimed = self
            .restarts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < MAX_RESTARTS).then_some(used + 1)
            });
        if let Err(used) = claimed {
            ::log::error!(
                "[{}] session crashed again after {} restart(s), giving up",
                self.label,
                used
            );
            return Err(SessionError::Fatal { restarts: used });
        }
        ::log::warn!("[{}] session crashed, restarting browser context", self.label);

        let limit = self.timeout;
        if let Err(e) = bounded(limit, self.driver.restart()).await {
            ::log::error!("[{}] restart failed: {}", self.label, e);
            return Err(SessionError::Restart(e));
        }
        self.current = PageSnapshot::default();
        ::log::info!("[{}] session restarted", self.label);
        Ok(())
    }

    /// Releases the browser; called on every exit path of an attempt
    pub async fn close(mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if timeout(self.timeout, self.driver.close()).await.is_err() {
            ::log::warn!("[{}] closing the session timed out", self.label);
        } else {
            ::log::debug!("[{}] session closed", self.label);
        }
    }
}

async fn bounded<F>(limit: Duration, fut: F) -> Result<(), DriverError>
where
    F: Future<Output = Result<(), DriverError>>,
{
    timeout(limit, fut)
        .await
        .unwrap_or(Err(DriverError::Timeout(limit)))
}
