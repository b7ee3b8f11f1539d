use crate::error::DriverError;
use crate::model::NavigationAction;
use crate::snapshot::PageSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of applying one browser command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Applied,
    ElementNotFound,
    NavigationTimeout,
    CrashedSession,
}

impl ActionOutcome {
    /// Element-not-found and timeouts are retried in place
    pub fn is_recoverable_step(&self) -> bool {
        matches!(
            self,
            ActionOutcome::ElementNotFound | ActionOutcome::NavigationTimeout
        )
    }
}

/// Snapshot read back after a command, with the command's outcome
pub type DriverStep = (PageSnapshot, ActionOutcome);

/// One browser session.
///
/// Implementations resolve element refs through the locators recorded in the
/// last snapshot they returned.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to a URL
    async fn open(&mut self, url: &str) -> DriverStep;

    /// Apply a discrete action to the live page
    async fn apply(&mut self, action: &NavigationAction) -> DriverStep;

    /// Read the current page again without acting
    async fn snapshot(&mut self) -> DriverStep;

    /// Replace the session with a fresh browser context
    async fn restart(&mut self) -> Result<(), DriverError>;

    /// Release the session
    async fn close(&mut self);
}

/// Creates browser sessions, one per company attempt
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}
