use crate::capabilities::{DecisionCapability, DecisionPhase, DecisionRequest, HistoryEntry};
use crate::config::ScanConfig;
use crate::error::DecisionError;
use crate::model::{NavigationAction, NavigationGoal};
use crate::snapshot::{ElementRole, PageSnapshot};
use crate::utils::backoff_delay;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Wraps the decision capability: bounds its input, checks its output
/// against the page, and retries unusable answers with backoff
pub struct ActionResolver {
    capability: Arc<dyn DecisionCapability>,
    history_window: usize,
    retries: u32,
    backoff: Duration,
    timeout: Duration,
}

impl ActionResolver {
    pub fn new(capability: Arc<dyn DecisionCapability>, config: &ScanConfig) -> Self {
        Self {
            capability,
            history_window: config.history_window,
            retries: config.decision_retries,
            backoff: config.retry_backoff(),
            timeout: config.decision_timeout(),
        }
    }

    /// Next action for the page, or the last error once retries run out
    pub async fn resolve(
        &self,
        snapshot: &PageSnapshot,
        goal: &NavigationGoal,
        history: &[HistoryEntry],
        phase: DecisionPhase,
    ) -> Result<NavigationAction, DecisionError> {
        let recent = &history[history.len().saturating_sub(self.history_window)..];
        let request = DecisionRequest {
            snapshot,
            goal,
            history: recent,
            phase,
        };

        let mut attempt = 0;
        loop {
            let error = match self.decide_once(request).await {
                Ok(action) => {
                    ::log::debug!("Decision for {}: {}", snapshot.url, action);
                    return Ok(action);
                }
                Err(e) => e,
            };

            if attempt >= self.retries {
                ::log::error!(
                    "Giving up on a decision for {} after {} attempt(s): {}",
                    snapshot.url,
                    attempt + 1,
                    error
                );
                return Err(error);
            }
            let delay = backoff_delay(self.backoff, attempt);
            ::log::warn!(
                "Unusable decision for {} ({}), retrying in {:?}",
                snapshot.url,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn decide_once(&self, request: DecisionRequest<'_>) -> Result<NavigationAction, DecisionError> {
        let action = timeout(self.timeout, self.capability.decide(request))
            .await
            .map_err(|_| DecisionError::Timeout(self.timeout))??;
        validate(&action, request.snapshot)?;
        Ok(action)
    }
}

/// Checks an action against the snapshot it will be applied to
pub fn validate(action: &NavigationAction, snapshot: &PageSnapshot) -> Result<(), DecisionError> {
    let Some(reference) = action.element() else {
        return Ok(());
    };
    let element = snapshot
        .element(reference)
        .ok_or_else(|| DecisionError::StaleReference(reference.to_string()))?;

    match action {
        NavigationAction::TypeText(_, _) if !element.role.accepts_text() => {
            Err(DecisionError::Invalid(format!(
                "cannot type into {} {}",
                element.role.as_str(),
                reference
            )))
        }
        NavigationAction::SelectOption(_, _) if element.role != ElementRole::Select => {
            Err(DecisionError::Invalid(format!(
                "{} is a {}, not a select",
                reference,
                element.role.as_str()
            )))
        }
        NavigationAction::SelectOption(_, wanted) if element.choice(wanted).is_none() => {
            Err(DecisionError::Invalid(format!(
                "{reference} has no option {wanted:?}"
            )))
        }
        _ => Ok(()),
    }
}
