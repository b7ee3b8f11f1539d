use crate::browser::{ActionOutcome, BrowserSession};
use crate::capabilities::{DecisionPhase, HistoryEntry};
use crate::config::ScanConfig;
use crate::engine::ActionResolver;
use crate::error::SessionError;
use crate::model::{NavigationAction, NavigationGoal, TerminalOutcome};
use crate::utils::backoff_delay;
use std::time::Duration;
use thiserror::Error;

/// States of the bounded navigation loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Start,
    Deciding,
    Acting(NavigationAction),
    Ready,
    Exhausted,
}

/// Why navigation gave up
#[derive(Debug, Error)]
pub enum AbortReason {
    #[error("action budget of {0} exhausted before reaching listings")]
    BudgetExceeded(usize),

    #[error("no usable decision: {0}")]
    Decision(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("career page never loaded: {0}")]
    StartPageUnreachable(String),
}

/// Where navigation ended
#[derive(Debug)]
pub enum NavigationOutcome {
    /// The filtered listing view is on screen
    Ready,
    /// The site has no listings for the goal
    Exhausted,
    Aborted(AbortReason),
}

#[derive(Debug)]
pub struct NavigationReport {
    pub outcome: NavigationOutcome,
    pub actions_taken: usize,
    pub history: Vec<HistoryEntry>,
}

/// Drives a session from the career page to the listing view
pub struct Navigator<'a> {
    resolver: &'a ActionResolver,
    budget: usize,
    step_retries: u32,
    backoff: Duration,
}

impl<'a> Navigator<'a> {
    pub fn new(resolver: &'a ActionResolver, config: &ScanConfig) -> Self {
        Self {
            resolver,
            budget: config.action_budget,
            step_retries: config.step_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Runs the state machine until a terminal state; never applies more
    /// than `action_budget` actions
    pub async fn navigate(
        &self,
        session: &mut BrowserSession,
        start_url: &str,
        goal: &NavigationGoal,
    ) -> NavigationReport {
        let mut state = NavState::Start;
        let mut actions_taken = 0;
        let mut history = Vec::new();

        let outcome = loop {
            ::log::trace!("[{}] navigation state {:?}", session.label(), state);
            let step = match state {
                NavState::Start => self.start(session, start_url).await,
                NavState::Deciding => {
                    if actions_taken >= self.budget {
                        ::log::warn!(
                            "[{}] action budget of {} used up",
                            session.label(),
                            self.budget
                        );
                        break NavigationOutcome::Aborted(AbortReason::BudgetExceeded(
                            self.budget,
                        ));
                    }
                    self.decide(session, goal, &history).await
                }
                NavState::Acting(action) => {
                    actions_taken += 1;
                    self.act(session, action, &mut history).await
                }
                NavState::Ready => break NavigationOutcome::Ready,
                NavState::Exhausted => break NavigationOutcome::Exhausted,
            };
            state = match step {
                Ok(next) => next,
                Err(reason) => break NavigationOutcome::Aborted(reason),
            };
        };

        match &outcome {
            NavigationOutcome::Aborted(reason) => {
                ::log::error!("[{}] navigation aborted: {}", session.label(), reason)
            }
            other => ::log::info!(
                "[{}] navigation finished as {:?} after {} action(s)",
                session.label(),
                other,
                actions_taken
            ),
        }

        NavigationReport {
            outcome,
            actions_taken,
            history,
        }
    }

    /// Opens the career page, retrying timeouts and surviving one crash
    async fn start(
        &self,
        session: &mut BrowserSession,
        start_url: &str,
    ) -> Result<NavState, AbortReason> {
        let mut attempt = 0;
        loop {
            let outcome = session.open(start_url).await;
            match outcome {
                ActionOutcome::Applied => return Ok(NavState::Deciding),
                ActionOutcome::CrashedSession => session.recover().await?,
                ActionOutcome::ElementNotFound | ActionOutcome::NavigationTimeout => {}
            }
            if attempt >= self.step_retries {
                return Err(AbortReason::StartPageUnreachable(format!(
                    "{start_url} ({outcome:?})"
                )));
            }
            tokio::time::sleep(backoff_delay(self.backoff, attempt)).await;
            attempt += 1;
        }
    }

    async fn decide(
        &self,
        session: &BrowserSession,
        goal: &NavigationGoal,
        history: &[HistoryEntry],
    ) -> Result<NavState, AbortReason> {
        let action = self
            .resolver
            .resolve(session.current(), goal, history, DecisionPhase::Navigate)
            .await
            .map_err(|e| AbortReason::Decision(e.to_string()))?;

        Ok(match action {
            NavigationAction::Terminal(TerminalOutcome::Ready) => NavState::Ready,
            NavigationAction::Terminal(TerminalOutcome::Exhausted) => NavState::Exhausted,
            action => NavState::Acting(action),
        })
    }

    /// Applies one action. The same step is retried on element-not-found or
    /// timeout; after that the page is re-read and a new decision is made.
    async fn act(
        &self,
        session: &mut BrowserSession,
        action: NavigationAction,
        history: &mut Vec<HistoryEntry>,
    ) -> Result<NavState, AbortReason> {
        let snapshot_summary = session.current().summary();
        let mut attempt = 0;

        let outcome = loop {
            let outcome = session.apply(&action).await;
            if !outcome.is_recoverable_step() || attempt >= self.step_retries {
                break outcome;
            }
            let delay = backoff_delay(self.backoff, attempt);
            ::log::debug!(
                "[{}] retrying {} after {:?} in {:?}",
                session.label(),
                action,
                outcome,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        history.push(HistoryEntry {
            snapshot_summary,
            action,
            outcome,
        });

        match outcome {
            ActionOutcome::Applied => Ok(NavState::Deciding),
            ActionOutcome::ElementNotFound | ActionOutcome::NavigationTimeout => {
                ::log::warn!(
                    "[{}] step failed after {} retries, re-reading the page",
                    session.label(),
                    self.step_retries
                );
                match session.refresh().await {
                    ActionOutcome::CrashedSession => {
                        session.recover().await?;
                        Ok(NavState::Start)
                    }
                    _ => Ok(NavState::Deciding),
                }
            }
            ActionOutcome::CrashedSession => {
                session.recover().await?;
                Ok(NavState::Start)
            }
        }
    }
}
