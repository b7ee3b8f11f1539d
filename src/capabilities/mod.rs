//! Opaque model-backed capabilities the engine calls through.
//!
//! The engine only depends on the traits here; `openrouter` provides the
//! HTTP-backed implementation used by the binary.

pub mod openrouter;

use crate::browser::ActionOutcome;
use crate::error::{DecisionError, ScoringError};
use crate::model::{NavigationAction, NavigationGoal, ScrollDirection, TerminalOutcome};
use crate::snapshot::{ElementRef, PageSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the decision is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPhase {
    /// Reach the filtered job listing view
    Navigate,
    /// Advance to more results; any terminal means there are none
    Paginate,
}

/// One prior step of the current attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub snapshot_summary: String,
    pub action: NavigationAction,
    pub outcome: ActionOutcome,
}

/// Input of a decision
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub snapshot: &'a PageSnapshot,
    pub goal: &'a NavigationGoal,
    pub history: &'a [HistoryEntry],
    pub phase: DecisionPhase,
}

/// Chooses the next navigation action for a page
#[async_trait]
pub trait DecisionCapability: Send + Sync {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<NavigationAction, DecisionError>;
}

/// Fit of a job description for a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    /// 0 to 100
    pub match_score: u8,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub missing_skills: Vec<String>,
}

/// Scores a job description against a profile
#[async_trait]
pub trait MatchScorer: Send + Sync {
    async fn score(&self, description: &str, profile: &str) -> Result<MatchScore, ScoringError>;
}

/// Decision as the model writes it, before it is checked
#[derive(Debug, Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default)]
    element: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    direction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    match_score: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    missing_skills: Vec<String>,
}

/// Strips a Markdown code fence some models wrap JSON in
fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses model output into the closed action type.
///
/// Accepted shape: `{"action": "click"|"type"|"select"|"scroll"|"ready"|"exhausted",
/// "element": "e3", "value": "...", "direction": "down"|"up"}`.
/// Anything else is a `DecisionError::Malformed`.
pub fn parse_decision(text: &str) -> Result<NavigationAction, DecisionError> {
    let raw: RawDecision = serde_json::from_str(unfence(text))
        .map_err(|e| DecisionError::Malformed(format!("not a decision object: {e}")))?;

    let element = || {
        raw.element
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(ElementRef::new)
            .ok_or_else(|| DecisionError::Malformed(format!("{} needs an element", raw.action)))
    };
    let value = || {
        raw.value
            .clone()
            .ok_or_else(|| DecisionError::Malformed(format!("{} needs a value", raw.action)))
    };

    match raw.action.trim().to_ascii_lowercase().as_str() {
        "click" => Ok(NavigationAction::Click(element()?)),
        "type" | "type_text" => Ok(NavigationAction::TypeText(element()?, value()?)),
        "select" | "select_option" => Ok(NavigationAction::SelectOption(element()?, value()?)),
        "scroll" => match raw.direction.as_deref().unwrap_or("down") {
            "down" => Ok(NavigationAction::Scroll(ScrollDirection::Down)),
            "up" => Ok(NavigationAction::Scroll(ScrollDirection::Up)),
            other => Err(DecisionError::Malformed(format!(
                "unknown scroll direction {other:?}"
            ))),
        },
        "ready" | "stop" => Ok(NavigationAction::Terminal(TerminalOutcome::Ready)),
        "exhausted" | "none" => Ok(NavigationAction::Terminal(TerminalOutcome::Exhausted)),
        other => Err(DecisionError::Malformed(format!("unknown action {other:?}"))),
    }
}

/// Parses model output into a match score clamped to 0..=100
pub fn parse_match_score(text: &str) -> Result<MatchScore, ScoringError> {
    let raw: RawScore = serde_json::from_str(unfence(text))
        .map_err(|e| ScoringError::Malformed(e.to_string()))?;
    if !raw.match_score.is_finite() {
        return Err(ScoringError::Malformed("match_score is not a number".to_string()));
    }
    Ok(MatchScore {
        match_score: raw.match_score.round().clamp(0.0, 100.0) as u8,
        reasoning: raw.reasoning,
        missing_skills: raw.missing_skills,
    })
}
