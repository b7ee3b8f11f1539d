//! OpenRouter (OpenAI-compatible chat completions) backed capabilities.

use super::{
    DecisionCapability, DecisionPhase, DecisionRequest, MatchScore, MatchScorer, parse_decision,
    parse_match_score,
};
use crate::config::LlmConfig;
use crate::error::{ConfigError, DecisionError, ScoringError};
use crate::model::NavigationAction;
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Page outline budget handed to the model
const MAX_PAGE_CHARS: usize = 15_000;
/// Job description budget handed to the model
const MAX_JOB_CHARS: usize = 10_000;

const NAVIGATE_PROMPT: &str = "You operate a web browser on a company career site. \
Choose exactly one next step towards a list of job postings filtered for the goal. \
Reply with JSON only: {\"action\": \"click\"|\"type\"|\"select\"|\"scroll\"|\"ready\"|\"exhausted\", \
\"element\": \"<ref like e3>\", \"value\": \"<text or option>\", \"direction\": \"down\"|\"up\"}. \
Use \"ready\" when job postings for the goal are listed, \"exhausted\" when none can be reached. \
Only use element refs from the page outline.";

const PAGINATE_PROMPT: &str = "You operate a web browser on a job listing page. \
If a control loads more job postings, reply with the JSON step that triggers it \
(click or scroll); otherwise reply {\"action\": \"exhausted\"}. Reply with JSON only, \
using element refs from the page outline.";

const SCORING_PROMPT: &str = "You are an expert technical recruiter. Evaluate how well the \
candidate fits the job (0-100) based on technical skills, years of experience and \
location/remote preferences. Reply with JSON only: {\"match_score\": <int>, \
\"reasoning\": \"<short explanation>\", \"missing_skills\": [\"<skill>\"]}.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Failures of one chat completion call
#[derive(Debug, Error)]
enum ChatError {
    #[error("request failed: {0}")]
    Http(reqwest::Error),

    #[error("status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response had no content")]
    Empty,
}

/// Client for an OpenAI-compatible chat completions endpoint
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|_| ConfigError::Missing("usable HTTP client"))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn chat(&self, system: &str, user: String) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ChatError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await.map_err(ChatError::Http)?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ChatError::Empty)
    }
}

fn decision_prompt(request: &DecisionRequest<'_>) -> String {
    let mut prompt = format!(
        "GOAL: {}\nURL: {}\nTITLE: {}\n\nPAGE OUTLINE:\n{}",
        request.goal.describe(),
        request.snapshot.url,
        request.snapshot.title,
        request.snapshot.outline(MAX_PAGE_CHARS)
    );
    if !request.history.is_empty() {
        prompt.push_str("\nPREVIOUS STEPS:\n");
        for entry in request.history {
            prompt.push_str(&format!(
                "- on {}: {} -> {:?}\n",
                entry.snapshot_summary, entry.action, entry.outcome
            ));
        }
    }
    prompt
}

#[async_trait]
impl DecisionCapability for OpenRouterClient {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<NavigationAction, DecisionError> {
        let system = match request.phase {
            DecisionPhase::Navigate => NAVIGATE_PROMPT,
            DecisionPhase::Paginate => PAGINATE_PROMPT,
        };
        let reply = self
            .chat(system, decision_prompt(&request))
            .await
            .map_err(|e| DecisionError::Capability(e.to_string()))?;
        ::log::trace!("Decision reply: {}", reply);
        parse_decision(&reply)
    }
}

#[async_trait]
impl MatchScorer for OpenRouterClient {
    async fn score(&self, description: &str, profile: &str) -> Result<MatchScore, ScoringError> {
        let user = format!(
            "CANDIDATE PROFILE:\n{}\n\nJOB DESCRIPTION:\n{}",
            profile,
            truncate_chars(description, MAX_JOB_CHARS)
        );
        let reply = self.chat(SCORING_PROMPT, user).await.map_err(|e| match e {
            ChatError::Http(e) => ScoringError::Http(e),
            ChatError::Api { status, message } => ScoringError::Api { status, message },
            ChatError::Empty => ScoringError::Malformed("empty response".to_string()),
        })?;
        parse_match_score(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ActionOutcome;
    use crate::capabilities::HistoryEntry;
    use crate::model::NavigationGoal;
    use crate::snapshot::{ElementRef, PageSnapshot};

    #[test]
    fn test_missing_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            OpenRouterClient::from_config(&config),
            Err(ConfigError::Missing("OPENROUTER_API_KEY"))
        ));
    }

    #[test]
    fn test_decision_prompt_lists_history() {
        let snapshot = PageSnapshot {
            url: "https://acme.test/careers".to_string(),
            title: "Careers".to_string(),
            ..PageSnapshot::default()
        };
        let goal = NavigationGoal::from_preferences("Rust, remote");
        let history = vec![HistoryEntry {
            snapshot_summary: "https://acme.test/".to_string(),
            action: NavigationAction::Click(ElementRef::new("e1")),
            outcome: ActionOutcome::Applied,
        }];
        let request = DecisionRequest {
            snapshot: &snapshot,
            goal: &goal,
            history: &history,
            phase: DecisionPhase::Navigate,
        };

        let prompt = decision_prompt(&request);
        assert!(prompt.starts_with("GOAL: roles matching Rust; remote-friendly"));
        assert!(prompt.contains("- on https://acme.test/: click e1 -> Applied"));
    }
}
