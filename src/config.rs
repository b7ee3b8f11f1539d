use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Settings for the OpenAI-compatible chat endpoint backing both capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; usually supplied through `OPENROUTER_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// HTTP timeout for a single completion request
    #[serde(default = "default_llm_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            http_timeout_secs: default_llm_http_timeout_secs(),
        }
    }
}

/// Configuration for a scan batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Maximum decide/act cycles per company during navigation
    #[serde(default = "default_action_budget")]
    pub action_budget: usize,

    /// Retries after a malformed or unusable decision
    #[serde(default = "default_decision_retries")]
    pub decision_retries: u32,

    /// Retries of one step after element-not-found or navigation timeout
    #[serde(default = "default_step_retries")]
    pub step_retries: u32,

    /// Number of recent history entries passed to the decision capability
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Base delay for exponential backoff between retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on every browser call
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Upper bound on every decision capability call
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,

    /// Upper bound on every match-scoring call
    #[serde(default = "default_scoring_timeout_secs")]
    pub scoring_timeout_secs: u64,

    /// Pause after each browser action before the page is read back
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Page-count ceiling for pagination
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Ask the decision capability for a next-page action when no
    /// next/load-more control is recognised
    #[serde(default)]
    pub pagination_uses_resolver: bool,

    /// Try scrolling when a site has no pagination controls
    #[serde(default = "default_scroll_fallback")]
    pub scroll_fallback: bool,

    /// Companies scanned at the same time
    #[serde(default = "default_company_concurrency")]
    pub company_concurrency: usize,

    /// Detail pages loaded at the same time per company
    #[serde(default = "default_detail_concurrency")]
    pub detail_concurrency: usize,

    /// Descriptions are cut to this many characters
    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,

    /// Listings scoring at least this much are passed to the notifier
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: u8,

    /// Additional query parameter patterns stripped from detail URLs
    #[serde(default)]
    pub extra_tracking_params: Vec<String>,

    /// Regex patterns marking a link as a job detail page
    #[serde(default = "default_listing_patterns")]
    pub listing_patterns: Vec<String>,

    /// Regex patterns excluding links from listing extraction
    #[serde(default = "default_listing_exclude_patterns")]
    pub listing_exclude_patterns: Vec<String>,

    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            action_budget: default_action_budget(),
            decision_retries: default_decision_retries(),
            step_retries: default_step_retries(),
            history_window: default_history_window(),
            retry_backoff_ms: default_retry_backoff_ms(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            decision_timeout_secs: default_decision_timeout_secs(),
            scoring_timeout_secs: default_scoring_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            max_pages: default_max_pages(),
            pagination_uses_resolver: false,
            scroll_fallback: default_scroll_fallback(),
            company_concurrency: default_company_concurrency(),
            detail_concurrency: default_detail_concurrency(),
            max_description_chars: default_max_description_chars(),
            notify_threshold: default_notify_threshold(),
            extra_tracking_params: Vec::new(),
            listing_patterns: default_listing_patterns(),
            listing_exclude_patterns: default_listing_exclude_patterns(),
            llm: LlmConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Override settings from `WEBDRIVER_URL`, `OPENROUTER_API_KEY`,
    /// `OPENROUTER_MODEL` and `OPENROUTER_BASE_URL` when they are set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("WEBDRIVER_URL") {
            self.webdriver_url = url;
        }
        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get("OPENROUTER_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = get("OPENROUTER_BASE_URL") {
            self.llm.base_url = base_url;
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_secs(self.scoring_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_action_budget() -> usize {
    25
}

fn default_decision_retries() -> u32 {
    3
}

fn default_step_retries() -> u32 {
    2
}

fn default_history_window() -> usize {
    8
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_decision_timeout_secs() -> u64 {
    45
}

fn default_scoring_timeout_secs() -> u64 {
    60
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_max_pages() -> usize {
    10
}

fn default_scroll_fallback() -> bool {
    true
}

fn default_company_concurrency() -> usize {
    2
}

fn default_detail_concurrency() -> usize {
    2
}

fn default_max_description_chars() -> usize {
    10_000
}

fn default_notify_threshold() -> u8 {
    70
}

fn default_listing_patterns() -> Vec<String> {
    vec![
        r"(?i)/(jobs?|careers?|positions?|openings?|vacanc(y|ies)|roles?|postings?|opportunit(y|ies)|requisitions?)/[^/?#]+"
            .to_string(),
    ]
}

fn default_listing_exclude_patterns() -> Vec<String> {
    vec![
        r"(?i)/(search|login|sign-?in|sign-?up|apply|benefits|teams?|locations?|faq|privacy)/?$"
            .to_string(),
        r"(?i)^(mailto|tel|javascript):".to_string(),
        r"(?i)\.(jpg|jpeg|png|gif|css|js|ico|svg|pdf)$".to_string(),
    ]
}

fn default_llm_model() -> String {
    "google/gemini-2.0-flash-exp:free".to_string()
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_http_timeout_secs() -> u64 {
    60
}
