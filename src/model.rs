use crate::snapshot::ElementRef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A company whose career page is monitored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub career_page_url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Candidate profile used for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    pub resume_text: String,
    /// Free-form preferences, e.g. "Remote, Python, Senior roles only"
    #[serde(default)]
    pub preferences: String,
}

fn default_profile_name() -> String {
    "Default User".to_string()
}

impl UserProfile {
    /// Flattens the profile into the text handed to the match-scoring capability
    pub fn as_text(&self) -> String {
        format!(
            "Name: {}\nResume/Skills: {}\nPreferences: {}",
            self.name, self.resume_text, self.preferences
        )
    }
}

/// What the candidate wants the career site filtered for.
///
/// Supplied once per scan and read-only throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationGoal {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remote: bool,
}

impl NavigationGoal {
    /// Builds a goal from comma separated preferences.
    ///
    /// A `remote` entry sets the remote flag, `location: X` or `in X` sets the
    /// location, everything else becomes a keyword.
    pub fn from_preferences(preferences: &str) -> Self {
        let mut goal = NavigationGoal::default();
        for part in preferences.split([',', ';']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if part.eq_ignore_ascii_case("remote") || part.eq_ignore_ascii_case("remote only") {
                goal.remote = true;
            } else if let Some(rest) = strip_prefix_ignore_case(part, "location:")
                .or_else(|| strip_prefix_ignore_case(part, "in "))
            {
                goal.location = Some(rest.trim().to_string());
            } else {
                goal.keywords.push(part.to_string());
            }
        }
        goal
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.keywords.is_empty() {
            parts.push(format!("roles matching {}", self.keywords.join(", ")));
        }
        if let Some(location) = &self.location {
            parts.push(format!("located in {location}"));
        }
        if self.remote {
            parts.push("remote-friendly".to_string());
        }
        if parts.is_empty() {
            "all open positions".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Strips an ASCII `prefix` from `text`, ignoring case
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &text[prefix.len()..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Down,
    Up,
}

/// Terminal signal of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalOutcome {
    /// The job listing view is reached
    Ready,
    /// No viable path to (more) listings
    Exhausted,
}

/// One discrete browser action, or a terminal signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationAction {
    Click(ElementRef),
    TypeText(ElementRef, String),
    SelectOption(ElementRef, String),
    Scroll(ScrollDirection),
    Terminal(TerminalOutcome),
}

impl NavigationAction {
    /// Element the action targets, if any
    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            NavigationAction::Click(r)
            | NavigationAction::TypeText(r, _)
            | NavigationAction::SelectOption(r, _) => Some(r),
            NavigationAction::Scroll(_) | NavigationAction::Terminal(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NavigationAction::Terminal(_))
    }
}

impl fmt::Display for NavigationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationAction::Click(r) => write!(f, "click {r}"),
            NavigationAction::TypeText(r, v) => write!(f, "type {v:?} into {r}"),
            NavigationAction::SelectOption(r, v) => write!(f, "select {v:?} in {r}"),
            NavigationAction::Scroll(d) => write!(f, "scroll {d:?}"),
            NavigationAction::Terminal(o) => write!(f, "terminal {o:?}"),
        }
    }
}

/// A job listing discovered on a career page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    /// Natural key; normalized before deduplication
    pub detail_url: String,
    #[serde(default)]
    pub location_text: String,
    pub source_company_id: String,
}

/// Normalized detail URLs already seen for one company.
///
/// Supplied by persistence and never mutated by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownListingIndex {
    urls: HashSet<String>,
}

impl KnownListingIndex {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// New index containing these entries plus the records' detail URLs
    pub fn with_records(&self, records: &[ListingRecord]) -> Self {
        let mut urls = self.urls.clone();
        urls.extend(records.iter().map(|r| r.detail_url.clone()));
        Self { urls }
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.urls.iter()
    }
}
