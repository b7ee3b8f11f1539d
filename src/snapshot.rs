use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an interactive element inside one snapshot (`e0`, `e1`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Reference for the element at `index` in document order
    pub fn indexed(index: usize) -> Self {
        Self(format!("e{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse role of an interactive element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRole {
    Link,
    Button,
    TextInput,
    Select,
    Checkbox,
    Other,
}

impl ElementRole {
    /// Whether `TypeText` can target this role
    pub fn accepts_text(&self) -> bool {
        matches!(self, ElementRole::TextInput)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementRole::Link => "link",
            ElementRole::Button => "button",
            ElementRole::TextInput => "textbox",
            ElementRole::Select => "select",
            ElementRole::Checkbox => "checkbox",
            ElementRole::Other => "other",
        }
    }
}

/// One `<option>` of a select element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectChoice {
    pub value: String,
    pub label: String,
}

/// An interactive element visible in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageElement {
    pub reference: ElementRef,
    pub role: ElementRole,
    pub label: String,
    /// Absolute target for links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectChoice>,
    #[serde(default)]
    pub disabled: bool,
    /// CSS selector the browser backend uses to reach the element
    pub locator: String,
    /// Text of the enclosing listing card/row, without the label itself
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

impl PageElement {
    /// Finds the option matching `wanted` by label first, then by value
    pub fn choice(&self, wanted: &str) -> Option<&SelectChoice> {
        let wanted = wanted.trim();
        self.options
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(wanted))
            .or_else(|| self.options.iter().find(|c| c.value == wanted))
    }
}

/// Structural read of the currently rendered page.
///
/// Recomputed after every action and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub elements: Vec<PageElement>,
    /// Main visible text content
    pub text: String,
}

impl PageSnapshot {
    pub fn element(&self, reference: &ElementRef) -> Option<&PageElement> {
        self.elements.iter().find(|e| &e.reference == reference)
    }

    pub fn contains(&self, reference: &ElementRef) -> bool {
        self.element(reference).is_some()
    }

    pub fn is_blank(&self) -> bool {
        self.elements.is_empty() && self.text.trim().is_empty()
    }

    /// One-line summary kept in decision history
    pub fn summary(&self) -> String {
        format!(
            "{} \"{}\" ({} elements, {} chars of text)",
            self.url,
            self.title,
            self.elements.len(),
            self.text.len()
        )
    }

    /// Renders the elements as lines a decision capability can read, e.g.
    /// `[e3] button "Search"`
    pub fn outline(&self, max_chars: usize) -> String {
        let mut out = String::new();
        for element in &self.elements {
            let mut line = format!(
                "[{}] {} \"{}\"",
                element.reference,
                element.role.as_str(),
                element.label
            );
            if element.disabled {
                line.push_str(" (disabled)");
            }
            if !element.options.is_empty() {
                let labels: Vec<&str> = element.options.iter().map(|o| o.label.as_str()).collect();
                line.push_str(&format!(" options={:?}", labels));
            }
            if let Some(href) = &element.href {
                line.push_str(&format!(" -> {href}"));
            }
            if out.len() + line.len() + 1 > max_chars {
                out.push_str("...\n");
                break;
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
