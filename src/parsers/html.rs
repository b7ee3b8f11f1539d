use crate::parsers::text;
use crate::snapshot::{ElementRef, ElementRole, PageElement, PageSnapshot, SelectChoice};
use crate::utils::{collapse_whitespace, truncate_chars};
use regex::Regex;
use scraper::{ElementRef as HtmlElement, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

/// Elements a visitor can interact with, in document order
const INTERACTIVE: &str = "a[href], button, input, select, textarea, [role='button'], [role='link'], [role='tab'], [role='checkbox']";

/// Containers that usually hold the main content of a detail page
const MAIN_CONTAINERS: [&str; 8] = [
    "main",
    "[role='main']",
    "article",
    "#job-description",
    ".job-description",
    "#job-details",
    ".job-details",
    "div[class*='description']",
];

/// Tags whose text is never visible
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "noscript", "template", "svg", "head"];

/// Tags that start a new line of text
const BLOCK_TAGS: [&str; 22] = [
    "p", "div", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th",
    "section", "article", "header", "footer", "table", "dd", "dt",
];

/// Ancestor tags that delimit one listing card or row
const CARD_TAGS: [&str; 3] = ["li", "article", "tr"];

const MAX_LABEL_CHARS: usize = 120;
const MAX_CONTEXT_CHARS: usize = 160;

static CSS_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid identifier regex"));

static CARD_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(job|posting|opening|position|vacanc|result|card|listing)")
        .expect("valid card class regex")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

/// Builds a structural snapshot from page HTML
pub fn snapshot(html: &str, page_url: &str) -> PageSnapshot {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let title = doc
        .select(&selector("title"))
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default();

    let id_counts = count_ids(&doc);
    let labels_for = label_targets(&doc);

    let mut elements = Vec::new();
    for el in doc.select(&selector(INTERACTIVE)) {
        if is_hidden(&el) {
            continue;
        }
        let role = role_of(&el);
        let label = label_of(&el, &labels_for);
        if label.is_empty() && role != ElementRole::TextInput && role != ElementRole::Select {
            continue;
        }

        let href = match role {
            ElementRole::Link => el
                .value()
                .attr("href")
                .and_then(|h| resolve_href(base.as_ref(), h)),
            _ => None,
        };

        let options = if role == ElementRole::Select {
            options_of(&el)
        } else {
            Vec::new()
        };

        let context = if role == ElementRole::Link {
            card_context(&el, &label)
        } else {
            String::new()
        };

        elements.push(PageElement {
            reference: ElementRef::indexed(elements.len()),
            role,
            label,
            href,
            options,
            disabled: is_disabled(&el),
            locator: css_path(&el, &id_counts),
            context,
        });
    }

    ::log::debug!(
        "Snapshot of {} has {} interactive elements",
        page_url,
        elements.len()
    );

    PageSnapshot {
        url: page_url.to_string(),
        title,
        elements,
        text: main_text(&doc),
    }
}

/// Visible text of the main content area, falling back to the whole body
pub fn main_text(doc: &Html) -> String {
    for css in MAIN_CONTAINERS {
        let sel = selector(css);
        let parts: Vec<String> = doc
            .select(&sel)
            .map(|el| visible_text(&el))
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !parts.is_empty() {
            return text::clean(&parts.join("\n\n"));
        }
    }

    doc.select(&selector("body"))
        .next()
        .map(|body| text::clean(&visible_text(&body)))
        .unwrap_or_default()
}

/// Text of an element, skipping scripts and styles, with block elements on
/// their own lines
pub fn visible_text(el: &HtmlElement) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn collect_text(el: &HtmlElement, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => {
                let name = e.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = HtmlElement::wrap(child) {
                    collect_text(&child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn role_of(el: &HtmlElement) -> ElementRole {
    let value = el.value();
    match value.attr("role") {
        Some("button") | Some("tab") => return ElementRole::Button,
        Some("link") => return ElementRole::Link,
        Some("checkbox") => return ElementRole::Checkbox,
        _ => {}
    }
    match value.name() {
        "a" => ElementRole::Link,
        "button" => ElementRole::Button,
        "select" => ElementRole::Select,
        "textarea" => ElementRole::TextInput,
        "input" => match value.attr("type").unwrap_or("text").to_ascii_lowercase().as_str() {
            "submit" | "button" | "reset" | "image" => ElementRole::Button,
            "checkbox" | "radio" => ElementRole::Checkbox,
            "text" | "search" | "email" | "url" | "tel" | "number" => ElementRole::TextInput,
            _ => ElementRole::Other,
        },
        _ => ElementRole::Other,
    }
}

fn is_hidden(el: &HtmlElement) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
        return true;
    }
    if value.name() == "input" && value.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
        return true;
    }
    value
        .attr("style")
        .map(|s| s.replace(' ', "").to_ascii_lowercase())
        .is_some_and(|s| s.contains("display:none") || s.contains("visibility:hidden"))
}

fn is_disabled(el: &HtmlElement) -> bool {
    let value = el.value();
    value.attr("disabled").is_some()
        || value.attr("aria-disabled") == Some("true")
        || value
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == "disabled"))
}

fn label_of(el: &HtmlElement, labels_for: &HashMap<String, String>) -> String {
    let value = el.value();
    let text = collapse_whitespace(&el.text().collect::<String>());

    let candidates = [
        value.attr("aria-label").map(str::to_string),
        (value.name() != "select" && !text.is_empty()).then(|| text.clone()),
        value.attr("id").and_then(|id| labels_for.get(id).cloned()),
        value.attr("placeholder").map(str::to_string),
        (value.name() == "input").then(|| value.attr("value").map(str::to_string)).flatten(),
        value.attr("title").map(str::to_string),
        value.attr("name").map(str::to_string),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(|c| collapse_whitespace(&c))
        .find(|c| !c.is_empty())
        .map(|c| truncate_chars(&c, MAX_LABEL_CHARS))
        .unwrap_or_default()
}

fn options_of(el: &HtmlElement) -> Vec<SelectChoice> {
    el.select(&selector("option"))
        .map(|opt| {
            let label = collapse_whitespace(&opt.text().collect::<String>());
            let value = opt
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| label.clone());
            SelectChoice { value, label }
        })
        .collect()
}

/// Text of the enclosing listing card, minus the element's own label
fn card_context(el: &HtmlElement, label: &str) -> String {
    let card = el.ancestors().take(6).filter_map(HtmlElement::wrap).find(|a| {
        let value = a.value();
        CARD_TAGS.contains(&value.name())
            || value.attr("class").is_some_and(|c| CARD_CLASS.is_match(c))
    });

    let Some(card) = card else {
        return String::new();
    };

    let text = collapse_whitespace(&visible_text(&card));
    let remainder = match text.find(label) {
        Some(idx) if !label.is_empty() => {
            format!("{} {}", &text[..idx], &text[idx + label.len()..])
        }
        _ => text,
    };
    let remainder = collapse_whitespace(
        remainder.trim_matches(|c: char| c.is_whitespace() || c == '|' || c == '·' || c == '-'),
    );
    truncate_chars(&remainder, MAX_CONTEXT_CHARS)
}

fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    Some(resolved.to_string())
}

fn count_ids(doc: &Html) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for el in doc.select(&selector("[id]")) {
        if let Some(id) = el.value().attr("id") {
            *counts.entry(id.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn label_targets(doc: &Html) -> HashMap<String, String> {
    doc.select(&selector("label[for]"))
        .filter_map(|l| {
            let target = l.value().attr("for")?;
            Some((
                target.to_string(),
                collapse_whitespace(&l.text().collect::<String>()),
            ))
        })
        .collect()
}

fn unique_id<'a>(el: &'a HtmlElement, id_counts: &HashMap<String, usize>) -> Option<&'a str> {
    el.value()
        .attr("id")
        .filter(|id| CSS_IDENT.is_match(id) && id_counts.get(*id) == Some(&1))
}

/// A CSS selector reaching exactly this element: `#id` when unique, otherwise
/// an `nth-of-type` chain anchored at the nearest uniquely identified ancestor
pub fn css_path(el: &HtmlElement, id_counts: &HashMap<String, usize>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(*el);

    while let Some(node) = current {
        if let Some(id) = unique_id(&node, id_counts) {
            segments.push(format!("#{id}"));
            break;
        }

        let name = node.value().name();
        let position = node
            .prev_siblings()
            .filter_map(HtmlElement::wrap)
            .filter(|s| s.value().name() == name)
            .count()
            + 1;
        segments.push(format!("{name}:nth-of-type({position})"));

        current = node.parent().and_then(HtmlElement::wrap);
    }

    segments.reverse();
    segments.join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_inputs_are_skipped() {
        let html = r#"<html><body>
            <input type="hidden" name="csrf" value="x">
            <input type="search" placeholder="Search jobs">
            <button style="display: none">Ghost</button>
        </body></html>"#;
        let snap = snapshot(html, "https://acme.test/careers");
        assert_eq!(snap.elements.len(), 1);
        assert_eq!(snap.elements[0].role, ElementRole::TextInput);
        assert_eq!(snap.elements[0].label, "Search jobs");
    }

    #[test]
    fn test_css_path_prefers_unique_id() {
        let html = r#"<html><body><div id="filters"><button>Remote</button><button>Onsite</button></div></body></html>"#;
        let snap = snapshot(html, "https://acme.test/careers");
        assert_eq!(
            snap.elements[1].locator,
            "#filters > button:nth-of-type(2)"
        );
    }

    #[test]
    fn test_duplicate_ids_are_not_used() {
        let html = r#"<html><body><a id="x" href="/a">A</a><a id="x" href="/b">B</a></body></html>"#;
        let snap = snapshot(html, "https://acme.test/");
        assert_eq!(
            snap.elements[1].locator,
            "html:nth-of-type(1) > body:nth-of-type(1) > a:nth-of-type(2)"
        );
    }
}
