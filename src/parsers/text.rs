use regex::Regex;
use std::sync::LazyLock;

/// Lines that are page chrome rather than content
static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(accept( all)?( cookies)?|reject( all)?|cookie (settings|preferences|policy)|manage cookies|privacy policy|terms of (use|service)|skip to (main )?content|back to (top|jobs|search)|share( this job)?|menu)$",
    )
    .expect("valid boilerplate regex")
});

/// Cleans extracted page text.
///
/// - Trims every line and collapses runs of whitespace
/// - Drops page chrome (cookie banners, "skip to content", ...)
/// - Drops a line repeating the one just before it
/// - Keeps blank-line paragraph breaks, never more than one in a row
pub fn clean(raw: &str) -> String {
    let mut paragraphs: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut previous: Option<String> = None;

    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if BOILERPLATE.is_match(&line) || previous.as_deref() == Some(line.as_str()) {
            continue;
        }
        previous = Some(line.clone());
        current.push(line);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    join_paragraphs(&paragraphs)
}

/// Lines of a paragraph stay on their own lines; paragraphs are separated by
/// exactly one blank line
pub fn join_paragraphs(paragraphs: &[Vec<String>]) -> String {
    paragraphs
        .iter()
        .map(|p| p.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Number of words in a text, used to judge whether a description is usable
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
