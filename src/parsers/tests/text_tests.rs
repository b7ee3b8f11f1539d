use crate::parsers::text;

#[test]
fn test_clean_collapses_whitespace() {
    assert_eq!(text::clean("  Senior   Engineer \t "), "Senior Engineer");
}

#[test]
fn test_clean_keeps_single_paragraph_breaks() {
    let raw = "Role\n\n\n\nResponsibilities\nBuild things\n\n\nRequirements";
    assert_eq!(
        text::clean(raw),
        "Role\n\nResponsibilities\nBuild things\n\nRequirements"
    );
}

#[test]
fn test_clean_drops_boilerplate_and_repeats() {
    let raw = "Skip to main content\nAccept all cookies\nData Engineer\nData Engineer\nRemote\nPrivacy Policy";
    assert_eq!(text::clean(raw), "Data Engineer\nRemote");
}

#[test]
fn test_clean_empty() {
    assert_eq!(text::clean(" \n\n \t"), "");
}

#[test]
fn test_word_count() {
    assert_eq!(text::word_count("one two\nthree"), 3);
    assert_eq!(text::word_count(""), 0);
}
