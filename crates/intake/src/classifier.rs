//! Text classification over free-text issue descriptions.
//!
//! Jira only offers the description field for routing metadata, so the
//! markers are scanned out of prose:
//!
//! - a GitHub URL (`https://github.com/org/repo/pull/1`)
//! - `Long Running Task: True|False`
//! - `Data Analysis Task: True|False`
//!
//! Every function is pure. The contract is permissive: the first match wins
//! and absence is never an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::GithubLink;

// Compile regexes once using LazyLock
static EMPHASIS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_`~]+").expect("emphasis pattern is valid"));

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

static GITHUB_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://(?:www\.)?github\.com/[^\s|)\]"'<]+"#)
        .expect("GitHub URL pattern is valid")
});

static LONG_RUNNING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| marker_regex(TaskMarker::LongRunning.label()));

static DATA_ANALYSIS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| marker_regex(TaskMarker::DataAnalysis.label()));

/// A boolean task-type marker that may appear in a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskMarker {
    /// `Long Running Task: True` routes dispatch to the container launcher.
    LongRunning,
    /// `Data Analysis Task: True` is recorded on the ingested issue and
    /// forwarded with the dispatch request.
    DataAnalysis,
}

impl TaskMarker {
    /// The label text as it appears in descriptions.
    pub fn label(self) -> &'static str {
        match self {
            TaskMarker::LongRunning => "Long Running Task",
            TaskMarker::DataAnalysis => "Data Analysis Task",
        }
    }

    /// Returns `true` if `text` carries this marker set to `True`.
    pub fn is_set_in(self, text: &str) -> bool {
        let regex = match self {
            TaskMarker::LongRunning => &*LONG_RUNNING_REGEX,
            TaskMarker::DataAnalysis => &*DATA_ANALYSIS_REGEX,
        };
        marker_is_true(regex, text)
    }
}

/// Removes emphasis runs (`*`, `_`, `` ` ``, `~`) and `<...>` tag spans, then
/// trims surrounding whitespace.
pub fn strip_markup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let without_emphasis = EMPHASIS_REGEX.replace_all(text, "");
    let without_tags = TAG_REGEX.replace_all(&without_emphasis, "");
    without_tags.trim().to_string()
}

/// Returns the left-most GitHub URL in `text` after markup is stripped.
///
/// The URL ends at the first whitespace, `|`, `)`, `]`, quote, or `<`, so
/// Jira link syntax such as `[PR|https://github.com/o/r/pull/1]` yields the
/// bare URL.
pub fn extract_github_link(text: &str) -> Option<GithubLink> {
    if text.is_empty() {
        return None;
    }
    let cleaned = strip_markup(text);
    GITHUB_URL_REGEX
        .find(&cleaned)
        .and_then(|m| GithubLink::new(m.as_str()))
}

/// Searches `text` case-insensitively for `<label> : True|False`.
///
/// Words in `label` match across any run of whitespace. Returns `true` only
/// when the first occurrence carries `True`.
pub fn detect_boolean_marker(text: &str, label: &str) -> bool {
    if label.trim().is_empty() {
        return false;
    }
    marker_is_true(&marker_regex(label), text)
}

fn marker_regex(label: &str) -> Regex {
    let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
    let pattern = format!(r"(?i){}\s*:\s*(true|false)", words.join(r"\s+"));
    // Escaped literals joined by whitespace classes always compile.
    Regex::new(&pattern).expect("escaped marker pattern is valid")
}

fn marker_is_true(regex: &Regex, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let cleaned = strip_markup(text);
    regex
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .is_some_and(|value| value.as_str().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markup_removes_emphasis_and_tags() {
        assert_eq!(strip_markup("  *bold* _it_ `code` ~~gone~~  "), "bold it code gone");
        assert_eq!(strip_markup("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn strip_markup_is_idempotent() {
        let samples = [
            "*Long* Running Task: <b>True</b>",
            "<<a>b> and <> and x<y<z>>",
            "  __dunder__ `tick` ~strike~ ",
            "plain text",
        ];
        for sample in samples {
            let once = strip_markup(sample);
            assert_eq!(strip_markup(&once), once, "sample: {sample:?}");
        }
    }

    #[test]
    fn extracts_first_github_link() {
        let text = "See https://github.com/org/repo/pull/1 for details. Long Running Task: True";
        let link = extract_github_link(text).unwrap();
        assert_eq!(link.as_str(), "https://github.com/org/repo/pull/1");
    }

    #[test]
    fn first_of_several_links_wins() {
        let text = "old http://www.github.com/a/b then https://github.com/c/d";
        assert_eq!(
            extract_github_link(text).unwrap().as_str(),
            "http://www.github.com/a/b"
        );
    }

    #[test]
    fn link_stops_at_jira_link_delimiters() {
        let text = "[the PR|https://github.com/org/repo/pull/9] (https://github.com/x/y)";
        assert_eq!(
            extract_github_link(text).unwrap().as_str(),
            "https://github.com/org/repo/pull/9"
        );
        let quoted = r#"href="https://github.com/org/repo" next"#;
        assert_eq!(
            extract_github_link(quoted).unwrap().as_str(),
            "https://github.com/org/repo"
        );
    }

    #[test]
    fn link_inside_markup_is_found() {
        let text = "*https://github.com/org/repo/issues/3*";
        assert_eq!(
            extract_github_link(text).unwrap().as_str(),
            "https://github.com/org/repo/issues/3"
        );
    }

    #[test]
    fn no_link_yields_none() {
        assert!(extract_github_link("Fix bug, no links here.").is_none());
        assert!(extract_github_link("https://gitlab.com/org/repo").is_none());
        assert!(extract_github_link("").is_none());
    }

    #[test]
    fn marker_is_case_insensitive() {
        assert!(detect_boolean_marker("long running task: TRUE", "Long Running Task"));
        assert!(detect_boolean_marker("LONG   RUNNING\tTASK :true", "long running task"));
        assert!(TaskMarker::DataAnalysis.is_set_in("Data Analysis Task: true"));
    }

    #[test]
    fn marker_false_or_absent_is_false() {
        assert!(!detect_boolean_marker("Long Running Task: False", "Long Running Task"));
        assert!(!detect_boolean_marker("Long Running Task", "Long Running Task"));
        assert!(!detect_boolean_marker("", "Long Running Task"));
        assert!(!detect_boolean_marker("Long Running Task: True", ""));
        assert!(!TaskMarker::LongRunning.is_set_in("Data Analysis Task: True"));
    }

    #[test]
    fn marker_survives_markup() {
        assert!(TaskMarker::LongRunning.is_set_in("*Long Running Task*: <b>True</b>"));
    }

    #[test]
    fn first_marker_occurrence_decides() {
        assert!(!TaskMarker::LongRunning.is_set_in(
            "Long Running Task: False ... Long Running Task: True"
        ));
    }
}
