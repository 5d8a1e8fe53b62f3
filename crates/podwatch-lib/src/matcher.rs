//! Error-pattern matching and highlighting for log lines
//!
//! The default pattern is a case-insensitive alternation of error keywords.
//! A match covers the keyword and everything after it on the line. A custom
//! pattern replaces the default set entirely and is applied as given.

use crate::models::LogLine;
use regex::{Regex, RegexBuilder};
use std::ops::Range;

/// Default error keywords, in match priority order
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "stacktrace",
    "unexpected",
    "crash",
    "error",
    "stop",
    "exit",
    "retry",
    "timeout",
    "fail",
    "internal server error",
    "bad gateway",
    "restart",
    "exception",
    r#""level":\s*"ERROR""#,
];

/// Opening highlight marker (bold red)
pub const HIGHLIGHT_START: &str = "\x1b[1;31m";
/// Closing highlight marker
pub const HIGHLIGHT_END: &str = "\x1b[0m";

/// Compiled error pattern, or a pass-through when highlighting is off
#[derive(Debug, Clone)]
pub struct ErrorMatcher {
    pattern: Option<Regex>,
}

impl ErrorMatcher {
    /// Matcher over the default keyword set
    pub fn new() -> Self {
        let alternation = DEFAULT_KEYWORDS
            .iter()
            .map(|k| k.replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        Self {
            pattern: Some(compile(&format!("(?:{}).*", alternation)).expect("default keywords compile")),
        }
    }

    /// Matcher using a caller-supplied pattern instead of the defaults
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Some(compile(pattern)?),
        })
    }

    /// Matcher whose annotation is the identity
    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    /// Build from CLI-style options
    pub fn from_options(highlight: bool, custom: Option<&str>) -> Result<Self, regex::Error> {
        match (highlight, custom) {
            (false, _) => Ok(Self::disabled()),
            (true, Some(pattern)) => Self::with_pattern(pattern),
            (true, None) => Ok(Self::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pattern.is_some()
    }

    /// Span of the first non-empty match in `line`
    pub fn find(&self, line: &str) -> Option<Range<usize>> {
        let pattern = self.pattern.as_ref()?;
        next_match(pattern, line, 0)
    }

    /// Wrap every match of the active pattern in the highlight marker
    pub fn annotate(&self, line: &str) -> String {
        match &self.pattern {
            Some(pattern) => highlight(pattern, line, next_match(pattern, line, 0)),
            None => line.to_string(),
        }
    }

    /// Same as [`ErrorMatcher::annotate`], reusing the span found by
    /// [`ErrorMatcher::inspect`]
    pub fn annotate_inspected(&self, line: &LogLine) -> String {
        match &self.pattern {
            Some(pattern) => highlight(pattern, &line.text, line.matched_error_span.clone()),
            None => line.text.clone(),
        }
    }

    /// Classify a raw line for one instance
    pub fn inspect(&self, owner: &str, text: &str) -> LogLine {
        LogLine {
            owner_instance: owner.to_string(),
            text: text.to_string(),
            matched_error_span: self.find(text),
        }
    }
}

impl Default for ErrorMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// First non-empty match starting at or after `from`
fn next_match(pattern: &Regex, text: &str, from: usize) -> Option<Range<usize>> {
    let mut at = from;
    while at < text.len() {
        let m = pattern.find_at(text, at)?;
        if !m.is_empty() {
            return Some(m.range());
        }
        at = m.end() + text[m.end()..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

fn highlight(pattern: &Regex, text: &str, first: Option<Range<usize>>) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    let mut next = first;
    while let Some(span) = next {
        out.push_str(&text[last..span.start]);
        out.push_str(HIGHLIGHT_START);
        out.push_str(&text[span.clone()]);
        out.push_str(HIGHLIGHT_END);
        last = span.end;
        next = next_match(pattern, text, last);
    }
    out.push_str(&text[last..]);
    out
}
