//! Prompt patterns and the process-wide compiled-regex cache.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{PoisonError, RwLock};

use memchr::{memmem, memrchr};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Compiled regexes keyed by their source text, shared by every connection.
static REGEX_CACHE: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Compile a pattern with multiline anchoring, reusing a cached regex when
/// the same source was compiled before.
///
/// `(?m)` is prepended so `^` and `$` bind to line boundaries, which lets a
/// prompt on the last line be found inside long command output.
pub fn compile_cached(source: &str) -> Result<Regex, regex::Error> {
    if let Some(regex) = REGEX_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(source)
    {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&format!("(?m){source}"))?;
    REGEX_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(source.to_string())
        .or_insert_with(|| regex.clone());
    Ok(regex)
}

/// Number of distinct pattern sources compiled so far.
pub fn cached_pattern_count() -> usize {
    REGEX_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}

/// A compiled prompt pattern with optional negative substrings.
///
/// One `PromptPattern` describes one recognizable device prompt. The negative
/// substrings disambiguate prompts sharing a suffix, e.g. `router#` versus
/// `router(config)#`.
#[derive(Clone)]
pub struct PromptPattern {
    source: String,
    regex: Regex,
    not_contains: Vec<String>,
}

impl PromptPattern {
    /// Compile a prompt pattern from regex source.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: compile_cached(source)?,
            not_contains: Vec::new(),
        })
    }

    /// Compile a prompt pattern with negative substrings.
    pub fn with_not_contains<I, S>(source: &str, not_contains: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pattern = Self::new(source)?;
        pattern.not_contains = not_contains.into_iter().map(Into::into).collect();
        Ok(pattern)
    }

    /// Add a negative substring.
    pub fn not_containing(mut self, substring: impl Into<String>) -> Self {
        self.not_contains.push(substring.into());
        self
    }

    /// The regex source this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled (multiline) regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Negative substrings.
    pub fn negatives(&self) -> &[String] {
        &self.not_contains
    }

    /// Whether any negative substring occurs in `haystack`.
    pub fn is_excluded(&self, haystack: &[u8]) -> bool {
        self.not_contains
            .iter()
            .any(|nc| memmem::find(haystack, nc.as_bytes()).is_some())
    }

    /// Find the pattern anywhere in `haystack`.
    ///
    /// The match is suppressed when a negative substring occurs anywhere in
    /// `haystack`, regardless of the positive match.
    pub fn find(&self, haystack: &[u8]) -> Option<Range<usize>> {
        if self.is_excluded(haystack) {
            return None;
        }
        self.regex.find(haystack).map(|m| m.range())
    }

    /// Check whether the pattern matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.find(haystack).is_some()
    }

    /// Find a prompt sitting at the end of `haystack`.
    ///
    /// Takes the last match and requires that only whitespace follows it.
    /// Negative substrings are checked against the prompt text itself, from
    /// the start of the line the match begins on, so earlier command output
    /// cannot veto a prompt.
    pub fn find_at_tail(&self, haystack: &[u8]) -> Option<Range<usize>> {
        let m = self.regex.find_iter(haystack).last()?;
        if !haystack[m.end()..].iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        let line_start = memrchr(b'\n', &haystack[..m.start()]).map_or(0, |pos| pos + 1);
        if self.is_excluded(&haystack[line_start..]) {
            return None;
        }

        Some(m.range())
    }
}

impl fmt::Debug for PromptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptPattern")
            .field("source", &self.source)
            .field("not_contains", &self.not_contains)
            .finish()
    }
}

impl PartialEq for PromptPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.not_contains == other.not_contains
    }
}

/// Render pattern sources for error context.
pub(crate) fn describe(patterns: &[PromptPattern]) -> Vec<String> {
    patterns.iter().map(|p| p.as_str().to_string()).collect()
}
