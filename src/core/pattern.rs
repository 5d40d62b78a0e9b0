//! Glob patterns for placement rules
//!
//! Supports the usual shell wildcards, anchored to the whole path:
//! - `*` - Matches any run of characters, including `/` (e.g. `*.bin`)
//! - `?` - Matches exactly one character
//! - `[abc]`, `[a-z]`, `[!a-z]` - Character classes (`^` also negates)
//!
//! Patterns and paths are compared in normalized form without a leading
//! slash, so `/config/*.cfg` and `config/*.cfg` are the same pattern.

use crate::error::{PackError, Result};
use crate::validation::normalize_path;
use regex::Regex;

/// Anything that can decide whether a normalized path is selected
pub trait PathMatcher {
    fn matches(&self, path: &str) -> bool;
}

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern
    ///
    /// # Examples
    /// ```
    /// use ffs_pack::core::pattern::{GlobPattern, PathMatcher};
    ///
    /// let pattern = GlobPattern::new("*.bin").unwrap();
    /// assert!(pattern.matches("ota0.bin"));
    /// assert!(pattern.matches("/firmware/ota1.bin"));
    /// assert!(!pattern.matches("ota0.bin.bak"));
    /// ```
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(PackError::rule(pattern, "empty glob pattern"));
        }

        let translated = Self::translate(pattern.trim_start_matches('/'));
        let regex = Regex::new(&translated).map_err(|e| PackError::rule(pattern, e.to_string()))?;

        Ok(GlobPattern {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Translate glob syntax into an anchored regular expression
    fn translate(pattern: &str) -> String {
        let chars: Vec<char> = pattern.chars().collect();
        let mut out = String::from("^");
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // Consecutive stars collapse to one
                    while i + 1 < chars.len() && chars[i + 1] == '*' {
                        i += 1;
                    }
                    out.push_str(".*");
                }
                '?' => out.push('.'),
                '[' => match Self::class_end(&chars, i) {
                    Some(end) => {
                        out.push_str(&Self::translate_class(&chars[i + 1..end]));
                        i = end;
                    }
                    // Unterminated class is a literal bracket
                    None => out.push_str(r"\["),
                },
                c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
            }
            i += 1;
        }

        out.push('$');
        out
    }

    /// Index of the `]` closing the class opened at `start`
    fn class_end(chars: &[char], start: usize) -> Option<usize> {
        let mut j = start + 1;
        if j < chars.len() && (chars[j] == '!' || chars[j] == '^') {
            j += 1;
        }
        // A `]` right after the opening (or negation) is literal
        if j < chars.len() && chars[j] == ']' {
            j += 1;
        }
        while j < chars.len() {
            if chars[j] == ']' {
                return Some(j);
            }
            j += 1;
        }
        None
    }

    fn translate_class(body: &[char]) -> String {
        let mut out = String::from("[");
        let mut rest = body;

        if let Some(&first) = rest.first() {
            if first == '!' || first == '^' {
                out.push('^');
                rest = &rest[1..];
            }
        }

        for &c in rest {
            match c {
                '\\' | '[' | ']' | '^' | '&' | '~' => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push(c),
            }
        }

        out.push(']');
        out
    }
}

impl PathMatcher for GlobPattern {
    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(&normalize_path(path))
    }
}
