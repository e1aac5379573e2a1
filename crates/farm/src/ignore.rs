//! Ignore patterns for package traversal

use crate::error::{Error, Result};
use regex::Regex;

/// Patterns ignored unless explicitly disabled
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    ".Trash",
    ".Spotlight-V100",
    ".TemporaryItems",
];

/// A compiled glob
#[derive(Debug, Clone)]
pub struct Pattern {
    original: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(glob: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(glob)).map_err(|e| Error::InvalidPath {
            path: glob.into(),
            reason: format!("invalid ignore pattern: {e}"),
        })?;
        Ok(Self {
            original: glob.to_string(),
            regex,
        })
    }

    /// Match against a whole forward-slash relative path
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match against the last component only
    pub fn matches_basename(&self, path: &str) -> bool {
        let base = path.rsplit('/').next().unwrap_or(path);
        self.regex.is_match(base)
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

/// Translate `*`, `?` and `[...]` into an anchored regex
pub fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let close = chars[i + 1..].iter().position(|&c| c == ']');
                match close {
                    Some(offset) if offset > 0 => {
                        let class: String = chars[i + 1..i + 1 + offset].iter().collect();
                        out.push('[');
                        out.push_str(&class.replace('\\', "\\\\"));
                        out.push(']');
                        i += offset + 1;
                    }
                    _ => out.push_str("\\["),
                }
            }
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Set of patterns; a path is ignored if any pattern matches it or its
/// basename
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set preloaded with [`DEFAULT_IGNORE_PATTERNS`]
    pub fn with_defaults() -> Self {
        let mut set = Self::new();
        for glob in DEFAULT_IGNORE_PATTERNS {
            if let Ok(pattern) = Pattern::new(glob) {
                set.patterns.push(pattern);
            }
        }
        set
    }

    pub fn add(&mut self, glob: &str) -> Result<()> {
        self.patterns.push(Pattern::new(glob)?);
        Ok(())
    }

    pub fn should_ignore(&self, rel_path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches(rel_path) || p.matches_basename(rel_path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
