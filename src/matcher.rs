//! Ignore-pattern and extension-filter predicates.
//!
//! Ignore rules are glob patterns tested against every component of a
//! path's absolute form, so ignoring a directory name hides everything
//! beneath it. Filters are exact extension matches; an empty filter set
//! accepts every file.

use std::path::{Component, Path};

use glob::{MatchOptions, Pattern};
use tracing::warn;

/// fnmatch-style options: case-sensitive, `*` crosses leading dots.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Pure path predicates built from the resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    ignore: Vec<Pattern>,
    filters: Vec<String>,
}

impl PathMatcher {
    /// Build a matcher from raw ignore globs and extension filters.
    ///
    /// Extensions are normalized with [`normalize_extension`]. A glob that
    /// does not compile is matched as a literal segment instead.
    pub fn new<I, F, S, T>(ignore_patterns: I, filters: F) -> Self
    where
        I: IntoIterator<Item = S>,
        F: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let ignore = ignore_patterns
            .into_iter()
            .map(|raw| compile_pattern(raw.as_ref()))
            .collect();

        let mut normalized: Vec<String> = Vec::new();
        for ext in filters.into_iter().filter_map(|f| normalize_extension(f.as_ref())) {
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }

        Self {
            ignore,
            filters: normalized,
        }
    }

    /// True if any component of the absolutized path matches any ignore rule.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.ignore.is_empty() {
            return false;
        }

        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        absolute.components().any(|component| match component {
            Component::Normal(segment) => {
                let segment = segment.to_string_lossy();
                self.ignore
                    .iter()
                    .any(|pattern| pattern.matches_with(&segment, MATCH_OPTIONS))
            }
            _ => false,
        })
    }

    /// True if the file's extension (with leading dot) is in the filter set,
    /// or if no filters are configured.
    pub fn matches_filter(&self, path: &Path) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        match path.extension() {
            Some(ext) => {
                let dotted = format!(".{}", ext.to_string_lossy());
                self.filters.iter().any(|f| *f == dotted)
            }
            None => false,
        }
    }

    /// Normalized extension filters.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Ignore patterns as their source strings.
    pub fn ignore_patterns(&self) -> Vec<&str> {
        self.ignore.iter().map(Pattern::as_str).collect()
    }
}

/// Normalize a user-supplied extension to start with a dot.
///
/// Returns `None` for blank input.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    if trimmed.starts_with('.') {
        Some(trimmed.to_string())
    } else {
        Some(format!(".{}", trimmed))
    }
}

fn compile_pattern(raw: &str) -> Pattern {
    match Pattern::new(raw) {
        Ok(pattern) => pattern,
        Err(err) => {
            warn!(pattern = raw, error = %err, "invalid ignore glob, matching literally");
            // Escaped patterns always compile.
            Pattern::new(&Pattern::escape(raw)).unwrap_or_default()
        }
    }
}
