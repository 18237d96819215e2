//! Per-file token annotation.
//!
//! Reads every candidate and counts its tokens on rayon's pool. A file
//! that cannot be read or decoded is recorded with 0 tokens.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CmdcError;
use crate::interrupt::{triggered, Interrupt};
use crate::tokens::TokenCounter;

/// Relative path → token count.
pub type TokenMap = BTreeMap<String, usize>;

/// A file eligible for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the root, as shown to the user.
    pub relative: String,
}

impl Candidate {
    /// Lowercased file name, the primary sort key for candidates.
    pub fn sort_key(&self) -> (String, &str) {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        (name, self.relative.as_str())
    }
}

/// How file bytes are turned into text, for counting and for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// Strict UTF-8; invalid files count as 0 tokens.
    #[default]
    Utf8,
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    Utf8Lossy,
}

impl TextEncoding {
    /// Read a file as text.
    pub fn read(self, path: &Path) -> std::io::Result<String> {
        match self {
            TextEncoding::Utf8 => std::fs::read_to_string(path),
            TextEncoding::Utf8Lossy => {
                let bytes = std::fs::read(path)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "utf8"),
            TextEncoding::Utf8Lossy => write!(f, "utf8-lossy"),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf8-lossy" | "utf-8-lossy" | "lossy" => Ok(TextEncoding::Utf8Lossy),
            _ => Err(format!("unknown text encoding: {}", s)),
        }
    }
}

/// Count tokens for one file, 0 on any read or decode failure.
pub fn count_file(path: &Path, counter: &TokenCounter, text_encoding: TextEncoding) -> usize {
    match text_encoding.read(path) {
        Ok(text) => counter.count(&text),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "unreadable file counted as 0 tokens");
            0
        }
    }
}

/// Annotate every candidate with its token count.
///
/// Returns [`CmdcError::Interrupted`] if `interrupt` fires before the batch
/// completes.
pub fn annotate(
    candidates: &[Candidate],
    counter: &TokenCounter,
    text_encoding: TextEncoding,
    interrupt: Option<&Interrupt>,
) -> Result<TokenMap, CmdcError> {
    let counts: TokenMap = candidates
        .par_iter()
        .map(|candidate| {
            let tokens = if triggered(interrupt) {
                0
            } else {
                count_file(&candidate.path, counter, text_encoding)
            };
            (candidate.relative.clone(), tokens)
        })
        .collect();

    if triggered(interrupt) {
        return Err(CmdcError::Interrupted);
    }

    debug!(
        files = counts.len(),
        tokens = counts.values().sum::<usize>(),
        encoding = %counter.encoding(),
        "annotation complete"
    );
    Ok(counts)
}
