//! Scan, annotate, present and select.
//!
//! [`Selector`] drives one run: walk the root, collect candidates, count
//! their tokens, show the tree, then hand the candidates to a [`Chooser`]
//! (or select everything in non-interactive mode).
//!
//! ```no_run
//! use cmdc::selector::{Outcome, Selector, SelectAll};
//! use cmdc::walker::TraversalMode;
//!
//! let outcome = Selector::new("./project")
//!     .mode(TraversalMode::FullyRecursive)
//!     .non_interactive(true)
//!     .run(&mut std::io::stderr(), &mut SelectAll)
//!     .unwrap();
//!
//! if let Outcome::Selected(result) = outcome {
//!     println!("{} files, {} tokens", result.selected().len(), result.total_tokens());
//! }
//! ```

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::annotate::{annotate, Candidate, TextEncoding, TokenMap};
use crate::errors::CmdcError;
use crate::interrupt::{triggered, Interrupt};
use crate::matcher::PathMatcher;
use crate::tokens::{Encoding, TokenCounter};
use crate::tree::{build_display_tree, format_number, relative_key, render_tree, FileNode, RenderOptions};
use crate::walker::{Entry, TraversalMode, Walker};

/// One entry offered to a chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub relative_path: String,
    pub tokens: usize,
}

impl Choice {
    /// Display label, e.g. `src/main.rs (1,024 tokens)`.
    pub fn label(&self) -> String {
        format!("{} ({} tokens)", self.relative_path, format_number(self.tokens))
    }
}

/// Strategy that picks a subset of the offered candidates.
///
/// Returning an empty list means the user chose nothing or cancelled.
pub trait Chooser {
    fn choose(&mut self, choices: &[Choice]) -> Result<Vec<String>, CmdcError>;
}

/// Chooser that takes every candidate in offered order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

impl Chooser for SelectAll {
    fn choose(&mut self, choices: &[Choice]) -> Result<Vec<String>, CmdcError> {
        Ok(choices.iter().map(|c| c.relative_path.clone()).collect())
    }
}

/// Selected paths with their token total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    selected: Vec<String>,
    total_tokens: usize,
}

impl SelectionResult {
    /// Build a result from chosen paths.
    ///
    /// Paths absent from `tokens` are dropped and repeats collapsed, so the
    /// total always matches the selection.
    pub fn from_paths<I, S>(paths: I, tokens: &TokenMap) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        let mut total_tokens = 0;

        for path in paths {
            let path = path.into();
            let Some(count) = tokens.get(&path) else {
                debug!(path = %path, "chooser returned an unknown path");
                continue;
            };
            if seen.insert(path.clone()) {
                total_tokens += count;
                selected.push(path);
            }
        }

        Self {
            selected,
            total_tokens,
        }
    }

    /// Relative paths in selection order.
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Sum of the token counts of exactly [`selected`](Self::selected).
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// At least one file was selected.
    Selected(SelectionResult),
    /// Nothing was selected; not an error.
    NoSelection,
}

/// Everything a scan produced, before selection.
#[derive(Debug, Clone)]
pub struct Scan {
    pub root: PathBuf,
    /// Candidates in display order.
    pub candidates: Vec<Candidate>,
    pub tokens: TokenMap,
    pub tree: FileNode,
}

impl Scan {
    /// Choices in candidate order.
    pub fn choices(&self) -> Vec<Choice> {
        self.candidates
            .iter()
            .map(|c| Choice {
                relative_path: c.relative.clone(),
                tokens: self.tokens.get(&c.relative).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Token total across every candidate.
    pub fn total_tokens(&self) -> usize {
        self.tokens.values().sum()
    }
}

/// Orchestrates a single selection run.
#[derive(Debug, Clone)]
pub struct Selector {
    root: PathBuf,
    mode: TraversalMode,
    matcher: PathMatcher,
    encoding: Encoding,
    text_encoding: TextEncoding,
    non_interactive: bool,
    interrupt: Option<Interrupt>,
}

impl Selector {
    /// Create a selector for the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: TraversalMode::default(),
            matcher: PathMatcher::default(),
            encoding: Encoding::default(),
            text_encoding: TextEncoding::default(),
            non_interactive: false,
            interrupt: None,
        }
    }

    pub fn mode(mut self, mode: TraversalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn matcher(mut self, matcher: PathMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn text_encoding(mut self, text_encoding: TextEncoding) -> Self {
        self.text_encoding = text_encoding;
        self
    }

    /// Select every candidate without consulting the chooser.
    pub fn non_interactive(mut self, non_interactive: bool) -> Self {
        self.non_interactive = non_interactive;
        self
    }

    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Validate the root and return its absolute form.
    fn resolve_root(&self) -> Result<PathBuf, CmdcError> {
        if !self.root.exists() {
            return Err(CmdcError::PathNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(CmdcError::NotADirectory(self.root.clone()));
        }
        Ok(std::path::absolute(&self.root)?)
    }

    /// Walk, collect sorted candidates, annotate and build the tree.
    pub fn scan(&self) -> Result<Scan, CmdcError> {
        let root = self.resolve_root()?;

        let mut walker = Walker::new(&root, self.mode, &self.matcher, self.interrupt.clone());
        let entries: Vec<Entry> = walker.by_ref().collect();
        if triggered(self.interrupt.as_ref()) {
            return Err(CmdcError::Interrupted);
        }

        let candidates = collect_candidates(&entries, &self.matcher);
        info!(
            root = %root.display(),
            mode = %self.mode,
            entries = entries.len(),
            directories = walker.directories_read(),
            candidates = candidates.len(),
            "scan complete"
        );

        if candidates.is_empty() {
            return Err(CmdcError::NoFilesFound(root));
        }

        let counter = TokenCounter::new(self.encoding);
        let tokens = annotate(
            &candidates,
            &counter,
            self.text_encoding,
            self.interrupt.as_ref(),
        )?;

        let tree = build_display_tree(&root, &entries, &self.matcher, self.mode, Some(&tokens));

        Ok(Scan {
            root,
            candidates,
            tokens,
            tree,
        })
    }

    /// Select from a finished scan.
    pub fn select(&self, scan: &Scan, chooser: &mut dyn Chooser) -> Result<Outcome, CmdcError> {
        let choices = scan.choices();

        let chosen = if self.non_interactive {
            SelectAll.choose(&choices)?
        } else {
            chooser.choose(&choices)?
        };

        if triggered(self.interrupt.as_ref()) {
            return Err(CmdcError::Interrupted);
        }

        let result = SelectionResult::from_paths(chosen, &scan.tokens);
        if result.is_empty() {
            info!("no files selected");
            return Ok(Outcome::NoSelection);
        }

        info!(
            files = result.selected.len(),
            tokens = result.total_tokens,
            "selection complete"
        );
        Ok(Outcome::Selected(result))
    }

    /// Run the full pipeline, presenting the tree to `out`.
    pub fn run(&self, out: &mut dyn Write, chooser: &mut dyn Chooser) -> Result<Outcome, CmdcError> {
        let scan = self.scan()?;
        present(&scan, out)?;
        self.select(&scan, chooser)
    }
}

/// Files from `entries` that pass the filter, sorted by lowercase file name.
pub fn collect_candidates(entries: &[Entry], matcher: &PathMatcher) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = entries
        .iter()
        .filter(|e| e.is_file() && matcher.matches_filter(&e.path))
        .map(|e| Candidate {
            path: e.path.clone(),
            relative: relative_key(&e.relative),
        })
        .collect();

    candidates.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    candidates
}

/// Write the directory tree and a token summary.
pub fn present(scan: &Scan, out: &mut dyn Write) -> std::io::Result<()> {
    let options = RenderOptions {
        show_tokens: true,
        ..Default::default()
    };
    writeln!(out, "Directory structure:")?;
    write!(out, "{}", render_tree(&scan.tree, &options))?;
    writeln!(
        out,
        "\n{} files, {} tokens",
        scan.candidates.len(),
        format_number(scan.total_tokens())
    )?;
    out.flush()
}

/// Scan `root` non-interactively with the given mode and matcher.
pub fn scan_path(
    root: impl AsRef<Path>,
    mode: TraversalMode,
    matcher: PathMatcher,
) -> Result<Scan, CmdcError> {
    Selector::new(root.as_ref()).mode(mode).matcher(matcher).scan()
}
