//! Directory traversal with ignore-pattern pruning.
//!
//! The only exclusions come from the configured [`PathMatcher`]. Children
//! are matched as soon as their parent is listed, so an ignored directory,
//! or one at the depth limit, is never read.

use std::cmp::Ordering;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::interrupt::{triggered, Interrupt};
use crate::matcher::PathMatcher;

/// How far below the root a walk descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    /// Immediate children of the root only.
    NonRecursive,
    /// Entries up to and including the given depth (root = 0).
    DepthLimited(usize),
    /// No depth ceiling.
    FullyRecursive,
}

impl TraversalMode {
    /// Deepest depth that may be yielded, if bounded.
    pub fn max_depth(self) -> Option<usize> {
        match self {
            TraversalMode::NonRecursive => Some(1),
            TraversalMode::DepthLimited(n) => Some(n.max(1)),
            TraversalMode::FullyRecursive => None,
        }
    }
}

impl Default for TraversalMode {
    fn default() -> Self {
        TraversalMode::DepthLimited(1)
    }
}

impl std::fmt::Display for TraversalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraversalMode::NonRecursive => write!(f, "non-recursive"),
            TraversalMode::DepthLimited(n) => write!(f, "depth {}", n),
            TraversalMode::FullyRecursive => write!(f, "recursive"),
        }
    }
}

/// Kind of a discovered filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Entry from a directory walk. The root itself is never yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub relative: PathBuf,
    /// Depth from root (root = 0).
    pub depth: usize,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// File or directory name.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lazy pre-order iterator over the non-ignored entries below a root.
///
/// Holds one sorted listing per open directory. A directory is only read
/// when it survives the matcher and sits above the depth limit.
pub struct Walker {
    root: PathBuf,
    matcher: PathMatcher,
    max_depth: Option<usize>,
    stack: Vec<Listing>,
    interrupt: Option<Interrupt>,
    directories_read: usize,
}

/// Remaining children of one directory, all at `depth`.
struct Listing {
    depth: usize,
    children: std::vec::IntoIter<Child>,
}

struct Child {
    path: PathBuf,
    file_type: FileType,
}

/// Walk `root` under `mode`, pruning everything `matcher` ignores.
///
/// # Examples
///
/// ```no_run
/// use cmdc::matcher::PathMatcher;
/// use cmdc::walker::{walk, TraversalMode};
/// use std::path::Path;
///
/// let matcher = PathMatcher::new([".git"], Vec::<String>::new());
/// for entry in walk(Path::new("."), TraversalMode::FullyRecursive, &matcher) {
///     println!("{}", entry.relative.display());
/// }
/// ```
pub fn walk(root: &Path, mode: TraversalMode, matcher: &PathMatcher) -> Walker {
    Walker::new(root, mode, matcher, None)
}

impl Walker {
    pub fn new(
        root: &Path,
        mode: TraversalMode,
        matcher: &PathMatcher,
        interrupt: Option<Interrupt>,
    ) -> Self {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());

        let mut walker = Self {
            root,
            matcher: matcher.clone(),
            max_depth: mode.max_depth(),
            stack: Vec::new(),
            interrupt,
            directories_read: 0,
        };

        if walker.matcher.is_ignored(&walker.root) {
            debug!(root = %walker.root.display(), "walk root is ignored");
            return walker;
        }

        let root = walker.root.clone();
        walker.open(&root, 1);
        walker
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of directories listed so far, the root included.
    pub fn directories_read(&self) -> usize {
        self.directories_read
    }

    /// List `dir` and push its surviving children, sorted, at `depth`.
    fn open(&mut self, dir: &Path, depth: usize) {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                // Unreadable directories lose their subtree; siblings continue.
                debug!(path = %dir.display(), error = %err, "skipping unreadable directory");
                return;
            }
        };
        self.directories_read += 1;

        let mut children: Vec<Child> = Vec::new();
        for dent in read_dir {
            let dent = match dent {
                Ok(dent) => dent,
                Err(err) => {
                    debug!(path = %dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = dent.path();
            if self.matcher.is_ignored(&path) {
                trace!(path = %path.display(), "pruned");
                continue;
            }
            match dent.file_type() {
                Ok(file_type) => children.push(Child { path, file_type }),
                Err(err) => debug!(path = %path.display(), error = %err, "skipping entry"),
            }
        }
        children.sort_by(|a, b| compare_names(&a.path, &b.path));

        self.stack.push(Listing {
            depth,
            children: children.into_iter(),
        });
    }

    fn can_descend(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

/// Case-insensitive file name order, ties broken by the raw name.
fn compare_names(a: &Path, b: &Path) -> Ordering {
    let la = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let lb = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    match la.to_lowercase().cmp(&lb.to_lowercase()) {
        Ordering::Equal => la.cmp(&lb),
        other => other,
    }
}

impl Iterator for Walker {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        loop {
            if triggered(self.interrupt.as_ref()) {
                if !self.stack.is_empty() {
                    debug!("walk interrupted");
                    self.stack.clear();
                }
                return None;
            }

            let listing = self.stack.last_mut()?;
            let depth = listing.depth;
            let Some(child) = listing.children.next() else {
                self.stack.pop();
                continue;
            };

            let kind = if child.file_type.is_dir() {
                EntryKind::Directory
            } else if child.file_type.is_file() {
                EntryKind::File
            } else if child.file_type.is_symlink() && child.path.is_file() {
                EntryKind::File
            } else {
                trace!(path = %child.path.display(), "skipping special entry");
                continue;
            };

            if kind == EntryKind::Directory && self.can_descend(depth) {
                self.open(&child.path, depth + 1);
            }

            let relative = child
                .path
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| child.path.clone());

            return Some(Entry {
                path: child.path,
                relative,
                depth,
                kind,
            });
        }
    }
}
