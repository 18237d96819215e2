//! Display tree construction and rendering.
//!
//! The tree is built from the same entry sequence used for candidate
//! discovery and rendered with box-drawing characters.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::matcher::PathMatcher;
use crate::walker::{Entry, TraversalMode};

/// The type of a display node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File { tokens: Option<usize> },
}

/// A node in the display tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// File or directory name (not full path).
    pub name: String,
    /// Path relative to the walk root (empty for the root).
    pub path: PathBuf,
    pub kind: NodeKind,
    children: Vec<FileNode>,
}

impl FileNode {
    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>, tokens: Option<usize>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File { tokens },
            children: Vec::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Add a child node. Only meaningful for directories.
    pub fn add_child(&mut self, child: FileNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    /// Token count, if this is an annotated file.
    pub fn tokens(&self) -> Option<usize> {
        match self.kind {
            NodeKind::File { tokens } => tokens,
            NodeKind::Directory => None,
        }
    }

    /// Sort children recursively: directories first, then case-insensitive by name.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| match (a.is_directory(), b.is_directory()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });

        for child in &mut self.children {
            child.sort_children();
        }
    }

    /// Count files in this tree.
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File { .. } => 1,
            NodeKind::Directory => self.children.iter().map(|c| c.file_count()).sum(),
        }
    }

    /// Find a descendant by relative path.
    pub fn find(&self, path: &Path) -> Option<&FileNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(path))
    }
}

/// Build the display tree for a walk.
///
/// Files must pass the matcher's extension filter. A directory is kept when
/// it transitively contains a kept file, or when it sits at the depth limit
/// of `mode` (its contents were never listed, so emptiness is unknown).
pub fn build_display_tree(
    root: &Path,
    entries: &[Entry],
    matcher: &PathMatcher,
    mode: TraversalMode,
    tokens: Option<&BTreeMap<String, usize>>,
) -> FileNode {
    let frontier = mode.max_depth();

    let mut by_parent: HashMap<PathBuf, Vec<&Entry>> = HashMap::new();
    for entry in entries {
        let parent = entry
            .relative
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        by_parent.entry(parent).or_default().push(entry);
    }

    let label = root.file_name().map_or_else(
        || root.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    );

    let mut tree = FileNode::directory(label, PathBuf::new());
    populate(&mut tree, &by_parent, matcher, frontier, tokens);
    tree.sort_children();
    tree
}

fn populate(
    node: &mut FileNode,
    by_parent: &HashMap<PathBuf, Vec<&Entry>>,
    matcher: &PathMatcher,
    frontier: Option<usize>,
    tokens: Option<&BTreeMap<String, usize>>,
) {
    let Some(children) = by_parent.get(&node.path) else {
        return;
    };

    for entry in children {
        if entry.is_dir() {
            let mut dir = FileNode::directory(entry.name(), &entry.relative);
            populate(&mut dir, by_parent, matcher, frontier, tokens);
            let on_frontier = frontier == Some(entry.depth);
            if !dir.children.is_empty() || on_frontier {
                node.add_child(dir);
            }
        } else if matcher.matches_filter(&entry.path) {
            let count = tokens.and_then(|t| t.get(&relative_key(&entry.relative)).copied());
            node.add_child(FileNode::file(entry.name(), &entry.relative, count));
        }
    }
}

/// Relative path in the string form used as a token-map key.
pub fn relative_key(relative: &Path) -> String {
    relative.to_string_lossy().into_owned()
}

/// Options for rendering the tree.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Append `(N tokens)` to annotated files.
    pub show_tokens: bool,
    /// Relative paths marked with `*`.
    pub selected: HashSet<PathBuf>,
}

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render a tree with box-drawing characters.
///
/// # Examples
///
/// ```
/// use cmdc::tree::{FileNode, RenderOptions, render_tree};
///
/// let mut root = FileNode::directory("project", "");
/// root.add_child(FileNode::file("main.rs", "main.rs", Some(42)));
///
/// let output = render_tree(&root, &RenderOptions { show_tokens: true, ..Default::default() });
/// assert!(output.contains("main.rs (42 tokens)"));
/// ```
pub fn render_tree(root: &FileNode, options: &RenderOptions) -> String {
    let mut output = String::with_capacity(4096);
    render_node(&mut output, root, "", true, true, options);
    output
}

fn render_node(
    output: &mut String,
    node: &FileNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    options: &RenderOptions,
) {
    let branch = if is_root {
        ""
    } else if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    };

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(&node.name);

    if node.is_directory() {
        output.push('/');
    }

    if options.show_tokens {
        if let Some(tokens) = node.tokens() {
            output.push_str(&format!(" ({} tokens)", format_number(tokens)));
        }
    }

    if node.is_file() && options.selected.contains(&node.path) {
        output.push_str(" *");
    }

    output.push('\n');

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == child_count - 1;

        let new_prefix = if is_root {
            String::new()
        } else {
            let continuation = if is_last { SPACE } else { VERTICAL };
            format!("{}{}", prefix, continuation)
        };

        render_node(output, child, &new_prefix, is_last_child, false, options);
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
