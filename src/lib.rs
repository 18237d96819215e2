//! cmdc - Pick files from a directory and hand their contents to an LLM.
//!
//! cmdc walks a directory, shows the matching files in a tree annotated with
//! token counts, lets the user choose some of them, and emits their contents
//! in an LLM-friendly format on the console, the clipboard or a file.
//!
//! # Quick Start
//!
//! ```no_run
//! use cmdc::matcher::PathMatcher;
//! use cmdc::selector::{Outcome, SelectAll, Selector};
//! use cmdc::walker::TraversalMode;
//!
//! let outcome = Selector::new("./my-project")
//!     .mode(TraversalMode::DepthLimited(2))
//!     .matcher(PathMatcher::new([".git", "target"], [".rs"]))
//!     .non_interactive(true)
//!     .run(&mut std::io::stderr(), &mut SelectAll)
//!     .unwrap();
//!
//! if let Outcome::Selected(result) = outcome {
//!     println!("{} files, {} tokens", result.selected().len(), result.total_tokens());
//! }
//! ```
//!
//! # Modules
//!
//! - [`matcher`] - Ignore patterns and extension filters
//! - [`walker`] - Lazy, pruned directory traversal
//! - [`tree`] - Display tree construction and rendering
//! - [`tokens`] - Token counting for LLM context budgets
//! - [`annotate`] - Parallel per-file token annotation
//! - [`selector`] - Scan, present and select
//! - [`prompt`] - Line-oriented interactive chooser
//! - [`output`] - Formatting and delivery of selected files
//! - [`config`] - Layered configuration
//! - [`interrupt`] - Cooperative cancellation on SIGINT/SIGTERM
//! - [`logging`] - Tracing subscriber setup

pub mod annotate;
pub mod config;
pub mod errors;
pub mod interrupt;
pub mod logging;
pub mod matcher;
pub mod output;
pub mod prompt;
pub mod selector;
pub mod tokens;
pub mod tree;
pub mod walker;

// Re-export key types at crate root for convenience
pub use annotate::{Candidate, TextEncoding, TokenMap};
pub use config::Config;
pub use errors::CmdcError;
pub use interrupt::Interrupt;
pub use matcher::PathMatcher;
pub use output::{Destination, OutputError, OutputFormat, OutputOptions};
pub use selector::{Choice, Chooser, Outcome, SelectAll, SelectionResult, Selector};
pub use tokens::{count_tokens, Encoding, TokenCounter};
pub use tree::{FileNode, NodeKind, RenderOptions};
pub use walker::{Entry, TraversalMode};
