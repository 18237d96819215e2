//! Output formatting and delivery for cmdc.
//!
//! Formats the selected files into XML-style or JSON text suitable for LLM
//! consumption, then delivers it to the console, the clipboard or a file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::annotate::{TextEncoding, TokenMap};
use crate::selector::SelectionResult;
use crate::tree::{format_number, render_tree, FileNode, RenderOptions};

/// Errors that can occur while formatting or delivering output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `<open_file>` blocks (default).
    #[default]
    Xml,
    /// JSON for programmatic access.
    Json,
}

/// Options controlling what to include in output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub format: OutputFormat,
    /// Prepend the selected-file list, directory tree and token total.
    pub include_summary: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Xml,
            include_summary: true,
        }
    }
}

/// Text of a selected file, or why it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Unreadable(String),
}

/// A selected file with its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Path relative to the root.
    pub path: String,
    pub tokens: usize,
    pub content: FileContent,
}

/// Read every selected file, in selection order.
///
/// Files are decoded with the same `text_encoding` used for counting. A
/// file that cannot be read becomes an inline `Error reading` marker
/// rather than failing the batch.
pub fn load_selected(
    root: &Path,
    selection: &SelectionResult,
    tokens: &TokenMap,
    text_encoding: TextEncoding,
) -> Vec<SelectedFile> {
    selection
        .selected()
        .iter()
        .map(|relative| {
            let content = match text_encoding.read(&root.join(relative)) {
                Ok(text) => FileContent::Text(text),
                Err(err) => {
                    warn!(path = %relative, error = %err, "selected file unreadable");
                    FileContent::Unreadable(format!("Error reading {}: {}", relative, err))
                }
            };
            SelectedFile {
                path: relative.clone(),
                tokens: tokens.get(relative).copied().unwrap_or(0),
                content,
            }
        })
        .collect()
}

/// Format the selected files with the requested sections.
pub fn format_output(
    tree: Option<&FileNode>,
    files: &[SelectedFile],
    options: &OutputOptions,
) -> Result<String, OutputError> {
    match options.format {
        OutputFormat::Xml => Ok(format_output_xml(tree, files, options)),
        OutputFormat::Json => format_output_json(tree, files, options),
    }
}

fn total_tokens(files: &[SelectedFile]) -> usize {
    files.iter().map(|f| f.tokens).sum()
}

fn summary_tree(tree: &FileNode, files: &[SelectedFile]) -> String {
    let options = RenderOptions {
        show_tokens: true,
        selected: files.iter().map(|f| PathBuf::from(&f.path)).collect(),
    };
    render_tree(tree, &options)
}

fn format_output_xml(tree: Option<&FileNode>, files: &[SelectedFile], options: &OutputOptions) -> String {
    let mut output = String::with_capacity(8192);

    if options.include_summary {
        output.push_str("<summary>\n<selected_files>\n");
        for file in files {
            output.push_str(&format!("{} ({} tokens)\n", file.path, format_number(file.tokens)));
        }
        output.push_str("</selected_files>\n");

        if let Some(tree) = tree {
            output.push_str("<directory_structure>\n");
            output.push_str(&summary_tree(tree, files));
            output.push_str("</directory_structure>\n");
        }

        output.push_str(&format!(
            "<total_tokens>{}</total_tokens>\n</summary>\n",
            total_tokens(files)
        ));
    }

    for file in files {
        match &file.content {
            FileContent::Text(content) => {
                output.push_str(&format!(
                    "\n<open_file>\n{}\n<contents>\n{}\n</contents>\n</open_file>\n",
                    file.path, content
                ));
            }
            FileContent::Unreadable(message) => {
                output.push_str(&format!("\n{}\n", message));
            }
        }
    }

    output
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    total_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory_structure: Option<String>,
    files: Vec<JsonFile<'a>>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: &'a str,
    tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

fn format_output_json(
    tree: Option<&FileNode>,
    files: &[SelectedFile],
    options: &OutputOptions,
) -> Result<String, OutputError> {
    let directory_structure = if options.include_summary {
        tree.map(|t| summary_tree(t, files))
    } else {
        None
    };

    let output = JsonOutput {
        total_tokens: total_tokens(files),
        directory_structure,
        files: files
            .iter()
            .map(|f| {
                let (content, error) = match &f.content {
                    FileContent::Text(text) => (Some(text.as_str()), None),
                    FileContent::Unreadable(message) => (None, Some(message.as_str())),
                };
                JsonFile {
                    path: &f.path,
                    tokens: f.tokens,
                    content,
                    error,
                }
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

/// Where formatted output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Console,
    File(PathBuf),
}

impl Destination {
    /// `console` (any case) selects the console; anything else is a file path.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("console") {
            Destination::Console
        } else {
            Destination::File(PathBuf::from(value))
        }
    }
}

/// Console delivery switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub copy_to_clipboard: bool,
    pub print_to_console: bool,
}

/// What [`deliver`] actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub printed: bool,
    pub copied: bool,
    pub written: Option<PathBuf>,
}

/// Destination for clipboard copies.
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), OutputError>;
}

/// Argument that re-runs the binary as a clipboard holder.
pub const CLIPBOARD_HOLDER_ARG: &str = "--hold-clipboard";

/// The system clipboard, opened on first use.
///
/// On Linux the contents vanish with the owning process unless a clipboard
/// manager takes them over, so after copying, the current executable is
/// started with [`CLIPBOARD_HOLDER_ARG`] to keep ownership in the background.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), OutputError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new().map_err(|e| OutputError::Clipboard(e.to_string()))?,
        };
        self.inner
            .insert(clipboard)
            .set_text(text.to_owned())
            .map_err(|e| OutputError::Clipboard(e.to_string()))?;

        if cfg!(target_os = "linux") {
            if let Err(err) = spawn_holder(text) {
                debug!(error = %err, "clipboard holder not started");
            }
        }
        Ok(())
    }
}

/// Command that starts a holder process from `exe`.
pub fn holder_command(exe: &Path) -> Command {
    let mut command = Command::new(exe);
    command
        .arg(CLIPBOARD_HOLDER_ARG)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

fn spawn_holder(text: &str) -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let mut child = holder_command(&exe).spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    debug!(pid = child.id(), "clipboard holder started");
    Ok(())
}

/// Own the clipboard with `text` until another program replaces it.
///
/// Run by the holder process. Returns at once for empty text, and on
/// platforms whose clipboard outlives the process.
pub fn hold_clipboard(text: &str) -> Result<(), OutputError> {
    if text.is_empty() {
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    {
        use arboard::SetExtLinux;

        arboard::Clipboard::new()
            .map_err(|e| OutputError::Clipboard(e.to_string()))?
            .set()
            .wait()
            .text(text.to_owned())
            .map_err(|e| OutputError::Clipboard(e.to_string()))?;
    }

    Ok(())
}

fn write_console(stdout: &mut dyn Write, text: &str) -> std::io::Result<()> {
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}

/// Send `text` to its destination.
///
/// On the console the text is printed when printing is requested or the
/// clipboard is disabled, and copied when the clipboard is enabled. A
/// clipboard failure is logged and the text printed instead. File writes
/// must succeed.
pub fn deliver(
    text: &str,
    destination: &Destination,
    options: &DeliveryOptions,
    stdout: &mut dyn Write,
    clipboard: &mut dyn Clipboard,
) -> Result<Delivery, OutputError> {
    let mut delivery = Delivery::default();

    match destination {
        Destination::Console => {
            if options.print_to_console || !options.copy_to_clipboard {
                write_console(stdout, text)?;
                delivery.printed = true;
            }

            if options.copy_to_clipboard {
                match clipboard.set_text(text) {
                    Ok(()) => {
                        info!(bytes = text.len(), "copied to clipboard");
                        delivery.copied = true;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to copy to clipboard");
                        if !delivery.printed {
                            write_console(stdout, text)?;
                            delivery.printed = true;
                        }
                    }
                }
            }
        }
        Destination::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| OutputError::Write {
                    path: path.clone(),
                    source,
                })?;
            }
            fs::write(path, text).map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), bytes = text.len(), "output written");
            delivery.written = Some(path.clone());
        }
    }

    Ok(delivery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeClipboard {
        text: Option<String>,
        fail: bool,
    }

    impl Clipboard for FakeClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), OutputError> {
            if self.fail {
                return Err(OutputError::Clipboard("no display".into()));
            }
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    fn file(path: &str, tokens: usize, content: &str) -> SelectedFile {
        SelectedFile {
            path: path.into(),
            tokens,
            content: FileContent::Text(content.into()),
        }
    }

    fn no_summary(format: OutputFormat) -> OutputOptions {
        OutputOptions {
            format,
            include_summary: false,
        }
    }

    #[test]
    fn test_open_file_block() {
        let output = format_output(
            None,
            &[file("a.py", 3, "print('a')")],
            &no_summary(OutputFormat::Xml),
        )
        .unwrap();
        assert_eq!(
            output,
            "\n<open_file>\na.py\n<contents>\nprint('a')\n</contents>\n</open_file>\n"
        );
    }

    #[test]
    fn test_summary_section() {
        let mut tree = FileNode::directory("project", "");
        tree.add_child(FileNode::file("a.py", "a.py", Some(3)));
        tree.add_child(FileNode::file("b.py", "b.py", Some(4)));

        let files = [file("a.py", 3, "x")];
        let output = format_output(Some(&tree), &files, &OutputOptions::default()).unwrap();

        assert!(output.starts_with("<summary>\n<selected_files>\na.py (3 tokens)\n</selected_files>\n"));
        assert!(output.contains("<directory_structure>\nproject/\n"));
        assert!(output.contains("a.py (3 tokens) *"));
        assert!(output.contains("b.py (4 tokens)\n"));
        assert!(output.contains("<total_tokens>3</total_tokens>\n</summary>\n"));
        assert!(output.contains("<open_file>\na.py\n"));
    }

    #[test]
    fn test_empty_output_xml() {
        let output = format_output(None, &[], &no_summary(OutputFormat::Xml)).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_load_selected_marks_unreadable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1").unwrap();

        let tokens: TokenMap = [("a.py".to_string(), 4), ("gone.py".to_string(), 0)]
            .into_iter()
            .collect();
        let selection = SelectionResult::from_paths(["gone.py", "a.py"], &tokens);
        let files = load_selected(dir.path(), &selection, &tokens, TextEncoding::Utf8);

        assert_eq!(files[1], file("a.py", 4, "x = 1"));
        let FileContent::Unreadable(message) = &files[0].content else {
            panic!("expected an error marker");
        };
        assert!(message.starts_with("Error reading gone.py: "));

        let output = format_output(None, &files, &no_summary(OutputFormat::Xml)).unwrap();
        assert!(output.starts_with("\nError reading gone.py: "));
        assert!(!output.contains("<open_file>\ngone.py"));
    }

    #[test]
    fn test_load_selected_uses_text_encoding() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mixed.txt"), b"caf\xe9 menu").unwrap();

        let tokens: TokenMap = [("mixed.txt".to_string(), 3)].into_iter().collect();
        let selection = SelectionResult::from_paths(["mixed.txt"], &tokens);

        let lossy = load_selected(dir.path(), &selection, &tokens, TextEncoding::Utf8Lossy);
        assert_eq!(lossy[0], file("mixed.txt", 3, "caf\u{fffd} menu"));

        let strict = load_selected(dir.path(), &selection, &tokens, TextEncoding::Utf8);
        assert!(matches!(strict[0].content, FileContent::Unreadable(_)));
    }

    #[test]
    fn test_holder_command() {
        let command = holder_command(Path::new("/usr/local/bin/cmdc"));
        assert_eq!(command.get_program(), "/usr/local/bin/cmdc");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec![CLIPBOARD_HOLDER_ARG]);
    }

    #[test]
    fn test_hold_empty_clipboard_returns() {
        assert!(hold_clipboard("").is_ok());
    }

    #[test]
    fn test_json_output() {
        let files = [
            file("a.py", 3, "print('a')"),
            SelectedFile {
                path: "b.py".into(),
                tokens: 0,
                content: FileContent::Unreadable("Error reading b.py: denied".into()),
            },
        ];
        let output = format_output(None, &files, &no_summary(OutputFormat::Json)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["total_tokens"], 3);
        assert_eq!(value["files"][0]["path"], "a.py");
        assert_eq!(value["files"][0]["content"], "print('a')");
        assert!(value["files"][0].get("error").is_none());
        assert_eq!(value["files"][1]["error"], "Error reading b.py: denied");
        assert!(value.get("directory_structure").is_none());
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse("console"), Destination::Console);
        assert_eq!(Destination::parse("CONSOLE"), Destination::Console);
        assert_eq!(
            Destination::parse("out.txt"),
            Destination::File(PathBuf::from("out.txt"))
        );
    }

    #[test]
    fn test_console_with_clipboard() {
        let mut stdout = Vec::new();
        let mut clipboard = FakeClipboard::default();
        let options = DeliveryOptions {
            copy_to_clipboard: true,
            print_to_console: false,
        };

        let delivery = deliver("hello", &Destination::Console, &options, &mut stdout, &mut clipboard).unwrap();
        assert!(delivery.copied);
        assert!(!delivery.printed);
        assert!(stdout.is_empty());
        assert_eq!(clipboard.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_console_prints_without_clipboard() {
        let mut stdout = Vec::new();
        let mut clipboard = FakeClipboard::default();
        let options = DeliveryOptions {
            copy_to_clipboard: false,
            print_to_console: false,
        };

        let delivery = deliver("hello", &Destination::Console, &options, &mut stdout, &mut clipboard).unwrap();
        assert!(delivery.printed);
        assert_eq!(stdout, b"hello\n");
        assert!(clipboard.text.is_none());
    }

    #[test]
    fn test_clipboard_failure_is_not_fatal() {
        let mut stdout = Vec::new();
        let mut clipboard = FakeClipboard {
            fail: true,
            ..Default::default()
        };
        let options = DeliveryOptions {
            copy_to_clipboard: true,
            print_to_console: true,
        };

        let delivery = deliver("hello\n", &Destination::Console, &options, &mut stdout, &mut clipboard).unwrap();
        assert!(delivery.printed);
        assert!(!delivery.copied);
        assert_eq!(stdout, b"hello\n");

        let mut stdout = Vec::new();
        let options = DeliveryOptions {
            copy_to_clipboard: true,
            print_to_console: false,
        };
        let delivery = deliver("hello", &Destination::Console, &options, &mut stdout, &mut clipboard).unwrap();
        assert!(delivery.printed);
        assert_eq!(stdout, b"hello\n");
    }

    #[test]
    fn test_file_destination() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/context.txt");
        let mut stdout = Vec::new();
        let options = DeliveryOptions {
            copy_to_clipboard: true,
            print_to_console: true,
        };

        let delivery = deliver(
            "body",
            &Destination::File(path.clone()),
            &options,
            &mut stdout,
            &mut FakeClipboard::default(),
        )
        .unwrap();
        assert_eq!(delivery.written, Some(path.clone()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "body");
        assert!(stdout.is_empty());
    }

    #[test]
    fn test_file_write_failure() {
        let dir = TempDir::new().unwrap();
        let options = DeliveryOptions {
            copy_to_clipboard: false,
            print_to_console: false,
        };

        let result = deliver(
            "body",
            &Destination::File(dir.path().to_path_buf()),
            &options,
            &mut Vec::new(),
            &mut FakeClipboard::default(),
        );
        assert!(matches!(result, Err(OutputError::Write { .. })));
    }
}
