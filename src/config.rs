//! Layered configuration: defaults ← config file ← environment.
//!
//! The config file is TOML with a single `[cmdc]` table. Environment
//! variables are read from an explicit map so callers decide whether the
//! process environment is consulted.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotate::TextEncoding;
use crate::errors::CmdcError;
use crate::matcher::normalize_extension;
use crate::walker::TraversalMode;

pub const APP_NAME: &str = "cmdc";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_TIKTOKEN_MODEL: &str = "o200k_base";

/// Patterns ignored unless the user configures otherwise.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "*.pyc",
    "venv",
    ".venv",
    "env",
    ".env",
    ".idea",
    ".vscode",
    ".pytest_cache",
    ".coverage",
    "htmlcov",
    "build",
    "dist",
    "*.egg-info",
    ".tox",
    ".mypy_cache",
    ".ruff_cache",
];

/// Fully resolved settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub filters: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub recursive: bool,
    pub depth: usize,
    pub copy_to_clipboard: bool,
    pub print_to_console: bool,
    pub tiktoken_model: String,
    pub text_encoding: TextEncoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            recursive: false,
            depth: 1,
            copy_to_clipboard: true,
            print_to_console: false,
            tiktoken_model: DEFAULT_TIKTOKEN_MODEL.to_string(),
            text_encoding: TextEncoding::default(),
        }
    }
}

/// Partial settings from one source; `None` leaves the base value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigPatch {
    pub filters: Option<Vec<String>>,
    pub ignore_patterns: Option<Vec<String>>,
    pub recursive: Option<bool>,
    pub depth: Option<i64>,
    pub copy_to_clipboard: Option<bool>,
    pub print_to_console: Option<bool>,
    pub tiktoken_model: Option<String>,
    pub text_encoding: Option<TextEncoding>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cmdc: Option<ConfigPatch>,
}

impl Config {
    /// Overlay `patch` onto `self`. Depth below 1 clamps to 1.
    pub fn merge(mut self, patch: ConfigPatch) -> Config {
        if let Some(filters) = patch.filters {
            self.filters = filters;
        }
        if let Some(ignore_patterns) = patch.ignore_patterns {
            self.ignore_patterns = ignore_patterns;
        }
        if let Some(recursive) = patch.recursive {
            self.recursive = recursive;
        }
        if let Some(depth) = patch.depth {
            self.depth = clamp_depth(depth);
        }
        if let Some(copy_to_clipboard) = patch.copy_to_clipboard {
            self.copy_to_clipboard = copy_to_clipboard;
        }
        if let Some(print_to_console) = patch.print_to_console {
            self.print_to_console = print_to_console;
        }
        if let Some(tiktoken_model) = patch.tiktoken_model {
            self.tiktoken_model = tiktoken_model;
        }
        if let Some(text_encoding) = patch.text_encoding {
            self.text_encoding = text_encoding;
        }
        self
    }

    /// Every field set, for persisting.
    fn to_patch(&self) -> ConfigPatch {
        ConfigPatch {
            filters: Some(self.filters.clone()),
            ignore_patterns: Some(self.ignore_patterns.clone()),
            recursive: Some(self.recursive),
            depth: Some(i64::try_from(self.depth).unwrap_or(i64::MAX)),
            copy_to_clipboard: Some(self.copy_to_clipboard),
            print_to_console: Some(self.print_to_console),
            tiktoken_model: Some(self.tiktoken_model.clone()),
            text_encoding: Some(self.text_encoding),
        }
    }

    /// Render as the TOML stored on disk.
    pub fn to_toml(&self) -> Result<String, CmdcError> {
        let file = ConfigFile {
            cmdc: Some(self.to_patch()),
        };
        toml::to_string_pretty(&file)
            .map_err(|e| CmdcError::invalid_config("config", "<toml>", e.to_string()))
    }
}

fn clamp_depth(depth: i64) -> usize {
    usize::try_from(depth.max(1)).unwrap_or(usize::MAX)
}

impl TraversalMode {
    /// Pick the traversal mode from CLI overrides and configuration.
    ///
    /// An explicit recursive flag wins over an explicit depth; an explicit
    /// depth wins over configuration.
    pub fn resolve(cli_recursive: Option<bool>, cli_depth: Option<i64>, config: &Config) -> Self {
        match (cli_recursive, cli_depth) {
            (Some(true), _) => TraversalMode::FullyRecursive,
            (Some(false), _) => TraversalMode::NonRecursive,
            (None, Some(depth)) => TraversalMode::DepthLimited(clamp_depth(depth)),
            (None, None) if config.recursive => TraversalMode::FullyRecursive,
            (None, None) => TraversalMode::DepthLimited(config.depth.max(1)),
        }
    }
}

/// Platform config file location, resolved from `env`.
///
/// `%APPDATA%\cmdc` on Windows, otherwise `$XDG_CONFIG_HOME/cmdc` or
/// `$HOME/.config/cmdc`.
pub fn default_config_path(env: &HashMap<String, String>) -> Option<PathBuf> {
    let non_empty = |key: &str| env.get(key).filter(|v| !v.is_empty()).map(PathBuf::from);

    let dir = if cfg!(windows) {
        non_empty("APPDATA")
            .or_else(|| non_empty("USERPROFILE").map(|h| h.join("AppData").join("Roaming")))?
    } else {
        non_empty("XDG_CONFIG_HOME").or_else(|| non_empty("HOME").map(|h| h.join(".config")))?
    };

    Some(dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Parse the `[cmdc]` table of a config file's contents.
pub fn patch_from_toml(contents: &str) -> Result<ConfigPatch, CmdcError> {
    let file: ConfigFile = toml::from_str(contents)
        .map_err(|e| CmdcError::invalid_config("config_file", "<toml>", e.to_string()))?;
    Ok(file.cmdc.unwrap_or_default())
}

/// Read a config file; a missing file yields `None`.
pub fn patch_from_file(path: &Path) -> Result<Option<ConfigPatch>, CmdcError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    patch_from_toml(&contents).map(Some)
}

/// Read `CMDC_*` overrides.
pub fn patch_from_env(env: &HashMap<String, String>) -> Result<ConfigPatch, CmdcError> {
    let get = |key: &str| env.get(key).filter(|v| !v.is_empty());
    let flag = |v: &String| v.trim().eq_ignore_ascii_case("true");

    let depth = match get("CMDC_DEPTH") {
        Some(raw) => Some(raw.trim().parse::<i64>().map_err(|e| {
            CmdcError::invalid_config("CMDC_DEPTH", raw.as_str(), e.to_string())
        })?),
        None => None,
    };

    let text_encoding = match get("CMDC_TEXT_ENCODING") {
        Some(raw) => Some(
            raw.trim()
                .parse::<TextEncoding>()
                .map_err(|e| CmdcError::invalid_config("CMDC_TEXT_ENCODING", raw.as_str(), e))?,
        ),
        None => None,
    };

    Ok(ConfigPatch {
        filters: get("CMDC_FILTERS").map(|v| split_list(v)),
        ignore_patterns: get("CMDC_IGNORE").map(|v| split_list(v)),
        recursive: get("CMDC_RECURSIVE").map(flag),
        depth,
        copy_to_clipboard: get("CMDC_COPY_CLIPBOARD").map(flag),
        print_to_console: get("CMDC_PRINT_CONSOLE").map(flag),
        tiktoken_model: get("CMDC_TIKTOKEN_MODEL").cloned(),
        text_encoding,
    })
}

/// Resolve configuration: defaults, then `config_path` if present, then env.
pub fn load(config_path: Option<&Path>, env: &HashMap<String, String>) -> Result<Config, CmdcError> {
    let mut config = Config::default();

    if let Some(path) = config_path {
        if let Some(patch) = patch_from_file(path)? {
            config = config.merge(patch);
            info!(path = %path.display(), "config file loaded");
        }
    }

    config = config.merge(patch_from_env(env)?);
    debug!(?config, "configuration resolved");
    Ok(config)
}

/// Write `config` to `path`, creating parent directories.
pub fn save(config: &Config, path: &Path) -> Result<(), CmdcError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, config.to_toml()?)?;
    info!(path = %path.display(), "config saved");
    Ok(())
}

/// Ask for each setting on `output`, reading answers from `input`.
///
/// A blank answer, or end of input, keeps the default. Depth answers that
/// are not a positive integer become 1.
pub fn interactive_config<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<Config, CmdcError> {
    let defaults = Config::default();
    let mut ask = Questions { input, output };

    writeln!(ask.output, "cmdc configuration (press Enter to keep the default)")?;

    let copy_to_clipboard = ask.confirm(
        "Copy selected content to the clipboard automatically?",
        defaults.copy_to_clipboard,
    )?;
    let recursive = ask.confirm("Browse directories recursively by default?", defaults.recursive)?;
    let depth = ask
        .text("Default scanning depth", &defaults.depth.to_string())?
        .parse::<i64>()
        .map(clamp_depth)
        .unwrap_or(1);

    let mut ignore_patterns = if ask.confirm("Use the recommended ignore patterns?", true)? {
        defaults.ignore_patterns.clone()
    } else {
        Vec::new()
    };
    for pattern in split_list(&ask.text("Extra ignore patterns, comma-separated", "")?) {
        if !ignore_patterns.contains(&pattern) {
            ignore_patterns.push(pattern);
        }
    }

    let filters = split_list(&ask.text("File extension filters, comma-separated", "")?)
        .iter()
        .filter_map(|f| normalize_extension(f))
        .collect();

    let tiktoken_model = ask.text("Token encoding model", &defaults.tiktoken_model)?;
    let print_to_console = ask.confirm(
        "Print the context dump to the console by default?",
        defaults.print_to_console,
    )?;

    Ok(Config {
        filters,
        ignore_patterns,
        recursive,
        depth,
        copy_to_clipboard,
        print_to_console,
        tiktoken_model,
        ..defaults
    })
}

/// Run the interactive setup and write the result to `path`.
///
/// Refuses to overwrite an existing file unless `force`, before asking
/// anything.
pub fn init<R: BufRead, W: Write>(
    path: &Path,
    force: bool,
    input: &mut R,
    output: &mut W,
) -> Result<Config, CmdcError> {
    if path.exists() && !force {
        return Err(CmdcError::ConfigExists(path.to_path_buf()));
    }
    let config = interactive_config(input, output)?;
    save(&config, path)?;
    Ok(config)
}

struct Questions<'a, R, W> {
    input: &'a mut R,
    output: &'a mut W,
}

impl<R: BufRead, W: Write> Questions<'_, R, W> {
    /// Trimmed answer, `None` at end of input.
    fn answer(&mut self, prompt: &str) -> Result<Option<String>, CmdcError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn text(&mut self, question: &str, default: &str) -> Result<String, CmdcError> {
        let prompt = if default.is_empty() {
            format!("{question}: ")
        } else {
            format!("{question} [{default}]: ")
        };
        match self.answer(&prompt)? {
            Some(answer) if !answer.is_empty() => Ok(answer),
            _ => Ok(default.to_string()),
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, CmdcError> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let Some(answer) = self.answer(&format!("{question} [{hint}]: "))? else {
                return Ok(default);
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n")?,
            }
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Append patterns to the stored ignore list, skipping duplicates.
///
/// Starts from the defaults when no config file exists yet. Returns the
/// patterns that were actually added.
pub fn add_ignore_patterns(path: &Path, patterns: &[String]) -> Result<Vec<String>, CmdcError> {
    let mut config = Config::default();
    if let Some(patch) = patch_from_file(path)? {
        config = config.merge(patch);
    }

    let mut added = Vec::new();
    for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !config.ignore_patterns.iter().any(|p| p == pattern) {
            config.ignore_patterns.push(pattern.to_string());
            added.push(pattern.to_string());
        }
    }

    if !added.is_empty() {
        save(&config, path)?;
    }
    Ok(added)
}
