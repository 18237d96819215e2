//! cmdc CLI - Browse a directory, pick files, extract their contents for an LLM.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use cmdc::annotate::TextEncoding;
use cmdc::config::{self, Config};
use cmdc::errors::{exit_code, CmdcError};
use cmdc::interrupt::Interrupt;
use cmdc::logging::{init_subscriber, Verbosity};
use cmdc::matcher::PathMatcher;
use cmdc::output::{
    deliver, format_output, hold_clipboard, load_selected, Destination, DeliveryOptions, OutputError,
    OutputFormat, OutputOptions, SystemClipboard,
};
use cmdc::prompt::PromptChooser;
use cmdc::selector::{present, Outcome, Selector};
use cmdc::tokens::Encoding;
use cmdc::tree::format_number;
use cmdc::walker::TraversalMode;
use serde::Serialize;
use tracing::debug;

#[derive(Parser)]
#[command(name = "cmdc")]
#[command(about = "Interactively select files and extract their contents for LLM context")]
#[command(version)]
struct Cli {
    /// Directory to browse
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Output destination: 'console' or a file path
    #[arg(short, long, default_value = "console")]
    output: String,

    /// Only offer files with these extensions (replaces configured filters)
    #[arg(short, long, value_delimiter = ',')]
    filter: Vec<String>,

    /// Extra ignore patterns, appended to the configured ones
    #[arg(short, long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Descend into every subdirectory
    #[arg(short, long, conflicts_with = "no_recursive")]
    recursive: bool,

    /// Only list the top-level directory
    #[arg(long)]
    no_recursive: bool,

    /// Maximum depth to descend (1 = top level only)
    #[arg(short, long, allow_negative_numbers = true)]
    depth: Option<i64>,

    /// Tokenizer model or encoding name (e.g. o200k_base, gpt-4)
    #[arg(long)]
    model: Option<String>,

    /// How file bytes are decoded: utf8 or utf8-lossy
    #[arg(long)]
    text_encoding: Option<TextEncoding>,

    /// Select every matching file without prompting
    #[arg(long)]
    non_interactive: bool,

    /// Emit JSON instead of <open_file> blocks
    #[arg(long)]
    json: bool,

    /// Omit the summary section
    #[arg(long)]
    no_summary: bool,

    /// Create the configuration file interactively and exit
    #[arg(long)]
    init: bool,

    /// Overwrite an existing configuration file with --init
    #[arg(long, requires = "init")]
    force: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    config_show: bool,

    /// Print the active ignore patterns and exit
    #[arg(long)]
    list_ignore: bool,

    /// Persist extra ignore patterns to the configuration file and exit
    #[arg(long, value_delimiter = ',')]
    add_ignore: Vec<String>,

    /// Generate shell completions and exit
    #[arg(long, value_enum)]
    completions: Option<Shell>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Errors only on stderr
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    no_color: bool,

    /// Keep clipboard contents read from stdin alive until replaced
    #[arg(long, hide = true)]
    hold_clipboard: bool,
}

impl Cli {
    fn recursive_override(&self) -> Option<bool> {
        if self.recursive {
            Some(true)
        } else if self.no_recursive {
            Some(false)
        } else {
            None
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet), cli.no_color);
    let json_output = cli.json;

    if let Err(e) = run(cli) {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
                exit_code: i32,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
                exit_code: exit_code(&e),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> Result<(), CmdcError> {
    if cli.hold_clipboard {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        hold_clipboard(&text)?;
        return Ok(());
    }

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "cmdc", &mut io::stdout());
        return Ok(());
    }

    let env: HashMap<String, String> = std::env::vars().collect();
    let config_path = config::default_config_path(&env);
    debug!(path = ?config_path, "config location");

    if cli.init {
        let path = require_config_path(config_path)?;
        let stdin = io::stdin();
        config::init(&path, cli.force, &mut stdin.lock(), &mut io::stderr())?;
        eprintln!("Configuration written to {}", path.display());
        return Ok(());
    }

    if !cli.add_ignore.is_empty() {
        let path = require_config_path(config_path)?;
        let added = config::add_ignore_patterns(&path, &cli.add_ignore)?;
        for pattern in &cli.add_ignore {
            if added.contains(pattern) {
                eprintln!("Added ignore pattern: {}", pattern);
            } else {
                eprintln!("Ignore pattern already present: {}", pattern);
            }
        }
        return Ok(());
    }

    let config = config::load(config_path.as_deref(), &env)?;

    if cli.config_show {
        return run_config_show(&config, config_path, cli.json);
    }

    if cli.list_ignore {
        let mut stdout = io::stdout().lock();
        for pattern in config.ignore_patterns.iter().chain(&cli.ignore) {
            writeln!(stdout, "{}", pattern)?;
        }
        return Ok(());
    }

    run_select(cli, config)
}

fn require_config_path(path: Option<PathBuf>) -> Result<PathBuf, CmdcError> {
    path.ok_or_else(|| {
        CmdcError::InvalidConfig {
            field: "config_path".into(),
            value: String::new(),
            reason: "none of APPDATA, XDG_CONFIG_HOME or HOME is set".into(),
        }
    })
}

fn run_config_show(config: &Config, path: Option<PathBuf>, json: bool) -> Result<(), CmdcError> {
    let rendered = if json {
        serde_json::to_string_pretty(config).map_err(OutputError::from)?
    } else {
        config.to_toml()?
    };

    match path {
        Some(path) if path.exists() => eprintln!("Configuration file: {}", path.display()),
        Some(path) => eprintln!("Configuration file: {} (not created, using defaults)", path.display()),
        None => eprintln!("Configuration file: none"),
    }

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", rendered.trim_end())?;
    Ok(())
}

fn run_select(cli: Cli, config: Config) -> Result<(), CmdcError> {
    let filters = if cli.filter.is_empty() {
        config.filters.clone()
    } else {
        cli.filter.clone()
    };
    let ignore: Vec<&String> = config.ignore_patterns.iter().chain(&cli.ignore).collect();
    let matcher = PathMatcher::new(ignore, filters);

    let mode = TraversalMode::resolve(cli.recursive_override(), cli.depth, &config);
    let encoding = Encoding::resolve(cli.model.as_deref().unwrap_or(&config.tiktoken_model));
    let text_encoding = cli.text_encoding.unwrap_or(config.text_encoding);
    let interrupt = Interrupt::register_signals()?;

    let selector = Selector::new(&cli.directory)
        .mode(mode)
        .matcher(matcher)
        .encoding(encoding)
        .text_encoding(text_encoding)
        .non_interactive(cli.non_interactive)
        .interrupt(interrupt.clone());

    let scan = selector.scan()?;
    present(&scan, &mut io::stderr())?;

    let stdin = io::stdin();
    let mut chooser = PromptChooser::new(stdin.lock(), io::stderr()).with_interrupt(interrupt.clone());
    let result = match selector.select(&scan, &mut chooser)? {
        Outcome::Selected(result) => result,
        Outcome::NoSelection => {
            eprintln!("No files selected.");
            return Ok(());
        }
    };

    let files = load_selected(&scan.root, &result, &scan.tokens, text_encoding);
    if interrupt.is_triggered() {
        return Err(CmdcError::Interrupted);
    }

    let options = OutputOptions {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Xml
        },
        include_summary: !cli.no_summary,
    };
    let text = format_output(Some(&scan.tree), &files, &options)?;

    let delivery_options = DeliveryOptions {
        copy_to_clipboard: config.copy_to_clipboard,
        print_to_console: config.print_to_console,
    };
    let destination = Destination::parse(&cli.output);
    let delivery = deliver(
        &text,
        &destination,
        &delivery_options,
        &mut io::stdout().lock(),
        &mut SystemClipboard::default(),
    )?;

    let summary = format!(
        "{} files, {} tokens",
        result.selected().len(),
        format_number(result.total_tokens())
    );
    if let Some(path) = &delivery.written {
        eprintln!("File contents saved to {} ({})", path.display(), summary);
    } else if delivery.copied {
        eprintln!("Content copied to clipboard ({})", summary);
    } else if delivery_options.copy_to_clipboard {
        eprintln!("Clipboard unavailable, contents printed instead ({})", summary);
    }

    Ok(())
}
