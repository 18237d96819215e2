//! Tracing subscriber setup for the cmdc binary.
//!
//! Logs go to stderr so they never mix with formatted output on stdout.
//! Filter priority, highest first: `CMDC_LOG`, `RUST_LOG`, the `-v`/`-q`
//! flags, then `warn`.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "CMDC_LOG";

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `--quiet`: errors only.
    Quiet,
    #[default]
    Normal,
    /// `--verbose`: debug output from cmdc.
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are given.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Pick the filter directives. Unparseable env values fall through.
fn build_env_filter(verbosity: Verbosity, cmdc_log: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    for directives in [cmdc_log, rust_log].into_iter().flatten() {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }

    let level = verbosity.default_level().as_str().to_ascii_lowercase();
    let directive = if verbosity == Verbosity::Verbose {
        format!("warn,cmdc={}", level)
    } else {
        level.clone()
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_subscriber(verbosity: Verbosity, no_color: bool) {
    let filter = build_env_filter(
        verbosity,
        std::env::var(LOG_ENV_VAR).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    );

    let use_ansi = !no_color && std::io::IsTerminal::is_terminal(&std::io::stderr());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(verbosity == Verbosity::Verbose);

    let result = if verbosity == Verbosity::Verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_timer(fmt::time::uptime()))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.without_time().compact())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
    }

    #[test]
    fn test_default_levels() {
        assert_eq!(Verbosity::Quiet.default_level(), Level::ERROR);
        assert_eq!(Verbosity::Normal.default_level(), Level::WARN);
        assert_eq!(Verbosity::Verbose.default_level(), Level::DEBUG);
    }

    #[test]
    fn test_filter_priority() {
        let rendered = |f: EnvFilter| f.to_string().to_lowercase();

        let filter = build_env_filter(Verbosity::Quiet, Some("cmdc=trace"), Some("info"));
        assert_eq!(rendered(filter), "cmdc=trace");

        let filter = build_env_filter(Verbosity::Quiet, None, Some("info"));
        assert_eq!(rendered(filter), "info");

        let filter = build_env_filter(Verbosity::Quiet, None, None);
        assert_eq!(rendered(filter), "error");
    }

    #[test]
    fn test_verbose_targets_cmdc() {
        let filter = build_env_filter(Verbosity::Verbose, None, None);
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("cmdc=debug"));
        assert!(rendered.contains("warn"));
    }
}
