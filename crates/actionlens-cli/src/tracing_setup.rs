//! Tracing subscriber setup for the `actionlens` binary.
//!
//! Filter priority: `ACTIONLENS_LOG`, then `RUST_LOG`, then the `-v`/`-q`
//! flags, then `warn`. Logs go to stderr so stdout stays clean for results
//! and `--json` output.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ACTIONLENS_LOG";
const CRATE_TARGETS: [&str; 3] = ["actionlens", "actionlens_engine", "actionlens_contracts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

pub fn init_subscriber(verbosity: Verbosity) {
    let filter = build_env_filter(verbosity);
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true);

    // try_init so a second call (tests, embedding) is a no-op.
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
    if let Err(err) = result {
        eprintln!("actionlens: tracing already initialised: {err}");
    }
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    let directives = filter_directives(
        non_empty_env(LOG_ENV),
        non_empty_env("RUST_LOG"),
        verbosity,
    );
    EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_level().as_str()))
}

/// Picks the first directive string that parses.
fn filter_directives(
    project: Option<String>,
    rust_log: Option<String>,
    verbosity: Verbosity,
) -> String {
    for candidate in [project, rust_log].into_iter().flatten() {
        if EnvFilter::try_new(&candidate).is_ok() {
            return candidate;
        }
    }

    let level = verbosity.default_level();
    if verbosity == Verbosity::Verbose {
        let crates = CRATE_TARGETS
            .iter()
            .map(|target| format!("{target}=debug"))
            .collect::<Vec<String>>()
            .join(",");
        format!("{},{crates}", level.as_str().to_ascii_lowercase())
    } else {
        level.as_str().to_ascii_lowercase()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
