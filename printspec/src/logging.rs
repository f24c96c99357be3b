//! Logging to stderr through `tracing`.
//!
//! Stdout is reserved for print jobs, so every format writes to stderr.

use std::io;
use std::str::FromStr;

use tracing::dispatcher::{self, Dispatch};
use tracing_log::AsLog as _;
use tracing_subscriber::EnvFilter;

/// Log output format, picked with `PRINTSPEC_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event with timestamp and target.
    #[default]
    Compact,
    /// Level and message only, for scripts capturing stderr.
    Bare,
    /// Multi-line events for local debugging.
    Pretty,
    /// Newline-delimited JSON for log collectors.
    Json,
}

impl LogFormat {
    /// Installs the global subscriber for this format.
    pub fn init(self, env_filter: EnvFilter) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr);
        let dispatch: Dispatch = match self {
            Self::Compact => builder.compact().finish().into(),
            Self::Bare => builder
                .compact()
                .without_time()
                .with_target(false)
                .with_ansi(false)
                .finish()
                .into(),
            Self::Pretty => builder.pretty().finish().into(),
            Self::Json => builder.json().finish().into(),
        };
        // `SubscriberInitExt::init` would install a second `LogTracer`
        dispatcher::set_global_default(dispatch).expect("failed to set global default subscriber");
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "bare" => Ok(Self::Bare),
            "pretty" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: compact, bare, pretty or json"
            )),
        }
    }
}

/// Initializes the global tracing subscriber for the given filter and format.
///
/// Records of crates logging through `log` are forwarded up to the most
/// verbose level the filter lets through.
pub fn init_tracing(filter: &str, format: Option<String>) {
    let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid filter string '{filter}', falling back to debug");
        EnvFilter::new("debug")
    });

    let log_format = format
        .and_then(|s| {
            s.parse::<LogFormat>()
                .inspect_err(|e| eprintln!("Warning: {e}, using {:?}", LogFormat::default()))
                .ok()
        })
        .unwrap_or_default();

    let mut bridge = tracing_log::LogTracer::builder();
    if let Some(max_level) = env_filter.max_level_hint() {
        bridge = bridge.with_max_level(max_level.as_log());
    }
    bridge
        .init()
        .expect("failed to initialize log -> tracing bridge: LogTracer already set");

    log_format.init(env_filter);
}

/// Mirrors the `printspec` level onto `printspec_core` unless the latter is set.
#[must_use]
pub fn ensure_core_log_level_matches(env_filter: Option<String>) -> String {
    const CLI: &str = "printspec=";
    const CORE: &str = "printspec_core=";
    match env_filter {
        Some(rust_log) if rust_log.contains(CLI) && !rust_log.contains(CORE) => {
            match rust_log.split(',').find_map(|s| s.strip_prefix(CLI)) {
                Some(level) => format!("{rust_log},{CORE}{level}"),
                None => rust_log,
            }
        }
        Some(rust_log) => rust_log,
        None => format!("{CLI}info,{CORE}info"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, "printspec=info,printspec_core=info")]
    #[case(Some("printspec=debug"), "printspec=debug,printspec_core=debug")]
    #[case(Some("warn,printspec=trace"), "warn,printspec=trace,printspec_core=trace")]
    #[case(
        Some("printspec=debug,printspec_core=warn"),
        "printspec=debug,printspec_core=warn"
    )]
    #[case(Some("debug"), "debug")]
    fn core_level_follows_cli(#[case] rust_log: Option<&str>, #[case] expected: &str) {
        assert_eq!(
            ensure_core_log_level_matches(rust_log.map(ToString::to_string)),
            expected
        );
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSONL", LogFormat::Json)]
    #[case("Pretty", LogFormat::Pretty)]
    #[case("bare", LogFormat::Bare)]
    #[case("compact", LogFormat::Compact)]
    fn format_names(#[case] name: &str, #[case] expected: LogFormat) {
        assert_eq!(name.parse::<LogFormat>(), Ok(expected));
    }

    #[test]
    fn unknown_format() {
        assert!("fancy".parse::<LogFormat>().is_err());
        assert!("full".parse::<LogFormat>().is_err());
    }
}
