//! Configuration module for the feed processor

use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::error::{PitchError, Result};
use crate::parser::Symbol;
use crate::report::ReportFormat;

const DEFAULT_DEPTH_LEVELS: usize = 10;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Feed file to read; `None` reads stdin
    pub input: Option<PathBuf>,

    /// Report encoding
    pub report_format: ReportFormat,

    /// Report destination; `None` writes to stdout
    pub report_path: Option<PathBuf>,

    /// Print every decoded message to stdout
    pub print_messages: bool,

    /// Truncated tail is an error rather than end of stream
    pub strict_framing: bool,

    /// Symbols to include in the report; empty means all
    pub symbols: Vec<Symbol>,

    /// Price levels per side in book snapshots
    pub depth_levels: usize,

    /// Prometheus text exposition written here at end of run
    pub metrics_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let input = env::var("PITCH_INPUT")
            .ok()
            .filter(|path| !path.is_empty() && path != "-")
            .map(PathBuf::from);

        let report_format = env::var("REPORT_FORMAT")
            .map(|format| format.parse::<ReportFormat>())
            .unwrap_or(Ok(ReportFormat::Text))?;

        let symbols = parse_symbols(&env::var("SYMBOLS").unwrap_or_default());

        Ok(Self {
            input,
            report_format,
            report_path: env::var("REPORT_PATH").ok().map(PathBuf::from),
            print_messages: parse_flag("PRINT_MESSAGES")?,
            strict_framing: parse_flag("STRICT_FRAMING")?,
            symbols,
            depth_levels: parse_depth(env::var("DEPTH_LEVELS").ok().as_deref())?,
            metrics_path: env::var("METRICS_PATH").ok().map(PathBuf::from),
        })
    }

    /// Override the input from a positional command-line argument
    pub fn with_input_arg(mut self, arg: Option<String>) -> Self {
        match arg.as_deref() {
            Some("-") => self.input = None,
            Some(path) => self.input = Some(PathBuf::from(path)),
            None => {}
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            report_format: ReportFormat::Text,
            report_path: None,
            print_messages: false,
            strict_framing: false,
            symbols: Vec::new(),
            depth_levels: DEFAULT_DEPTH_LEVELS,
            metrics_path: None,
        }
    }
}

/// Log filter from `RUST_LOG`-style directives, defaulting to `info`
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Comma-separated symbols; PITCH symbols are case-sensitive, so no folding
fn parse_symbols(raw: &str) -> Vec<Symbol> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Symbol::from)
        .collect()
}

fn parse_depth(raw: Option<&str>) -> Result<usize> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_DEPTH_LEVELS),
        Some(value) => value.parse().map_err(|_| {
            PitchError::ConfigError(format!(
                "DEPTH_LEVELS must be a non-negative integer, got {value:?}"
            ))
        }),
    }
}

fn parse_flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Err(_) => Ok(false),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            other => Err(PitchError::ConfigError(format!(
                "{name} must be a boolean, got {other:?}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reads_stdin() {
        let config = Config::default();
        assert!(config.input.is_none());
        assert_eq!(config.report_format, ReportFormat::Text);
        assert!(!config.strict_framing);
    }

    #[test]
    fn test_input_argument_override() {
        let config = Config::default().with_input_arg(Some("feed.bin".to_string()));
        assert_eq!(config.input, Some(PathBuf::from("feed.bin")));

        let config = config.with_input_arg(Some("-".to_string()));
        assert!(config.input.is_none());

        let config = config.with_input_arg(None);
        assert!(config.input.is_none());
    }

    #[test]
    fn test_symbols_keep_their_case() {
        let symbols = parse_symbols(" PGm, AAPL ,,ZVZZT");
        assert_eq!(
            symbols,
            vec![Symbol::from("PGm"), Symbol::from("AAPL"), Symbol::from("ZVZZT")]
        );
        assert_ne!(symbols[0], Symbol::from("PGM"));
        assert!(parse_symbols("").is_empty());
    }

    #[test]
    fn test_depth_levels_parsing() {
        assert_eq!(parse_depth(None).unwrap(), 10);
        assert_eq!(parse_depth(Some("")).unwrap(), 10);
        assert_eq!(parse_depth(Some(" 25 ")).unwrap(), 25);
        assert!(matches!(
            parse_depth(Some("abc")),
            Err(PitchError::ConfigError(_))
        ));
        assert!(parse_depth(Some("-3")).is_err());
    }

    #[test]
    fn test_log_filter_honors_directives() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some(" ")).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            log_filter(Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter(Some("pitch_book=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
    }

    #[test]
    fn test_parse_flag_unset_is_false() {
        assert!(!parse_flag("PITCH_BOOK_TEST_FLAG_THAT_IS_NEVER_SET").unwrap());
    }
}
