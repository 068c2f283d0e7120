//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// agentpipe - research -> analysis -> review pipeline
#[derive(Parser)]
#[command(
    name = "ap",
    about = "Coordinate research, analysis and review workers with a bounded revision loop",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline on a query and print the resulting record
    Run {
        /// Query for the workers to process
        query: String,

        /// Maximum revision passes (overrides config)
        #[arg(short, long, allow_negative_numbers = true)]
        max_iterations: Option<i32>,

        /// Approval threshold in [0, 1] (overrides config)
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<f64>,

        /// Force deterministic workers
        #[arg(long, conflicts_with = "live")]
        mock: bool,

        /// Force LLM-backed workers
        #[arg(long)]
        live: bool,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Run two canned queries and print summaries
    Demo,

    /// Print the pipeline graph as JSON
    Graph,

    /// Serve the HTTP API
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Command {
    /// Explicit worker mode from `--mock` / `--live`, if either was given
    pub fn mock_override(mock: bool, live: bool) -> Option<bool> {
        debug!(mock, live, "Command::mock_override: called");
        match (mock, live) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentpipe")
        .join("logs")
        .join("agentpipe.log")
}

/// Output format for `run`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "plain" => Ok(Self::Text),
            _ => Err(format!("Unknown format: {}. Use: json or text", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["ap", "run", "What is machine learning?"]);
        match cli.command {
            Command::Run {
                query,
                max_iterations,
                threshold,
                mock,
                live,
                format,
            } => {
                assert_eq!(query, "What is machine learning?");
                assert_eq!(max_iterations, None);
                assert_eq!(threshold, None);
                assert!(!mock && !live);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from([
            "ap", "run", "q", "--max-iterations", "-1", "--threshold", "0.8", "--mock", "--format", "text",
        ]);
        assert!(matches!(
            cli.command,
            Command::Run {
                max_iterations: Some(-1),
                mock: true,
                format: OutputFormat::Text,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_mock_and_live_conflict() {
        assert!(Cli::try_parse_from(["ap", "run", "q", "--mock", "--live"]).is_err());
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::parse_from(["ap", "graph", "-l", "debug", "-c", "/tmp/ap.yml"]);
        assert!(matches!(cli.command, Command::Graph));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ap.yml")));
    }

    #[test]
    fn test_cli_parse_serve() {
        let cli = Cli::parse_from(["ap", "serve", "--port", "9000"]);
        assert!(matches!(
            cli.command,
            Command::Serve {
                host: None,
                port: Some(9000)
            }
        ));
    }

    #[test]
    fn test_mock_override() {
        assert_eq!(Command::mock_override(true, false), Some(true));
        assert_eq!(Command::mock_override(false, true), Some(false));
        assert_eq!(Command::mock_override(false, false), None);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
