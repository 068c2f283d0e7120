//! agentpipe - research -> analysis -> review pipeline
//!
//! CLI entry point for running the pipeline, printing its graph and serving
//! the HTTP API.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};
use tracing_subscriber::fmt::format::FmtSpan;

use agentpipe::api;
use agentpipe::cli::{Cli, Command, OutputFormat, get_log_path};
use agentpipe::config::{Config, PipelineConfig};
use agentpipe::coordinator::{Coordinator, CoordinatorConfig, PipelineGraph};
use agentpipe::domain::{Approval, TaskRecord, TaskStatus};
use agentpipe::worker::Source;

const DEMO_QUERIES: [&str; 2] = [
    "What are the latest advances in AI safety?",
    "How does quantum computing work?",
];

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            query,
            max_iterations,
            threshold,
            mock,
            live,
            format,
        } => {
            let pipeline = PipelineConfig {
                mock: Command::mock_override(mock, live).or(config.pipeline.mock),
                max_iterations: max_iterations.unwrap_or(config.pipeline.max_iterations),
                approval_threshold: threshold.unwrap_or(config.pipeline.approval_threshold),
            };
            cmd_run(&config, &pipeline, &query, format).await
        }
        Command::Demo => cmd_demo(&config).await,
        Command::Graph => cmd_graph(&config),
        Command::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_serve(config).await
        }
    }
}

/// Run one query and print the record
async fn cmd_run(config: &Config, pipeline: &PipelineConfig, query: &str, format: OutputFormat) -> Result<()> {
    debug!(?pipeline, %format, "cmd_run: called");
    let source = Source::resolve(pipeline, &config.llm).context("Failed to create LLM client")?;
    let coordinator = Coordinator::new(pipeline, source).context("Invalid pipeline configuration")?;

    let record = coordinator.run(query).await;
    match format {
        OutputFormat::Json => println!("{}", record.to_json_pretty()?),
        OutputFormat::Text => print_summary(&record, None),
    }

    if record.status() == TaskStatus::Failed {
        let message = record.error().map(|e| e.message.as_str()).unwrap_or("unknown error");
        return Err(eyre!("Run {} failed: {}", record.id(), message));
    }
    Ok(())
}

/// Run the canned demo queries
async fn cmd_demo(config: &Config) -> Result<()> {
    debug!("cmd_demo: called");
    let source = Source::resolve(&config.pipeline, &config.llm).context("Failed to create LLM client")?;
    let coordinator = Coordinator::new(&config.pipeline, source).context("Invalid pipeline configuration")?;

    let rule = "=".repeat(60);
    println!("{}", rule);
    println!("{}", "agentpipe - Demo".bold());
    println!("{}", rule);
    for query in DEMO_QUERIES {
        let record = coordinator.run(query).await;
        println!();
        print_summary(&record, Some(200));
    }
    println!();
    println!("{}", rule);
    Ok(())
}

/// Print the pipeline graph for the configured policy
fn cmd_graph(config: &Config) -> Result<()> {
    debug!("cmd_graph: called");
    let policy = CoordinatorConfig::try_from(&config.pipeline).context("Invalid pipeline configuration")?;
    let graph = PipelineGraph::new(&policy);
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

async fn cmd_serve(config: Config) -> Result<()> {
    debug!(addr = %config.server.bind_addr(), "cmd_serve: called");
    println!("Serving on http://{}", config.server.bind_addr());
    api::serve(config).await
}

/// Colored human-readable summary of a record
fn print_summary(record: &TaskRecord, output_limit: Option<usize>) {
    let status = match record.status() {
        TaskStatus::Complete => record.status().to_string().green(),
        TaskStatus::Failed => record.status().to_string().red(),
        _ => record.status().to_string().yellow(),
    };

    println!("{} {}", "Query:".bold(), record.query());
    println!("{}", "-".repeat(40));
    println!("Status:     {}", status);
    if record.approval() == Some(Approval::ForcedAtCap) {
        println!("Approval:   {}", "forced at iteration cap".yellow());
    }
    println!("Iterations: {}", record.iteration_count());
    println!("History:    {} entries", record.history().len());
    if let Some(score) = record.quality_score() {
        println!("Score:      {:.2}", score);
    }
    for entry in record.history() {
        let marker = if entry.fallback.is_some() { " (fallback)".dimmed().to_string() } else { String::new() };
        println!("  [{}] {}{}", entry.stage.to_string().cyan(), entry.summary, marker);
    }
    if let Some(error) = record.error() {
        println!("Error:      {}", error.message.red());
    }
    if let Some(output) = record.final_output() {
        let shown: String = match output_limit {
            Some(limit) if output.chars().count() > limit => {
                format!("{}...", output.chars().take(limit).collect::<String>())
            }
            _ => output.to_string(),
        };
        println!("Output:\n{}", shown);
    }
}
