//! gq - generation queue diagnostics
//!
//! CLI entry point for inspecting configuration and driving the scheduling
//! core with synthetic load.

use std::fs;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use genqueue::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path};
use genqueue::config::Config;
use genqueue::simulate::{SimulationEvent, SimulationPlan, SimulationReport, run_simulation};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
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
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Simulate {
            images,
            models,
            tasks,
            latency_ms,
            failure_rate,
            format,
        }) => {
            let plan = SimulationPlan {
                images,
                models,
                tasks,
                latency: Duration::from_millis(latency_ms),
                failure_rate,
            };
            cmd_simulate(&config, &plan, format).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            debug!("main: no command, showing help");
            Cli::command().after_help(generate_after_help()).print_help()?;
            Ok(())
        }
    }
}

async fn cmd_simulate(config: &Config, plan: &SimulationPlan, format: OutputFormat) -> Result<()> {
    debug!(?plan, ?format, "cmd_simulate: called");
    if format == OutputFormat::Text {
        println!(
            "Simulating {} image, {} model and {} scheduled generations",
            plan.images, plan.models, plan.tasks
        );
    }

    let report = run_simulation(config, plan, |event| {
        if format == OutputFormat::Text {
            print_event(event);
        }
    })
    .await;

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn print_event(event: &SimulationEvent) {
    let at = format!("{:>6}ms", event.elapsed.as_millis());
    match &event.outcome {
        Ok(uri) => println!("{} {} {:<9} {:<16} {}", at.dimmed(), "ok".green(), event.source, event.id, uri),
        Err(err) => println!("{} {} {:<9} {:<16} {}", at.dimmed(), "err".red(), event.source, event.id, err),
    }
}

fn print_report(report: &SimulationReport) {
    println!();
    println!(
        "{} {} succeeded, {} failed in {:.2}s",
        "Done:".bold(),
        report.succeeded.to_string().green(),
        report.failed.to_string().red(),
        report.elapsed.as_secs_f64()
    );
    for (name, lane) in [("image", &report.queue.image), ("model", &report.queue.model)] {
        println!(
            "  {:<9} limit {}  peak active {}  peak queued {}  avg wait {}ms",
            name,
            lane.limit,
            lane.stats.peak_active,
            lane.stats.peak_queue_depth,
            average(lane.stats.total_wait_time_ms, lane.stats.total_enqueued)
        );
    }
    let stats = &report.scheduler.stats;
    println!(
        "  {:<9} limit {}  peak active {}  peak queued {}  avg wait {}ms",
        "scheduler",
        report.scheduler.max_concurrent,
        stats.peak_concurrent,
        stats.peak_queue_depth,
        average(stats.total_wait_time_ms, stats.total_scheduled)
    );
}

fn average(total: u64, count: u64) -> u64 {
    if count == 0 { 0 } else { total / count }
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", config.to_yaml()?);
    Ok(())
}
