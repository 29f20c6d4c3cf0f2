//! admitq - sliding-window admission gate
//!
//! CLI entry point for demonstrating and probing the gateway.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info};

use admitq::cli::{Cli, Command};
use admitq::config::Config;
use admitq::gateway::{Gateway, GatewayError};
use admitq::limiter::{Admission, SlidingWindowLimiter};
use admitq::processor::EchoHandler;

fn parse_level(s: &str) -> Option<tracing::Level> {
    match s.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("admitq")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("admitq.log")).context("Failed to create log file")?;

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
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Demo {
            requests,
            delay_ms,
            fail_every,
            timeout_ms,
        } => cmd_demo(&config, requests, delay_ms, fail_every, timeout_ms).await,
        Command::Probe { arrivals, interval_ms } => cmd_probe(&config, arrivals, interval_ms),
        Command::Config => cmd_config(&config),
    }
}

/// Submit a burst through a real gateway and report what happened to each request
async fn cmd_demo(config: &Config, requests: usize, delay_ms: u64, fail_every: u64, timeout_ms: Option<u64>) -> Result<()> {
    debug!(requests, delay_ms, fail_every, ?timeout_ms, "cmd_demo: called");
    let handler = Arc::new(EchoHandler::new(Duration::from_millis(delay_ms)).with_fail_every(fail_every));
    let gateway = Gateway::start(config, handler)?;

    println!(
        "Limiter: {} request(s) per {:?}, queue capacity {}",
        config.limiter.max_requests,
        config.limiter.window(),
        config.queue.capacity
    );

    let mut pending = Vec::new();
    for n in 1..=requests {
        match gateway.submit(serde_json::json!(format!("request-{}", n))) {
            Ok(submission) => {
                println!(
                    "{} #{} {} (queue position {})",
                    "admitted".green(),
                    n,
                    submission.id().short(),
                    submission.position()
                );
                pending.push((n, submission));
            }
            Err(GatewayError::RateLimitExceeded { retry_after }) => {
                println!("{} #{} retry after {:.1}s", "rejected".yellow(), n, retry_after.as_secs_f64());
            }
            Err(e) => {
                println!("{} #{} {}", "refused".red(), n, e);
            }
        }
    }

    let timeout = timeout_ms.map(Duration::from_millis).or_else(|| gateway.wait_timeout());
    for (n, submission) in pending {
        match submission.wait(timeout).await {
            Ok(response) if response.success => {
                println!("{} #{} {}", "ok".green(), n, response.message);
            }
            Ok(response) => {
                println!("{} #{} {}", "failed".red(), n, response.message);
            }
            Err(e) => {
                println!("{} #{} {}", "error".red(), n, e);
            }
        }
    }

    let report = gateway.shutdown().await?;
    let m = &report.metrics;
    println!(
        "\nadmitted {}  rejected {}  processed {}  failed {}  drained {}  abandoned {}",
        m.admitted, m.rejected, m.processed, m.failed, m.drained, m.abandoned
    );
    Ok(())
}

/// Run the limiter against evenly spaced simulated arrivals (no real waiting)
fn cmd_probe(config: &Config, arrivals: usize, interval_ms: u64) -> Result<()> {
    debug!(arrivals, interval_ms, "cmd_probe: called");
    let limiter = SlidingWindowLimiter::new(config.limiter.clone());
    let interval = Duration::from_millis(interval_ms);
    let start = Instant::now();

    let mut admitted = 0;
    for i in 0..arrivals {
        let offset = interval * i as u32;
        let at = format!("t={:>7.3}s", offset.as_secs_f64());
        match limiter.check_at(start + offset) {
            Admission::Admitted => {
                admitted += 1;
                println!("{} {}", at, "admit".green());
            }
            Admission::Rejected { retry_after } => {
                println!("{} {} (retry after {:.3}s)", at, "reject".yellow(), retry_after.as_secs_f64());
            }
        }
    }

    println!("\n{} of {} admitted", admitted, arrivals);
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", config.to_yaml()?);
    Ok(())
}
