//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// admitq - sliding-window admission gate with a FIFO request queue
#[derive(Parser)]
#[command(
    name = "aq",
    about = "Sliding-window admission gate with a FIFO request queue",
    version
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
    /// Submit a burst of requests through a gateway and print the outcomes
    Demo {
        /// Number of requests to submit
        #[arg(short = 'n', long, default_value = "5")]
        requests: usize,

        /// Simulated processing time per request
        #[arg(long, default_value = "100")]
        delay_ms: u64,

        /// Make every K-th request fail (0 = never)
        #[arg(long, default_value = "0")]
        fail_every: u64,

        /// How long to wait for each response (defaults to gateway.wait-timeout-ms)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Feed a simulated arrival pattern to the limiter alone
    Probe {
        /// Number of arrivals
        #[arg(short = 'n', long, default_value = "10")]
        arrivals: usize,

        /// Simulated gap between arrivals
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Print the effective configuration
    Config,
}
