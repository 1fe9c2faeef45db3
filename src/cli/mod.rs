//! CLI argument parsing
//!
//! Defines the command-line interface using clap.

use clap::{Parser, Subcommand};

/// RFC2544 test campaign automation for Spirent TestCenter
#[derive(Parser, Debug)]
#[command(name = "rfc2544-runner")]
#[command(version)]
#[command(about = "Run RFC2544 test campaigns against a TestCenter lab server")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full test campaign
    Run(RunArgs),

    /// Validate the test plan without touching the appliance
    Validate(PlanArgs),

    /// Show a summary of the test plan
    Show(PlanArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON test plan
    #[arg(short, long, default_value = "config.json")]
    pub plan: String,

    /// Root directory for per-test-case results
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// ARP/ND resolution deadline in seconds
    #[arg(long, default_value = "30")]
    pub arp_timeout: u64,

    /// ARP/ND poll interval in seconds
    #[arg(long, default_value = "5")]
    pub arp_interval: u64,

    /// Sequencer deadline in seconds (waits indefinitely when absent)
    #[arg(long)]
    pub sequencer_timeout: Option<u64>,

    /// Pause between test cases in seconds
    #[arg(short, long, default_value = "15")]
    pub delay: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Arguments naming a test plan
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// JSON test plan
    #[arg(short, long, default_value = "config.json")]
    pub plan: String,
}
