//! rfc2544-runner - RFC2544 campaign automation for Spirent TestCenter
//!
//! Drives an RFC2544-style throughput/latency test campaign against a
//! TestCenter lab server over its REST automation API: loads a JSON
//! test plan, pushes per-port IPv4/IPv6 device addressing onto
//! pre-built TCC configurations, resolves ARP/ND, runs the device-side
//! command sequencer, and harvests a results report per test case.
//!
//! ## Usage
//!
//! ```bash
//! # Run the campaign described by config.json
//! rfc2544-runner run --plan config.json
//!
//! # Validate a plan without touching the appliance
//! rfc2544-runner validate --plan config.json
//!
//! # Show the plan's test cases
//! rfc2544-runner show --plan config.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

mod campaign;
mod cli;
mod config;
mod results;
mod stc;
mod utils;

use campaign::{CampaignOptions, CampaignRunner};
use cli::Args;
use config::TestPlan;
use stc::StcRestClient;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_logger(args.verbose);

    match args.command {
        cli::Command::Run(run_args) => run_campaign(run_args).await?,
        cli::Command::Validate(plan_args) => validate_plan(plan_args)?,
        cli::Command::Show(plan_args) => show_plan(plan_args)?,
    }

    Ok(())
}

async fn run_campaign(args: cli::RunArgs) -> Result<()> {
    let plan = TestPlan::load(&args.plan)?;
    plan.validate()?;

    let options = CampaignOptions {
        output_root: PathBuf::from(&args.output_dir),
        arp_interval: Duration::from_secs(args.arp_interval),
        arp_timeout: Duration::from_secs(args.arp_timeout),
        sequencer_timeout: args.sequencer_timeout.map(Duration::from_secs),
        inter_case_delay: Duration::from_secs(args.delay),
    };

    info!(
        "starting campaign: {} test case(s) against {}",
        plan.tcc_files.len(),
        plan.labserver
    );

    let mut client = StcRestClient::new(args.timeout)?;
    let runner = CampaignRunner::new(plan, options);
    let report = runner.run(&mut client).await?;

    println!("\nCampaign complete: {} test case(s)\n", report.cases.len());
    for case in &report.cases {
        println!(
            "  ✓ Test Case {}: {:24} {:>8}ms  {}",
            case.number,
            case.test_name,
            case.duration_ms,
            case.output_dir.display()
        );
    }
    println!();

    Ok(())
}

fn validate_plan(args: cli::PlanArgs) -> Result<()> {
    match TestPlan::load(&args.plan).and_then(|p| p.validate().map(|()| p)) {
        Ok(plan) => {
            println!("✓ Test plan is valid: {}", args.plan);
            println!(
                "  {} test case(s), lab server {}",
                plan.tcc_files.len(),
                plan.labserver
            );
            Ok(())
        }
        Err(e) => {
            println!("✗ Test plan is invalid: {}", args.plan);
            println!("  Error: {e}");
            Err(e).context("plan validation failed")
        }
    }
}

fn show_plan(args: cli::PlanArgs) -> Result<()> {
    let plan = TestPlan::load(&args.plan)?;

    println!("\nTest Plan: {}", args.plan);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Lab server: {}", plan.labserver);
    println!("  Session:    {} (user {})", plan.session_name, plan.user_name);
    println!(
        "  Addressing: IPv4 {} / IPv6 {}",
        if plan.ipv4_enabled() { "on" } else { "off" },
        if plan.ipv6_enabled() { "on" } else { "off" }
    );
    println!("\n  Test cases:");
    for case in plan.test_cases() {
        println!(
            "  {:2}. {:24} {} -> {}",
            case.number, case.test_name, case.tcc_file, case.report_name
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    Ok(())
}
