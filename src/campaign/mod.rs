//! Campaign orchestration
//!
//! Drives the per-test-case sequence against the appliance: session,
//! configuration load, device addressing, ARP resolution, sequencer
//! run, report generation, and results collection.

mod addressing;
mod arp;
mod error;
mod runner;

pub use arp::{ArpPoller, ArpState};
pub use error::CampaignError;
pub use runner::{CampaignOptions, CampaignReport, CampaignRunner, CaseOutcome};
