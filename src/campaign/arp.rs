//! ARP/ND resolution polling
//!
//! The appliance reports resolution progress through the `ArpNdState`
//! result of `ArpNdStartOnAllDevicesCommand`. Resolution is polled on a
//! fixed interval until it succeeds, fails, or the deadline passes.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::stc::{StcApi, StcError};

const ARP_COMMAND: &str = "ArpNdStartOnAllDevicesCommand";

/// Reported ARP/ND resolution state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArpState {
    Successful,
    Started,
    Failed,
    None,
    Other(String),
}

impl ArpState {
    pub fn parse(s: &str) -> Self {
        match s {
            "SUCCESSFUL" => ArpState::Successful,
            "STARTED" => ArpState::Started,
            "FAILED" => ArpState::Failed,
            "NONE" | "" => ArpState::None,
            other => ArpState::Other(other.to_string()),
        }
    }

    /// Whether further polling can still change the outcome.
    pub fn is_pending(&self) -> bool {
        !matches!(self, ArpState::Successful | ArpState::Failed)
    }
}

impl fmt::Display for ArpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArpState::Successful => write!(f, "SUCCESSFUL"),
            ArpState::Started => write!(f, "STARTED"),
            ArpState::Failed => write!(f, "FAILED"),
            ArpState::None => write!(f, "NONE"),
            ArpState::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Bounded poller for ARP/ND resolution
#[derive(Clone, Copy, Debug)]
pub struct ArpPoller {
    interval: Duration,
    timeout: Duration,
}

impl ArpPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Start ARP/ND on all devices and poll until it resolves, fails,
    /// or the deadline passes. Returns the final reported state.
    pub async fn run<C: StcApi>(&self, stc: &C) -> Result<ArpState, StcError> {
        info!("starting ARP/ND on all devices");
        let result = stc.perform(ARP_COMMAND, &[]).await?;
        let mut state = ArpState::parse(result.get("ArpNdState").map(String::as_str).unwrap_or(""));

        let started = tokio::time::Instant::now();

        while state.is_pending() && started.elapsed() < self.timeout {
            debug!("ARP/ND state {state}, polling again in {:?}", self.interval);
            tokio::time::sleep(self.interval).await;

            let result = stc.perform(ARP_COMMAND, &[]).await?;
            state = ArpState::parse(result.get("ArpNdState").map(String::as_str).unwrap_or(""));
        }

        info!("ARP/ND final state: {state}");
        Ok(state)
    }
}
