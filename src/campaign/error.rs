//! Campaign error model
//!
//! Distinguishes plan (configuration) errors, appliance errors, ARP
//! failures, and secondary cleanup failures instead of folding them
//! into one catch-all path.

use thiserror::Error;

use super::arp::ArpState;
use crate::config::{AddrFamily, PlanError};
use crate::stc::StcError;

/// Errors that abort a campaign
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Invalid or incomplete test plan. Raised before any appliance
    /// contact when detected up front; per-device lookups can also
    /// raise it mid-campaign.
    #[error("test plan error: {0}")]
    Plan(#[from] PlanError),

    /// A remote appliance call failed.
    #[error("appliance error during test case {case}: {source}")]
    Appliance {
        case: usize,
        #[source]
        source: StcError,
    },

    /// ARP/ND did not resolve within the configured deadline. The
    /// chassis has already been disconnected when this is returned.
    #[error("ARP/ND resolution failed in test case {case}: last reported state {state}")]
    ArpFailed { case: usize, state: ArpState },

    /// A device reported no interface to configure.
    #[error("test case {case}: device {device} has no {family} interface at the requested index")]
    MissingInterface {
        case: usize,
        device: String,
        family: AddrFamily,
    },

    /// Local filesystem bookkeeping failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Best-effort cleanup after a failure itself failed; both errors
    /// are surfaced.
    #[error("cleanup failed after campaign error ({original}); cleanup error: {cleanup}")]
    Cleanup {
        original: Box<CampaignError>,
        #[source]
        cleanup: StcError,
    },
}

impl CampaignError {
    /// Wrap an appliance error with its test case number.
    pub fn appliance(case: usize) -> impl Fn(StcError) -> CampaignError {
        move |source| CampaignError::Appliance { case, source }
    }

    /// Whether appliance cleanup already ran (or was attempted) for
    /// this error. ARP failures are cleaned up at the point of
    /// detection, so they must not get a second cleanup pass — even
    /// when that first attempt itself failed.
    pub fn cleanup_attempted(&self) -> bool {
        match self {
            CampaignError::ArpFailed { .. } => true,
            CampaignError::Cleanup { original, .. } => original.cleanup_attempted(),
            _ => false,
        }
    }
}
