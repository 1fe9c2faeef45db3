//! Test plan configuration
//!
//! Loads and validates the JSON test plan that drives a campaign.

mod plan;

pub use plan::{
    AddrFamily, DeviceAddressConfig, DeviceConfigKey, Ipv6IfSelection, PlanError, TestCaseSpec,
    TestPlan,
};
