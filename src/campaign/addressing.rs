//! Per-device address configuration
//!
//! Walks the loaded project's ports and their affiliated devices,
//! looks up each device's addressing in the test plan, and pushes it
//! onto the device's IPv4/IPv6 interface object.

use tracing::{debug, info};

use super::error::CampaignError;
use crate::config::{AddrFamily, DeviceConfigKey, Ipv6IfSelection, TestPlan};
use crate::stc::StcApi;

const PROJECT: &str = "system1.project";
const ADDRESS_ATTRS: [&str; 3] = ["Address", "Gateway", "PrefixLength"];

/// Configure IPv4 addressing on every device of every project port.
///
/// The device's single `Ipv4If` child is configured; plan lookup uses
/// the 1-based discovery index of the device on its port.
pub async fn configure_ipv4<C: StcApi>(
    stc: &C,
    plan: &TestPlan,
    case: usize,
) -> Result<(), CampaignError> {
    let app = CampaignError::appliance(case);

    let ports = stc.get(PROJECT, "children-port").await.map_err(&app)?;
    for port in ports.split_whitespace() {
        let location = stc.get(port, "Location").await.map_err(&app)?;
        info!("configuring IPv4 devices on port {port} ({location})");

        let devices = stc
            .get(port, "AffiliationPort-Sources")
            .await
            .map_err(&app)?;
        for (i, device) in devices.split_whitespace().enumerate() {
            let key = DeviceConfigKey::new(port, i + 1, AddrFamily::Ipv4);
            info!("configuring {key}");
            let addressing = plan.device_config(&key)?;

            let ipv4_if = stc.get(device, "children-Ipv4If").await.map_err(&app)?;
            let ipv4_if = ipv4_if.split_whitespace().next().ok_or_else(|| {
                CampaignError::MissingInterface {
                    case,
                    device: device.to_string(),
                    family: AddrFamily::Ipv4,
                }
            })?;

            let before = stc.get_many(ipv4_if, &ADDRESS_ATTRS).await.map_err(&app)?;
            debug!("pre-configuration {key}: {before:?}");

            stc.config(
                ipv4_if,
                &[
                    ("Address", addressing.address.as_str()),
                    ("Gateway", addressing.gateway.as_str()),
                    ("PrefixLength", addressing.prefix.as_str()),
                ],
            )
            .await
            .map_err(&app)?;

            let after = stc.get_many(ipv4_if, &ADDRESS_ATTRS).await.map_err(&app)?;
            debug!("post-configuration {key}: {after:?}");
        }
    }

    Ok(())
}

/// Configure IPv6 addressing on every device of every project port.
///
/// Devices carry a list of `Ipv6If` children (typically link-local plus
/// global); which one is configured is selected by the plan's
/// `ipv6_interface` option.
pub async fn configure_ipv6<C: StcApi>(
    stc: &C,
    plan: &TestPlan,
    case: usize,
) -> Result<(), CampaignError> {
    let app = CampaignError::appliance(case);

    let ports = stc.get(PROJECT, "children-port").await.map_err(&app)?;
    for port in ports.split_whitespace() {
        let location = stc.get(port, "Location").await.map_err(&app)?;
        info!("configuring IPv6 devices on port {port} ({location})");

        let devices = stc
            .get(port, "AffiliationPort-Sources")
            .await
            .map_err(&app)?;
        for (i, device) in devices.split_whitespace().enumerate() {
            let key = DeviceConfigKey::new(port, i + 1, AddrFamily::Ipv6);
            info!("configuring {key}");
            let addressing = plan.device_config(&key)?;

            let ipv6_ifs = stc.get(device, "children-Ipv6If").await.map_err(&app)?;
            let handles: Vec<&str> = ipv6_ifs.split_whitespace().collect();
            let ipv6_if = match plan.ipv6_interface {
                Ipv6IfSelection::First => handles.first(),
                Ipv6IfSelection::Indexed => handles.get(i),
            }
            .copied()
            .ok_or_else(|| CampaignError::MissingInterface {
                case,
                device: device.to_string(),
                family: AddrFamily::Ipv6,
            })?;

            let before = stc.get_many(ipv6_if, &ADDRESS_ATTRS).await.map_err(&app)?;
            debug!("pre-configuration {key}: {before:?}");

            stc.config(
                ipv6_if,
                &[
                    ("Address", addressing.address.as_str()),
                    ("Gateway", addressing.gateway.as_str()),
                    ("PrefixLength", addressing.prefix.as_str()),
                ],
            )
            .await
            .map_err(&app)?;

            let after = stc.get_many(ipv6_if, &ADDRESS_ATTRS).await.map_err(&app)?;
            debug!("post-configuration {key}: {after:?}");
        }
    }

    Ok(())
}
