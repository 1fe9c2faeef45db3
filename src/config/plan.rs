//! Test plan model
//!
//! The plan is a single JSON document (`config.json` by convention).
//! Campaign-level keys are fixed; per-device addressing entries use the
//! external key scheme `<port>device<N><family>config` (1-based device
//! index), which is derived here from a structured [`DeviceConfigKey`]
//! rather than ad hoc string concatenation at the call sites.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or interrogating the test plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read test plan {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse test plan {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("test plan lists no TCC configuration files")]
    NoTestCases,

    #[error("test plan has no lab server address")]
    NoLabServer,

    #[error("test plan field {field} has {actual} entries, expected {expected} (one per TCC configuration file)")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("missing device configuration {key} in test plan")]
    MissingDeviceConfig { key: DeviceConfigKey },

    #[error("invalid device configuration {key}: {source}")]
    InvalidDeviceConfig {
        key: DeviceConfigKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Address family of a per-device configuration entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrFamily {
    Ipv4,
    Ipv6,
}

impl AddrFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddrFamily::Ipv4 => "ipv4",
            AddrFamily::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured key addressing one per-device configuration entry.
///
/// Renders to the external plan key, e.g. `port1device1ipv4config` for
/// the first device discovered on `port1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfigKey {
    /// Port handle as reported by the appliance
    pub port: String,
    /// 1-based device index in discovery order
    pub device: usize,
    /// Address family
    pub family: AddrFamily,
}

impl DeviceConfigKey {
    pub fn new(port: impl Into<String>, device: usize, family: AddrFamily) -> Self {
        Self {
            port: port.into(),
            device,
            family,
        }
    }
}

impl fmt::Display for DeviceConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}device{}{}config", self.port, self.device, self.family)
    }
}

/// Addressing pushed onto one device interface
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DeviceAddressConfig {
    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "Gateway")]
    pub gateway: String,

    /// Prefix length; hand-written plans carry this as a string or a
    /// bare number, both are accepted
    #[serde(rename = "Prefix", deserialize_with = "string_or_number")]
    pub prefix: String,
}

/// Which IPv6 interface of a device receives the addressing.
///
/// The appliance reports a device's IPv6 interfaces as a handle list;
/// historically the first handle was always configured, regardless of
/// the device index used on the IPv4 path. Both behaviors are kept and
/// selected by the optional `ipv6_interface` plan key.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Ipv6IfSelection {
    /// Always configure the first discovered interface (historical default)
    #[default]
    First,
    /// Configure the interface matching the device's discovery index
    Indexed,
}

/// One test case drawn from the plan's parallel lists
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCaseSpec {
    /// 1-based test case number
    pub number: usize,
    /// TCC configuration database to load
    pub tcc_file: String,
    /// Display name pushed onto the loaded test
    pub test_name: String,
    /// Results report template
    pub template_name: String,
    /// Results report file name
    pub report_name: String,
}

/// The JSON test plan driving a campaign
#[derive(Clone, Debug, Deserialize)]
pub struct TestPlan {
    /// TCC configuration files, one per test case
    #[serde(rename = "tcc_configurationfile")]
    pub tcc_files: Vec<String>,

    /// Lab server address
    #[serde(default)]
    pub labserver: String,

    #[serde(rename = "TestName", default)]
    pub test_names: Vec<String>,

    #[serde(rename = "TemplateName", default)]
    pub template_names: Vec<String>,

    #[serde(rename = "ReportName", default)]
    pub report_names: Vec<String>,

    /// IPv4 addressing flag; only the exact string `"True"` enables it
    #[serde(default)]
    pub ipv4: String,

    /// IPv6 addressing flag; same exact-match semantics as `ipv4`
    #[serde(default)]
    pub ipv6: String,

    /// Appliance session name
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Appliance user name
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// IPv6 interface selection mode
    #[serde(default)]
    pub ipv6_interface: Ipv6IfSelection,

    /// Per-device addressing entries and any other free-form keys
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

fn default_session_name() -> String {
    "rfc2544".to_string()
}

fn default_user_name() -> String {
    "automation".to_string()
}

impl TestPlan {
    /// Load a plan from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| PlanError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validate campaign-level invariants before any appliance contact.
    ///
    /// The three report lists are indexed by test case, so each must
    /// match the TCC file list in length.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.tcc_files.is_empty() {
            return Err(PlanError::NoTestCases);
        }
        if self.labserver.trim().is_empty() {
            return Err(PlanError::NoLabServer);
        }

        let expected = self.tcc_files.len();
        for (field, actual) in [
            ("TestName", self.test_names.len()),
            ("TemplateName", self.template_names.len()),
            ("ReportName", self.report_names.len()),
        ] {
            if actual != expected {
                return Err(PlanError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Whether IPv4 device addressing is enabled (exact string match).
    pub fn ipv4_enabled(&self) -> bool {
        self.ipv4 == "True"
    }

    /// Whether IPv6 device addressing is enabled (exact string match).
    pub fn ipv6_enabled(&self) -> bool {
        self.ipv6 == "True"
    }

    /// Iterate over the test cases described by the parallel lists.
    ///
    /// Call [`TestPlan::validate`] first; out-of-range indexes are not
    /// reachable on a validated plan.
    pub fn test_cases(&self) -> impl Iterator<Item = TestCaseSpec> + '_ {
        self.tcc_files
            .iter()
            .enumerate()
            .map(move |(i, tcc_file)| TestCaseSpec {
                number: i + 1,
                tcc_file: tcc_file.clone(),
                test_name: self.test_names.get(i).cloned().unwrap_or_default(),
                template_name: self.template_names.get(i).cloned().unwrap_or_default(),
                report_name: self.report_names.get(i).cloned().unwrap_or_default(),
            })
    }

    /// Look up the addressing entry for one device.
    ///
    /// Absence is a specific error naming the rendered key, so a typo'd
    /// plan fails with the exact key the appliance walk expected.
    pub fn device_config(&self, key: &DeviceConfigKey) -> Result<DeviceAddressConfig, PlanError> {
        let rendered = key.to_string();
        let value = self
            .extra
            .get(&rendered)
            .ok_or_else(|| PlanError::MissingDeviceConfig { key: key.clone() })?;

        serde_json::from_value(value.clone()).map_err(|source| PlanError::InvalidDeviceConfig {
            key: key.clone(),
            source,
        })
    }
}

/// Accept a JSON string or number as a string value
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
