//! Device platform mapping.
//!
//! Maps the Ansible `ansible_network_os` variable onto the CLI driver used
//! to talk to the device, plus the few per-platform details the session
//! layer needs (prompt shape, paging commands).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while mapping a host onto a device platform
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("unsupported network OS '{0}' (expected one of: eos, ios, nxos, iosxr)")]
    Unsupported(String),

    #[error("host '{0}' does not define ansible_network_os")]
    Missing(String),
}

/// Supported network device platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlatform {
    /// Arista EOS
    AristaEos,
    /// Cisco IOS / IOS-XE
    CiscoIosXe,
    /// Cisco NX-OS
    CiscoNxos,
    /// Cisco IOS-XR
    CiscoIosXr,
}

impl DevicePlatform {
    /// All platforms, in a stable order.
    pub const ALL: [DevicePlatform; 4] = [
        DevicePlatform::AristaEos,
        DevicePlatform::CiscoIosXe,
        DevicePlatform::CiscoNxos,
        DevicePlatform::CiscoIosXr,
    ];

    /// Map an `ansible_network_os` value onto a platform.
    ///
    /// Accepts both short names (`eos`) and fully qualified collection
    /// names (`arista.eos.eos`). Returns `None` for anything else; callers
    /// must treat that as a hard failure rather than picking a default.
    pub fn from_network_os(network_os: &str) -> Option<Self> {
        let short = network_os
            .trim()
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match short.as_str() {
            "eos" => Some(DevicePlatform::AristaEos),
            "ios" => Some(DevicePlatform::CiscoIosXe),
            "nxos" => Some(DevicePlatform::CiscoNxos),
            "iosxr" => Some(DevicePlatform::CiscoIosXr),
            _ => None,
        }
    }

    /// Driver name, as used by the device-type field of testbed files.
    pub fn driver_name(&self) -> &'static str {
        match self {
            DevicePlatform::AristaEos => "arista_eos",
            DevicePlatform::CiscoIosXe => "cisco_iosxe",
            DevicePlatform::CiscoNxos => "cisco_nxos",
            DevicePlatform::CiscoIosXr => "cisco_iosxr",
        }
    }

    /// Short `ansible_network_os` name for this platform.
    pub fn network_os(&self) -> &'static str {
        match self {
            DevicePlatform::AristaEos => "eos",
            DevicePlatform::CiscoIosXe => "ios",
            DevicePlatform::CiscoNxos => "nxos",
            DevicePlatform::CiscoIosXr => "iosxr",
        }
    }

    /// Commands sent right after login to disable paging.
    pub fn session_preparation(&self) -> &'static [&'static str] {
        match self {
            DevicePlatform::AristaEos => &["terminal length 0", "terminal width 32767"],
            DevicePlatform::CiscoIosXe | DevicePlatform::CiscoNxos => {
                &["terminal length 0", "terminal width 511"]
            }
            DevicePlatform::CiscoIosXr => &["terminal length 0", "terminal width 512"],
        }
    }

    /// Whether the device has a separate privileged exec mode.
    pub fn has_enable_mode(&self) -> bool {
        !matches!(self, DevicePlatform::CiscoIosXr | DevicePlatform::CiscoNxos)
    }

    /// Regex matching a CLI prompt at the end of the receive buffer.
    pub fn prompt_regex(&self) -> &'static Regex {
        static PROMPT: OnceLock<Regex> = OnceLock::new();
        // All supported platforms share the `name(mode)#` / `name>` shape.
        PROMPT.get_or_init(|| {
            Regex::new(r"(?m)^[\w.\-@/:~]{1,63}(\([\w.\-]+\))?[#>]\s*\z")
                .unwrap_or_else(|e| panic!("invalid prompt regex: {e}"))
        })
    }
}

/// Strip the mode marker from a prompt, leaving the device hostname.
///
/// `leaf1#` becomes `leaf1`, `leaf1(config)#` becomes `leaf1`.
pub fn hostname_from_prompt(prompt: &str) -> &str {
    let trimmed = prompt.trim().trim_end_matches(['#', '>']);
    match trimmed.find('(') {
        Some(idx) if trimmed.ends_with(')') => &trimmed[..idx],
        _ => trimmed,
    }
}

/// Map a network OS onto a platform, failing on unknown values.
pub fn platform_for(network_os: &str) -> Result<DevicePlatform, PlatformError> {
    DevicePlatform::from_network_os(network_os)
        .ok_or_else(|| PlatformError::Unsupported(network_os.to_string()))
}

impl std::fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.driver_name())
    }
}

impl std::str::FromStr for DevicePlatform {
    type Err = PlatformError;

    /// Parses either a driver name (`arista_eos`) or a network OS (`eos`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        DevicePlatform::ALL
            .into_iter()
            .find(|p| p.driver_name() == normalized)
            .or_else(|| DevicePlatform::from_network_os(&normalized))
            .ok_or_else(|| PlatformError::Unsupported(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_os_mapping() {
        assert_eq!(platform_for("eos").unwrap().to_string(), "arista_eos");
        assert_eq!(platform_for("nxos").unwrap().to_string(), "cisco_nxos");
        assert_eq!(platform_for("ios").unwrap().to_string(), "cisco_iosxe");
        assert_eq!(platform_for("iosxr").unwrap().to_string(), "cisco_iosxr");
    }

    #[test]
    fn test_collection_qualified_names() {
        assert_eq!(
            DevicePlatform::from_network_os("arista.eos.eos"),
            Some(DevicePlatform::AristaEos)
        );
        assert_eq!(
            DevicePlatform::from_network_os("cisco.nxos.nxos"),
            Some(DevicePlatform::CiscoNxos)
        );
    }

    #[test]
    fn test_unknown_platform_fails() {
        let err = platform_for("junos").unwrap_err();
        assert_eq!(err, PlatformError::Unsupported("junos".to_string()));
        assert!(DevicePlatform::from_network_os("").is_none());
    }

    #[test]
    fn test_from_str_accepts_driver_names() {
        assert_eq!(
            "arista_eos".parse::<DevicePlatform>().unwrap(),
            DevicePlatform::AristaEos
        );
        assert_eq!("EOS".parse::<DevicePlatform>().unwrap(), DevicePlatform::AristaEos);
        assert!("linux".parse::<DevicePlatform>().is_err());
    }

    #[test]
    fn test_prompt_detection() {
        let re = DevicePlatform::AristaEos.prompt_regex();
        assert!(re.is_match("show version\nleaf1#"));
        assert!(re.is_match("leaf1>"));
        assert!(re.is_match("leaf1(config)# "));
        assert!(!re.is_match("leaf1# show version\nArista cEOSLab"));
    }

    #[test]
    fn test_hostname_from_prompt() {
        assert_eq!(hostname_from_prompt("leaf1#"), "leaf1");
        assert_eq!(hostname_from_prompt("spine2>"), "spine2");
        assert_eq!(hostname_from_prompt(" leaf1(config)#\n"), "leaf1");
    }
}
