//! Host facts used in system prompts.

use std::net::{IpAddr, UdpSocket};
use std::process::Command;

/// Snapshot of the machine the assistant runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os_name: String,
    pub is_root: bool,
    pub local_ip: Option<IpAddr>,
}

impl HostInfo {
    pub fn detect() -> Self {
        Self {
            os_name: os_name(),
            is_root: is_root(),
            local_ip: local_ip(),
        }
    }
}

/// Pretty OS name, e.g. `openEuler 22.03 (LTS-SP3)`.
pub fn os_name() -> String {
    if let Ok(content) = std::fs::read_to_string("/etc/os-release") {
        if let Some(name) = pretty_name(&content) {
            return name;
        }
    }

    if cfg!(target_os = "macos") {
        let product = command_output("sw_vers", &["-productName"]);
        let version = command_output("sw_vers", &["-productVersion"]);
        if let (Some(product), Some(version)) = (product, version) {
            return format!("{product} {version}");
        }
    }

    std::env::consts::OS.to_string()
}

/// Whether the effective user is root.
pub fn is_root() -> bool {
    command_output("id", &["-u"]).is_some_and(|uid| uid == "0")
}

/// Address of the interface that routes to the outside world.
///
/// Connecting a UDP socket sends no packets.
pub fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn pretty_name(os_release: &str) -> Option<String> {
    os_release.lines().find_map(|line| {
        let value = line.trim().strip_prefix("PRETTY_NAME=")?;
        let value = value.trim().trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
