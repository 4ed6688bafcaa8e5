//! Link control primitives
//!
//! `LinkControl` is the seam between the bridge lifecycle and the kernel.
//! `IpRoute2` is the production implementation: reads come from sysfs,
//! mutations go through the `ip` utility.

use crate::error::{Error, Result};
use crate::network::mac::MacAddr;
use ipnet::IpNet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Primitive operations on host network links
pub trait LinkControl {
    /// Names of all links on the host, loopback included
    fn interfaces(&self) -> Result<Vec<String>>;

    /// Current hardware address of a link
    fn hardware_address(&self, iface: &str) -> Result<MacAddr>;

    /// Whether a bridge device with this name exists
    fn bridge_exists(&self, name: &str) -> Result<bool>;

    /// Bridge the link is currently enslaved to, if any
    fn master(&self, iface: &str) -> Result<Option<String>>;

    /// Set administrative state up or down
    fn set_link_state(&self, iface: &str, up: bool) -> Result<()>;

    /// Change the hardware address of a link
    fn set_hardware_address(&self, iface: &str, mac: &MacAddr) -> Result<()>;

    /// Create a new bridge device
    fn add_bridge(&self, name: &str) -> Result<()>;

    /// Delete a link device
    fn delete_link(&self, name: &str) -> Result<()>;

    /// Enslave a link to a bridge
    fn set_master(&self, iface: &str, bridge: &str) -> Result<()>;

    /// Release a link from whatever master it has
    fn clear_master(&self, iface: &str) -> Result<()>;

    /// Add a protocol address to a device
    fn add_address(&self, dev: &str, address: &IpNet) -> Result<()>;
}

impl<T: LinkControl + ?Sized> LinkControl for &T {
    fn interfaces(&self) -> Result<Vec<String>> {
        (**self).interfaces()
    }

    fn hardware_address(&self, iface: &str) -> Result<MacAddr> {
        (**self).hardware_address(iface)
    }

    fn bridge_exists(&self, name: &str) -> Result<bool> {
        (**self).bridge_exists(name)
    }

    fn master(&self, iface: &str) -> Result<Option<String>> {
        (**self).master(iface)
    }

    fn set_link_state(&self, iface: &str, up: bool) -> Result<()> {
        (**self).set_link_state(iface, up)
    }

    fn set_hardware_address(&self, iface: &str, mac: &MacAddr) -> Result<()> {
        (**self).set_hardware_address(iface, mac)
    }

    fn add_bridge(&self, name: &str) -> Result<()> {
        (**self).add_bridge(name)
    }

    fn delete_link(&self, name: &str) -> Result<()> {
        (**self).delete_link(name)
    }

    fn set_master(&self, iface: &str, bridge: &str) -> Result<()> {
        (**self).set_master(iface, bridge)
    }

    fn clear_master(&self, iface: &str) -> Result<()> {
        (**self).clear_master(iface)
    }

    fn add_address(&self, dev: &str, address: &IpNet) -> Result<()> {
        (**self).add_address(dev, address)
    }
}

/// Default location of the iproute2 binary (resolved through PATH)
pub const DEFAULT_IP_BINARY: &str = "ip";

/// Default sysfs directory listing network links
pub const DEFAULT_SYSFS_NET: &str = "/sys/class/net";

/// Link control backed by `ip(8)` and `/sys/class/net`
#[derive(Debug, Clone)]
pub struct IpRoute2 {
    /// Path to the `ip` binary
    ip: PathBuf,
    /// sysfs network class directory
    sysfs: PathBuf,
}

impl Default for IpRoute2 {
    fn default() -> Self {
        Self::new(DEFAULT_IP_BINARY, DEFAULT_SYSFS_NET)
    }
}

impl IpRoute2 {
    pub fn new(ip: impl Into<PathBuf>, sysfs: impl Into<PathBuf>) -> Self {
        Self {
            ip: ip.into(),
            sysfs: sysfs.into(),
        }
    }

    fn link_dir(&self, iface: &str) -> PathBuf {
        self.sysfs.join(iface)
    }

    /// Run `ip` with the given arguments, failing on a non-zero exit
    fn run(&self, args: &[&str]) -> Result<()> {
        let rendered = format!("{} {}", self.ip.display(), args.join(" "));
        debug!(command = %rendered, "running");

        let output = Command::new(&self.ip)
            .args(args)
            .output()
            .map_err(|e| Error::CommandFailed {
                command: rendered.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(Error::CommandFailed {
                command: rendered,
                message,
            });
        }

        Ok(())
    }
}

impl LinkControl for IpRoute2 {
    fn interfaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.sysfs)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn hardware_address(&self, iface: &str) -> Result<MacAddr> {
        let path = self.link_dir(iface).join("address");
        let raw = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::InterfaceNotFound(iface.to_string()),
            _ => Error::Io(e),
        })?;
        raw.trim().parse::<MacAddr>().map_err(|e| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {}", path.display(), e),
            ))
        })
    }

    fn bridge_exists(&self, name: &str) -> Result<bool> {
        // Only bridge devices carry the `bridge` attribute directory
        Ok(self.link_dir(name).join("bridge").is_dir())
    }

    fn master(&self, iface: &str) -> Result<Option<String>> {
        master_from_link(&self.link_dir(iface).join("master"))
    }

    fn set_link_state(&self, iface: &str, up: bool) -> Result<()> {
        let state = if up { "up" } else { "down" };
        self.run(&["link", "set", "dev", iface, state])
    }

    fn set_hardware_address(&self, iface: &str, mac: &MacAddr) -> Result<()> {
        let mac = mac.to_string();
        self.run(&["link", "set", "dev", iface, "address", &mac])
    }

    fn add_bridge(&self, name: &str) -> Result<()> {
        self.run(&["link", "add", "name", name, "type", "bridge"])
    }

    fn delete_link(&self, name: &str) -> Result<()> {
        self.run(&["link", "delete", "dev", name])
    }

    fn set_master(&self, iface: &str, bridge: &str) -> Result<()> {
        self.run(&["link", "set", "dev", iface, "master", bridge])
    }

    fn clear_master(&self, iface: &str) -> Result<()> {
        self.run(&["link", "set", "dev", iface, "nomaster"])
    }

    fn add_address(&self, dev: &str, address: &IpNet) -> Result<()> {
        let address = address.to_string();
        self.run(&["addr", "add", &address, "dev", dev])
    }
}

/// Resolve the `master` symlink of a link to the bridge name
fn master_from_link(path: &Path) -> Result<Option<String>> {
    match fs::read_link(path) {
        Ok(target) => Ok(target
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn fake_sysfs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, mac) in [("lo", "00:00:00:00:00:00"), ("eth1", "52:54:00:AA:bb:01")] {
            fs::create_dir(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join("address"), format!("{}\n", mac)).unwrap();
        }
        fs::create_dir_all(dir.path().join("br0").join("bridge")).unwrap();
        symlink("../br0", dir.path().join("eth1").join("master")).unwrap();
        dir
    }

    #[test]
    fn test_sysfs_reads() {
        let dir = fake_sysfs();
        let links = IpRoute2::new("ip", dir.path());

        let mut names = links.interfaces().unwrap();
        names.sort();
        assert_eq!(names, vec!["br0", "eth1", "lo"]);

        let mac = links.hardware_address("eth1").unwrap();
        assert_eq!(mac.to_string(), "52:54:00:aa:bb:01");

        assert!(links.bridge_exists("br0").unwrap());
        assert!(!links.bridge_exists("eth1").unwrap());
        assert_eq!(links.master("eth1").unwrap().as_deref(), Some("br0"));
        assert_eq!(links.master("lo").unwrap(), None);
    }

    #[test]
    fn test_missing_interface_address() {
        let dir = fake_sysfs();
        let links = IpRoute2::new("ip", dir.path());
        assert!(matches!(
            links.hardware_address("eth9"),
            Err(Error::InterfaceNotFound(name)) if name == "eth9"
        ));
    }

    #[test]
    fn test_failed_command_carries_stderr() {
        let links = IpRoute2::new("false", DEFAULT_SYSFS_NET);
        match links.add_bridge("br0") {
            Err(Error::CommandFailed { command, .. }) => {
                assert_eq!(command, "false link add name br0 type bridge");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }
}
