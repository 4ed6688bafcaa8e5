//! Bridge interface management
//!
//! Provides:
//! - Idempotent creation and destruction of the bridge device
//! - Moving member interfaces onto the bridge
//! - Assigning a protocol address to the bridge

use crate::error::{Error, Result};
use crate::network::link::LinkControl;
use ipnet::IpNet;
use tracing::{debug, info};

/// Default bridge name
pub const DEFAULT_BRIDGE: &str = "br0";

/// Check a bridge name against the kernel's link naming rules
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("bridge name is empty".to_string()));
    }
    // IFNAMSIZ includes the trailing NUL
    if name.len() >= libc::IFNAMSIZ {
        return Err(Error::Validation(format!(
            "bridge name '{}' is longer than {} characters",
            name,
            libc::IFNAMSIZ - 1
        )));
    }
    if name == "." || name == ".." || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(Error::Validation(format!("'{}' is not a valid link name", name)));
    }
    Ok(())
}

/// Parse `address/prefix` text for assignment to the bridge
pub fn parse_address(text: &str) -> Result<IpNet> {
    text.trim().parse::<IpNet>().map_err(|_| {
        Error::Validation(format!(
            "'{}' is not an address with prefix length (e.g. 192.168.1.100/24)",
            text.trim()
        ))
    })
}

/// Creates, populates and destroys bridge devices
pub struct BridgeController<'a> {
    links: &'a dyn LinkControl,
}

impl<'a> BridgeController<'a> {
    pub fn new(links: &'a dyn LinkControl) -> Self {
        Self { links }
    }

    /// Check if a bridge exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        self.links.bridge_exists(name)
    }

    /// Remove a leftover bridge of this name, if there is one
    pub fn ensure_absent(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            debug!(bridge = name, "no previous bridge");
            return Ok(());
        }
        info!(bridge = name, "removing previous bridge");
        self.links.set_link_state(name, false)?;
        self.links.delete_link(name)
    }

    /// Release `iface` from any bridge it belongs to
    pub fn detach_from_any_master(&self, iface: &str) -> Result<()> {
        self.links.clear_master(iface)
    }

    /// Create the bridge device (left administratively down)
    pub fn create(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        info!(bridge = name, "creating bridge");
        self.links.add_bridge(name)
    }

    /// Make `iface` a member of `bridge`
    ///
    /// The bridge should still be down; it is brought up by `bring_up` once
    /// every member is in place.
    pub fn attach(&self, bridge: &str, iface: &str) -> Result<()> {
        info!(bridge, interface = iface, "attaching member");
        self.links.set_link_state(iface, false)?;
        self.links.set_master(iface, bridge)?;
        self.links.set_link_state(iface, true)
    }

    pub fn bring_up(&self, bridge: &str) -> Result<()> {
        self.links.set_link_state(bridge, true)
    }

    /// Assign an address parsed by `parse_address` to the bridge
    pub fn assign_address(&self, bridge: &str, net: &IpNet) -> Result<()> {
        info!(bridge, address = %net, "assigning address");
        self.links.add_address(bridge, net)
    }

    /// Down and delete the bridge; absent bridges are left alone
    pub fn destroy(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Ok(());
        }
        info!(bridge = name, "deleting bridge");
        self.links.set_link_state(name, false)?;
        self.links.delete_link(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::fake::FakeLinks;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("br0").is_ok());
        assert!(validate_name("testbr0").is_ok());
        assert!(validate_name("abcdefghijklmno").is_ok());
        assert!(matches!(validate_name(""), Err(Error::Validation(_))));
        assert!(matches!(validate_name("abcdefghijklmnop"), Err(Error::Validation(_))));
        assert!(matches!(validate_name("br 0"), Err(Error::Validation(_))));
        assert!(matches!(validate_name("br/0"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_address() {
        let net = parse_address("192.168.1.100/24").unwrap();
        assert_eq!(net.to_string(), "192.168.1.100/24");
        assert_eq!(parse_address("fd00::1/64").unwrap().prefix_len(), 64);
        for bad in ["", "192.168.1.100", "192.168.1.100/33", "300.1.1.1/24", "host/24"] {
            assert!(matches!(parse_address(bad), Err(Error::Validation(_))), "{}", bad);
        }
    }

    #[test]
    fn test_assign_rejects_before_os_call() {
        let links = FakeLinks::with_interfaces(&[]);
        let controller = BridgeController::new(&links);
        controller.create("br0").unwrap();

        let assign = |text: &str| -> Result<()> {
            let net = parse_address(text)?;
            controller.assign_address("br0", &net)
        };
        assert!(matches!(assign("10.0.0.1"), Err(Error::Validation(_))));
        assert_eq!(links.count_calls("addr add"), 0);

        assign("10.0.0.1/24").unwrap();
        assert_eq!(links.link("br0").unwrap().addresses.len(), 1);
    }

    #[test]
    fn test_recreate_is_idempotent() {
        let links = FakeLinks::with_interfaces(&["eth1", "eth2"]);
        let controller = BridgeController::new(&links);

        for _ in 0..2 {
            controller.ensure_absent("br0").unwrap();
            controller.create("br0").unwrap();
        }
        assert_eq!(links.bridge_count("br0"), 1);

        controller.attach("br0", "eth1").unwrap();
        controller.ensure_absent("br0").unwrap();
        controller.create("br0").unwrap();

        assert_eq!(links.bridge_count("br0"), 1);
        assert!(links.members("br0").is_empty());
        assert_eq!(links.master("eth1").unwrap(), None);
    }

    #[test]
    fn test_create_without_clearing_fails() {
        let links = FakeLinks::with_interfaces(&[]);
        let controller = BridgeController::new(&links);
        controller.create("br0").unwrap();
        assert!(matches!(controller.create("br0"), Err(Error::CommandFailed { .. })));
    }

    #[test]
    fn test_ensure_absent_noop() {
        let links = FakeLinks::with_interfaces(&["eth1"]);
        BridgeController::new(&links).ensure_absent("br0").unwrap();
        assert!(links.calls().is_empty());
    }

    #[test]
    fn test_move_between_bridges() {
        let links = FakeLinks::with_interfaces(&["eth1"]);
        let controller = BridgeController::new(&links);
        controller.create("brx").unwrap();
        controller.create("bry").unwrap();
        controller.attach("brx", "eth1").unwrap();
        assert_eq!(links.members("brx"), vec!["eth1"]);

        controller.detach_from_any_master("eth1").unwrap();
        controller.attach("bry", "eth1").unwrap();

        assert_eq!(links.master("eth1").unwrap().as_deref(), Some("bry"));
        assert!(links.members("brx").is_empty());
        assert_eq!(links.members("bry"), vec!["eth1"]);
    }

    #[test]
    fn test_detach_unattached_is_noop() {
        let links = FakeLinks::with_interfaces(&["eth1"]);
        BridgeController::new(&links)
            .detach_from_any_master("eth1")
            .unwrap();
        assert_eq!(links.master("eth1").unwrap(), None);
    }

    #[test]
    fn test_attach_sequence_keeps_bridge_down() {
        let links = FakeLinks::with_interfaces(&["eth1", "eth2"]);
        let controller = BridgeController::new(&links);
        controller.create("br0").unwrap();
        controller.attach("br0", "eth1").unwrap();
        controller.attach("br0", "eth2").unwrap();
        assert!(!links.is_up("br0"));

        controller.bring_up("br0").unwrap();
        assert!(links.is_up("br0"));
        assert!(links.is_up("eth1") && links.is_up("eth2"));
        assert_eq!(links.members("br0"), vec!["eth1", "eth2"]);
    }

    #[test]
    fn test_destroy_idempotent() {
        let links = FakeLinks::with_interfaces(&["eth1"]);
        let controller = BridgeController::new(&links);
        controller.create("br0").unwrap();
        controller.attach("br0", "eth1").unwrap();

        controller.destroy("br0").unwrap();
        controller.destroy("br0").unwrap();

        assert!(!controller.exists("br0").unwrap());
        assert_eq!(links.count_calls("delete br0"), 1);
        assert_eq!(links.master("eth1").unwrap(), None);
    }
}
