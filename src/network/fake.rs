//! In-memory link backend for tests
//!
//! Models the slice of kernel behaviour the lifecycle depends on: bridges
//! own members, deleting a bridge releases them, and hardware addresses
//! cannot change while a link is up.

use crate::error::{Error, Result};
use crate::network::link::LinkControl;
use crate::network::mac::MacAddr;
use ipnet::IpNet;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeLink {
    pub mac: MacAddr,
    pub up: bool,
    pub master: Option<String>,
    pub is_bridge: bool,
    pub addresses: Vec<IpNet>,
}

#[derive(Debug, Default)]
struct State {
    links: BTreeMap<String, FakeLink>,
    calls: Vec<String>,
    fail_prefixes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeLinks {
    state: Mutex<State>,
}

impl FakeLinks {
    /// Host with loopback plus the given physical links, all up and unattached
    pub fn with_interfaces(names: &[&str]) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.links.insert("lo".to_string(), physical(0));
            for (i, name) in names.iter().enumerate() {
                state.links.insert(name.to_string(), physical(i as u8 + 1));
            }
        }
        fake
    }

    /// Make every mutating call starting with `prefix` fail
    pub fn fail_on(&self, prefix: &str) {
        self.state.lock().unwrap().fail_prefixes.push(prefix.to_string());
    }

    /// Mutating calls in the order they were made
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn link(&self, name: &str) -> Option<FakeLink> {
        self.state.lock().unwrap().links.get(name).cloned()
    }

    pub fn is_up(&self, name: &str) -> bool {
        self.link(name).map(|l| l.up).unwrap_or(false)
    }

    /// Members of a bridge, sorted by name
    pub fn members(&self, bridge: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|(_, l)| l.master.as_deref() == Some(bridge))
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn bridge_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|(n, l)| n.as_str() == name && l.is_bridge)
            .count()
    }

    /// Mutate link state directly, bypassing the call log
    pub fn seed<F: FnOnce(&mut BTreeMap<String, FakeLink>)>(&self, f: F) {
        f(&mut self.state.lock().unwrap().links);
    }

    fn mutate<T, F>(&self, call: String, f: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<String, FakeLink>) -> std::result::Result<T, String>,
    {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if state.fail_prefixes.iter().any(|p| call.starts_with(p.as_str())) {
            return Err(Error::CommandFailed {
                command: call,
                message: "injected failure".to_string(),
            });
        }
        f(&mut state.links).map_err(|message| Error::CommandFailed {
            command: call,
            message,
        })
    }
}

fn physical(index: u8) -> FakeLink {
    FakeLink {
        mac: MacAddr::new([0x52, 0x54, 0x00, 0x12, 0x34, index]),
        up: true,
        master: None,
        is_bridge: false,
        addresses: Vec::new(),
    }
}

fn existing<'a>(
    links: &'a mut BTreeMap<String, FakeLink>,
    name: &str,
) -> std::result::Result<&'a mut FakeLink, String> {
    links
        .get_mut(name)
        .ok_or_else(|| format!("Cannot find device \"{}\"", name))
}

impl LinkControl for FakeLinks {
    fn interfaces(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().links.keys().cloned().collect())
    }

    fn hardware_address(&self, iface: &str) -> Result<MacAddr> {
        self.link(iface)
            .map(|l| l.mac)
            .ok_or_else(|| Error::InterfaceNotFound(iface.to_string()))
    }

    fn bridge_exists(&self, name: &str) -> Result<bool> {
        Ok(self.link(name).map(|l| l.is_bridge).unwrap_or(false))
    }

    fn master(&self, iface: &str) -> Result<Option<String>> {
        Ok(self.link(iface).and_then(|l| l.master))
    }

    fn set_link_state(&self, iface: &str, up: bool) -> Result<()> {
        let state = if up { "up" } else { "down" };
        self.mutate(format!("set {} {}", iface, state), |links| {
            existing(links, iface)?.up = up;
            Ok(())
        })
    }

    fn set_hardware_address(&self, iface: &str, mac: &MacAddr) -> Result<()> {
        self.mutate(format!("set {} address {}", iface, mac), |links| {
            let link = existing(links, iface)?;
            if link.up {
                return Err("Device or resource busy".to_string());
            }
            link.mac = *mac;
            Ok(())
        })
    }

    fn add_bridge(&self, name: &str) -> Result<()> {
        self.mutate(format!("add bridge {}", name), |links| {
            if links.contains_key(name) {
                return Err("File exists".to_string());
            }
            let mut bridge = physical(0xff);
            bridge.up = false;
            bridge.is_bridge = true;
            links.insert(name.to_string(), bridge);
            Ok(())
        })
    }

    fn delete_link(&self, name: &str) -> Result<()> {
        self.mutate(format!("delete {}", name), |links| {
            links
                .remove(name)
                .ok_or_else(|| format!("Cannot find device \"{}\"", name))?;
            for link in links.values_mut() {
                if link.master.as_deref() == Some(name) {
                    link.master = None;
                }
            }
            Ok(())
        })
    }

    fn set_master(&self, iface: &str, bridge: &str) -> Result<()> {
        self.mutate(format!("set {} master {}", iface, bridge), |links| {
            if !links.get(bridge).map(|l| l.is_bridge).unwrap_or(false) {
                return Err(format!("Cannot find bridge \"{}\"", bridge));
            }
            existing(links, iface)?.master = Some(bridge.to_string());
            Ok(())
        })
    }

    fn clear_master(&self, iface: &str) -> Result<()> {
        self.mutate(format!("set {} nomaster", iface), |links| {
            existing(links, iface)?.master = None;
            Ok(())
        })
    }

    fn add_address(&self, dev: &str, address: &IpNet) -> Result<()> {
        self.mutate(format!("addr add {} dev {}", address, dev), |links| {
            existing(links, dev)?.addresses.push(*address);
            Ok(())
        })
    }
}
