//! Interface inventory
//!
//! A snapshot of host links taken once per run, so the indices shown to the
//! user stay valid while they choose.

use crate::error::{Error, Result};
use crate::network::link::LinkControl;
use serde::Serialize;

/// Loopback is never offered for bridging
const LOOPBACK: &str = "lo";

/// What `interfaces` reports for one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    /// Unreadable addresses are reported as null
    pub mac: Option<String>,
    pub master: Option<String>,
    pub bridge: bool,
}

/// Ordered list of selectable interfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    names: Vec<String>,
}

impl Inventory {
    /// Enumerate host interfaces, loopback excluded, sorted by name
    pub fn scan(links: &dyn LinkControl) -> Result<Self> {
        let mut names: Vec<String> = links
            .interfaces()?
            .into_iter()
            .filter(|n| n != LOOPBACK)
            .collect();
        names.sort();
        Ok(Self { names })
    }

    #[cfg(test)]
    pub fn from_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn enumerate(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolve a menu index to an interface name
    pub fn resolve(&self, index: &str) -> Result<&str> {
        let idx: usize = index
            .trim()
            .parse()
            .map_err(|_| Error::InvalidSelection(format!("'{}' is not an index", index.trim())))?;
        self.names.get(idx).map(String::as_str).ok_or_else(|| {
            Error::InvalidSelection(format!(
                "index {} out of range (0-{})",
                idx,
                self.names.len().saturating_sub(1)
            ))
        })
    }

    /// Look up an interface by exact name
    pub fn lookup(&self, name: &str) -> Result<&str> {
        self.names
            .iter()
            .find(|n| n.as_str() == name)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidSelection(format!("no interface named '{}'", name)))
    }

    /// Current address, bridge membership and kind of every entry
    pub fn describe(&self, links: &dyn LinkControl) -> Result<Vec<InterfaceInfo>> {
        self.names
            .iter()
            .map(|name| {
                Ok(InterfaceInfo {
                    name: name.clone(),
                    mac: links.hardware_address(name).ok().map(|m| m.to_string()),
                    master: links.master(name)?,
                    bridge: links.bridge_exists(name)?,
                })
            })
            .collect()
    }

    /// Accept either a menu index or an interface name
    pub fn select(&self, choice: &str) -> Result<&str> {
        let choice = choice.trim();
        if !choice.is_empty() && choice.bytes().all(|b| b.is_ascii_digit()) {
            // An all-digit choice is always read as an index
            self.resolve(choice)
        } else {
            self.lookup(choice)
        }
    }
}
