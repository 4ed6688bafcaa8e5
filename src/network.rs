//! Network management module for the ephemeral bridge
//!
//! Provides:
//! - Link control over iproute2 and sysfs
//! - Interface inventory and selection
//! - Hardware (MAC) address handling
//! - Bridge creation, membership and teardown

pub mod bridge;
pub mod inventory;
pub mod link;
pub mod mac;

#[cfg(test)]
pub mod fake;

pub use inventory::Inventory;
pub use link::IpRoute2;
