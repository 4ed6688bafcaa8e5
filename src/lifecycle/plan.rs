//! Validated session inputs
//!
//! Everything the orchestrator needs is collected into a `Plan` before the
//! first mutating call, so bad input never leaves half-configured links.

use crate::capture::CaptureRequest;
use crate::error::{Error, Result};
use crate::network::bridge::validate_name;
use crate::network::mac::{self, MacAddr};
use ipnet::IpNet;
use std::fmt;
use std::str::FromStr;

/// What to do with the hardware address of the first interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacChoice {
    /// Leave the address alone
    Keep,
    /// Generate a random locally-administered address
    #[default]
    Random,
    /// Use this address
    Fixed(MacAddr),
}

impl FromStr for MacChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "random" => Ok(MacChoice::Random),
            "keep" | "none" => Ok(MacChoice::Keep),
            other => mac::validate(other).map(MacChoice::Fixed),
        }
    }
}

impl fmt::Display for MacChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacChoice::Keep => write!(f, "keep"),
            MacChoice::Random => write!(f, "random"),
            MacChoice::Fixed(mac) => write!(f, "{}", mac),
        }
    }
}

/// The full set of inputs for one bridge session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// First member; its MAC is the one spoofed
    pub first: String,
    /// Second member
    pub second: String,
    /// Bridge device name
    pub bridge: String,
    /// Hardware address handling for `first`
    pub mac: MacChoice,
    /// Address to put on the bridge
    pub address: Option<IpNet>,
    /// Captures to run while the bridge is up
    pub captures: Vec<CaptureRequest>,
}

impl Plan {
    pub fn new(
        first: impl Into<String>,
        second: impl Into<String>,
        bridge: impl Into<String>,
    ) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            bridge: bridge.into(),
            mac: MacChoice::default(),
            address: None,
            captures: Vec::new(),
        }
    }

    pub fn mac(mut self, mac: MacChoice) -> Self {
        self.mac = mac;
        self
    }

    pub fn address(mut self, address: IpNet) -> Self {
        self.address = Some(address);
        self
    }

    pub fn capture(mut self, request: CaptureRequest) -> Self {
        self.captures.push(request);
        self
    }

    /// Interface whose hardware address will change, if any
    pub fn spoof_interface(&self) -> Option<&str> {
        match self.mac {
            MacChoice::Keep => None,
            MacChoice::Random | MacChoice::Fixed(_) => Some(&self.first),
        }
    }

    /// Cross-field checks that individual prompts cannot make
    pub fn validate(&self) -> Result<()> {
        if self.first.is_empty() || self.second.is_empty() {
            return Err(Error::InvalidSelection("two interfaces are required".to_string()));
        }
        if self.first == self.second {
            return Err(Error::InvalidSelection(format!(
                "'{}' selected twice; a bridge needs two different interfaces",
                self.first
            )));
        }
        validate_name(&self.bridge)?;
        if self.bridge == self.first || self.bridge == self.second {
            return Err(Error::Validation(format!(
                "bridge name '{}' clashes with a member interface",
                self.bridge
            )));
        }
        for capture in &self.captures {
            if capture.interface.is_empty() {
                return Err(Error::InvalidSelection("capture interface is empty".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_choice_parse() {
        assert_eq!("".parse::<MacChoice>().unwrap(), MacChoice::Random);
        assert_eq!("Random".parse::<MacChoice>().unwrap(), MacChoice::Random);
        assert_eq!("keep".parse::<MacChoice>().unwrap(), MacChoice::Keep);
        assert_eq!(
            "02:AA:00:00:00:01".parse::<MacChoice>().unwrap().to_string(),
            "02:aa:00:00:00:01"
        );
        assert!(matches!("02:aa".parse::<MacChoice>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_spoof_interface() {
        let plan = Plan::new("eth1", "eth2", "br0");
        assert_eq!(plan.spoof_interface(), Some("eth1"));
        assert_eq!(plan.mac(MacChoice::Keep).spoof_interface(), None);
    }

    #[test]
    fn test_validate_plan() {
        assert!(Plan::new("eth1", "eth2", "br0").validate().is_ok());
        assert!(matches!(
            Plan::new("eth1", "eth1", "br0").validate(),
            Err(Error::InvalidSelection(_))
        ));
        assert!(matches!(
            Plan::new("eth1", "", "br0").validate(),
            Err(Error::InvalidSelection(_))
        ));
        assert!(matches!(
            Plan::new("eth1", "eth2", "eth2").validate(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Plan::new("eth1", "eth2", "bad name").validate(),
            Err(Error::Validation(_))
        ));
    }
}
