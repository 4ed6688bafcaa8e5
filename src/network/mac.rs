//! Hardware address handling
//!
//! Provides:
//! - A `MacAddr` value type with strict textual parsing
//! - Random locally-administered address generation
//! - Applying an address to a link (down, set, up)

use crate::error::{Error, Result};
use crate::network::link::LinkControl;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Locally-administered bit of the first octet
const LOCAL_BIT: u8 = 0x02;

/// Multicast (group) bit of the first octet
const MULTICAST_BIT: u8 = 0x01;

/// A 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Software-assigned rather than burned in
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & LOCAL_BIT != 0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & MULTICAST_BIT != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    /// Exactly six colon-separated pairs of hex digits, any case
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::Validation(format!(
                "'{}' is not a MAC address (expected xx:xx:xx:xx:xx:xx)",
                s
            ))
        };

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

/// Generate a random unicast, locally-administered address
pub fn generate() -> MacAddr {
    let mut octets = [0u8; 6];
    rand::rng().fill(&mut octets[1..]);
    octets[0] = LOCAL_BIT;
    MacAddr(octets)
}

/// Validate user input; the address displays in lowercase-normalized form
pub fn validate(text: &str) -> Result<MacAddr> {
    text.trim().parse()
}

/// Reads and applies hardware addresses through a link backend
pub struct MacManager<'a> {
    links: &'a dyn LinkControl,
}

impl<'a> MacManager<'a> {
    pub fn new(links: &'a dyn LinkControl) -> Self {
        Self { links }
    }

    /// Current hardware address of `iface`
    pub fn read(&self, iface: &str) -> Result<MacAddr> {
        self.links.hardware_address(iface)
    }

    /// Set `mac` on `iface`
    ///
    /// The link is taken down first because most drivers refuse address
    /// changes on an active interface. A failure at any step stops the
    /// sequence and may leave the link down.
    pub fn apply(&self, iface: &str, mac: &MacAddr) -> Result<()> {
        info!(interface = iface, mac = %mac, "setting hardware address");
        self.links.set_link_state(iface, false)?;
        self.links.set_hardware_address(iface, mac)?;
        self.links.set_link_state(iface, true)
    }
}
