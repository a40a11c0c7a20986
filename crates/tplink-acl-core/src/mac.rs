//! MAC address handling.
//!
//! Callers may write MAC addresses however they like (`aa:bb:cc:dd:ee:ff`,
//! `AA-BB-CC-DD-EE-FF`); the router itself reports them in its own format.
//! [`MacAddress`] validates a caller supplied address while keeping the
//! original text, which is what gets sent to the router.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A validated MAC address that remembers how it was written.
///
/// # Example
///
/// ```
/// use tplink_acl_core::MacAddress;
///
/// let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
/// assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
/// assert!(mac.matches("AA-BB-CC-DD-EE-FF"));
/// assert!("aa:bb:cc".parse::<MacAddress>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacAddress {
    octets: [u8; 6],
    text: String,
}

impl MacAddress {
    /// Parses six hex octets separated by `:` or `-`.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let trimmed = text.trim();
        let octets =
            parse_octets(trimmed).ok_or_else(|| Error::InvalidMac(text.to_string()))?;
        Ok(Self {
            octets,
            text: trimmed.to_string(),
        })
    }

    /// The address as originally written (surrounding whitespace removed).
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The six address bytes.
    pub fn octets(&self) -> [u8; 6] {
        self.octets
    }

    /// Whether `other`, as reported by the router, names the same device.
    ///
    /// Router strings that do not parse as a MAC address fall back to a
    /// case-insensitive text comparison.
    pub fn matches(&self, other: &str) -> bool {
        match parse_octets(other.trim()) {
            Some(octets) => octets == self.octets,
            None => other.trim().eq_ignore_ascii_case(&self.text),
        }
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_octets(text: &str) -> Option<[u8; 6]> {
    let separator = if text.contains('-') { '-' } else { ':' };
    let mut octets = [0u8; 6];
    let mut parts = text.split(separator);

    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }

    // Exactly six groups
    parts.next().is_none().then_some(octets)
}
