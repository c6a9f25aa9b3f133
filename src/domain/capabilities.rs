use std::{fmt, ops::BitOr, str::FromStr};

use serde::{Deserialize, Serialize};

/// A bitmask encoding a requested operational level of a resource.
///
/// The named bits are the ones the controller's resources understand. A
/// resource may define further bits of its own; those are carried through
/// unchanged.
///
/// Serialised as a plain integer. Deserialisation also accepts any string
/// [`FromStr`] understands, so topology files can say `"access|context"`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u32", try_from = "Repr")]
pub struct Capabilities(u32);

impl Capabilities {
    /// No requirement at all. Also the value every requirement is released to.
    pub const NONE: Self = Self(0);

    /// The resource must be accessible (powered and clocked).
    pub const ACCESS: Self = Self(1 << 0);

    /// The resource must retain its context.
    pub const CONTEXT: Self = Self(1 << 1);

    /// The resource must be able to wake the requester.
    pub const WAKEUP: Self = Self(1 << 2);

    const NAMES: [(&'static str, Self); 3] = [
        ("access", Self::ACCESS),
        ("context", Self::CONTEXT),
        ("wakeup", Self::WAKEUP),
    ];

    /// Creates a mask from its raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `other` is also set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl From<u32> for Capabilities {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Capabilities> for u32 {
    fn from(caps: Capabilities) -> Self {
        caps.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Bits(u32),
    Text(String),
}

impl TryFrom<Repr> for Capabilities {
    type Error = ParseCapabilitiesError;

    fn try_from(repr: Repr) -> Result<Self, Self::Error> {
        match repr {
            Repr::Bits(bits) => Ok(Self(bits)),
            Repr::Text(text) => text.parse(),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Error returned when a capability mask cannot be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid capability mask '{0}': expected a number (e.g. 0x3) or names joined by '|' (access, \
     context, wakeup)"
)]
pub struct ParseCapabilitiesError(String);

impl FromStr for Capabilities {
    type Err = ParseCapabilitiesError;

    /// Parses `0x3`, `3`, or `access|context`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseCapabilitiesError(s.to_string());

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16).map(Self).map_err(|_| invalid());
        }
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            return s.parse().map(Self).map_err(|_| invalid());
        }

        s.split('|')
            .map(|name| {
                let name = name.trim().to_lowercase();
                Self::NAMES
                    .iter()
                    .find(|(known, _)| *known == name)
                    .map(|(_, caps)| *caps)
                    .ok_or_else(invalid)
            })
            .try_fold(Self::NONE, |acc, caps| caps.map(|caps| acc | caps))
    }
}

impl TryFrom<&str> for Capabilities {
    type Error = ParseCapabilitiesError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
