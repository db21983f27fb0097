//! Protocol version definitions.
//!
//! A [`ProtocolVersion`] is the numeric protocol id plus a human label.
//! Ordering and equality only look at the number, which grows with every
//! release, so `<` means "released earlier". Packet layouts are looked up
//! with a floor search over these numbers (see [`crate::registry`]).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Minecraft protocol version.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolVersion {
    protocol: i32,
    name: &'static str,
}

impl ProtocolVersion {
    /// Protocol version 5 (Minecraft 1.7.6 - 1.7.10)
    pub const V1_7_10: Self = Self::new(5, "1.7.10");

    /// Protocol version 47 (Minecraft 1.8 - 1.8.9)
    pub const V1_8: Self = Self::new(47, "1.8.9");

    /// Protocol version 107 (Minecraft 1.9)
    pub const V1_9: Self = Self::new(107, "1.9");

    /// Protocol version 108 (Minecraft 1.9.1)
    pub const V1_9_1: Self = Self::new(108, "1.9.1");

    /// Protocol version 110 (Minecraft 1.9.3/1.9.4)
    pub const V1_9_4: Self = Self::new(110, "1.9.4");

    /// Protocol version 210 (Minecraft 1.10 - 1.10.2)
    pub const V1_10: Self = Self::new(210, "1.10.2");

    /// Protocol version 315 (Minecraft 1.11)
    pub const V1_11: Self = Self::new(315, "1.11");

    /// Protocol version 316 (Minecraft 1.11.1/1.11.2)
    pub const V1_11_2: Self = Self::new(316, "1.11.2");

    /// Protocol version 335 (Minecraft 1.12)
    pub const V1_12: Self = Self::new(335, "1.12");

    /// Protocol version 338 (Minecraft 1.12.1)
    pub const V1_12_1: Self = Self::new(338, "1.12.1");

    /// Protocol version 340 (Minecraft 1.12.2)
    pub const V1_12_2: Self = Self::new(340, "1.12.2");

    /// Releases with a complete packet table, oldest first.
    pub const KNOWN: &'static [Self] = &[
        Self::V1_7_10,
        Self::V1_8,
        Self::V1_9,
        Self::V1_9_1,
        Self::V1_9_4,
        Self::V1_10,
        Self::V1_11,
        Self::V1_11_2,
        Self::V1_12,
        Self::V1_12_1,
        Self::V1_12_2,
    ];

    /// Create a version from a raw protocol number and a label.
    #[must_use]
    pub const fn new(protocol: i32, name: &'static str) -> Self {
        Self { protocol, name }
    }

    /// Look up a known release by its raw protocol number.
    ///
    /// Returns `None` if the version is not in [`ProtocolVersion::KNOWN`].
    #[must_use]
    pub fn from_raw(protocol: i32) -> Option<Self> {
        Self::KNOWN.iter().copied().find(|v| v.protocol == protocol)
    }

    /// A version for any raw protocol number; known releases keep their label.
    #[must_use]
    pub fn from_raw_lenient(protocol: i32) -> Self {
        Self::from_raw(protocol).unwrap_or(Self::new(protocol, "unknown"))
    }

    /// Get the raw protocol version number.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.protocol
    }

    /// Gets the version name (e.g., "1.12.2").
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Oldest supported release.
    #[must_use]
    pub const fn oldest() -> Self {
        Self::V1_7_10
    }

    /// Newest supported release.
    #[must_use]
    pub const fn latest() -> Self {
        Self::V1_12_2
    }
}

impl PartialEq for ProtocolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol
    }
}

impl Eq for ProtocolVersion {}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.protocol.cmp(&other.protocol)
    }
}

impl Hash for ProtocolVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.protocol.hash(state);
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.protocol)
    }
}
