// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Data caching elements of the hardware topology.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::element::ElementDecodeError;

/// The level of a [`Cache`].
///
/// Unlike [`ProcessingKind`](crate::ProcessingKind), parsing is case-sensitive: only the exact
/// tokens `"L1"` through `"L5"` are accepted.
///
/// ```
/// use hwtopo::CacheLevel;
///
/// assert_eq!(CacheLevel::parse("L3").unwrap(), CacheLevel::L3);
/// assert!(CacheLevel::parse("l3").is_err());
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub enum CacheLevel {
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl CacheLevel {
    /// Parse a [`CacheLevel`] from its exact token.
    ///
    /// # Errors
    ///
    /// Returns [`ElementDecodeError::UnknownLevel`] for anything but `"L1"`..=`"L5"`.
    pub fn parse(level: &str) -> Result<Self, ElementDecodeError> {
        Self::from_str(level).map_err(|_| ElementDecodeError::UnknownLevel(level.to_owned()))
    }

    /// The wire token of this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Iterate over every level, innermost first.
    pub fn iter() -> impl Iterator<Item = CacheLevel> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

impl serde::Serialize for CacheLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for CacheLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        CacheLevel::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Characteristics of a [`Cache`] as detected on the machine.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub struct CacheAttributes {
    /// Total size of the cache in bytes.
    pub size: u64,
    /// Size of a cache line in bytes.
    #[serde(rename = "line")]
    pub line_size: u32,
    /// Associativity in ways.
    ///
    /// Signed so that probes can report an unknown (negative) value.
    #[serde(rename = "ways")]
    pub associativity: i32,
}

impl Display for CacheAttributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}B/{}B/{}-way",
            self.size, self.line_size, self.associativity
        )
    }
}

/// A data caching element (L1, L2, ...).
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub struct Cache {
    #[serde(rename = "lvl")]
    pub level: CacheLevel,
    /// Logical index assigned by the topology probe.
    #[serde(rename = "li")]
    pub logical_index: u32,
    #[serde(rename = "attrs")]
    pub attributes: CacheAttributes,
}

impl Cache {
    #[must_use]
    pub fn new(level: CacheLevel, logical_index: u32, attributes: CacheAttributes) -> Self {
        Self {
            level,
            logical_index,
            attributes,
        }
    }
}

impl Display for Cache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache{{ {}(L#{}), attrs: {} }}",
            self.level, self.logical_index, self.attributes
        )
    }
}
