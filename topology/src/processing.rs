// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Processing (computation) units of the hardware topology.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::element::ElementDecodeError;

/// The kinds of computation unit a [`Processing`] element can represent.
///
/// # Wire form
///
/// The canonical wire form is the lower-cased name (`"package"`, `"numanode"`, `"core"`,
/// `"thread"`).
/// Parsing is ASCII case-insensitive and additionally accepts `"numa_node"` for
/// [`ProcessingKind::NumaNode`].
///
/// ```
/// use hwtopo::ProcessingKind;
///
/// assert_eq!(ProcessingKind::parse("NUMA_NODE").unwrap(), ProcessingKind::NumaNode);
/// assert_eq!(ProcessingKind::parse("numanode").unwrap(), ProcessingKind::NumaNode);
/// assert_eq!(ProcessingKind::NumaNode.as_str(), "numanode");
/// assert_eq!(ProcessingKind::NumaNode.to_string(), "NUMANode");
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
    strum::EnumIs,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProcessingKind {
    /// A physical package (what goes into a socket).
    Package,
    /// A set of processors around memory they can all access over the same physical link.
    #[strum(to_string = "numanode", serialize = "numa_node")]
    NumaNode,
    /// A physical core.
    Core,
    /// A logical core (hardware thread), possibly sharing a physical core with others.
    Thread,
}

impl ProcessingKind {
    /// Parse a [`ProcessingKind`] from any accepted spelling (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ElementDecodeError::UnknownKind`] if `kind` names no known kind.
    pub fn parse(kind: &str) -> Result<Self, ElementDecodeError> {
        Self::from_str(kind).map_err(|_| ElementDecodeError::UnknownKind(kind.to_owned()))
    }

    /// The canonical wire form of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Iterate over every kind, outermost first.
    pub fn iter() -> impl Iterator<Item = ProcessingKind> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

impl Display for ProcessingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProcessingKind::Package => "Package",
            ProcessingKind::NumaNode => "NUMANode",
            ProcessingKind::Core => "Core",
            ProcessingKind::Thread => "Thread",
        })
    }
}

impl serde::Serialize for ProcessingKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for ProcessingKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        ProcessingKind::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A computation unit in the hardware topology.
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
pub struct Processing {
    /// What sort of computation unit this is.
    pub kind: ProcessingKind,
    /// Index of the unit as assigned by the operating system.
    ///
    /// This is *not* a [`NodeId`](crate::NodeId).
    pub id: u32,
}

impl Processing {
    #[must_use]
    pub fn new(kind: ProcessingKind, id: u32) -> Self {
        Self { kind, id }
    }
}

impl Display for Processing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod test {
    use super::*;

    #[test]
    fn numa_node_spellings_agree() {
        let underscored = ProcessingKind::parse("NUMA_NODE").unwrap();
        let concatenated = ProcessingKind::parse("numanode").unwrap();
        assert_eq!(underscored, concatenated);
        assert_eq!(underscored, ProcessingKind::NumaNode);
        assert_eq!(ProcessingKind::parse("NumaNode").unwrap(), ProcessingKind::NumaNode);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ProcessingKind::parse("PACKAGE").unwrap(), ProcessingKind::Package);
        assert_eq!(ProcessingKind::parse("Core").unwrap(), ProcessingKind::Core);
        assert_eq!(ProcessingKind::parse("tHrEaD").unwrap(), ProcessingKind::Thread);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(
            ProcessingKind::parse("bogus").unwrap_err(),
            ElementDecodeError::UnknownKind("bogus".to_string())
        );
        assert!(ProcessingKind::parse("").is_err());
        assert!(ProcessingKind::parse("numa node").is_err());
    }

    #[test]
    fn wire_form_parses_back() {
        for kind in ProcessingKind::iter() {
            assert_eq!(ProcessingKind::parse(kind.as_str()).unwrap(), kind);
            // the human form is accepted too
            assert_eq!(ProcessingKind::parse(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn wire_forms() {
        let wire: Vec<_> = ProcessingKind::iter().map(ProcessingKind::as_str).collect();
        assert_eq!(wire, ["package", "numanode", "core", "thread"]);
    }

    #[test]
    fn processing_display() {
        assert_eq!(
            Processing::new(ProcessingKind::NumaNode, 1).to_string(),
            "NUMANode(1)"
        );
        assert_eq!(Processing::new(ProcessingKind::Thread, 17).to_string(), "Thread(17)");
    }

    #[test]
    fn processing_serde_shape() {
        let json = serde_json::to_value(Processing::new(ProcessingKind::Core, 3)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "core", "id": 3}));
        let back: Processing = serde_json::from_value(serde_json::json!({"kind": "CORE", "id": 3}))
            .unwrap();
        assert_eq!(back, Processing::new(ProcessingKind::Core, 3));
    }
}
