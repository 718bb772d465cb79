// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::fmt::{Display, Formatter};
use std::ops::Deref;

use rkyv::util::AlignedVec;

use crate::cache::CacheLevel;
use crate::codec::{self, DecodeError, EncodeError};
use crate::element::Element;
use crate::processing::ProcessingKind;
use crate::tree::{NodeId, Tree};

/// The hardware topology of a machine.
///
/// A thin wrapper over [`Tree`] (which it derefs to) adding lookups by processing kind and cache
/// level.
/// Like the tree, a `Topology` is immutable once built.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Topology {
    tree: Tree,
}

impl Topology {
    /// Decode a topology from a JSON document.
    ///
    /// # Errors
    ///
    /// See [`crate::decode`].
    pub fn decode(document: &[u8]) -> Result<Topology, DecodeError> {
        codec::decode(document)
    }

    /// Encode this topology as a compact JSON document.
    ///
    /// # Errors
    ///
    /// See [`crate::encode`].
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        codec::encode(self)
    }

    /// Encode this topology as an indented JSON document.
    ///
    /// # Errors
    ///
    /// See [`crate::encode`].
    pub fn encode_pretty(&self) -> Result<Vec<u8>, EncodeError> {
        codec::encode_pretty(self)
    }

    /// Archive this topology with `rkyv`.
    ///
    /// # Errors
    ///
    /// See [`Tree::to_snapshot`].
    pub fn to_snapshot(&self) -> Result<AlignedVec, EncodeError> {
        self.tree.to_snapshot()
    }

    /// Restore a topology from bytes produced by [`Topology::to_snapshot`].
    ///
    /// # Errors
    ///
    /// See [`Tree::from_snapshot`].
    pub fn from_snapshot(bytes: &[u8]) -> Result<Topology, DecodeError> {
        Tree::from_snapshot(bytes).map(Topology::from)
    }

    /// Returns the underlying tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Returns the underlying tree, consuming the topology.
    #[must_use]
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Ids of all nodes whose element matches `predicate`, in ascending order.
    fn filter(&self, predicate: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.tree
            .iter()
            .filter(|(_, node)| predicate(node.element()))
            .map(|(id, _)| id)
            .collect()
    }

    /// Ids of all processing units of the given kind.
    #[must_use]
    pub fn processing_units(&self, kind: ProcessingKind) -> Vec<NodeId> {
        self.filter(|element| element.is_processing_kind(kind))
    }

    /// Ids of all caches of the given level.
    #[must_use]
    pub fn caches(&self, level: CacheLevel) -> Vec<NodeId> {
        self.filter(|element| element.is_cache_level(level))
    }

    /// Ids of all CPU packages.
    #[must_use]
    pub fn packages(&self) -> Vec<NodeId> {
        self.processing_units(ProcessingKind::Package)
    }

    /// Ids of all NUMA nodes.
    #[must_use]
    pub fn numa_nodes(&self) -> Vec<NodeId> {
        self.processing_units(ProcessingKind::NumaNode)
    }

    /// Ids of all physical cores.
    #[must_use]
    pub fn cores(&self) -> Vec<NodeId> {
        self.processing_units(ProcessingKind::Core)
    }

    /// Ids of all hardware threads.
    #[must_use]
    pub fn threads(&self) -> Vec<NodeId> {
        self.processing_units(ProcessingKind::Thread)
    }

    /// Returns the ids of all L1 caches.
    #[must_use]
    pub fn l1_caches(&self) -> Vec<NodeId> {
        self.caches(CacheLevel::L1)
    }

    /// Returns the ids of all L2 caches.
    #[must_use]
    pub fn l2_caches(&self) -> Vec<NodeId> {
        self.caches(CacheLevel::L2)
    }

    /// Returns the ids of all L3 caches.
    #[must_use]
    pub fn l3_caches(&self) -> Vec<NodeId> {
        self.caches(CacheLevel::L3)
    }

    /// Returns the ids of all L4 caches.
    #[must_use]
    pub fn l4_caches(&self) -> Vec<NodeId> {
        self.caches(CacheLevel::L4)
    }

    /// Returns the ids of all L5 caches.
    #[must_use]
    pub fn l5_caches(&self) -> Vec<NodeId> {
        self.caches(CacheLevel::L5)
    }
}

impl From<Tree> for Topology {
    fn from(tree: Tree) -> Self {
        Topology { tree }
    }
}

impl Deref for Topology {
    type Target = Tree;

    fn deref(&self) -> &Tree {
        &self.tree
    }
}

impl Display for Topology {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.tree, f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod test {
    use super::*;
    use crate::cache::Cache;
    use crate::processing::Processing;
    use crate::tree::test::{ids, random_tree, small};

    #[test]
    fn example_filters() {
        let topology = Topology::from(small());
        assert_eq!(topology.numa_nodes(), ids(&[1, 2]));
        assert_eq!(topology.cores(), ids(&[3]));
    }

    #[test]
    fn missing_kinds_are_empty() {
        let topology = Topology::from(small());
        assert!(topology.packages().is_empty());
        assert!(topology.threads().is_empty());
        for level in CacheLevel::iter() {
            assert!(topology.caches(level).is_empty());
        }
        let empty = Topology::default();
        assert!(empty.cores().is_empty());
        assert!(empty.l3_caches().is_empty());
    }

    #[test]
    fn deref_exposes_tree_queries() {
        let topology = Topology::from(small());
        assert_eq!(topology.size(), 4);
        assert_eq!(topology.parent_id(NodeId::new(3)).unwrap(), NodeId::new(1));
        assert_eq!(topology.tree(), &small());
        assert_eq!(topology.to_string(), small().to_string());
        assert_eq!(topology.into_tree(), small());
    }

    #[test]
    fn filters_partition_the_non_root_nodes() {
        bolero::check!()
            .with_type::<Vec<(u16, Option<Cache>, Processing)>>()
            .for_each(|shape| {
                let topology = Topology::from(random_tree(shape));
                let mut all: Vec<NodeId> = ProcessingKind::iter()
                    .flat_map(|kind| topology.processing_units(kind))
                    .chain(CacheLevel::iter().flat_map(|level| topology.caches(level)))
                    .collect();
                for kind in ProcessingKind::iter() {
                    let found = topology.processing_units(kind);
                    assert!(found.windows(2).all(|pair| pair[0] < pair[1]));
                    assert!(found.iter().all(|&id| topology.get(id).unwrap().is_processing_kind(kind)));
                }
                all.sort();
                let expected: Vec<NodeId> = topology.iter().skip(1).map(|(id, _)| id).collect();
                assert_eq!(all, expected);
            });
    }

    #[test]
    fn snapshot_round_trip() {
        let topology = Topology::from(small());
        let bytes = topology.to_snapshot().unwrap();
        let restored = Topology::from_snapshot(&bytes).unwrap();
        assert_eq!(restored, topology);
        assert_eq!(restored.numa_nodes(), ids(&[1, 2]));
        assert_eq!(restored.ancestor_ids(NodeId::new(3)).unwrap(), ids(&[1, 0]));
        assert!(matches!(
            Topology::default().to_snapshot(),
            Err(EncodeError::Empty)
        ));
    }
}
