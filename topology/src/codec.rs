// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! JSON document codec.
//!
//! A topology document has the shape
//!
//! ```text
//! {"nodes": [{"data": <element>, "desc": [<node id>, ...]}, ...]}
//! ```
//!
//! where `desc` may be omitted for leaves (and is omitted on encode).

use serde_json::Value;
use tracing::{debug, instrument};

use crate::element::{Element, ElementDecodeError};
use crate::topology::Topology;
use crate::tree::{NodeId, Tree, TreeNode};

/// Errors which can occur when decoding a topology document (or building a [`Tree`]).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Malformed JSON, or a document of the wrong shape.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to decode element of node {node}: {source}")]
    Element {
        node: NodeId,
        #[source]
        source: ElementDecodeError,
    },
    #[error("the topology has no nodes")]
    Empty,
    #[error("{0} nodes do not fit in a NodeId")]
    TooManyNodes(usize),
    #[error("node 0 is not the machine")]
    RootNotFirst,
    #[error("node {0} is a machine, but only node 0 may be")]
    MisplacedRoot(NodeId),
    #[error("node {parent} lists non-existent child {child}")]
    DanglingChild { parent: NodeId, child: NodeId },
    #[error("node {0} lists itself as a child")]
    ChildOfItself(NodeId),
    #[error("node {parent} lists the root as a child")]
    RootHasParent { parent: NodeId },
    #[error("node {child} is listed as a child by both node {first} and node {second}")]
    MultipleParents {
        child: NodeId,
        first: NodeId,
        second: NodeId,
    },
    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),
    /// A snapshot which is not a valid archive of a node list.
    #[error("invalid topology snapshot: {0}")]
    Archive(#[from] rkyv::rancor::Error),
}

/// Errors which can occur when encoding a topology document (or snapshot).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// An empty tree has no valid encoding: it would decode to [`DecodeError::Empty`].
    #[error("cannot encode an empty topology")]
    Empty,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to archive topology: {0}")]
    Archive(#[from] rkyv::rancor::Error),
}

/// Document as read off the wire, before element decoding and validation.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct RawTree {
    nodes: Vec<RawNode>,
}

#[derive(Debug, serde::Deserialize)]
struct RawNode {
    data: Value,
    #[serde(default)]
    desc: Option<Vec<NodeId>>,
}

impl TryFrom<RawTree> for Tree {
    type Error = DecodeError;

    fn try_from(raw: RawTree) -> Result<Self, Self::Error> {
        let nodes = raw
            .nodes
            .into_iter()
            .enumerate()
            .map(|(index, node)| {
                let element = Element::from_value(&node.data).map_err(|source| {
                    DecodeError::Element {
                        node: NodeId::new(u32::try_from(index).unwrap_or(u32::MAX)),
                        source,
                    }
                })?;
                Ok(TreeNode::new(element, node.desc.unwrap_or_default()))
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;
        Tree::new(nodes)
    }
}

/// Decode a topology document.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the document is not valid JSON, has the wrong shape, contains an
/// element which cannot be decoded, or does not describe a single tree rooted at node `0`.
///
/// # Examples
///
/// ```
/// let topology = hwtopo::decode(br#"{"nodes": [
///     {"data": "machine", "desc": [1]},
///     {"data": {"processing": {"kind": "package", "id": 0}}}
/// ]}"#).unwrap();
/// assert_eq!(topology.packages(), vec![hwtopo::NodeId::new(1)]);
/// ```
#[instrument(level = "debug", skip_all, fields(bytes = document.len()))]
pub fn decode(document: &[u8]) -> Result<Topology, DecodeError> {
    let raw: RawTree = serde_json::from_slice(document)?;
    debug!("decoding {} nodes", raw.nodes.len());
    Tree::try_from(raw).map(Topology::from)
}

/// Encode a topology as a compact JSON document.
///
/// # Errors
///
/// Returns [`EncodeError::Empty`] for an empty topology (such as `Topology::default()`), or
/// [`EncodeError::Json`] if serialization fails.
#[instrument(level = "debug", skip_all, fields(nodes = topology.size()))]
pub fn encode(topology: &Topology) -> Result<Vec<u8>, EncodeError> {
    non_empty(topology)?;
    Ok(serde_json::to_vec(topology)?)
}

/// Encode a topology as an indented JSON document.
///
/// # Errors
///
/// See [`encode`].
#[instrument(level = "debug", skip_all, fields(nodes = topology.size()))]
pub fn encode_pretty(topology: &Topology) -> Result<Vec<u8>, EncodeError> {
    non_empty(topology)?;
    Ok(serde_json::to_vec_pretty(topology)?)
}

fn non_empty(topology: &Topology) -> Result<(), EncodeError> {
    if topology.is_empty() {
        return Err(EncodeError::Empty);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod test {
    use super::*;
    use crate::cache::Cache;
    use crate::processing::Processing;
    use crate::tree::test::{random_tree, small};
    use serde_json::json;

    #[test]
    fn encoded_document_shape() {
        let topology = Topology::from(small());
        let encoded: Value = serde_json::from_slice(&encode(&topology).unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({"nodes": [
                {"data": "machine", "desc": [1, 2]},
                {"data": {"processing": {"kind": "numanode", "id": 0}}, "desc": [3]},
                {"data": {"processing": {"kind": "numanode", "id": 1}}},
                {"data": {"processing": {"kind": "core", "id": 0}}},
            ]})
        );
    }

    #[test]
    fn desc_may_be_absent_empty_or_null() {
        let topology = decode(
            br#"{"nodes": [
                {"data": "machine", "desc": [1, 2, 3]},
                {"data": {"processing": {"kind": "core", "id": 0}}},
                {"data": {"processing": {"kind": "core", "id": 1}}, "desc": []},
                {"data": {"processing": {"kind": "core", "id": 2}}, "desc": null}
            ]}"#,
        )
        .unwrap();
        assert_eq!(topology.cores().len(), 3);
        assert_eq!(topology.leaf_descendant_ids(NodeId::ROOT).unwrap().len(), 3);
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(decode(b"{\"nodes\": ["), Err(DecodeError::Json(_))));
        assert!(matches!(decode(b"[]"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode(br#"{"nodes": [{"data": "machine", "desc": [-1]}]}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn element_errors_name_the_node() {
        let err = decode(
            br#"{"nodes": [
                {"data": "machine", "desc": [1]},
                {"data": {"cache": {"lvl": "l2", "li": 0, "attrs": {"size": 1, "line": 1, "ways": 1}}}}
            ]}"#,
        )
        .unwrap_err();
        match err {
            DecodeError::Element { node, source } => {
                assert_eq!(node, NodeId::new(1));
                assert_eq!(source, ElementDecodeError::UnknownLevel("l2".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(decode(br#"{"nodes": []}"#), Err(DecodeError::Empty)));
        assert!(matches!(
            decode(br#"{"nodes": [{"data": {"processing": {"kind": "core", "id": 0}}}]}"#),
            Err(DecodeError::RootNotFirst)
        ));
        assert!(matches!(
            decode(br#"{"nodes": [{"data": "machine", "desc": [4]}]}"#),
            Err(DecodeError::DanglingChild { .. })
        ));
    }

    #[test]
    fn empty_topology_is_not_encoded() {
        let empty = Topology::default();
        assert!(matches!(encode(&empty), Err(EncodeError::Empty)));
        assert!(matches!(encode_pretty(&empty), Err(EncodeError::Empty)));
        // the document it would have produced is rejected on decode
        assert!(matches!(decode(br#"{"nodes":[]}"#), Err(DecodeError::Empty)));
    }

    #[test]
    fn round_trip() {
        bolero::check!()
            .with_type::<Vec<(u16, Option<Cache>, Processing)>>()
            .for_each(|shape| {
                let topology = Topology::from(random_tree(shape));
                let compact = decode(&encode(&topology).unwrap()).unwrap();
                assert_eq!(compact, topology);
                let pretty = decode(&encode_pretty(&topology).unwrap()).unwrap();
                assert_eq!(pretty, topology);
            });
    }
}
