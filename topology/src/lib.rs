// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
// # Hardware topology representation

//! The `hwtopo` crate represents the hierarchical hardware topology of a physical machine
//! (packages, NUMA nodes, cores, hardware threads and caches) as an immutable, index addressed
//! tree, together with a JSON wire codec and navigation queries.
//!
//! ## Architecture
//!
//! - [`ProcessingKind`] and [`CacheLevel`] are closed sets of string keyed values.
//! - An [`Element`] is what a node *is*: the machine ([`Element::Root`]), a [`Processing`] unit,
//!   or a [`Cache`].
//! - A [`Tree`] stores [`TreeNode`]s by position ([`NodeId`]); node `0` is always the machine.
//!   The parent of every node is indexed when the tree is built, so parent lookups are O(1) and
//!   ancestor walks are O(depth).
//! - A [`Topology`] wraps a tree and adds filters such as [`Topology::numa_nodes`] or
//!   [`Topology::l3_caches`].
//!
//! Discovering the topology of the running machine is out of scope: documents are produced
//! elsewhere and handed to [`decode`] as bytes.
//!
//! ## Concurrency
//!
//! Neither [`Tree`] nor [`Topology`] has a mutating method.
//! Once decoded, a topology can be shared freely between threads; replacing it with a newer one
//! is the caller's business.
//!
//! ## Snapshots
//!
//! [`Topology::to_snapshot`] archives the nodes with `rkyv`.
//! [`Topology::from_snapshot`] checks the archive and rebuilds the tree with [`Tree::new`], so a
//! snapshot is held to the same rules as a JSON document.
//!
//! ## Example
//!
//! ```
//! use hwtopo::NodeId;
//!
//! let topology = hwtopo::decode(br#"{"nodes": [
//!     {"data": "machine", "desc": [1, 2]},
//!     {"data": {"processing": {"kind": "numanode", "id": 0}}, "desc": [3]},
//!     {"data": {"processing": {"kind": "numanode", "id": 1}}},
//!     {"data": {"processing": {"kind": "core", "id": 0}}}
//! ]}"#)?;
//!
//! assert_eq!(topology.numa_nodes(), vec![NodeId::new(1), NodeId::new(2)]);
//! assert_eq!(topology.ancestor_ids(NodeId::new(3))?, vec![NodeId::new(1), NodeId::ROOT]);
//! assert_eq!(topology.parent_id(NodeId::new(1))?, NodeId::ROOT);
//!
//! let reencoded = hwtopo::encode(&topology)?;
//! assert_eq!(hwtopo::decode(&reencoded)?, topology);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Features
//!
//! - `bolero`: derives `bolero::TypeGenerator` for the data types, for property testing and
//!   fuzzing in downstream crates.

#![deny(clippy::pedantic, clippy::unwrap_used)]

mod cache;
mod codec;
mod element;
mod processing;
mod topology;
mod tree;

pub use cache::{Cache, CacheAttributes, CacheLevel};
pub use codec::{DecodeError, EncodeError, decode, encode, encode_pretty};
pub use element::{Element, ElementDecodeError, ROOT_TOKEN};
pub use processing::{Processing, ProcessingKind};
pub use topology::Topology;
pub use tree::{NodeId, Tree, TreeError, TreeNode};
