// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Index addressed topology tree.
//!
//! A [`Tree`] is a flat list of [`TreeNode`]s.
//! The position of a node in that list is its [`NodeId`], and node `0` is always the
//! [`Element::Root`].
//! Every other node is listed as a child by exactly one node, and every node is reachable from the
//! root.
//! These invariants are verified once, when the tree is built, and the parent of every node is
//! indexed at the same time.
//! A built tree cannot be modified.

use std::fmt::{Display, Formatter};

use rkyv::util::AlignedVec;
use tracing::{debug, instrument, trace, warn};

use crate::codec::{DecodeError, EncodeError, RawTree};
use crate::element::Element;

/// Position of a node in its [`Tree`].
///
/// Ids are assigned by position when the tree is built and never change afterwards.
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
#[serde(transparent)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Id of the root node.
    pub const ROOT: NodeId = NodeId(0);

    /// Returns the id of the node stored at position `id`.
    #[must_use]
    pub const fn new(id: u32) -> NodeId {
        NodeId(id)
    }

    /// Returns the position this id refers to.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    /// Only called on positions of a tree, whose length is checked to fit a `u32`.
    #[allow(clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> NodeId {
        NodeId(index as u32)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> u32 {
        id.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors returned by [`Tree`] queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The tree holds no nodes at all.
    #[error("the tree is empty")]
    Empty,
    #[error("invalid node id {id}: the tree has {size} nodes")]
    InvalidNodeId { id: NodeId, size: usize },
    /// Parent queries on the root.
    #[error("the root element does not have a parent")]
    NoParent,
}

/// An [`Element`] with the ids of its immediate descendants.
#[derive(
    Clone,
    Debug,
    Eq,
    Hash,
    PartialEq,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
    serde::Serialize,
)]
pub struct TreeNode {
    data: Element,
    #[serde(rename = "desc", skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeId>,
}

impl TreeNode {
    /// Returns a node holding `element`, with `children` as its immediate descendants.
    #[must_use]
    pub fn new(element: Element, children: Vec<NodeId>) -> Self {
        Self {
            data: element,
            children,
        }
    }

    /// A node without children.
    #[must_use]
    pub fn leaf(element: Element) -> Self {
        Self::new(element, Vec::new())
    }

    /// Returns what this node represents.
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.data
    }

    /// Ids of the immediate descendants, in stored order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns true if the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The hardware topology hierarchy.
///
/// `Tree::default()` is an empty tree: every query on it fails with [`TreeError::Empty`], and it
/// can be neither encoded nor snapshotted.
/// Trees built with [`Tree::new`] (or decoded, or restored from a snapshot) are never empty.
///
/// A `Tree` has no mutating methods, so a shared reference may be read from any number of threads.
/// Swapping in a new topology is up to the caller (e.g. behind an `Arc` / `RwLock`).
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawTree")]
pub struct Tree {
    nodes: Vec<TreeNode>,
    /// `parents[i]` is the parent of node `i`; `None` only for the root.
    #[serde(skip)]
    parents: Vec<Option<NodeId>>,
}

impl Tree {
    /// Build a tree from its complete node list.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the nodes do not form a single tree rooted at node `0`.
    #[instrument(level = "debug", skip_all, fields(nodes = nodes.len()))]
    pub fn new(nodes: Vec<TreeNode>) -> Result<Tree, DecodeError> {
        let parents = index_parents(&nodes)
            .inspect_err(|err| warn!("rejected topology tree: {err}"))?;
        debug!("built topology tree");
        Ok(Tree { nodes, parents })
    }

    /// Archive the nodes of this tree with `rkyv`.
    ///
    /// The parent index is not part of the snapshot; it is rebuilt by [`Tree::from_snapshot`].
    ///
    /// # Errors
    ///
    /// [`EncodeError::Empty`] for an empty tree, or [`EncodeError::Archive`] if serialization
    /// fails.
    pub fn to_snapshot(&self) -> Result<AlignedVec, EncodeError> {
        if self.nodes.is_empty() {
            return Err(EncodeError::Empty);
        }
        Ok(rkyv::to_bytes::<rkyv::rancor::Error>(&self.nodes)?)
    }

    /// Restore a tree from bytes produced by [`Tree::to_snapshot`].
    ///
    /// The archive is checked before it is read, and the restored nodes go through [`Tree::new`].
    ///
    /// # Errors
    ///
    /// [`DecodeError::Archive`] if `bytes` is not a valid archive of a node list, or any structural
    /// [`DecodeError`] if the nodes do not form a tree.
    #[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
    pub fn from_snapshot(bytes: &[u8]) -> Result<Tree, DecodeError> {
        let nodes = rkyv::from_bytes::<Vec<TreeNode>, rkyv::rancor::Error>(bytes)?;
        Tree::new(nodes)
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with their ids, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::from_index(index), node))
    }

    fn checked(&self, id: NodeId) -> Result<&TreeNode, TreeError> {
        if self.nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        self.nodes.get(id.index()).ok_or(TreeError::InvalidNodeId {
            id,
            size: self.nodes.len(),
        })
    }

    /// The element at the root of the tree.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] if the tree is empty.
    pub fn root(&self) -> Result<&Element, TreeError> {
        self.nodes
            .first()
            .map(TreeNode::element)
            .ok_or(TreeError::Empty)
    }

    /// The node stored under `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn node(&self, id: NodeId) -> Result<&TreeNode, TreeError> {
        self.checked(id)
    }

    /// The element stored under `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn get(&self, id: NodeId) -> Result<&Element, TreeError> {
        self.checked(id).map(TreeNode::element)
    }

    /// Ids of the children of `id`, in stored order.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn immediate_descendant_ids(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        self.checked(id).map(TreeNode::children)
    }

    /// Elements of the children of `id`, in stored order.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn immediate_descendants(&self, id: NodeId) -> Result<Vec<&Element>, TreeError> {
        Ok(self
            .checked(id)?
            .children()
            .iter()
            .map(|&child| self.element(child))
            .collect())
    }

    /// Ids of every leaf in the subtree rooted at `id` (`id` itself if it is a leaf).
    ///
    /// Leaves are listed in depth-first, left-to-right order.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn leaf_descendant_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.checked(id)?;
        let mut leaves = Vec::new();
        let mut stack = Vec::with_capacity(self.nodes.len() / 2);
        stack.push(id);
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.index()];
            if node.is_leaf() {
                leaves.push(current);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        trace!("{} leaves under node {id}", leaves.len());
        Ok(leaves)
    }

    /// Elements of every leaf in the subtree rooted at `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn leaf_descendants(&self, id: NodeId) -> Result<Vec<&Element>, TreeError> {
        Ok(self
            .leaf_descendant_ids(id)?
            .into_iter()
            .map(|leaf| self.element(leaf))
            .collect())
    }

    /// Id of the parent of `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::NoParent`] for the root, else [`TreeError::Empty`] or
    /// [`TreeError::InvalidNodeId`].
    pub fn parent_id(&self, id: NodeId) -> Result<NodeId, TreeError> {
        self.checked(id)?;
        if id == NodeId::ROOT {
            return Err(TreeError::NoParent);
        }
        Ok(self.parent_of(id))
    }

    /// Element of the parent of `id`.
    ///
    /// # Errors
    ///
    /// See [`Tree::parent_id`].
    pub fn parent(&self, id: NodeId) -> Result<&Element, TreeError> {
        self.parent_id(id).map(|parent| self.element(parent))
    }

    /// Ids of every ancestor of `id`: parent first, root last.
    ///
    /// The root has no ancestors.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn ancestor_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.checked(id)?;
        let mut ancestors = Vec::new();
        let mut current = id;
        while current != NodeId::ROOT {
            current = self.parent_of(current);
            ancestors.push(current);
        }
        Ok(ancestors)
    }

    /// Elements of every ancestor of `id`: parent first, root last.
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<&Element>, TreeError> {
        Ok(self
            .ancestor_ids(id)?
            .into_iter()
            .map(|ancestor| self.element(ancestor))
            .collect())
    }

    /// Distance from the root (the root has depth 0).
    ///
    /// # Errors
    ///
    /// [`TreeError::Empty`] or [`TreeError::InvalidNodeId`].
    pub fn depth(&self, id: NodeId) -> Result<usize, TreeError> {
        self.checked(id)?;
        let mut depth = 0;
        let mut current = id;
        while current != NodeId::ROOT {
            current = self.parent_of(current);
            depth += 1;
        }
        Ok(depth)
    }

    /// Element under an id already known to be in bounds.
    fn element(&self, id: NodeId) -> &Element {
        &self.nodes[id.index()].data
    }

    /// # Panics
    ///
    /// If a non-root node has no parent, i.e. the tree invariants are broken.
    fn parent_of(&self, id: NodeId) -> NodeId {
        match self.parents[id.index()] {
            Some(parent) => parent,
            None => unreachable!("node {id} has no parent in a validated tree"),
        }
    }
}

/// Check the tree invariants and return the parent of every node.
fn index_parents(nodes: &[TreeNode]) -> Result<Vec<Option<NodeId>>, DecodeError> {
    if nodes.len() > u32::MAX as usize {
        return Err(DecodeError::TooManyNodes(nodes.len()));
    }
    match nodes.first() {
        None => return Err(DecodeError::Empty),
        Some(root) if !root.data.is_root() => return Err(DecodeError::RootNotFirst),
        Some(_) => {}
    }
    let mut parents: Vec<Option<NodeId>> = vec![None; nodes.len()];
    for (parent, node) in nodes.iter().enumerate() {
        let parent = NodeId::from_index(parent);
        if parent != NodeId::ROOT && node.data.is_root() {
            return Err(DecodeError::MisplacedRoot(parent));
        }
        for &child in &node.children {
            if child == parent {
                return Err(DecodeError::ChildOfItself(child));
            }
            if child == NodeId::ROOT {
                return Err(DecodeError::RootHasParent { parent });
            }
            match parents.get_mut(child.index()) {
                None => return Err(DecodeError::DanglingChild { parent, child }),
                Some(Some(first)) => {
                    return Err(DecodeError::MultipleParents {
                        child,
                        first: *first,
                        second: parent,
                    });
                }
                Some(slot) => *slot = Some(parent),
            }
        }
    }
    // Every node has at most one parent and the root has none, so a walk from the root visits each
    // node at most once.  Whatever it misses is an orphan or part of a detached cycle.
    let mut reached = vec![false; nodes.len()];
    let mut stack = vec![NodeId::ROOT];
    while let Some(id) = stack.pop() {
        reached[id.index()] = true;
        stack.extend(&nodes[id.index()].children);
    }
    if let Some(unreached) = reached.iter().position(|reached| !reached) {
        return Err(DecodeError::Unreachable(NodeId::from_index(unreached)));
    }
    Ok(parents)
}

impl TryFrom<Vec<TreeNode>> for Tree {
    type Error = DecodeError;

    fn try_from(nodes: Vec<TreeNode>) -> Result<Self, Self::Error> {
        Tree::new(nodes)
    }
}

impl Display for Tree {
    /// One node per line, indented by depth.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.nodes.is_empty() {
            return writeln!(f, "(empty)");
        }
        let mut stack = vec![(NodeId::ROOT, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.index()];
            writeln!(f, "{:indent$}#{id} {}", "", node.data, indent = depth * 2)?;
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
        Ok(())
    }
}
