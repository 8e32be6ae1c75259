//! Identifiers, attribute sets and owned node descriptions.

use core::fmt::{self, Display, Formatter};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies a node uniquely within its tree for (at least) the duration of a reconciliation pass.
///
/// Serialized output refers to nodes through the [`Display`] form, `n{number}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct NodeId(u32);
impl NodeId {
	#[must_use]
	pub const fn new(value: u32) -> Self {
		Self(value)
	}

	#[must_use]
	pub const fn get(self) -> u32 {
		self.0
	}
}
impl Display for NodeId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "n{}", self.0)
	}
}
impl From<u32> for NodeId {
	fn from(value: u32) -> Self {
		Self(value)
	}
}

/// Name → value attribute map, ordered by name so that snapshots compare and serialize deterministically.
pub type Attributes = BTreeMap<String, String>;

/// Owned description of a node and (for containers) its complete subtree.
///
/// This is what insertions and replacements carry to the client, and what [`crate::load`] builds documents from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Node {
	Leaf { id: NodeId, tag: String, attributes: Attributes },
	Container { id: NodeId, tag: String, attributes: Attributes, children: Vec<Node> },
}
impl Node {
	#[must_use]
	pub fn leaf(id: impl Into<NodeId>, tag: impl Into<String>) -> Self {
		Self::Leaf {
			id: id.into(),
			tag: tag.into(),
			attributes: Attributes::new(),
		}
	}

	#[must_use]
	pub fn container(id: impl Into<NodeId>, tag: impl Into<String>, children: Vec<Node>) -> Self {
		Self::Container {
			id: id.into(),
			tag: tag.into(),
			attributes: Attributes::new(),
			children,
		}
	}

	/// Adds or replaces an attribute, builder-style.
	#[must_use]
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		match &mut self {
			Self::Leaf { attributes, .. } | Self::Container { attributes, .. } => {
				attributes.insert(name.into(), value.into());
			}
		}
		self
	}

	#[must_use]
	pub fn id(&self) -> NodeId {
		match *self {
			Self::Leaf { id, .. } | Self::Container { id, .. } => id,
		}
	}

	#[must_use]
	pub fn tag(&self) -> &str {
		match self {
			Self::Leaf { tag, .. } | Self::Container { tag, .. } => tag,
		}
	}

	#[must_use]
	pub fn attributes(&self) -> &Attributes {
		match self {
			Self::Leaf { attributes, .. } | Self::Container { attributes, .. } => attributes,
		}
	}

	/// `None` for leaves.
	#[must_use]
	pub fn children(&self) -> Option<&[Node]> {
		match self {
			Self::Leaf { .. } => None,
			Self::Container { children, .. } => Some(children),
		}
	}

	#[must_use]
	pub fn is_container(&self) -> bool {
		matches!(self, Self::Container { .. })
	}

	/// Number of nodes in this subtree, including `self`.
	#[must_use]
	pub fn subtree_len(&self) -> usize {
		1 + self.children().map_or(0, |children| children.iter().map(Node::subtree_len).sum())
	}

	/// Visits this node and all of its descendants in document order.
	pub fn for_each(&self, f: &mut impl FnMut(&Node)) {
		f(self);
		if let Some(children) = self.children() {
			for child in children {
				child.for_each(f)
			}
		}
	}
}
