use crate::node::{Attributes, Node, NodeId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A primitive client-side DOM mutation.
///
/// Applying a pass's operations in order transforms the previously rendered tree into the current one.
/// No intermediate state contains two nodes with the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operation {
	/// Remove `node` and its subtree.
	Delete { node: NodeId },
	/// Insert `content` into `parent` directly after its child `after`, or as first child if `after` is `None`.
	InsertAfter { parent: NodeId, after: Option<NodeId>, content: Node },
	/// Replace all children of `container` with `content`.
	ReplaceChildren { container: NodeId, content: Vec<Node> },
	/// Replace all attributes of `node` with `attributes`.
	ChangeAttributes { node: NodeId, attributes: Attributes },
}
impl Operation {
	/// The node this operation is addressed to: the removed or changed node, the insertion parent or the replaced container.
	#[must_use]
	pub fn target(&self) -> NodeId {
		match *self {
			Self::Delete { node } | Self::ChangeAttributes { node, .. } => node,
			Self::InsertAfter { parent, .. } => parent,
			Self::ReplaceChildren { container, .. } => container,
		}
	}

	#[must_use]
	pub fn is_delete(&self) -> bool {
		matches!(self, Self::Delete { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insertions_target_their_parent() {
		let insertion = Operation::InsertAfter {
			parent: NodeId::new(1),
			after: Some(NodeId::new(2)),
			content: Node::leaf(3, "li"),
		};
		assert_eq!(insertion.target(), NodeId::new(1));
		assert!(!insertion.is_delete());
		assert!(Operation::Delete { node: NodeId::new(3) }.is_delete());
	}
}
