//! The capability set a [`Reconciler`](`crate::Reconciler`) needs from whatever owns the node tree.

use crate::node::{Attributes, NodeId};

/// Read access to the current tree plus its delta bookkeeping since the last reconciliation pass.
///
/// "Previous" always refers to the state the client was last brought to, i.e. the end of the last successful pass.
///
/// # Contract
///
/// For every container `c` with recorded [`previous_children`](`NodeTree::previous_children`):
///
/// - every node in `children(c)` whose [`previous_parent`](`NodeTree::previous_parent`) is `c` appears in `previous_children(c)`,
/// - every node in `previous_children(c)` whose [`current_parent`](`NodeTree::current_parent`) is `c` appears in `children(c)`.
///
/// Any change to a node must be reflected by [`subtree_dirty`](`NodeTree::subtree_dirty`) on all of its ancestors.
///
/// Implementations that break this contract cause [`ReconcileError::InconsistentSnapshot`](`crate::ReconcileError::InconsistentSnapshot`).
///
/// # Panics
///
/// The reconciler only queries the pass root after checking [`contains`](`NodeTree::contains`),
/// and otherwise only IDs this tree handed out itself. Implementations may panic on any other ID.
pub trait NodeTree {
	fn contains(&self, node: NodeId) -> bool;

	fn is_container(&self, node: NodeId) -> bool;

	fn tag(&self, node: NodeId) -> &str;

	fn attributes(&self, node: NodeId) -> &Attributes;

	/// Current children in order. Empty for leaves.
	fn children(&self, container: NodeId) -> &[NodeId];

	/// The children as they were rendered, if the child list changed structurally since.
	///
	/// `None` means the container is not tree-dirty (and is always the case for leaves).
	fn previous_children(&self, container: NodeId) -> Option<&[NodeId]>;

	fn has_changed_attributes(&self, node: NodeId) -> bool;

	/// Whether any descendant of `container` has attribute or tree changes.
	fn subtree_dirty(&self, container: NodeId) -> bool;

	fn current_parent(&self, node: NodeId) -> Option<NodeId>;

	/// The parent `node` had when last rendered, or `None` if it was not rendered at all.
	fn previous_parent(&self, node: NodeId) -> Option<NodeId>;

	/// Containers for which fine-grained child diffing is never wanted.
	fn must_render_children_fully(&self, _container: NodeId) -> bool {
		false
	}

	/// Called once for each node the reconciler visited, after it is done with it.
	fn clear_dirty_state(&mut self, node: NodeId);

	/// Called after a successful pass over the tree topped by `root`.
	///
	/// Implementations should reset any bookkeeping left on nodes of that tree the pass did not visit,
	/// e.g. nodes that were detached or rendered as part of new content.
	/// Other trees' changes must be kept for their own passes.
	fn finish_pass(&mut self, _root: NodeId) {}
}
