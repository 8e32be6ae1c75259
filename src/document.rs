//! An arena-backed node tree that keeps the delta bookkeeping [`Reconciler`](`crate::Reconciler`) consumes.
//!
//! Mutations between two passes are tracked lazily:
//!
//! - The first structural change to a container records its previous child list.
//! - The first parent change of a node records the parent it was rendered under.
//! - Attribute changes set a flag on the node itself.
//! - Any of these mark all ancestors as having a dirty subtree.
//!
//! [`NodeTree::finish_pass`] resets all of it once the client has been brought up to date.
//! A pass over a detached subtree only resets that subtree, so changes elsewhere wait for the pass over [`Document::root`].

use crate::{
	error::DocumentError,
	node::{Attributes, Node, NodeId},
	provider::NodeTree,
};
use hashbrown::{HashMap, HashSet};
use tracing::{instrument, trace};

#[derive(Debug)]
pub struct Document {
	nodes: HashMap<NodeId, Slot>,
	root: NodeId,
	next_id: u32,
	/// Nodes that may carry bookkeeping.
	touched: HashSet<NodeId>,
}

#[derive(Debug)]
struct Slot {
	tag: String,
	attributes: Attributes,
	/// `None` for leaves.
	children: Option<Vec<NodeId>>,
	parent: Option<NodeId>,
	render_children_fully: bool,
	delta: Delta,
}

#[derive(Debug, Default)]
struct Delta {
	previous_children: Option<Vec<NodeId>>,
	/// Outer `None`: unchanged since the last pass, so the current parent is also the previous one.
	previous_parent: Option<Option<NodeId>>,
	attributes_changed: bool,
	subtree_dirty: bool,
}

impl Document {
	/// Creates a document consisting of an empty root container that the client is assumed to have already.
	#[must_use]
	pub fn new(root_tag: impl Into<String>) -> Self {
		let root = NodeId::new(0);
		let mut document = Self::empty(root);
		document.nodes.insert(root, Slot::new(root_tag.into(), Attributes::new(), Some(Vec::new())));
		document
	}

	pub(crate) fn empty(root: NodeId) -> Self {
		Self {
			nodes: HashMap::new(),
			root,
			next_id: root.get() + 1,
			touched: HashSet::new(),
		}
	}

	/// Inserts a node in clean (rendered) state, keeping its ID.
	pub(crate) fn insert_rendered(&mut self, id: NodeId, tag: &str, attributes: Attributes, children: Option<Vec<NodeId>>, parent: Option<NodeId>) -> Result<(), DocumentError> {
		if self.nodes.contains_key(&id) {
			return Err(DocumentError::DuplicateId(id));
		}
		let mut slot = Slot::new(tag.to_owned(), attributes, children);
		slot.parent = parent;
		self.nodes.insert(id, slot);
		self.next_id = self.next_id.max(id.get() + 1);
		Ok(())
	}

	#[must_use]
	pub fn root(&self) -> NodeId {
		self.root
	}

	#[must_use]
	pub fn contains(&self, node: NodeId) -> bool {
		self.nodes.contains_key(&node)
	}

	/// Number of nodes, attached or not.
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// # Errors
	///
	/// Iff `node` is unknown.
	pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, DocumentError> {
		Ok(self.slot(node)?.parent)
	}

	/// Whether `node` is the root or one of its descendants.
	#[must_use]
	pub fn is_attached(&self, node: NodeId) -> bool {
		self.ancestors(node).last().map_or(false, |top| top == self.root)
	}

	/// `node` followed by its parent, grandparent and so on.
	pub fn ancestors(&self, node: NodeId) -> impl '_ + Iterator<Item = NodeId> {
		core::iter::successors(self.nodes.get(&node).map(|_| node), move |id| self.nodes.get(id).and_then(|slot| slot.parent))
	}

	/// Creates a detached leaf that has never been rendered.
	pub fn create_leaf(&mut self, tag: impl Into<String>) -> NodeId {
		self.create(tag.into(), None)
	}

	/// Creates a detached, empty container that has never been rendered.
	pub fn create_container(&mut self, tag: impl Into<String>) -> NodeId {
		self.create(tag.into(), Some(Vec::new()))
	}

	fn create(&mut self, tag: String, children: Option<Vec<NodeId>>) -> NodeId {
		let id = NodeId::new(self.next_id);
		self.next_id += 1;
		let mut slot = Slot::new(tag, Attributes::new(), children);
		slot.delta.previous_parent = Some(None);
		self.nodes.insert(id, slot);
		self.touched.insert(id);
		trace!(%id, "Created node.");
		id
	}

	/// Appends `child` to `parent`, moving it there if it is attached elsewhere.
	///
	/// # Errors
	///
	/// See [`Document::insert_child`].
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
		let len = self.checked_len_without(parent, child)?;
		self.insert_child(parent, len, child)
	}

	/// Inserts `child` so that it ends up at `index` among `parent`'s children, moving it there if it is attached elsewhere.
	///
	/// # Errors
	///
	/// Iff either node is unknown, `parent` is not a container, `child` is the root or an ancestor of `parent`,
	/// or `index` exceeds the number of `parent`'s other children.
	#[instrument(skip(self))]
	pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DocumentError> {
		let len = self.checked_len_without(parent, child)?;
		if index > len {
			return Err(DocumentError::IndexOutOfBounds { container: parent, index, len });
		}
		if child == self.root {
			return Err(DocumentError::RootNotMovable(child));
		}
		if self.ancestors(parent).any(|ancestor| ancestor == child) {
			return Err(DocumentError::WouldCycle { parent, child });
		}

		self.detach(child);
		self.record_parent_change(child);
		self.record_tree_change(parent);
		let slot = self.slot_mut_unchecked(parent);
		if let Some(children) = &mut slot.children {
			children.insert(index, child);
		}
		self.slot_mut_unchecked(child).parent = Some(parent);
		Ok(())
	}

	/// Detaches `node` from its parent. The node and its subtree stay in the document and can be reattached later.
	///
	/// # Errors
	///
	/// Iff `node` is unknown or the root.
	#[instrument(skip(self))]
	pub fn remove(&mut self, node: NodeId) -> Result<(), DocumentError> {
		self.slot(node)?;
		if node == self.root {
			return Err(DocumentError::RootNotMovable(node));
		}
		self.detach(node);
		Ok(())
	}

	/// # Errors
	///
	/// Iff `node` is unknown.
	pub fn set_attribute(&mut self, node: NodeId, name: impl Into<String>, value: impl Into<String>) -> Result<(), DocumentError> {
		let (name, value) = (name.into(), value.into());
		let slot = self.slot_mut(node)?;
		if slot.attributes.get(&name) == Some(&value) {
			return Ok(());
		}
		slot.attributes.insert(name, value);
		self.record_attribute_change(node);
		Ok(())
	}

	/// # Errors
	///
	/// Iff `node` is unknown.
	pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DocumentError> {
		if self.slot_mut(node)?.attributes.remove(name).is_some() {
			self.record_attribute_change(node);
		}
		Ok(())
	}

	/// Makes every structural change to `container` re-render all of its children.
	///
	/// # Errors
	///
	/// Iff `container` is unknown or a leaf.
	pub fn set_render_children_fully(&mut self, container: NodeId, render_children_fully: bool) -> Result<(), DocumentError> {
		let slot = self.slot_mut(container)?;
		if slot.children.is_none() {
			return Err(DocumentError::NotAContainer(container));
		}
		slot.render_children_fully = render_children_fully;
		Ok(())
	}

	/// Copies out the current state of `node` and its subtree.
	///
	/// # Errors
	///
	/// Iff `node` is unknown.
	pub fn snapshot(&self, node: NodeId) -> Result<Node, DocumentError> {
		self.slot(node)?;
		Ok(crate::reconcile::render(self, node))
	}

	fn checked_len_without(&self, parent: NodeId, child: NodeId) -> Result<usize, DocumentError> {
		let child_slot = self.slot(child)?;
		let children = self.slot(parent)?.children.as_ref().ok_or(DocumentError::NotAContainer(parent))?;
		Ok(if child_slot.parent == Some(parent) { children.len() - 1 } else { children.len() })
	}

	fn detach(&mut self, node: NodeId) {
		let parent = match self.slot_mut_unchecked(node).parent {
			Some(parent) => parent,
			None => return,
		};
		self.record_parent_change(node);
		self.record_tree_change(parent);
		if let Some(children) = &mut self.slot_mut_unchecked(parent).children {
			children.retain(|&id| id != node);
		}
		self.slot_mut_unchecked(node).parent = None;
	}

	fn record_parent_change(&mut self, node: NodeId) {
		let slot = self.slot_mut_unchecked(node);
		if slot.delta.previous_parent.is_none() {
			slot.delta.previous_parent = Some(slot.parent);
		}
		self.touched.insert(node);
	}

	fn record_tree_change(&mut self, container: NodeId) {
		let slot = self.slot_mut_unchecked(container);
		if slot.delta.previous_children.is_none() {
			slot.delta.previous_children = slot.children.clone();
		}
		let parent = slot.parent;
		self.touched.insert(container);
		self.mark_subtree_dirty(parent);
	}

	fn record_attribute_change(&mut self, node: NodeId) {
		let slot = self.slot_mut_unchecked(node);
		slot.delta.attributes_changed = true;
		let parent = slot.parent;
		self.touched.insert(node);
		self.mark_subtree_dirty(parent);
	}

	fn mark_subtree_dirty(&mut self, mut current: Option<NodeId>) {
		while let Some(id) = current {
			let slot = self.slot_mut_unchecked(id);
			slot.delta.subtree_dirty = true;
			current = slot.parent;
			self.touched.insert(id);
		}
	}

	fn slot(&self, node: NodeId) -> Result<&Slot, DocumentError> {
		self.nodes.get(&node).ok_or(DocumentError::UnknownNode(node))
	}

	fn slot_mut(&mut self, node: NodeId) -> Result<&mut Slot, DocumentError> {
		self.nodes.get_mut(&node).ok_or(DocumentError::UnknownNode(node))
	}

	/// For IDs that are already validated or reachable through the tree.
	fn slot_mut_unchecked(&mut self, node: NodeId) -> &mut Slot {
		self.nodes.get_mut(&node).unwrap_or_else(|| panic!("dom-delta bug: Dangling node ID {}", node))
	}
}

impl Slot {
	fn new(tag: String, attributes: Attributes, children: Option<Vec<NodeId>>) -> Self {
		Self {
			tag,
			attributes,
			children,
			parent: None,
			render_children_fully: false,
			delta: Delta::default(),
		}
	}
}

impl NodeTree for Document {
	fn contains(&self, node: NodeId) -> bool {
		Document::contains(self, node)
	}

	fn is_container(&self, node: NodeId) -> bool {
		self.nodes[&node].children.is_some()
	}

	fn tag(&self, node: NodeId) -> &str {
		&self.nodes[&node].tag
	}

	fn attributes(&self, node: NodeId) -> &Attributes {
		&self.nodes[&node].attributes
	}

	fn children(&self, container: NodeId) -> &[NodeId] {
		self.nodes[&container].children.as_deref().unwrap_or(&[])
	}

	fn previous_children(&self, container: NodeId) -> Option<&[NodeId]> {
		self.nodes[&container].delta.previous_children.as_deref()
	}

	fn has_changed_attributes(&self, node: NodeId) -> bool {
		self.nodes[&node].delta.attributes_changed
	}

	fn subtree_dirty(&self, container: NodeId) -> bool {
		self.nodes[&container].delta.subtree_dirty
	}

	fn current_parent(&self, node: NodeId) -> Option<NodeId> {
		self.nodes[&node].parent
	}

	fn previous_parent(&self, node: NodeId) -> Option<NodeId> {
		let slot = &self.nodes[&node];
		slot.delta.previous_parent.unwrap_or(slot.parent)
	}

	fn must_render_children_fully(&self, container: NodeId) -> bool {
		self.nodes[&container].render_children_fully
	}

	fn clear_dirty_state(&mut self, node: NodeId) {
		if let Some(slot) = self.nodes.get_mut(&node) {
			slot.delta = Delta::default();
		}
	}

	fn finish_pass(&mut self, root: NodeId) {
		let before = self.touched.len();
		if root == self.root {
			// Detached nodes were deleted on the client, so their bookkeeping is stale too.
			for id in self.touched.drain() {
				if let Some(slot) = self.nodes.get_mut(&id) {
					slot.delta = Delta::default();
				}
			}
		} else {
			let reset: Vec<_> = self.touched.iter().copied().filter(|&id| self.ancestors(id).last() == Some(root)).collect();
			for id in reset {
				self.touched.remove(&id);
				if let Some(slot) = self.nodes.get_mut(&id) {
					slot.delta = Delta::default();
				}
			}
		}
		trace!(%root, "Reset bookkeeping of {} touched node(s).", before - self.touched.len());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn document_with_list() -> (Document, NodeId, [NodeId; 3]) {
		let mut document = Document::new("body");
		let list = document.create_container("ul");
		let items = [document.create_leaf("li"), document.create_leaf("li"), document.create_leaf("li")];
		document.append_child(document.root(), list).unwrap();
		for &item in &items {
			document.append_child(list, item).unwrap();
		}
		let root = document.root();
		document.finish_pass(root);
		(document, list, items)
	}

	#[test]
	fn clean_after_finish_pass() {
		let (document, list, items) = document_with_list();
		assert_eq!(document.previous_children(list), None);
		assert!(!document.subtree_dirty(document.root()));
		assert_eq!(document.previous_parent(items[0]), Some(list));
		assert!(document.is_attached(items[2]));
	}

	#[test]
	fn records_first_snapshot_only() {
		let (mut document, list, [a, b, c]) = document_with_list();
		document.remove(b).unwrap();
		document.insert_child(list, 0, c).unwrap();
		assert_eq!(document.children(list), [c, a]);
		assert_eq!(document.previous_children(list), Some(&[a, b, c][..]));
		assert_eq!(document.previous_parent(b), Some(list));
		assert_eq!(document.current_parent(b), None);
		assert!(document.subtree_dirty(document.root()));
		assert!(!document.subtree_dirty(list));
	}

	#[test]
	fn new_nodes_have_no_previous_parent() {
		let (mut document, list, _) = document_with_list();
		let item = document.create_leaf("li");
		document.append_child(list, item).unwrap();
		assert_eq!(document.previous_parent(item), None);
	}

	#[test]
	fn reattached_after_pass_counts_as_new() {
		let (mut document, list, [_, b, _]) = document_with_list();
		document.remove(b).unwrap();
		document.finish_pass(document.root());
		document.append_child(list, b).unwrap();
		assert_eq!(document.previous_parent(b), None);
	}

	#[test]
	fn unchanged_attribute_is_not_a_change() {
		let (mut document, _, [a, _, _]) = document_with_list();
		document.set_attribute(a, "class", "x").unwrap();
		document.finish_pass(document.root());
		document.set_attribute(a, "class", "x").unwrap();
		assert!(!document.has_changed_attributes(a));
		document.remove_attribute(a, "class").unwrap();
		assert!(document.has_changed_attributes(a));
		assert!(document.subtree_dirty(document.root()));
	}

	#[test]
	fn detached_pass_keeps_other_bookkeeping() {
		let (mut document, list, [a, b, _]) = document_with_list();
		let root = document.root();
		document.remove(list).unwrap();
		document.set_attribute(a, "class", "x").unwrap();
		let other = document.create_container("div");
		document.append_child(root, other).unwrap();
		document.append_child(other, b).unwrap();

		document.finish_pass(list);
		assert!(!document.has_changed_attributes(a));
		assert_eq!(document.previous_children(list), None);
		assert_eq!(document.previous_parent(b), Some(list));
		assert_eq!(document.previous_children(root), Some(&[list][..]));
		assert!(document.subtree_dirty(root));

		document.finish_pass(root);
		assert_eq!(document.previous_parent(b), Some(other));
		assert!(!document.subtree_dirty(root));
	}

	#[test]
	fn rejects_invalid_moves() {
		let (mut document, list, [a, _, _]) = document_with_list();
		let root = document.root();
		assert_eq!(document.append_child(list, root), Err(DocumentError::RootNotMovable(root)));
		assert_eq!(document.append_child(list, list), Err(DocumentError::WouldCycle { parent: list, child: list }));
		assert_eq!(document.append_child(a, list), Err(DocumentError::NotAContainer(a)));
		assert_eq!(
			document.insert_child(list, 3, a),
			Err(DocumentError::IndexOutOfBounds {
				container: list,
				index: 3,
				len: 2
			})
		);
		assert_eq!(document.remove(NodeId::new(999)), Err(DocumentError::UnknownNode(NodeId::new(999))));
	}

	#[test]
	fn inner_container_cannot_adopt_ancestor() {
		let (mut document, list, _) = document_with_list();
		let inner = document.create_container("li");
		document.append_child(list, inner).unwrap();
		assert_eq!(document.append_child(inner, list), Err(DocumentError::WouldCycle { parent: inner, child: list }));
	}
}
