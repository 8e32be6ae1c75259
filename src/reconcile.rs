use crate::{
	change_set::{ChangeSetId, ChangeSets},
	error::{DeltaError, ReconcileError},
	node::{Node, NodeId},
	operation::Operation,
	policy::RenderPolicy,
	provider::NodeTree,
	sink::DeltaSink,
	temp_set::{TempNodeMap, TempNodeSet},
};
use hashbrown::{HashMap, HashSet};
use tracing::{error, info, instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

/// Computes the operations that bring a client's copy of a [`NodeTree`] up to date.
///
/// A `Reconciler` holds no state between passes except reusable scratch allocations,
/// so one instance per session (or per thread) avoids repeated allocation.
///
/// # Correct Use
///
/// Each pass must see all changes since the previous successful pass over the same tree and client.
/// If a pass fails, the client should be sent a full rendering instead, as the tree's bookkeeping is left as-is.
#[derive(Debug, Default)]
pub struct Reconciler {
	policy: RenderPolicy,
	positions: TempNodeMap<Position>,
	relocated: TempNodeSet,
}

/// Transient per-pass indices of a surviving child.
#[derive(Debug, Clone, Copy)]
struct Position {
	/// Index among the container's previous children that weren't removed.
	old: usize,
	/// Index among the container's current children that were present before.
	new: usize,
	/// Index among all current children.
	target: usize,
}

impl Reconciler {
	/// Creates a reconciler with the default [`RenderPolicy`].
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a reconciler that decides full rerenders according to `policy`.
	#[must_use]
	pub fn with_policy(policy: RenderPolicy) -> Self {
		Self { policy, ..Self::default() }
	}

	/// The policy this reconciler was created with.
	#[must_use]
	pub fn policy(&self) -> &RenderPolicy {
		&self.policy
	}

	/// Diffs the tree below `root` against its previous state and returns the operations to apply on the client, in order.
	///
	/// `root` must be the top of its tree, i.e. have no current parent.
	/// Nodes can move freely within one tree between passes, so a pass over only part of it can't be brought in line with the client.
	///
	/// On success, `tree`'s bookkeeping is cleared for every visited node and [`NodeTree::finish_pass`] is called with `root`.
	///
	/// # Errors
	///
	/// Iff the policy is invalid, `root` is unknown or has a parent, or `tree` breaks the [`NodeTree`] contract.
	#[instrument(skip(self, tree))]
	pub fn reconcile<T: NodeTree + ?Sized>(&mut self, tree: &mut T, root: NodeId) -> Result<Vec<Operation>, ReconcileError> {
		self.policy.validate()?;
		if !tree.contains(root) {
			error!(%root, "Unknown pass root.");
			return Err(ReconcileError::UnknownRoot(root));
		}
		if let Some(parent) = tree.current_parent(root) {
			error!(%root, %parent, "Pass root is not the top of its tree.");
			return Err(ReconcileError::NotARoot { root, parent });
		}

		let mut pass = Pass {
			tree: &mut *tree,
			policy: &self.policy,
			root,
			positions: self.positions.temp(),
			relocated: self.relocated.temp(),
			change_sets: ChangeSets::new(),
			visited: Vec::new(),
		};
		pass.visit(ChangeSetId::ROOT, root, 0)?;
		trace!("Change sets:\n{}", pass.change_sets.dump(ChangeSetId::ROOT));

		let mut operations = Vec::new();
		pass.emit_deletes(ChangeSetId::ROOT, &mut operations)?;
		pass.emit_rest(ChangeSetId::ROOT, &mut operations)?;

		let Pass { visited, change_sets, .. } = pass;
		for node in visited {
			tree.clear_dirty_state(node);
		}
		tree.finish_pass(root);

		info!("Emitted {} operation(s) from {} change set(s).", operations.len(), change_sets.len());
		info!("Scratch capacity (positions/relocated): {}/{}", self.positions.capacity(), self.relocated.capacity());
		if STATIC_MAX_LEVEL >= Level::WARN && self.positions.capacity() >= 100_000 {
			warn!(
				"The position scratch capacity is large ({}).\n\
				This may point to very wide containers that are better re-rendered fully.",
				self.positions.capacity()
			)
		}
		Ok(operations)
	}

	/// Like [`Reconciler::reconcile`], but forwards the operations into `sink` and finishes it.
	///
	/// # Errors
	///
	/// Iff reconciliation or the sink fails. Nothing is written to `sink` if reconciliation fails.
	pub fn reconcile_into<T: NodeTree + ?Sized, S: DeltaSink + ?Sized>(&mut self, tree: &mut T, root: NodeId, sink: &mut S) -> Result<(), DeltaError<S::Error>> {
		let operations = self.reconcile(tree, root)?;
		crate::sink::write_all(&operations, sink).map_err(DeltaError::Sink)
	}
}

struct Pass<'a, T: ?Sized> {
	tree: &'a mut T,
	policy: &'a RenderPolicy,
	root: NodeId,
	positions: &'a mut HashMap<NodeId, Position>,
	relocated: &'a mut HashSet<NodeId>,
	change_sets: ChangeSets,
	/// Cleared only once the whole pass succeeded, since eviction walks may still need previous snapshots.
	visited: Vec<NodeId>,
}

/// Where a node currently is, relative to a container that is re-rendered fully.
enum Placement {
	Inside,
	Outside,
	Detached,
}

impl<'a, T: NodeTree + ?Sized> Pass<'a, T> {
	/// Collects the changes of `node` and its subtree into the change set `parent`, or into new change sets below it.
	fn visit(&mut self, parent: ChangeSetId, node: NodeId, depth: usize) -> Result<(), ReconcileError> {
		if depth > self.policy.depth_limit {
			error!(%node, "Depth limit reached");
			return Err(ReconcileError::DepthLimitExceeded {
				container: node,
				limit: self.policy.depth_limit,
			});
		}

		if self.tree.is_container(node) {
			if let Some(previous) = self.tree.previous_children(node) {
				let previous = previous.to_vec();
				let current = self.tree.children(node).to_vec();
				if !previous.is_empty() || !current.is_empty() {
					return self.tree_delta(parent, node, &previous, &current, depth);
				}
			}
		}

		// The tree here is not dirty, so at most attributes changed.
		if self.tree.has_changed_attributes(node) {
			trace!(%node, "Attributes changed.");
			self.change_sets[parent].add_attr_change(node);
		}
		if self.tree.is_container(node) && self.tree.subtree_dirty(node) {
			for child in self.tree.children(node).to_vec() {
				self.visit(parent, child, depth + 1)?;
			}
		}
		self.visited.push(node);
		Ok(())
	}

	/// Builds the change set of a container whose child list changed structurally.
	fn tree_delta(&mut self, parent: ChangeSetId, container: NodeId, previous: &[NodeId], current: &[NodeId], depth: usize) -> Result<(), ReconcileError> {
		let span = trace_span!("Diffing container", %container, previous = previous.len(), current = current.len());
		let _enter = span.enter();

		let (id, existed) = self.change_sets.for_node(container);
		if existed {
			return Err(if self.change_sets[id].is_added {
				self.inconsistent(container, "tree delta on a container that is being added as a whole".to_owned())
			} else {
				self.change_sets.cyclic(id)
			});
		}
		self.change_sets[id].attributes_changed = self.tree.has_changed_attributes(container);

		if previous.is_empty() || self.policy.prefers_full_render(previous.len(), current.len()) || self.tree.must_render_children_fully(container) {
			trace!("Rendering children fully.");
			self.full_rerender(id, container, previous, depth)?;
		} else {
			self.diff_children(id, container, previous, current, depth)?;

			let changes = self.change_sets[id].deletes.len() + self.change_sets[id].adds.len();
			if self.policy.rejects_delta(changes, current.len()) {
				trace!(changes, "Too many changes. Rendering children fully instead.");
				self.full_rerender(id, container, previous, depth)?;
			}
		}

		self.visited.push(container);
		if self.change_sets[id].is_empty() {
			trace!("No effective changes.");
			Ok(())
		} else {
			self.change_sets.attach(parent, id)
		}
	}

	#[allow(clippy::similar_names)]
	fn diff_children(&mut self, id: ChangeSetId, container: NodeId, previous: &[NodeId], current: &[NodeId], depth: usize) -> Result<(), ReconcileError> {
		// A previous child is gone from here iff it has another parent (or none) now.
		// What remains is in the order it would be in after all deletes were executed.
		let mut old_survivors = Vec::with_capacity(previous.len());
		for &node in previous {
			if self.tree.current_parent(node) == Some(container) {
				old_survivors.push(node)
			} else {
				trace!(%node, "Removed or moved away.");
				self.change_sets[id].add_delete(node);
			}
		}

		// A current child is new here iff it wasn't rendered here before (which includes moves from elsewhere).
		// New containers are rendered whole, so nothing below them needs tracking.
		let mut new_survivors = Vec::with_capacity(current.len());
		for (target, &node) in current.iter().enumerate() {
			if self.tree.previous_parent(node) == Some(container) {
				self.positions.insert(node, Position { old: 0, new: new_survivors.len(), target });
				new_survivors.push(node);
			} else {
				trace!(%node, target, "Added.");
				self.mark_added(node);
				self.change_sets[id].add_add(target, node);
			}
		}

		if old_survivors.len() != new_survivors.len() {
			return Err(self.inconsistent(
				container,
				format!("{} previous child(ren) remained, but {} current child(ren) were present before", old_survivors.len(), new_survivors.len()),
			));
		}
		for (old, &node) in old_survivors.iter().enumerate() {
			match self.positions.get_mut(&node) {
				Some(position) => position.old = old,
				None => return Err(self.inconsistent(container, format!("{} remained but is not among the current children", node))),
			}
		}

		// What's left are moves and nodes that are unchanged here.
		// The distance each side moved decides which of them is deleted and reinserted.
		let (mut old_cursor, mut new_cursor) = (0, 0);
		while old_cursor < old_survivors.len() {
			let old_node = old_survivors[old_cursor];
			if self.relocated.contains(&old_node) {
				old_cursor += 1;
				continue;
			}
			while new_survivors.get(new_cursor).map_or(false, |node| self.relocated.contains(node)) {
				new_cursor += 1;
			}
			let new_node = match new_survivors.get(new_cursor) {
				Some(&new_node) => new_node,
				None => return Err(self.inconsistent(container, format!("{} has no counterpart among the current children", old_node))),
			};

			if old_node == new_node {
				old_cursor += 1;
				new_cursor += 1;
				self.visit(id, new_node, depth + 1)?;
				continue;
			}

			let old_delta = abs_diff(old_cursor, self.positions[&old_node].new);
			let new_delta = abs_diff(new_cursor, self.positions[&new_node].old);
			trace!(%old_node, %new_node, old_delta, new_delta, "Move.");
			if old_delta > new_delta {
				self.relocate(id, old_node);
				old_cursor += 1;
			} else {
				self.relocate(id, new_node);
				new_cursor += 1;
			}
		}

		for &node in &new_survivors[new_cursor..] {
			if !self.relocated.contains(&node) {
				trace!(%node, "Previous children exhausted.");
				self.relocate(id, node);
			}
		}

		self.change_sets[id].adds.sort_by_key(|&(target, _)| target);
		Ok(())
	}

	/// Deletes `node` from its current spot and reinserts it where it belongs.
	fn relocate(&mut self, id: ChangeSetId, node: NodeId) {
		let target = self.positions[&node].target;
		self.relocated.insert(node);
		self.mark_added(node);
		let change_set = &mut self.change_sets[id];
		change_set.add_delete(node);
		change_set.add_add(target, node);
	}

	fn mark_added(&mut self, node: NodeId) {
		if self.tree.is_container(node) {
			let (added, _) = self.change_sets.for_node(node);
			self.change_sets[added].is_added = true;
		}
	}

	fn full_rerender(&mut self, id: ChangeSetId, container: NodeId, previous: &[NodeId], depth: usize) -> Result<(), ReconcileError> {
		self.change_sets[id].set_full_rerender();
		let mut evictions = Vec::new();
		self.collect_evictions(container, container, previous, &mut evictions, depth)?;
		self.change_sets[id].evictions = evictions;
		Ok(())
	}

	/// Finds nodes rendered below `container` before that are now attached outside of it.
	/// They must be deleted before anything is inserted, as they would otherwise exist twice until `container`'s content is replaced.
	fn collect_evictions(&self, container: NodeId, old_parent: NodeId, old_children: &[NodeId], evictions: &mut Vec<NodeId>, depth: usize) -> Result<(), ReconcileError> {
		if depth > self.policy.depth_limit {
			error!(%container, "Depth limit reached");
			return Err(ReconcileError::DepthLimitExceeded {
				container,
				limit: self.policy.depth_limit,
			});
		}

		for &node in old_children {
			if self.tree.current_parent(node) != Some(old_parent) {
				if let Placement::Outside = self.placement(node, container)? {
					trace!(%node, "Evicted.");
					evictions.push(node);
					continue;
				}
			}

			if self.tree.is_container(node) {
				let children = self.tree.previous_children(node).unwrap_or_else(|| self.tree.children(node));
				self.collect_evictions(container, node, children, evictions, depth + 1)?;
			}
		}
		Ok(())
	}

	fn placement(&self, node: NodeId, container: NodeId) -> Result<Placement, ReconcileError> {
		let mut current = self.tree.current_parent(node);
		for _ in 0..=self.policy.depth_limit {
			match current {
				Some(ancestor) if ancestor == container => return Ok(Placement::Inside),
				Some(ancestor) if ancestor == self.root => return Ok(Placement::Outside),
				Some(ancestor) => current = self.tree.current_parent(ancestor),
				None => return Ok(Placement::Detached),
			}
		}
		error!(%node, "Depth limit reached");
		Err(ReconcileError::DepthLimitExceeded {
			container: node,
			limit: self.policy.depth_limit,
		})
	}

	/// All deletes come first, so that no ID is ever present twice on the client.
	fn emit_deletes(&self, id: ChangeSetId, operations: &mut Vec<Operation>) -> Result<(), ReconcileError> {
		let change_set = &self.change_sets[id];
		if change_set.is_full_rerender {
			operations.extend(change_set.evictions.iter().map(|&node| Operation::Delete { node }));
			return Ok(());
		}
		// Added containers are deleted through their old parent's change set (or an eviction) and never attached here.
		debug_assert!(!change_set.is_added, "dom-delta bug: Added change set was attached");

		operations.extend(change_set.deletes.iter().map(|&node| Operation::Delete { node }));
		for &child in &change_set.children {
			if child == id {
				return Err(self.change_sets.cyclic(id));
			}
			self.emit_deletes(child, operations)?;
		}
		Ok(())
	}

	fn emit_rest(&self, id: ChangeSetId, operations: &mut Vec<Operation>) -> Result<(), ReconcileError> {
		let change_set = &self.change_sets[id];
		let container = change_set.node;

		if change_set.is_full_rerender {
			if let Some(container) = container {
				let content = self.tree.children(container).iter().map(|&child| render(&*self.tree, child)).collect();
				operations.push(Operation::ReplaceChildren { container, content });
				if change_set.attributes_changed {
					operations.push(self.change_attributes(container));
				}
			}
			return Ok(());
		}

		if let (Some(container), true) = (container, change_set.attributes_changed) {
			operations.push(self.change_attributes(container));
		}
		for &node in &change_set.attr_changes {
			operations.push(self.change_attributes(node));
		}
		if let Some(container) = container {
			// Ascending indices: the preceding sibling is always in place already.
			let children = self.tree.children(container);
			for &(target, node) in &change_set.adds {
				let after = target.checked_sub(1).map(|before| children[before]);
				operations.push(Operation::InsertAfter {
					parent: container,
					after,
					content: render(&*self.tree, node),
				});
			}
		}
		for &child in &change_set.children {
			self.emit_rest(child, operations)?;
		}
		Ok(())
	}

	fn change_attributes(&self, node: NodeId) -> Operation {
		let attributes = self.tree.attributes(node).clone();
		#[cfg(feature = "dangerous-logging")]
		trace!(%node, ?attributes, "Changing attributes.");
		Operation::ChangeAttributes { node, attributes }
	}

	fn inconsistent(&self, container: NodeId, reason: String) -> ReconcileError {
		error!(%container, %reason, "Inconsistent snapshot.");
		ReconcileError::InconsistentSnapshot {
			container,
			reason,
			path: self.path(container),
		}
	}

	#[cfg(feature = "log-paths")]
	fn path(&self, container: NodeId) -> Vec<NodeId> {
		let mut path: Vec<_> = core::iter::successors(Some(container), |&node| self.tree.current_parent(node)).take(self.policy.depth_limit + 1).collect();
		path.reverse();
		path
	}

	#[cfg(not(feature = "log-paths"))]
	fn path(&self, _container: NodeId) -> Vec<NodeId> {
		Vec::new()
	}
}

/// Copies `node` and its current subtree out of `tree`.
pub(crate) fn render<T: NodeTree + ?Sized>(tree: &T, node: NodeId) -> Node {
	let tag = tree.tag(node).to_owned();
	let attributes = tree.attributes(node).clone();
	if tree.is_container(node) {
		Node::Container {
			id: node,
			tag,
			attributes,
			children: tree.children(node).iter().map(|&child| render(tree, child)).collect(),
		}
	} else {
		Node::Leaf { id: node, tag, attributes }
	}
}

fn abs_diff(a: usize, b: usize) -> usize {
	if a > b {
		a - b
	} else {
		b - a
	}
}
