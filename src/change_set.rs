//! The secondary tree of per-container changes built during a single pass.

use crate::{error::ReconcileError, node::NodeId};
use core::{
	fmt::{self, Display, Formatter},
	ops::{Index, IndexMut},
};
use hashbrown::{hash_map::Entry, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChangeSetId(usize);
impl ChangeSetId {
	/// The synthetic change set above the pass root. It has no container of its own.
	pub const ROOT: Self = Self(0);
}

/// Changes to a container's children, plus the nested change sets of its descendants.
///
/// Only exists for containers with tree changes (and the synthetic root).
#[derive(Debug, Default)]
pub(crate) struct ChangeSet {
	pub node: Option<NodeId>,
	pub deletes: Vec<NodeId>,
	/// `(index in current children, node)`, ascending once the container is diffed.
	pub adds: Vec<(usize, NodeId)>,
	pub attr_changes: Vec<NodeId>,
	pub children: Vec<ChangeSetId>,
	/// Nodes rendered under this full-rerender container before that now live elsewhere.
	pub evictions: Vec<NodeId>,
	/// The container's own attributes changed.
	pub attributes_changed: bool,
	/// The container is rendered from scratch as part of an insertion, so all changes below it are moot.
	pub is_added: bool,
	pub is_full_rerender: bool,
}
impl ChangeSet {
	fn new(node: Option<NodeId>) -> Self {
		Self { node, ..Self::default() }
	}

	pub fn set_full_rerender(&mut self) {
		self.is_full_rerender = true;
		self.deletes.clear();
		self.adds.clear();
		self.attr_changes.clear();
		self.children.clear();
	}

	fn is_collapsed(&self) -> bool {
		self.is_full_rerender || self.is_added
	}

	pub fn add_attr_change(&mut self, node: NodeId) {
		if !self.is_collapsed() {
			self.attr_changes.push(node)
		}
	}

	pub fn add_delete(&mut self, node: NodeId) {
		if !self.is_collapsed() {
			self.deletes.push(node)
		}
	}

	pub fn add_add(&mut self, index: usize, node: NodeId) {
		if !self.is_collapsed() {
			self.adds.push((index, node))
		}
	}

	/// Whether emitting this change set would produce no operations.
	pub fn is_empty(&self) -> bool {
		!self.is_collapsed() && !self.attributes_changed && self.deletes.is_empty() && self.adds.is_empty() && self.attr_changes.is_empty() && self.children.is_empty()
	}
}

/// Arena of the change sets of one pass, indexed by [`ChangeSetId`] and by container.
#[derive(Debug)]
pub(crate) struct ChangeSets {
	sets: Vec<ChangeSet>,
	by_node: HashMap<NodeId, ChangeSetId>,
}
impl ChangeSets {
	pub fn new() -> Self {
		Self {
			sets: vec![ChangeSet::new(None)],
			by_node: HashMap::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.sets.len()
	}

	/// Retrieves the change set of `container`, creating it if necessary. The flag is `true` if it existed already.
	pub fn for_node(&mut self, container: NodeId) -> (ChangeSetId, bool) {
		match self.by_node.entry(container) {
			Entry::Occupied(occupied) => (*occupied.get(), true),
			Entry::Vacant(vacant) => {
				let id = ChangeSetId(self.sets.len());
				self.sets.push(ChangeSet::new(Some(container)));
				vacant.insert(id);
				(id, false)
			}
		}
	}

	pub fn attach(&mut self, parent: ChangeSetId, child: ChangeSetId) -> Result<(), ReconcileError> {
		if parent == child {
			return Err(self.cyclic(child));
		}
		self[parent].children.push(child);
		Ok(())
	}

	pub fn cyclic(&self, id: ChangeSetId) -> ReconcileError {
		let container = self[id].node.unwrap_or_else(|| NodeId::new(u32::MAX));
		tracing::error!(%container, "Change set would contain itself.");
		ReconcileError::CyclicChangeSet { container }
	}

	/// Indented human-readable rendering of the change tree below `id`, for trace logs.
	pub fn dump(&self, id: ChangeSetId) -> Dump<'_> {
		Dump { sets: self, id }
	}
}
impl Index<ChangeSetId> for ChangeSets {
	type Output = ChangeSet;

	fn index(&self, index: ChangeSetId) -> &Self::Output {
		&self.sets[index.0]
	}
}
impl IndexMut<ChangeSetId> for ChangeSets {
	fn index_mut(&mut self, index: ChangeSetId) -> &mut Self::Output {
		&mut self.sets[index.0]
	}
}

pub(crate) struct Dump<'a> {
	sets: &'a ChangeSets,
	id: ChangeSetId,
}
impl Display for Dump<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		self.write(f, self.id, 0, &mut 0)
	}
}
impl Dump<'_> {
	fn write(&self, f: &mut Formatter<'_>, id: ChangeSetId, depth: usize, budget: &mut usize) -> fmt::Result {
		*budget += 1;
		if *budget > self.sets.len() {
			return writeln!(f, "{:indent$}(cycle)", "", indent = depth * 2);
		}

		let set = &self.sets[id];
		match set.node {
			None => write!(f, "{:indent$}[root]", "", indent = depth * 2)?,
			Some(node) => write!(f, "{:indent$}[{}]", "", node, indent = depth * 2)?,
		}
		if set.is_full_rerender {
			f.write_str(" full-rerender")?;
		}
		if set.is_added {
			f.write_str(" added")?;
		}
		if set.attributes_changed {
			f.write_str(" attributes")?;
		}
		writeln!(f)?;

		let lists: [(&str, Vec<NodeId>); 4] = [
			("deleted", set.deletes.clone()),
			("added", set.adds.iter().map(|&(_, node)| node).collect()),
			("attributes changed", set.attr_changes.clone()),
			("evicted", set.evictions.clone()),
		];
		for (label, nodes) in &lists {
			if !nodes.is_empty() {
				write!(f, "{:indent$}{}:", "", label, indent = depth * 2 + 2)?;
				for node in nodes {
					write!(f, " {}", node)?;
				}
				writeln!(f)?;
			}
		}
		for &child in &set.children {
			self.write(f, child, depth + 1, budget)?;
		}
		Ok(())
	}
}
