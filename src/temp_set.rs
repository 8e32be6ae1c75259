use crate::node::NodeId;
use hashbrown::{HashMap, HashSet};

/// A node set whose allocation is reused across reconciliation passes.
#[derive(Debug, Default)]
pub(crate) struct TempNodeSet(HashSet<NodeId>);
impl TempNodeSet {
	/// The set is cleared before each borrow, so no entries leak between passes.
	pub fn temp(&mut self) -> &mut HashSet<NodeId> {
		self.0.clear();
		&mut self.0
	}

	/// Retrieves the cache set's capacity without clearing it first.
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}

/// A node-keyed side table whose allocation is reused across reconciliation passes.
#[derive(Debug)]
pub(crate) struct TempNodeMap<V>(HashMap<NodeId, V>);
impl<V> Default for TempNodeMap<V> {
	fn default() -> Self {
		Self(HashMap::new())
	}
}
impl<V> TempNodeMap<V> {
	/// The map is cleared before each borrow, so no entries leak between passes.
	pub fn temp(&mut self) -> &mut HashMap<NodeId, V> {
		self.0.clear();
		&mut self.0
	}

	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}
