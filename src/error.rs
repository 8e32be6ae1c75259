use crate::node::NodeId;
use thiserror::Error;

/// Why a reconciliation pass was aborted.
///
/// None of these are retryable: the pass is a pure function of the tree and its bookkeeping, so repeating it reproduces the failure.
/// Callers should fall back to rendering the page from scratch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
	#[error("inconsistent snapshot on container {container}: {reason}{}", format_path(.path))]
	InconsistentSnapshot {
		container: NodeId,
		reason: String,
		/// Root-first ancestor path of `container`. Only filled in with the `log-paths` feature.
		path: Vec<NodeId>,
	},

	#[error("change set of container {container} would become its own descendant")]
	CyclicChangeSet { container: NodeId },

	#[error("depth limit of {limit} exceeded below container {container}")]
	DepthLimitExceeded { container: NodeId, limit: usize },

	#[error("unknown pass root {0}")]
	UnknownRoot(NodeId),

	#[error("pass root {root} has the parent {parent}, but passes must cover a whole tree")]
	NotARoot { root: NodeId, parent: NodeId },

	#[error("invalid render policy: {0}")]
	InvalidPolicy(#[from] PolicyError),
}

/// Failure of [`Reconciler::reconcile_into`](`crate::Reconciler::reconcile_into`).
#[derive(Debug, Error)]
pub enum DeltaError<E> {
	#[error(transparent)]
	Reconcile(#[from] ReconcileError),

	#[error("delta sink failed: {0:?}")]
	Sink(E),
}

fn format_path(path: &[NodeId]) -> String {
	if path.is_empty() {
		String::new()
	} else {
		let path: Vec<_> = path.iter().map(NodeId::to_string).collect();
		format!(" (path: {})", path.join(" > "))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PolicyError {
	#[error("`{name}` must be a finite ratio within 0..=1, but was {value}")]
	RatioOutOfRange { name: &'static str, value: f64 },

	#[error("`depth_limit` must not be zero")]
	ZeroDepthLimit,
}

/// Rejected [`Document`](`crate::Document`) operations. The document is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DocumentError {
	#[error("unknown node {0}")]
	UnknownNode(NodeId),

	#[error("node {0} is not a container")]
	NotAContainer(NodeId),

	#[error("index {index} is out of bounds for container {container} with {len} children")]
	IndexOutOfBounds { container: NodeId, index: usize, len: usize },

	#[error("the root node {0} can't be moved")]
	RootNotMovable(NodeId),

	#[error("inserting {child} into {parent} would create a cycle")]
	WouldCycle { parent: NodeId, child: NodeId },

	#[error("duplicate node ID {0}")]
	DuplicateId(NodeId),
}
