use dom_delta::{Attributes, DeltaSink, Node, NodeId, Operation};
use std::collections::HashMap;

/// A strict stand-in for the browser side.
///
/// Every operation is checked before it is applied:
/// targets and anchors must exist where they are expected and no ID may ever be present twice.
#[derive(Debug)]
pub struct Client {
	root: NodeId,
	nodes: HashMap<NodeId, ClientNode>,
	pub applied: usize,
}

#[derive(Debug)]
struct ClientNode {
	tag: String,
	attributes: Attributes,
	children: Option<Vec<NodeId>>,
	parent: Option<NodeId>,
}

impl Client {
	/// A client that currently shows `root`.
	pub fn new(root: &Node) -> Self {
		let mut client = Self {
			root: root.id(),
			nodes: HashMap::new(),
			applied: 0,
		};
		client.insert(root, None).expect("duplicate ID in initial page");
		client
	}

	pub fn snapshot(&self) -> Node {
		self.render(self.root)
	}

	pub fn contains(&self, node: NodeId) -> bool {
		self.nodes.contains_key(&node)
	}

	pub fn apply(&mut self, operation: &Operation) -> Result<(), String> {
		match operation {
			Operation::Delete { node } => {
				if *node == self.root {
					return Err(format!("deleted the root {}", node));
				}
				let parent = self.nodes.get(node).ok_or_else(|| format!("deleted {}, which is not present", node))?.parent;
				if let Some(parent) = parent {
					self.children_mut(parent)?.retain(|child| child != node);
				}
				self.drop_subtree(*node);
			}
			Operation::InsertAfter { parent, after, content } => {
				let index = {
					let children = self.children_mut(*parent)?;
					match after {
						None => 0,
						Some(after) => children.iter().position(|child| child == after).ok_or_else(|| format!("{} is not a child of {}", after, parent))? + 1,
					}
				};
				self.insert(content, Some(*parent))?;
				self.children_mut(*parent)?.insert(index, content.id());
			}
			Operation::ReplaceChildren { container, content } => {
				for child in std::mem::take(self.children_mut(*container)?) {
					self.drop_subtree(child);
				}
				for node in content {
					self.insert(node, Some(*container))?;
				}
				*self.children_mut(*container)? = content.iter().map(Node::id).collect();
			}
			Operation::ChangeAttributes { node, attributes } => {
				self.nodes.get_mut(node).ok_or_else(|| format!("changed attributes of {}, which is not present", node))?.attributes = attributes.clone();
			}
		}
		self.applied += 1;
		Ok(())
	}

	fn insert(&mut self, node: &Node, parent: Option<NodeId>) -> Result<(), String> {
		if self.nodes.contains_key(&node.id()) {
			return Err(format!("{} would be present twice", node.id()));
		}
		let children = node.children().map(|children| children.iter().map(Node::id).collect());
		self.nodes.insert(
			node.id(),
			ClientNode {
				tag: node.tag().to_owned(),
				attributes: node.attributes().clone(),
				children,
				parent,
			},
		);
		for child in node.children().unwrap_or(&[]) {
			self.insert(child, Some(node.id()))?;
		}
		Ok(())
	}

	fn drop_subtree(&mut self, node: NodeId) {
		if let Some(removed) = self.nodes.remove(&node) {
			for child in removed.children.unwrap_or_default() {
				self.drop_subtree(child);
			}
		}
	}

	fn children_mut(&mut self, container: NodeId) -> Result<&mut Vec<NodeId>, String> {
		self.nodes
			.get_mut(&container)
			.ok_or_else(|| format!("{} is not present", container))?
			.children
			.as_mut()
			.ok_or_else(|| format!("{} is not a container", container))
	}

	fn render(&self, id: NodeId) -> Node {
		let node = &self.nodes[&id];
		match &node.children {
			None => Node::Leaf {
				id,
				tag: node.tag.clone(),
				attributes: node.attributes.clone(),
			},
			Some(children) => Node::Container {
				id,
				tag: node.tag.clone(),
				attributes: node.attributes.clone(),
				children: children.iter().map(|&child| self.render(child)).collect(),
			},
		}
	}
}

impl DeltaSink for Client {
	type Error = String;

	fn operation(&mut self, operation: &Operation) -> Result<(), Self::Error> {
		self.apply(operation)
	}
}

pub fn init_tracing() {
	tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_test_writer().try_init().ok();
}
