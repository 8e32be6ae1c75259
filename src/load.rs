//! Builds [`Document`]s from owned [`Node`] descriptions.

use crate::{
	document::Document,
	error::DocumentError,
	node::{Node, NodeId},
};

/// Loads `root` as a document the client already has in exactly this state, keeping all IDs.
///
/// # Errors
///
/// Iff `root` is a leaf or an ID occurs more than once.
pub fn load_document(root: &Node) -> Result<Document, DocumentError> {
	if !root.is_container() {
		return Err(DocumentError::NotAContainer(root.id()));
	}
	let mut document = Document::empty(root.id());
	load_rendered(&mut document, root, None)?;
	Ok(document)
}

fn load_rendered(document: &mut Document, node: &Node, parent: Option<NodeId>) -> Result<(), DocumentError> {
	let children = match node.children() {
		None => None,
		Some(children) => Some(load_children(document, children, node.id())?),
	};
	document.insert_rendered(node.id(), node.tag(), node.attributes().clone(), children, parent)
}

/// Loads `children` in order below `parent`, returning their IDs.
fn load_children(document: &mut Document, children: &[Node], parent: NodeId) -> Result<Vec<NodeId>, DocumentError> {
	children
		.iter()
		.map(|child| {
			load_rendered(document, child, Some(parent))?;
			Ok(child.id())
		})
		.collect()
}

/// Loads `description` as a new, detached subtree that has never been rendered. IDs in `description` are ignored.
///
/// # Errors
///
/// Never for valid documents; attribute and attach errors are forwarded.
pub fn load_detached(document: &mut Document, description: &Node) -> Result<NodeId, DocumentError> {
	let id = match description.children() {
		None => document.create_leaf(description.tag()),
		Some(_) => document.create_container(description.tag()),
	};
	for (name, value) in description.attributes() {
		document.set_attribute(id, name.as_str(), value.as_str())?;
	}
	for child in description.children().unwrap_or(&[]) {
		let child = load_detached(document, child)?;
		document.append_child(id, child)?;
	}
	Ok(id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::NodeTree;

	#[test]
	fn load_keeps_ids_and_is_clean() {
		let description = Node::container(1, "body", vec![Node::leaf(5, "p").with_attribute("class", "x"), Node::container(7, "div", vec![Node::leaf(9, "b")])]);
		let document = load_document(&description).unwrap();
		assert_eq!(document.root(), NodeId::new(1));
		assert_eq!(document.snapshot(document.root()).unwrap(), description);
		assert!(!document.subtree_dirty(document.root()));
		assert_eq!(document.previous_parent(NodeId::new(9)), Some(NodeId::new(7)));

		let mut document = document;
		assert_eq!(document.create_leaf("i"), NodeId::new(10));
	}

	#[test]
	fn load_rejects_duplicates() {
		let description = Node::container(1, "body", vec![Node::leaf(2, "p"), Node::leaf(2, "p")]);
		assert_eq!(load_document(&description).unwrap_err(), DocumentError::DuplicateId(NodeId::new(2)));
	}

	#[test]
	fn detached_subtree_is_new() {
		let mut document = Document::new("body");
		let id = load_detached(&mut document, &Node::container(0, "ul", vec![Node::leaf(0, "li"), Node::leaf(0, "li")])).unwrap();
		assert_eq!(document.children(id).len(), 2);
		assert_eq!(document.parent(id), Ok(None));
		assert_eq!(document.previous_parent(id), None);
		assert!(!document.is_attached(id));
	}
}
