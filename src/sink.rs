//! Consumers of reconciliation output.

use crate::{
	node::{Attributes, Node, NodeId},
	operation::Operation,
};
use core::{convert::Infallible, fmt};

/// Receives the operations of one pass, in order.
pub trait DeltaSink {
	type Error;

	fn operation(&mut self, operation: &Operation) -> Result<(), Self::Error>;

	/// Called once after the last operation of a pass.
	fn finish(&mut self) -> Result<(), Self::Error> {
		Ok(())
	}
}

impl DeltaSink for Vec<Operation> {
	type Error = Infallible;

	fn operation(&mut self, operation: &Operation) -> Result<(), Self::Error> {
		self.push(operation.clone());
		Ok(())
	}
}

/// Forwards all of `operations` into `sink`, then finishes it.
///
/// # Errors
///
/// Iff `sink` errors, in which case the remaining operations are not forwarded.
pub fn write_all<S: DeltaSink + ?Sized>(operations: &[Operation], sink: &mut S) -> Result<(), S::Error> {
	for operation in operations {
		sink.operation(operation)?;
	}
	sink.finish()
}

/// Writes an XML delta document, as understood by the classic delta-applying client script:
///
/// ```xml
/// <?xml version="1.0" encoding="utf-8"?>
/// <delta>
/// <remove select="#n3"/>
/// <after select="#n1"><li id="n4"/></after>
/// </delta>
/// ```
///
/// Node IDs are written as `id` attributes, in their [`Display`](`core::fmt::Display`) form.
#[derive(Debug)]
pub struct XmlDelta<W: fmt::Write> {
	writer: W,
	started: bool,
}
impl<W: fmt::Write> XmlDelta<W> {
	pub fn new(writer: W) -> Self {
		Self { writer, started: false }
	}

	/// Returns the writer. The document is incomplete unless [`DeltaSink::finish`] was called.
	pub fn into_inner(self) -> W {
		self.writer
	}

	fn start(&mut self) -> fmt::Result {
		if !self.started {
			self.started = true;
			self.writer.write_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<delta>\n")?;
		}
		Ok(())
	}

	fn write_node(&mut self, node: &Node) -> fmt::Result {
		write!(self.writer, "<{}", node.tag())?;
		self.write_attributes(node.id(), node.attributes())?;
		match node.children() {
			None => self.writer.write_str("/>"),
			Some(children) => {
				self.writer.write_char('>')?;
				for child in children {
					self.write_node(child)?;
				}
				write!(self.writer, "</{}>", node.tag())
			}
		}
	}

	fn write_attributes(&mut self, id: NodeId, attributes: &Attributes) -> fmt::Result {
		write!(self.writer, " id=\"{}\"", id)?;
		for (name, value) in attributes {
			if name != "id" {
				self.write_attribute(name, value)?;
			}
		}
		Ok(())
	}

	fn write_attribute(&mut self, name: &str, value: &str) -> fmt::Result {
		write!(self.writer, " {}=\"", name)?;
		write_escaped(&mut self.writer, value)?;
		self.writer.write_char('"')
	}

	fn write_content(&mut self, element: &str, select: NodeId, content: &[Node]) -> fmt::Result {
		write!(self.writer, "<{} select=\"#{}\">", element, select)?;
		for node in content {
			self.write_node(node)?;
		}
		writeln!(self.writer, "</{}>", element)
	}
}

impl<W: fmt::Write> DeltaSink for XmlDelta<W> {
	type Error = fmt::Error;

	fn operation(&mut self, operation: &Operation) -> Result<(), Self::Error> {
		self.start()?;
		match operation {
			Operation::Delete { node } => writeln!(self.writer, "<remove select=\"#{}\"/>", node),
			Operation::InsertAfter { parent, after: None, content } => self.write_content("prepend", *parent, core::slice::from_ref(content)),
			Operation::InsertAfter { after: Some(after), content, .. } => self.write_content("after", *after, core::slice::from_ref(content)),
			Operation::ReplaceChildren { container, content } => self.write_content("replaceContent", *container, content),
			Operation::ChangeAttributes { node, attributes } => {
				write!(self.writer, "<changeTagAttributes select=\"#{}\"", node)?;
				for (name, value) in attributes {
					self.write_attribute(name, value)?;
				}
				self.writer.write_str("/>\n")
			}
		}
	}

	fn finish(&mut self) -> Result<(), Self::Error> {
		self.start()?;
		self.writer.write_str("</delta>\n")
	}
}

fn write_escaped(writer: &mut impl fmt::Write, value: &str) -> fmt::Result {
	let mut rest = value;
	while let Some(i) = rest.find(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
		writer.write_str(&rest[..i])?;
		writer.write_str(match rest.as_bytes()[i] {
			b'&' => "&amp;",
			b'<' => "&lt;",
			b'>' => "&gt;",
			b'"' => "&quot;",
			_ => "&#39;",
		})?;
		rest = &rest[i + 1..];
	}
	writer.write_str(rest)
}
