#![doc(html_root_url = "https://docs.rs/dom-delta/0.0.1")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod change_set;
mod document;
mod error;
pub mod load;
mod node;
mod operation;
mod policy;
mod provider;
mod reconcile;
pub mod sink;
mod temp_set;

pub use document::Document;
pub use error::{DeltaError, DocumentError, PolicyError, ReconcileError};
pub use node::{Attributes, Node, NodeId};
pub use operation::Operation;
pub use policy::RenderPolicy;
pub use provider::NodeTree;
pub use reconcile::Reconciler;
pub use sink::{DeltaSink, XmlDelta};
