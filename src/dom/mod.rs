//! Arena-based mutable XML document tree.
//!
//! - Arena allocation for nodes, `NodeId` (u32) indices
//! - String interning for names, URIs and content
//! - Namespace scope tracking for parsing and serialization

pub mod document;
pub mod namespace;
pub mod node;
pub mod strings;

pub use document::{ChildIter, DescendantIter, Document, DOCUMENT_NODE};
pub use namespace::NamespaceScopes;
pub use node::{AttrData, NodeData, NodeId, NodeKind};
pub use strings::StringPool;
