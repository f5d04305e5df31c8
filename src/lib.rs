//! xmlnode - convenience facades for XML documents and SQL statements
//!
//! The core is [`XmlNode`]: a cheap wrapper over one node in a shared,
//! mutable document tree, with namespace-aware lookup, XPath 1.0
//! evaluation and configurable serialization. Equality between nodes is
//! value-based (canonical serialized text), not reference-based.
//!
//! ```
//! use xmlnode::{XmlNode, XPathResultType};
//!
//! let doc = XmlNode::element("request").append([
//!     XmlNode::element("id").set_text("15"),
//!     XmlNode::element("id").set_text("333"),
//! ]);
//!
//! assert_eq!(doc.find("id").unwrap().text(), "15");
//! let first = doc.xpath("//id", XPathResultType::Node)?.into_node();
//! assert_eq!(first.unwrap().text(), "15");
//!
//! let copy = XmlNode::parse(&doc.to_text(false, false))?;
//! assert_eq!(doc, copy);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The sibling [`sql`] module is the matching facade for relational
//! access: parameterized statement execution and row mapping over
//! rusqlite.

pub mod dom;
pub mod error;
pub mod parse;
pub mod serial;
pub mod sql;
pub mod xpath;

mod node;

pub use dom::{Document, NodeId, NodeKind};
pub use error::{ParseError, SerializeError, XPathError};
pub use node::{XPathResult, XPathResultType, XmlNode};
pub use serial::WriteOptions;
pub use xpath::XPathValue;
