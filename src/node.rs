//! The `XmlNode` wrapper.
//!
//! A cheap, repeatedly-constructible view over one node in a shared,
//! mutable document tree. Many wrappers may alias the same underlying
//! node; cloning a wrapper clones the reference, never the tree.
//! Documents are single-threaded by construction (`Rc<RefCell<_>>`);
//! engines that are expensive to build (compiled XPath) are reused
//! through a per-thread cache.
//!
//! Equality is value-based: two wrappers are equal iff their canonical
//! serializations (declaration omitted, indentation off) are equal.
//! `Hash` uses the same canonical text, so equal nodes hash equally.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::rc::Rc;

use crate::dom::{Document, NodeId, DOCUMENT_NODE};
use crate::error::{ParseError, SerializeError, XPathError};
use crate::parse;
use crate::serial::{self, WriteOptions};
use crate::xpath::{self, XPathValue};

/// Expected result type of an XPath evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPathResultType {
    /// A single node (the first match in document order), or nothing.
    Node,
    /// All matching nodes in document order.
    NodeSet,
    /// A string.
    String,
    /// A number.
    Number,
    /// A boolean.
    Boolean,
}

/// Result of an XPath evaluation, shaped by [`XPathResultType`].
#[derive(Debug)]
pub enum XPathResult {
    /// First matching node, or None when nothing matched.
    Node(Option<XmlNode>),
    /// All matches in document order; duplicates are possible when the
    /// expression itself produces them.
    NodeSet(Vec<XmlNode>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl XPathResult {
    /// The wrapped node for `Node` results, None otherwise.
    pub fn into_node(self) -> Option<XmlNode> {
        match self {
            XPathResult::Node(node) => node,
            _ => None,
        }
    }

    /// The wrapped nodes for `NodeSet` results, empty otherwise.
    pub fn into_nodes(self) -> Vec<XmlNode> {
        match self {
            XPathResult::NodeSet(nodes) => nodes,
            _ => Vec::new(),
        }
    }

    /// The string for `String` results, None otherwise.
    pub fn into_string(self) -> Option<String> {
        match self {
            XPathResult::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A wrapper over one node of a mutable XML document.
#[derive(Clone)]
pub struct XmlNode {
    doc: Rc<RefCell<Document>>,
    id: NodeId,
}

impl XmlNode {
    fn wrap(doc: &Rc<RefCell<Document>>, id: NodeId) -> XmlNode {
        XmlNode {
            doc: Rc::clone(doc),
            id,
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Parse a document from a byte stream, optionally decoding with
    /// the named charset. Returns the wrapper over the root element.
    ///
    /// DOCTYPE declarations and entity definitions are rejected.
    pub fn from_reader(input: impl Read, charset: Option<&str>) -> Result<XmlNode, ParseError> {
        Ok(Self::over_root(parse::parse_reader(input, charset)?))
    }

    /// Parse a document from a string. Returns the wrapper over the
    /// root element.
    pub fn parse(text: &str) -> Result<XmlNode, ParseError> {
        Ok(Self::over_root(parse::parse_document(text)?))
    }

    fn over_root(doc: Document) -> XmlNode {
        // parse_* guarantees a root element exists.
        let id = doc.root_element().unwrap_or(DOCUMENT_NODE);
        XmlNode {
            doc: Rc::new(RefCell::new(doc)),
            id,
        }
    }

    /// Create a new single-element document. `tag` may carry a
    /// `prefix:` part. Every call starts an independent document;
    /// children are attached by [`append`](Self::append), which copies.
    pub fn element(tag: &str) -> XmlNode {
        Self::new_element(tag, None)
    }

    /// Create a new single-element document with a namespace-qualified
    /// root.
    pub fn element_ns(tag: &str, namespace_uri: &str) -> XmlNode {
        Self::new_element(tag, Some(namespace_uri))
    }

    fn new_element(tag: &str, namespace_uri: Option<&str>) -> XmlNode {
        let mut doc = Document::new();
        let id = doc.create_element(tag, namespace_uri);
        doc.append_child(DOCUMENT_NODE, id);
        XmlNode {
            doc: Rc::new(RefCell::new(doc)),
            id,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The underlying node id (escape hatch, paired with
    /// [`document`](Self::document)).
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// The underlying document (escape hatch for advanced use).
    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.doc)
    }

    /// A wrapper over this node's owning document node.
    pub fn owner_document(&self) -> XmlNode {
        Self::wrap(&self.doc, DOCUMENT_NODE)
    }

    /// Qualified name of this node.
    pub fn name(&self) -> String {
        RefCell::borrow(&self.doc).qualified_name(self.id)
    }

    /// Local name of this node.
    pub fn local_name(&self) -> String {
        RefCell::borrow(&self.doc).local_name(self.id).to_string()
    }

    /// Resolved namespace URI of this node, or None.
    pub fn namespace_uri(&self) -> Option<String> {
        RefCell::borrow(&self.doc).namespace_uri(self.id).map(str::to_string)
    }

    /// Concatenated text content of the subtree (text and CDATA).
    pub fn text(&self) -> String {
        RefCell::borrow(&self.doc).text_content(self.id)
    }

    /// Attribute value by qualified name; None when absent. Lookups
    /// never fail.
    pub fn attribute(&self, name: &str) -> Option<String> {
        RefCell::borrow(&self.doc)
            .attribute_value(self.id, name)
            .map(str::to_string)
    }

    // ------------------------------------------------------------------
    // Mutators (in place on the aliased tree; chainable)
    // ------------------------------------------------------------------

    /// Set an attribute.
    pub fn set_attribute(self, name: &str, value: &str) -> Self {
        self.doc
            .borrow_mut()
            .set_attribute(self.id, name, value, None);
        self
    }

    /// Set a namespace-qualified attribute. Serialization assigns a
    /// stable generated prefix when the name does not carry one.
    pub fn set_attribute_ns(self, name: &str, value: &str, namespace_uri: &str) -> Self {
        self.doc
            .borrow_mut()
            .set_attribute(self.id, name, value, Some(namespace_uri));
        self
    }

    /// Append a CDATA section under this node.
    pub fn append_cdata(self, data: &str) -> Self {
        {
            let mut doc = self.doc.borrow_mut();
            let node = doc.create_cdata(data);
            doc.append_child(self.id, node);
        }
        self
    }

    /// Replace all existing content with a single text node.
    pub fn set_text(self, content: &str) -> Self {
        {
            let mut doc = self.doc.borrow_mut();
            doc.detach_children(self.id);
            if !content.is_empty() {
                let node = doc.create_text(content);
                doc.append_child(self.id, node);
            }
        }
        self
    }

    /// Append children. Each child's subtree is deep-copied (imported)
    /// into this node's document; the source trees are never
    /// re-parented or mutated, even when they already live in this
    /// document.
    pub fn append<I>(self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<XmlNode>,
    {
        for child in children {
            let child = child.borrow();
            if Rc::ptr_eq(&self.doc, &child.doc) {
                self.doc.borrow_mut().copy_subtree(self.id, child.id);
            } else {
                let src = RefCell::borrow(&child.doc);
                self.doc
                    .borrow_mut()
                    .import_subtree(self.id, &src, child.id);
            }
        }
        self
    }

    // ------------------------------------------------------------------
    // Namespace-aware lookup (immediate element children only)
    // ------------------------------------------------------------------

    /// First immediate child element with the given tag name, ignoring
    /// namespaces, or None.
    pub fn find(&self, tag: &str) -> Option<XmlNode> {
        self.find_matching(tag, None).into_iter().next()
    }

    /// First immediate child element with the given local name and
    /// namespace URI, or None.
    pub fn find_ns(&self, tag: &str, namespace_uri: &str) -> Option<XmlNode> {
        self.find_matching(tag, Some(namespace_uri)).into_iter().next()
    }

    /// All immediate child elements with the given tag name, ignoring
    /// namespaces.
    pub fn find_all(&self, tag: &str) -> Vec<XmlNode> {
        self.find_matching(tag, None)
    }

    /// All immediate child elements with the given local name and
    /// namespace URI.
    pub fn find_all_ns(&self, tag: &str, namespace_uri: &str) -> Vec<XmlNode> {
        self.find_matching(tag, Some(namespace_uri))
    }

    /// Matching rule: with a URI, the child's resolved namespace must
    /// equal it and its local name must equal `tag`. Without one,
    /// namespaces are ignored: `tag` is compared against the qualified
    /// name of namespace-less children and the local name of namespaced
    /// ones, so callers need not guess whether the target is namespaced.
    fn find_matching(&self, tag: &str, namespace_uri: Option<&str>) -> Vec<XmlNode> {
        let doc = RefCell::borrow(&self.doc);
        let mut matches = Vec::new();
        for child in doc.children(self.id) {
            if !doc.node(child).is_element() {
                continue;
            }
            let child_ns = doc.namespace_uri(child);
            let is_match = match namespace_uri {
                Some(uri) => child_ns == Some(uri) && doc.local_name(child) == tag,
                None => {
                    let name = match child_ns {
                        None => doc.qualified_name(child),
                        Some(_) => doc.local_name(child).to_string(),
                    };
                    name == tag
                }
            };
            if is_match {
                matches.push(Self::wrap(&self.doc, child));
            }
        }
        matches
    }

    // ------------------------------------------------------------------
    // XPath
    // ------------------------------------------------------------------

    /// Evaluate an XPath expression with this node as the context node.
    pub fn xpath(
        &self,
        expression: &str,
        want: XPathResultType,
    ) -> Result<XPathResult, XPathError> {
        self.xpath_shaped(expression, want, None)
    }

    /// Evaluate an XPath expression with a namespace context resolving
    /// the prefixes used inside the expression. An unresolvable prefix
    /// is an error, not an empty result.
    pub fn xpath_ns(
        &self,
        expression: &str,
        want: XPathResultType,
        namespaces: &HashMap<String, String>,
    ) -> Result<XPathResult, XPathError> {
        self.xpath_shaped(expression, want, Some(namespaces))
    }

    fn xpath_shaped(
        &self,
        expression: &str,
        want: XPathResultType,
        namespaces: Option<&HashMap<String, String>>,
    ) -> Result<XPathResult, XPathError> {
        let compiled = xpath::compile_cached(expression)?;
        let doc = RefCell::borrow(&self.doc);
        let value = compiled.evaluate(&doc, self.id, namespaces)?;

        let type_error = |wanted: &'static str, value: &XPathValue| XPathError::ResultType {
            wanted,
            message: format!("expression produced {}", value_kind(value)),
        };

        match want {
            XPathResultType::Node => match value {
                XPathValue::NodeSet(nodes) => Ok(XPathResult::Node(
                    nodes.first().map(|&id| Self::wrap(&self.doc, id)),
                )),
                other => Err(type_error("node", &other)),
            },
            XPathResultType::NodeSet => match value {
                XPathValue::NodeSet(nodes) => Ok(XPathResult::NodeSet(
                    nodes.iter().map(|&id| Self::wrap(&self.doc, id)).collect(),
                )),
                other => Err(type_error("node-set", &other)),
            },
            XPathResultType::String => Ok(XPathResult::String(xpath::eval::value_string(
                &doc, &value,
            ))),
            XPathResultType::Number => Ok(XPathResult::Number(xpath::eval::value_number(
                &doc, &value,
            ))),
            XPathResultType::Boolean => Ok(XPathResult::Boolean(value.to_boolean())),
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize this subtree to UTF-8 text. The two flags are
    /// independent; an emitted declaration always advertises UTF-8.
    pub fn to_text(&self, omit_declaration: bool, indent: bool) -> String {
        serial::serialize(
            &RefCell::borrow(&self.doc),
            self.id,
            &WriteOptions {
                omit_declaration,
                indent,
            },
        )
    }

    /// The canonical form used by equality and hashing: declaration
    /// omitted, indentation off.
    pub fn to_canonical_text(&self) -> String {
        serial::serialize(&RefCell::borrow(&self.doc), self.id, &WriteOptions::canonical())
    }

    /// Write this subtree to an output stream (with declaration,
    /// without indentation).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        self.write_to_with(writer, false, false)
    }

    /// Write this subtree to an output stream.
    pub fn write_to_with<W: Write>(
        &self,
        writer: &mut W,
        omit_declaration: bool,
        indent: bool,
    ) -> Result<(), SerializeError> {
        serial::write_to(
            writer,
            &RefCell::borrow(&self.doc),
            self.id,
            &WriteOptions {
                omit_declaration,
                indent,
            },
        )
    }
}

fn value_kind(value: &XPathValue) -> &'static str {
    match value {
        XPathValue::NodeSet(_) => "a node-set",
        XPathValue::Boolean(_) => "a boolean",
        XPathValue::Number(_) => "a number",
        XPathValue::String(_) => "a string",
        XPathValue::StringList(_) => "attribute values",
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(true, true))
    }
}

impl fmt::Debug for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlNode")
            .field("xml", &self.to_canonical_text())
            .finish()
    }
}

impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        self.to_canonical_text() == other.to_canonical_text()
    }
}

impl Eq for XmlNode {}

impl Hash for XmlNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_canonical_text().hash(state);
    }
}
