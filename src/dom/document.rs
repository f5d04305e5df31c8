//! Arena-based mutable XML document.
//!
//! Storage follows the arena layout:
//! - one `Vec<NodeData>` holding every node, document root at index 0
//! - sibling/child links by `NodeId`
//! - string interning for names, prefixes, URIs, values
//!
//! The arena is append-only. Every public construction path appends new
//! subtrees at the end of both the child list and the arena, so
//! ascending `NodeId` is document order for every reachable node; XPath
//! relies on this when sorting node-sets. Nodes detached by
//! `detach_children` stay in the arena but become unreachable and are
//! reclaimed when the document is dropped.

use super::node::{AttrData, NodeData, NodeId, NodeKind};
use super::strings::StringPool;

/// Id of the document root node (always index 0).
pub const DOCUMENT_NODE: NodeId = 0;

/// An XML document: node arena plus interned strings.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    pub strings: StringPool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the document root node.
    pub fn new() -> Self {
        Document {
            nodes: vec![NodeData::document()],
            strings: StringPool::new(),
        }
    }

    /// Get a node by id. Ids originate from this arena, so indexing is
    /// direct.
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id as usize]
    }

    /// Total number of nodes in the arena, including detached ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The root element (first element child of the document node).
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(DOCUMENT_NODE)
            .find(|&id| self.node(id).is_element())
    }

    fn push_node(&mut self, node: NodeData) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Split `prefix:local` into its parts.
    pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
        match qname.find(':') {
            Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
            None => (None, qname),
        }
    }

    // ------------------------------------------------------------------
    // Node creation (detached; link with append_child)
    // ------------------------------------------------------------------

    /// Create a detached element. `qname` may carry a `prefix:` part.
    pub fn create_element(&mut self, qname: &str, ns_uri: Option<&str>) -> NodeId {
        let (prefix, local) = Self::split_qname(qname);
        let name_id = self.strings.intern(local);
        let prefix_id = prefix.map_or(0, |p| self.strings.intern(p));
        let ns_id = ns_uri.map_or(0, |u| self.strings.intern(u));
        self.push_node(NodeData::element(name_id, prefix_id, ns_id))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        let value_id = self.strings.intern(content);
        self.push_node(NodeData::text(value_id))
    }

    /// Create a detached CDATA node.
    pub fn create_cdata(&mut self, content: &str) -> NodeId {
        let value_id = self.strings.intern(content);
        self.push_node(NodeData::cdata(value_id))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        let value_id = self.strings.intern(content);
        self.push_node(NodeData::comment(value_id))
    }

    /// Create a detached processing instruction node.
    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        let name_id = self.strings.intern(target);
        let value_id = self.strings.intern(data);
        self.push_node(NodeData::processing_instruction(name_id, value_id))
    }

    // ------------------------------------------------------------------
    // Tree manipulation
    // ------------------------------------------------------------------

    /// Link a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.nodes[parent as usize].last_child;
        if let Some(last) = last_child {
            self.nodes[child as usize].prev_sibling = Some(last);
            self.nodes[last as usize].next_sibling = Some(child);
        } else {
            self.nodes[parent as usize].first_child = Some(child);
        }
        self.nodes[parent as usize].last_child = Some(child);
        self.nodes[child as usize].parent = Some(parent);
    }

    /// Unlink every child of `parent`. The detached nodes remain in the
    /// arena but are no longer reachable from the tree.
    pub fn detach_children(&mut self, parent: NodeId) {
        let children: Vec<NodeId> = self.children(parent).collect();
        for id in children {
            let node = &mut self.nodes[id as usize];
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
        let parent = &mut self.nodes[parent as usize];
        parent.first_child = None;
        parent.last_child = None;
    }

    /// Set an attribute on an element.
    ///
    /// With a namespace URI, an existing attribute with the same
    /// (namespace, local name) pair is replaced; without one, an
    /// existing attribute with the same qualified name and no namespace
    /// is replaced. Otherwise the attribute is appended, preserving
    /// insertion order (the deterministic order used by serialization).
    pub fn set_attribute(&mut self, el: NodeId, qname: &str, value: &str, ns_uri: Option<&str>) {
        let (prefix, local) = Self::split_qname(qname);
        let name_id = self.strings.intern(local);
        let prefix_id = prefix.map_or(0, |p| self.strings.intern(p));
        let ns_id = ns_uri.map_or(0, |u| self.strings.intern(u));
        let value_id = self.strings.intern(value);

        let existing = self.nodes[el as usize].attrs.iter().position(|a| {
            if ns_id != 0 {
                a.ns_id == ns_id && a.name_id == name_id
            } else {
                a.ns_id == 0 && a.name_id == name_id && a.prefix_id == prefix_id
            }
        });
        let attrs = &mut self.nodes[el as usize].attrs;
        match existing {
            Some(pos) => {
                attrs[pos].prefix_id = prefix_id;
                attrs[pos].value_id = value_id;
            }
            None => attrs.push(AttrData::new(name_id, prefix_id, ns_id, value_id)),
        }
    }

    /// Get an attribute value by qualified name, or None if absent.
    pub fn attribute_value(&self, el: NodeId, name: &str) -> Option<&str> {
        let (prefix, local) = Self::split_qname(name);
        for attr in &self.nodes[el as usize].attrs {
            let attr_prefix = self.strings.get(attr.prefix_id);
            let attr_local = self.strings.get(attr.name_id);
            let matches = match prefix {
                Some(p) => attr_prefix == p && attr_local == local,
                None => attr.prefix_id == 0 && attr_local == local,
            };
            if matches {
                return Some(self.strings.get(attr.value_id));
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Name and content accessors
    // ------------------------------------------------------------------

    /// Local name of an element / target of a processing instruction.
    pub fn local_name(&self, id: NodeId) -> &str {
        self.strings.get(self.node(id).name_id)
    }

    /// Namespace prefix, or None.
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        let node = self.node(id);
        (node.prefix_id != 0).then(|| self.strings.get(node.prefix_id))
    }

    /// Resolved namespace URI, or None.
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        let node = self.node(id);
        (node.ns_id != 0).then(|| self.strings.get(node.ns_id))
    }

    /// Qualified name (`prefix:local` or plain local name).
    pub fn qualified_name(&self, id: NodeId) -> String {
        match self.prefix(id) {
            Some(prefix) => format!("{}:{}", prefix, self.local_name(id)),
            None => self.local_name(id).to_string(),
        }
    }

    /// Raw content of a text/CDATA/comment node or PI data.
    pub fn content(&self, id: NodeId) -> &str {
        self.strings.get(self.node(id).value_id)
    }

    /// Concatenated text of the subtree: text and CDATA nodes only, in
    /// document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let node = self.node(id);
        if node.is_textual() {
            return self.content(id).to_string();
        }
        let mut out = String::new();
        for desc in self.descendants(id) {
            if self.node(desc).is_textual() {
                out.push_str(self.content(desc));
            }
        }
        out
    }

    /// XPath string-value of a node.
    pub fn string_value(&self, id: NodeId) -> String {
        match self.node(id).kind {
            NodeKind::Comment | NodeKind::ProcessingInstruction => self.content(id).to_string(),
            _ => self.text_content(id),
        }
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Iterate over the children of a node.
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Iterate over all descendants of a node in document order
    /// (excluding the node itself).
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        let mut child = self.node(id).last_child;
        while let Some(c) = child {
            stack.push(c);
            child = self.node(c).prev_sibling;
        }
        DescendantIter { doc: self, stack }
    }

    // ------------------------------------------------------------------
    // Subtree import (deep copy)
    // ------------------------------------------------------------------

    /// Deep-copy a subtree from another document, appending the copy as
    /// the last child of `parent`. The source tree is left untouched.
    ///
    /// Copies are made in pre-order, preserving the NodeId/document-order
    /// invariant. Importing a document node copies its children under
    /// `parent` and returns `parent`.
    pub fn import_subtree(&mut self, parent: NodeId, src: &Document, src_id: NodeId) -> NodeId {
        let sn = src.node(src_id);
        if sn.kind == NodeKind::Document {
            for child in src.children(src_id) {
                self.import_subtree(parent, src, child);
            }
            return parent;
        }

        let name_id = self.strings.intern(src.strings.get(sn.name_id));
        let prefix_id = self.strings.intern(src.strings.get(sn.prefix_id));
        let ns_id = self.strings.intern(src.strings.get(sn.ns_id));
        let value_id = self.strings.intern(src.strings.get(sn.value_id));

        let mut node = match sn.kind {
            NodeKind::Element => NodeData::element(name_id, prefix_id, ns_id),
            NodeKind::Text => NodeData::text(value_id),
            NodeKind::CData => NodeData::cdata(value_id),
            NodeKind::Comment => NodeData::comment(value_id),
            NodeKind::ProcessingInstruction => {
                NodeData::processing_instruction(name_id, value_id)
            }
            NodeKind::Document => unreachable!(),
        };
        node.attrs = sn
            .attrs
            .iter()
            .map(|a| {
                AttrData::new(
                    self.strings.intern(src.strings.get(a.name_id)),
                    self.strings.intern(src.strings.get(a.prefix_id)),
                    self.strings.intern(src.strings.get(a.ns_id)),
                    self.strings.intern(src.strings.get(a.value_id)),
                )
            })
            .collect();

        let new_id = self.push_node(node);
        self.append_child(parent, new_id);
        for child in src.children(src_id) {
            self.import_subtree(new_id, src, child);
        }
        new_id
    }

    /// Deep-copy a subtree of this document, appending the copy as the
    /// last child of `parent`. Used when source and destination share a
    /// document: imports always copy, never re-parent.
    pub fn copy_subtree(&mut self, parent: NodeId, src_id: NodeId) -> NodeId {
        let sn = self.node(src_id);
        if sn.kind == NodeKind::Document {
            let children: Vec<NodeId> = self.children(src_id).collect();
            for child in children {
                self.copy_subtree(parent, child);
            }
            return parent;
        }

        let mut node = sn.clone();
        node.parent = None;
        node.first_child = None;
        node.last_child = None;
        node.prev_sibling = None;
        node.next_sibling = None;

        let new_id = self.push_node(node);
        self.append_child(parent, new_id);
        let children: Vec<NodeId> = self.children(src_id).collect();
        for child in children {
            self.copy_subtree(new_id, child);
        }
        new_id
    }
}

/// Iterator over child nodes.
pub struct ChildIter<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first, document order).
pub struct DescendantIter<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let mut child = self.doc.node(current).last_child;
        while let Some(c) = child {
            self.stack.push(c);
            child = self.doc.node(c).prev_sibling;
        }
        Some(current)
    }
}
