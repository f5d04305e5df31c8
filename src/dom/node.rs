//! Node and attribute storage.
//!
//! Uses NodeId (u32) for compact, cache-friendly node references into
//! the document arena.

/// Compact node identifier (index into the arena).
pub type NodeId = u32;

/// Type of XML node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

/// A node in the arena.
///
/// Sibling/child links are NodeIds; name, prefix, namespace URI and
/// content are ids into the document's string pool.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for the document root and detached nodes)
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Local name (elements) or target (processing instructions)
    pub name_id: u32,
    /// Namespace prefix, or 0
    pub prefix_id: u32,
    /// Resolved namespace URI, or 0
    pub ns_id: u32,
    /// Content: text/CDATA/comment body, PI data; 0 for elements
    pub value_id: u32,
    /// Attributes in insertion order (elements only)
    pub attrs: Vec<AttrData>,
}

impl NodeData {
    fn blank(kind: NodeKind) -> Self {
        NodeData {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id: 0,
            prefix_id: 0,
            ns_id: 0,
            value_id: 0,
            attrs: Vec::new(),
        }
    }

    /// Create the document root node.
    pub fn document() -> Self {
        Self::blank(NodeKind::Document)
    }

    /// Create an element node.
    pub fn element(name_id: u32, prefix_id: u32, ns_id: u32) -> Self {
        NodeData {
            name_id,
            prefix_id,
            ns_id,
            ..Self::blank(NodeKind::Element)
        }
    }

    /// Create a text node.
    pub fn text(value_id: u32) -> Self {
        NodeData {
            value_id,
            ..Self::blank(NodeKind::Text)
        }
    }

    /// Create a CDATA node.
    pub fn cdata(value_id: u32) -> Self {
        NodeData {
            value_id,
            ..Self::blank(NodeKind::CData)
        }
    }

    /// Create a comment node.
    pub fn comment(value_id: u32) -> Self {
        NodeData {
            value_id,
            ..Self::blank(NodeKind::Comment)
        }
    }

    /// Create a processing instruction node.
    pub fn processing_instruction(name_id: u32, value_id: u32) -> Self {
        NodeData {
            name_id,
            value_id,
            ..Self::blank(NodeKind::ProcessingInstruction)
        }
    }

    /// Check if this is an element node.
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this is a text or CDATA node.
    #[inline]
    pub fn is_textual(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    /// Check if this node has children.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

/// Stored attribute. Name parts mirror elements: local name, optional
/// prefix and resolved namespace URI.
#[derive(Debug, Clone)]
pub struct AttrData {
    /// Local name
    pub name_id: u32,
    /// Namespace prefix, or 0
    pub prefix_id: u32,
    /// Resolved namespace URI, or 0
    pub ns_id: u32,
    /// Attribute value
    pub value_id: u32,
}

impl AttrData {
    pub fn new(name_id: u32, prefix_id: u32, ns_id: u32, value_id: u32) -> Self {
        AttrData {
            name_id,
            prefix_id,
            ns_id,
            value_id,
        }
    }
}
