//! XML serializer.
//!
//! Renders a subtree of the arena [`Document`] to UTF-8 text. The
//! declaration and indentation are controlled independently; when a
//! declaration is emitted it always advertises UTF-8.
//!
//! Namespace declarations are not stored on the tree; they are derived
//! during the walk and emitted on the first element that needs the
//! binding. Attributes that carry a namespace URI but no usable prefix
//! get a generated prefix (`ns0`, `ns1`, ...) distinct from anything in
//! scope. Attributes are written in insertion order, which is the
//! deterministic order equality relies on.

use std::io::Write;

use memchr::memchr3;

use crate::dom::{Document, NamespaceScopes, NodeId, NodeKind};
use crate::error::SerializeError;

/// Options controlling serialization output.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Skip the `<?xml ...?>` declaration. Defaults to `false`.
    pub omit_declaration: bool,
    /// Pretty-print with two-space indentation. Mixed-content elements
    /// (text or CDATA children) are never indented. Defaults to `false`.
    pub indent: bool,
}

impl WriteOptions {
    /// The canonical form used for equality and hashing: declaration
    /// omitted, indentation off.
    pub fn canonical() -> Self {
        WriteOptions {
            omit_declaration: true,
            indent: false,
        }
    }
}

/// Serialize a subtree to a string. Serializing the document node
/// renders the whole document including comments and processing
/// instructions outside the root element.
pub fn serialize(doc: &Document, node: NodeId, options: &WriteOptions) -> String {
    let mut out = String::new();
    if !options.omit_declaration {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        if options.indent {
            out.push('\n');
        }
    }

    let roots: Vec<NodeId> = if doc.node(node).kind == NodeKind::Document {
        doc.children(node).collect()
    } else {
        vec![node]
    };

    let mut scopes = NamespaceScopes::new();
    let mut generated = 0usize;
    for (i, root) in roots.iter().enumerate() {
        if options.indent && i > 0 {
            out.push('\n');
        }
        write_node(doc, *root, &mut out, &mut scopes, &mut generated, options, 0);
    }
    if options.indent {
        out.push('\n');
    }
    out
}

/// Serialize a subtree into an output stream.
pub fn write_to<W: Write>(
    writer: &mut W,
    doc: &Document,
    node: NodeId,
    options: &WriteOptions,
) -> Result<(), SerializeError> {
    let text = serialize(doc, node, options);
    writer.write_all(text.as_bytes())?;
    Ok(())
}

fn write_node(
    doc: &Document,
    id: NodeId,
    out: &mut String,
    scopes: &mut NamespaceScopes,
    generated: &mut usize,
    options: &WriteOptions,
    depth: usize,
) {
    match doc.node(id).kind {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, out, scopes, generated, options, depth);
            }
        }
        NodeKind::Element => write_element(doc, id, out, scopes, generated, options, depth),
        NodeKind::Text => escape_text(out, doc.content(id)),
        NodeKind::CData => write_cdata(out, doc.content(id)),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(doc.content(id));
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction => {
            out.push_str("<?");
            out.push_str(doc.local_name(id));
            let data = doc.content(id);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
}

fn write_element(
    doc: &Document,
    id: NodeId,
    out: &mut String,
    scopes: &mut NamespaceScopes,
    generated: &mut usize,
    options: &WriteOptions,
    depth: usize,
) {
    scopes.push_scope();

    // Declarations this element must carry: (prefix, uri); the empty
    // prefix is the default namespace.
    let mut decls: Vec<(String, String)> = Vec::new();

    let local = doc.local_name(id);
    let tag = match (doc.namespace_uri(id), doc.prefix(id)) {
        (Some(uri), Some(prefix)) => {
            if !scopes.is_bound(prefix, uri) {
                decls.push((prefix.to_string(), uri.to_string()));
                scopes.declare(prefix, uri);
            }
            format!("{}:{}", prefix, local)
        }
        (Some(uri), None) => {
            if scopes.resolve_default() != Some(uri) {
                decls.push((String::new(), uri.to_string()));
                scopes.declare("", uri);
            }
            local.to_string()
        }
        (None, _) => {
            // Undeclare an inherited default namespace.
            if scopes.resolve_default().is_some() {
                decls.push((String::new(), String::new()));
                scopes.declare("", "");
            }
            local.to_string()
        }
    };

    // Resolve attribute names, possibly adding declarations.
    let node = doc.node(id);
    let mut attrs: Vec<(String, &str)> = Vec::with_capacity(node.attrs.len());
    for attr in &node.attrs {
        let attr_local = doc.strings.get(attr.name_id);
        let attr_prefix = doc.strings.get(attr.prefix_id);
        let value = doc.strings.get(attr.value_id);
        let name = if attr.ns_id == 0 {
            if attr.prefix_id != 0 {
                format!("{}:{}", attr_prefix, attr_local)
            } else {
                attr_local.to_string()
            }
        } else {
            let uri = doc.strings.get(attr.ns_id);
            let prefix = attribute_prefix(attr_prefix, uri, scopes, &mut decls, generated);
            format!("{}:{}", prefix, attr_local)
        };
        attrs.push((name, value));
    }

    out.push('<');
    out.push_str(&tag);
    for (prefix, uri) in &decls {
        out.push(' ');
        if prefix.is_empty() {
            out.push_str("xmlns=\"");
        } else {
            out.push_str("xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attribute(out, uri);
        out.push('"');
    }
    for (name, value) in &attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(out, value);
        out.push('"');
    }

    if !doc.node(id).has_children() {
        out.push_str("/>");
        scopes.pop_scope();
        return;
    }
    out.push('>');

    let pretty = options.indent && element_only_content(doc, id);
    for child in doc.children(id) {
        if pretty {
            out.push('\n');
            push_indent(out, depth + 1);
        }
        write_node(doc, child, out, scopes, generated, options, depth + 1);
    }
    if pretty {
        out.push('\n');
        push_indent(out, depth);
    }

    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
    scopes.pop_scope();
}

/// Pick the prefix for a namespaced attribute: its own prefix when
/// usable, an in-scope prefix bound to the same URI, or a fresh
/// generated one.
fn attribute_prefix(
    own_prefix: &str,
    uri: &str,
    scopes: &mut NamespaceScopes,
    decls: &mut Vec<(String, String)>,
    generated: &mut usize,
) -> String {
    if !own_prefix.is_empty() {
        if scopes.is_bound(own_prefix, uri) {
            return own_prefix.to_string();
        }
        if !scopes.has_prefix(own_prefix) {
            decls.push((own_prefix.to_string(), uri.to_string()));
            scopes.declare(own_prefix, uri);
            return own_prefix.to_string();
        }
    }
    if let Some(prefix) = scopes.prefix_for(uri) {
        return prefix.to_string();
    }
    let prefix = loop {
        let candidate = format!("ns{}", *generated);
        *generated += 1;
        if !scopes.has_prefix(&candidate) {
            break candidate;
        }
    };
    decls.push((prefix.clone(), uri.to_string()));
    scopes.declare(&prefix, uri);
    prefix
}

/// True when every child is an element, comment or processing
/// instruction, so indentation cannot alter the text content.
fn element_only_content(doc: &Document, id: NodeId) -> bool {
    doc.children(id)
        .all(|child| !doc.node(child).is_textual())
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Escape `&`, `<` and `>` in character data. memchr finds the next
/// byte needing an entity; clean spans are copied whole.
fn escape_text(out: &mut String, s: &str) {
    escape_into(out, s, false);
}

/// Escape `&`, `<` and `"` in attribute values.
fn escape_attribute(out: &mut String, s: &str) {
    escape_into(out, s, true);
}

fn escape_into(out: &mut String, s: &str, attribute: bool) {
    let bytes = s.as_bytes();
    let mut last = 0;
    while last < bytes.len() {
        let found = if attribute {
            memchr3(b'&', b'<', b'"', &bytes[last..])
        } else {
            memchr3(b'&', b'<', b'>', &bytes[last..])
        };
        let Some(rel) = found else { break };
        let pos = last + rel;
        out.push_str(&s[last..pos]);
        match bytes[pos] {
            b'&' => out.push_str("&amp;"),
            b'<' => out.push_str("&lt;"),
            b'>' => out.push_str("&gt;"),
            _ => out.push_str("&quot;"),
        }
        last = pos + 1;
    }
    out.push_str(&s[last..]);
}

fn write_cdata(out: &mut String, content: &str) {
    out.push_str("<![CDATA[");
    let mut rest = content;
    // A literal "]]>" inside the data splits the section in two.
    while let Some(pos) = rest.find("]]>") {
        out.push_str(&rest[..pos + 2]);
        out.push_str("]]><![CDATA[");
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out.push_str("]]>");
}
