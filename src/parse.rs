//! Document builder.
//!
//! Builds the arena [`Document`] from quick-xml events, resolving
//! namespace prefixes against a scope stack as elements are entered.
//! `xmlns`/`xmlns:*` declarations are consumed into scopes and are not
//! stored as attributes; the serializer re-derives declarations where
//! they are needed.
//!
//! Security: DOCTYPE declarations are rejected outright and entity
//! references beyond the five predefined ones fail the parse. External
//! entities are never fetched.

use std::io::Read;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::dom::{Document, NamespaceScopes, NodeId, DOCUMENT_NODE};
use crate::error::ParseError;

/// Parse a full document from a string.
pub fn parse_document(xml: &str) -> Result<Document, ParseError> {
    let mut doc = Document::new();
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(true);

    let mut stack: Vec<NodeId> = vec![DOCUMENT_NODE];
    let mut scopes = NamespaceScopes::new();
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                handle_element(
                    &mut doc,
                    &mut stack,
                    &mut scopes,
                    &mut seen_root,
                    &start,
                    false,
                    position,
                )?;
            }
            Ok(Event::Empty(start)) => {
                handle_element(
                    &mut doc,
                    &mut stack,
                    &mut scopes,
                    &mut seen_root,
                    &start,
                    true,
                    position,
                )?;
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    stack.pop();
                    scopes.pop_scope();
                }
            }
            Ok(Event::Text(text)) => {
                let content = text.unescape().map_err(|e| entity_error(e, position))?;
                if stack.len() == 1 {
                    if !content.trim().is_empty() {
                        return Err(ParseError::Structure(
                            "text content not allowed outside the root element".to_string(),
                        ));
                    }
                    continue;
                }
                let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);
                let node = doc.create_text(&content);
                doc.append_child(parent, node);
            }
            Ok(Event::CData(cdata)) => {
                if stack.len() == 1 {
                    return Err(ParseError::Structure(
                        "CDATA section not allowed outside the root element".to_string(),
                    ));
                }
                let bytes = cdata.into_inner();
                let content = String::from_utf8_lossy(&bytes);
                let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);
                let node = doc.create_cdata(&content);
                doc.append_child(parent, node);
            }
            Ok(Event::Comment(comment)) => {
                let content = String::from_utf8_lossy(&comment);
                let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);
                let node = doc.create_comment(&content);
                doc.append_child(parent, node);
            }
            Ok(Event::PI(pi)) => {
                let content = String::from_utf8_lossy(&pi);
                let (target, data) = match content.split_once(char::is_whitespace) {
                    Some((target, data)) => (target.to_string(), data.trim_start().to_string()),
                    None => (content.to_string(), String::new()),
                };
                let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);
                let node = doc.create_processing_instruction(&target, &data);
                doc.append_child(parent, node);
            }
            Ok(Event::Decl(_)) => {
                // Charset handling happens before the reader sees the
                // input; the declaration carries nothing else we keep.
            }
            Ok(Event::DocType(_)) => return Err(ParseError::DoctypeForbidden),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Malformed {
                    position,
                    message: e.to_string(),
                })
            }
        }
    }

    if stack.len() > 1 {
        return Err(ParseError::Malformed {
            position: reader.buffer_position(),
            message: "unclosed element at end of input".to_string(),
        });
    }
    if doc.root_element().is_none() {
        return Err(ParseError::Structure("no document element".to_string()));
    }
    Ok(doc)
}

/// Parse a document from a byte stream, decoding with the given charset
/// (or BOM sniffing / UTF-8 when none is given).
pub fn parse_reader(mut input: impl Read, charset: Option<&str>) -> Result<Document, ParseError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let text = decode(&bytes, charset)?;
    parse_document(&text)
}

fn entity_error(err: quick_xml::Error, position: usize) -> ParseError {
    match err {
        quick_xml::Error::EscapeError(e) => ParseError::UndeclaredEntity(e.to_string()),
        other => ParseError::Malformed {
            position,
            message: other.to_string(),
        },
    }
}

fn handle_element(
    doc: &mut Document,
    stack: &mut Vec<NodeId>,
    scopes: &mut NamespaceScopes,
    seen_root: &mut bool,
    start: &BytesStart<'_>,
    is_empty: bool,
    position: usize,
) -> Result<(), ParseError> {
    if stack.len() == 1 {
        if *seen_root {
            return Err(ParseError::Structure(
                "document has multiple root elements".to_string(),
            ));
        }
        *seen_root = true;
    }

    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    // Collect raw attributes first; xmlns declarations open this
    // element's scope and apply to the element's own name.
    scopes.push_scope();
    let mut plain_attrs: Vec<(String, String)> = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Malformed {
            position,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| entity_error(e, position))?
            .into_owned();
        if key == "xmlns" {
            scopes.declare("", &value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scopes.declare(prefix, &value);
        } else {
            plain_attrs.push((key, value));
        }
    }

    let (prefix, _) = Document::split_qname(&qname);
    let ns_uri = match prefix {
        Some(p) => Some(scopes.resolve(p).ok_or_else(|| ParseError::Malformed {
            position,
            message: format!("unbound namespace prefix: {}", p),
        })?),
        None => scopes.resolve_default(),
    }
    .map(str::to_string);

    let element = doc.create_element(&qname, ns_uri.as_deref());
    for (key, value) in &plain_attrs {
        let (attr_prefix, _) = Document::split_qname(key);
        let attr_ns = match attr_prefix {
            // Unprefixed attributes never take the default namespace.
            None => None,
            Some(p) => Some(
                scopes
                    .resolve(p)
                    .ok_or_else(|| ParseError::Malformed {
                        position,
                        message: format!("unbound namespace prefix: {}", p),
                    })?
                    .to_string(),
            ),
        };
        doc.set_attribute(element, key, value, attr_ns.as_deref());
    }

    let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);
    doc.append_child(parent, element);

    if is_empty {
        scopes.pop_scope();
    } else {
        stack.push(element);
    }
    Ok(())
}

/// Decode raw bytes into XML text.
///
/// With no explicit charset the byte-order mark decides between UTF-16
/// variants and UTF-8; without a BOM the input is taken as UTF-8.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> Result<String, ParseError> {
    match charset {
        None => match bytes {
            [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, true),
            [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, false),
            [0xEF, 0xBB, 0xBF, rest @ ..] => decode_utf8(rest),
            _ => decode_utf8(bytes),
        },
        Some(name) => match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                decode_utf8(bytes)
            }
            "utf-16" => match bytes {
                [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, true),
                [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, false),
                // Big-endian is the spec default when no BOM is present.
                _ => decode_utf16(bytes, false),
            },
            "utf-16le" => decode_utf16(bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes), true),
            "utf-16be" => decode_utf16(bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes), false),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
            "us-ascii" | "ascii" => {
                if bytes.iter().all(u8::is_ascii) {
                    decode_utf8(bytes)
                } else {
                    Err(ParseError::InvalidEncoding {
                        charset: "US-ASCII".to_string(),
                    })
                }
            }
            other => Err(ParseError::UnsupportedCharset(other.to_string())),
        },
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ParseError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidEncoding {
        charset: "UTF-8".to_string(),
    })
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Result<String, ParseError> {
    let invalid = || ParseError::InvalidEncoding {
        charset: "UTF-16".to_string(),
    };
    if bytes.len() % 2 != 0 {
        return Err(invalid());
    }
    let units = bytes.chunks_exact(2).map(|pair| {
        let pair = [pair[0], pair[1]];
        if little_endian {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        }
    });
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    #[test]
    fn parse_simple() {
        let doc = parse_document("<root>hello</root>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.local_name(root), "root");
        assert_eq!(doc.text_content(root), "hello");
    }

    #[test]
    fn parse_nested_and_empty_elements() {
        let doc = parse_document("<a><b><c/></b></a>").unwrap();
        let root = doc.root_element().unwrap();
        let descendants: Vec<_> = doc.descendants(root).collect();
        assert_eq!(descendants.len(), 2);
    }

    #[test]
    fn namespaces_resolve_through_scopes() {
        let doc = parse_document(
            r#"<foo:root xmlns:foo="urn:foo"><foo:child/><plain xmlns="urn:default"/></foo:root>"#,
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.namespace_uri(root), Some("urn:foo"));
        assert_eq!(doc.local_name(root), "root");
        assert_eq!(doc.prefix(root), Some("foo"));

        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(doc.namespace_uri(children[0]), Some("urn:foo"));
        assert_eq!(doc.namespace_uri(children[1]), Some("urn:default"));
    }

    #[test]
    fn unprefixed_attribute_has_no_namespace() {
        let doc = parse_document(
            r#"<r xmlns="urn:d" xmlns:p="urn:p" a="1" p:b="2"/>"#,
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let attrs = &doc.node(root).attrs;
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].ns_id, 0);
        assert_eq!(doc.strings.get(attrs[1].ns_id), "urn:p");
    }

    #[test]
    fn cdata_is_kept_as_cdata() {
        let doc = parse_document("<r><![CDATA[a < b & c]]></r>").unwrap();
        let root = doc.root_element().unwrap();
        let child = doc.children(root).next().unwrap();
        assert_eq!(doc.node(child).kind, NodeKind::CData);
        assert_eq!(doc.content(child), "a < b & c");
    }

    #[test]
    fn doctype_is_rejected() {
        let err = parse_document("<!DOCTYPE root SYSTEM \"evil.dtd\"><root/>").unwrap_err();
        assert!(matches!(err, ParseError::DoctypeForbidden));
    }

    #[test]
    fn undeclared_entities_are_rejected() {
        let err = parse_document("<root>&bogus;</root>").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UndeclaredEntity(_) | ParseError::Malformed { .. }
        ));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse_document("<a><b></a></b>").is_err());
        assert!(parse_document("<a>").is_err());
        assert!(parse_document("<a/><b/>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn unbound_prefix_is_rejected() {
        assert!(parse_document("<foo:root/>").is_err());
    }

    #[test]
    fn decode_utf16_roundtrip() {
        let text = "<r>héllo</r>";
        let mut le = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&le, None).unwrap(), text);
        assert_eq!(decode(&le, Some("utf-16")).unwrap(), text);
    }

    #[test]
    fn decode_latin1() {
        let bytes = [b'<', b'r', b'>', 0xE9, b'<', b'/', b'r', b'>'];
        assert_eq!(decode(&bytes, Some("iso-8859-1")).unwrap(), "<r>é</r>");
    }

    #[test]
    fn unsupported_charset_is_an_error() {
        assert!(matches!(
            decode(b"<r/>", Some("ebcdic")),
            Err(ParseError::UnsupportedCharset(_))
        ));
    }

    #[test]
    fn parse_reader_decodes_bytes() {
        let doc = parse_reader("<r>ok</r>".as_bytes(), None).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "ok");
    }
}
