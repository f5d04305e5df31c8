//! End-to-end tests for the XmlNode facade: construction, lookup,
//! XPath evaluation, serialization and equality.

use std::collections::HashMap;

use xmlnode::{ParseError, XPathError, XPathResult, XPathResultType, XmlNode};

const FOO_NS: &str = "http://foobar.com/foo/bar";
const SEC_NS: &str = "http://security.com/2011/06/";

fn sample_document() -> XmlNode {
    XmlNode::element_ns("foo:document", FOO_NS).append([
        XmlNode::element_ns("foo:header", FOO_NS).append([XmlNode::element_ns(
            "security:Security",
            SEC_NS,
        )
        .append([XmlNode::element("Credentials")
            .set_attribute("type", "text")
            .set_text("pw01")])]),
        XmlNode::element_ns("foo:body", FOO_NS).append([XmlNode::element("request").append([
            XmlNode::element("id").set_text("15"),
            XmlNode::element("id").set_text("333"),
            XmlNode::element("data")
                .append_cdata("random string <b>with tags</b>")
                .set_attribute_ns("ver", "v1", "some::namespace"),
        ])]),
    ])
}

const SAMPLE_TEXT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<foo:document xmlns:foo=\"http://foobar.com/foo/bar\">\n\
\x20 <foo:header>\n\
\x20   <security:Security xmlns:security=\"http://security.com/2011/06/\">\n\
\x20     <Credentials type=\"text\">pw01</Credentials>\n\
\x20   </security:Security>\n\
\x20 </foo:header>\n\
\x20 <foo:body>\n\
\x20   <request>\n\
\x20     <id>15</id>\n\
\x20     <id>333</id>\n\
\x20     <data xmlns:ns0=\"some::namespace\" ns0:ver=\"v1\"><![CDATA[random string <b>with tags</b>]]></data>\n\
\x20   </request>\n\
\x20 </foo:body>\n\
</foo:document>\n";

#[test]
fn building_and_printing_works_as_expected() {
    assert_eq!(sample_document().to_text(false, true), SAMPLE_TEXT);
}

#[test]
fn printing_and_building_preserves_equality_and_hash() {
    let doc = sample_document();
    let mut out = Vec::new();
    doc.write_to(&mut out).unwrap();
    let copy = XmlNode::from_reader(out.as_slice(), None).unwrap();

    assert_eq!(doc, copy);

    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let hash_of = |node: &XmlNode| {
        let mut hasher = DefaultHasher::new();
        node.hash(&mut hasher);
        hasher.finish()
    };
    assert_eq!(hash_of(&doc), hash_of(&copy));
}

#[test]
fn roundtrip_with_and_without_declaration() {
    // Whitespace-only text nodes survive parsing, so round-trip
    // equality is over the non-indented forms.
    let doc = sample_document();
    for omit in [false, true] {
        let copy = XmlNode::parse(&doc.to_text(omit, false)).unwrap();
        assert_eq!(doc, copy, "omit={}", omit);
    }
}

#[test]
fn equality_is_an_equivalence_relation() {
    let a = sample_document();
    let b = sample_document();
    let c = sample_document();
    // Reflexive, symmetric, transitive.
    assert_eq!(a, a);
    assert_eq!(a, b);
    assert_eq!(b, a);
    assert_eq!(b, c);
    assert_eq!(a, c);

    let different = sample_document().set_attribute("extra", "1");
    assert_ne!(different, sample_document());
}

#[test]
fn find_finds_nodes_correctly() {
    let doc = sample_document();
    assert_eq!(
        doc.find_ns("body", FOO_NS)
            .unwrap()
            .find("request")
            .unwrap()
            .find("id")
            .unwrap()
            .text(),
        "15"
    );
}

#[test]
fn find_without_namespace_matches_regardless_of_namespace() {
    let doc = sample_document();
    assert_eq!(
        doc.find("body")
            .unwrap()
            .find("request")
            .unwrap()
            .find("id")
            .unwrap()
            .text(),
        "15"
    );
}

#[test]
fn find_with_namespace_picks_first_in_document_order() {
    let doc = XmlNode::element("root").append([
        XmlNode::element_ns("id", "urn:a").set_text("first"),
        XmlNode::element_ns("id", "urn:a").set_text("second"),
        XmlNode::element_ns("id", "urn:b").set_text("other"),
    ]);

    assert_eq!(doc.find_ns("id", "urn:a").unwrap().text(), "first");
    assert_eq!(doc.find_ns("id", "urn:b").unwrap().text(), "other");
    // No namespace filter: all three match regardless of namespace.
    assert_eq!(doc.find_all("id").len(), 3);
}

#[test]
fn lookups_of_non_existing_paths_return_none() {
    let doc = sample_document();
    assert!(doc.find("non-existing").is_none());
    assert!(doc.find_ns("non-existing", "myns").is_none());
    assert!(doc
        .xpath("//non-existing", XPathResultType::Node)
        .unwrap()
        .into_node()
        .is_none());
    assert!(doc.attribute("non-existing").is_none());
}

#[test]
fn xpath_finds_nodes_correctly() {
    let doc = sample_document();
    assert_eq!(
        doc.xpath("//id/text()", XPathResultType::String)
            .unwrap()
            .into_string()
            .unwrap(),
        "15"
    );
    let node = doc
        .xpath("//id", XPathResultType::Node)
        .unwrap()
        .into_node()
        .unwrap();
    assert_eq!(node, XmlNode::element("id").set_text("15"));
}

#[test]
fn xpath_with_nodeset_finds_all_matches_in_document_order() {
    let doc = sample_document();
    let matches = doc
        .xpath("//id", XPathResultType::NodeSet)
        .unwrap()
        .into_nodes();
    let texts: Vec<String> = matches.iter().map(XmlNode::text).collect();
    assert_eq!(texts, vec!["15", "333"]);
}

#[test]
fn xpath_with_namespaces_matches_correctly() {
    let doc = sample_document();
    let mut ns = HashMap::new();
    ns.insert("s".to_string(), FOO_NS.to_string());

    assert_eq!(
        doc.xpath_ns(
            "/s:document/s:body/request/id/text()",
            XPathResultType::String,
            &ns,
        )
        .unwrap()
        .into_string()
        .unwrap(),
        "15"
    );

    // A valid context with no matches is still None, not an error.
    assert!(doc
        .xpath_ns("//non-existing", XPathResultType::Node, &ns)
        .unwrap()
        .into_node()
        .is_none());
}

#[test]
fn xpath_unresolved_prefix_is_an_error() {
    let doc = sample_document();
    let err = doc
        .xpath("//nope:id", XPathResultType::NodeSet)
        .unwrap_err();
    assert!(matches!(err, XPathError::UnresolvedPrefix(p) if p == "nope"));
}

#[test]
fn xpath_malformed_expression_is_an_error() {
    let doc = sample_document();
    assert!(doc.xpath("//[", XPathResultType::Node).is_err());
    assert!(doc.xpath("", XPathResultType::Node).is_err());
}

#[test]
fn xpath_scalar_results_pass_through() {
    let doc = sample_document();
    match doc.xpath("count(//id)", XPathResultType::Number).unwrap() {
        XPathResult::Number(n) => assert_eq!(n, 2.0),
        other => panic!("expected number, got {:?}", other),
    }
    match doc
        .xpath("count(//id) = 2", XPathResultType::Boolean)
        .unwrap()
    {
        XPathResult::Boolean(b) => assert!(b),
        other => panic!("expected boolean, got {:?}", other),
    }
}

#[test]
fn xpath_node_request_on_scalar_result_is_an_error() {
    let doc = sample_document();
    let err = doc
        .xpath("count(//id)", XPathResultType::NodeSet)
        .unwrap_err();
    assert!(matches!(err, XPathError::ResultType { .. }));
}

#[test]
fn namespaced_attribute_roundtrips_through_a_generated_prefix() {
    let doc = sample_document();
    let text = doc.to_text(true, false);
    assert!(text.contains("xmlns:ns0=\"some::namespace\""));
    assert!(text.contains("ns0:ver=\"v1\""));

    let copy = XmlNode::parse(&text).unwrap();
    let data = copy
        .find("body")
        .unwrap()
        .find("request")
        .unwrap()
        .find("data")
        .unwrap();
    assert_eq!(data.attribute("ns0:ver").unwrap(), "v1");

    // The (namespace, local name, value) triple survives regardless of
    // the prefix chosen.
    let document = data.document();
    let document = document.borrow();
    let attrs = &document.node(data.node_id()).attrs;
    assert_eq!(attrs.len(), 1);
    assert_eq!(document.strings.get(attrs[0].name_id), "ver");
    assert_eq!(document.strings.get(attrs[0].ns_id), "some::namespace");
    assert_eq!(document.strings.get(attrs[0].value_id), "v1");
}

#[test]
fn mutation_is_visible_through_aliases() {
    let doc = sample_document();
    let body = doc.find("body").unwrap();
    let _ = body.find("request").unwrap().set_attribute("seen", "yes");
    assert_eq!(
        doc.find("body")
            .unwrap()
            .find("request")
            .unwrap()
            .attribute("seen")
            .unwrap(),
        "yes"
    );
}

#[test]
fn append_imports_a_deep_copy() {
    let fragment = XmlNode::element("fragment").append([XmlNode::element("leaf").set_text("v")]);
    let host = XmlNode::element("host").append([fragment.clone()]);

    let _ = host
        .find("fragment")
        .unwrap()
        .find("leaf")
        .unwrap()
        .set_text("changed");
    assert_eq!(fragment.find("leaf").unwrap().text(), "v");
}

#[test]
fn from_reader_honors_the_charset_argument() {
    let text = "<r>héllo</r>";
    let mut utf16 = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        utf16.extend_from_slice(&unit.to_le_bytes());
    }

    let node = XmlNode::from_reader(utf16.as_slice(), Some("utf-16")).unwrap();
    assert_eq!(node.text(), "héllo");

    let err = XmlNode::from_reader(utf16.as_slice(), Some("shift-jis")).unwrap_err();
    assert!(matches!(err, ParseError::UnsupportedCharset(_)));
}

#[test]
fn doctype_and_malformed_input_are_parse_errors() {
    assert!(matches!(
        XmlNode::parse("<!DOCTYPE r [<!ENTITY x \"y\">]><r>&x;</r>"),
        Err(ParseError::DoctypeForbidden)
    ));
    assert!(XmlNode::parse("<r><unclosed></r>").is_err());
    assert!(XmlNode::parse("no xml here").is_err());
}

#[test]
fn text_concatenates_the_subtree() {
    let doc = sample_document();
    assert_eq!(doc.find("header").unwrap().text(), "pw01");
    assert_eq!(
        doc.find("body").unwrap().find("request").unwrap().find("data").unwrap().text(),
        "random string <b>with tags</b>"
    );
}

#[test]
fn owner_document_wraps_the_document_node() {
    let doc = sample_document();
    let owner = doc.owner_document();
    assert_eq!(owner.find_ns("document", FOO_NS).unwrap(), doc);
}
