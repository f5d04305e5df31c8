//! XPath evaluation.
//!
//! Walks the parsed AST against an arena document. Prefixes appearing
//! in the expression are resolved against the per-call namespace
//! context; an unresolvable prefix aborts evaluation with an error
//! rather than producing a silent empty result.

use std::collections::{HashMap, HashSet};

use super::functions;
use super::parser::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::value::{format_number, XPathValue};
use crate::dom::namespace::ns;
use crate::dom::{AttrData, Document, NodeId, NodeKind, DOCUMENT_NODE};
use crate::error::XPathError;

/// Evaluation context: the document, the context node and its
/// position/size within the node list being filtered.
pub struct EvalContext<'a> {
    pub doc: &'a Document,
    pub namespaces: Option<&'a HashMap<String, String>>,
    pub node: NodeId,
    pub position: usize,
    pub size: usize,
}

impl<'a> EvalContext<'a> {
    fn with_node(&self, node: NodeId, position: usize, size: usize) -> EvalContext<'a> {
        EvalContext {
            doc: self.doc,
            namespaces: self.namespaces,
            node,
            position,
            size,
        }
    }

    /// Resolve a prefix used inside the expression. `xml` is always
    /// bound; everything else must come from the supplied context.
    fn resolve_prefix(&self, prefix: &str) -> Result<&'a str, XPathError> {
        if prefix == "xml" {
            return Ok(ns::XML);
        }
        self.namespaces
            .and_then(|map| map.get(prefix))
            .map(String::as_str)
            .ok_or_else(|| XPathError::UnresolvedPrefix(prefix.to_string()))
    }
}

/// Evaluate a parsed expression with `node` as the context node.
pub fn evaluate(
    doc: &Document,
    node: NodeId,
    expr: &Expr,
    namespaces: Option<&HashMap<String, String>>,
) -> Result<XPathValue, XPathError> {
    let ctx = EvalContext {
        doc,
        namespaces,
        node,
        position: 1,
        size: 1,
    };
    eval_expr(&ctx, expr)
}

pub(crate) fn eval_expr(ctx: &EvalContext<'_>, expr: &Expr) -> Result<XPathValue, XPathError> {
    match expr {
        Expr::Root => Ok(XPathValue::NodeSet(vec![DOCUMENT_NODE])),
        Expr::Context => Ok(XPathValue::NodeSet(vec![ctx.node])),
        Expr::Number(n) => Ok(XPathValue::Number(*n)),
        Expr::String(s) => Ok(XPathValue::String(s.clone())),
        Expr::Negate(inner) => {
            let value = eval_expr(ctx, inner)?;
            Ok(XPathValue::Number(-number_of(ctx, &value)))
        }
        Expr::Union(left, right) => {
            let left = eval_expr(ctx, left)?;
            let right = eval_expr(ctx, right)?;
            match (left, right) {
                (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
                    let mut seen: HashSet<NodeId> = l.iter().copied().collect();
                    let mut merged = l;
                    for node in r {
                        if seen.insert(node) {
                            merged.push(node);
                        }
                    }
                    merged.sort_unstable();
                    Ok(XPathValue::NodeSet(merged))
                }
                _ => Err(XPathError::ResultType {
                    wanted: "node-set",
                    message: "union requires node-sets on both sides".to_string(),
                }),
            }
        }
        Expr::Path(base, step) => {
            let base = eval_expr(ctx, base)?;
            match base {
                XPathValue::NodeSet(nodes) => eval_step(ctx, &nodes, step),
                _ => Ok(XPathValue::empty_nodeset()),
            }
        }
        Expr::Step(step) => eval_step(ctx, &[ctx.node], step),
        Expr::Filter(base, pred) => {
            let base = eval_expr(ctx, base)?;
            match base {
                XPathValue::NodeSet(nodes) => {
                    Ok(XPathValue::NodeSet(apply_predicate(ctx, nodes, pred)?))
                }
                _ => Ok(XPathValue::empty_nodeset()),
            }
        }
        Expr::Binary(left, op, right) => {
            let left = eval_expr(ctx, left)?;
            let right = eval_expr(ctx, right)?;
            eval_binary(ctx, &left, *op, &right)
        }
        Expr::Function(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(ctx, arg)?);
            }
            functions::call(name, values, ctx)
        }
    }
}

fn eval_step(
    ctx: &EvalContext<'_>,
    context_nodes: &[NodeId],
    step: &Step,
) -> Result<XPathValue, XPathError> {
    if step.axis == Axis::Attribute {
        let mut values = Vec::new();
        for &node in context_nodes {
            let data = ctx.doc.node(node);
            if !data.is_element() {
                continue;
            }
            for attr in &data.attrs {
                if attr_matches(ctx, attr, &step.node_test)? {
                    values.push(ctx.doc.strings.get(attr.value_id).to_string());
                }
            }
        }
        // Attribute values are not nodes; positional predicates do not
        // apply to them.
        if !step.predicates.is_empty() {
            return Ok(XPathValue::empty_nodeset());
        }
        return Ok(match values.len() {
            0 => XPathValue::empty_nodeset(),
            1 => XPathValue::String(values.pop().unwrap_or_default()),
            _ => XPathValue::StringList(values),
        });
    }

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for &node in context_nodes {
        let mut matched = Vec::new();
        for candidate in navigate(ctx.doc, node, step.axis) {
            if matches_node_test(ctx, candidate, &step.node_test)? {
                matched.push(candidate);
            }
        }
        // Predicates filter per context node, with positions counted
        // along the axis.
        for pred in &step.predicates {
            matched = apply_predicate(ctx, matched, pred)?;
        }
        for m in matched {
            if seen.insert(m) {
                result.push(m);
            }
        }
    }
    // Node ids ascend in document order.
    result.sort_unstable();
    Ok(XPathValue::NodeSet(result))
}

fn apply_predicate(
    ctx: &EvalContext<'_>,
    nodes: Vec<NodeId>,
    pred: &Expr,
) -> Result<Vec<NodeId>, XPathError> {
    let size = nodes.len();
    let mut kept = Vec::new();
    for (i, &node) in nodes.iter().enumerate() {
        let sub = ctx.with_node(node, i + 1, size);
        let value = eval_expr(&sub, pred)?;
        let include = match value {
            XPathValue::Number(n) => (i + 1) as f64 == n,
            other => other.to_boolean(),
        };
        if include {
            kept.push(node);
        }
    }
    Ok(kept)
}

/// Collect the nodes reachable from `context` along `axis`, in axis
/// order (proximity order for the reverse axes).
fn navigate(doc: &Document, context: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children(context).collect(),
        Axis::Descendant => doc.descendants(context).collect(),
        Axis::DescendantOrSelf => {
            let mut result = vec![context];
            result.extend(doc.descendants(context));
            result
        }
        Axis::Parent => doc.node(context).parent.into_iter().collect(),
        Axis::Ancestor => {
            let mut result = Vec::new();
            let mut current = context;
            while let Some(parent) = doc.node(current).parent {
                result.push(parent);
                current = parent;
            }
            result
        }
        Axis::AncestorOrSelf => {
            let mut result = vec![context];
            result.extend(navigate(doc, context, Axis::Ancestor));
            result
        }
        Axis::FollowingSibling => {
            let mut result = Vec::new();
            let mut sibling = doc.node(context).next_sibling;
            while let Some(id) = sibling {
                result.push(id);
                sibling = doc.node(id).next_sibling;
            }
            result
        }
        Axis::PrecedingSibling => {
            let mut result = Vec::new();
            let mut sibling = doc.node(context).prev_sibling;
            while let Some(id) = sibling {
                result.push(id);
                sibling = doc.node(id).prev_sibling;
            }
            result
        }
        Axis::Following => {
            // Everything after the context subtree in document order.
            let mut result = Vec::new();
            let mut current = context;
            loop {
                let mut sibling = doc.node(current).next_sibling;
                while let Some(id) = sibling {
                    result.push(id);
                    result.extend(doc.descendants(id));
                    sibling = doc.node(id).next_sibling;
                }
                match doc.node(current).parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            result
        }
        Axis::Preceding => {
            // Everything before the context in document order,
            // excluding ancestors; nearest first.
            let mut result = Vec::new();
            let mut current = context;
            loop {
                let mut sibling = doc.node(current).prev_sibling;
                while let Some(id) = sibling {
                    let mut subtree: Vec<NodeId> = vec![id];
                    subtree.extend(doc.descendants(id));
                    subtree.reverse();
                    result.extend(subtree);
                    sibling = doc.node(id).prev_sibling;
                }
                match doc.node(current).parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            result
        }
        Axis::Self_ => vec![context],
        Axis::Attribute => Vec::new(),
    }
}

fn matches_node_test(
    ctx: &EvalContext<'_>,
    id: NodeId,
    test: &NodeTest,
) -> Result<bool, XPathError> {
    let node = ctx.doc.node(id);
    Ok(match test {
        NodeTest::Any => node.is_element(),
        NodeTest::Name(name) => {
            node.is_element() && node.ns_id == 0 && ctx.doc.local_name(id) == name
        }
        NodeTest::QName(prefix, local) => {
            let uri = ctx.resolve_prefix(prefix)?;
            node.is_element()
                && ctx.doc.namespace_uri(id) == Some(uri)
                && ctx.doc.local_name(id) == local
        }
        NodeTest::NamespaceWildcard(prefix) => {
            let uri = ctx.resolve_prefix(prefix)?;
            node.is_element() && ctx.doc.namespace_uri(id) == Some(uri)
        }
        NodeTest::Node => true,
        NodeTest::Text => node.is_textual(),
        NodeTest::Comment => node.kind == NodeKind::Comment,
        NodeTest::ProcessingInstruction(target) => {
            node.kind == NodeKind::ProcessingInstruction
                && target
                    .as_ref()
                    .map_or(true, |t| ctx.doc.local_name(id) == t)
        }
    })
}

fn attr_matches(
    ctx: &EvalContext<'_>,
    attr: &AttrData,
    test: &NodeTest,
) -> Result<bool, XPathError> {
    Ok(match test {
        NodeTest::Any => true,
        NodeTest::Name(name) => {
            attr.ns_id == 0 && ctx.doc.strings.get(attr.name_id) == name.as_str()
        }
        NodeTest::QName(prefix, local) => {
            let uri = ctx.resolve_prefix(prefix)?;
            ctx.doc.strings.get(attr.ns_id) == uri
                && attr.ns_id != 0
                && ctx.doc.strings.get(attr.name_id) == local.as_str()
        }
        NodeTest::NamespaceWildcard(prefix) => {
            let uri = ctx.resolve_prefix(prefix)?;
            attr.ns_id != 0 && ctx.doc.strings.get(attr.ns_id) == uri
        }
        _ => false,
    })
}

// ----------------------------------------------------------------------
// Value conversions needing document access
// ----------------------------------------------------------------------

/// XPath `string()` conversion against a document, for callers outside
/// an evaluation (result shaping in the node facade).
pub fn value_string(doc: &Document, value: &XPathValue) -> String {
    let ctx = EvalContext {
        doc,
        namespaces: None,
        node: DOCUMENT_NODE,
        position: 1,
        size: 1,
    };
    string_of(&ctx, value)
}

/// XPath `number()` conversion against a document.
pub fn value_number(doc: &Document, value: &XPathValue) -> f64 {
    let ctx = EvalContext {
        doc,
        namespaces: None,
        node: DOCUMENT_NODE,
        position: 1,
        size: 1,
    };
    number_of(&ctx, value)
}

/// XPath `string()` of a value; node-sets convert through the
/// string-value of their first node.
pub(crate) fn string_of(ctx: &EvalContext<'_>, value: &XPathValue) -> String {
    match value {
        XPathValue::NodeSet(nodes) => nodes
            .first()
            .map(|&n| ctx.doc.string_value(n))
            .unwrap_or_default(),
        XPathValue::StringList(list) => list.first().cloned().unwrap_or_default(),
        XPathValue::Boolean(b) => b.to_string(),
        XPathValue::Number(n) => format_number(*n),
        XPathValue::String(s) => s.clone(),
    }
}

/// XPath `number()` of a value.
pub(crate) fn number_of(ctx: &EvalContext<'_>, value: &XPathValue) -> f64 {
    match value {
        XPathValue::Number(n) => *n,
        XPathValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => string_of(ctx, other).trim().parse().unwrap_or(f64::NAN),
    }
}

/// The string-values a set-like value contributes to comparisons, or
/// None for scalars.
fn comparison_set(ctx: &EvalContext<'_>, value: &XPathValue) -> Option<Vec<String>> {
    match value {
        XPathValue::NodeSet(nodes) => {
            Some(nodes.iter().map(|&n| ctx.doc.string_value(n)).collect())
        }
        XPathValue::StringList(list) => Some(list.clone()),
        _ => None,
    }
}

fn eval_binary(
    ctx: &EvalContext<'_>,
    left: &XPathValue,
    op: BinaryOp,
    right: &XPathValue,
) -> Result<XPathValue, XPathError> {
    let value = match op {
        BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
        BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
        BinaryOp::Eq => XPathValue::Boolean(compare_eq(ctx, left, right, false)),
        BinaryOp::NotEq => XPathValue::Boolean(compare_eq(ctx, left, right, true)),
        BinaryOp::Lt => compare_relational(ctx, left, right, |a, b| a < b),
        BinaryOp::LtEq => compare_relational(ctx, left, right, |a, b| a <= b),
        BinaryOp::Gt => compare_relational(ctx, left, right, |a, b| a > b),
        BinaryOp::GtEq => compare_relational(ctx, left, right, |a, b| a >= b),
        BinaryOp::Add => XPathValue::Number(number_of(ctx, left) + number_of(ctx, right)),
        BinaryOp::Sub => XPathValue::Number(number_of(ctx, left) - number_of(ctx, right)),
        BinaryOp::Mul => XPathValue::Number(number_of(ctx, left) * number_of(ctx, right)),
        BinaryOp::Div => XPathValue::Number(number_of(ctx, left) / number_of(ctx, right)),
        BinaryOp::Mod => XPathValue::Number(number_of(ctx, left) % number_of(ctx, right)),
    };
    Ok(value)
}

/// Equality per XPath 1.0: a set compares true when any member
/// matches; booleans dominate, then numbers, then strings.
fn compare_eq(
    ctx: &EvalContext<'_>,
    left: &XPathValue,
    right: &XPathValue,
    negate: bool,
) -> bool {
    if matches!(left, XPathValue::Boolean(_)) || matches!(right, XPathValue::Boolean(_)) {
        let result = left.to_boolean() == right.to_boolean();
        return if negate { !result } else { result };
    }

    let scalar_eq = |s: &str, other: &XPathValue| -> bool {
        match other {
            XPathValue::Number(n) => s.trim().parse::<f64>().map_or(false, |v| v == *n),
            _ => s == string_of(ctx, other),
        }
    };

    match (comparison_set(ctx, left), comparison_set(ctx, right)) {
        (Some(l), Some(r)) => l
            .iter()
            .any(|ls| r.iter().any(|rs| (ls == rs) != negate)),
        (Some(set), None) => set.iter().any(|s| scalar_eq(s, right) != negate),
        (None, Some(set)) => set.iter().any(|s| scalar_eq(s, left) != negate),
        (None, None) => {
            let result = if matches!(left, XPathValue::Number(_))
                || matches!(right, XPathValue::Number(_))
            {
                number_of(ctx, left) == number_of(ctx, right)
            } else {
                string_of(ctx, left) == string_of(ctx, right)
            };
            if negate {
                !result
            } else {
                result
            }
        }
    }
}

/// Relational comparison; a set compares true when any member does.
fn compare_relational<F>(
    ctx: &EvalContext<'_>,
    left: &XPathValue,
    right: &XPathValue,
    cmp: F,
) -> XPathValue
where
    F: Fn(f64, f64) -> bool,
{
    let numbers = |value: &XPathValue| -> Vec<f64> {
        match comparison_set(ctx, value) {
            Some(set) => set
                .iter()
                .map(|s| s.trim().parse().unwrap_or(f64::NAN))
                .collect(),
            None => vec![number_of(ctx, value)],
        }
    };
    let left = numbers(left);
    let right = numbers(right);
    let result = left
        .iter()
        .any(|&l| right.iter().any(|&r| cmp(l, r)));
    XPathValue::Boolean(result)
}
