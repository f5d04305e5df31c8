//! XPath 1.0 core function library.
//!
//! Node-set, string, boolean and number functions. Arguments arrive
//! already evaluated; conversions that need document access (the
//! string-value of a node) go through the evaluation context.

use super::eval::{number_of, string_of, EvalContext};
use super::value::XPathValue;
use crate::error::XPathError;

/// Dispatch a function call by name.
pub fn call(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_>,
) -> Result<XPathValue, XPathError> {
    match name {
        // Node-set functions
        "count" => {
            let [arg] = take::<1>(name, args)?;
            match arg {
                XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
                XPathValue::StringList(list) => Ok(XPathValue::Number(list.len() as f64)),
                _ => Err(XPathError::Function(
                    "count() requires a node-set".to_string(),
                )),
            }
        }
        "position" => {
            take::<0>(name, args)?;
            Ok(XPathValue::Number(ctx.position as f64))
        }
        "last" => {
            take::<0>(name, args)?;
            Ok(XPathValue::Number(ctx.size as f64))
        }
        "name" => name_of(name, args, ctx, |ctx, id| ctx.doc.qualified_name(id)),
        "local-name" => name_of(name, args, ctx, |ctx, id| ctx.doc.local_name(id).to_string()),
        "namespace-uri" => name_of(name, args, ctx, |ctx, id| {
            ctx.doc.namespace_uri(id).unwrap_or("").to_string()
        }),

        // String functions
        "string" => match args.len() {
            0 => Ok(XPathValue::String(ctx.doc.string_value(ctx.node))),
            1 => Ok(XPathValue::String(string_of(ctx, &args[0]))),
            _ => Err(arity_error(name)),
        },
        "concat" => {
            if args.len() < 2 {
                return Err(arity_error(name));
            }
            let mut out = String::new();
            for arg in &args {
                out.push_str(&string_of(ctx, arg));
            }
            Ok(XPathValue::String(out))
        }
        "starts-with" => {
            let [a, b] = take::<2>(name, args)?;
            Ok(XPathValue::Boolean(
                string_of(ctx, &a).starts_with(&string_of(ctx, &b)),
            ))
        }
        "contains" => {
            let [a, b] = take::<2>(name, args)?;
            Ok(XPathValue::Boolean(
                string_of(ctx, &a).contains(&string_of(ctx, &b)),
            ))
        }
        "substring-before" => {
            let [a, b] = take::<2>(name, args)?;
            let s = string_of(ctx, &a);
            let pat = string_of(ctx, &b);
            let result = s.find(&pat).map(|pos| s[..pos].to_string());
            Ok(XPathValue::String(result.unwrap_or_default()))
        }
        "substring-after" => {
            let [a, b] = take::<2>(name, args)?;
            let s = string_of(ctx, &a);
            let pat = string_of(ctx, &b);
            let result = s.find(&pat).map(|pos| s[pos + pat.len()..].to_string());
            Ok(XPathValue::String(result.unwrap_or_default()))
        }
        "substring" => {
            if args.len() != 2 && args.len() != 3 {
                return Err(arity_error(name));
            }
            let s = string_of(ctx, &args[0]);
            let start = xpath_round(number_of(ctx, &args[1]));
            let end = if args.len() == 3 {
                start + xpath_round(number_of(ctx, &args[2]))
            } else {
                f64::INFINITY
            };
            // Positions are 1-based; NaN bounds select nothing.
            let result: String = s
                .chars()
                .enumerate()
                .filter(|(i, _)| {
                    let pos = (i + 1) as f64;
                    pos >= start && pos < end
                })
                .map(|(_, c)| c)
                .collect();
            Ok(XPathValue::String(result))
        }
        "string-length" => {
            let s = match args.len() {
                0 => ctx.doc.string_value(ctx.node),
                1 => string_of(ctx, &args[0]),
                _ => return Err(arity_error(name)),
            };
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            let s = match args.len() {
                0 => ctx.doc.string_value(ctx.node),
                1 => string_of(ctx, &args[0]),
                _ => return Err(arity_error(name)),
            };
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => {
            let [a, b, c] = take::<3>(name, args)?;
            let s = string_of(ctx, &a);
            let from: Vec<char> = string_of(ctx, &b).chars().collect();
            let to: Vec<char> = string_of(ctx, &c).chars().collect();
            let result: String = s
                .chars()
                .filter_map(|ch| match from.iter().position(|&f| f == ch) {
                    Some(i) => to.get(i).copied(),
                    None => Some(ch),
                })
                .collect();
            Ok(XPathValue::String(result))
        }

        // Boolean functions
        "boolean" => {
            let [arg] = take::<1>(name, args)?;
            Ok(XPathValue::Boolean(arg.to_boolean()))
        }
        "not" => {
            let [arg] = take::<1>(name, args)?;
            Ok(XPathValue::Boolean(!arg.to_boolean()))
        }
        "true" => {
            take::<0>(name, args)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            take::<0>(name, args)?;
            Ok(XPathValue::Boolean(false))
        }

        // Number functions
        "number" => match args.len() {
            0 => Ok(XPathValue::Number(
                ctx.doc
                    .string_value(ctx.node)
                    .trim()
                    .parse()
                    .unwrap_or(f64::NAN),
            )),
            1 => Ok(XPathValue::Number(number_of(ctx, &args[0]))),
            _ => Err(arity_error(name)),
        },
        "sum" => {
            let [arg] = take::<1>(name, args)?;
            match arg {
                XPathValue::NodeSet(nodes) => {
                    let total: f64 = nodes
                        .iter()
                        .map(|&n| {
                            ctx.doc
                                .string_value(n)
                                .trim()
                                .parse()
                                .unwrap_or(f64::NAN)
                        })
                        .sum();
                    Ok(XPathValue::Number(total))
                }
                _ => Err(XPathError::Function("sum() requires a node-set".to_string())),
            }
        }
        "floor" => {
            let [arg] = take::<1>(name, args)?;
            Ok(XPathValue::Number(number_of(ctx, &arg).floor()))
        }
        "ceiling" => {
            let [arg] = take::<1>(name, args)?;
            Ok(XPathValue::Number(number_of(ctx, &arg).ceil()))
        }
        "round" => {
            let [arg] = take::<1>(name, args)?;
            Ok(XPathValue::Number(xpath_round(number_of(ctx, &arg))))
        }

        other => Err(XPathError::Function(format!("unknown function: {}", other))),
    }
}

/// XPath `round()`: floor(x + 0.5), with NaN and infinities unchanged.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

fn arity_error(name: &str) -> XPathError {
    XPathError::Function(format!("wrong number of arguments to {}()", name))
}

fn take<const N: usize>(name: &str, args: Vec<XPathValue>) -> Result<[XPathValue; N], XPathError> {
    <[XPathValue; N]>::try_from(args).map_err(|_| arity_error(name))
}

fn name_of(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_>,
    get: impl Fn(&EvalContext<'_>, crate::dom::NodeId) -> String,
) -> Result<XPathValue, XPathError> {
    let node = match args.len() {
        0 => Some(ctx.node),
        1 => match &args[0] {
            XPathValue::NodeSet(nodes) => nodes.first().copied(),
            _ => {
                return Err(XPathError::Function(format!(
                    "{}() requires a node-set argument",
                    name
                )))
            }
        },
        _ => return Err(arity_error(name)),
    };
    Ok(XPathValue::String(
        node.map(|id| get(ctx, id)).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::parse::parse_document;
    use crate::xpath::parser::parse;

    fn eval(doc: &Document, expr: &str) -> XPathValue {
        let parsed = parse(expr).unwrap();
        let root = doc.root_element().unwrap();
        super::super::eval::evaluate(doc, root, &parsed, None).unwrap()
    }

    fn eval_string(doc: &Document, expr: &str) -> String {
        match eval(doc, expr) {
            XPathValue::String(s) => s,
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn string_functions() {
        let doc = parse_document("<r><a>hello</a></r>").unwrap();
        assert_eq!(eval_string(&doc, "concat('a', 'b', 'c')"), "abc");
        assert_eq!(eval_string(&doc, "substring('12345', 2, 3)"), "234");
        assert_eq!(eval_string(&doc, "substring('12345', 2)"), "2345");
        assert_eq!(eval_string(&doc, "substring-before('a=b', '=')"), "a");
        assert_eq!(eval_string(&doc, "substring-after('a=b', '=')"), "b");
        assert_eq!(eval_string(&doc, "normalize-space('  a   b ')"), "a b");
        assert_eq!(eval_string(&doc, "translate('abc', 'ab', 'AB')"), "ABc");
        assert_eq!(eval_string(&doc, "string(//a)"), "hello");
        assert!(eval(&doc, "starts-with('hello', 'he')").to_boolean());
        assert!(eval(&doc, "contains('hello', 'ell')").to_boolean());
    }

    #[test]
    fn number_functions() {
        let doc = parse_document("<r><n>1</n><n>2</n><n>3</n></r>").unwrap();
        assert!(matches!(eval(&doc, "count(//n)"), XPathValue::Number(n) if n == 3.0));
        assert!(matches!(eval(&doc, "sum(//n)"), XPathValue::Number(n) if n == 6.0));
        assert!(matches!(eval(&doc, "floor(1.7)"), XPathValue::Number(n) if n == 1.0));
        assert!(matches!(eval(&doc, "ceiling(1.2)"), XPathValue::Number(n) if n == 2.0));
        assert!(matches!(eval(&doc, "round(2.5)"), XPathValue::Number(n) if n == 3.0));
        assert!(matches!(eval(&doc, "round(-2.5)"), XPathValue::Number(n) if n == -2.0));
    }

    #[test]
    fn boolean_functions() {
        let doc = parse_document("<r><a/></r>").unwrap();
        assert!(eval(&doc, "boolean(//a)").to_boolean());
        assert!(!eval(&doc, "boolean(//b)").to_boolean());
        assert!(eval(&doc, "not(false())").to_boolean());
        assert!(eval(&doc, "true()").to_boolean());
    }

    #[test]
    fn name_functions() {
        let doc = parse_document(r#"<p:r xmlns:p="urn:p"><a/></p:r>"#).unwrap();
        assert_eq!(eval_string(&doc, "name()"), "p:r");
        assert_eq!(eval_string(&doc, "local-name()"), "r");
        assert_eq!(eval_string(&doc, "namespace-uri()"), "urn:p");
        assert_eq!(eval_string(&doc, "name(//a)"), "a");
        assert_eq!(eval_string(&doc, "namespace-uri(//a)"), "");
    }

    #[test]
    fn position_and_last() {
        let doc = parse_document("<r><i>a</i><i>b</i><i>c</i></r>").unwrap();
        let result = eval(&doc, "//i[position() = last()]");
        let nodes = result.as_nodeset().unwrap().clone();
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.string_value(nodes[0]), "c");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let doc = parse_document("<r/>").unwrap();
        let parsed = parse("bogus()").unwrap();
        let root = doc.root_element().unwrap();
        let err = super::super::eval::evaluate(&doc, root, &parsed, None).unwrap_err();
        assert!(matches!(err, XPathError::Function(_)));
    }

    #[test]
    fn wrong_arity_is_an_error() {
        let doc = parse_document("<r/>").unwrap();
        let parsed = parse("count()").unwrap();
        let root = doc.root_element().unwrap();
        assert!(super::super::eval::evaluate(&doc, root, &parsed, None).is_err());
    }
}
