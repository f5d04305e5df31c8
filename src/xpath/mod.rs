//! XPath 1.0 engine.
//!
//! - lexer -> recursive descent parser -> AST evaluation
//! - per-call namespace context (prefix -> URI)
//! - compiled expressions cached per worker thread
//!
//! Compiling an expression is the expensive part of evaluation, so
//! compiled ASTs are kept in a lazily-initialized, per-thread LRU
//! cache: one cache per worker, initialized on first use and never
//! shared across threads mid-call.

pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;

use crate::dom::{Document, NodeId};
use crate::error::XPathError;

pub use value::XPathValue;

/// Compiled expressions kept per thread.
const CACHE_CAPACITY: usize = 128;

/// A compiled XPath expression.
#[derive(Debug)]
pub struct CompiledXPath {
    expr: parser::Expr,
}

impl CompiledXPath {
    /// Evaluate with `node` as the context node.
    pub fn evaluate(
        &self,
        doc: &Document,
        node: NodeId,
        namespaces: Option<&HashMap<String, String>>,
    ) -> Result<XPathValue, XPathError> {
        eval::evaluate(doc, node, &self.expr, namespaces)
    }
}

/// Compile an expression without touching the cache.
pub fn compile(expression: &str) -> Result<CompiledXPath, XPathError> {
    Ok(CompiledXPath {
        expr: parser::parse(expression)?,
    })
}

thread_local! {
    static COMPILED: RefCell<LruCache<String, Rc<CompiledXPath>>> = RefCell::new(LruCache::new(
        NonZeroUsize::new(CACHE_CAPACITY).expect("cache capacity is non-zero"),
    ));
}

/// Compile an expression, reusing this thread's cache. Repeated
/// evaluations of the same expression skip lexing and parsing.
pub fn compile_cached(expression: &str) -> Result<Rc<CompiledXPath>, XPathError> {
    COMPILED.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(hit) = cache.get(expression) {
            return Ok(Rc::clone(hit));
        }
        let compiled = Rc::new(compile(expression)?);
        cache.put(expression.to_string(), Rc::clone(&compiled));
        Ok(compiled)
    })
}
