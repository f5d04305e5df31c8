//! Namespace scope tracking.
//!
//! Stack-based prefix -> URI resolver used while building a document
//! from events and while deriving `xmlns` declarations during
//! serialization.

/// Well-known namespace URIs.
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// A prefix binding. The empty prefix is the default namespace.
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: String,
    uri: String,
    depth: u16,
}

/// Stack-based namespace scope tracker.
#[derive(Debug)]
pub struct NamespaceScopes {
    bindings: Vec<NsBinding>,
    depth: u16,
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScopes {
    /// Create a tracker with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        NamespaceScopes {
            bindings: vec![NsBinding {
                prefix: "xml".to_string(),
                uri: ns::XML.to_string(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope.
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, dropping any bindings declared in it.
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a binding for the current scope. The empty prefix
    /// declares the default namespace.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
    }

    /// Resolve a prefix to its URI, innermost binding first.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// Resolve the default namespace. An empty URI means the default
    /// namespace was undeclared with `xmlns=""`.
    pub fn resolve_default(&self) -> Option<&str> {
        self.resolve("").filter(|uri| !uri.is_empty())
    }

    /// True if `prefix` currently resolves to exactly `uri`.
    pub fn is_bound(&self, prefix: &str, uri: &str) -> bool {
        self.resolve(prefix) == Some(uri)
    }

    /// Find a non-empty prefix currently bound to `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| !b.prefix.is_empty() && b.uri == uri && self.is_bound(&b.prefix, uri))
            .map(|b| b.prefix.as_str())
    }

    /// True if `prefix` has any binding in scope.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.resolve(prefix).is_some()
    }
}
