//! Error types for parsing, XPath evaluation and serialization.
//!
//! Lookups (`find`, `find_all`, `attribute`) never produce errors for
//! "not found": absence is an expected outcome and is modelled with
//! `Option`/empty collections. The types here cover the exceptional
//! cases only.

use std::io;

use thiserror::Error;

/// Failure while turning an input stream into a document tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    /// DOCTYPE declarations are rejected, not ignored. Accepting them
    /// would open the door to entity-expansion and external-entity
    /// attacks.
    #[error("DOCTYPE declarations are not allowed")]
    DoctypeForbidden,

    /// A reference to an entity that is not one of the five predefined
    /// XML entities or a character reference.
    #[error("undeclared entity reference: {0}")]
    UndeclaredEntity(String),

    /// The document has no root element, more than one root element, or
    /// non-whitespace content outside the root element.
    #[error("invalid document structure: {0}")]
    Structure(String),

    /// The caller named a charset this crate cannot decode.
    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// The input bytes are not valid in the selected charset.
    #[error("input is not valid {charset}")]
    InvalidEncoding { charset: String },

    /// Reading the input stream failed.
    #[error("failed to read input")]
    Io(#[from] io::Error),
}

/// Failure while compiling or evaluating an XPath expression.
#[derive(Debug, Error)]
pub enum XPathError {
    /// The expression does not parse as XPath 1.0.
    #[error("invalid XPath expression: {0}")]
    Syntax(String),

    /// The expression uses a prefix the supplied namespace context does
    /// not bind. This is an error, not a silent empty result.
    #[error("unresolved namespace prefix: {0}")]
    UnresolvedPrefix(String),

    /// A function call with the wrong arity or an unknown name.
    #[error("invalid function call: {0}")]
    Function(String),

    /// The expression evaluated to a value that cannot be converted to
    /// the requested result type.
    #[error("result cannot be converted to {wanted}: {message}")]
    ResultType {
        wanted: &'static str,
        message: String,
    },
}

/// Failure while writing a serialized tree to an output stream.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The output stream rejected the write.
    #[error("failed to write output")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = ParseError::Malformed {
            position: 12,
            message: "unexpected end of input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed XML at byte 12: unexpected end of input"
        );
    }

    #[test]
    fn xpath_error_display() {
        let err = XPathError::UnresolvedPrefix("foo".to_string());
        assert_eq!(err.to_string(), "unresolved namespace prefix: foo");
    }
}
