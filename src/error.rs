use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum MdsonError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transform(#[from] TransformError),
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParserError {
    #[error("line {line}: {message}")]
    #[diagnostic(
        code(parser::syntax_error),
        help("Headings start with '#', attributes with '.name:', list items need a list header.")
    )]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
        line: usize,
        message: String,
    },

    #[error("failed to read '{name}'")]
    #[diagnostic(code(parser::read_error))]
    Read {
        name: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl ParserError {
    /// The 1-based line a syntax error was reported on.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParserError::Syntax { line, .. } => Some(*line),
            ParserError::Read { .. } => None,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum DecodeError {
    #[error("root value is not a record")]
    #[diagnostic(
        code(decode::not_a_record),
        help("Only structs and string-keyed maps can be decoded from a block.")
    )]
    NotARecord,

    #[error("array block '{block}' has no corresponding sequence field")]
    #[diagnostic(code(decode::array_shape))]
    ArrayShape { block: String },

    #[error("block '{block}' has no corresponding record field")]
    #[diagnostic(code(decode::block_shape))]
    BlockShape { block: String },

    #[error("list '{list}' has no corresponding sequence field")]
    #[diagnostic(code(decode::list_shape))]
    ListShape { list: String },

    #[error("cannot parse '{value}' as {expected}")]
    #[diagnostic(code(decode::invalid_value))]
    InvalidValue { value: String, expected: String },

    #[error("{0}")]
    #[diagnostic(code(decode::custom))]
    Custom(String),

    #[error("in '{context}': {source}")]
    #[diagnostic(code(decode::context))]
    Context {
        context: String,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Wraps the error with the name of the block or field being decoded.
    /// Nested contexts are merged into one dotted path.
    pub fn within(self, context: &str) -> Self {
        match self {
            DecodeError::Context {
                context: inner,
                source,
            } => DecodeError::Context {
                context: format!("{context}.{inner}"),
                source,
            },
            other => DecodeError::Context {
                context: context.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with all path context removed.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl serde::de::Error for DecodeError {
    fn custom<T: Display>(msg: T) -> Self {
        DecodeError::Custom(msg.to_string())
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EncodeError {
    #[error("root value is not a record")]
    #[diagnostic(
        code(encode::not_a_record),
        help("Only structs and string-keyed maps can be encoded as a document.")
    )]
    NotARecord,

    #[error("field '{field}' has an unsupported kind: {kind}")]
    #[diagnostic(code(encode::unsupported))]
    Unsupported { field: String, kind: String },

    #[error("value of '{field}' spans several lines")]
    #[diagnostic(
        code(encode::multiline_value),
        help("Attribute values are single-line; split the text into a list instead.")
    )]
    MultilineValue { field: String },

    #[error("invalid block level {0}: levels start at 1 and are fixed once encoding starts")]
    #[diagnostic(code(encode::block_level))]
    BlockLevel(usize),

    #[error("{0}")]
    #[diagnostic(code(encode::custom))]
    Custom(String),

    #[error("failed to write '{path}': {message}")]
    #[diagnostic(code(encode::io))]
    Io { path: String, message: String },
}

impl EncodeError {
    /// Names the field an unsupported value was found in, unless an inner
    /// field already claimed it.
    pub(crate) fn in_field(self, name: &str) -> Self {
        match self {
            EncodeError::Unsupported { field, kind } if field.is_empty() => {
                EncodeError::Unsupported {
                    field: name.to_string(),
                    kind,
                }
            }
            other => other,
        }
    }
}

impl serde::ser::Error for EncodeError {
    fn custom<T: Display>(msg: T) -> Self {
        EncodeError::Custom(msg.to_string())
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Io {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("failed to write transformed output")]
#[diagnostic(code(transform::io))]
pub struct TransformError {
    #[source]
    pub source: Arc<std::io::Error>,
}

impl From<std::io::Error> for TransformError {
    fn from(err: std::io::Error) -> Self {
        TransformError {
            source: Arc::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_merges_paths() {
        let err = DecodeError::InvalidValue {
            value: "abc".to_string(),
            expected: "an integer".to_string(),
        }
        .within("age")
        .within("person");

        assert_eq!(
            err.to_string(),
            "in 'person.age': cannot parse 'abc' as an integer"
        );
        assert!(matches!(err.root_cause(), DecodeError::InvalidValue { .. }));
    }
}
