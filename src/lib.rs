pub mod api;
pub mod ast;
pub mod context;
pub mod de;
pub mod error;
pub mod evaluator;
pub mod id;
pub mod lexer;
pub mod parser;
pub mod ser;
mod serialization;
pub mod transform;
pub mod utils;

pub use api::{analyze, decode, decode_with, encode, encode_with, parse, parse_file, parse_reader, parse_with};
pub use ast::{Block, Document, List, Node, NodeKind};
pub use context::{Context, DebugLevel};
pub use de::{from_document, from_str};
pub use error::{DecodeError, EncodeError, MdsonError, ParserError, TransformError};
pub use evaluator::substitute;
pub use id::Id;
pub use ser::{encode_to_file, to_string, Encoder};
pub use transform::{transform, transform_to_string, Dialect, Transform, Transformer, TransformerConfig};
