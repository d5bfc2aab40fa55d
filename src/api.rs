use crate::ast::Document;
use crate::context::Context;
use crate::de::from_document_with;
use crate::error::{MdsonError, ParserError};
use crate::parser::Parser;
use crate::ser::to_string_with;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Parses MDSon source into a document tree.
///
/// Attribute references are left as written; see [`analyze`] for a parse
/// followed by evaluation.
///
/// # Errors
/// Returns a `ParserError` on the first structurally invalid line.
pub fn parse(source: &str) -> Result<Document, ParserError> {
    parse_with(source, "source.mdson", &Context::default())
}

/// Parses with an explicit file name (used in diagnostics) and context.
///
/// # Errors
/// Returns a `ParserError` on the first structurally invalid line.
pub fn parse_with(source: &str, file_name: &str, ctx: &Context) -> Result<Document, ParserError> {
    Parser::new_with_name(source, file_name.to_string())
        .with_context(ctx)
        .parse_document()
}

/// Reads a whole stream and parses it.
///
/// # Errors
/// Returns `ParserError::Read` if the stream cannot be read as UTF-8 text.
pub fn parse_reader(mut reader: impl Read, name: &str, ctx: &Context) -> Result<Document, ParserError> {
    let mut source = String::new();
    reader
        .read_to_string(&mut source)
        .map_err(|err| ParserError::Read {
            name: name.to_string(),
            source: Arc::new(err),
        })?;
    parse_with(&source, name, ctx)
}

/// # Errors
/// Returns `ParserError::Read` if the file cannot be opened or read.
pub fn parse_file(path: impl AsRef<Path>, ctx: &Context) -> Result<Document, ParserError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|err| ParserError::Read {
        name: name.clone(),
        source: Arc::new(err),
    })?;
    parse_reader(std::io::BufReader::new(file), &name, ctx)
}

/// Parses a source and resolves its `{name}` attribute references.
///
/// This is the usual entry point for reading a document that is going to be
/// displayed or decoded.
///
/// # Errors
/// Returns a `MdsonError` if parsing fails. Evaluation itself never fails.
pub fn analyze(source: &str, file_name: &str, ctx: &Context) -> Result<Document, MdsonError> {
    let mut document = parse_with(source, file_name, ctx)?;
    document.evaluate(ctx);
    Ok(document)
}

/// Maps a document onto `T`.
///
/// # Errors
/// Returns a `MdsonError::Decode` when the document's shape does not fit `T`
/// or a value cannot be parsed as its field's type.
pub fn decode<T>(document: &Document) -> Result<T, MdsonError>
where
    T: DeserializeOwned,
{
    Ok(from_document_with(document, &Context::default())?)
}

/// # Errors
/// See [`decode`].
pub fn decode_with<T>(document: &Document, ctx: &Context) -> Result<T, MdsonError>
where
    T: DeserializeOwned,
{
    Ok(from_document_with(document, ctx)?)
}

/// Writes a record as MDSon text.
///
/// # Errors
/// Returns a `MdsonError::Encode` for a non-record value or a field of an
/// unsupported kind.
pub fn encode<T>(value: &T) -> Result<String, MdsonError>
where
    T: Serialize + ?Sized,
{
    Ok(to_string_with(value, &Context::default())?)
}

/// # Errors
/// See [`encode`]. A context with `block_level == 0` is rejected.
pub fn encode_with<T>(value: &T, ctx: &Context) -> Result<String, MdsonError>
where
    T: Serialize + ?Sized,
{
    Ok(to_string_with(value, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use serde::Deserialize;

    #[test]
    fn test_parse_to_json() {
        let doc = parse("# config\n.name: My App\n.Features:\n- a\n- b\n").unwrap();
        let result: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        let config = &result["root"]["children"][0];
        assert_eq!(config["kind"], "block");
        assert_eq!(config["name"], "config");
        assert_eq!(config["attributes"]["name"], "My App");
        assert_eq!(config["children"][0]["kind"], "list");
        assert_eq!(
            config["children"][0]["items"],
            serde_json::json!([{ "line": 4, "text": "a" }, { "line": 5, "text": "b" }])
        );
        assert_eq!(result["attributes"], serde_json::json!({ "name": "My App" }));
    }

    #[test]
    fn test_analyze_resolves_references() {
        let doc = analyze(
            ".date: 12July2023\n# doc\nWritten on {date}\n",
            "notes.mdson",
            &Context::default(),
        )
        .unwrap();
        assert_eq!(doc.root.find_block("doc").unwrap().children[0].key(), "Written on 12July2023");
    }

    #[test]
    fn test_parse_reader_and_file() {
        let doc = parse_reader("# a\n.x: 1\n".as_bytes(), "memory", &Context::default()).unwrap();
        assert_eq!(doc.attribute("x"), Some("1"));

        let err = parse_file("/definitely/not/here.mdson", &Context::default()).unwrap_err();
        assert!(matches!(err, ParserError::Read { .. }));
        assert_eq!(err.to_string(), "failed to read '/definitely/not/here.mdson'");
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Entry {
        title: String,
        count: i64,
    }

    #[test]
    fn test_decode_and_encode() {
        let doc = parse("# entry\n.title: Hello\n.count: 3\n").unwrap();
        let entry: Entry = decode(&doc).unwrap();
        assert_eq!(
            entry,
            Entry {
                title: "Hello".to_string(),
                count: 3
            }
        );
        assert_eq!(encode(&entry).unwrap(), "# Entry\n.title :Hello\n.count :3\n");

        let bad = parse("# entry\n.title: x\n.count: three\n").unwrap();
        match decode::<Entry>(&bad) {
            Err(MdsonError::Decode(err)) => assert!(matches!(
                err.root_cause(),
                DecodeError::InvalidValue { .. }
            )),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_with_zero_block_level_fails() {
        let ctx = Context::default().with_block_level(0);
        let entry = Entry {
            title: String::new(),
            count: 0,
        };
        assert!(matches!(
            encode_with(&entry, &ctx),
            Err(MdsonError::Encode(crate::error::EncodeError::BlockLevel(0)))
        ));
    }
}
