// Parser error path tests
// These systematically test unhappy paths and the lines they are reported on

use mdson::{parse, Node, NodeKind, ParserError};

fn error_line(source: &str) -> usize {
    match parse(source) {
        Err(err) => err.line().expect("syntax errors carry a line"),
        Ok(doc) => panic!("Should fail to parse, got {doc:?}"),
    }
}

#[test]
fn test_item_without_list_header() {
    // Scenario: a bare item on the first line
    assert_eq!(error_line("-item"), 1);
}

#[test]
fn test_item_after_text() {
    assert_eq!(error_line("# doc\nsome text\n- stray\n"), 3);
}

#[test]
fn test_item_after_attribute() {
    assert_eq!(error_line(".title: Hello\n- not a list\n"), 2);
}

#[test]
fn test_item_after_heading() {
    assert_eq!(error_line("# doc\n- stray item\n"), 2);
}

#[test]
fn test_indented_dash_is_text() {
    let doc = parse("# doc\nSome prose\n  - not a list item\n").unwrap();
    let block = doc.root.find_block("doc").unwrap();
    let kinds: Vec<_> = block.children.iter().map(Node::kind).collect();
    assert_eq!(kinds, vec![NodeKind::TextLine, NodeKind::TextLine]);
    assert_eq!(block.children[1].key(), "  - not a list item");
}

#[test]
fn test_error_message_and_span() {
    let source = "# doc\n- stray\n";
    let err = parse(source).unwrap_err();
    assert_eq!(err.to_string(), "line 2: '-' outside a list");
    match err {
        ParserError::Syntax { span, .. } => {
            assert_eq!(span.offset(), 6);
            assert_eq!(span.len(), "- stray".len());
        }
        other => panic!("Expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_marker_only_heading_is_text() {
    let doc = parse("# doc\n###\n").unwrap();
    let block = doc.root.find_block("doc").unwrap();
    assert_eq!(block.children[0].key(), "###");
}

#[test]
fn test_dotted_line_without_colon_is_text() {
    let doc = parse(".just a sentence\n").unwrap();
    assert_eq!(doc.root.children[0].key(), ".just a sentence");
    assert!(doc.attributes().is_empty());
}
