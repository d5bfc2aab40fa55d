use crate::ast::*;
use crate::context::Context;
use crate::error::ParserError;
use crate::lexer::{Lexer, Line, LineType};
use log::Level;
use miette::NamedSource;

/// An open block on the nesting stack, together with the number of `#`
/// markers its heading was written with.
struct Frame {
    block: Block,
    markers: usize,
}

/// Builds a `Document` from MDSon source, one classified line at a time.
///
/// Nesting is tracked with an explicit stack of open blocks rather than native
/// recursion, so deeply nested input cannot exhaust the call stack.
pub struct Parser<'a> {
    source: NamedSource<String>,
    lexer: Lexer<'a>,
    lookahead: Option<Line>,
    ctx: Context,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Self {
        Self::new_with_name(source_text, "source.mdson".to_string())
    }

    pub fn new_with_name(source_text: &'a str, name: String) -> Self {
        Self {
            source: NamedSource::new(name, source_text.to_string()),
            lexer: Lexer::new(source_text),
            lookahead: None,
            ctx: Context::default(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, ctx: &Context) -> Self {
        self.ctx = ctx.clone();
        self
    }

    // === Main Parsing Methods ===

    /// Parses the whole source. On error the partially built tree is dropped.
    pub fn parse_document(&mut self) -> Result<Document, ParserError> {
        let mut document = Document::new();
        let mut stack = vec![Frame {
            block: Block::new(ROOT_NAME, 0, 0),
            markers: 0,
        }];

        while let Some(line) = self.advance() {
            let number = line.number;
            match line.ltype {
                LineType::Empty => current(&mut stack).children.push(Node::Empty(Leaf {
                    line: number,
                    text: String::new(),
                })),
                LineType::Text(text) => current(&mut stack)
                    .children
                    .push(Node::TextLine(Leaf { line: number, text })),
                LineType::Attribute { key, value } => {
                    current(&mut stack)
                        .attributes
                        .insert(key.clone(), value.clone());
                    document.attributes.insert(key, value);
                }
                LineType::ListHeader(name) => {
                    let level = current(&mut stack).level + 1;
                    let list = self.parse_list(name, level, number);
                    current(&mut stack).children.push(Node::List(list));
                }
                LineType::ListItem(_) => {
                    return Err(self.syntax_error(&line, "'-' outside a list"));
                }
                LineType::Heading { level, name } => {
                    self.open_block(&mut stack, level, name, number);
                }
                LineType::Comment(_) => {}
            }
        }

        while stack.len() > 1 {
            close_frame(&mut stack);
        }
        if let Some(root) = stack.pop() {
            document.root = root.block;
        }
        Ok(document)
    }

    /// Closes every open block that cannot contain a heading with `markers`
    /// `#`s, then opens the new block one level below whatever is left.
    /// A skipped marker count (`#` followed by `###`) attaches to the nearest
    /// open ancestor instead of leaving a hole in the levels.
    fn open_block(&self, stack: &mut Vec<Frame>, markers: usize, name: String, number: usize) {
        while stack.len() > 1 && stack.last().is_some_and(|frame| frame.markers >= markers) {
            close_frame(stack);
        }
        let parent = stack.last().map_or(0, |frame| frame.markers);
        let level = stack.last().map_or(0, |frame| frame.block.level) + 1;
        if markers > parent + 1 && self.ctx.enabled(Level::Debug) {
            log::debug!(
                "line {number}: heading '{name}' skips from {parent} to {markers} markers, nested at level {level}"
            );
        }
        stack.push(Frame {
            block: Block::new(name, level, number),
            markers,
        });
    }

    /// Collects the contiguous `-` items following a list header. The line that
    /// ends the list stays in the lookahead for the caller.
    fn parse_list(&mut self, name: String, level: usize, number: usize) -> List {
        let mut list = List::new(name, level, number);
        while matches!(
            self.peek(),
            Some(Line {
                ltype: LineType::ListItem(_),
                ..
            })
        ) {
            if let Some(Line {
                ltype: LineType::ListItem(text),
                number,
                ..
            }) = self.advance()
            {
                list.items.push(Leaf { line: number, text });
            }
        }
        list
    }

    // === Line Helper Methods ===

    /// Next non-comment line, without consuming it.
    fn peek(&mut self) -> Option<&Line> {
        if self.lookahead.is_none() {
            self.lookahead = self.read_line();
        }
        self.lookahead.as_ref()
    }

    fn advance(&mut self) -> Option<Line> {
        self.lookahead.take().or_else(|| self.read_line())
    }

    fn read_line(&mut self) -> Option<Line> {
        loop {
            let line = self.lexer.next_line()?;
            if self.ctx.enabled(Level::Trace) {
                log::trace!("line {} ({:?}): {:?}", line.number, line.ltype.kind(), line.ltype);
            }
            if !matches!(line.ltype, LineType::Comment(_)) {
                return Some(line);
            }
        }
    }

    fn syntax_error(&self, line: &Line, message: &str) -> ParserError {
        ParserError::Syntax {
            src: self.source.clone(),
            span: (line.pos_start, line.pos_end - line.pos_start).into(),
            line: line.number,
            message: message.to_string(),
        }
    }
}

fn current(stack: &mut [Frame]) -> &mut Block {
    // the root frame is never popped while lines are being read
    let last = stack.len() - 1;
    &mut stack[last].block
}

fn close_frame(stack: &mut Vec<Frame>) {
    if let Some(frame) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.block.children.push(Node::Block(frame.block));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    fn parse_ok(source: &str) -> Document {
        let mut parser = Parser::new_with_name(source, "test.mdson".to_string());
        match parser.parse_document() {
            Ok(doc) => doc,
            Err(err) => {
                let report = Report::from(err);
                panic!("{:?}", report);
            }
        }
    }

    fn block(node: &Node) -> &Block {
        match node {
            Node::Block(b) => b,
            other => panic!("expected a block, found {other:?}"),
        }
    }

    fn assert_levels(block: &Block) {
        for child in &block.children {
            if let Some(level) = child.level() {
                assert_eq!(level, block.level + 1, "bad level for '{}'", child.key());
            }
            if let Node::Block(inner) = child {
                assert_levels(inner);
            }
        }
    }

    #[test]
    fn test_empty_source() {
        let doc = parse_ok("");
        assert_eq!(doc.root.name, "root");
        assert_eq!(doc.root.level, 0);
        assert!(doc.root.children.is_empty());
    }

    #[test]
    fn test_heading_with_attribute_and_text() {
        let doc = parse_ok("# doc\n.title: Hello\n## section\nsome text\n");
        assert_eq!(doc.root.children.len(), 1);
        let doc_block = block(&doc.root.children[0]);
        assert_eq!(doc_block.name, "doc");
        assert_eq!(doc_block.level, 1);
        assert_eq!(doc_block.attribute("title"), Some("Hello"));
        assert_eq!(doc.attribute("title"), Some("Hello"));

        assert_eq!(doc_block.children.len(), 1);
        let section = block(&doc_block.children[0]);
        assert_eq!(section.name, "section");
        assert_eq!(section.level, 2);
        assert_eq!(
            section.children,
            vec![Node::TextLine(Leaf {
                line: 4,
                text: "some text".to_string()
            })]
        );
    }

    #[test]
    fn test_siblings_and_ancestors() {
        let doc = parse_ok("# a\n## b\n### c\n## d\n# e\n");
        assert_eq!(doc.root.children.len(), 2);
        let a = block(&doc.root.children[0]);
        let names: Vec<_> = a.children.iter().map(Node::key).collect();
        assert_eq!(names, vec!["b", "d"]);
        assert_eq!(block(&a.children[0]).find_block("c").unwrap().level, 3);
        assert_eq!(block(&doc.root.children[1]).name, "e");
        assert_levels(&doc.root);
    }

    #[test]
    fn test_nesting_gap_attaches_to_nearest_ancestor() {
        let doc = parse_ok("# top\n### deep\ntext\n## middle\n");
        let top = block(&doc.root.children[0]);
        let names: Vec<_> = top.children.iter().map(Node::key).collect();
        assert_eq!(names, vec!["deep", "middle"]);
        assert_eq!(block(&top.children[0]).level, 2);
        assert_levels(&doc.root);
    }

    #[test]
    fn test_list_and_following_line() {
        let doc = parse_ok(".Causes:\n- Hypertension\n// skipped\n- Atrial fibrillation\nafter\n");
        assert_eq!(doc.root.children.len(), 2);
        match &doc.root.children[0] {
            Node::List(list) => {
                assert_eq!(list.name, "causes");
                assert_eq!(list.level, 1);
                assert_eq!(
                    list.texts().collect::<Vec<_>>(),
                    vec!["Hypertension", "Atrial fibrillation"]
                );
            }
            other => panic!("expected a list, found {other:?}"),
        }
        assert_eq!(doc.root.children[1].key(), "after");
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let doc = parse_ok("first\n\nsecond\n");
        let kinds: Vec<_> = doc.root.children.iter().map(Node::kind).collect();
        assert_eq!(kinds, vec![NodeKind::TextLine, NodeKind::Empty, NodeKind::TextLine]);
    }

    #[test]
    fn test_comments_are_dropped() {
        let doc = parse_ok("// header comment\n# doc\n// another\n");
        assert_eq!(doc.root.children.len(), 1);
        assert!(block(&doc.root.children[0]).children.is_empty());
    }

    #[test]
    fn test_item_outside_list() {
        let mut parser = Parser::new("-item");
        let err = parser.parse_document().unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert_eq!(err.to_string(), "line 1: '-' outside a list");
    }

    #[test]
    fn test_item_after_blank_line_ends_list() {
        let mut parser = Parser::new(".tags:\n- a\n\n- b\n");
        let err = parser.parse_document().unwrap_err();
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let mut source = String::new();
        for depth in 1..=2_000 {
            source.push_str(&"#".repeat(depth));
            source.push_str(" level\n");
        }
        let doc = parse_ok(&source);
        assert_levels(&doc.root);
    }
}
