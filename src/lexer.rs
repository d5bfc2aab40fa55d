use crate::ast::NodeKind;
use crate::utils::{fold_key, is_array_name};

/// What a single physical line means. Each line classifies on its own, from
/// its first characters and the position of its first `:`.
#[derive(Debug, PartialEq, Clone)]
pub enum LineType {
    /// A blank or whitespace-only line.
    Empty,
    /// A line starting with `//`. The associated `String` holds the comment text.
    Comment(String),
    /// `- item`. Holds the item text without the marker.
    ListItem(String),
    /// `## name`. `level` is the number of leading `#`.
    Heading { level: usize, name: String },
    /// `.key: value` with a non-blank value.
    Attribute { key: String, value: String },
    /// `.key:` with a blank value, or `something list:`.
    ListHeader(String),
    /// Anything else, kept verbatim.
    Text(String),
}

impl LineType {
    pub fn kind(&self) -> NodeKind {
        match self {
            LineType::Empty => NodeKind::Empty,
            LineType::Comment(_) => NodeKind::Comment,
            LineType::ListItem(_) => NodeKind::ListItem,
            LineType::Heading { .. } => NodeKind::Block,
            LineType::Attribute { .. } => NodeKind::Attribute,
            LineType::ListHeader(_) => NodeKind::List,
            LineType::Text(_) => NodeKind::TextLine,
        }
    }
}

/// A classified line with its position in the source.
#[derive(Debug, Clone)]
pub struct Line {
    pub ltype: LineType,
    /// 1-based line number.
    pub number: usize,
    pub pos_start: usize,
    pub pos_end: usize,
}

/// Classifies one line of text (without its line terminator).
pub fn classify(line: &str) -> LineType {
    let trimmed = line.trim_start();

    if trimmed.is_empty() {
        return LineType::Empty;
    }
    if let Some(comment) = trimmed.strip_prefix("//") {
        return LineType::Comment(comment.trim().to_string());
    }
    if let Some(item) = line.strip_prefix('-') {
        return LineType::ListItem(item.trim().to_string());
    }
    if let Some(heading) = read_heading(line) {
        return heading;
    }
    if let Some(rest) = line.strip_prefix('.') {
        return read_attribute(line, rest);
    }
    if let Some(name) = read_bare_list_header(trimmed) {
        return LineType::ListHeader(name);
    }
    LineType::Text(line.to_string())
}

/// `#` runs followed by a non-blank name. A marker-only line is not a heading.
fn read_heading(line: &str) -> Option<LineType> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if level == 0 {
        return None;
    }
    let name = fold_key(&line[level..]);
    if name.is_empty() {
        return None;
    }
    Some(LineType::Heading { level, name })
}

fn read_attribute(line: &str, rest: &str) -> LineType {
    let Some(colon) = rest.find(':') else {
        return LineType::Text(line.to_string());
    };
    let key = fold_key(&rest[..colon]);
    if key.is_empty() {
        return LineType::Text(line.to_string());
    }
    let value = rest[colon + 1..].trim();
    if value.is_empty() {
        LineType::ListHeader(key)
    } else {
        LineType::Attribute {
            key,
            value: value.to_string(),
        }
    }
}

/// `Shopping list:` introduces a list without the leading dot.
fn read_bare_list_header(trimmed: &str) -> Option<String> {
    let head = trimmed.trim_end().strip_suffix(':')?;
    let name = fold_key(head);
    if is_array_name(&name) {
        Some(name)
    } else {
        None
    }
}

/// Splits a source into classified lines, tracking line numbers and byte spans.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    number: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            number: 0,
        }
    }

    pub fn lex(&mut self) -> Vec<Line> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        lines
    }

    pub fn next_line(&mut self) -> Option<Line> {
        if self.position >= self.input.len() {
            return None;
        }
        let rest = &self.input[self.position..];
        let raw_len = rest.find('\n').map_or(rest.len(), |i| i + 1);
        let text = rest[..raw_len].trim_end_matches('\n').trim_end_matches('\r');

        let pos_start = self.position;
        self.position += raw_len;
        self.number += 1;

        Some(Line {
            ltype: classify(text),
            number: self.number,
            pos_start,
            pos_end: pos_start + text.len(),
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        self.next_line()
    }
}
