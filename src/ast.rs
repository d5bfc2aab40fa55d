use crate::utils::{is_array_name, strip_list_suffix};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the synthetic level-0 block every document is rooted at.
pub const ROOT_NAME: &str = "root";

/// A parsed and optionally evaluated MDSon document.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Document {
    pub root: Block,
    /// Flat document-wide attribute map; the evaluator's only scope.
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum NodeKind {
    Block,
    List,
    ListItem,
    Attribute,
    TextLine,
    Comment,
    Empty,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Block(Block),
    List(List),
    TextLine(Leaf),
    Empty(Leaf),
}

/// A heading and everything nested under it.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Block {
    pub name: String,
    pub level: usize,
    pub line: usize,
    /// Attributes declared directly inside this block, keys case-folded.
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

/// A list header and its contiguous `-` items.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct List {
    pub name: String,
    pub level: usize,
    pub line: usize,
    pub items: Vec<Leaf>,
}

/// A single-line node: a list item, a text line or an empty line.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Leaf {
    pub line: usize,
    pub text: String,
}

impl Document {
    pub fn new() -> Self {
        Self {
            root: Block::new(ROOT_NAME, 0, 0),
            attributes: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Block {
        &self.root
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Top-level blocks, i.e. the headings directly under the root.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.root.blocks()
    }

    /// Serializes the document tree into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serializes the document tree into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    pub fn new(name: impl Into<String>, level: usize, line: usize) -> Self {
        Self {
            name: name.into(),
            level,
            line,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Array blocks (`# people list`) hold one sub-block per sequence element.
    pub fn is_array(&self) -> bool {
        is_array_name(&self.name)
    }

    /// The name used for field lookup, without any ` list` suffix.
    pub fn field_name(&self) -> &str {
        strip_list_suffix(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.children.iter().filter_map(|child| match child {
            Node::Block(block) => Some(block),
            _ => None,
        })
    }

    pub fn lists(&self) -> impl Iterator<Item = &List> {
        self.children.iter().filter_map(|child| match child {
            Node::List(list) => Some(list),
            _ => None,
        })
    }

    /// First direct child block called `name`.
    pub fn find_block(&self, name: &str) -> Option<&Block> {
        self.blocks().find(|block| block.name == name)
    }

    /// First direct child list called `name`.
    pub fn find_list(&self, name: &str) -> Option<&List> {
        self.lists().find(|list| list.name == name)
    }
}

impl List {
    pub fn new(name: impl Into<String>, level: usize, line: usize) -> Self {
        Self {
            name: name.into(),
            level,
            line,
            items: Vec::new(),
        }
    }

    pub fn field_name(&self) -> &str {
        strip_list_suffix(&self.name)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.text.as_str())
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Block(_) => NodeKind::Block,
            Node::List(_) => NodeKind::List,
            Node::TextLine(_) => NodeKind::TextLine,
            Node::Empty(_) => NodeKind::Empty,
        }
    }

    /// 1-based source line; 0 for the synthetic root.
    pub fn line(&self) -> usize {
        match self {
            Node::Block(block) => block.line,
            Node::List(list) => list.line,
            Node::TextLine(leaf) | Node::Empty(leaf) => leaf.line,
        }
    }

    /// The block or list name, or the literal text of a leaf.
    pub fn key(&self) -> &str {
        match self {
            Node::Block(block) => &block.name,
            Node::List(list) => &list.name,
            Node::TextLine(leaf) | Node::Empty(leaf) => &leaf.text,
        }
    }

    pub fn level(&self) -> Option<usize> {
        match self {
            Node::Block(block) => Some(block.level),
            Node::List(list) => Some(list.level),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Block => "block",
            NodeKind::List => "list",
            NodeKind::ListItem => "list item",
            NodeKind::Attribute => "attribute",
            NodeKind::TextLine => "text",
            NodeKind::Comment => "comment",
            NodeKind::Empty => "empty",
        };
        f.write_str(name)
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
    let indent = "  ".repeat(block.level);
    writeln!(
        f,
        "{indent}block '{}' (level {}, line {})",
        block.name, block.level, block.line
    )?;
    for (key, value) in &block.attributes {
        writeln!(f, "{indent}  .{key} = {value}")?;
    }
    for child in &block.children {
        match child {
            Node::Block(inner) => write_block(f, inner)?,
            Node::List(list) => {
                writeln!(
                    f,
                    "{indent}  list '{}' (level {}, line {})",
                    list.name, list.level, list.line
                )?;
                for item in &list.items {
                    writeln!(f, "{indent}    - {}", item.text)?;
                }
            }
            Node::TextLine(leaf) => writeln!(f, "{indent}  text '{}' (line {})", leaf.text, leaf.line)?,
            Node::Empty(leaf) => writeln!(f, "{indent}  empty (line {})", leaf.line)?,
        }
    }
    Ok(())
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, &self.root)?;
        for (key, value) in &self.attributes {
            writeln!(f, " {key} = {value}")?;
        }
        Ok(())
    }
}
