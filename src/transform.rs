//! Rendering a parsed document into other text formats.
//!
//! Every dialect shares one depth-first walk over the tree; they differ only
//! in the markers written for headings, lists and items. Attributes are data
//! rather than content and are not rendered, and the synthetic root never
//! gets a heading.

use crate::ast::{Block, Document, List, Node};
use crate::context::{Context, DebugLevel};
use crate::error::TransformError;
use log::Level;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Spaces in front of each list item.
    pub tab_width: usize,
    /// Bullet written before each item of an unnumbered list.
    pub list_marker: String,
    /// Number list items (`1.`, `2.`, ...) instead of using the bullet.
    pub numbered: bool,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            tab_width: 0,
            list_marker: "- ".to_string(),
            numbered: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Markdown-like text.
    #[default]
    Plain,
    /// groff with the mom macro package.
    Mom,
}

pub trait Transform {
    fn transform(&self, w: &mut dyn Write, doc: &Document) -> Result<(), TransformError>;
}

pub struct Transformer {
    dialect: Dialect,
    config: TransformerConfig,
    debug: DebugLevel,
}

impl Transformer {
    pub fn new(dialect: Dialect, ctx: &Context) -> Self {
        Self {
            dialect,
            config: ctx.transformer.clone(),
            debug: ctx.debug,
        }
    }

    fn preamble(&self, w: &mut dyn Write, doc: &Document) -> Result<(), TransformError> {
        if self.dialect == Dialect::Mom {
            if let Some(title) = doc.attribute("title") {
                writeln!(w, ".TITLE \"{}\"", quoted(title))?;
            }
            if let Some(author) = doc.attribute("author") {
                writeln!(w, ".AUTHOR \"{}\"", quoted(author))?;
            }
            writeln!(w, ".PRINTSTYLE TYPESET")?;
            writeln!(w, ".START")?;
        }
        Ok(())
    }

    fn heading(&self, w: &mut dyn Write, block: &Block) -> Result<(), TransformError> {
        if self.debug.allows(Level::Debug) {
            log::debug!("rendering block '{}' (line {})", block.name, block.line);
        }
        match self.dialect {
            Dialect::Plain => writeln!(w, "{} {}", "#".repeat(block.level), block.name)?,
            Dialect::Mom => writeln!(w, ".HEADING {} \"{}\"", block.level, quoted(&block.name))?,
        }
        Ok(())
    }

    fn list(&self, w: &mut dyn Write, list: &List) -> Result<(), TransformError> {
        let indent = " ".repeat(self.config.tab_width);
        match self.dialect {
            Dialect::Plain => {
                writeln!(w, "{}:", list.name)?;
                for (index, item) in list.items.iter().enumerate() {
                    if self.config.numbered {
                        writeln!(w, "{indent}{}. {}", index + 1, item.text)?;
                    } else {
                        writeln!(w, "{indent}{}{}", self.config.list_marker, item.text)?;
                    }
                }
            }
            Dialect::Mom => {
                writeln!(w, "{}:", escaped(&list.name))?;
                let style = if self.config.numbered { "DIGIT" } else { "BULLET" };
                writeln!(w, ".LIST {style}")?;
                for item in &list.items {
                    writeln!(w, ".ITEM")?;
                    writeln!(w, "{}", escaped(&item.text))?;
                }
                writeln!(w, ".LIST OFF")?;
            }
        }
        Ok(())
    }

    fn text(&self, w: &mut dyn Write, text: &str) -> Result<(), TransformError> {
        match self.dialect {
            Dialect::Plain => writeln!(w, "{text}")?,
            Dialect::Mom => writeln!(w, "{}", escaped(text))?,
        }
        Ok(())
    }
}

impl Transform for Transformer {
    fn transform(&self, w: &mut dyn Write, doc: &Document) -> Result<(), TransformError> {
        self.preamble(w, doc)?;
        let mut pending: Vec<&Node> = doc.root.children.iter().rev().collect();
        while let Some(node) = pending.pop() {
            match node {
                Node::Block(block) => {
                    self.heading(w, block)?;
                    pending.extend(block.children.iter().rev());
                }
                Node::List(list) => self.list(w, list)?,
                Node::TextLine(leaf) => self.text(w, &leaf.text)?,
                Node::Empty(_) => writeln!(w)?,
            }
        }
        w.flush()?;
        Ok(())
    }
}

/// Renders `doc` in `dialect` using the transformer settings of `ctx`.
pub fn transform(
    w: &mut dyn Write,
    doc: &Document,
    dialect: Dialect,
    ctx: &Context,
) -> Result<(), TransformError> {
    Transformer::new(dialect, ctx).transform(w, doc)
}

pub fn transform_to_string(doc: &Document, dialect: Dialect, ctx: &Context) -> Result<String, TransformError> {
    let mut out = Vec::new();
    transform(&mut out, doc, dialect, ctx)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

// groff reads a line starting with `.` or `'` as a request
fn escaped(text: &str) -> String {
    if text.starts_with(['.', '\'']) {
        format!("\\&{text}")
    } else {
        text.to_string()
    }
}

fn quoted(text: &str) -> String {
    text.replace('"', "\\(dq")
}
