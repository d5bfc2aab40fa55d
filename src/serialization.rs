//! The intermediate value tree produced by the encoder's serde `Serializer`,
//! and its rendering to MDSon text.

use crate::context::Context;
use crate::error::EncodeError;
use crate::utils::{field_lookup_key, fold_key};
use log::Level;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Canonical text of a primitive.
    Scalar(String),
    /// A `u8`; a sequence made only of these is written inline as text.
    Byte(u8),
    /// The payload of an `Id`.
    Identity(String),
    /// `None` or `()`. Never written.
    Absent,
    Seq(Vec<Value>),
    Record(Record),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub type_name: String,
    pub id: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<(String, Value)>,
}

enum SeqShape {
    Bytes,
    Records,
    Primitives,
    Mixed,
}

fn seq_shape(items: &[Value]) -> SeqShape {
    if items.is_empty() {
        return SeqShape::Primitives;
    }
    if items.iter().all(|item| matches!(item, Value::Byte(_))) {
        SeqShape::Bytes
    } else if items.iter().all(|item| matches!(item, Value::Record(_))) {
        SeqShape::Records
    } else if items
        .iter()
        .all(|item| matches!(item, Value::Scalar(_) | Value::Byte(_) | Value::Identity(_)))
    {
        SeqShape::Primitives
    } else {
        SeqShape::Mixed
    }
}

/// Writes a value tree as MDSon text.
///
/// A record becomes a heading followed by its scalar attributes and lists,
/// then its nested records and record sequences as child blocks. Children
/// come last so that re-parsing puts every attribute back in its own block.
pub(crate) struct Renderer<'c> {
    out: String,
    ctx: &'c Context,
}

impl<'c> Renderer<'c> {
    pub fn new(ctx: &'c Context) -> Self {
        Self {
            out: String::new(),
            ctx,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    pub fn render_root(&mut self, value: &Value, level: usize) -> Result<(), EncodeError> {
        match value {
            Value::Record(record) => {
                let heading = heading_id(record).unwrap_or(record.type_name.as_str());
                self.record(record, heading, level)
            }
            _ => Err(EncodeError::NotARecord),
        }
    }

    fn record(&mut self, record: &Record, heading: &str, level: usize) -> Result<(), EncodeError> {
        if self.ctx.enabled(Level::Debug) {
            log::debug!(
                "encoding {} '{}' at level {level}",
                record.type_name,
                heading
            );
        }
        self.heading(level, heading)?;

        // headings are case-folded when read back; a plain `id` field owns the
        // attribute instead
        if let Some(id) = &record.id {
            let shadowed = record
                .fields
                .iter()
                .any(|(name, _)| field_lookup_key(name) == "id");
            if fold_key(heading) != *id && !shadowed {
                self.attribute("id", id)?;
            }
        }

        let mut blocks = Vec::new();
        for (name, value) in &record.fields {
            match value {
                Value::Absent => {}
                Value::Scalar(text) | Value::Identity(text) => self.attribute(name, text)?,
                Value::Byte(byte) => self.attribute(name, &byte.to_string())?,
                Value::Record(_) => blocks.push((name, value)),
                Value::Seq(items) => match seq_shape(items) {
                    SeqShape::Bytes => {
                        let bytes: Vec<u8> = items
                            .iter()
                            .filter_map(|item| match item {
                                Value::Byte(byte) => Some(*byte),
                                _ => None,
                            })
                            .collect();
                        self.attribute(name, &String::from_utf8_lossy(&bytes))?;
                    }
                    SeqShape::Records => blocks.push((name, value)),
                    SeqShape::Primitives => self.list(name, items)?,
                    SeqShape::Mixed => {
                        return Err(EncodeError::Unsupported {
                            field: name.clone(),
                            kind: "sequence mixing records and values".to_string(),
                        })
                    }
                },
            }
        }

        for (name, value) in blocks {
            match value {
                Value::Record(inner) => self.record(inner, name, level + 1)?,
                Value::Seq(items) => self.array(name, items, level + 1)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// `## name List` with one sub-block per element.
    fn array(&mut self, name: &str, items: &[Value], level: usize) -> Result<(), EncodeError> {
        self.heading(level, &format!("{name} List"))?;
        for (index, item) in items.iter().enumerate() {
            if let Value::Record(record) = item {
                let heading = match heading_id(record) {
                    Some(id) => id.to_string(),
                    None => format!("{} {}", record.type_name, index + 1),
                };
                self.record(record, &heading, level + 1)?;
            }
        }
        Ok(())
    }

    fn list(&mut self, name: &str, items: &[Value]) -> Result<(), EncodeError> {
        single_line(name, name)?;
        self.out.push_str(&format!(".{name} List :\n"));
        for item in items {
            let text = match item {
                Value::Scalar(text) | Value::Identity(text) => text.clone(),
                Value::Byte(byte) => byte.to_string(),
                _ => {
                    return Err(EncodeError::Unsupported {
                        field: name.to_string(),
                        kind: "list element".to_string(),
                    })
                }
            };
            single_line(name, &text)?;
            self.out.push_str(&format!("- {text}\n"));
        }
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), EncodeError> {
        single_line(name, name)?;
        single_line(name, value)?;
        self.out.push_str(&format!(".{name} :{value}\n"));
        Ok(())
    }

    fn heading(&mut self, level: usize, name: &str) -> Result<(), EncodeError> {
        single_line(name, name)?;
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(&"#".repeat(level));
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push('\n');
        Ok(())
    }
}

/// The record's id, when it reads back as a heading name. Blank and
/// multi-line ids leave the heading to the type name and travel as `.id`.
fn heading_id(record: &Record) -> Option<&str> {
    record
        .id
        .as_deref()
        .filter(|id| !id.trim().is_empty() && !id.contains(['\n', '\r']))
}

fn single_line(field: &str, text: &str) -> Result<(), EncodeError> {
    if text.contains(['\n', '\r']) {
        Err(EncodeError::MultilineValue {
            field: field.to_string(),
        })
    } else {
        Ok(())
    }
}
