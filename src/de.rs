//! Decoding parsed blocks into application records through serde.
//!
//! A block maps to a struct (or a string-keyed map): its attributes fill
//! primitive fields, its lists fill sequences of primitives, nested blocks
//! fill nested records, and array blocks (`# people list`) fill sequences of
//! records. Field names are matched case-insensitively, with `_` and spaces
//! treated alike. Input that matches no field is skipped with a warning;
//! fields that no input matches take their zero value.

use crate::ast::{Block, Document, List, Node};
use crate::context::{Context, DebugLevel};
use crate::error::{DecodeError, MdsonError};
use crate::id::ID_TOKEN;
use crate::parser::Parser;
use crate::utils::{field_lookup_key, strip_list_suffix};
use log::Level;
use serde::de::value::{MapDeserializer, SeqDeserializer, StrDeserializer};
use serde::de::{
    Deserialize, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer,
    MapAccess, SeqAccess, Visitor,
};
use std::collections::HashMap;

/// Decodes a block into `T` with default settings.
pub fn from_block<'de, T>(block: &'de Block) -> Result<T, DecodeError>
where
    T: Deserialize<'de>,
{
    from_block_with(block, &Context::default())
}

pub fn from_block_with<'de, T>(block: &'de Block, ctx: &Context) -> Result<T, DecodeError>
where
    T: Deserialize<'de>,
{
    T::deserialize(BlockDeserializer::root(block, ctx.debug))
}

/// Decodes a whole document. A document holding a single top-level block
/// (the usual `# title` layout) decodes that block; anything else decodes the
/// synthetic root.
pub fn from_document<T>(document: &Document) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    from_document_with(document, &Context::default())
}

pub fn from_document_with<T>(document: &Document, ctx: &Context) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    let mut blocks = document.root.blocks();
    match (blocks.next(), blocks.next()) {
        (Some(only), None) => {
            if ctx.debug.allows(Level::Warn) {
                warn_outside(&document.root, only);
            }
            from_block_with(only, ctx)
        }
        _ => from_block_with(&document.root, ctx),
    }
}

/// Root attributes and lists are not part of the block being decoded.
fn warn_outside(root: &Block, decoded: &Block) {
    for key in root.attributes.keys() {
        log::warn!("attribute '{key}' outside block '{}', skipped", decoded.name);
    }
    for child in &root.children {
        if let Node::List(list) = child {
            log::warn!(
                "list '{}' (line {}) outside block '{}', skipped",
                list.name,
                list.line,
                decoded.name
            );
        }
    }
}

/// Parses `source` and decodes the result. Attribute references are left
/// as written; evaluate the document first to have them resolved.
pub fn from_str<T>(source: &str) -> Result<T, MdsonError>
where
    T: DeserializeOwned,
{
    let document = Parser::new(source).parse_document()?;
    Ok(from_document(&document)?)
}

macro_rules! reject {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, DecodeError> {
            Err(self.shape_error())
        }
    )*};
}

// === Blocks ===

pub struct BlockDeserializer<'de> {
    block: &'de Block,
    debug: DebugLevel,
    is_root: bool,
}

impl<'de> BlockDeserializer<'de> {
    fn root(block: &'de Block, debug: DebugLevel) -> Self {
        Self {
            block,
            debug,
            is_root: true,
        }
    }

    fn nested(block: &'de Block, debug: DebugLevel) -> Self {
        Self {
            block,
            debug,
            is_root: false,
        }
    }

    fn shape_error(&self) -> DecodeError {
        if self.is_root {
            DecodeError::NotARecord
        } else {
            DecodeError::BlockShape {
                block: self.block.name.clone(),
            }
        }
    }
}

impl<'de> Deserializer<'de> for BlockDeserializer<'de> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_map(BlockAccess::new(self.block, None, self.debug))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_map(BlockAccess::new(self.block, Some(fields), self.debug))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    reject! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char deserialize_str
        deserialize_string deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_seq deserialize_identifier
    }
}

/// One value offered to a record, keyed by the field it fills.
enum Entry<'de> {
    Attribute(&'de str),
    Block(&'de Block),
    Array(&'de Block),
    List(&'de List),
    /// A declared field no input matched.
    Absent {
        field: &'static str,
        identity: &'de str,
    },
}

/// The identity a block hands to an `Id` field: its `.id:` attribute, an
/// empty `.id :` header, or else its name. A record with its own `id` field
/// keeps those for that field and takes the name.
fn identity(block: &Block, id_claimed: bool) -> &str {
    if id_claimed {
        return &block.name;
    }
    if let Some(id) = block.attribute("id") {
        return id;
    }
    if block.find_list("id").is_some_and(|list| list.items.is_empty()) {
        return "";
    }
    &block.name
}

fn is_identity_key(name: &str) -> bool {
    field_lookup_key(name) == "id"
}

struct BlockAccess<'de> {
    entries: std::vec::IntoIter<(String, String, Entry<'de>)>,
    value: Option<(String, Entry<'de>)>,
    debug: DebugLevel,
}

impl<'de> BlockAccess<'de> {
    /// Pairs every attribute and child of `block` with the field it fills.
    /// With `fields == None` (a map target) everything is offered under its
    /// own name. Declared fields left over are offered last as absent.
    fn new(block: &'de Block, fields: Option<&'static [&'static str]>, debug: DebugLevel) -> Self {
        let lookup: Option<HashMap<String, &'static str>> = fields.map(|fields| {
            fields
                .iter()
                .map(|field| (field_lookup_key(field), *field))
                .collect()
        });

        let resolve = |name: &str| -> Option<String> {
            match &lookup {
                None => Some(name.to_string()),
                Some(l) => l
                    .get(&field_lookup_key(name))
                    .or_else(|| l.get(&field_lookup_key(strip_list_suffix(name))))
                    .map(|field| field.to_string()),
            }
        };

        let mut entries = Vec::new();
        let mut unmatched = Vec::new();

        for (key, value) in &block.attributes {
            match resolve(key) {
                Some(field) => entries.push((field, key.clone(), Entry::Attribute(value))),
                None if is_identity_key(key) => {}
                None => unmatched.push(format!("attribute '{key}'")),
            }
        }

        for child in &block.children {
            let (name, entry) = match child {
                Node::Block(inner) if inner.is_array() => (&inner.name, Entry::Array(inner)),
                Node::Block(inner) => (&inner.name, Entry::Block(inner)),
                Node::List(list) => (&list.name, Entry::List(list)),
                Node::TextLine(_) | Node::Empty(_) => continue,
            };
            let key = match (&lookup, &entry) {
                (None, Entry::Array(_) | Entry::List(_)) => Some(strip_list_suffix(name).to_string()),
                _ => resolve(name),
            };
            match key {
                Some(field) => entries.push((field, name.clone(), entry)),
                None if matches!(entry, Entry::List(_)) && is_identity_key(name) => {}
                None => unmatched.push(format!("'{name}' (line {})", child.line())),
            }
        }

        if let Some(fields) = fields {
            let claimed = lookup.as_ref().is_some_and(|l| l.contains_key("id"));
            let identity = identity(block, claimed);
            for &field in fields {
                if !entries.iter().any(|(offered, _, _)| offered == field) {
                    entries.push((
                        field.to_string(),
                        field.to_string(),
                        Entry::Absent { field, identity },
                    ));
                }
            }
        }

        if !unmatched.is_empty() && debug.allows(Level::Warn) {
            for input in unmatched {
                log::warn!("block '{}': no field matches {input}, skipped", block.name);
            }
        }

        Self {
            entries: entries.into_iter(),
            value: None,
            debug,
        }
    }

    /// Every field of a record that has no block at all.
    fn absent(fields: &'static [&'static str], identity: &'de str, debug: DebugLevel) -> Self {
        let entries: Vec<_> = fields
            .iter()
            .map(|&field| {
                (
                    field.to_string(),
                    field.to_string(),
                    Entry::Absent { field, identity },
                )
            })
            .collect();
        Self {
            entries: entries.into_iter(),
            value: None,
            debug,
        }
    }
}

impl<'de> MapAccess<'de> for BlockAccess<'de> {
    type Error = DecodeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, DecodeError>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((field, input, entry)) => {
                self.value = Some((input, entry));
                let key: StrDeserializer<'_, DecodeError> = field.as_str().into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, DecodeError>
    where
        V: DeserializeSeed<'de>,
    {
        let Some((input, entry)) = self.value.take() else {
            return Err(DecodeError::Custom("value requested before key".to_string()));
        };
        let result = match entry {
            Entry::Attribute(value) => seed.deserialize(ScalarDeserializer::new(value)),
            Entry::Block(block) => seed.deserialize(BlockDeserializer::nested(block, self.debug)),
            Entry::Array(block) => seed.deserialize(ArrayDeserializer {
                block,
                debug: self.debug,
            }),
            Entry::List(list) => seed.deserialize(ListDeserializer { list }),
            Entry::Absent { field, identity } => seed.deserialize(AbsentDeserializer {
                field,
                identity,
                debug: self.debug,
            }),
        };
        result.map_err(|err| err.within(&input))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

// === Absent fields ===

/// Fills a declared field that nothing in the block matched. An `Id` takes
/// the block's identity; anything else gets its zero value (`false`, `0`,
/// `""`, an empty sequence, `None`).
struct AbsentDeserializer<'de> {
    field: &'static str,
    identity: &'de str,
    debug: DebugLevel,
}

impl AbsentDeserializer<'_> {
    fn missing(&self) -> DecodeError {
        <DecodeError as serde::de::Error>::missing_field(self.field)
    }
}

macro_rules! zero {
    ($($method:ident => $visit:ident($zero:expr);)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            visitor.$visit($zero)
        }
    )*};
}

impl<'de> Deserializer<'de> for AbsentDeserializer<'de> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    zero! {
        deserialize_bool => visit_bool(false);
        deserialize_i8 => visit_i8(0);
        deserialize_i16 => visit_i16(0);
        deserialize_i32 => visit_i32(0);
        deserialize_i64 => visit_i64(0);
        deserialize_i128 => visit_i128(0);
        deserialize_u8 => visit_u8(0);
        deserialize_u16 => visit_u16(0);
        deserialize_u32 => visit_u32(0);
        deserialize_u64 => visit_u64(0);
        deserialize_u128 => visit_u128(0);
        deserialize_f32 => visit_f32(0.0);
        deserialize_f64 => visit_f64(0.0);
        deserialize_str => visit_borrowed_str("");
        deserialize_string => visit_borrowed_str("");
        deserialize_identifier => visit_borrowed_str("");
        deserialize_bytes => visit_borrowed_bytes(&[]);
        deserialize_byte_buf => visit_borrowed_bytes(&[]);
    }

    fn deserialize_char<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, DecodeError> {
        Err(self.missing())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_none()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        if name == ID_TOKEN {
            visitor.visit_newtype_struct(ScalarDeserializer::new(self.identity))
        } else {
            visitor.visit_newtype_struct(self)
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let mut seq: SeqDeserializer<_, DecodeError> = SeqDeserializer::new(std::iter::empty::<()>());
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let mut map: MapDeserializer<'de, _, DecodeError> =
            MapDeserializer::new(std::iter::empty::<((), ())>());
        let value = visitor.visit_map(&mut map)?;
        map.end()?;
        Ok(value)
    }

    /// A nested record with no block is named after its field.
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_map(BlockAccess::absent(fields, self.field, self.debug))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.missing())
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }
}

// === Array blocks ===

/// `# people list`: one record per sub-block.
struct ArrayDeserializer<'de> {
    block: &'de Block,
    debug: DebugLevel,
}

impl ArrayDeserializer<'_> {
    fn shape_error(&self) -> DecodeError {
        DecodeError::ArrayShape {
            block: self.block.name.clone(),
        }
    }
}

impl<'de> Deserializer<'de> for ArrayDeserializer<'de> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        if self.debug.allows(Level::Warn) {
            for child in &self.block.children {
                if let Node::TextLine(_) | Node::List(_) = child {
                    log::warn!(
                        "array block '{}': line {} is not a block, skipped",
                        self.block.name,
                        child.line()
                    );
                }
            }
        }
        visitor.visit_seq(ElementAccess {
            elements: self.block.blocks(),
            debug: self.debug,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    reject! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char deserialize_str
        deserialize_string deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_map deserialize_identifier
    }
}

struct ElementAccess<'de, I>
where
    I: Iterator<Item = &'de Block>,
{
    elements: I,
    debug: DebugLevel,
}

impl<'de, I> SeqAccess<'de> for ElementAccess<'de, I>
where
    I: Iterator<Item = &'de Block>,
{
    type Error = DecodeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, DecodeError>
    where
        T: DeserializeSeed<'de>,
    {
        match self.elements.next() {
            Some(block) => seed
                .deserialize(BlockDeserializer::nested(block, self.debug))
                .map(Some)
                .map_err(|err| err.within(&block.name)),
            None => Ok(None),
        }
    }
}

// === Lists ===

struct ListDeserializer<'de> {
    list: &'de List,
}

impl ListDeserializer<'_> {
    fn shape_error(&self) -> DecodeError {
        DecodeError::ListShape {
            list: self.list.name.clone(),
        }
    }
}

impl<'de> Deserializer<'de> for ListDeserializer<'de> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let items = self
            .list
            .items
            .iter()
            .map(|item| ScalarDeserializer::new(&item.text));
        let mut seq: SeqDeserializer<_, DecodeError> = SeqDeserializer::new(items);
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    // `.name :` with nothing after the colon reads as an empty list header; a
    // string field takes it as an empty value.
    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        if self.list.items.is_empty() {
            visitor.visit_borrowed_str("")
        } else {
            Err(self.shape_error())
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.shape_error())
    }

    reject! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char
        deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_map deserialize_identifier
    }
}

// === Scalars ===

/// The text of one attribute or list item.
pub struct ScalarDeserializer<'de> {
    value: &'de str,
}

impl<'de> ScalarDeserializer<'de> {
    pub fn new(value: &'de str) -> Self {
        Self { value }
    }

    fn invalid(&self, expected: &str) -> DecodeError {
        DecodeError::InvalidValue {
            value: self.value.to_string(),
            expected: expected.to_string(),
        }
    }

    fn parse<T: std::str::FromStr>(&self, expected: &str) -> Result<T, DecodeError> {
        self.value.trim().parse().map_err(|_| self.invalid(expected))
    }

    fn parse_bool(&self) -> Result<bool, DecodeError> {
        match self.value.trim() {
            "true" | "True" | "TRUE" | "t" | "T" | "1" => Ok(true),
            "false" | "False" | "FALSE" | "f" | "F" | "0" => Ok(false),
            _ => Err(self.invalid("a boolean")),
        }
    }
}

impl<'de> IntoDeserializer<'de, DecodeError> for ScalarDeserializer<'de> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! parse_number {
    ($($method:ident => $visit:ident, $expected:literal;)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            visitor.$visit(self.parse($expected)?)
        }
    )*};
}

impl<'de> Deserializer<'de> for ScalarDeserializer<'de> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_borrowed_str(self.value)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_bool(self.parse_bool()?)
    }

    parse_number! {
        deserialize_i8 => visit_i8, "an integer";
        deserialize_i16 => visit_i16, "an integer";
        deserialize_i32 => visit_i32, "an integer";
        deserialize_i64 => visit_i64, "an integer";
        deserialize_i128 => visit_i128, "an integer";
        deserialize_u8 => visit_u8, "an unsigned integer";
        deserialize_u16 => visit_u16, "an unsigned integer";
        deserialize_u32 => visit_u32, "an unsigned integer";
        deserialize_u64 => visit_u64, "an unsigned integer";
        deserialize_u128 => visit_u128, "an unsigned integer";
        deserialize_f32 => visit_f32, "a number";
        deserialize_f64 => visit_f64, "a number";
        deserialize_char => visit_char, "a single character";
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_borrowed_str(self.value)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_borrowed_bytes(self.value.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_bytes(visitor)
    }

    /// A `Vec<u8>` field is written as one inline string.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let mut seq: SeqDeserializer<_, DecodeError> = SeqDeserializer::new(self.value.bytes());
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        let variant: StrDeserializer<'_, DecodeError> = self.value.trim().into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, DecodeError> {
        Err(self.invalid("a record"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, DecodeError> {
        Err(self.invalid("a record"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    fn parse(source: &str) -> Document {
        Parser::new(source).parse_document().unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq, Default)]
    #[serde(default)]
    struct Job {
        version: String,
        command: String,
        over_write_output_file: bool,
        retries: i32,
        ratio: f64,
        not_in_the_map: bool,
    }

    #[test]
    fn test_attributes_fill_primitive_fields() {
        let doc = parse(
            "# general\n.Version: 1.0.0\n.Command: run\n.Over Write Output File: true\n.retries: 3\n.ratio: 0.25\n.unknown: ignored\n",
        );
        let job: Job = from_document(&doc).unwrap();
        assert_eq!(
            job,
            Job {
                version: "1.0.0".to_string(),
                command: "run".to_string(),
                over_write_output_file: true,
                retries: 3,
                ratio: 0.25,
                not_in_the_map: false,
            }
        );
    }

    #[test]
    fn test_invalid_scalar_names_field_and_value() {
        let doc = parse("# general\n.retries: many\n");
        let err = from_document::<Job>(&doc).unwrap_err();
        assert_eq!(err.to_string(), "in 'retries': cannot parse 'many' as an integer");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tagged {
        tags: Vec<String>,
    }

    #[test]
    fn test_bare_list_header_fills_sequence() {
        let doc = parse("# doc\ntags list:\n- a\n- b\n");
        let tagged: Tagged = from_document(&doc).unwrap();
        assert_eq!(tagged.tags, vec!["a", "b"]);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        id: Id,
        age: u32,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Team {
        name: String,
        people: Vec<Person>,
        lead: Option<Box<Person>>,
    }

    #[test]
    fn test_array_block_and_identity() {
        let doc = parse(
            "# team\n.name: core\n## people list\n### Alice\n.age: 30\n### Bob\n.age: 41\n.id: Robert\n## lead\n.age: 50\n",
        );
        let team: Team = from_document(&doc).unwrap();
        assert_eq!(team.name, "core");
        assert_eq!(team.people.len(), 2);
        assert_eq!(team.people[0], Person { id: Id::new("alice"), age: 30 });
        assert_eq!(team.people[1].id.as_str(), "Robert");
        assert_eq!(team.lead.unwrap().id.as_str(), "lead");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Widget {
        id: u32,
        name: String,
    }

    #[test]
    fn test_plain_id_field_is_an_ordinary_field() {
        let widget: Widget = from_document(&parse("# widget\n.name: gear\n")).unwrap();
        assert_eq!(widget, Widget { id: 0, name: "gear".to_string() });

        let widget: Widget = from_document(&parse("# widget\n.id: 7\n.name: gear\n")).unwrap();
        assert_eq!(widget.id, 7);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Crate {
        key: Id,
        size: u32,
    }

    #[test]
    fn test_identity_under_any_field_name() {
        let item: Crate = from_document(&parse("# Box\n.size: 2\n")).unwrap();
        assert_eq!(item, Crate { key: Id::new("box"), size: 2 });

        let item: Crate = from_document(&parse("# Box\n.id: Box\n.size: 2\n")).unwrap();
        assert_eq!(item.key.as_str(), "Box");

        let item: Crate = from_document(&parse("# Crate\n.id :\n.size: 2\n")).unwrap();
        assert_eq!(item.key.as_str(), "");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Rec {
        id: String,
        n: u32,
    }

    #[test]
    fn test_blank_id_attribute_is_offered_once() {
        let rec: Rec = from_document(&parse("# Rec\n.id :\n.n :1\n")).unwrap();
        assert_eq!(rec, Rec { id: String::new(), n: 1 });
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sparse {
        flag: bool,
        count: u64,
        label: String,
        tags: Vec<String>,
        extra: Option<String>,
        inner: Crate,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct NeedsMode {
        mode: Mode,
    }

    #[test]
    fn test_absent_fields_take_zero_values() {
        let sparse: Sparse = from_document(&parse("# sparse\n")).unwrap();
        assert_eq!(
            sparse,
            Sparse {
                flag: false,
                count: 0,
                label: String::new(),
                tags: vec![],
                extra: None,
                inner: Crate {
                    key: Id::new("inner"),
                    size: 0,
                },
            }
        );

        // an enum has no zero value
        let err = from_document::<NeedsMode>(&parse("# doc\n")).unwrap_err();
        assert_eq!(err.to_string(), "in 'mode': missing field `mode`");
    }

    #[test]
    fn test_root_attributes_outside_single_block_are_skipped() {
        let doc = parse(".date: today\n.extras:\n- a\n# general\n.version: 2\n");
        let job: Job = from_document(&doc).unwrap();
        assert_eq!(job.version, "2");
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct NotASequence {
        people: Person,
    }

    #[test]
    fn test_array_block_into_record_field_fails() {
        let doc = parse("# team\n## people list\n### a\n.age: 1\n");
        let err = from_document::<NotASequence>(&doc).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &DecodeError::ArrayShape {
                block: "people list".to_string()
            }
        );
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct NotARecordField {
        lead: String,
    }

    #[test]
    fn test_scalar_block_into_primitive_field_fails() {
        let doc = parse("# team\n## lead\n.age: 1\n");
        let err = from_document::<NotARecordField>(&doc).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &DecodeError::BlockShape {
                block: "lead".to_string()
            }
        );
    }

    #[test]
    fn test_root_must_be_a_record() {
        let doc = parse("# doc\n");
        assert_eq!(from_block::<i32>(&doc.root).unwrap_err(), DecodeError::NotARecord);
    }

    #[test]
    fn test_map_target_receives_everything() {
        let doc = parse(".a: 1\n.b: two\n");
        let map: BTreeMap<String, String> = from_document(&doc).unwrap();
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("two"));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Fast,
        Safe,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Settings {
        mode: Mode,
        note: String,
        data: Vec<u8>,
        ids: Vec<u16>,
    }

    #[test]
    fn test_enums_bytes_and_empty_values() {
        let doc = parse("# settings\n.mode: safe\n.note :\n.data: abc\n.ids:\n- 1\n- 2\n");
        let settings: Settings = from_document(&doc).unwrap();
        assert_eq!(settings.mode, Mode::Safe);
        assert_eq!(settings.note, "");
        assert_eq!(settings.data, b"abc".to_vec());
        assert_eq!(settings.ids, vec![1, 2]);
    }
}
