//! Encoding application records as MDSon text through serde.

use crate::context::Context;
use crate::error::EncodeError;
use crate::id::ID_TOKEN;
use crate::serialization::{Record, Renderer, Value};
use serde::ser::{self, Impossible, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Encodes `value` with default settings.
pub fn to_string<T>(value: &T) -> Result<String, EncodeError>
where
    T: Serialize + ?Sized,
{
    to_string_with(value, &Context::default())
}

pub fn to_string_with<T>(value: &T, ctx: &Context) -> Result<String, EncodeError>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    Encoder::new(&mut out, ctx)
        .with_block_level(ctx.block_level)?
        .encode(value)?;
    String::from_utf8(out).map_err(|err| EncodeError::Custom(err.to_string()))
}

/// Encodes `value` into the file at `path`.
///
/// The text is written to a temporary file next to the destination and then
/// renamed over it, so readers never see a partial document. With
/// `overwrite == false` an existing destination is left untouched and
/// reported as an error.
pub fn encode_to_file<T>(value: &T, path: impl AsRef<Path>, overwrite: bool) -> Result<(), EncodeError>
where
    T: Serialize + ?Sized,
{
    let path = path.as_ref();
    let io_error = |message: String| EncodeError::Io {
        path: path.display().to_string(),
        message,
    };

    let text = to_string(value)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|err| io_error(err.to_string()))?;
    file.write_all(text.as_bytes())
        .map_err(|err| io_error(err.to_string()))?;

    let persisted = if overwrite {
        file.persist(path)
    } else {
        file.persist_noclobber(path)
    };
    persisted.map_err(|err| io_error(err.error.to_string()))?;
    Ok(())
}

/// Writes records to an output stream, one document per `encode` call.
pub struct Encoder<'c, W: Write> {
    writer: W,
    ctx: &'c Context,
    block_level: usize,
    started: bool,
}

impl<'c, W: Write> Encoder<'c, W> {
    pub fn new(writer: W, ctx: &'c Context) -> Self {
        Self {
            writer,
            ctx,
            block_level: 1,
            started: false,
        }
    }

    /// Sets the heading level of the top record. Levels start at 1 and cannot
    /// change once something has been written.
    pub fn with_block_level(mut self, level: usize) -> Result<Self, EncodeError> {
        self.set_block_level(level)?;
        Ok(self)
    }

    pub fn set_block_level(&mut self, level: usize) -> Result<(), EncodeError> {
        if level == 0 || self.started {
            return Err(EncodeError::BlockLevel(level));
        }
        self.block_level = level;
        Ok(())
    }

    pub fn encode<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let value = match value.serialize(ValueSerializer) {
            Ok(value) => value,
            Err(EncodeError::Unsupported { field, .. }) if field.is_empty() => {
                return Err(EncodeError::NotARecord)
            }
            Err(err) => return Err(err),
        };

        let mut renderer = Renderer::new(self.ctx);
        renderer.render_root(&value, self.block_level)?;
        let text = renderer.finish();

        if self.started {
            self.writer.write_all(b"\n")?;
        }
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        self.started = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn unsupported(kind: &str) -> EncodeError {
    EncodeError::Unsupported {
        field: String::new(),
        kind: kind.to_string(),
    }
}

/// Turns any serde data model value into a `Value` tree.
struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = EncodeError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = Impossible<Value, EncodeError>;
    type SerializeTupleStruct = Impossible<Value, EncodeError>;
    type SerializeTupleVariant = Impossible<Value, EncodeError>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = StructBuilder;
    type SerializeStructVariant = Impossible<Value, EncodeError>;

    fn serialize_bool(self, v: bool) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, EncodeError> {
        Ok(Value::Byte(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    // Display gives the shortest text that parses back to the same float.
    fn serialize_f32(self, v: f32) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_char(self, v: char) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, EncodeError> {
        Ok(Value::Seq(v.iter().copied().map(Value::Byte).collect()))
    }

    fn serialize_none(self) -> Result<Value, EncodeError> {
        Ok(Value::Absent)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, EncodeError> {
        Ok(Value::Absent)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, EncodeError> {
        Ok(Value::Absent)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, EncodeError> {
        Ok(Value::Scalar(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<Value, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let inner = value.serialize(self)?;
        match inner {
            Value::Scalar(id) if name == ID_TOKEN => Ok(Value::Identity(id)),
            other => Ok(other),
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Value, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, EncodeError> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, EncodeError> {
        Err(unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        Err(unsupported("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, EncodeError> {
        Ok(MapBuilder {
            record: Record {
                type_name: "map".to_string(),
                ..Record::default()
            },
            key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<StructBuilder, EncodeError> {
        Ok(StructBuilder {
            record: Record {
                type_name: name.to_string(),
                ..Record::default()
            },
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        Err(unsupported("enum variant with data"))
    }
}

struct SeqBuilder {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        match value.serialize(ValueSerializer)? {
            Value::Seq(_) => Err(unsupported("nested sequence")),
            Value::Absent => Err(unsupported("absent sequence element")),
            item => {
                self.items.push(item);
                Ok(())
            }
        }
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Seq(self.items))
    }
}

/// Adds one field to a record. The first `Id` field becomes the record's
/// identity instead of an attribute, whatever it is called.
fn push_field(record: &mut Record, name: &str, value: Value) {
    match value {
        Value::Identity(id) if record.id.is_none() => record.id = Some(id),
        value => record.fields.push((name.to_string(), value)),
    }
}

struct StructBuilder {
    record: Record,
}

impl ser::SerializeStruct for StructBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let value = value
            .serialize(ValueSerializer)
            .map_err(|err| err.in_field(key))?;
        push_field(&mut self.record, key, value);
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Record(self.record))
    }
}

struct MapBuilder {
    record: Record,
    key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| EncodeError::Custom("map value without a key".to_string()))?;
        let value = value
            .serialize(ValueSerializer)
            .map_err(|err| err.in_field(&key))?;
        push_field(&mut self.record, &key, value);
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Record(self.record))
    }
}

/// Map keys become attribute and block names, so only text is accepted.
struct KeySerializer;

fn non_string_key() -> EncodeError {
    unsupported("non-string map key")
}

macro_rules! reject_keys {
    ($($method:ident($ty:ty))*) => {$(
        fn $method(self, _v: $ty) -> Result<String, EncodeError> {
            Err(non_string_key())
        }
    )*};
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = EncodeError;

    type SerializeSeq = Impossible<String, EncodeError>;
    type SerializeTuple = Impossible<String, EncodeError>;
    type SerializeTupleStruct = Impossible<String, EncodeError>;
    type SerializeTupleVariant = Impossible<String, EncodeError>;
    type SerializeMap = Impossible<String, EncodeError>;
    type SerializeStruct = Impossible<String, EncodeError>;
    type SerializeStructVariant = Impossible<String, EncodeError>;

    fn serialize_str(self, v: &str) -> Result<String, EncodeError> {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<String, EncodeError> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, EncodeError> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<String, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    reject_keys! {
        serialize_bool(bool) serialize_i8(i8) serialize_i16(i16) serialize_i32(i32)
        serialize_i64(i64) serialize_u8(u8) serialize_u16(u16) serialize_u32(u32)
        serialize_u64(u64) serialize_f32(f32) serialize_f64(f64) serialize_bytes(&[u8])
    }

    fn serialize_none(self) -> Result<String, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_some<T>(self, _value: &T) -> Result<String, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        Err(non_string_key())
    }

    fn serialize_unit(self) -> Result<String, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        Err(non_string_key())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, EncodeError> {
        Err(non_string_key())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        Err(non_string_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::from_str;
    use crate::id::Id;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        name: String,
        #[serde(skip)]
        secret: String,
        age: u32,
    }

    #[test]
    fn test_skipped_field_is_not_written() {
        let person = Person {
            name: "Ada".to_string(),
            secret: "hidden".to_string(),
            age: 30,
        };
        let text = to_string(&person).unwrap();
        assert!(text.contains("age :30"));
        assert!(!text.contains("secret"));
        assert_eq!(text, "# Person\n.name :Ada\n.age :30\n");
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Member {
        id: Id,
        role: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Team {
        id: Id,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        motto: Option<String>,
        scores: Vec<f64>,
        members: Vec<Member>,
        lead: Member,
    }

    #[test]
    fn test_identity_and_nested_blocks_round_trip() {
        let team = Team {
            id: Id::new("core"),
            motto: None,
            scores: vec![1.5, 2.0],
            members: vec![
                Member {
                    id: Id::new("ada"),
                    role: "dev".to_string(),
                },
                Member {
                    id: Id::new("Grace"),
                    role: "ops".to_string(),
                },
            ],
            lead: Member {
                id: Id::new("linus"),
                role: "lead".to_string(),
            },
        };
        let text = to_string(&team).unwrap();
        assert!(text.starts_with("# core\n.scores List :\n- 1.5\n- 2\n"));
        assert!(text.contains("## members List\n\n### ada\n.role :dev\n"));
        assert!(text.contains("### Grace\n.id :Grace\n"));
        assert!(text.contains("## lead\n.id :linus\n"));
        assert!(!text.contains("motto"));

        let back: Team = from_str(&text).unwrap();
        assert_eq!(back, team);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Squad {
        name: String,
        members: Vec<Member>,
    }

    #[test]
    fn test_blank_identity_keeps_its_element() {
        let squad = Squad {
            name: "core".to_string(),
            members: vec![Member {
                id: Id::default(),
                role: "dev".to_string(),
            }],
        };
        let text = to_string(&squad).unwrap();
        assert!(text.contains("## members List\n\n### Member 1\n.id :\n.role :dev\n"));

        let back: Squad = from_str(&text).unwrap();
        assert_eq!(back, squad);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Shelf {
        key: Id,
        size: u32,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rec {
        id: String,
        n: u32,
    }

    #[test]
    fn test_identity_is_found_by_type() {
        let shelf = Shelf {
            key: Id::new("Oak"),
            size: 3,
        };
        let text = to_string(&shelf).unwrap();
        assert_eq!(text, "# Oak\n.id :Oak\n.size :3\n");
        assert_eq!(from_str::<Shelf>(&text).unwrap(), shelf);

        // a plain string called `id` is an ordinary attribute
        let rec = Rec {
            id: String::new(),
            n: 1,
        };
        let text = to_string(&rec).unwrap();
        assert_eq!(text, "# Rec\n.id :\n.n :1\n");
        assert_eq!(from_str::<Rec>(&text).unwrap(), rec);
    }

    #[test]
    fn test_multiline_names_are_rejected() {
        let member = Member {
            id: Id::new("two\nlines"),
            role: "dev".to_string(),
        };
        assert_eq!(
            to_string(&member).unwrap_err(),
            EncodeError::MultilineValue {
                field: "id".to_string()
            }
        );

        #[derive(Serialize)]
        struct Holder {
            extra: BTreeMap<String, String>,
        }
        let mut extra = BTreeMap::new();
        extra.insert("bad\nkey".to_string(), "v".to_string());
        assert_eq!(
            to_string(&Holder { extra }).unwrap_err(),
            EncodeError::MultilineValue {
                field: "bad\nkey".to_string()
            }
        );
    }

    #[test]
    fn test_unsupported_values() {
        #[derive(Serialize)]
        struct Pair {
            point: (i32, i32),
        }
        let err = to_string(&Pair { point: (1, 2) }).unwrap_err();
        assert_eq!(
            err,
            EncodeError::Unsupported {
                field: "point".to_string(),
                kind: "tuple".to_string()
            }
        );

        assert_eq!(to_string(&42).unwrap_err(), EncodeError::NotARecord);
        assert_eq!(to_string(&vec![1, 2]).unwrap_err(), EncodeError::NotARecord);

        #[derive(Serialize)]
        struct Lookup {
            table: BTreeMap<i32, &'static str>,
        }
        let mut table = BTreeMap::new();
        table.insert(1, "one");
        assert_eq!(
            to_string(&Lookup { table }).unwrap_err(),
            EncodeError::Unsupported {
                field: "table".to_string(),
                kind: "non-string map key".to_string()
            }
        );
    }

    #[test]
    fn test_block_level() {
        let ctx = Context::default();
        let mut out = Vec::new();
        assert_eq!(
            Encoder::new(&mut out, &ctx).with_block_level(0).err(),
            Some(EncodeError::BlockLevel(0))
        );

        let mut encoder = Encoder::new(&mut out, &ctx).with_block_level(2).unwrap();
        encoder
            .encode(&Person {
                name: "Ada".to_string(),
                secret: String::new(),
                age: 1,
            })
            .unwrap();
        assert_eq!(encoder.set_block_level(3), Err(EncodeError::BlockLevel(3)));
        assert!(String::from_utf8(out).unwrap().starts_with("## Person\n"));
    }

    #[test]
    fn test_encode_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person.mdson");
        let person = Person {
            name: "Ada".to_string(),
            secret: String::new(),
            age: 36,
        };
        encode_to_file(&person, &path, false).unwrap();
        let back: Person = from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, person);

        assert!(matches!(
            encode_to_file(&person, &path, false),
            Err(EncodeError::Io { .. })
        ));
        encode_to_file(&person, &path, true).unwrap();
    }
}
