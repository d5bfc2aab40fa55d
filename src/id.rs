use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Newtype name the decoder and encoder recognise `Id` by.
pub(crate) const ID_TOKEN: &str = "$mdson::private::Id";

/// Identity slot for a record.
///
/// A field of this type, whatever it is called, is filled from the block's
/// heading when decoding (or from its `.id:` line), and supplies the heading
/// when encoding instead of being written as an attribute. Other serde
/// formats see a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id(pub String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Id(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Id(id.to_string())
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(ID_TOKEN, &self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_newtype_struct(ID_TOKEN, IdVisitor)
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a record identity")
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Id, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Id)
    }

    fn visit_str<E>(self, v: &str) -> Result<Id, E>
    where
        E: de::Error,
    {
        Ok(Id(v.to_string()))
    }
}
