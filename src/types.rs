use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// The reserved identity field of every document.
pub const ID_FIELD: &str = "id";

/// Field map used for partial updates.
pub type Fields = Map<String, Value>;

// ============================================================================
// Document
// ============================================================================

/// A string-keyed map of JSON values with a reserved `id` field.
///
/// Identity is defined solely by `id`; every other field is opaque to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Document with only an `id` field.
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut doc = Self::new();
        doc.set_id(id);
        doc
    }

    /// The document's identifier, if it has a usable one.
    ///
    /// Empty strings and non-string values do not count as an id.
    pub fn id(&self) -> Option<&str> {
        match self.0.get(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    /// Ensure the document has an id, generating one with `prefix` if needed.
    ///
    /// A numeric `id` is kept and normalized to its string form. Returns the id.
    pub fn ensure_id(&mut self, prefix: &str) -> String {
        if let Some(id) = self.id() {
            return id.to_string();
        }
        let id = match self.0.get(ID_FIELD) {
            Some(Value::Number(n)) => n.to_string(),
            _ => generate_id(prefix),
        };
        self.set_id(id.clone());
        id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Shallow merge: top-level fields of `fields` overwrite, the rest survive.
    pub fn merge(&mut self, fields: &Fields) {
        for (key, value) in fields {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Deserialize into a typed schema for a collection.
    pub fn to_typed<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// Build a document from a typed value that serializes to a JSON object.
    pub fn from_typed<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    /// Fails (returning the value back) unless the value is a JSON object.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Build a [`Document`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty document.
#[macro_export]
macro_rules! doc {
    ($($json:tt)+) => {
        $crate::types::Document::try_from($crate::serde_json::json!($($json)+)).unwrap_or_default()
    };
}

// ============================================================================
// Identifier generation
// ============================================================================

const RANDOM_SUFFIX_LEN: usize = 9;

/// Generate `<prefix><unix-millis>_<random>`, e.g. `id_1760400000000_3f9a1c2b7`.
pub fn generate_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}{millis}_{}", &random[..RANDOM_SUFFIX_LEN])
}

// ============================================================================
// MediaReference
// ============================================================================

/// Where an ingested binary can be loaded from: a remote URL or an inline
/// data URI. Both are used the same way (e.g. as an `src` attribute).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<MediaReference> for Value {
    fn from(reference: MediaReference) -> Self {
        Value::String(reference.0)
    }
}
