use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// The kind of row change carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Insert,
    Update,
    Delete,
    Truncate,
}

impl Action {
    /// Returns the uppercase tag used in the output record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Truncate => "TRUNCATE",
        }
    }

    /// Parse from a decoder tag (`I`, `U`, `D`, `T`) or a full name.
    pub fn from_str_tag(s: &str) -> Option<Self> {
        match s {
            "I" | "insert" | "INSERT" => Some(Action::Insert),
            "U" | "update" | "UPDATE" => Some(Action::Update),
            "D" | "delete" | "DELETE" => Some(Action::Delete),
            "T" | "truncate" | "TRUNCATE" => Some(Action::Truncate),
            _ => None,
        }
    }

    /// Whether a row identity is needed to deliver this action.
    ///
    /// A truncate affects the whole table and has no row to identify.
    pub fn requires_identity(&self) -> bool {
        !matches!(self, Action::Truncate)
    }

    /// Whether the row identity lives in `record` (new row) rather than
    /// `old_record`.
    pub fn reads_new_row(&self) -> bool {
        matches!(self, Action::Insert | Action::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a table within a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    /// PostgreSQL schema name (e.g. `"public"`).
    pub schema: String,
    /// Table name (e.g. `"note"`).
    pub table: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Returns the fully-qualified name: `schema.table`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Parse from `"schema.table"` format. Both parts must be non-empty.
    pub fn from_qualified(s: &str) -> Option<Self> {
        let (schema, table) = s.split_once('.')?;
        if schema.is_empty() || table.is_empty() {
            return None;
        }
        Some(Self::new(schema, table))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Describes one column of the changed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    /// Type name as reported by the decoder (e.g. `"text"`, `"bigint"`).
    #[serde(rename = "type")]
    pub type_name: String,
    /// PostgreSQL type OID, when the decoder reports it.
    #[serde(default, skip_serializing)]
    pub type_oid: Option<u32>,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            type_oid: None,
        }
    }
}

/// A single named value within a row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub name: String,
    /// JSON representation of the value; `Value::Null` is SQL NULL.
    pub value: Value,
}

/// An ordered column → value mapping.
///
/// Column order follows the decoder, so serialization is deterministic.
/// Serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    pub columns: Vec<ColumnValue>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. A repeated name replaces the earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.value = value,
            None => self.columns.push(ColumnValue { name, value }),
        }
    }

    /// Builder form of [`RowData::insert`].
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    /// Returns the value of a column as a text literal, or `None` if the
    /// column is missing or NULL.
    pub fn get_text(&self, name: &str) -> Option<Cow<'_, str>> {
        match self.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Keep only the columns accepted by `keep`, preserving order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.columns.retain(|c| keep(&c.name));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for RowData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for col in &self.columns {
            map.serialize_entry(&col.name, &col.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = RowData;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RowData, A::Error> {
                let mut row = RowData::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    row.insert(name, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}
