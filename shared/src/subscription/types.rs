use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::event::TableId;

/// Comparison operator of a user-defined filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        match s {
            "eq" | "=" => Some(FilterOp::Eq),
            "neq" | "!=" | "<>" => Some(FilterOp::Neq),
            "lt" | "<" => Some(FilterOp::Lt),
            "lte" | "<=" => Some(FilterOp::Lte),
            "gt" | ">" => Some(FilterOp::Gt),
            "gte" | ">=" => Some(FilterOp::Gte),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{column, operator, literal}` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(alias = "column_name")]
    pub column: String,
    pub op: FilterOp,
    /// Literal in text form; cast to the column's type at evaluation time.
    pub value: String,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// Who is asking: a database role plus the claims row policies may read.
///
/// Claims live in a sorted map so that two principals with the same
/// claims always serialize to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub role: String,
    #[serde(default)]
    pub claims: BTreeMap<String, Value>,
}

impl Principal {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            claims: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    /// Build from a JWT-style claims object. The role is taken from the
    /// `role` claim; returns `None` when it is missing or not a string.
    pub fn from_claims(claims: &Value) -> Option<Self> {
        let obj = claims.as_object()?;
        let role = obj.get("role")?.as_str()?.to_string();
        Some(Self {
            role,
            claims: obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    /// The claims as a JSON object, in the shape row policies read them
    /// (`request.jwt.claims`). Always carries the role.
    pub fn claims_json(&self) -> Value {
        let mut obj: serde_json::Map<String, Value> = self
            .claims
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        obj.insert("role".to_string(), Value::String(self.role.clone()));
        Value::Object(obj)
    }

    /// Stable identity of this principal: role plus claims, serialized
    /// with sorted keys.
    pub fn fingerprint(&self) -> String {
        let claims = serde_json::to_string(&self.claims).unwrap_or_default();
        format!("{}:{}", self.role, claims)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.claims.get("sub").and_then(Value::as_str) {
            Some(sub) => write!(f, "{}({})", self.role, sub),
            None => f.write_str(&self.role),
        }
    }
}

/// A standing interest in changes to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Opaque identifier reported in the output.
    pub id: Uuid,
    /// Row key of the subscription in the registry table. Changes to the
    /// registry are matched on this key.
    #[serde(default)]
    pub key: i64,
    pub entity: TableId,
    pub principal: Principal,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Subscription {
    pub fn new(id: Uuid, entity: TableId, principal: Principal) -> Self {
        Self {
            id,
            key: 0,
            entity,
            principal,
            filters: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: i64) -> Self {
        self.key = key;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn watches(&self, table: &TableId) -> bool {
        &self.entity == table
    }
}
