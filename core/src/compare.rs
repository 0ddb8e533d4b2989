//! Typed comparison of a column value against a filter literal.
//!
//! Both sides arrive as text. They are cast to the comparison domain of
//! the column's declared type and ordered there, so `'10' > '9'` holds for
//! an `integer` column while it does not for a `text` one.

use shared::subscription::FilterOp;
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
  #[error("unsupported column type '{0}'")]
  UnsupportedType(String),

  #[error("cannot cast '{literal}' to {type_name}")]
  CastError { type_name: String, literal: String },
}

/// Comparison domain a declared column type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
  Text,
  Integer,
  Float,
  Boolean,
  Uuid,
}

impl TypeFamily {
  /// Classify a declared type name. Type modifiers (`varchar(255)`,
  /// `numeric(10,2)`) are ignored; arrays and every other type are
  /// unsupported.
  pub fn of(declared_type: &str) -> Option<Self> {
    let normalized = normalize_type(declared_type);
    let family = match normalized.as_str() {
      "text" | "varchar" | "character varying" | "character" | "char" | "bpchar" | "name"
      | "citext" => TypeFamily::Text,
      "bigint" | "integer" | "int" | "smallint" | "int2" | "int4" | "int8" | "serial"
      | "bigserial" | "smallserial" | "serial2" | "serial4" | "serial8" => TypeFamily::Integer,
      "real" | "double precision" | "float4" | "float8" | "numeric" | "decimal" => {
        TypeFamily::Float
      }
      "boolean" | "bool" => TypeFamily::Boolean,
      "uuid" => TypeFamily::Uuid,
      _ => return None,
    };
    Some(family)
  }
}

fn normalize_type(declared_type: &str) -> String {
  let lowered = declared_type.trim().to_ascii_lowercase();
  let base = match lowered.find('(') {
    Some(pos) => {
      // keep any suffix: `time(3) with time zone`
      let tail = lowered[pos..].find(')').map(|end| &lowered[pos + end + 1..]).unwrap_or("");
      format!("{}{}", lowered[..pos].trim_end(), tail)
    }
    None => lowered,
  };
  base.trim().to_string()
}

/// Evaluate `lhs <op> rhs` in the domain of `declared_type`.
///
/// `lhs` is the column value, `rhs` the subscription literal.
pub fn compare(
  op: FilterOp,
  declared_type: &str,
  lhs: &str,
  rhs: &str,
) -> Result<bool, CompareError> {
  let family = TypeFamily::of(declared_type)
    .ok_or_else(|| CompareError::UnsupportedType(declared_type.to_string()))?;

  let ordering = match family {
    TypeFamily::Text => lhs.as_bytes().cmp(rhs.as_bytes()),
    TypeFamily::Integer => {
      cast_int(declared_type, lhs)?.cmp(&cast_int(declared_type, rhs)?)
    }
    TypeFamily::Float => cast_float(declared_type, lhs)?.total_cmp(&cast_float(declared_type, rhs)?),
    TypeFamily::Boolean => cast_bool(declared_type, lhs)?.cmp(&cast_bool(declared_type, rhs)?),
    TypeFamily::Uuid => cast_uuid(declared_type, lhs)?.cmp(&cast_uuid(declared_type, rhs)?),
  };

  Ok(apply(op, ordering))
}

fn apply(op: FilterOp, ordering: Ordering) -> bool {
  match op {
    FilterOp::Eq => ordering == Ordering::Equal,
    FilterOp::Neq => ordering != Ordering::Equal,
    FilterOp::Lt => ordering == Ordering::Less,
    FilterOp::Lte => ordering != Ordering::Greater,
    FilterOp::Gt => ordering == Ordering::Greater,
    FilterOp::Gte => ordering != Ordering::Less,
  }
}

fn cast_error(type_name: &str, literal: &str) -> CompareError {
  CompareError::CastError {
    type_name: type_name.to_string(),
    literal: literal.to_string(),
  }
}

fn cast_int(type_name: &str, literal: &str) -> Result<i64, CompareError> {
  literal
    .trim()
    .parse::<i64>()
    .map_err(|_| cast_error(type_name, literal))
}

fn cast_float(type_name: &str, literal: &str) -> Result<f64, CompareError> {
  literal
    .trim()
    .parse::<f64>()
    .map_err(|_| cast_error(type_name, literal))
}

fn cast_bool(type_name: &str, literal: &str) -> Result<bool, CompareError> {
  match literal.trim().to_ascii_lowercase().as_str() {
    "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
    "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
    _ => Err(cast_error(type_name, literal)),
  }
}

fn cast_uuid(type_name: &str, literal: &str) -> Result<u128, CompareError> {
  Uuid::parse_str(literal.trim())
    .map(|u| u.as_u128())
    .map_err(|_| cast_error(type_name, literal))
}
