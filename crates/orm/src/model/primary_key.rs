//! Primary Key System - normalized key values used for identity and dictionaries
//!
//! Column values arrive as JSON. Two rows refer to the same record when their
//! keys normalize to the same [`PrimaryKey`]: numeric strings compare equal to
//! integers, and UUID strings compare case-insensitively.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Normalized primary or join key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryKey {
    /// Integer key
    Integer(i64),
    /// UUID key
    Uuid(Uuid),
    /// Any other string key
    String(String),
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimaryKey::Integer(id) => write!(f, "{}", id),
            PrimaryKey::Uuid(id) => write!(f, "{}", id),
            PrimaryKey::String(id) => write!(f, "{}", id),
        }
    }
}

impl PrimaryKey {
    /// Normalize a column value; null, arrays and objects carry no key
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) => None,
            Value::Bool(flag) => Some(PrimaryKey::Integer(i64::from(*flag))),
            Value::Number(number) => {
                if let Some(id) = number.as_i64() {
                    Some(PrimaryKey::Integer(id))
                } else if let Some(id) = number.as_u64() {
                    Some(PrimaryKey::String(id.to_string()))
                } else {
                    number.as_f64().map(|f| PrimaryKey::Integer(f.trunc() as i64))
                }
            }
            Value::String(text) => Some(Self::from_str_key(text)),
        }
    }

    fn from_str_key(text: &str) -> Self {
        if is_canonical_integer(text) {
            if let Ok(id) = text.parse::<i64>() {
                return PrimaryKey::Integer(id);
            }
        }
        match Uuid::parse_str(text) {
            Ok(id) => PrimaryKey::Uuid(id),
            Err(_) => PrimaryKey::String(text.to_string()),
        }
    }

    /// Value suitable for binding into a query
    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Integer(id) => Value::from(*id),
            PrimaryKey::Uuid(id) => Value::String(id.to_string()),
            PrimaryKey::String(id) => Value::String(id.clone()),
        }
    }

    /// Extract as i64 if this is an Integer primary key
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrimaryKey::Integer(id) => Some(*id),
            _ => None,
        }
    }

    /// Extract as UUID if this is a UUID primary key
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            PrimaryKey::Uuid(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(id: i64) -> Self {
        PrimaryKey::Integer(id)
    }
}

impl From<Uuid> for PrimaryKey {
    fn from(id: Uuid) -> Self {
        PrimaryKey::Uuid(id)
    }
}

impl From<&str> for PrimaryKey {
    fn from(id: &str) -> Self {
        PrimaryKey::from_str_key(id)
    }
}

/// Decimal digits with an optional sign and no leading zeros
fn is_canonical_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
        && text != "-0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings_match_integers() {
        assert_eq!(PrimaryKey::from_value(&json!("42")), Some(PrimaryKey::Integer(42)));
        assert_eq!(PrimaryKey::from_value(&json!(42)), Some(PrimaryKey::Integer(42)));
        assert_eq!(
            PrimaryKey::from_value(&json!("042")),
            Some(PrimaryKey::String("042".into()))
        );
    }

    #[test]
    fn test_uuid_keys_ignore_case() {
        let upper = PrimaryKey::from_value(&json!("67E55044-10B1-426F-9247-BB680E5FE0C8"));
        let lower = PrimaryKey::from_value(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(matches!(upper, Some(PrimaryKey::Uuid(_))));
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_null_has_no_key() {
        assert_eq!(PrimaryKey::from_value(&Value::Null), None);
        assert_eq!(PrimaryKey::from_value(&json!([1])), None);
    }

    #[test]
    fn test_to_value() {
        assert_eq!(PrimaryKey::Integer(7).to_value(), json!(7));
        assert_eq!(PrimaryKey::from("abc").to_value(), json!("abc"));
    }
}
