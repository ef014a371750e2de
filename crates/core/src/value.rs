//! Literal value definitions.
//!
//! Values only appear in plans as literals; the planner needs their type and
//! their SQL text form, nothing else.

use crate::error::{Error, Result};
use crate::types::DataType;
use std::fmt;

/// A literal value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// NULL
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Int8(i64),
    /// UTF-8 string
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Decimal in canonical text form (digits with an optional point)
    Decimal(String),
    /// UUID bytes
    Uuid([u8; 16]),
}

impl Value {
    /// Creates a decimal value from its text form.
    pub fn decimal(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let unsigned = text.strip_prefix('-').unwrap_or(&text);
        let mut parts = unsigned.splitn(2, '.');
        let whole = parts.next().unwrap_or("");
        let frac = parts.next().unwrap_or("");
        let valid = !(whole.is_empty() && frac.is_empty())
            && whole.chars().all(|c| c.is_ascii_digit())
            && frac.chars().all(|c| c.is_ascii_digit());
        if !valid {
            return Err(Error::invalid_type(format!("invalid decimal: {}", text)));
        }
        Ok(Value::Decimal(text))
    }

    /// Returns the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::NULL,
            Value::Boolean(_) => DataType::BOOL,
            Value::Int8(_) => DataType::INT8,
            Value::Text(_) => DataType::TEXT,
            Value::Bytes(_) => DataType::BYTEA,
            Value::Uuid(_) => DataType::UUID,
            Value::Decimal(text) => {
                let unsigned = text.trim_start_matches('-');
                let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
                let precision = (whole.len() + frac.len()).max(1) as u16;
                let scale = frac.len() as u16;
                DataType::decimal(precision, scale).unwrap_or(DataType::MAX_DECIMAL)
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Writes the value as a SQL literal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int8(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Bytes(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Decimal(text) => f.write_str(text),
            Value::Uuid(bytes) => {
                f.write_str("'")?;
                for (i, b) in bytes.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                f.write_str("'::uuid")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int8(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_data_type() {
        assert_eq!(Value::Int8(1).data_type(), DataType::INT8);
        assert_eq!(Value::Null.data_type(), DataType::NULL);
        assert_eq!(
            Value::decimal("12.50").unwrap().data_type(),
            DataType::decimal(4, 2).unwrap()
        );
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Value::from("it's").to_string(), "'it''s'");
        assert_eq!(Value::Bytes(vec![0x0a, 0xff]).to_string(), "0x0aff");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(
            Value::Uuid([
                0x12, 0x3e, 0x45, 0x67, 0xe8, 0x9b, 0x12, 0xd3, 0xa4, 0x56, 0x42, 0x66, 0x14,
                0x17, 0x40, 0x00
            ])
            .to_string(),
            "'123e4567-e89b-12d3-a456-426614174000'::uuid"
        );
    }

    #[test]
    fn test_invalid_decimal() {
        assert!(Value::decimal("1.2.3").is_err());
        assert!(Value::decimal("abc").is_err());
        assert!(Value::decimal("-0.5").is_ok());
    }

    #[test]
    fn test_value_from_impls() {
        assert_eq!(Value::from(Some(5i64)), Value::Int8(5));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from("x").as_str(), Some("x"));
    }
}
