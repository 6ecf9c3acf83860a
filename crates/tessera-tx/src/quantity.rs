//! Numeric fields as the payload service sends them.
//!
//! Quantities arrive as JSON numbers, decimal strings or `0x` hex strings
//! depending on the endpoint. All three decode to the same integer.

use crate::TxError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a quantity held in a JSON value.
pub fn parse_u128(value: &Value) -> Result<u128, TxError> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(v as u128)
            } else {
                Err(TxError::Parse(format!("quantity {n} is not a non-negative integer")))
            }
        }
        Value::String(s) => parse_str(s),
        Value::Null => Ok(0),
        other => Err(TxError::Parse(format!("unexpected quantity {other}"))),
    }
}

/// Parse a quantity text: decimal, or hex with a `0x` prefix.
pub fn parse_str(s: &str) -> Result<u128, TxError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return Ok(0);
        }
        u128::from_str_radix(hex, 16).map_err(|e| TxError::Parse(format!("{s}: {e}")))
    } else {
        s.parse::<u128>().map_err(|e| TxError::Parse(format!("{s}: {e}")))
    }
}

pub fn parse_u64(value: &Value) -> Result<u64, TxError> {
    let v = parse_u128(value)?;
    u64::try_from(v).map_err(|_| TxError::Parse(format!("quantity {v} exceeds u64")))
}

/// serde adapter for `u128` quantity fields.
pub fn de_u128<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_u128(&value).map_err(serde::de::Error::custom)
}

/// serde adapter for `u64` quantity fields.
pub fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_u64(&value).map_err(serde::de::Error::custom)
}

/// Minimal big-endian bytes of an integer; zero is empty.
pub fn trim_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quantity_forms() {
        assert_eq!(parse_u128(&json!(21000)).unwrap(), 21000);
        assert_eq!(parse_u128(&json!("21000")).unwrap(), 21000);
        assert_eq!(parse_u128(&json!("0x5208")).unwrap(), 21000);
        assert_eq!(parse_u128(&json!("0x")).unwrap(), 0);
        assert_eq!(parse_u128(&json!(null)).unwrap(), 0);
        assert_eq!(
            parse_u128(&json!("1000000000000000000000")).unwrap(),
            1_000_000_000_000_000_000_000
        );
    }

    #[test]
    fn test_quantity_rejects_garbage() {
        assert!(parse_u128(&json!(-1)).is_err());
        assert!(parse_u128(&json!(1.5)).is_err());
        assert!(parse_u128(&json!("ten")).is_err());
        assert!(parse_u128(&json!([1])).is_err());
        assert!(parse_u64(&json!("0x10000000000000000")).is_err());
    }

    #[test]
    fn test_trim_be() {
        assert!(trim_be(0).is_empty());
        assert_eq!(trim_be(1), vec![1]);
        assert_eq!(trim_be(0x0400), vec![4, 0]);
    }
}
