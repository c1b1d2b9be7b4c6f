//! Owned captured values for bound parameters and call arguments.
//!
//! Records delivered to listeners must own what they report, so bound
//! parameters are captured as plain [`ParamValue`]s rather than opaque
//! `ToSql` trait objects. The Postgres bridge that turns a `ParamValue`
//! back into a wire parameter lives in the `pg` module.

use std::fmt;

/// A captured parameter or method-argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (widened to 64 bits on capture)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Raw byte value
    Bytes(Vec<u8>),
}

impl ParamValue {
    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "NULL"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "'{v}'"),
            ParamValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for ParamValue {
    fn from(v: i16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_widen_integers() {
        assert_eq!(ParamValue::from(7_i16), ParamValue::Int(7));
        assert_eq!(ParamValue::from(7_i32), ParamValue::Int(7));
        assert_eq!(ParamValue::from(7_i64), ParamValue::Int(7));
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(ParamValue::from(None::<i64>), ParamValue::Null);
        assert_eq!(ParamValue::from(Some("x")), ParamValue::Text("x".into()));
        assert!(ParamValue::Null.is_null());
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(ParamValue::Null.to_string(), "NULL");
        assert_eq!(ParamValue::Text("a".into()).to_string(), "'a'");
        assert_eq!(ParamValue::Bytes(vec![1, 2, 3]).to_string(), "<3 bytes>");
    }
}
