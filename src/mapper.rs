//! Value mappers: user-supplied conversions between the wire value and a
//! domain value, applied by the `mapped` combinator.

use thiserror::Error;

use crate::value::Value;

/// A mapper failure, re-raised by the engine with the field path attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MapError(pub String);

impl MapError {
    pub fn new(detail: impl Into<String>) -> Self {
        MapError(detail.into())
    }
}

/// A pair of total conversions between a wire value and a domain value.
///
/// `forward` runs on decode (wire to domain), `back` runs on encode (domain
/// to wire). The engine treats both as opaque.
pub trait ValueMapper: Send + Sync {
    fn forward(&self, wire: Value) -> Result<Value, MapError>;
    fn back(&self, value: Value) -> Result<Value, MapError>;
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Uint(v) => Some(*v as f64),
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

fn round_to_int(value: f64) -> Result<Value, MapError> {
    if !value.is_finite() {
        return Err(MapError::new(format!("{value} is not a finite number")));
    }

    let rounded = value.round();
    if rounded < 0.0 {
        Ok(Value::Int(rounded as i64))
    } else {
        Ok(Value::Uint(rounded as u64))
    }
}

/// Scales an integer wire value into a float: `wire * by + offset`. Encoding
/// inverts with rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub by: f64,
    pub offset: f64,
}

impl Scale {
    pub fn new(by: f64) -> Self {
        Scale { by, offset: 0.0 }
    }

    pub fn with_offset(by: f64, offset: f64) -> Self {
        Scale { by, offset }
    }
}

impl ValueMapper for Scale {
    fn forward(&self, wire: Value) -> Result<Value, MapError> {
        match numeric(&wire) {
            Some(v) => Ok(Value::Float(v * self.by + self.offset)),
            None => Err(MapError::new(format!(
                "expected a numeric value, got {}",
                wire.type_name()
            ))),
        }
    }

    fn back(&self, value: Value) -> Result<Value, MapError> {
        match numeric(&value) {
            Some(v) => round_to_int((v - self.offset) / self.by),
            None => Err(MapError::new(format!(
                "expected a numeric value, got {}",
                value.type_name()
            ))),
        }
    }
}

/// Scales an integer wire value by an integer factor, staying integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntScale {
    pub by: i64,
}

impl IntScale {
    pub fn new(by: i64) -> Self {
        IntScale { by }
    }
}

impl ValueMapper for IntScale {
    fn forward(&self, wire: Value) -> Result<Value, MapError> {
        match wire {
            Value::Uint(v) if self.by >= 0 => v
                .checked_mul(self.by as u64)
                .map(Value::Uint)
                .ok_or_else(|| MapError::new("scaled value overflows")),
            Value::Uint(v) => (v as i64)
                .checked_mul(self.by)
                .map(Value::Int)
                .ok_or_else(|| MapError::new("scaled value overflows")),
            Value::Int(v) => v
                .checked_mul(self.by)
                .map(Value::Int)
                .ok_or_else(|| MapError::new("scaled value overflows")),
            other => Err(MapError::new(format!(
                "expected an integer value, got {}",
                other.type_name()
            ))),
        }
    }

    fn back(&self, value: Value) -> Result<Value, MapError> {
        if self.by == 0 {
            return Err(MapError::new("cannot divide by a zero scale"));
        }
        match numeric(&value) {
            Some(v) => round_to_int(v / self.by as f64),
            None => Err(MapError::new(format!(
                "expected a numeric value, got {}",
                value.type_name()
            ))),
        }
    }
}
