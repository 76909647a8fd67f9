//! Runtime values produced by decoding and consumed by encoding.

use std::fmt;

use crate::errors::SchemaError;
use crate::schema::Schema;

/// A decoded or to-be-encoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(u64),
    Int(i64),
    Bool(bool),
    /// Mapper output (for example a scaled reading).
    Float(f64),
    Bytes(Vec<u8>),
    /// Text, and also enum variant labels.
    Str(String),
    /// A raw bit string.
    Bits(Vec<bool>),
    List(Vec<Value>),
    Record(Record),
    /// The absent value: zero bits on the wire.
    None,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "str",
            Value::Bits(_) => "bits",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::None => "none",
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// An ordered collection of named field values belonging to a schema.
///
/// During decoding this doubles as the partial record handed to dynamic
/// factories: a factory at position `i` sees exactly the fields `0..i-1`.
/// A record keeps a handle to its schema so that a record value is
/// self-describing when encoded through a remaining-bits dynamic field.
#[derive(Clone)]
pub struct Record {
    schema: Schema,
    values: Vec<(String, Value)>,
}

impl Record {
    pub(crate) fn new(schema: Schema) -> Self {
        Record {
            schema,
            values: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: String, value: Value) {
        self.values.push((name, value));
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The schema name, used in diagnostics.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn require(&self, name: &str) -> Result<&Value, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::FieldUnavailable(name.to_string()))
    }

    fn mismatch(name: &str, expected: &'static str) -> SchemaError {
        SchemaError::AccessMismatch {
            field: name.to_string(),
            expected,
        }
    }

    pub fn uint(&self, name: &str) -> Result<u64, SchemaError> {
        match self.require(name)? {
            Value::Uint(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "uint")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, SchemaError> {
        match self.require(name)? {
            Value::Int(v) => Ok(*v),
            Value::Uint(v) if *v <= i64::MAX as u64 => Ok(*v as i64),
            _ => Err(Self::mismatch(name, "int")),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, SchemaError> {
        match self.require(name)? {
            Value::Bool(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "bool")),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64, SchemaError> {
        match self.require(name)? {
            Value::Float(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "float")),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str, SchemaError> {
        match self.require(name)? {
            Value::Str(v) => Ok(v.as_str()),
            _ => Err(Self::mismatch(name, "str")),
        }
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8], SchemaError> {
        match self.require(name)? {
            Value::Bytes(v) => Ok(v.as_slice()),
            _ => Err(Self::mismatch(name, "bytes")),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[Value], SchemaError> {
        match self.require(name)? {
            Value::List(v) => Ok(v.as_slice()),
            _ => Err(Self::mismatch(name, "list")),
        }
    }

    pub fn record(&self, name: &str) -> Result<&Record, SchemaError> {
        match self.require(name)? {
            Value::Record(v) => Ok(v),
            _ => Err(Self::mismatch(name, "record")),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value:?}")?;
        }
        write!(f, ")")
    }
}
