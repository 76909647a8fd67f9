//! Error types for schema construction and for encode/decode runs.
//!
//! Construction problems surface as [SchemaError]. Runtime failures carry an
//! [ErrorKind] wrapped in a [CodecError], which accumulates the field path as
//! it unwinds out of nested records.

use thiserror::Error;

use crate::encoding::TextError;
use crate::mapper::MapError;
use crate::value::Value;

/// An ill-formed schema: rejected when compiling a schema, or at runtime when
/// a dynamic factory produces something invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("integer descriptors are limited to 64 bits, got {0}")]
    WidthTooLarge(usize),

    #[error("literal value does not fit its descriptor: {detail}")]
    BadLiteral { detail: String },

    #[error("default value for field {field:?} does not fit its descriptor: {detail}")]
    BadDefault { field: String, detail: String },

    #[error("enum variant {label:?} = {value} does not fit in {bits} bits")]
    EnumVariantWidth {
        label: String,
        value: i64,
        bits: usize,
    },

    #[error("duplicate enum label {0:?}")]
    DuplicateEnumLabel(String),

    #[error("duplicate field name {0:?}")]
    DuplicateField(String),

    #[error("unknown field {0:?}")]
    UnknownField(String),

    #[error("missing value for field {0:?}")]
    MissingValue(String),

    #[error("field {0:?} is not available in the partial record")]
    FieldUnavailable(String),

    #[error("field {field:?} is not a {expected}")]
    AccessMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("reordered schemas only support whole-buffer decoding")]
    ReorderUnsupported,

    #[error("nested schemas cannot carry a bit reordering")]
    NestedReorder,

    #[error("reorder index {0} is out of bounds")]
    ReorderIndex(usize),

    #[error("duplicate reorder index {0}")]
    ReorderDuplicate(usize),
}

/// What went wrong during an encode or decode, before path framing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("unexpected end of stream: needed {needed} bits, {remaining} remaining")]
    EndOfStream { needed: usize, remaining: usize },

    #[error("{remaining} bits left over after decoding")]
    TrailingBits { remaining: usize },

    #[error("consumed {bit_pos} bits, which is not byte aligned")]
    UnalignedConsumption { bit_pos: usize },

    #[error("encoded output is {bits} bits, which is not byte aligned")]
    UnalignedOutput { bits: usize },

    #[error("value {value} does not fit in {bits} bits")]
    Range { value: i128, bits: usize },

    #[error("expected length {expected}, got {got}")]
    Length { expected: usize, got: usize },

    #[error("expected literal {expected:?}, got {got:?}")]
    LiteralMismatch { expected: Value, got: Value },

    #[error("no enum variant matches {0}")]
    EnumOutOfRange(i64),

    #[error("unknown enum label {0:?}")]
    UnknownEnumLabel(String),

    #[error(transparent)]
    Encoding(#[from] TextError),

    #[error(transparent)]
    Mapper(#[from] MapError),

    #[error("remaining-bits dynamic fields cannot encode {0} values")]
    UnsupportedDynamicEncode(&'static str),

    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("missing value for field {0:?}")]
    MissingField(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn location(record: &Option<String>, path: &[String]) -> String {
    match record {
        Some(name) if path.is_empty() => name.clone(),
        Some(name) => format!("{}.{}", name, path.join(".")),
        None => "<stream>".to_string(),
    }
}

/// A decode or encode failure: the kind, the absolute field path, and the bit
/// position in the stream where it was raised.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {kind} (at bit {bit_pos})", location(.record, .path))]
pub struct CodecError {
    pub kind: ErrorKind,
    /// Name of the outermost record entered so far.
    pub record: Option<String>,
    /// Field names from the outermost record down to the failing field.
    pub path: Vec<String>,
    pub bit_pos: usize,
}

impl CodecError {
    pub(crate) fn at(kind: impl Into<ErrorKind>, bit_pos: usize) -> Self {
        CodecError {
            kind: kind.into(),
            record: None,
            path: Vec::new(),
            bit_pos,
        }
    }

    /// Prepends a `(record, field)` segment while unwinding out of a record.
    pub(crate) fn push(mut self, record: &str, field: &str) -> Self {
        self.record = Some(record.to_string());
        self.path.insert(0, field.to_string());
        self
    }

    /// Names the record for stream-level failures that have no field path.
    pub(crate) fn tagged(mut self, record: &str) -> Self {
        if self.record.is_none() {
            self.record = Some(record.to_string());
        }
        self
    }
}
