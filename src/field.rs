//! The field descriptor algebra: primitive descriptors, combinators, and the
//! builder functions used to assemble schemas.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::encoding::Encoding;
use crate::errors::SchemaError;
use crate::mapper::ValueMapper;
use crate::schema::Schema;
use crate::value::{Record, Value};

/// Opaque user context threaded through one encode or decode call. Factories
/// may downcast it; the engine never inspects it.
pub type Ctx<'a> = Option<&'a dyn Any>;

/// Factory for a dynamic field: receives the partial record and the context,
/// returns the descriptor to apply, or `None` for the zero-width absent value.
pub type DynFactory = Arc<
    dyn Fn(&Record, Option<&dyn Any>) -> Result<Option<Desc>, SchemaError> + Send + Sync,
>;

/// Factory for a dynamic field that also sees the remaining bit count.
pub type DynRemFactory = Arc<
    dyn Fn(&Record, usize, Option<&dyn Any>) -> Result<Option<Desc>, SchemaError> + Send + Sync,
>;

/// Computes a list element count from the partial record.
pub type CountFn = Arc<dyn Fn(&Record) -> Result<usize, SchemaError> + Send + Sync>;

/// Number of elements in a list field.
#[derive(Clone)]
pub enum Count {
    Fixed(usize),
    Dynamic(CountFn),
}

/// Variants of an integer-backed enum descriptor.
#[derive(Clone)]
pub struct EnumDef {
    pub(crate) bits: usize,
    pub(crate) signed: bool,
    pub(crate) variants: Arc<Vec<(String, i64)>>,
}

impl EnumDef {
    pub(crate) fn label_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(l, _)| l.as_str())
    }

    pub(crate) fn value_of(&self, label: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }
}

/// A field descriptor: one decode/encode/length triple.
///
/// Descriptors are immutable data; combinators store their children by value,
/// forming a finite tree.
#[derive(Clone)]
pub enum Desc {
    /// Raw bit string of the given width.
    Bits(usize),
    /// Unsigned big-endian integer of the given width.
    Uint(usize),
    /// Two's-complement signed integer of the given width.
    Int(usize),
    /// One bit, 1 = true.
    Bool,
    /// Fixed-width byte string (width in bytes).
    Bytes(usize),
    /// Fixed-width text (width in bytes): encoded then zero-padded on the
    /// right, trailing NULs stripped on decode.
    Str(usize, Encoding),
    /// The absent value: zero bits.
    None,
    /// Integer-backed enum; decodes to the variant label.
    Enum(EnumDef),
    /// Constrains the inner descriptor to a single constant value.
    Lit(Box<Desc>, Value),
    /// Fixed or record-driven repetition of the inner descriptor.
    List(Box<Desc>, Count),
    /// Applies a [ValueMapper] over the inner descriptor.
    Map(Box<Desc>, Arc<dyn ValueMapper>),
    /// Nests another record, run on the same stream.
    Bitfield(Schema),
    /// Descriptor chosen at run time from the partial record.
    Dyn(DynFactory),
    /// Descriptor chosen at run time from the partial record and the
    /// remaining bit count.
    DynRem(DynRemFactory),
}

impl Desc {
    /// The statically known bit width, or `None` when it depends on the data.
    pub fn length(&self) -> Option<usize> {
        match self {
            Desc::Bits(n) | Desc::Uint(n) | Desc::Int(n) => Some(*n),
            Desc::Bool => Some(1),
            Desc::Bytes(k) | Desc::Str(k, _) => Some(k * 8),
            Desc::None => Some(0),
            Desc::Enum(e) => Some(e.bits),
            Desc::Lit(inner, _) | Desc::Map(inner, _) => inner.length(),
            Desc::List(inner, Count::Fixed(n)) => inner.length().map(|l| l * n),
            Desc::List(_, Count::Dynamic(_)) => None,
            Desc::Bitfield(schema) => schema.length(),
            Desc::Dyn(_) | Desc::DynRem(_) => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Desc::Bits(_) => "bits",
            Desc::Uint(_) => "uint",
            Desc::Int(_) => "int",
            Desc::Bool => "bool",
            Desc::Bytes(_) => "bytes",
            Desc::Str(..) => "str",
            Desc::None => "none",
            Desc::Enum(_) => "enum",
            Desc::Lit(..) => "literal",
            Desc::List(..) => "list",
            Desc::Map(..) => "mapped",
            Desc::Bitfield(_) => "record",
            Desc::Dyn(_) | Desc::DynRem(_) => "dynamic",
        }
    }

    /// Checks the descriptor tree for shapes the engine cannot drive. Applied
    /// when a schema is compiled and again to every factory-produced
    /// descriptor.
    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        match self {
            Desc::Uint(n) | Desc::Int(n) if *n > 64 => Err(SchemaError::WidthTooLarge(*n)),
            Desc::Uint(_) | Desc::Int(_) | Desc::Bits(_) | Desc::Bool | Desc::Bytes(_)
            | Desc::Str(..) | Desc::None | Desc::Dyn(_) | Desc::DynRem(_) => Ok(()),
            Desc::Enum(e) => {
                if e.bits > 64 {
                    return Err(SchemaError::WidthTooLarge(e.bits));
                }
                for (i, (label, value)) in e.variants.iter().enumerate() {
                    if e.variants[..i].iter().any(|(l, _)| l == label) {
                        return Err(SchemaError::DuplicateEnumLabel(label.clone()));
                    }
                    let fits = if e.signed {
                        int_fits(*value, e.bits)
                    } else {
                        *value >= 0 && uint_fits(*value as u64, e.bits)
                    };
                    if !fits {
                        return Err(SchemaError::EnumVariantWidth {
                            label: label.clone(),
                            value: *value,
                            bits: e.bits,
                        });
                    }
                }
                Ok(())
            }
            Desc::Lit(inner, expected) => {
                inner.validate()?;
                check_value(inner, expected)
                    .map_err(|detail| SchemaError::BadLiteral { detail })
            }
            Desc::List(inner, _) => inner.validate(),
            Desc::Map(inner, _) => inner.validate(),
            Desc::Bitfield(schema) => {
                if !schema.reorder().is_empty() {
                    return Err(SchemaError::NestedReorder);
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn uint_fits(value: u64, bits: usize) -> bool {
    bits >= 64 || value >> bits == 0
}

pub(crate) fn int_fits(value: i64, bits: usize) -> bool {
    match bits {
        0 => value == 0,
        b if b >= 64 => true,
        b => {
            let bound = 1i64 << (b - 1);
            value >= -bound && value < bound
        }
    }
}

/// Checks that a constant (a literal or a default) is acceptable to a
/// descriptor. Opaque shapes (mapped, dynamic) accept anything.
pub(crate) fn check_value(desc: &Desc, value: &Value) -> Result<(), String> {
    let fail = || {
        Err(format!(
            "{} value against a {} descriptor",
            value.type_name(),
            desc.kind_name()
        ))
    };

    match (desc, value) {
        (Desc::Uint(n), Value::Uint(v)) => {
            if uint_fits(*v, *n) {
                Ok(())
            } else {
                Err(format!("{v} does not fit in {n} bits"))
            }
        }
        (Desc::Int(n), Value::Int(v)) => {
            if int_fits(*v, *n) {
                Ok(())
            } else {
                Err(format!("{v} does not fit in {n} bits"))
            }
        }
        (Desc::Bool, Value::Bool(_)) => Ok(()),
        (Desc::Bits(n), Value::Bits(v)) => {
            if v.len() == *n {
                Ok(())
            } else {
                Err(format!("expected {n} bits, got {}", v.len()))
            }
        }
        (Desc::Bytes(k), Value::Bytes(v)) => {
            if v.len() == *k {
                Ok(())
            } else {
                Err(format!("expected {k} bytes, got {}", v.len()))
            }
        }
        (Desc::Str(k, enc), Value::Str(s)) => {
            let encoded = enc.encode(s).map_err(|e| e.to_string())?;
            if encoded.len() <= *k {
                Ok(())
            } else {
                Err(format!(
                    "expected at most {k} bytes, got {}",
                    encoded.len()
                ))
            }
        }
        (Desc::None, Value::None) => Ok(()),
        (Desc::Enum(e), Value::Str(label)) => {
            if e.value_of(label).is_some() {
                Ok(())
            } else {
                Err(format!("unknown enum label {label:?}"))
            }
        }
        (Desc::Lit(_, expected), v) => {
            if v == expected {
                Ok(())
            } else {
                Err(format!("expected {expected:?}, got {v:?}"))
            }
        }
        (Desc::List(inner, count), Value::List(items)) => {
            if let Count::Fixed(n) = count {
                if items.len() != *n {
                    return Err(format!("expected {n} items, got {}", items.len()));
                }
            }
            for item in items {
                check_value(inner, item)?;
            }
            Ok(())
        }
        (Desc::Bitfield(_), Value::Record(_)) => Ok(()),
        (Desc::Map(..), _) | (Desc::Dyn(_), _) | (Desc::DynRem(_), _) => Ok(()),
        _ => fail(),
    }
}

impl fmt::Debug for Desc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Desc::Bits(n) => write!(f, "bits({n})"),
            Desc::Uint(n) => write!(f, "uint({n})"),
            Desc::Int(n) => write!(f, "int({n})"),
            Desc::Bool => write!(f, "bool"),
            Desc::Bytes(k) => write!(f, "bytes({k})"),
            Desc::Str(k, enc) => write!(f, "str({k}, {})", enc.name()),
            Desc::None => write!(f, "none"),
            Desc::Enum(e) => write!(f, "enum({}, {} variants)", e.bits, e.variants.len()),
            Desc::Lit(inner, expected) => write!(f, "lit({inner:?}, {expected:?})"),
            Desc::List(inner, Count::Fixed(n)) => write!(f, "list({inner:?}, {n})"),
            Desc::List(inner, Count::Dynamic(_)) => write!(f, "list({inner:?}, dynamic)"),
            Desc::Map(inner, _) => write!(f, "mapped({inner:?})"),
            Desc::Bitfield(schema) => write!(f, "bitfield({})", schema.name()),
            Desc::Dyn(_) => write!(f, "dynamic"),
            Desc::DynRem(_) => write!(f, "dynamic(remaining)"),
        }
    }
}

/// An unsigned integer of `bits` bits.
pub fn uint(bits: usize) -> Desc {
    Desc::Uint(bits)
}

/// A two's-complement signed integer of `bits` bits.
pub fn int(bits: usize) -> Desc {
    Desc::Int(bits)
}

/// A single bit, 1 = true.
pub fn boolean() -> Desc {
    Desc::Bool
}

/// A fixed byte string of `n_bytes` bytes.
pub fn bytes(n_bytes: usize) -> Desc {
    Desc::Bytes(n_bytes)
}

/// A raw bit string of `bits` bits.
pub fn bits(bits: usize) -> Desc {
    Desc::Bits(bits)
}

/// UTF-8 text occupying exactly `n_bytes` bytes on the wire, zero-padded.
pub fn string(n_bytes: usize) -> Desc {
    Desc::Str(n_bytes, Encoding::Utf8)
}

/// Text with an explicit encoding.
pub fn string_with(n_bytes: usize, encoding: Encoding) -> Desc {
    Desc::Str(n_bytes, encoding)
}

/// The absent value: consumes and produces no bits. Most useful as a
/// dynamic-field result for optional fields.
pub fn none() -> Desc {
    Desc::None
}

/// An unsigned enum: decodes `bits` bits and yields the matching label.
pub fn uint_enum(bits: usize, variants: &[(&str, u64)]) -> Desc {
    Desc::Enum(EnumDef {
        bits,
        signed: false,
        variants: Arc::new(
            variants
                .iter()
                .map(|(l, v)| (l.to_string(), *v as i64))
                .collect(),
        ),
    })
}

/// A signed enum: like [uint_enum] but the raw value is sign-extended first.
pub fn int_enum(bits: usize, variants: &[(&str, i64)]) -> Desc {
    Desc::Enum(EnumDef {
        bits,
        signed: true,
        variants: Arc::new(
            variants
                .iter()
                .map(|(l, v)| (l.to_string(), *v))
                .collect(),
        ),
    })
}

/// Constrains `inner` to the single constant `value`.
pub fn lit(inner: Desc, value: impl Into<Value>) -> Desc {
    Desc::Lit(Box::new(inner), value.into())
}

/// An unsigned integer literal. The width cannot be inferred from a number,
/// so it is explicit.
pub fn lit_uint(bits: usize, value: u64) -> Desc {
    lit(uint(bits), Value::Uint(value))
}

/// A signed integer literal with an explicit width.
pub fn lit_int(bits: usize, value: i64) -> Desc {
    lit(int(bits), Value::Int(value))
}

/// A byte-string literal; the width is the literal's length.
pub fn lit_bytes(value: &[u8]) -> Desc {
    lit(bytes(value.len()), Value::Bytes(value.to_vec()))
}

/// A text literal; the width is the UTF-8 encoded length.
pub fn lit_str(value: &str) -> Desc {
    lit(string(value.len()), Value::Str(value.to_string()))
}

/// Exactly `count` repetitions of `inner`.
pub fn list(inner: Desc, count: usize) -> Desc {
    Desc::List(Box::new(inner), Count::Fixed(count))
}

/// A repetition whose count is computed from earlier fields.
pub fn list_dyn<F>(inner: Desc, count: F) -> Desc
where
    F: Fn(&Record) -> Result<usize, SchemaError> + Send + Sync + 'static,
{
    Desc::List(Box::new(inner), Count::Dynamic(Arc::new(count)))
}

/// Applies a [ValueMapper] over `inner`: `forward` after decode, `back`
/// before encode.
pub fn mapped<M>(inner: Desc, mapper: M) -> Desc
where
    M: ValueMapper + 'static,
{
    Desc::Map(Box::new(inner), Arc::new(mapper))
}

/// Nests another record as a single field, decoded from the same stream.
pub fn bitfield(schema: &Schema) -> Desc {
    Desc::Bitfield(schema.clone())
}

/// A field whose descriptor is chosen at run time from the already-decoded
/// sibling fields. Returning `Ok(None)` makes the field the absent value.
pub fn dynamic<F>(factory: F) -> Desc
where
    F: Fn(&Record, Option<&dyn Any>) -> Result<Option<Desc>, SchemaError>
        + Send
        + Sync
        + 'static,
{
    Desc::Dyn(Arc::new(factory))
}

/// Like [dynamic], but the factory also sees the remaining bit count. Only
/// self-describing values (records, bool, bytes, the absent value) can be
/// encoded through such a field.
pub fn dynamic_rem<F>(factory: F) -> Desc
where
    F: Fn(&Record, usize, Option<&dyn Any>) -> Result<Option<Desc>, SchemaError>
        + Send
        + Sync
        + 'static,
{
    Desc::DynRem(Arc::new(factory))
}
