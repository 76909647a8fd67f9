//! Schema: a named, ordered list of field descriptors, compiled once and then
//! driven symmetrically by the encode and decode walks.

use std::sync::Arc;

use crate::bits;
use crate::errors::{CodecError, ErrorKind, SchemaError};
use crate::field::{check_value, int_fits, uint_fits, Count, Ctx, Desc};
use crate::stream::{BitReader, BitWriter};
use crate::value::{Record, Value};

/// One named field of a schema, with an optional default substituted when a
/// record omits the field at encode time.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub desc: Desc,
    pub default: Option<Value>,
}

/// A named field with no default.
pub fn field(name: &str, desc: Desc) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        desc,
        default: None,
    }
}

/// A named field with a default value.
pub fn field_default(name: &str, desc: Desc, default: impl Into<Value>) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        desc,
        default: Some(default.into()),
    }
}

/// A compiled schema. Use [Schema::compile] to build one, then
/// [encode](Schema::encode) / [decode_exact](Schema::decode_exact) and
/// friends to run it.
///
/// A `Schema` is a cheap handle over shared immutable data; cloning it does
/// not copy the field list. Decoded records keep such a handle so a record
/// value stays self-describing.
#[derive(Debug, Clone)]
pub struct Schema {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    fields: Vec<FieldDef>,
    length: Option<usize>,
    reorder: Vec<usize>,
}

impl Schema {
    /// Compiles a list of fields into a schema. Fails if any descriptor,
    /// literal, or default is ill-formed.
    pub fn compile(name: &str, fields: Vec<FieldDef>) -> Result<Self, SchemaError> {
        Self::compile_with(name, fields, Vec::new())
    }

    /// Like [compile](Self::compile), with a top-level bit reordering applied
    /// after encoding and before decoding. Reordered schemas only support
    /// whole-buffer decoding and cannot be nested.
    pub fn compile_with(
        name: &str,
        mut fields: Vec<FieldDef>,
        reorder: Vec<usize>,
    ) -> Result<Self, SchemaError> {
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|g| g.name == f.name) {
                return Err(SchemaError::DuplicateField(f.name.clone()));
            }
            f.desc.validate()?;
        }

        for f in &mut fields {
            if f.default.is_none() {
                if let Desc::Lit(_, expected) = &f.desc {
                    f.default = Some(expected.clone());
                }
            }
            if let Some(default) = &f.default {
                check_value(&f.desc, default).map_err(|detail| SchemaError::BadDefault {
                    field: f.name.clone(),
                    detail,
                })?;
            }
        }

        for (i, &idx) in reorder.iter().enumerate() {
            if reorder[..i].contains(&idx) {
                return Err(SchemaError::ReorderDuplicate(idx));
            }
        }

        let length = fields
            .iter()
            .try_fold(0usize, |acc, f| f.desc.length().map(|l| acc + l));

        Ok(Schema {
            inner: Arc::new(Inner {
                name: name.to_string(),
                fields,
                length,
                reorder,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.inner.fields
    }

    pub(crate) fn reorder(&self) -> &[usize] {
        &self.inner.reorder
    }

    /// Total bit width when every field is statically sized, else `None`.
    pub fn length(&self) -> Option<usize> {
        self.inner.length
    }

    /// Builds a record for this schema, substituting defaults for omitted
    /// fields. Values are not range-checked here; encoding checks them.
    pub fn record(&self, values: Vec<(&str, Value)>) -> Result<Record, SchemaError> {
        for (name, _) in &values {
            if !self.inner.fields.iter().any(|f| f.name == *name) {
                return Err(SchemaError::UnknownField(name.to_string()));
            }
        }

        let mut record = Record::new(self.clone());
        for f in &self.inner.fields {
            let value = values
                .iter()
                .find(|(n, _)| *n == f.name)
                .map(|(_, v)| v.clone())
                .or_else(|| f.default.clone())
                .ok_or_else(|| SchemaError::MissingValue(f.name.clone()))?;
            record.push(f.name.clone(), value);
        }
        Ok(record)
    }

    /// Encodes a record to bytes. Fails on type or range violations, missing
    /// fields without defaults, or output that is not byte-aligned.
    pub fn encode(&self, record: &Record, ctx: Ctx) -> Result<Vec<u8>, CodecError> {
        let mut writer = BitWriter::new();
        self.write_record(&mut writer, record, ctx)?;

        let out = writer.into_bits();
        if out.len() % 8 != 0 {
            return Err(
                CodecError::at(ErrorKind::UnalignedOutput { bits: out.len() }, out.len())
                    .tagged(&self.inner.name),
            );
        }

        let out = if self.inner.reorder.is_empty() {
            out
        } else {
            bits::unreorder_bits(&out, &self.inner.reorder)
                .map_err(|e| CodecError::at(e, 0).tagged(&self.inner.name))?
        };

        Ok(bits::bits_to_bytes(&out))
    }

    /// Decodes a record that must consume the entire buffer.
    pub fn decode_exact(&self, data: &[u8], ctx: Ctx) -> Result<Record, CodecError> {
        if self.inner.reorder.is_empty() {
            let mut reader = BitReader::new(data);
            return self.finish_exact(&mut reader, ctx);
        }

        let reordered = bits::reorder_bits(&bits::bytes_to_bits(data), &self.inner.reorder)
            .map_err(|e| CodecError::at(e, 0).tagged(&self.inner.name))?;
        let buf = bits::bits_to_bytes(&reordered);
        let mut reader = BitReader::new(&buf);
        self.finish_exact(&mut reader, ctx)
    }

    fn finish_exact(&self, reader: &mut BitReader, ctx: Ctx) -> Result<Record, CodecError> {
        let record = self.read_record(reader, ctx)?;
        if reader.remaining() > 0 {
            return Err(CodecError::at(
                ErrorKind::TrailingBits {
                    remaining: reader.remaining(),
                },
                reader.bit_position(),
            )
            .tagged(&self.inner.name));
        }
        Ok(record)
    }

    /// Decodes one record from the front of the buffer, returning it together
    /// with the unconsumed suffix. The consumed prefix must be byte-aligned.
    pub fn decode_one<'a>(
        &self,
        data: &'a [u8],
        ctx: Ctx,
    ) -> Result<(Record, &'a [u8]), CodecError> {
        if !self.inner.reorder.is_empty() {
            return Err(CodecError::at(SchemaError::ReorderUnsupported, 0).tagged(&self.inner.name));
        }

        let mut reader = BitReader::new(data);
        let record = self.read_record(&mut reader, ctx)?;

        let consumed = reader.bit_position();
        if consumed % 8 != 0 {
            return Err(CodecError::at(
                ErrorKind::UnalignedConsumption { bit_pos: consumed },
                consumed,
            )
            .tagged(&self.inner.name));
        }

        Ok((record, &data[consumed / 8..]))
    }

    /// Decodes records from the front of the buffer until one fails, returning
    /// the accumulated records and the unconsumed suffix. Never fails: a
    /// failure on the first record yields an empty list.
    pub fn decode_batch<'a>(&self, data: &'a [u8], ctx: Ctx) -> (Vec<Record>, &'a [u8]) {
        let mut out = Vec::new();
        let mut rest = data;

        while !rest.is_empty() {
            match self.decode_one(rest, ctx) {
                Ok((record, remaining)) => {
                    let stalled = remaining.len() == rest.len();
                    out.push(record);
                    rest = remaining;
                    if stalled {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        (out, rest)
    }

    pub(crate) fn read_record(
        &self,
        reader: &mut BitReader,
        ctx: Ctx,
    ) -> Result<Record, CodecError> {
        let mut record = Record::new(self.clone());
        for f in &self.inner.fields {
            let value = read_desc(&f.desc, reader, &record, ctx)
                .map_err(|e| e.push(&self.inner.name, &f.name))?;
            record.push(f.name.clone(), value);
        }
        Ok(record)
    }

    pub(crate) fn write_record(
        &self,
        writer: &mut BitWriter,
        record: &Record,
        ctx: Ctx,
    ) -> Result<(), CodecError> {
        let mut partial = Record::new(record.schema().clone());
        for f in &self.inner.fields {
            let value = match record.get(&f.name) {
                Some(v) => v.clone(),
                None => match &f.default {
                    Some(d) => d.clone(),
                    None => {
                        return Err(CodecError::at(
                            ErrorKind::MissingField(f.name.clone()),
                            writer.bit_position(),
                        )
                        .push(&self.inner.name, &f.name))
                    }
                },
            };
            write_desc(&f.desc, writer, &value, &partial, ctx)
                .map_err(|e| e.push(&self.inner.name, &f.name))?;
            partial.push(f.name.clone(), value);
        }
        Ok(())
    }
}

fn resolve_count(count: &Count, partial: &Record) -> Result<usize, SchemaError> {
    match count {
        Count::Fixed(n) => Ok(*n),
        Count::Dynamic(f) => f(partial),
    }
}

fn read_desc(
    desc: &Desc,
    reader: &mut BitReader,
    partial: &Record,
    ctx: Ctx,
) -> Result<Value, CodecError> {
    match desc {
        Desc::Bits(n) => Ok(Value::Bits(reader.take_bits(*n)?)),
        Desc::Uint(n) => Ok(Value::Uint(reader.take(*n)?)),
        Desc::Int(n) => {
            let raw = reader.take(*n)?;
            Ok(Value::Int(bits::sign_extend(raw, *n)))
        }
        Desc::Bool => Ok(Value::Bool(reader.take_bit()?)),
        Desc::Bytes(k) => Ok(Value::Bytes(reader.take_bytes(*k)?)),
        Desc::Str(k, encoding) => {
            let raw = reader.take_bytes(*k)?;
            let text = encoding
                .decode(&raw)
                .map_err(|e| CodecError::at(e, reader.bit_position()))?;
            Ok(Value::Str(text.trim_end_matches('\0').to_string()))
        }
        Desc::None => Ok(Value::None),
        Desc::Enum(e) => {
            let raw = reader.take(e.bits)?;
            let value = if e.signed {
                bits::sign_extend(raw, e.bits)
            } else {
                raw as i64
            };
            match e.label_of(value) {
                Some(label) => Ok(Value::Str(label.to_string())),
                None => Err(CodecError::at(
                    ErrorKind::EnumOutOfRange(value),
                    reader.bit_position(),
                )),
            }
        }
        Desc::Lit(inner, expected) => {
            let value = read_desc(inner, reader, partial, ctx)?;
            if value != *expected {
                return Err(CodecError::at(
                    ErrorKind::LiteralMismatch {
                        expected: expected.clone(),
                        got: value,
                    },
                    reader.bit_position(),
                ));
            }
            Ok(value)
        }
        Desc::Map(inner, mapper) => {
            let value = read_desc(inner, reader, partial, ctx)?;
            mapper
                .forward(value)
                .map_err(|e| CodecError::at(e, reader.bit_position()))
        }
        Desc::List(inner, count) => {
            let n = resolve_count(count, partial)
                .map_err(|e| CodecError::at(e, reader.bit_position()))?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(read_desc(inner, reader, partial, ctx)?);
            }
            Ok(Value::List(items))
        }
        Desc::Bitfield(schema) => Ok(Value::Record(schema.read_record(reader, ctx)?)),
        Desc::Dyn(factory) => {
            let resolved = factory(partial, ctx)
                .map_err(|e| CodecError::at(e, reader.bit_position()))?;
            read_resolved(resolved, reader, partial, ctx)
        }
        Desc::DynRem(factory) => {
            let resolved = factory(partial, reader.remaining(), ctx)
                .map_err(|e| CodecError::at(e, reader.bit_position()))?;
            read_resolved(resolved, reader, partial, ctx)
        }
    }
}

fn read_resolved(
    resolved: Option<Desc>,
    reader: &mut BitReader,
    partial: &Record,
    ctx: Ctx,
) -> Result<Value, CodecError> {
    match resolved {
        Some(desc) => {
            desc.validate()
                .map_err(|e| CodecError::at(e, reader.bit_position()))?;
            read_desc(&desc, reader, partial, ctx)
        }
        None => Ok(Value::None),
    }
}

fn type_mismatch(expected: &'static str, got: &Value, bit_pos: usize) -> CodecError {
    CodecError::at(
        ErrorKind::TypeMismatch {
            expected,
            got: got.type_name(),
        },
        bit_pos,
    )
}

fn write_desc(
    desc: &Desc,
    writer: &mut BitWriter,
    value: &Value,
    partial: &Record,
    ctx: Ctx,
) -> Result<(), CodecError> {
    let pos = writer.bit_position();
    match desc {
        Desc::Bits(n) => match value {
            Value::Bits(v) => {
                if v.len() != *n {
                    return Err(CodecError::at(
                        ErrorKind::Length {
                            expected: *n,
                            got: v.len(),
                        },
                        pos,
                    ));
                }
                for &bit in v {
                    writer.put_bit(bit);
                }
                Ok(())
            }
            other => Err(type_mismatch("bits", other, pos)),
        },
        Desc::Uint(n) => match value {
            Value::Uint(v) => {
                if !uint_fits(*v, *n) {
                    return Err(CodecError::at(
                        ErrorKind::Range {
                            value: *v as i128,
                            bits: *n,
                        },
                        pos,
                    ));
                }
                writer.put(*v, *n);
                Ok(())
            }
            other => Err(type_mismatch("uint", other, pos)),
        },
        Desc::Int(n) => match value {
            Value::Int(v) => {
                if !int_fits(*v, *n) {
                    return Err(CodecError::at(
                        ErrorKind::Range {
                            value: *v as i128,
                            bits: *n,
                        },
                        pos,
                    ));
                }
                writer.put(*v as u64, *n);
                Ok(())
            }
            other => Err(type_mismatch("int", other, pos)),
        },
        Desc::Bool => match value {
            Value::Bool(v) => {
                writer.put_bit(*v);
                Ok(())
            }
            other => Err(type_mismatch("bool", other, pos)),
        },
        Desc::Bytes(k) => match value {
            Value::Bytes(v) => {
                if v.len() != *k {
                    return Err(CodecError::at(
                        ErrorKind::Length {
                            expected: *k,
                            got: v.len(),
                        },
                        pos,
                    ));
                }
                writer.put_bytes(v);
                Ok(())
            }
            other => Err(type_mismatch("bytes", other, pos)),
        },
        Desc::Str(k, encoding) => match value {
            Value::Str(s) => {
                let mut encoded = encoding.encode(s).map_err(|e| CodecError::at(e, pos))?;
                if encoded.len() > *k {
                    return Err(CodecError::at(
                        ErrorKind::Length {
                            expected: *k,
                            got: encoded.len(),
                        },
                        pos,
                    ));
                }
                encoded.resize(*k, 0);
                writer.put_bytes(&encoded);
                Ok(())
            }
            other => Err(type_mismatch("str", other, pos)),
        },
        Desc::None => match value {
            Value::None => Ok(()),
            other => Err(type_mismatch("none", other, pos)),
        },
        Desc::Enum(e) => match value {
            Value::Str(label) => match e.value_of(label) {
                Some(v) => {
                    writer.put(v as u64, e.bits);
                    Ok(())
                }
                None => Err(CodecError::at(
                    ErrorKind::UnknownEnumLabel(label.clone()),
                    pos,
                )),
            },
            other => Err(type_mismatch("enum label", other, pos)),
        },
        Desc::Lit(inner, expected) => {
            if value != expected {
                return Err(CodecError::at(
                    ErrorKind::LiteralMismatch {
                        expected: expected.clone(),
                        got: value.clone(),
                    },
                    pos,
                ));
            }
            write_desc(inner, writer, value, partial, ctx)
        }
        Desc::Map(inner, mapper) => {
            let wire = mapper
                .back(value.clone())
                .map_err(|e| CodecError::at(e, pos))?;
            write_desc(inner, writer, &wire, partial, ctx)
        }
        Desc::List(inner, count) => match value {
            Value::List(items) => {
                let n = resolve_count(count, partial).map_err(|e| CodecError::at(e, pos))?;
                if items.len() != n {
                    return Err(CodecError::at(
                        ErrorKind::Length {
                            expected: n,
                            got: items.len(),
                        },
                        pos,
                    ));
                }
                for item in items {
                    write_desc(inner, writer, item, partial, ctx)?;
                }
                Ok(())
            }
            other => Err(type_mismatch("list", other, pos)),
        },
        Desc::Bitfield(schema) => match value {
            Value::Record(r) => schema.write_record(writer, r, ctx),
            other => Err(type_mismatch("record", other, pos)),
        },
        Desc::Dyn(factory) => {
            let resolved = factory(partial, ctx).map_err(|e| CodecError::at(e, pos))?;
            match resolved {
                Some(desc) => {
                    desc.validate().map_err(|e| CodecError::at(e, pos))?;
                    write_desc(&desc, writer, value, partial, ctx)
                }
                None => match value {
                    Value::None => Ok(()),
                    other => Err(type_mismatch("none", other, pos)),
                },
            }
        }
        // The encoder has no remaining-bit count, so only values whose
        // serialized form is self-describing are accepted here.
        Desc::DynRem(_) => match value {
            Value::Record(r) => r.schema().write_record(writer, r, ctx),
            Value::Bool(b) => {
                writer.put_bit(*b);
                Ok(())
            }
            Value::Bytes(b) => {
                writer.put_bytes(b);
                Ok(())
            }
            Value::None => Ok(()),
            other => Err(CodecError::at(
                ErrorKind::UnsupportedDynamicEncode(other.type_name()),
                pos,
            )),
        },
    }
}
