//! JSON-deserializable schema descriptions.
//!
//! These types describe the *shape* of a packet layout. They are intended to
//! be loaded from JSON (for example a schema file shipped with your
//! application) and then compiled into a [Schema]. Mappers and dynamic fields
//! have no JSON form; schemas using them are built in code.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::errors::SchemaError;
use crate::field::{
    bitfield, bits, boolean, bytes, int, list, lit_bytes, lit_int, lit_str, lit_uint, none,
    string_with, uint, Desc, EnumDef,
};
use crate::schema::{FieldDef, Schema};
use crate::value::Value;

/// Top-level schema definition: a record name and its fields.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchemaDef {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// Description of a single field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldSpec {
    /// Field name; becomes the key in decoded records.
    pub name: String,
    /// The field's descriptor.
    pub desc: DescDef,
    /// Optional default substituted when a record omits the field.
    #[serde(default)]
    pub default: Option<ValueDef>,
}

/// Text encoding for string fields; defaults to UTF-8.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncodingDef {
    #[default]
    Utf8,
    Ascii,
}

impl From<EncodingDef> for Encoding {
    fn from(def: EncodingDef) -> Self {
        match def {
            EncodingDef::Utf8 => Encoding::Utf8,
            EncodingDef::Ascii => Encoding::Ascii,
        }
    }
}

/// One enum variant: a label and its wire value.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VariantDef {
    pub label: String,
    pub value: i64,
}

/// The JSON-expressible subset of descriptors.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DescDef {
    Uint { bits: usize },
    Int { bits: usize },
    Bool,
    Bytes { len: usize },
    Str {
        len: usize,
        #[serde(default)]
        encoding: EncodingDef,
    },
    Bits { bits: usize },
    None,
    UintEnum { bits: usize, variants: Vec<VariantDef> },
    IntEnum { bits: usize, variants: Vec<VariantDef> },
    LitUint { bits: usize, value: u64 },
    LitInt { bits: usize, value: i64 },
    LitBytes { value: Vec<u8> },
    LitStr { value: String },
    List { item: Box<DescDef>, count: usize },
    Bitfield { schema: SchemaDef },
}

/// Default values expressible in JSON.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum ValueDef {
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl From<ValueDef> for Value {
    fn from(def: ValueDef) -> Self {
        match def {
            ValueDef::Bool(v) => Value::Bool(v),
            ValueDef::Uint(v) => Value::Uint(v),
            ValueDef::Int(v) => Value::Int(v),
            ValueDef::Float(v) => Value::Float(v),
            ValueDef::Str(v) => Value::Str(v),
            ValueDef::Bytes(v) => Value::Bytes(v),
        }
    }
}

fn build_desc(def: &DescDef) -> Result<Desc, SchemaError> {
    Ok(match def {
        DescDef::Uint { bits } => uint(*bits),
        DescDef::Int { bits } => int(*bits),
        DescDef::Bool => boolean(),
        DescDef::Bytes { len } => bytes(*len),
        DescDef::Str { len, encoding } => string_with(*len, (*encoding).into()),
        DescDef::Bits { bits: n } => bits(*n),
        DescDef::None => none(),
        DescDef::UintEnum { bits, variants } => Desc::Enum(EnumDef {
            bits: *bits,
            signed: false,
            variants: Arc::new(
                variants
                    .iter()
                    .map(|v| (v.label.clone(), v.value))
                    .collect(),
            ),
        }),
        DescDef::IntEnum { bits, variants } => Desc::Enum(EnumDef {
            bits: *bits,
            signed: true,
            variants: Arc::new(
                variants
                    .iter()
                    .map(|v| (v.label.clone(), v.value))
                    .collect(),
            ),
        }),
        DescDef::LitUint { bits, value } => lit_uint(*bits, *value),
        DescDef::LitInt { bits, value } => lit_int(*bits, *value),
        DescDef::LitBytes { value } => lit_bytes(value),
        DescDef::LitStr { value } => lit_str(value),
        DescDef::List { item, count } => list(build_desc(item)?, *count),
        DescDef::Bitfield { schema } => bitfield(&Schema::try_from(schema.clone())?),
    })
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SchemaError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        let mut fields = Vec::with_capacity(def.fields.len());
        for spec in &def.fields {
            fields.push(FieldDef {
                name: spec.name.clone(),
                desc: build_desc(&spec.desc)?,
                default: spec.default.clone().map(Into::into),
            });
        }
        Schema::compile(&def.name, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_from_json() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "name": "Packet",
                "fields": [
                    { "name": "magic", "desc": { "type": "lit_uint", "bits": 8, "value": 170 } },
                    { "name": "a", "desc": { "type": "uint", "bits": 4 } },
                    { "name": "b", "desc": { "type": "uint", "bits": 4 }, "default": 7 },
                    { "name": "label", "desc": { "type": "str", "len": 2 } },
                    {
                        "name": "kind",
                        "desc": {
                            "type": "uint_enum",
                            "bits": 8,
                            "variants": [
                                { "label": "PING", "value": 1 },
                                { "label": "PONG", "value": 2 }
                            ]
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        let schema = Schema::try_from(def).unwrap();
        assert_eq!(schema.length(), Some(40));

        let record = schema.decode_exact(b"\xAA\x12hi\x01", None).unwrap();
        assert_eq!(record.uint("a").unwrap(), 1);
        assert_eq!(record.string("label").unwrap(), "hi");
        assert_eq!(record.string("kind").unwrap(), "PING");
        assert_eq!(schema.encode(&record, None).unwrap(), b"\xAA\x12hi\x01");
    }

    #[test]
    fn test_nested_and_list_defs() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "name": "Outer",
                "fields": [
                    {
                        "name": "pair",
                        "desc": {
                            "type": "bitfield",
                            "schema": {
                                "name": "Inner",
                                "fields": [
                                    { "name": "x", "desc": { "type": "uint", "bits": 4 } },
                                    { "name": "y", "desc": { "type": "uint", "bits": 4 } }
                                ]
                            }
                        }
                    },
                    {
                        "name": "tail",
                        "desc": { "type": "list", "item": { "type": "uint", "bits": 8 }, "count": 2 }
                    }
                ]
            }"#,
        )
        .unwrap();

        let schema = Schema::try_from(def).unwrap();
        let record = schema.decode_exact(b"\x12\x0A\x0B", None).unwrap();
        assert_eq!(record.record("pair").unwrap().uint("y").unwrap(), 2);
        assert_eq!(
            record.list("tail").unwrap(),
            &[Value::Uint(10), Value::Uint(11)]
        );
    }

    #[test]
    fn test_invalid_def_rejected() {
        let def: SchemaDef = serde_json::from_str(
            r#"{
                "name": "Bad",
                "fields": [
                    { "name": "a", "desc": { "type": "uint", "bits": 65 } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            Schema::try_from(def).unwrap_err(),
            SchemaError::WidthTooLarge(65)
        );
    }
}
