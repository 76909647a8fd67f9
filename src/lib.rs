//! # bitweave
//!
//! A library for describing binary packet layouts at bit granularity and
//! encoding/decoding them symmetrically.
//!
//! A [Schema] is an ordered list of named field descriptors. Descriptors
//! cover unsigned/signed integers of any width up to 64 bits, booleans,
//! byte and text strings, raw bit strings, enums, and literals, and compose
//! through lists, value mappers, nested records, and dynamic fields that
//! choose their shape from already-decoded siblings.
//!
//! ## Example
//!
//! ```
//! use bitweave::{field, string, uint, Schema, Value};
//!
//! let schema = Schema::compile(
//!     "Foo",
//!     vec![
//!         field("a", uint(4)),
//!         field("b", uint(4)),
//!         field("c", string(1)),
//!     ],
//! )
//! .unwrap();
//!
//! let record = schema
//!     .record(vec![
//!         ("a", Value::Uint(1)),
//!         ("b", Value::Uint(2)),
//!         ("c", Value::from("x")),
//!     ])
//!     .unwrap();
//!
//! let bytes = schema.encode(&record, None).unwrap();
//! assert_eq!(bytes, b"\x12x");
//!
//! let decoded = schema.decode_exact(&bytes, None).unwrap();
//! assert_eq!(decoded, record);
//! ```

pub mod bits;
pub mod encoding;
pub mod errors;
pub mod field;
pub mod framing;
pub mod mapper;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;
pub mod stream;
pub mod value;

pub use encoding::{Encoding, TextError};
pub use errors::{CodecError, ErrorKind, SchemaError};
pub use field::{
    bitfield, bits as bits_field, boolean, bytes, dynamic, dynamic_rem, int, int_enum, list,
    list_dyn, lit, lit_bytes, lit_int, lit_str, lit_uint, mapped, none, string, string_with,
    uint, uint_enum, Count, Ctx, Desc,
};
pub use framing::{Framer, FramingError, SimpleFraming};
pub use mapper::{IntScale, MapError, Scale, ValueMapper};
pub use schema::{field, field_default, FieldDef, Schema};
pub use stream::{BitReader, BitWriter};
pub use value::{Record, Value};
