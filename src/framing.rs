//! Delimiter-and-escape framing for transporting records over byte streams,
//! and a [Framer] pairing a framing with a schema.

use std::collections::HashMap;

use thiserror::Error;

use crate::errors::CodecError;
use crate::field::Ctx;
use crate::schema::Schema;
use crate::value::Record;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FramingError {
    #[error("invalid escape sequence: {escape:#04X} {byte:#04X}")]
    InvalidEscape { escape: u8, byte: u8 },

    #[error("escape map must cover the delimiter and escape bytes")]
    IncompleteEscapeMap,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Byte-stuffing framing: frames are wrapped in a delimiter byte, and
/// occurrences of the delimiter or the escape byte inside a frame are
/// replaced by the escape byte followed by a substitute from the map.
#[derive(Debug, Clone)]
pub struct SimpleFraming {
    delimiter: u8,
    escape_byte: u8,
    escape_map: HashMap<u8, u8>,
}

impl SimpleFraming {
    /// `escape_map` must contain substitutes for both the delimiter and the
    /// escape byte itself.
    pub fn new(
        delimiter: u8,
        escape_byte: u8,
        escape_map: HashMap<u8, u8>,
    ) -> Result<Self, FramingError> {
        if !escape_map.contains_key(&delimiter) || !escape_map.contains_key(&escape_byte) {
            return Err(FramingError::IncompleteEscapeMap);
        }
        Ok(SimpleFraming {
            delimiter,
            escape_byte,
            escape_map,
        })
    }

    /// The KISS framing: 0xC0 delimiter, 0xDB escape, 0xC0 -> 0xDC and
    /// 0xDB -> 0xDD substitutes.
    pub fn kiss() -> Self {
        SimpleFraming {
            delimiter: 0xC0,
            escape_byte: 0xDB,
            escape_map: HashMap::from([(0xC0, 0xDC), (0xDB, 0xDD)]),
        }
    }

    fn unescape(&self, frame: &[u8]) -> Result<Vec<u8>, FramingError> {
        let inverse: HashMap<u8, u8> = self.escape_map.iter().map(|(k, v)| (*v, *k)).collect();

        let mut out = Vec::with_capacity(frame.len());
        let mut iter = frame.iter();
        while let Some(&byte) = iter.next() {
            if byte != self.escape_byte {
                out.push(byte);
                continue;
            }
            match iter.next() {
                // A trailing lone escape byte is dropped.
                None => break,
                Some(&escaped) => match inverse.get(&escaped) {
                    Some(&original) => out.push(original),
                    None => {
                        return Err(FramingError::InvalidEscape {
                            escape: self.escape_byte,
                            byte: escaped,
                        })
                    }
                },
            }
        }
        Ok(out)
    }

    /// Splits `data` into complete unescaped frames plus the trailing
    /// incomplete frame, if any, with its opening delimiter restored.
    pub fn unframe(&self, data: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<u8>), FramingError> {
        let mut frames = Vec::new();
        let mut current = Vec::new();

        for &byte in data {
            if byte == self.delimiter {
                if !current.is_empty() {
                    frames.push(self.unescape(&current)?);
                    current.clear();
                }
            } else {
                current.push(byte);
            }
        }

        let remaining = if current.is_empty() {
            Vec::new()
        } else {
            let mut r = Vec::with_capacity(current.len() + 1);
            r.push(self.delimiter);
            r.extend_from_slice(&current);
            r
        };

        Ok((frames, remaining))
    }

    /// Wraps each frame in delimiters, escaping payload bytes as needed.
    pub fn frame<F: AsRef<[u8]>>(&self, frames: &[F]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in frames {
            out.push(self.delimiter);
            for &byte in frame.as_ref() {
                if byte == self.delimiter || byte == self.escape_byte {
                    out.push(self.escape_byte);
                    out.push(self.escape_map[&byte]);
                } else {
                    out.push(byte);
                }
            }
            out.push(self.delimiter);
        }
        out
    }
}

/// Encodes and decodes batches of records of one schema with framing applied.
pub struct Framer {
    schema: Schema,
    framing: SimpleFraming,
}

impl Framer {
    pub fn new(schema: Schema, framing: SimpleFraming) -> Self {
        Framer { schema, framing }
    }

    /// Unframes `data` and decodes each complete frame, returning the records
    /// and the trailing incomplete frame bytes.
    pub fn decode_batch(
        &self,
        data: &[u8],
        ctx: Ctx,
    ) -> Result<(Vec<Record>, Vec<u8>), FramingError> {
        let (frames, remaining) = self.framing.unframe(data)?;
        let mut records = Vec::with_capacity(frames.len());
        for frame in frames {
            records.push(self.schema.decode_exact(&frame, ctx)?);
        }
        Ok((records, remaining))
    }

    /// Encodes each record and frames the results.
    pub fn encode(&self, records: &[Record], ctx: Ctx) -> Result<Vec<u8>, FramingError> {
        let mut frames = Vec::with_capacity(records.len());
        for record in records {
            frames.push(self.schema.encode(record, ctx)?);
        }
        Ok(self.framing.frame(&frames))
    }
}
