//! Text encodings for string fields.
//!
//! UTF-8 is the wire default. ASCII additionally requires every byte to be in
//! `0..=0x7F`.

use thiserror::Error;

/// A text encode or decode failure under a named encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{encoding}: {detail}")]
pub struct TextError {
    pub encoding: &'static str,
    pub detail: String,
}

/// Character encoding for string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
        }
    }

    /// Decodes raw bytes to a string. No trimming is applied here.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, TextError> {
        if let Encoding::Ascii = self {
            if let Some(byte) = bytes.iter().find(|b| **b > 0x7F) {
                return Err(TextError {
                    encoding: self.name(),
                    detail: format!("byte {byte:#04x} is outside the ascii range"),
                });
            }
        }

        String::from_utf8(bytes.to_vec()).map_err(|e| TextError {
            encoding: self.name(),
            detail: e.to_string(),
        })
    }

    /// Encodes a string to raw bytes. No padding is applied here.
    pub fn encode(&self, s: &str) -> Result<Vec<u8>, TextError> {
        if let Encoding::Ascii = self {
            if let Some(c) = s.chars().find(|c| !c.is_ascii()) {
                return Err(TextError {
                    encoding: self.name(),
                    detail: format!("character {c:?} is outside the ascii range"),
                });
            }
        }

        Ok(s.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_roundtrip() {
        let s = "héllo";
        let bytes = Encoding::Utf8.encode(s).unwrap();
        assert_eq!(Encoding::Utf8.decode(&bytes).unwrap(), s);
    }

    #[test]
    fn test_utf8_invalid() {
        assert!(Encoding::Utf8.decode(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert!(Encoding::Ascii.decode(&[0x41, 0x80]).is_err());
        assert!(Encoding::Ascii.encode("héllo").is_err());
    }

    #[test]
    fn test_ascii_accepts_plain() {
        assert_eq!(Encoding::Ascii.encode("abc").unwrap(), b"abc");
        assert_eq!(Encoding::Ascii.decode(b"abc").unwrap(), "abc");
    }
}
