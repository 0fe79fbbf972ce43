//! The reverse direction: VPack back to JSON text.
//!
//! Output is produced as bytes, not `String`: VPack strings may legally
//! hold byte sequences that are not valid UTF-8 (lone surrogates written
//! via `\uXXXX` escapes pass through the parser structurally intact), and
//! the dumper reproduces those bytes verbatim so that dump-then-parse is a
//! byte-exact fixed point.

use thiserror::Error;

use crate::format::ValueType;
use crate::slice::Slice;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpError {
    /// JSON has no representation for NaN or infinities.
    #[error("cannot dump a non-finite double")]
    NonFiniteDouble,
    /// An unclosed placeholder or an unknown tag byte.
    #[error("cannot dump this value type")]
    UnsupportedType,
}

/// Serializes [`Slice`]s to JSON text.
#[derive(Debug, Default)]
pub struct Dumper {
    out: Vec<u8>,
}

impl Dumper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dumps a single value to a fresh byte buffer.
    pub fn dump(slice: Slice<'_>) -> Result<Vec<u8>, DumpError> {
        let mut dumper = Dumper::new();
        dumper.append(slice)?;
        Ok(dumper.into_bytes())
    }

    /// Appends one value to the output. Multi-value sequences are dumped by
    /// appending each value, with whatever separator the caller writes in
    /// between.
    pub fn append(&mut self, slice: Slice<'_>) -> Result<(), DumpError> {
        match slice.value_type() {
            ValueType::None => Err(DumpError::UnsupportedType),
            ValueType::Null => {
                self.out.extend_from_slice(b"null");
                Ok(())
            }
            ValueType::Bool => {
                self.out.extend_from_slice(match slice.to_bool() {
                    Some(true) => b"true".as_slice(),
                    _ => b"false".as_slice(),
                });
                Ok(())
            }
            ValueType::Double => {
                let v = slice.to_double().ok_or(DumpError::UnsupportedType)?;
                if !v.is_finite() {
                    return Err(DumpError::NonFiniteDouble);
                }
                // {:?} keeps a fractional part or exponent, so the text
                // reads back as a double, and round-trips the bit pattern.
                self.out.extend_from_slice(format!("{v:?}").as_bytes());
                Ok(())
            }
            ValueType::SmallInt | ValueType::Int => {
                let v = slice.to_i64().ok_or(DumpError::UnsupportedType)?;
                self.out.extend_from_slice(v.to_string().as_bytes());
                Ok(())
            }
            ValueType::UInt => {
                let v = slice.to_u64().ok_or(DumpError::UnsupportedType)?;
                self.out.extend_from_slice(v.to_string().as_bytes());
                Ok(())
            }
            ValueType::String => {
                let bytes = slice.string_bytes().ok_or(DumpError::UnsupportedType)?;
                self.append_string(bytes);
                Ok(())
            }
            ValueType::Array => {
                self.out.push(b'[');
                for i in 0..slice.length() {
                    if i > 0 {
                        self.out.push(b',');
                    }
                    let child = slice.at(i).ok_or(DumpError::UnsupportedType)?;
                    self.append(child)?;
                }
                self.out.push(b']');
                Ok(())
            }
            ValueType::Object => {
                self.out.push(b'{');
                for i in 0..slice.length() {
                    if i > 0 {
                        self.out.push(b',');
                    }
                    let key = slice.key_at(i).ok_or(DumpError::UnsupportedType)?;
                    let key = key.string_bytes().ok_or(DumpError::UnsupportedType)?;
                    self.append_string(key);
                    self.out.push(b':');
                    let value = slice.value_at(i).ok_or(DumpError::UnsupportedType)?;
                    self.append(value)?;
                }
                self.out.push(b'}');
                Ok(())
            }
        }
    }

    fn append_string(&mut self, bytes: &[u8]) {
        self.out.push(b'"');
        for &b in bytes {
            match b {
                b'"' => self.out.extend_from_slice(b"\\\""),
                b'\\' => self.out.extend_from_slice(b"\\\\"),
                0x08 => self.out.extend_from_slice(b"\\b"),
                0x0c => self.out.extend_from_slice(b"\\f"),
                b'\n' => self.out.extend_from_slice(b"\\n"),
                b'\r' => self.out.extend_from_slice(b"\\r"),
                b'\t' => self.out.extend_from_slice(b"\\t"),
                b if b < 0x20 => {
                    self.out
                        .extend_from_slice(format!("\\u{:04x}", b).as_bytes());
                }
                b => self.out.push(b),
            }
        }
        self.out.push(b'"');
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}
