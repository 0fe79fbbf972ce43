//! A single-pass JSON → VPack transcoder.
//!
//! VPack is a compact, self-describing binary value format: every value
//! starts with a tag byte, variable-sized values are length-prefixed, and
//! arrays/objects carry index tables for O(1) element access. The
//! [`Parser`] lexes and validates a JSON text in one streaming pass over a
//! contiguous buffer while the [`Builder`] emits the equivalent VPack into
//! one flat, growable output buffer. Container headers are patched in
//! place when a container closes, and strings that outgrow the short
//! encoding are promoted by shifting their bytes forward.
//!
//! ```
//! use vpack::{Dumper, Parser, Slice};
//!
//! let mut parser = Parser::new();
//! parser.parse(br#"{"b": [1, 2.5], "a": null}"#, false)?;
//!
//! let slice = Slice::new(parser.builder().bytes());
//! assert!(slice.get("a").is_some_and(|v| v.is_null()));
//! assert_eq!(slice.get("b").and_then(|v| v.at(0)).and_then(|v| v.to_u64()), Some(1));
//!
//! // Keys are sorted by default, and the dumper follows the index table.
//! let json = Dumper::dump(slice).unwrap();
//! assert_eq!(json, br#"{"a":null,"b":[1,2.5]}"#);
//! # Ok::<(), vpack::ParseError>(())
//! ```

mod builder;
mod dump;
mod error;
mod format;
mod options;
mod parser;
mod slice;

pub use builder::Builder;
pub use dump::{DumpError, Dumper};
pub use error::{BuilderError, ErrorKind, ParseError};
pub use format::ValueType;
pub use options::ParserOptions;
pub use parser::Parser;
pub use slice::Slice;
