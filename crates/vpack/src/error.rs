use thiserror::Error;

/// A parse failure: what went wrong and where.
///
/// The position points at the offending input byte, or just past it when the
/// input ended prematurely. It is the byte offset into the buffer handed to
/// [`Parser::parse`](crate::Parser::parse), before any BOM stripping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at position {pos}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub pos: usize,
}

impl ParseError {
    /// The input offset the error was reported at.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// The individual failure modes of the transcoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Trailing non-whitespace input in single-value mode.
    #[error("expecting EOF")]
    ExpectingEof,
    /// A byte that cannot start any JSON value.
    #[error("value expected")]
    ValueExpected,
    /// A `true`/`false`/`null` keyword was cut short or misspelled.
    #[error("{0} expected")]
    Literal(&'static str),
    /// Structural errors; the message names the scanner and what it wanted.
    #[error("{0}")]
    Unexpected(&'static str),
    /// A number whose value cannot be held in an IEEE 754 double.
    #[error("numeric value out of bounds")]
    NumberOutOfBounds,
    #[error("unfinished string")]
    UnfinishedString,
    #[error("unfinished \\uXXXX escape")]
    UnfinishedUnicodeEscape,
    #[error("illegal hex digit in \\uXXXX escape")]
    IllegalUnicodeEscape,
    #[error("illegal \\ sequence")]
    IllegalEscape,
    /// An unescaped byte below 0x20 inside a string.
    #[error("control character in string")]
    ControlCharacter,
    /// A byte that cannot lead a UTF-8 sequence (stray continuation byte or
    /// a 5-/6-byte leader).
    #[error("illegal UTF-8 byte")]
    IllegalUtf8Byte,
    /// Input ended inside a multi-byte UTF-8 sequence.
    #[error("truncated UTF-8 sequence")]
    TruncatedUtf8,
    /// A continuation byte that does not have the form `10xxxxxx`.
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    /// The builder rejected an emit operation (see [`BuilderError`]).
    #[error(transparent)]
    Builder(#[from] BuilderError),
}

/// Misuse of the [`Builder`](crate::Builder) emit API, or a constraint
/// violation detected at container close.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderError {
    /// `close` or `report_add` with no open array or object.
    #[error("no open array or object")]
    NotInContainer,
    /// `report_add` with a base that is not the innermost open container.
    #[error("child reported against a container that is not the innermost open one")]
    MismatchedContainer,
    /// Two equal keys in one object, with the uniqueness check enabled.
    #[error("duplicate attribute name in object")]
    DuplicateAttributeName,
}
