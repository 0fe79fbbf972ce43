//! The single-pass JSON reader.
//!
//! [`Parser::parse`] walks the input buffer exactly once, recursive-descent,
//! and drives the [`Builder`] through its primitive emit operations in
//! document order. No per-token structures are allocated; the only growing
//! state is the builder's output buffer and its container stack.

mod cursor;
mod numbers;

use crate::builder::Builder;
use crate::error::{BuilderError, ErrorKind, ParseError};
use crate::options::ParserOptions;
use cursor::Cursor;
use numbers::ParsedNumber;

/// Transcodes JSON texts into VPack.
///
/// A parser owns its builder and is reusable: every [`parse`](Self::parse)
/// starts by clearing the builder and copying the current option set into
/// it. The result stays inside the builder until taken with
/// [`steal`](Self::steal).
///
/// ```
/// use vpack::{Parser, Slice};
///
/// let mut parser = Parser::new();
/// let n = parser.parse(br#"{"a":12}"#, false)?;
/// assert_eq!(n, 1);
///
/// let slice = Slice::new(parser.builder().bytes());
/// assert_eq!(slice.get("a").and_then(|v| v.to_u64()), Some(12));
/// # Ok::<(), vpack::ParseError>(())
/// ```
#[derive(Debug, Default)]
pub struct Parser {
    builder: Builder,
    pub options: ParserOptions,
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            builder: Builder::new(),
            options,
        }
    }

    /// Parses one JSON text (or, with `multi`, any number of
    /// whitespace-separated texts) from a contiguous buffer, leaving the
    /// emitted VPack in the builder. Returns the number of top-level values.
    ///
    /// # Errors
    ///
    /// Any syntax, encoding or numeric-range problem aborts the parse; the
    /// error carries the input position. The builder then holds an
    /// unfinished prefix and is reset on the next `parse`.
    pub fn parse(&mut self, input: &[u8], multi: bool) -> Result<u64, ParseError> {
        self.builder.clear();
        self.builder.options = self.options;
        let mut run = Run {
            cursor: Cursor::new(input),
            builder: &mut self.builder,
        };
        run.parse_documents(multi)
    }

    /// The builder holding the output of the last parse.
    #[must_use]
    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// Moves the builder (and with it the output buffer) out, leaving a
    /// fresh one behind.
    #[must_use]
    pub fn steal(&mut self) -> Builder {
        std::mem::take(&mut self.builder)
    }
}

/// One parse in flight: the borrowed input plus the builder being driven.
struct Run<'a, 'b> {
    cursor: Cursor<'a>,
    builder: &'b mut Builder,
}

impl Run<'_, '_> {
    fn parse_documents(&mut self, multi: bool) -> Result<u64, ParseError> {
        self.cursor.skip_bom();
        if multi && self.cursor.skip_white_space().is_none() {
            return Ok(0);
        }
        let mut nr = 0u64;
        loop {
            self.parse_value()?;
            nr += 1;
            self.cursor.skip_white_space();
            if !multi {
                if !self.cursor.is_exhausted() {
                    self.cursor.consume();
                    return Err(self.error(ErrorKind::ExpectingEof));
                }
                return Ok(nr);
            }
            if self.cursor.is_exhausted() {
                return Ok(nr);
            }
        }
    }

    // ------------------------------------------------------------------
    // Value dispatch
    // ------------------------------------------------------------------

    fn parse_value(&mut self) -> Result<(), ParseError> {
        self.skip_white_space("expecting item")?;
        let Some(b) = self.cursor.consume() else {
            return Ok(());
        };
        match b {
            b'{' => self.parse_object(),
            b'[' => self.parse_array(),
            b't' => {
                self.expect_rest(b"rue", "true")?;
                self.builder.add_true();
                Ok(())
            }
            b'f' => {
                self.expect_rest(b"alse", "false")?;
                self.builder.add_false();
                Ok(())
            }
            b'n' => {
                self.expect_rest(b"ull", "null")?;
                self.builder.add_null();
                Ok(())
            }
            b'"' => self.parse_string(),
            _ => {
                // Everything else must be a number or is invalid; the
                // number lexer rejects anything that does not start with
                // '-' or a digit.
                self.cursor.unconsume();
                self.parse_number()
            }
        }
    }

    fn expect_rest(&mut self, rest: &[u8], literal: &'static str) -> Result<(), ParseError> {
        for &expected in rest {
            if self.cursor.consume() != Some(expected) {
                return Err(self.error(ErrorKind::Literal(literal)));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------

    fn parse_number(&mut self) -> Result<(), ParseError> {
        let mut number = ParsedNumber::new();
        let mut negative = false;
        let Some(mut b) = self.cursor.consume() else {
            return Err(self.error(ErrorKind::ValueExpected));
        };
        if b == b'-' {
            b = self.get_one_or(ErrorKind::Unexpected("scanNumber: incomplete number"))?;
            negative = true;
        }
        if !b.is_ascii_digit() {
            return Err(self.error(ErrorKind::ValueExpected));
        }
        if b != b'0' {
            // A leading zero admits no further integer digits.
            self.cursor.unconsume();
            self.scan_digits(&mut number)?;
        }

        // The sign applies to the combined magnitude before any exponent
        // scaling, so -1.5e2 is -150.
        match self.cursor.consume() {
            None => {
                self.finish_integer(&number, negative);
                Ok(())
            }
            Some(b'.') => {
                let b = self.get_one_or(ErrorKind::Unexpected("scanNumber: incomplete number"))?;
                if !b.is_ascii_digit() {
                    return Err(self.error(ErrorKind::Unexpected("scanNumber: incomplete number")));
                }
                self.cursor.unconsume();
                let fractional = self.scan_digits_fractional();
                let value = if negative {
                    -number.as_double() - fractional
                } else {
                    number.as_double() + fractional
                };
                match self.cursor.consume() {
                    Some(b'e') | Some(b'E') => self.parse_exponent(value),
                    other => {
                        if other.is_some() {
                            self.cursor.unconsume();
                        }
                        self.builder.add_double(value);
                        Ok(())
                    }
                }
            }
            Some(b'e') | Some(b'E') => {
                let value = if negative {
                    -number.as_double()
                } else {
                    number.as_double()
                };
                self.parse_exponent(value)
            }
            Some(_) => {
                self.cursor.unconsume();
                self.finish_integer(&number, negative);
                Ok(())
            }
        }
    }

    fn finish_integer(&mut self, number: &ParsedNumber, negative: bool) {
        if !number.is_integer {
            self.builder.add_double(if negative {
                -number.double_value
            } else {
                number.double_value
            });
        } else if negative {
            self.builder.add_neg_int(number.int_value);
        } else {
            self.builder.add_uint(number.int_value);
        }
    }

    /// Entered after the `e`/`E` has been consumed.
    fn parse_exponent(&mut self, mut value: f64) -> Result<(), ParseError> {
        let mut b = self.get_one_or(ErrorKind::Unexpected("scanNumber: incomplete number"))?;
        let mut exp_negative = false;
        if b == b'+' || b == b'-' {
            exp_negative = b == b'-';
            b = self.get_one_or(ErrorKind::Unexpected("scanNumber: incomplete number"))?;
        }
        if !b.is_ascii_digit() {
            return Err(self.error(ErrorKind::Unexpected("scanNumber: incomplete number")));
        }
        self.cursor.unconsume();
        let mut exponent = ParsedNumber::new();
        self.scan_digits(&mut exponent)?;
        value *= 10f64.powf(if exp_negative {
            -exponent.as_double()
        } else {
            exponent.as_double()
        });
        if value.is_nan() || !value.is_finite() {
            return Err(self.error(ErrorKind::NumberOutOfBounds));
        }
        self.builder.add_double(value);
        Ok(())
    }

    fn scan_digits(&mut self, number: &mut ParsedNumber) -> Result<(), ParseError> {
        loop {
            let Some(b) = self.cursor.consume() else {
                return Ok(());
            };
            if !b.is_ascii_digit() {
                self.cursor.unconsume();
                return Ok(());
            }
            number.add_digit(b).map_err(|kind| self.error(kind))?;
        }
    }

    fn scan_digits_fractional(&mut self) -> f64 {
        let mut pot = 0.1;
        let mut x = 0.0;
        loop {
            let Some(b) = self.cursor.consume() else {
                return x;
            };
            if !b.is_ascii_digit() {
                self.cursor.unconsume();
                return x;
            }
            x += pot * f64::from(b - b'0');
            pot /= 10.0;
        }
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Entered after the opening quote. The string is assumed short; the
    /// moment its payload exceeds 127 bytes the written bytes are shifted
    /// forward to make room for the long form's 8-byte length field.
    fn parse_string(&mut self) -> Result<(), ParseError> {
        let base = self.builder.begin_string();
        let mut large = false;
        // Code unit of a pending high surrogate, 0 if none. A following
        // low surrogate retracts the 3 bytes written for it and emits the
        // combined scalar as 4 bytes.
        let mut high_surrogate: u32 = 0;

        loop {
            let b = self.get_one_or(ErrorKind::UnfinishedString)?;
            match b {
                b'"' => {
                    self.builder.finish_string(base, large);
                    return Ok(());
                }
                b'\\' => {
                    let esc = self.get_one_or(ErrorKind::UnfinishedString)?;
                    match esc {
                        b'"' | b'/' | b'\\' => {
                            self.builder.push_byte(esc);
                            high_surrogate = 0;
                        }
                        b'b' => {
                            self.builder.push_byte(0x08);
                            high_surrogate = 0;
                        }
                        b'f' => {
                            self.builder.push_byte(0x0c);
                            high_surrogate = 0;
                        }
                        b'n' => {
                            self.builder.push_byte(b'\n');
                            high_surrogate = 0;
                        }
                        b'r' => {
                            self.builder.push_byte(b'\r');
                            high_surrogate = 0;
                        }
                        b't' => {
                            self.builder.push_byte(b'\t');
                            high_surrogate = 0;
                        }
                        b'u' => {
                            let mut v: u32 = 0;
                            for _ in 0..4 {
                                let d = self.get_one_or(ErrorKind::UnfinishedUnicodeEscape)?;
                                let Some(h) = hex_value(d) else {
                                    return Err(self.error(ErrorKind::IllegalUnicodeEscape));
                                };
                                v = (v << 4) + h;
                            }
                            if v < 0x80 {
                                self.builder.push_byte(v as u8);
                                high_surrogate = 0;
                            } else if v < 0x800 {
                                self.builder.push_bytes(&[
                                    0xc0 + (v >> 6) as u8,
                                    0x80 + (v & 0x3f) as u8,
                                ]);
                                high_surrogate = 0;
                            } else if (0xdc00..0xe000).contains(&v) && high_surrogate != 0 {
                                // Low surrogate: pair up with the pending
                                // high half and re-emit as one scalar.
                                let v = 0x10000 + ((high_surrogate - 0xd800) << 10) + v - 0xdc00;
                                self.builder.retract(3);
                                self.builder.push_bytes(&[
                                    0xf0 + (v >> 18) as u8,
                                    0x80 + ((v >> 12) & 0x3f) as u8,
                                    0x80 + ((v >> 6) & 0x3f) as u8,
                                    0x80 + (v & 0x3f) as u8,
                                ]);
                                high_surrogate = 0;
                            } else {
                                high_surrogate = if (0xd800..0xdc00).contains(&v) { v } else { 0 };
                                self.builder.push_bytes(&[
                                    0xe0 + (v >> 12) as u8,
                                    0x80 + ((v >> 6) & 0x3f) as u8,
                                    0x80 + (v & 0x3f) as u8,
                                ]);
                            }
                        }
                        _ => return Err(self.error(ErrorKind::IllegalEscape)),
                    }
                }
                _ if b < 0x20 => return Err(self.error(ErrorKind::ControlCharacter)),
                _ if b < 0x80 => {
                    high_surrogate = 0;
                    self.builder.push_byte(b);
                }
                _ => {
                    let follow = if b & 0xe0 == 0x80 {
                        return Err(self.error(ErrorKind::IllegalUtf8Byte));
                    } else if b & 0xe0 == 0xc0 {
                        1
                    } else if b & 0xf0 == 0xe0 {
                        2
                    } else if b & 0xf8 == 0xf0 {
                        3
                    } else {
                        return Err(self.error(ErrorKind::IllegalUtf8Byte));
                    };
                    self.builder.push_byte(b);
                    for _ in 0..follow {
                        let c = self.get_one_or(ErrorKind::TruncatedUtf8)?;
                        if c & 0xc0 != 0x80 {
                            return Err(self.error(ErrorKind::InvalidUtf8));
                        }
                        self.builder.push_byte(c);
                    }
                    high_surrogate = 0;
                }
            }
            if !large && self.builder.len() - (base + 1) > 127 {
                large = true;
                self.builder.promote_string(base);
            }
        }
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    fn parse_array(&mut self) -> Result<(), ParseError> {
        let base = self.builder.len();
        self.builder.add_array();

        let b = self.skip_white_space("scanArray: item or ] expected")?;
        if b == b']' {
            self.cursor.advance(1);
            return self.close_container();
        }

        loop {
            self.report_add(base)?;
            self.parse_value()?;
            let b = self.skip_white_space("scanArray: , or ] expected")?;
            if b == b']' {
                self.cursor.advance(1);
                return self.close_container();
            }
            if b != b',' {
                return Err(self.error(ErrorKind::Unexpected("scanArray: , or ] expected")));
            }
            self.cursor.advance(1);
        }
    }

    fn parse_object(&mut self) -> Result<(), ParseError> {
        let base = self.builder.len();
        self.builder.add_object();

        let mut b = self.skip_white_space("scanObject: item or } expected")?;
        if b == b'}' {
            self.cursor.advance(1);
            return self.close_container();
        }

        loop {
            // Always a string attribute name here.
            if b != b'"' {
                return Err(self.error(ErrorKind::Unexpected("scanObject: \" or } expected")));
            }
            self.cursor.advance(1);
            self.report_add(base)?;
            self.parse_string()?;

            let colon = self.skip_white_space("scanObject: : expected")?;
            if colon != b':' {
                return Err(self.error(ErrorKind::Unexpected("scanObject: : expected")));
            }
            self.cursor.advance(1);
            self.parse_value()?;

            let c = self.skip_white_space("scanObject: , or } expected")?;
            if c == b'}' {
                self.cursor.advance(1);
                return self.close_container();
            }
            if c != b',' {
                return Err(self.error(ErrorKind::Unexpected("scanObject: , or } expected")));
            }
            self.cursor.advance(1);
            b = self.skip_white_space("scanObject: \" or } expected")?;
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn skip_white_space(&mut self, err: &'static str) -> Result<u8, ParseError> {
        self.cursor
            .skip_white_space()
            .ok_or_else(|| self.error(ErrorKind::Unexpected(err)))
    }

    fn get_one_or(&mut self, kind: ErrorKind) -> Result<u8, ParseError> {
        match self.cursor.consume() {
            Some(b) => Ok(b),
            None => Err(self.error(kind)),
        }
    }

    fn report_add(&mut self, base: usize) -> Result<(), ParseError> {
        self.builder
            .report_add(base)
            .map_err(|e| self.builder_error(e))
    }

    fn close_container(&mut self) -> Result<(), ParseError> {
        self.builder.close().map_err(|e| self.builder_error(e))
    }

    fn error(&self, kind: ErrorKind) -> ParseError {
        ParseError {
            kind,
            pos: self.cursor.error_pos(),
        }
    }

    fn builder_error(&self, err: BuilderError) -> ParseError {
        self.error(ErrorKind::Builder(err))
    }
}

fn hex_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some(u32::from(b - b'0')),
        b'a'..=b'f' => Some(u32::from(b - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(b - b'A') + 10),
        _ => None,
    }
}
