//! The append-only VPack encoder.
//!
//! A [`Builder`] owns one flat byte buffer and a stack of open containers.
//! Scalars are appended in their final encoding immediately; arrays and
//! objects start out as a single placeholder byte and receive their real
//! header at [`close`](Builder::close) time, when the byte length, the child
//! count and (for objects) the key order are known. Making room for the
//! header means shifting the already-written children forward once, never
//! re-widening.

use crate::error::BuilderError;
use crate::format;
use crate::options::ParserOptions;

/// What kind of container a stack frame tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Array,
    Object,
}

/// One open container: where its placeholder tag byte sits in the buffer.
///
/// The child-start offsets belonging to the frame live in a per-depth list
/// on the builder so that the backing allocations survive across containers
/// and across parses.
#[derive(Debug, Clone, Copy)]
struct ContainerFrame {
    base: usize,
    kind: ContainerKind,
}

/// Append-only encoder for VPack values.
///
/// The buffer is always a valid prefix of a well-formed VPack sequence for
/// every closed container; open containers hold a placeholder tag until
/// [`close`](Builder::close). After a failed parse the buffer contents are
/// unspecified (but safely owned); call [`clear`](Builder::clear) before
/// reuse.
#[derive(Debug)]
pub struct Builder {
    buf: Vec<u8>,
    stack: Vec<ContainerFrame>,
    /// Child-start offsets (relative to the frame base), one list per
    /// nesting depth. Lists are emptied on close and reused.
    index: Vec<Vec<usize>>,
    pub options: ParserOptions,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            stack: Vec::new(),
            index: Vec::new(),
            options: ParserOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            options,
            ..Self::new()
        }
    }

    /// The bytes emitted so far. Only meaningful once every container has
    /// been closed.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Current write position.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Takes the output buffer out of the builder, leaving it empty and
    /// reusable.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Guarantees capacity for `n` more bytes.
    pub fn reserve(&mut self, n: usize) {
        self.buf.reserve(n);
    }

    /// Resets the write position and drops all open containers. Keeps the
    /// buffer and offset-list allocations.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.stack.clear();
        for list in &mut self.index {
            list.clear();
        }
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    pub fn add_null(&mut self) {
        self.buf.push(format::NULL);
    }

    pub fn add_true(&mut self) {
        self.buf.push(format::TRUE);
    }

    pub fn add_false(&mut self) {
        self.buf.push(format::FALSE);
    }

    /// IEEE 754 little-endian, bit pattern preserved (so `-0.0` stays
    /// negative zero).
    pub fn add_double(&mut self, v: f64) {
        self.buf.reserve(9);
        self.buf.push(format::DOUBLE);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Emits `v` in its smallest unsigned encoding.
    pub fn add_uint(&mut self, v: u64) {
        if v <= 9 {
            self.buf.push(format::SMALL_INT_BASE + v as u8);
            return;
        }
        let n = uint_width(v);
        self.buf.reserve(1 + n);
        self.buf.push(format::UINT_BASE + (n as u8 - 1));
        self.buf.extend_from_slice(&v.to_le_bytes()[..n]);
    }

    /// Emits the value `-magnitude` in its smallest encoding.
    ///
    /// Magnitudes above 2^63 have no two's-complement representation and
    /// fall back to a double, mirroring the number lexer's own
    /// integer-to-double promotion.
    pub fn add_neg_int(&mut self, magnitude: u64) {
        if magnitude == 0 {
            self.buf.push(format::SMALL_INT_BASE);
            return;
        }
        if magnitude <= 6 {
            self.buf
                .push(format::SMALL_NEG_INT_BASE + (6 - magnitude as u8));
            return;
        }
        if magnitude > i64::MAX as u64 + 1 {
            self.add_double(-(magnitude as f64));
            return;
        }
        let v = (magnitude as i64).wrapping_neg();
        let n = int_width(v);
        self.buf.reserve(1 + n);
        self.buf.push(format::INT_BASE + (n as u8 - 1));
        self.buf.extend_from_slice(&(v as u64).to_le_bytes()[..n]);
    }

    /// Emits a whole string, choosing the short or long form up front.
    pub fn add_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        if bytes.len() <= format::SHORT_STRING_MAX_LEN {
            self.buf.reserve(1 + bytes.len());
            self.buf
                .push(format::SHORT_STRING_BASE + bytes.len() as u8);
        } else {
            self.buf.reserve(9 + bytes.len());
            self.buf.push(format::LONG_STRING);
            self.buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        }
        self.buf.extend_from_slice(bytes);
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    /// Opens an array at the current write position.
    pub fn add_array(&mut self) {
        self.open(ContainerKind::Array);
    }

    /// Opens an object at the current write position.
    pub fn add_object(&mut self) {
        self.open(ContainerKind::Object);
    }

    fn open(&mut self, kind: ContainerKind) {
        let depth = self.stack.len();
        self.stack.push(ContainerFrame {
            base: self.buf.len(),
            kind,
        });
        if self.index.len() == depth {
            self.index.push(Vec::new());
        }
        self.buf.push(format::NONE);
    }

    /// Records that the next child of the innermost container starts at the
    /// current write position. Must be called once per child (per key/value
    /// pair for objects), before the child is emitted.
    ///
    /// `base` is the container's start offset as captured before
    /// `add_array`/`add_object`; it must match the innermost open frame.
    pub fn report_add(&mut self, base: usize) -> Result<(), BuilderError> {
        let frame = self.stack.last().ok_or(BuilderError::NotInContainer)?;
        if frame.base != base {
            return Err(BuilderError::MismatchedContainer);
        }
        let offset = self.buf.len() - base;
        self.index[self.stack.len() - 1].push(offset);
        Ok(())
    }

    /// Closes the innermost open container, writing its final header.
    ///
    /// Arrays whose children all have the same encoded size get the compact
    /// form without an index table; every other array and every object gets
    /// an index table of child offsets. Objects additionally have their
    /// table sorted by key bytes when
    /// [`sort_attribute_names`](ParserOptions::sort_attribute_names) is on.
    pub fn close(&mut self) -> Result<(), BuilderError> {
        let frame = self.stack.pop().ok_or(BuilderError::NotInContainer)?;
        let depth = self.stack.len();
        let mut offsets = std::mem::take(&mut self.index[depth]);
        let result = self.close_container(frame, &mut offsets);
        offsets.clear();
        self.index[depth] = offsets;
        result
    }

    fn close_container(
        &mut self,
        frame: ContainerFrame,
        offsets: &mut Vec<usize>,
    ) -> Result<(), BuilderError> {
        let base = frame.base;
        if offsets.is_empty() {
            self.buf[base] = match frame.kind {
                ContainerKind::Array => format::EMPTY_ARRAY,
                ContainerKind::Object => format::EMPTY_OBJECT,
            };
            return Ok(());
        }
        if frame.kind == ContainerKind::Array && self.children_equal_size(base, offsets) {
            self.close_compact_array(base);
            return Ok(());
        }
        self.close_indexed(frame, offsets)
    }

    fn children_equal_size(&self, base: usize, offsets: &[usize]) -> bool {
        let end = self.buf.len() - base;
        let first = offsets.get(1).copied().unwrap_or(end) - offsets[0];
        offsets.windows(2).all(|pair| pair[1] - pair[0] == first)
            && end - offsets[offsets.len() - 1] == first
    }

    /// Compact arrays use a 1-byte length field when everything fits and
    /// otherwise jump straight to the 8-byte field: the children are
    /// shifted exactly once, never re-widened. The 2- and 4-byte tags are
    /// reserved for readers.
    fn close_compact_array(&mut self, base: usize) {
        let body = self.buf.len() - (base + 1);
        let width = if 1 + 1 + body <= format::max_field_value(1) as usize {
            1
        } else {
            8
        };
        self.shift_tail(base + 1, width);
        self.buf[base] = format::ARRAY_COMPACT_BASE + format::width_index(width);
        let total = 1 + width + body;
        self.write_uint_at(base + 1, total as u64, width);
    }

    fn close_indexed(
        &mut self,
        frame: ContainerFrame,
        offsets: &mut Vec<usize>,
    ) -> Result<(), BuilderError> {
        let base = frame.base;
        let body = self.buf.len() - (base + 1);
        let n = offsets.len();
        let width = index_width(body, n);
        let header = 1 + 2 * width;
        self.shift_tail(base + 1, header - 1);
        for offset in offsets.iter_mut() {
            *offset += header - 1;
        }

        let sorting = frame.kind == ContainerKind::Object && self.options.sort_attribute_names;
        if sorting && n > 1 {
            let buf = &self.buf;
            offsets.sort_unstable_by(|&a, &b| key_bytes(buf, base + a).cmp(key_bytes(buf, base + b)));
        }
        if frame.kind == ContainerKind::Object && self.options.check_attribute_uniqueness {
            self.check_unique_keys(base, offsets, sorting)?;
        }

        let total = header + body + n * width;
        self.buf[base] = match frame.kind {
            ContainerKind::Array => format::ARRAY_INDEXED_BASE,
            // A one-entry table is trivially sorted and tagged as such.
            ContainerKind::Object if sorting || n == 1 => format::OBJECT_SORTED_BASE,
            ContainerKind::Object => format::OBJECT_UNSORTED_BASE,
        } + format::width_index(width);
        self.write_uint_at(base + 1, total as u64, width);
        self.write_uint_at(base + 1 + width, n as u64, width);

        self.buf.reserve(n * width);
        for i in 0..n {
            let entry = (offsets[i] as u64).to_le_bytes();
            self.buf.extend_from_slice(&entry[..width]);
        }
        Ok(())
    }

    fn check_unique_keys(
        &self,
        base: usize,
        offsets: &[usize],
        already_sorted: bool,
    ) -> Result<(), BuilderError> {
        let duplicate = |table: &[usize]| {
            table
                .windows(2)
                .any(|pair| key_bytes(&self.buf, base + pair[0]) == key_bytes(&self.buf, base + pair[1]))
        };
        if already_sorted {
            if duplicate(offsets) {
                return Err(BuilderError::DuplicateAttributeName);
            }
        } else {
            let mut scratch = offsets.to_vec();
            scratch.sort_unstable_by(|&a, &b| {
                key_bytes(&self.buf, base + a).cmp(key_bytes(&self.buf, base + b))
            });
            if duplicate(&scratch) {
                return Err(BuilderError::DuplicateAttributeName);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw byte primitives for the string lexer
    // ------------------------------------------------------------------

    /// Starts a string at the current write position, assuming the short
    /// form. Returns the tag offset for the finalize/promote calls.
    pub(crate) fn begin_string(&mut self) -> usize {
        let base = self.buf.len();
        self.buf.push(format::SHORT_STRING_BASE);
        base
    }

    pub(crate) fn push_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drops the last `n` bytes (used to retract a speculatively emitted
    /// high surrogate).
    pub(crate) fn retract(&mut self, n: usize) {
        self.buf.truncate(self.buf.len() - n);
    }

    /// Turns the short string open at `base` into a long one by shifting
    /// the written bytes forward 8 positions; the length field is filled in
    /// by [`finish_string`](Self::finish_string).
    pub(crate) fn promote_string(&mut self, base: usize) {
        self.shift_tail(base + 1, 8);
    }

    pub(crate) fn finish_string(&mut self, base: usize, large: bool) {
        if large {
            let len = self.buf.len() - (base + 9);
            self.buf[base] = format::LONG_STRING;
            self.write_uint_at(base + 1, len as u64, 8);
        } else {
            let len = self.buf.len() - (base + 1);
            self.buf[base] = format::SHORT_STRING_BASE + len as u8;
        }
    }

    /// Moves the bytes in `from..len` forward by `by`, growing the buffer.
    /// The vacated region keeps stale bytes; callers overwrite it.
    fn shift_tail(&mut self, from: usize, by: usize) {
        let old_len = self.buf.len();
        self.buf.resize(old_len + by, 0);
        self.buf.copy_within(from..old_len, from + by);
    }

    fn write_uint_at(&mut self, at: usize, v: u64, n: usize) {
        self.buf[at..at + n].copy_from_slice(&v.to_le_bytes()[..n]);
    }
}

/// Key bytes of the string starting at `at`; used for index-table sorting.
/// Offsets written by the parser always point at strings.
fn key_bytes(buf: &[u8], at: usize) -> &[u8] {
    let tag = buf[at];
    match tag {
        0x40..=0xbf => {
            let len = (tag - format::SHORT_STRING_BASE) as usize;
            &buf[at + 1..at + 1 + len]
        }
        format::LONG_STRING => {
            let mut len = [0u8; 8];
            len.copy_from_slice(&buf[at + 1..at + 9]);
            let len = u64::from_le_bytes(len) as usize;
            &buf[at + 9..at + 9 + len]
        }
        _ => &[],
    }
}

/// Bytes needed for `v` in a plain little-endian unsigned encoding.
fn uint_width(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    std::cmp::max(1, bits.div_ceil(8))
}

/// Bytes needed for `v` in two's complement.
fn int_width(v: i64) -> usize {
    for n in 1..8usize {
        let bound = 1i64 << (8 * n - 1);
        if v >= -bound && v < bound {
            return n;
        }
    }
    8
}

/// Index-table field width: the smallest of 1/2/4/8 bytes that can hold
/// both the total byte length and the child count.
fn index_width(body: usize, n: usize) -> usize {
    for width in [1usize, 2, 4] {
        let total = 1 + 2 * width + body + n * width;
        let max = format::max_field_value(width);
        if total as u64 <= max && n as u64 <= max {
            return width;
        }
    }
    8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuilderError;

    #[test]
    fn scalar_encodings() {
        let mut b = Builder::new();
        b.add_null();
        b.add_true();
        b.add_false();
        assert_eq!(b.bytes(), &[0x18, 0x1a, 0x19]);
    }

    #[test]
    fn double_bytes_little_endian() {
        let mut b = Builder::new();
        b.add_double(-0.0);
        assert_eq!(b.bytes(), &[0x1b, 0, 0, 0, 0, 0, 0, 0, 0x80]);
    }

    #[test]
    fn uint_width_selection() {
        let mut b = Builder::new();
        b.add_uint(0);
        b.add_uint(9);
        assert_eq!(b.bytes(), &[0x30, 0x39]);

        b.clear();
        b.add_uint(10);
        assert_eq!(b.bytes(), &[0x28, 10]);

        b.clear();
        b.add_uint(300);
        assert_eq!(b.bytes(), &[0x29, 0x2c, 0x01]);

        b.clear();
        b.add_uint(u64::MAX);
        assert_eq!(b.bytes()[0], 0x2f);
        assert_eq!(&b.bytes()[1..], &[0xff; 8]);
    }

    #[test]
    fn neg_int_width_selection() {
        let mut b = Builder::new();
        b.add_neg_int(0);
        b.add_neg_int(1);
        b.add_neg_int(6);
        assert_eq!(b.bytes(), &[0x30, 0x3f, 0x3a]);

        b.clear();
        b.add_neg_int(7);
        assert_eq!(b.bytes(), &[0x20, 0xf9]);

        b.clear();
        b.add_neg_int(128);
        assert_eq!(b.bytes(), &[0x20, 0x80]);

        b.clear();
        b.add_neg_int(129);
        assert_eq!(b.bytes(), &[0x21, 0x7f, 0xff]);

        // i64::MIN is the largest representable magnitude.
        b.clear();
        b.add_neg_int(1u64 << 63);
        assert_eq!(b.bytes(), &[0x27, 0, 0, 0, 0, 0, 0, 0, 0x80]);

        // One past it becomes a double.
        b.clear();
        b.add_neg_int((1u64 << 63) + 1);
        assert_eq!(b.bytes()[0], 0x1b);
    }

    #[test]
    fn short_and_long_strings() {
        let mut b = Builder::new();
        b.add_string("");
        assert_eq!(b.bytes(), &[0x40]);

        b.clear();
        let s = "x".repeat(127);
        b.add_string(&s);
        assert_eq!(b.bytes()[0], 0xbf);
        assert_eq!(b.len(), 128);

        b.clear();
        let s = "x".repeat(128);
        b.add_string(&s);
        assert_eq!(b.bytes()[0], 0x0c);
        assert_eq!(&b.bytes()[1..9], &128u64.to_le_bytes());
        assert_eq!(b.len(), 9 + 128);
    }

    #[test]
    fn empty_containers() {
        let mut b = Builder::new();
        b.add_array();
        b.close().unwrap();
        assert_eq!(b.bytes(), &[0x01]);

        b.clear();
        b.add_object();
        b.close().unwrap();
        assert_eq!(b.bytes(), &[0x0a]);
    }

    #[test]
    fn compact_array_of_small_ints() {
        let mut b = Builder::new();
        let base = b.len();
        b.add_array();
        for v in 1..=3 {
            b.report_add(base).unwrap();
            b.add_uint(v);
        }
        b.close().unwrap();
        assert_eq!(b.bytes(), &[0x02, 0x05, 0x31, 0x32, 0x33]);
    }

    #[test]
    fn mixed_sizes_get_an_index_table() {
        let mut b = Builder::new();
        let base = b.len();
        b.add_array();
        b.report_add(base).unwrap();
        b.add_uint(1);
        b.report_add(base).unwrap();
        b.add_string("ab");
        b.close().unwrap();
        // tag, bytelen, nritems, small int, "ab", two table entries
        assert_eq!(
            b.bytes(),
            &[0x06, 0x09, 0x02, 0x31, 0x42, b'a', b'b', 0x03, 0x04]
        );
    }

    #[test]
    fn nested_equal_size_arrays_stay_compact() {
        let mut b = Builder::new();
        let outer = b.len();
        b.add_array();
        for v in [1u64, 2] {
            b.report_add(outer).unwrap();
            let inner = b.len();
            b.add_array();
            b.report_add(inner).unwrap();
            b.add_uint(v);
            b.close().unwrap();
        }
        b.close().unwrap();
        assert_eq!(
            b.bytes(),
            &[0x02, 0x08, 0x02, 0x03, 0x31, 0x02, 0x03, 0x32]
        );
    }

    #[test]
    fn object_sorted_by_key_bytes() {
        let mut b = Builder::new();
        let base = b.len();
        b.add_object();
        b.report_add(base).unwrap();
        b.add_string("b");
        b.add_uint(2);
        b.report_add(base).unwrap();
        b.add_string("a");
        b.add_uint(1);
        b.close().unwrap();
        assert_eq!(
            b.bytes(),
            &[0x10, 0x0b, 0x02, 0x41, b'b', 0x32, 0x41, b'a', 0x31, 0x06, 0x03]
        );
    }

    #[test]
    fn object_unsorted_keeps_insertion_order() {
        let mut b = Builder::new();
        b.options.sort_attribute_names = false;
        let base = b.len();
        b.add_object();
        b.report_add(base).unwrap();
        b.add_string("b");
        b.add_uint(2);
        b.report_add(base).unwrap();
        b.add_string("a");
        b.add_uint(1);
        b.close().unwrap();
        assert_eq!(
            b.bytes(),
            &[0x14, 0x0b, 0x02, 0x41, b'b', 0x32, 0x41, b'a', 0x31, 0x03, 0x06]
        );
    }

    #[test]
    fn single_entry_object_is_trivially_sorted() {
        for sort in [true, false] {
            let mut b = Builder::new();
            b.options.sort_attribute_names = sort;
            let base = b.len();
            b.add_object();
            b.report_add(base).unwrap();
            b.add_string("a");
            b.add_uint(12);
            b.close().unwrap();
            assert_eq!(b.bytes()[0], 0x10);
        }
    }

    #[test]
    fn duplicate_keys_detected_when_checking() {
        for sort in [true, false] {
            let mut b = Builder::new();
            b.options.sort_attribute_names = sort;
            b.options.check_attribute_uniqueness = true;
            let base = b.len();
            b.add_object();
            for _ in 0..2 {
                b.report_add(base).unwrap();
                b.add_string("a");
                b.add_uint(1);
            }
            assert_eq!(b.close(), Err(BuilderError::DuplicateAttributeName));
        }
    }

    #[test]
    fn duplicate_keys_pass_without_the_check() {
        let mut b = Builder::new();
        let base = b.len();
        b.add_object();
        for _ in 0..2 {
            b.report_add(base).unwrap();
            b.add_string("a");
            b.add_uint(1);
        }
        assert!(b.close().is_ok());
    }

    #[test]
    fn misuse_is_reported() {
        let mut b = Builder::new();
        assert_eq!(b.close(), Err(BuilderError::NotInContainer));
        assert_eq!(b.report_add(0), Err(BuilderError::NotInContainer));

        b.add_uint(1);
        let base = b.len();
        b.add_array();
        assert_eq!(b.report_add(base + 1), Err(BuilderError::MismatchedContainer));
    }

    #[test]
    fn clear_resets_for_reuse() {
        let mut b = Builder::new();
        let base = b.len();
        b.add_array();
        b.report_add(base).unwrap();
        b.add_uint(1);
        b.clear();
        assert!(b.is_empty());
        b.add_true();
        assert_eq!(b.bytes(), &[0x1a]);
    }

    #[test]
    fn string_promotion_primitives() {
        let mut b = Builder::new();
        let base = b.begin_string();
        for _ in 0..127 {
            b.push_byte(b'x');
        }
        b.finish_string(base, false);
        assert_eq!(b.bytes()[0], 0xbf);

        b.clear();
        let base = b.begin_string();
        for _ in 0..128 {
            b.push_byte(b'x');
        }
        b.promote_string(base);
        b.finish_string(base, true);
        assert_eq!(b.bytes()[0], 0x0c);
        assert_eq!(&b.bytes()[1..9], &128u64.to_le_bytes());
        assert_eq!(b.len(), 9 + 128);
        assert!(b.bytes()[9..].iter().all(|&x| x == b'x'));
    }
}
