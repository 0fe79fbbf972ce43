//! Read-only navigation over a closed VPack value.
//!
//! A [`Slice`] is a borrowed view starting at a value's tag byte. It trusts
//! its input: navigating a buffer that was not produced by the
//! [`Builder`](crate::Builder) may panic on out-of-range accesses, the same
//! way the writing side never re-validates its own output.

use crate::format::{self, ValueType};

/// A borrowed VPack value.
#[derive(Debug, Clone, Copy)]
pub struct Slice<'a> {
    data: &'a [u8],
}

impl<'a> Slice<'a> {
    /// Views the value whose tag byte is at `data[0]`. The slice may extend
    /// past the value's end (e.g. into the next value of a multi-value
    /// sequence); use [`byte_size`](Self::byte_size) to find the boundary.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn tag(&self) -> u8 {
        self.data.first().copied().unwrap_or(format::NONE)
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        ValueType::from_tag(self.tag())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value_type() == ValueType::Null
    }

    #[must_use]
    pub fn is_bool(&self) -> bool {
        self.value_type() == ValueType::Bool
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self.value_type(),
            ValueType::Double | ValueType::Int | ValueType::UInt | ValueType::SmallInt
        )
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        self.value_type() == ValueType::String
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.value_type() == ValueType::Array
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        self.value_type() == ValueType::Object
    }

    /// Total encoded size of this value in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let tag = self.tag();
        match tag {
            format::NONE | format::EMPTY_ARRAY | format::EMPTY_OBJECT => 1,
            format::NULL | format::FALSE | format::TRUE => 1,
            format::DOUBLE => 9,
            0x02..=0x09 | 0x10..=0x17 => {
                let width = container_width(tag);
                self.read_uint(1, width) as usize
            }
            format::LONG_STRING => 9 + self.read_uint(1, 8) as usize,
            0x20..=0x27 => 2 + (tag - format::INT_BASE) as usize,
            0x28..=0x2f => 2 + (tag - format::UINT_BASE) as usize,
            0x30..=0x3f => 1,
            0x40..=0xbf => 1 + (tag - format::SHORT_STRING_BASE) as usize,
            _ => 1,
        }
    }

    /// Number of children of an array or object (0 for anything else).
    ///
    /// Compact arrays carry no count; it is derived from the byte length
    /// and the size of the first child, which all children share.
    #[must_use]
    pub fn length(&self) -> u64 {
        let tag = self.tag();
        match tag {
            format::EMPTY_ARRAY | format::EMPTY_OBJECT => 0,
            0x02..=0x05 => {
                let width = container_width(tag);
                let total = self.read_uint(1, width) as usize;
                let first = Slice::new(&self.data[1 + width..]).byte_size();
                ((total - 1 - width) / first) as u64
            }
            0x06..=0x09 | 0x10..=0x17 => {
                let width = container_width(tag);
                self.read_uint(1 + width, width)
            }
            _ => 0,
        }
    }

    /// The `index`-th element of an array.
    #[must_use]
    pub fn at(&self, index: u64) -> Option<Slice<'a>> {
        let tag = self.tag();
        match tag {
            0x02..=0x05 => {
                if index >= self.length() {
                    return None;
                }
                let width = container_width(tag);
                let first = Slice::new(&self.data[1 + width..]).byte_size();
                Some(Slice::new(&self.data[1 + width + index as usize * first..]))
            }
            0x06..=0x09 => {
                let offset = self.table_entry(index)?;
                Some(Slice::new(&self.data[offset..]))
            }
            _ => None,
        }
    }

    /// The key string of the `index`-th entry of an object, in index-table
    /// order.
    #[must_use]
    pub fn key_at(&self, index: u64) -> Option<Slice<'a>> {
        if !self.is_object() {
            return None;
        }
        let offset = self.table_entry(index)?;
        Some(Slice::new(&self.data[offset..]))
    }

    /// The value of the `index`-th entry of an object, in index-table
    /// order.
    #[must_use]
    pub fn value_at(&self, index: u64) -> Option<Slice<'a>> {
        let key = self.key_at(index)?;
        let offset = self.table_entry(index)? + key.byte_size();
        Some(Slice::new(&self.data[offset..]))
    }

    /// Looks `key` up in an object: binary search over sorted index
    /// tables, linear scan otherwise.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Slice<'a>> {
        let tag = self.tag();
        let n = self.length();
        match tag {
            0x10..=0x13 => {
                let mut lo = 0u64;
                let mut hi = n;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    let probe = self.key_at(mid)?;
                    match probe.string_bytes()?.cmp(key.as_bytes()) {
                        std::cmp::Ordering::Less => lo = mid + 1,
                        std::cmp::Ordering::Greater => hi = mid,
                        std::cmp::Ordering::Equal => return self.value_at(mid),
                    }
                }
                None
            }
            0x14..=0x17 => (0..n)
                .find(|&i| {
                    self.key_at(i)
                        .and_then(|k| k.string_bytes())
                        .is_some_and(|k| k == key.as_bytes())
                })
                .and_then(|i| self.value_at(i)),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self.tag() {
            format::TRUE => Some(true),
            format::FALSE => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_double(&self) -> Option<f64> {
        if self.tag() != format::DOUBLE {
            return None;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[1..9]);
        Some(f64::from_le_bytes(raw))
    }

    /// The value as an unsigned integer, for the small-int, uint and
    /// non-negative int encodings.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        let tag = self.tag();
        match tag {
            0x30..=0x39 => Some(u64::from(tag - format::SMALL_INT_BASE)),
            0x28..=0x2f => Some(self.read_uint(1, (tag - format::UINT_BASE) as usize + 1)),
            0x20..=0x27 | 0x3a..=0x3f => self.to_i64().and_then(|v| u64::try_from(v).ok()),
            _ => None,
        }
    }

    /// The value as a signed integer, for every integer encoding that fits.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        let tag = self.tag();
        match tag {
            0x30..=0x39 => Some(i64::from(tag - format::SMALL_INT_BASE)),
            0x3a..=0x3f => Some(i64::from(tag) - 0x40),
            0x20..=0x27 => {
                let n = (tag - format::INT_BASE) as usize + 1;
                let raw = self.read_uint(1, n);
                let shift = 64 - 8 * n as u32;
                Some(((raw << shift) as i64) >> shift)
            }
            0x28..=0x2f => {
                let v = self.read_uint(1, (tag - format::UINT_BASE) as usize + 1);
                i64::try_from(v).ok()
            }
            _ => None,
        }
    }

    /// The raw bytes of a string value. May contain NUL bytes (a `\u0000`
    /// escape is stored verbatim) and, for strings built from lone
    /// surrogate escapes, byte sequences that are not valid UTF-8.
    #[must_use]
    pub fn string_bytes(&self) -> Option<&'a [u8]> {
        let tag = self.tag();
        match tag {
            0x40..=0xbf => {
                let len = (tag - format::SHORT_STRING_BASE) as usize;
                Some(&self.data[1..1 + len])
            }
            format::LONG_STRING => {
                let len = self.read_uint(1, 8) as usize;
                Some(&self.data[9..9 + len])
            }
            _ => None,
        }
    }

    /// The string value as `&str`, when its bytes are valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.string_bytes()?).ok()
    }

    /// Offset of the `index`-th index-table entry's target, from the
    /// container start.
    fn table_entry(&self, index: u64) -> Option<usize> {
        let tag = self.tag();
        if !matches!(tag, 0x06..=0x09 | 0x10..=0x17) {
            return None;
        }
        let width = container_width(tag);
        let n = self.read_uint(1 + width, width);
        if index >= n {
            return None;
        }
        let total = self.read_uint(1, width) as usize;
        let table = total - n as usize * width;
        Some(self.read_uint(table + index as usize * width, width) as usize)
    }

    fn read_uint(&self, at: usize, n: usize) -> u64 {
        let mut v = 0u64;
        for i in (0..n).rev() {
            v = (v << 8) | u64::from(self.data[at + i]);
        }
        v
    }
}

/// Width of the length/offset fields encoded in a container tag.
fn container_width(tag: u8) -> usize {
    let index = match tag {
        0x02..=0x05 => tag - format::ARRAY_COMPACT_BASE,
        0x06..=0x09 => tag - format::ARRAY_INDEXED_BASE,
        0x10..=0x13 => tag - format::OBJECT_SORTED_BASE,
        0x14..=0x17 => tag - format::OBJECT_UNSORTED_BASE,
        _ => 0,
    };
    format::width_for_index(index)
}
