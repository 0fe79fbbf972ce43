/// Configuration for a parse run.
///
/// The option set lives on the [`Parser`](crate::Parser) and is copied into
/// the [`Builder`](crate::Builder) when a parse starts, so a single record
/// governs both the reading and the writing side. There is no process-wide
/// state.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Whether object index tables are sorted by the byte order of their
    /// keys when a container is closed.
    ///
    /// Sorting makes key lookup on the result a binary search and makes the
    /// encoding of an object independent of its key insertion order. The
    /// stored payload keeps document order either way; only the index table
    /// is permuted.
    ///
    /// # Default
    ///
    /// `true`
    pub sort_attribute_names: bool,

    /// Whether closing an object verifies that no key occurs twice.
    ///
    /// The check runs against the sorted index table (a scratch copy is
    /// sorted when `sort_attribute_names` is off) and turns a duplicate into
    /// [`BuilderError::DuplicateAttributeName`](crate::BuilderError::DuplicateAttributeName).
    ///
    /// # Default
    ///
    /// `false`
    pub check_attribute_uniqueness: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            sort_attribute_names: true,
            check_attribute_uniqueness: false,
        }
    }
}
