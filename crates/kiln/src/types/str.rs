use std::borrow::Cow;

/// Immutable interned byte string.
///
/// The content is arbitrary bytes; the language does not require UTF-8. The FNV-1a
/// hash is computed once, before the string is linked, and never changes.
#[derive(Debug)]
pub struct Str {
    hash: u64,
    bytes: Box<[u8]>,
}

impl Str {
    pub(crate) fn new(bytes: Box<[u8]>, hash: u64) -> Self {
        Self { hash, bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the content as `&str` when it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }
}
