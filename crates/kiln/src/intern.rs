//! Content-based string interning.
//!
//! Every string object lives in the immortal arena and is unique by content: the pool
//! maps a content hash to the ids of the strings with that hash, and every path that
//! creates a string checks it first. Equality of interned strings is therefore id
//! equality.
//!
//! Two paths build the candidate string before they can look it up, escape processing
//! and concatenation. On a hit they retract the candidate, which is always the most
//! recent immortal allocation because nothing allocates between linking it and
//! checking the pool.

use hashbrown::HashTable;

use crate::{
    heap::{Arena, Heap, HeapId},
    object::HeapData,
    resource::{HeapError, HeapResult},
    types::Str,
};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash of `bytes`.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// How [`Heap::intern`] treats backslashes in its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeMode {
    /// Bytes are taken verbatim.
    #[default]
    Raw,
    /// `\"` and `\\` collapse to `"` and `\`. Any other backslash pair, and a trailing
    /// lone backslash, is kept as written.
    Escaped,
}

/// Length of `bytes` after escape processing.
pub(crate) fn unescaped_len(bytes: &[u8]) -> usize {
    let mut len = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && matches!(bytes.get(i + 1), Some(b'"' | b'\\')) {
            i += 2;
        } else {
            i += 1;
        }
        len += 1;
    }
    len
}

/// Applies escape processing to `bytes`.
pub(crate) fn unescape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(unescaped_len(bytes));
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'\\', Some(&next @ (b'"' | b'\\'))) => {
                out.push(next);
                i += 2;
            }
            (byte, _) => {
                out.push(byte);
                i += 1;
            }
        }
    }
    out
}

/// Hash set of the interned strings, keyed by content.
#[derive(Debug, Default)]
pub(crate) struct StringPool {
    table: HashTable<(u64, HeapId)>,
}

impl StringPool {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn clear(&mut self) {
        self.table = HashTable::new();
    }

    /// Finds the interned string with content `bytes`, reading candidates from `arena`.
    pub fn find(&self, hash: u64, bytes: &[u8], arena: &Arena) -> Option<HeapId> {
        self.table
            .find(hash, |&(entry_hash, id)| {
                entry_hash == hash
                    && matches!(arena.entry(id).map(|e| &e.data), Some(HeapData::Str(s)) if s.as_bytes() == bytes)
            })
            .map(|&(_, id)| id)
    }

    /// Registers a string known not to be in the pool.
    pub fn insert(&mut self, hash: u64, id: HeapId) {
        self.table.insert_unique(hash, (hash, id), |&(entry_hash, _)| entry_hash);
    }
}

fn check_string_len(len: usize) -> HeapResult<()> {
    if u32::try_from(len).is_err() {
        return Err(HeapError::CapacityOverflow {
            requested: len as u64,
            max: u64::from(u32::MAX),
        });
    }
    Ok(())
}

impl Heap {
    /// Returns the interned string with content `bytes`, creating it if needed.
    ///
    /// With [`EscapeMode::Escaped`] the content is the escape-processed form of
    /// `bytes`, so `intern(br#"a\"b"#, Escaped)` and `intern(br#"a"b"#, Raw)` return
    /// the same id.
    ///
    /// # Errors
    /// `CapacityOverflow` for content longer than `u32::MAX` bytes, `OutOfMemory`
    /// past the memory ceiling.
    pub fn intern(&mut self, bytes: &[u8], mode: EscapeMode) -> HeapResult<HeapId> {
        match mode {
            EscapeMode::Raw => {
                check_string_len(bytes.len())?;
                let hash = hash_bytes(bytes);
                if let Some(id) = self.strings.find(hash, bytes, &self.immortal) {
                    return Ok(id);
                }
                let id = self.link_string(Box::from(bytes), hash)?;
                self.strings.insert(hash, id);
                Ok(id)
            }
            EscapeMode::Escaped => {
                check_string_len(unescaped_len(bytes))?;
                let content = unescape(bytes);
                let hash = hash_bytes(&content);
                let candidate = self.link_string(content.into_boxed_slice(), hash)?;
                Ok(self.publish_or_retract(candidate, hash))
            }
        }
    }

    /// Interns a Rust string verbatim.
    pub fn intern_str(&mut self, s: &str) -> HeapResult<HeapId> {
        self.intern(s.as_bytes(), EscapeMode::Raw)
    }

    /// Returns the interned concatenation of strings `a` and `b`.
    pub fn concat(&mut self, a: HeapId, b: HeapId) -> HeapResult<HeapId> {
        let (left, right) = (self.string(a).as_bytes(), self.string(b).as_bytes());
        check_string_len(left.len() + right.len())?;
        let mut content = Vec::with_capacity(left.len() + right.len());
        content.extend_from_slice(left);
        content.extend_from_slice(right);

        let hash = hash_bytes(&content);
        let candidate = self.link_string(content.into_boxed_slice(), hash)?;
        Ok(self.publish_or_retract(candidate, hash))
    }

    /// Looks up an interned string without creating it.
    #[must_use]
    pub fn find_string(&self, bytes: &[u8]) -> Option<HeapId> {
        self.strings.find(hash_bytes(bytes), bytes, &self.immortal)
    }

    /// Number of strings in the intern pool.
    #[must_use]
    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    fn link_string(&mut self, content: Box<[u8]>, hash: u64) -> HeapResult<HeapId> {
        self.allocate(HeapData::Str(Str::new(content, hash)))
    }

    /// Returns the pooled twin of `candidate` after retracting it, or registers
    /// `candidate` when it is new.
    fn publish_or_retract(&mut self, candidate: HeapId, hash: u64) -> HeapId {
        let existing = self
            .strings
            .find(hash, self.string(candidate).as_bytes(), &self.immortal);
        match existing {
            Some(id) => {
                self.retract(candidate);
                id
            }
            None => {
                self.strings.insert(hash, candidate);
                candidate
            }
        }
    }
}
