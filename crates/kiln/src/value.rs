use crate::heap::HeapId;

/// A runtime value of the scripting language.
///
/// Immediates (nil, booleans, numbers) live inline; everything else is an object in
/// one of the heap's arenas, referenced by `Obj(HeapId)`. Values are `Copy`: the
/// collector, not ownership, decides when an object dies.
///
/// Equality follows the language: numbers compare with IEEE `==` (so `NaN != NaN`),
/// objects compare by identity. Interned strings make identity equal to content
/// equality for strings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Obj(HeapId),
}

impl Value {
    /// Returns the object id if this value references a heap object.
    #[inline]
    #[must_use]
    pub fn as_obj(self) -> Option<HeapId> {
        match self {
            Self::Obj(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_nil(self) -> bool {
        matches!(self, Self::Nil)
    }

    /// `nil` and `false` are falsey, every other value is truthy.
    #[inline]
    #[must_use]
    pub fn is_falsey(self) -> bool {
        matches!(self, Self::Nil | Self::Bool(false))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<HeapId> for Value {
    fn from(id: HeapId) -> Self {
        Self::Obj(id)
    }
}
