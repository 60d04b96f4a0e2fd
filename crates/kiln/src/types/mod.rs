//! Payload types of the heap object variants, one file per family.

pub(crate) mod array;
pub(crate) mod class;
pub(crate) mod function;
pub(crate) mod str;

pub use crate::types::{
    array::{ARRAYLIKE_MAX, Array, grown_capacity},
    class::{Class, Instance},
    function::{BoundMethod, Chunk, Closure, Function, Native, NativeFn, Upvalue, UpvalueLocation},
    str::Str,
};
pub(crate) use crate::types::class::TABLE_ENTRY_SIZE;
