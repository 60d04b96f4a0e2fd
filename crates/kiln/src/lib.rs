#![doc = include_str!("../../../README.md")]

mod builtins;
mod constants;
mod gc;
mod heap;
mod intern;
mod object;
mod repr;
mod resource;
mod types;
mod value;

pub use crate::{
    builtins::BuiltinModule,
    gc::{GcReason, GcStats, MarkSense, Roots},
    heap::{ArenaKind, ArenaStats, Heap, HeapDiff, HeapId, HeapStats, TeardownStats},
    intern::{EscapeMode, hash_bytes},
    object::{HeapData, ObjType},
    repr::format_number,
    resource::{DEFAULT_GROWTH_FACTOR, DEFAULT_INITIAL_THRESHOLD, HeapConfig, HeapError, HeapResult},
    types::{
        ARRAYLIKE_MAX, Array, BoundMethod, Chunk, Class, Closure, Function, Instance, Native, NativeFn, Str, Upvalue,
        UpvalueLocation, grown_capacity,
    },
    value::Value,
};
