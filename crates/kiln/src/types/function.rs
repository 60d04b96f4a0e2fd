//! Callables: compiled functions and their bytecode chunks, natives, closures,
//! upvalues and bound methods.

use std::{fmt, mem::size_of};

use crate::{
    heap::{Heap, HeapId},
    object::HeapData,
    resource::HeapResult,
    value::Value,
};

/// Bytecode and the source line of every byte.
#[derive(Debug, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<u32>,
}

impl Chunk {
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Bytes charged for the chunk's buffers.
    pub(crate) fn byte_size(&self) -> usize {
        self.code.len() + self.lines.len() * size_of::<u32>()
    }
}

/// A compiled function. Immortal: functions outlive every closure over them.
#[derive(Debug)]
pub struct Function {
    pub arity: u16,
    /// Number of upvalues every closure over this function captures.
    pub upvalue_count: u16,
    /// Interned name, `None` for the top-level script.
    pub name: Option<HeapId>,
    id: u32,
    chunk: Chunk,
}

impl Function {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            arity: 0,
            upvalue_count: 0,
            name: None,
            id,
            chunk: Chunk::default(),
        }
    }

    /// Heap-unique id, assigned in creation order.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }
}

/// Signature of a native function.
///
/// Natives get the heap so they can allocate; argument-shape mismatches are reported
/// in-band (`NaN` or `nil`), never as errors.
pub type NativeFn = fn(&mut Heap, &[Value]) -> HeapResult<Value>;

#[derive(Clone, Copy)]
pub struct Native {
    pub function: NativeFn,
}

impl Native {
    pub(crate) fn new(function: NativeFn) -> Self {
        Self { function }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Native")
    }
}

/// Where an upvalue's variable currently lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueLocation {
    /// Still on the value stack, at this slot index.
    Open(usize),
    /// Moved into the upvalue when its stack slot was popped.
    Closed(Value),
}

#[derive(Debug)]
pub struct Upvalue {
    pub location: UpvalueLocation,
    /// Next open upvalue, ordered by descending stack slot.
    pub next: Option<HeapId>,
}

#[derive(Debug)]
pub struct Closure {
    function: HeapId,
    /// Captured upvalues, filled in by the interpreter right after creation.
    pub upvalues: Box<[Option<HeapId>]>,
}

impl Closure {
    pub(crate) fn new(function: HeapId, upvalue_count: usize) -> Self {
        Self {
            function,
            upvalues: vec![None; upvalue_count].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn function(&self) -> HeapId {
        self.function
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    receiver: Value,
    method: HeapId,
}

impl BoundMethod {
    pub(crate) fn new(receiver: Value, method: HeapId) -> Self {
        Self { receiver, method }
    }

    #[must_use]
    pub fn receiver(&self) -> Value {
        self.receiver
    }

    /// The bound closure.
    #[must_use]
    pub fn method(&self) -> HeapId {
        self.method
    }
}

impl Heap {
    /// Gives the compiler mutable access to a function's arity, upvalue count and
    /// name. Bytecode goes through [`Heap::write_chunk`].
    pub fn with_function_mut<R>(&mut self, function: HeapId, f: impl FnOnce(&mut Function) -> R) -> R {
        f(self.function_mut(function))
    }

    /// Appends one bytecode byte, with its source line, to `function`'s chunk.
    pub fn write_chunk(&mut self, function: HeapId, byte: u8, line: u32) -> HeapResult<()> {
        self.grow_object(function, 1 + size_of::<u32>(), &[])?;
        let chunk = &mut self.function_mut(function).chunk;
        chunk.code.push(byte);
        chunk.lines.push(line);
        Ok(())
    }

    /// Moves `value` into an open upvalue, closing it. The caller unlinks it from the
    /// open-upvalue chain.
    pub fn close_upvalue(&mut self, upvalue: HeapId, value: Value) {
        self.upvalue_mut(upvalue).location = UpvalueLocation::Closed(value);
    }

    /// Calls the native function object `native` with `args`.
    pub fn call_native(&mut self, native: HeapId, args: &[Value]) -> HeapResult<Value> {
        let function = self.native(native).function;
        function(self, args)
    }

    /// The function a closure or bound method ultimately runs, if `value` is callable
    /// bytecode.
    #[must_use]
    pub fn underlying_function(&self, value: Value) -> Option<HeapId> {
        let id = value.as_obj()?;
        match self.get(id) {
            HeapData::Function(_) => Some(id),
            HeapData::Closure(closure) => Some(closure.function()),
            HeapData::BoundMethod(bound) => Some(self.closure(bound.method()).function()),
            _ => None,
        }
    }
}
