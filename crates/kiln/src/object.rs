//! The closed object model: type tags, payload variants, accounted sizes and the
//! per-variant constructors.

use std::mem::size_of;

use crate::{
    heap::{ArenaKind, Heap, HeapId, ObjHeader},
    resource::HeapResult,
    types::{
        Array, BoundMethod, Class, Closure, Function, Instance, Native, NativeFn, Str, TABLE_ENTRY_SIZE, Upvalue,
        UpvalueLocation,
    },
    value::Value,
};

/// Type tag stored in every object header. Never changes after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum ObjType {
    String,
    Native,
    Function,
    Upvalue,
    Closure,
    BoundMethod,
    Class,
    Instance,
    Array,
}

impl ObjType {
    /// The arena objects of this type are linked into.
    #[must_use]
    pub const fn arena(self) -> ArenaKind {
        match self {
            Self::String | Self::Native | Self::Function => ArenaKind::Immortal,
            Self::Upvalue | Self::Closure | Self::BoundMethod | Self::Class | Self::Instance | Self::Array => {
                ArenaKind::Collectable
            }
        }
    }

    /// Lower snake case name used in logs and statistics.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Payload of a heap slot.
///
/// Every match on this enum is exhaustive: adding a variant forces a decision in the
/// collector's tracing, the size estimate and the printer.
#[derive(Debug)]
pub enum HeapData {
    Str(Str),
    Native(Native),
    Function(Function),
    Upvalue(Upvalue),
    Closure(Closure),
    BoundMethod(BoundMethod),
    Class(Class),
    Instance(Instance),
    Array(Array),
}

impl HeapData {
    #[must_use]
    pub fn obj_type(&self) -> ObjType {
        match self {
            Self::Str(_) => ObjType::String,
            Self::Native(_) => ObjType::Native,
            Self::Function(_) => ObjType::Function,
            Self::Upvalue(_) => ObjType::Upvalue,
            Self::Closure(_) => ObjType::Closure,
            Self::BoundMethod(_) => ObjType::BoundMethod,
            Self::Class(_) => ObjType::Class,
            Self::Instance(_) => ObjType::Instance,
            Self::Array(_) => ObjType::Array,
        }
    }

    /// Bytes charged to the accountant for this object: header, payload and every
    /// owned buffer.
    ///
    /// Strings are charged one byte past their length for the terminator the
    /// language's string layout reserves. Arrays are charged for capacity, not length.
    pub(crate) fn estimate_size(&self) -> usize {
        let payload = match self {
            Self::Str(s) => size_of::<Str>() + s.len() + 1,
            Self::Native(_) => size_of::<Native>(),
            Self::Function(f) => size_of::<Function>() + f.chunk().byte_size(),
            Self::Upvalue(_) => size_of::<Upvalue>(),
            Self::Closure(c) => size_of::<Closure>() + c.upvalues.len() * size_of::<Option<HeapId>>(),
            Self::BoundMethod(_) => size_of::<BoundMethod>(),
            Self::Class(c) => size_of::<Class>() + c.method_count() * TABLE_ENTRY_SIZE,
            Self::Instance(i) => size_of::<Instance>() + i.field_count() * TABLE_ENTRY_SIZE,
            Self::Array(a) => size_of::<Array>() + a.capacity() as usize * size_of::<Value>(),
        };
        size_of::<ObjHeader>() + payload
    }
}

impl Heap {
    /// Creates an open upvalue capturing value stack slot `slot`.
    pub fn new_upvalue(&mut self, slot: usize) -> HeapResult<HeapId> {
        self.allocate(HeapData::Upvalue(Upvalue {
            location: UpvalueLocation::Open(slot),
            next: None,
        }))
    }

    /// Creates an empty compiled function with the next heap-unique function id.
    ///
    /// The compiler fills in arity, upvalue count, name and bytecode afterwards
    /// through [`Heap::with_function_mut`] and [`Heap::write_chunk`].
    pub fn new_function(&mut self) -> HeapResult<HeapId> {
        let id = self.next_function_id()?;
        self.allocate(HeapData::Function(Function::new(id)))
    }

    /// Creates a closure over `function` with every upvalue slot empty.
    pub fn new_closure(&mut self, function: HeapId) -> HeapResult<HeapId> {
        let upvalue_count = usize::from(self.function(function).upvalue_count);
        self.allocate(HeapData::Closure(Closure::new(function, upvalue_count)))
    }

    /// Binds closure `method` to `receiver`.
    pub fn new_bound_method(&mut self, receiver: Value, method: HeapId) -> HeapResult<HeapId> {
        debug_assert_eq!(self.obj_type(method), ObjType::Closure, "bound method must wrap a closure");
        self.allocate(HeapData::BoundMethod(BoundMethod::new(receiver, method)))
    }

    pub fn new_native(&mut self, function: NativeFn) -> HeapResult<HeapId> {
        self.allocate(HeapData::Native(Native::new(function)))
    }

    /// Creates a class named by the interned string `name`, with no methods.
    pub fn new_class(&mut self, name: HeapId) -> HeapResult<HeapId> {
        debug_assert_eq!(self.obj_type(name), ObjType::String, "class name must be a string");
        self.allocate(HeapData::Class(Class::new(Some(name))))
    }

    /// Creates an instance of `class` with no fields.
    pub fn new_instance(&mut self, class: HeapId) -> HeapResult<HeapId> {
        debug_assert_eq!(self.obj_type(class), ObjType::Class, "instance needs a class");
        self.allocate(HeapData::Instance(Instance::new(class)))
    }

    /// Creates an empty array with no buffer.
    pub fn new_array(&mut self) -> HeapResult<HeapId> {
        self.allocate(HeapData::Array(Array::default()))
    }
}
