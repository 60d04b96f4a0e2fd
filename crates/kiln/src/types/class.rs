//! Classes and instances.
//!
//! Both own a table keyed by interned string ids: methods for a class, fields for an
//! instance. Keys are identity-compared, which is content comparison because every
//! string is interned. Tables only grow; each new key is charged one
//! [`TABLE_ENTRY_SIZE`] before it is inserted.

use std::mem::size_of;

use indexmap::IndexMap;

use crate::{
    heap::{Heap, HeapId},
    object::{HeapData, ObjType},
    resource::HeapResult,
    value::Value,
};

pub(crate) type Table = IndexMap<HeapId, Value, ahash::RandomState>;

/// Bytes charged per table entry: key, value and the index slot with its hash.
pub(crate) const TABLE_ENTRY_SIZE: usize = size_of::<HeapId>() + size_of::<Value>() + 2 * size_of::<u64>();

#[derive(Debug)]
pub struct Class {
    name: Option<HeapId>,
    /// Cached `init` method, `Nil` when the class has none.
    pub initializer: Value,
    methods: Table,
}

impl Class {
    pub(crate) fn new(name: Option<HeapId>) -> Self {
        Self {
            name,
            initializer: Value::Nil,
            methods: Table::default(),
        }
    }

    /// Interned class name. `None` only for the heap's sentinel class.
    #[must_use]
    pub fn name(&self) -> Option<HeapId> {
        self.name
    }

    #[must_use]
    pub fn method(&self, name: HeapId) -> Option<Value> {
        self.methods.get(&name).copied()
    }

    /// Methods in definition order.
    pub fn methods(&self) -> impl Iterator<Item = (HeapId, Value)> + '_ {
        self.methods.iter().map(|(&k, &v)| (k, v))
    }

    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

#[derive(Debug)]
pub struct Instance {
    class: HeapId,
    fields: Table,
}

impl Instance {
    pub(crate) fn new(class: HeapId) -> Self {
        Self {
            class,
            fields: Table::default(),
        }
    }

    #[must_use]
    pub fn class(&self) -> HeapId {
        self.class
    }

    #[must_use]
    pub fn field(&self, name: HeapId) -> Option<Value> {
        self.fields.get(&name).copied()
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (HeapId, Value)> + '_ {
        self.fields.iter().map(|(&k, &v)| (k, v))
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

fn class_methods(data: &mut HeapData) -> &mut Table {
    match data {
        HeapData::Class(class) => &mut class.methods,
        other => panic!("Heap::set_method: expected Class, found {}", other.obj_type().name()),
    }
}

fn instance_fields(data: &mut HeapData) -> &mut Table {
    match data {
        HeapData::Instance(instance) => &mut instance.fields,
        other => panic!("Heap::set_field: expected Instance, found {}", other.obj_type().name()),
    }
}

impl Heap {
    /// Sets field `name` of `instance` to `value`, adding the field if needed.
    pub fn set_field(&mut self, instance: HeapId, name: HeapId, value: Value) -> HeapResult<()> {
        self.table_set(instance, name, value, instance_fields)
    }

    #[must_use]
    pub fn get_field(&self, instance: HeapId, name: HeapId) -> Option<Value> {
        self.instance(instance).field(name)
    }

    /// Defines method `name` on `class`. Defining `init` also fills the class's
    /// initializer cache.
    pub fn set_method(&mut self, class: HeapId, name: HeapId, method: Value) -> HeapResult<()> {
        self.table_set(class, name, method, class_methods)?;
        if name == self.init_string() {
            self.class_mut(class).initializer = method;
        }
        Ok(())
    }

    #[must_use]
    pub fn get_method(&self, class: HeapId, name: HeapId) -> Option<Value> {
        self.class(class).method(name)
    }

    fn table_set(
        &mut self,
        owner: HeapId,
        name: HeapId,
        value: Value,
        table: fn(&mut HeapData) -> &mut Table,
    ) -> HeapResult<()> {
        debug_assert_eq!(self.obj_type(name), ObjType::String, "table keys are interned strings");
        if let Some(slot) = table(self.get_mut(owner)).get_mut(&name) {
            *slot = value;
            return Ok(());
        }
        self.grow_object(owner, TABLE_ENTRY_SIZE, &[value])?;
        table(self.get_mut(owner)).insert(name, value);
        Ok(())
    }
}
