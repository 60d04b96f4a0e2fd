//! The constant table shared by every compiled chunk.
//!
//! Numbers are deduplicated by bit pattern, so `0.0` and `-0.0` get separate slots
//! while every `NaN` with the same payload shares one. Strings are deduplicated by
//! identity, which is content because strings are interned. Anything else gets a
//! fresh slot. Every value in the table is a root.

use ahash::AHashMap;

use crate::{
    heap::{Heap, HeapId},
    object::ObjType,
    resource::{HeapError, HeapResult},
    value::Value,
};

#[derive(Debug, Default)]
pub(crate) struct ConstantPool {
    values: Vec<Value>,
    numbers: AHashMap<u64, u32>,
    strings: AHashMap<HeapId, u32>,
}

impl ConstantPool {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn push(&mut self, value: Value) -> HeapResult<u32> {
        let slot = u32::try_from(self.values.len())
            .ok()
            .filter(|&slot| slot < u32::MAX)
            .ok_or(HeapError::CapacityOverflow {
                requested: self.values.len() as u64 + 1,
                max: u64::from(u32::MAX),
            })?;
        self.values.push(value);
        Ok(slot)
    }
}

impl Heap {
    /// Returns the constant table slot holding `value`, appending it when no equal
    /// number or identical string is already present.
    ///
    /// # Errors
    /// `CapacityOverflow` once the table holds `u32::MAX` slots.
    pub fn find_or_create_constant_slot(&mut self, value: Value) -> HeapResult<u32> {
        match value {
            Value::Number(n) => {
                let bits = n.to_bits();
                if let Some(&slot) = self.constants.numbers.get(&bits) {
                    return Ok(slot);
                }
                let slot = self.constants.push(value)?;
                self.constants.numbers.insert(bits, slot);
                Ok(slot)
            }
            Value::Obj(id) if self.obj_type(id) == ObjType::String => {
                if let Some(&slot) = self.constants.strings.get(&id) {
                    return Ok(slot);
                }
                let slot = self.constants.push(value)?;
                self.constants.strings.insert(id, slot);
                Ok(slot)
            }
            _ => self.constants.push(value),
        }
    }

    #[must_use]
    pub fn constant(&self, index: u32) -> Option<Value> {
        self.constants.values.get(index as usize).copied()
    }

    #[must_use]
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }
}
