//! Dynamic arrays and their capacity growth policy.
//!
//! Capacity is always a multiple of 8 and never exceeds [`ARRAYLIKE_MAX`]. Small
//! arrays double, larger ones grow by half, and a request never gets less than it
//! asked for. Buffers only grow: shrinking the length keeps the capacity.

use std::{collections::TryReserveError, mem::size_of};

use crate::{
    heap::{Heap, HeapId},
    resource::{HeapError, HeapResult},
    value::Value,
};

/// Largest capacity an array (or any array-like buffer) may have.
pub const ARRAYLIKE_MAX: u32 = 0xFFFF_FFF8;

/// Capacities below this double on growth; from here on they grow by half.
const FAST_GROWTH_LIMIT: u64 = 64;

#[derive(Debug, Default)]
pub struct Array {
    elements: Vec<Value>,
    /// Accounted capacity. The backing `Vec` holds at least this much.
    capacity: u32,
}

impl Array {
    #[must_use]
    pub fn len(&self) -> u32 {
        u32::try_from(self.elements.len()).expect("Array::len: length exceeds capacity bound")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<Value> {
        self.elements.get(index as usize).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.elements
    }

    /// Grows the buffer to exactly `capacity` slots. Callers charge the bytes first.
    ///
    /// Fails, leaving the array unchanged, when the host allocator cannot supply the
    /// buffer.
    pub(crate) fn set_capacity(&mut self, capacity: u32) -> Result<(), TryReserveError> {
        debug_assert!(capacity >= self.capacity, "array capacity never shrinks");
        self.elements.try_reserve_exact(capacity as usize - self.elements.len())?;
        self.capacity = capacity;
        Ok(())
    }
}

/// Rounds `size` up to the next multiple of 8.
fn align8(size: u64) -> u64 {
    size.saturating_add(7) & !7
}

/// Computes the capacity an array with `current` capacity must grow to in order to
/// hold `requested` elements.
///
/// Returns `Ok(None)` when no growth is needed.
///
/// # Errors
/// `CapacityOverflow` if `requested` rounded up to a multiple of 8 exceeds
/// [`ARRAYLIKE_MAX`].
pub fn grown_capacity(current: u32, requested: u64) -> HeapResult<Option<u32>> {
    let target = align8(requested);
    let current = u64::from(current);
    if target <= current {
        return Ok(None);
    }
    if target > u64::from(ARRAYLIKE_MAX) {
        return Err(HeapError::CapacityOverflow {
            requested,
            max: u64::from(ARRAYLIKE_MAX),
        });
    }

    let grown = if current < FAST_GROWTH_LIMIT {
        current * 2
    } else {
        current * 3 / 2
    };
    let next = align8(target.max(grown)).min(u64::from(ARRAYLIKE_MAX));
    Ok(Some(u32::try_from(next).expect("grown_capacity: clamped to ARRAYLIKE_MAX")))
}

impl Heap {
    /// Ensures `array` can hold `requested` elements without further growth.
    ///
    /// # Errors
    /// `CapacityOverflow` above [`ARRAYLIKE_MAX`], `OutOfMemory` past the memory
    /// ceiling or when the host cannot supply the buffer. The array and the byte
    /// totals are unchanged on error.
    pub fn array_reserve(&mut self, array: HeapId, requested: u64) -> HeapResult<()> {
        self.reserve_array(array, requested, &[])
    }

    fn reserve_array(&mut self, id: HeapId, requested: u64, incoming: &[Value]) -> HeapResult<()> {
        let current = self.array(id).capacity();
        let Some(next) = grown_capacity(current, requested)? else {
            return Ok(());
        };

        let additional = (next - current) as usize * size_of::<Value>();
        self.grow_object(id, additional, incoming)?;
        if self.array_mut(id).set_capacity(next).is_err() {
            self.release_growth(id, additional);
            return Err(HeapError::OutOfMemory {
                requested: additional,
                used: self.total_bytes(),
                limit: self.config().max_memory.unwrap_or(usize::MAX),
            });
        }
        log::trace!("[gc] {id} grow array {current} -> {next}");
        Ok(())
    }

    /// Appends `values` to `array` and returns the new length.
    pub fn array_push(&mut self, array: HeapId, values: &[Value]) -> HeapResult<u32> {
        if !values.is_empty() {
            let needed = u64::from(self.array(array).len()) + values.len() as u64;
            self.reserve_array(array, needed, values)?;
            self.array_mut(array).elements.extend_from_slice(values);
        }
        Ok(self.array(array).len())
    }

    /// Removes and returns the last element, or `Nil` when the array is empty.
    pub fn array_pop(&mut self, array: HeapId) -> Value {
        self.array_mut(array).elements.pop().unwrap_or_default()
    }

    /// Sets the length of `array`, filling new slots with `Nil`.
    ///
    /// Shrinking truncates the length and keeps the capacity.
    pub fn array_resize(&mut self, array: HeapId, length: u64) -> HeapResult<()> {
        let current = u64::from(self.array(array).len());
        if length > current {
            self.reserve_array(array, length, &[])?;
        }
        let length = usize::try_from(length).expect("Heap::array_resize: length checked against capacity");
        self.array_mut(array).elements.resize(length, Value::Nil);
        Ok(())
    }

    #[must_use]
    pub fn array_get(&self, array: HeapId, index: u32) -> Option<Value> {
        self.array(array).get(index)
    }

    /// Overwrites the element at `index`. Returns `false` when `index` is out of range.
    pub fn array_set(&mut self, array: HeapId, index: u32, value: Value) -> bool {
        match self.array_mut(array).elements.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn array_length(&self, array: HeapId) -> u32 {
        self.array(array).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_requests_to_multiples_of_eight() {
        assert_eq!(grown_capacity(0, 1), Ok(Some(8)));
        assert_eq!(grown_capacity(0, 9), Ok(Some(16)));
        assert_eq!(grown_capacity(0, 0), Ok(None));
    }

    #[test]
    fn small_capacities_double() {
        assert_eq!(grown_capacity(8, 9), Ok(Some(16)));
        assert_eq!(grown_capacity(32, 33), Ok(Some(64)));
    }

    #[test]
    fn large_capacities_grow_by_half() {
        assert_eq!(grown_capacity(64, 65), Ok(Some(96)));
        assert_eq!(grown_capacity(96, 97), Ok(Some(144)));
        assert_eq!(grown_capacity(100, 101), Ok(Some(152)));
    }

    #[test]
    fn large_request_wins_over_growth() {
        assert_eq!(grown_capacity(8, 1000), Ok(Some(1000)));
        assert_eq!(grown_capacity(64, 1001), Ok(Some(1008)));
    }

    #[test]
    fn growth_is_clamped_to_maximum() {
        let near_max = ARRAYLIKE_MAX - 8;
        assert_eq!(
            grown_capacity(near_max, u64::from(near_max) + 1),
            Ok(Some(ARRAYLIKE_MAX))
        );
    }

    #[test]
    fn requests_above_maximum_overflow() {
        let requested = u64::from(ARRAYLIKE_MAX) + 1;
        assert_eq!(
            grown_capacity(0, requested),
            Err(HeapError::CapacityOverflow {
                requested,
                max: u64::from(ARRAYLIKE_MAX)
            })
        );
        assert_eq!(grown_capacity(0, u64::from(ARRAYLIKE_MAX)), Ok(Some(ARRAYLIKE_MAX)));
    }
}
