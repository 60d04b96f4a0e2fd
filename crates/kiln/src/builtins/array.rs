//! The `array` module.
//!
//! Shape mismatches are answered in-band: `NaN` from the natives that return a
//! number, `nil` or `false` from the others. Only a length outside
//! `0..=ARRAYLIKE_MAX` is fatal.

use super::as_array;
use crate::{
    heap::Heap,
    resource::{HeapError, HeapResult},
    types::{ARRAYLIKE_MAX, NativeFn},
    value::Value,
};

pub(super) const NATIVES: &[(&str, NativeFn)] = &[
    ("resize", resize),
    ("length", length),
    ("pop", pop),
    ("push", push),
    ("Array", construct),
];

/// Converts a script number to an array length.
///
/// Fractions truncate toward zero. Negative, `NaN` and too-large lengths overflow.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the range is checked before casting"
)]
fn length_arg(n: f64) -> HeapResult<u64> {
    if n >= 0.0 && n <= f64::from(ARRAYLIKE_MAX) {
        Ok(n as u64)
    } else {
        Err(HeapError::CapacityOverflow {
            requested: if n > 0.0 { n as u64 } else { u64::MAX },
            max: u64::from(ARRAYLIKE_MAX),
        })
    }
}

/// `length(a)`: number of elements.
fn length(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    Ok(match as_array(heap, args.first()) {
        Some(array) => Value::Number(f64::from(heap.array_length(array))),
        None => Value::Number(f64::NAN),
    })
}

/// `push(a, values...)`: appends and returns the new length.
fn push(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    let Some(array) = as_array(heap, args.first()) else {
        return Ok(Value::Number(f64::NAN));
    };
    let length = heap.array_push(array, &args[1..])?;
    Ok(Value::Number(f64::from(length)))
}

/// `pop(a)`: removes and returns the last element, `nil` when empty.
fn pop(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    Ok(match as_array(heap, args.first()) {
        Some(array) => heap.array_pop(array),
        None => Value::Nil,
    })
}

/// `resize(a, n)`: sets the length, padding with `nil`.
fn resize(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    let (Some(array), Some(Value::Number(n))) = (as_array(heap, args.first()), args.get(1)) else {
        return Ok(Value::Bool(false));
    };
    heap.array_resize(array, length_arg(*n)?)?;
    Ok(Value::Bool(true))
}

/// `Array(n)`: a new array of `n` nils, empty without an argument.
fn construct(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    let length = match args.first() {
        Some(Value::Number(n)) => length_arg(*n)?,
        _ => 0,
    };
    let array = heap.new_array()?;
    heap.array_resize(array, length)?;
    Ok(Value::Obj(array))
}
