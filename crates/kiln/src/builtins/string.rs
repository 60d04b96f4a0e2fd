//! The `string` module: byte and UTF-8 code point access.
//!
//! Strings are byte strings. `charAt` indexes bytes; `utf8Len` and `utf8At` walk
//! code points by their lead bytes without validating continuation bytes.

use super::as_string;
use crate::{
    heap::Heap,
    intern::EscapeMode,
    resource::HeapResult,
    types::NativeFn,
    value::Value,
};

pub(super) const NATIVES: &[(&str, NativeFn)] = &[
    ("length", length),
    ("charAt", char_at),
    ("utf8Len", utf8_len),
    ("utf8At", utf8_at),
];

/// Width of the UTF-8 sequence introduced by `lead`, `None` for a byte that cannot
/// start one.
fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

/// Converts a script number to an index below `len`.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the range is checked before casting"
)]
fn index_arg(value: Option<&Value>, len: usize) -> Option<usize> {
    match value {
        Some(&Value::Number(n)) if n >= 0.0 && n < len as f64 => Some(n as usize),
        _ => None,
    }
}

/// `length(s)`: length in bytes.
fn length(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    Ok(match as_string(heap, args.first()) {
        Some(s) => Value::Number(heap.string(s).len() as f64),
        None => Value::Number(f64::NAN),
    })
}

/// `charAt(s, i)`: the one-byte string at byte `i`, `nil` out of range.
fn char_at(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    let Some(s) = as_string(heap, args.first()) else {
        return Ok(Value::Nil);
    };
    let Some(index) = index_arg(args.get(1), heap.string(s).len()) else {
        return Ok(Value::Nil);
    };
    let byte = heap.string(s).as_bytes()[index];
    Ok(Value::Obj(heap.intern(&[byte], EscapeMode::Raw)?))
}

/// `utf8Len(s)`: number of code points, `NaN` on an invalid lead byte.
fn utf8_len(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    let Some(s) = as_string(heap, args.first()) else {
        return Ok(Value::Number(f64::NAN));
    };
    let bytes = heap.string(s).as_bytes();
    let mut count = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        let Some(width) = utf8_width(bytes[i]) else {
            return Ok(Value::Number(f64::NAN));
        };
        i += width;
        count += 1;
    }
    Ok(Value::Number(f64::from(count)))
}

/// `utf8At(s, i)`: the string holding code point `i`.
///
/// `nil` when `i` is not below the byte length or past the last code point, `NaN` on
/// an invalid lead byte before it.
fn utf8_at(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    let Some(s) = as_string(heap, args.first()) else {
        return Ok(Value::Nil);
    };
    let bytes = heap.string(s).as_bytes();
    let Some(index) = index_arg(args.get(1), bytes.len()) else {
        return Ok(Value::Nil);
    };

    let mut start = 0;
    let mut count = 0;
    while start < bytes.len() {
        let Some(width) = utf8_width(bytes[start]) else {
            return Ok(Value::Number(f64::NAN));
        };
        let end = (start + width).min(bytes.len());
        if count == index {
            let code_point = bytes[start..end].to_vec();
            return Ok(Value::Obj(heap.intern(&code_point, EscapeMode::Raw)?));
        }
        start = end;
        count += 1;
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_byte_widths() {
        assert_eq!(utf8_width(b'a'), Some(1));
        assert_eq!("é".as_bytes().first().copied().and_then(utf8_width), Some(2));
        assert_eq!("€".as_bytes().first().copied().and_then(utf8_width), Some(3));
        assert_eq!("😀".as_bytes().first().copied().and_then(utf8_width), Some(4));
        assert_eq!(utf8_width(0x80), None);
        assert_eq!(utf8_width(0xFF), None);
    }

    #[test]
    fn index_must_be_in_range() {
        assert_eq!(index_arg(Some(&Value::Number(0.0)), 3), Some(0));
        assert_eq!(index_arg(Some(&Value::Number(2.7)), 3), Some(2));
        assert_eq!(index_arg(Some(&Value::Number(3.0)), 3), None);
        assert_eq!(index_arg(Some(&Value::Number(-1.0)), 3), None);
        assert_eq!(index_arg(Some(&Value::Number(f64::NAN)), 3), None);
        assert_eq!(index_arg(Some(&Value::Nil), 3), None);
    }
}
