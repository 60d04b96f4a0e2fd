//! Tests for the builtin `array`, `string` and `system` native modules.

use kiln::{BuiltinModule, EscapeMode, Heap, HeapConfig, HeapError, HeapId, ObjType, Value};
use pretty_assertions::assert_eq;

fn heap() -> Heap {
    Heap::new(HeapConfig::default()).unwrap()
}

fn call(heap: &mut Heap, module: BuiltinModule, name: &str, args: &[Value]) -> Result<Value, HeapError> {
    let native = heap
        .builtin_native(module, name)
        .unwrap_or_else(|| panic!("{}.{name} is not installed", module.name()));
    heap.call_native(native, args)
}

fn string(heap: &mut Heap, s: &str) -> Value {
    Value::Obj(heap.intern_str(s).unwrap())
}

fn is_nan(value: Value) -> bool {
    value.as_number().is_some_and(f64::is_nan)
}

// =============================================================================
// 1. Module layout
// =============================================================================

/// Every module exposes its natives as fields of its instance.
#[test]
fn modules_expose_natives() {
    let heap = heap();
    let expected: [(BuiltinModule, &[&str]); 3] = [
        (BuiltinModule::Array, &["resize", "length", "pop", "push", "Array"]),
        (BuiltinModule::String, &["length", "charAt", "utf8Len", "utf8At"]),
        (BuiltinModule::System, &["gc", "total", "log"]),
    ];
    for (module, names) in expected {
        for name in names {
            let native = heap.builtin_native(module, name);
            assert!(
                native.is_some_and(|id| heap.obj_type(id) == ObjType::Native),
                "{}.{name} missing",
                module.name()
            );
        }
        assert_eq!(heap.instance(heap.builtin(module)).field_count(), names.len());
    }
    assert_eq!(heap.builtin_native(BuiltinModule::System, "clock"), None);
}

// =============================================================================
// 2. array
// =============================================================================

/// `push` appends every argument after the array and returns the new length.
#[test]
fn push_and_length() {
    let mut heap = heap();
    let array = Value::Obj(heap.new_array().unwrap());
    heap.roots_mut().stack.push(array);

    let length = call(&mut heap, BuiltinModule::Array, "push", &[array, Value::Number(1.0), Value::Nil]).unwrap();
    assert_eq!(length, Value::Number(2.0));
    let length = call(&mut heap, BuiltinModule::Array, "length", &[array]).unwrap();
    assert_eq!(length, Value::Number(2.0));
}

/// `pop` returns the last element, and nil for an empty array.
#[test]
fn pop_native() {
    let mut heap = heap();
    let array = Value::Obj(heap.new_array().unwrap());
    heap.roots_mut().stack.push(array);
    call(&mut heap, BuiltinModule::Array, "push", &[array, Value::Bool(true)]).unwrap();

    assert_eq!(call(&mut heap, BuiltinModule::Array, "pop", &[array]), Ok(Value::Bool(true)));
    assert_eq!(call(&mut heap, BuiltinModule::Array, "pop", &[array]), Ok(Value::Nil));
}

/// Non-array arguments get NaN, nil or false instead of an error.
#[test]
fn array_natives_reject_non_arrays_in_band() {
    let mut heap = heap();
    let text = string(&mut heap, "not an array");
    assert!(is_nan(call(&mut heap, BuiltinModule::Array, "length", &[text]).unwrap()));
    assert!(is_nan(call(&mut heap, BuiltinModule::Array, "push", &[Value::Nil]).unwrap()));
    assert!(is_nan(call(&mut heap, BuiltinModule::Array, "length", &[]).unwrap()));
    assert_eq!(call(&mut heap, BuiltinModule::Array, "pop", &[text]), Ok(Value::Nil));
    assert_eq!(
        call(&mut heap, BuiltinModule::Array, "resize", &[text, Value::Number(1.0)]),
        Ok(Value::Bool(false))
    );
}

/// `resize` pads with nil and reports success.
#[test]
fn resize_native() {
    let mut heap = heap();
    let array = heap.new_array().unwrap();
    heap.roots_mut().stack.push(Value::Obj(array));
    let result = call(&mut heap, BuiltinModule::Array, "resize", &[Value::Obj(array), Value::Number(3.5)]);
    assert_eq!(result, Ok(Value::Bool(true)));
    assert_eq!(heap.array_length(array), 3);
    assert_eq!(
        call(&mut heap, BuiltinModule::Array, "resize", &[Value::Obj(array)]),
        Ok(Value::Bool(false))
    );
}

/// A negative length is a fatal capacity overflow.
#[test]
fn negative_resize_is_fatal() {
    let mut heap = heap();
    let array = Value::Obj(heap.new_array().unwrap());
    heap.roots_mut().stack.push(array);
    let result = call(&mut heap, BuiltinModule::Array, "resize", &[array, Value::Number(-1.0)]);
    assert!(matches!(result, Err(HeapError::CapacityOverflow { .. })));
}

/// `Array(n)` builds n nils; without a number it builds an empty array.
#[test]
fn array_constructor() {
    let mut heap = heap();
    let three = call(&mut heap, BuiltinModule::Array, "Array", &[Value::Number(3.0)]).unwrap();
    let id = three.as_obj().unwrap();
    assert_eq!(heap.obj_type(id), ObjType::Array);
    assert_eq!(heap.array(id).as_slice(), &[Value::Nil; 3]);
    assert_eq!(heap.array(id).capacity(), 8);

    let empty = call(&mut heap, BuiltinModule::Array, "Array", &[]).unwrap();
    assert_eq!(heap.array_length(empty.as_obj().unwrap()), 0);
    assert_eq!(heap.array(empty.as_obj().unwrap()).capacity(), 0);
}

// =============================================================================
// 3. string
// =============================================================================

/// `length` counts bytes, `utf8Len` counts code points.
#[test]
fn byte_and_code_point_lengths() {
    let mut heap = heap();
    let word = string(&mut heap, "héllo");
    assert_eq!(call(&mut heap, BuiltinModule::String, "length", &[word]), Ok(Value::Number(6.0)));
    assert_eq!(call(&mut heap, BuiltinModule::String, "utf8Len", &[word]), Ok(Value::Number(5.0)));
}

/// `charAt` returns the interned one-byte string, nil out of range.
#[test]
fn char_at_returns_interned_byte() {
    let mut heap = heap();
    let abc = string(&mut heap, "abc");
    let b = string(&mut heap, "b");
    assert_eq!(call(&mut heap, BuiltinModule::String, "charAt", &[abc, Value::Number(1.0)]), Ok(b));
    assert_eq!(
        call(&mut heap, BuiltinModule::String, "charAt", &[abc, Value::Number(3.0)]),
        Ok(Value::Nil)
    );
    assert_eq!(
        call(&mut heap, BuiltinModule::String, "charAt", &[abc, Value::Number(-1.0)]),
        Ok(Value::Nil)
    );
}

/// `utf8At` returns whole code points.
#[test]
fn utf8_at_returns_code_points() {
    let mut heap = heap();
    let word = string(&mut heap, "h€llo");
    let euro = string(&mut heap, "€");
    let o = string(&mut heap, "o");
    assert_eq!(call(&mut heap, BuiltinModule::String, "utf8At", &[word, Value::Number(1.0)]), Ok(euro));
    assert_eq!(call(&mut heap, BuiltinModule::String, "utf8At", &[word, Value::Number(4.0)]), Ok(o));
    assert_eq!(
        call(&mut heap, BuiltinModule::String, "utf8At", &[word, Value::Number(5.0)]),
        Ok(Value::Nil)
    );
}

/// An invalid lead byte makes the UTF-8 natives answer NaN.
#[test]
fn invalid_lead_byte_is_nan() {
    let mut heap = heap();
    let broken = Value::Obj(heap.intern(&[b'a', 0x80, b'b'], EscapeMode::Raw).unwrap());
    assert!(is_nan(call(&mut heap, BuiltinModule::String, "utf8Len", &[broken]).unwrap()));
    assert!(is_nan(
        call(&mut heap, BuiltinModule::String, "utf8At", &[broken, Value::Number(2.0)]).unwrap()
    ));
}

/// String natives reject non-strings in band.
#[test]
fn string_natives_reject_non_strings() {
    let mut heap = heap();
    assert!(is_nan(call(&mut heap, BuiltinModule::String, "length", &[Value::Number(1.0)]).unwrap()));
    assert_eq!(
        call(&mut heap, BuiltinModule::String, "charAt", &[Value::Nil, Value::Number(0.0)]),
        Ok(Value::Nil)
    );
}

// =============================================================================
// 4. system
// =============================================================================

/// `total` reports the bytes live in both arenas.
#[test]
fn total_reports_live_bytes() {
    let mut heap = heap();
    heap.intern_str("some bytes").unwrap();
    let expected = heap.total_bytes() as f64;
    assert_eq!(call(&mut heap, BuiltinModule::System, "total", &[]), Ok(Value::Number(expected)));
}

/// `gc` collects and returns nil.
#[test]
fn gc_collects() {
    let mut heap = heap();
    let garbage: HeapId = heap.new_array().unwrap();
    assert_eq!(call(&mut heap, BuiltinModule::System, "gc", &[]), Ok(Value::Nil));
    assert!(!heap.is_live(garbage));
    assert_eq!(heap.collections(), 1);
}

/// `log` answers nil whatever it is given.
#[test]
fn log_returns_nil() {
    let mut heap = heap();
    let greeting = string(&mut heap, "hello");
    assert_eq!(call(&mut heap, BuiltinModule::System, "log", &[]), Ok(Value::Nil));
    assert_eq!(
        call(&mut heap, BuiltinModule::System, "log", &[greeting, Value::Number(2.0), Value::Nil]),
        Ok(Value::Nil)
    );
}
