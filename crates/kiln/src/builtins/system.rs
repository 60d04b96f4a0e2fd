//! The `system` module: collector control, memory introspection and printing.

use crate::{heap::Heap, resource::HeapResult, types::NativeFn, value::Value};

pub(super) const NATIVES: &[(&str, NativeFn)] = &[("gc", gc), ("total", total), ("log", log_values)];

/// `gc()`: runs a full collection now.
fn gc(heap: &mut Heap, _args: &[Value]) -> HeapResult<Value> {
    heap.collect_garbage();
    Ok(Value::Nil)
}

/// `total()`: bytes live in both arenas.
fn total(heap: &mut Heap, _args: &[Value]) -> HeapResult<Value> {
    Ok(Value::Number(heap.total_bytes() as f64))
}

/// `log(values...)`: prints the arguments on one line to stdout. Prints nothing
/// without arguments.
fn log_values(heap: &mut Heap, args: &[Value]) -> HeapResult<Value> {
    if !args.is_empty() {
        println!("{}", heap.format_values(args));
    }
    Ok(Value::Nil)
}
