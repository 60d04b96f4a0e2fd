//! Tests that the byte accountant stays exact and that the memory ceiling holds.

use std::mem::size_of;

use kiln::{ArenaKind, GcReason, Heap, HeapConfig, HeapError, HeapId, Value};
use pretty_assertions::assert_eq;

/// Sum of the per-object sizes of every live object in `arena`.
fn summed_sizes(heap: &Heap, arena: ArenaKind) -> usize {
    heap.live_ids(arena).map(|id| heap.object_size(id)).sum()
}

fn assert_exact(heap: &Heap) {
    for arena in [ArenaKind::Collectable, ArenaKind::Immortal] {
        assert_eq!(
            heap.arena_bytes(arena),
            summed_sizes(heap, arena),
            "running total of {arena:?} drifted from its objects"
        );
    }
}

/// Bytes a fresh heap holds, and the size of an empty array in it.
fn baseline() -> (usize, usize) {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let bootstrap = heap.total_bytes();
    let array = heap.new_array().unwrap();
    (bootstrap, heap.object_size(array))
}

// =============================================================================
// 1. Running totals
// =============================================================================

/// The running totals equal the sum of object sizes through a mixed workload and
/// across collections.
#[test]
fn totals_match_objects() {
    let mut heap = Heap::new(HeapConfig::new().initial_threshold(2048)).unwrap();
    assert_exact(&heap);

    let keep = heap.new_array().unwrap();
    heap.roots_mut().stack.push(Value::Obj(keep));
    let name = heap.intern_str("Thing").unwrap();
    let class = heap.new_class(name).unwrap();
    heap.array_push(keep, &[Value::Obj(class)]).unwrap();

    for i in 0..200 {
        let instance = heap.new_instance(class).unwrap();
        let field = heap.intern_str(&format!("f{}", i % 7)).unwrap();
        heap.set_field(instance, field, Value::Number(f64::from(i))).unwrap();
        if i % 10 == 0 {
            heap.array_push(keep, &[Value::Obj(instance)]).unwrap();
        }
    }
    assert!(heap.collections() > 0);
    assert_exact(&heap);

    heap.collect_garbage();
    assert_exact(&heap);
}

/// Collection never touches immortal bytes.
#[test]
fn collection_leaves_immortal_bytes_alone() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    heap.intern_str("kept forever").unwrap();
    heap.new_function().unwrap();
    heap.new_array().unwrap();
    let immortal = heap.arena_bytes(ArenaKind::Immortal);

    let stats = heap.collect_garbage();
    assert!(stats.freed_bytes > 0);
    assert_eq!(heap.arena_bytes(ArenaKind::Immortal), immortal);
}

/// A new string is charged exactly its size; an existing one costs nothing.
#[test]
fn strings_charge_immortal_arena() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let before = heap.arena_bytes(ArenaKind::Immortal);
    let collectable = heap.arena_bytes(ArenaKind::Collectable);

    let id = heap.intern_str("fresh").unwrap();
    assert_eq!(heap.arena_bytes(ArenaKind::Immortal), before + heap.object_size(id));
    heap.intern_str("fresh").unwrap();
    assert_eq!(heap.arena_bytes(ArenaKind::Immortal), before + heap.object_size(id));
    assert_eq!(heap.arena_bytes(ArenaKind::Collectable), collectable);

    let empty = heap.intern_str("").unwrap();
    let abc = heap.intern_str("abc").unwrap();
    assert_eq!(heap.object_size(abc) - heap.object_size(empty), 3);
}

/// Each new field is charged the same amount; overwriting is free.
#[test]
fn fields_charge_per_new_key() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let globals = heap.globals();
    let a = heap.intern_str("a").unwrap();
    let b = heap.intern_str("b").unwrap();

    let start = heap.object_size(globals);
    heap.set_field(globals, a, Value::Number(1.0)).unwrap();
    let after_a = heap.object_size(globals);
    heap.set_field(globals, b, Value::Number(2.0)).unwrap();
    let after_b = heap.object_size(globals);
    heap.set_field(globals, a, Value::Number(3.0)).unwrap();

    assert!(after_a > start);
    assert_eq!(after_b - after_a, after_a - start);
    assert_eq!(heap.object_size(globals), after_b);
    assert_exact(&heap);
}

/// Closures are charged for their upvalue slots.
#[test]
fn closures_charge_upvalue_slots() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let plain = heap.new_function().unwrap();
    let capturing = heap.new_function().unwrap();
    heap.with_function_mut(capturing, |f| f.upvalue_count = 3);

    let small = heap.new_closure(plain).unwrap();
    let large = heap.new_closure(capturing).unwrap();
    assert_eq!(
        heap.object_size(large) - heap.object_size(small),
        3 * size_of::<Option<HeapId>>()
    );
}

/// Every bytecode byte is charged with its line number.
#[test]
fn chunk_writes_charge_code_and_lines() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let function = heap.new_function().unwrap();
    let empty = heap.object_size(function);

    for (i, byte) in [0x01u8, 0x02, 0x03].into_iter().enumerate() {
        heap.write_chunk(function, byte, 10 + u32::try_from(i).unwrap()).unwrap();
    }
    let chunk = heap.function(function).chunk();
    assert_eq!(chunk.code(), &[0x01u8, 0x02, 0x03][..]);
    assert_eq!(chunk.lines(), &[10u32, 11, 12][..]);
    assert_eq!(heap.object_size(function), empty + 3 * (1 + size_of::<u32>()));
    assert_exact(&heap);
}

// =============================================================================
// 2. Memory ceiling
// =============================================================================

/// When the ceiling would be crossed, garbage is collected and the request retried.
#[test]
fn memory_pressure_collects_then_succeeds() {
    let (bootstrap, array_size) = baseline();
    let slot = size_of::<Value>();
    let limit = bootstrap + 2 * array_size + 150 * slot;
    let mut heap = Heap::new(HeapConfig::new().max_memory(limit)).unwrap();

    let garbage = heap.new_array().unwrap();
    heap.array_reserve(garbage, 100).unwrap();
    let kept = heap.new_array().unwrap();
    heap.roots_mut().stack.push(Value::Obj(kept));
    heap.array_reserve(kept, 100).unwrap();

    assert!(!heap.is_live(garbage));
    assert_eq!(heap.array(kept).capacity(), 104);
    assert_eq!(heap.last_gc().map(|gc| gc.reason), Some(GcReason::MemoryPressure));
    assert!(heap.total_bytes() <= limit);
}

/// A request that cannot fit even after collecting fails and changes nothing.
#[test]
fn out_of_memory_leaves_heap_unchanged() {
    let (bootstrap, array_size) = baseline();
    let slot = size_of::<Value>();
    let limit = bootstrap + array_size + 64 * slot;
    let mut heap = Heap::new(HeapConfig::new().max_memory(limit)).unwrap();

    let array = heap.new_array().unwrap();
    heap.roots_mut().stack.push(Value::Obj(array));
    let used = heap.total_bytes();

    let err = heap.array_reserve(array, 1000).unwrap_err();
    assert_eq!(
        err,
        HeapError::OutOfMemory {
            requested: 1000 * slot,
            used,
            limit
        }
    );
    assert_eq!(heap.array(array).capacity(), 0);
    assert_eq!(heap.total_bytes(), used);
    assert_eq!(heap.collections(), 1);
    assert_exact(&heap);
}

/// Immortal growth past the ceiling fails without collecting.
#[test]
fn immortal_out_of_memory_does_not_collect() {
    let (bootstrap, _) = baseline();
    let mut heap = Heap::new(HeapConfig::new().max_memory(bootstrap + 64)).unwrap();
    let interned = heap.interned_count();

    let long = "x".repeat(256);
    let result = heap.intern_str(&long);
    assert!(matches!(result, Err(HeapError::OutOfMemory { .. })));
    assert_eq!(heap.collections(), 0);
    assert_eq!(heap.interned_count(), interned);
    assert_eq!(heap.total_bytes(), bootstrap);
}

/// A ceiling below what the bootstrap objects need fails heap creation.
#[test]
fn tiny_ceiling_fails_creation() {
    let result = Heap::new(HeapConfig::new().max_memory(16));
    assert!(matches!(result, Err(HeapError::OutOfMemory { limit: 16, .. })));
}

// =============================================================================
// 3. Teardown
// =============================================================================

/// Teardown releases exactly what the heap held.
#[test]
fn free_all_releases_everything() {
    let mut heap = Heap::new(HeapConfig::default()).unwrap();
    let array = heap.new_array().unwrap();
    heap.roots_mut().stack.push(Value::Obj(array));
    heap.array_push(array, &[Value::Number(1.0)]).unwrap();
    heap.intern_str("bye").unwrap();
    let stats = heap.heap_stats();

    let released = heap.free_all();
    assert_eq!(released.collectable_objects, stats.collectable.live_objects);
    assert_eq!(released.collectable_bytes, stats.collectable.bytes);
    assert_eq!(released.immortal_objects, stats.immortal.live_objects);
    assert_eq!(released.immortal_bytes, stats.immortal.bytes);
}
