//! Stop-the-world mark and sweep collector for the collectable arena.
//!
//! Marking uses an explicit gray worklist owned by the heap, so deep object graphs
//! never recurse. The mark bit is sense-reversing: instead of clearing every mark
//! after a cycle, the meaning of "reached" flips. Objects allocated between cycles
//! carry the opposite of the current sense and are therefore unreached until the
//! next mark phase proves otherwise.
//!
//! Immortal objects (strings, natives, compiled functions) are never pushed onto the
//! worklist and never swept.

use crate::{
    heap::{ArenaKind, Heap, HeapId},
    object::HeapData,
    types::UpvalueLocation,
    value::Value,
};

/// The two values of the mark bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSense {
    Black,
    White,
}

impl MarkSense {
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }
}

/// What started a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum GcReason {
    /// `collect_garbage` or the `gc()` native.
    Explicit,
    /// Collectable bytes would cross the threshold.
    Threshold,
    /// Stress mode collects on every collectable growth.
    Stress,
    /// The memory ceiling would be exceeded; collect once before giving up.
    MemoryPressure,
}

/// Outcome of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GcStats {
    pub reason: GcReason,
    pub freed_objects: usize,
    pub freed_bytes: usize,
    pub live_objects: usize,
    pub live_bytes: usize,
    pub next_threshold: usize,
}

/// The interpreter-owned part of the root set.
///
/// The globals instance, builtin module instances, sentinel class and constant
/// table are rooted by the heap itself.
#[derive(Debug, Default)]
pub struct Roots {
    /// The value stack.
    pub stack: Vec<Value>,
    /// Closures of the active call frames, innermost last.
    pub frames: Vec<HeapId>,
    /// Head of the open-upvalue chain.
    pub open_upvalues: Option<HeapId>,
    pub(crate) globals: Option<HeapId>,
    pub(crate) builtins: Vec<HeapId>,
    pub(crate) empty_class: Option<HeapId>,
}

impl Heap {
    /// Mutable access to the interpreter's roots.
    pub fn roots_mut(&mut self) -> &mut Roots {
        &mut self.roots
    }

    #[must_use]
    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Runs a full collection now.
    pub fn collect_garbage(&mut self) -> GcStats {
        self.collect(GcReason::Explicit, &[])
    }

    /// Number of completed collections.
    #[must_use]
    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Statistics of the most recent collection.
    #[must_use]
    pub fn last_gc(&self) -> Option<&GcStats> {
        self.last_gc.as_ref()
    }

    /// Collects with `pinned` treated as extra roots.
    pub(crate) fn collect(&mut self, reason: GcReason, pinned: &[HeapId]) -> GcStats {
        let before = self.accountant.bytes(ArenaKind::Collectable);
        log::debug!("-- gc begin ({})", <&'static str>::from(reason));

        self.mark_roots(pinned);
        self.trace_references();
        let (freed_objects, freed_bytes) = self.sweep();
        self.sense = self.sense.flip();
        self.accountant.reset_threshold();
        self.collections += 1;

        let live_bytes = self.accountant.bytes(ArenaKind::Collectable);
        let stats = GcStats {
            reason,
            freed_objects,
            freed_bytes,
            live_objects: self.collectable.stats(live_bytes).live_objects,
            live_bytes,
            next_threshold: self.accountant.next_gc(),
        };
        log::debug!(
            "-- gc end\n   collected {} bytes (from {before} to {live_bytes}) next at {}",
            before - live_bytes,
            stats.next_threshold
        );
        self.last_gc = Some(stats.clone());
        stats
    }

    fn mark_roots(&mut self, pinned: &[HeapId]) {
        let gray = &mut self.gray;
        let roots = &self.roots;
        for &value in &roots.stack {
            push_value(gray, value);
        }
        for &closure in &roots.frames {
            push_id(gray, closure);
        }
        let fixed = [roots.open_upvalues, roots.globals, roots.empty_class];
        for id in fixed.into_iter().flatten() {
            push_id(gray, id);
        }
        for &instance in &roots.builtins {
            push_id(gray, instance);
        }
        for &value in self.constants.values() {
            push_value(gray, value);
        }
        for &id in pinned {
            push_id(gray, id);
        }
    }

    fn trace_references(&mut self) {
        let sense = self.sense;
        while let Some(id) = self.gray.pop() {
            let entry = self
                .collectable
                .entry_mut(id)
                .expect("Heap::collect: reference to a freed object");
            if entry.header.mark == sense {
                continue;
            }
            entry.header.mark = sense;
            collect_child_ids(&entry.data, &mut self.gray);
        }
    }

    fn sweep(&mut self) -> (usize, usize) {
        let mut freed_objects = 0;
        let mut freed_bytes = 0;
        self.collectable.sweep(self.sense, |id, entry| {
            debug_assert_eq!(entry.header.size, entry.data.estimate_size(), "{id} size drifted");
            log::trace!("[gc] {id} free type {}", entry.header.kind.name());
            freed_objects += 1;
            freed_bytes += entry.header.size;
        });
        self.accountant.resize(ArenaKind::Collectable, freed_bytes, 0);
        (freed_objects, freed_bytes)
    }
}

fn push_id(work_list: &mut Vec<HeapId>, id: HeapId) {
    if id.is_collectable() {
        work_list.push(id);
    }
}

fn push_value(work_list: &mut Vec<HeapId>, value: Value) {
    if let Value::Obj(id) = value {
        push_id(work_list, id);
    }
}

/// Pushes the collectable objects `data` references onto `work_list`.
pub(crate) fn collect_child_ids(data: &HeapData, work_list: &mut Vec<HeapId>) {
    match data {
        HeapData::Str(_) | HeapData::Native(_) | HeapData::Function(_) => {}
        HeapData::Upvalue(upvalue) => {
            if let UpvalueLocation::Closed(value) = upvalue.location {
                push_value(work_list, value);
            }
            if let Some(next) = upvalue.next {
                push_id(work_list, next);
            }
        }
        HeapData::Closure(closure) => {
            for &upvalue in closure.upvalues.iter().flatten() {
                push_id(work_list, upvalue);
            }
        }
        HeapData::BoundMethod(bound) => {
            push_value(work_list, bound.receiver());
            push_id(work_list, bound.method());
        }
        HeapData::Class(class) => {
            push_value(work_list, class.initializer);
            for (_, method) in class.methods() {
                push_value(work_list, method);
            }
        }
        HeapData::Instance(instance) => {
            push_id(work_list, instance.class());
            for (_, field) in instance.fields() {
                push_value(work_list, field);
            }
        }
        HeapData::Array(array) => {
            for &element in array.as_slice() {
                push_value(work_list, element);
            }
        }
    }
}
