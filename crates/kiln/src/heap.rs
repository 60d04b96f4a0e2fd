use std::{collections::BTreeMap, fmt};

use smallvec::SmallVec;

use crate::{
    builtins::{self, BuiltinModule},
    constants::ConstantPool,
    gc::{GcReason, GcStats, MarkSense, Roots, collect_child_ids},
    intern::StringPool,
    object::{HeapData, ObjType},
    resource::{Accountant, HeapConfig, HeapError, HeapResult},
    types::{Array, BoundMethod, Class, Closure, Function, Instance, Native, Str, Upvalue},
    value::Value,
};

/// Per-arena slice of a [`HeapStats`] snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ArenaStats {
    /// Objects currently linked into the arena.
    pub live_objects: usize,
    /// Freed slots waiting to be reused.
    pub free_slots: usize,
    /// Slot capacity (live + free).
    pub total_slots: usize,
    /// Bytes the accountant currently charges to this arena.
    pub bytes: usize,
}

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` so snapshots print and compare in a
/// stable order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    pub collectable: ArenaStats,
    pub immortal: ArenaStats,
    /// Live objects per [`ObjType`] name (e.g. "string", "closure"), both arenas.
    pub objects_by_type: BTreeMap<&'static str, usize>,
    /// Entries in the string intern pool.
    pub interned_strings: usize,
    /// Slots in the constant table.
    pub constants: usize,
    /// Collections run since the heap was created.
    pub collections: usize,
    /// Collectable bytes that trigger the next collection.
    pub next_gc: usize,
}

/// Difference between two heap snapshots.
///
/// Computed with [`HeapStats::diff`]. Positive deltas mean growth from the
/// "before" snapshot to the "after" one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeapDiff {
    /// Change in live object count across both arenas.
    pub live_objects_delta: isize,
    pub collectable_bytes_delta: isize,
    pub immortal_bytes_delta: isize,
    /// Per-type deltas. Only includes types present in either snapshot.
    pub objects_by_type_delta: BTreeMap<&'static str, isize>,
    /// Types that appeared in "after" but not "before".
    pub new_types: Vec<&'static str>,
    /// Types that appeared in "before" but not "after".
    pub removed_types: Vec<&'static str>,
    pub interned_strings_delta: isize,
    pub collections_delta: isize,
}

impl HeapStats {
    /// Live objects across both arenas.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.collectable.live_objects + self.immortal.live_objects
    }

    /// Bytes charged across both arenas.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.collectable.bytes + self.immortal.bytes
    }

    /// Computes the difference between `self` ("before") and `other` ("after").
    ///
    /// # Example
    ///
    /// ```
    /// # use kiln::{Heap, HeapConfig};
    /// let mut heap = Heap::new(HeapConfig::default()).unwrap();
    /// let before = heap.heap_stats();
    /// heap.new_array().unwrap();
    /// let diff = before.diff(&heap.heap_stats());
    /// assert_eq!(diff.live_objects_delta, 1);
    /// assert_eq!(diff.objects_by_type_delta.get("array"), Some(&1));
    /// ```
    #[must_use]
    pub fn diff(&self, other: &Self) -> HeapDiff {
        let (objects_by_type_delta, new_types, removed_types) =
            compute_type_deltas(&self.objects_by_type, &other.objects_by_type);

        HeapDiff {
            live_objects_delta: isize_delta(self.live_objects(), other.live_objects()),
            collectable_bytes_delta: isize_delta(self.collectable.bytes, other.collectable.bytes),
            immortal_bytes_delta: isize_delta(self.immortal.bytes, other.immortal.bytes),
            objects_by_type_delta,
            new_types,
            removed_types,
            interned_strings_delta: isize_delta(self.interned_strings, other.interned_strings),
            collections_delta: isize_delta(self.collections, other.collections),
        }
    }
}

impl HeapDiff {
    /// Returns `true` when all deltas are zero and no types were added or removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_objects_delta == 0
            && self.collectable_bytes_delta == 0
            && self.immortal_bytes_delta == 0
            && self.interned_strings_delta == 0
            && self.collections_delta == 0
            && self.new_types.is_empty()
            && self.removed_types.is_empty()
            && self.objects_by_type_delta.values().all(|&v| v == 0)
    }
}

impl fmt::Display for HeapDiff {
    /// Produces a human-readable summary, for example:
    ///
    /// ```text
    /// HeapDiff: +3 live objects, +240 collectable bytes, +0 immortal bytes
    ///   array: +1
    ///   string: +2
    ///   New types: array
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "HeapDiff: no changes");
        }

        write!(
            f,
            "HeapDiff: {:+} live objects, {:+} collectable bytes, {:+} immortal bytes",
            self.live_objects_delta, self.collectable_bytes_delta, self.immortal_bytes_delta
        )?;

        for (&type_name, &delta) in &self.objects_by_type_delta {
            if delta != 0 {
                write!(f, "\n  {type_name}: {delta:+}")?;
            }
        }

        if !self.new_types.is_empty() {
            write!(f, "\n  New types: {}", self.new_types.join(", "))?;
        }
        if !self.removed_types.is_empty() {
            write!(f, "\n  Removed types: {}", self.removed_types.join(", "))?;
        }
        if self.interned_strings_delta != 0 {
            write!(f, "\n  Interned strings: {:+}", self.interned_strings_delta)?;
        }
        if self.collections_delta != 0 {
            write!(f, "\n  Collections: {:+}", self.collections_delta)?;
        }
        Ok(())
    }
}

/// Computes `after - before` as `isize`.
fn isize_delta(before: usize, after: usize) -> isize {
    isize::try_from(after).unwrap_or(isize::MAX) - isize::try_from(before).unwrap_or(isize::MAX)
}

/// Computes per-type deltas, plus lists of new and removed types.
fn compute_type_deltas(
    before: &BTreeMap<&'static str, usize>,
    after: &BTreeMap<&'static str, usize>,
) -> (BTreeMap<&'static str, isize>, Vec<&'static str>, Vec<&'static str>) {
    let mut deltas = BTreeMap::new();
    let mut new_types = Vec::new();
    let mut removed_types = Vec::new();

    for (&type_name, &count) in before {
        let after_count = after.get(type_name).copied().unwrap_or(0);
        deltas.insert(type_name, isize_delta(count, after_count));
        if !after.contains_key(type_name) {
            removed_types.push(type_name);
        }
    }

    for (&type_name, &count) in after {
        if !before.contains_key(type_name) {
            deltas.insert(type_name, isize_delta(0, count));
            new_types.push(type_name);
        }
    }

    (deltas, new_types, removed_types)
}

/// Which of the two arenas an object lives in.
///
/// Collectable objects are owned by the collector. Immortal objects (strings, natives
/// and compiled functions) are never examined by it and live until [`Heap::free_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum ArenaKind {
    Collectable,
    Immortal,
}

/// Handle to an object stored in one of the heap's arenas.
///
/// Ids carry the generation of the slot they were issued for, so a handle kept past
/// the object's death is detected instead of silently aliasing the slot's next tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId {
    arena: ArenaKind,
    index: u32,
    generation: u32,
}

impl HeapId {
    #[inline]
    #[must_use]
    pub fn arena(self) -> ArenaKind {
        self.arena
    }

    /// Returns the raw slot index within the arena.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    #[must_use]
    pub fn is_collectable(self) -> bool {
        self.arena == ArenaKind::Collectable
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.arena {
            ArenaKind::Collectable => 'c',
            ArenaKind::Immortal => 'i',
        };
        write!(f, "{prefix}{}.{}", self.index, self.generation)
    }
}

/// Bookkeeping every object carries next to its payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjHeader {
    pub kind: ObjType,
    pub mark: MarkSense,
    /// Bytes charged to the accountant for this object. Always equals
    /// `HeapData::estimate_size` of the payload.
    pub size: usize,
}

#[derive(Debug)]
pub(crate) struct HeapEntry {
    pub header: ObjHeader,
    pub data: HeapData,
}

/// Slot arena with a free list and per-slot generations.
#[derive(Debug)]
pub(crate) struct Arena {
    kind: ArenaKind,
    entries: Vec<Option<HeapEntry>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
    live: usize,
    /// The most recently linked object, cleared when it is unlinked.
    last_linked: Option<HeapId>,
}

impl Arena {
    fn new(kind: ArenaKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            last_linked: None,
        }
    }

    fn link(&mut self, entry: HeapEntry) -> HeapId {
        let index = if let Some(index) = self.free_list.pop() {
            let slot = index as usize;
            self.generations[slot] = self.generations[slot].wrapping_add(1);
            self.entries[slot] = Some(entry);
            index
        } else {
            let index = u32::try_from(self.entries.len()).expect("Heap::link: arena slot index overflow");
            self.generations.push(0);
            self.entries.push(Some(entry));
            index
        };
        self.live += 1;
        let id = HeapId {
            arena: self.kind,
            index,
            generation: self.generations[index as usize],
        };
        self.last_linked = Some(id);
        id
    }

    fn unlink(&mut self, id: HeapId) -> HeapEntry {
        assert!(self.entry(id).is_some(), "Heap::unlink: object already freed");
        let entry = self.entries[id.index()].take().expect("Heap::unlink: slot missing");
        self.free_list.push(id.index);
        self.live -= 1;
        if self.last_linked == Some(id) {
            self.last_linked = None;
        }
        entry
    }

    pub fn last_linked(&self) -> Option<HeapId> {
        self.last_linked
    }

    pub fn entry(&self, id: HeapId) -> Option<&HeapEntry> {
        if id.arena != self.kind || *self.generations.get(id.index())? != id.generation {
            return None;
        }
        self.entries[id.index()].as_ref()
    }

    pub fn entry_mut(&mut self, id: HeapId) -> Option<&mut HeapEntry> {
        if id.arena != self.kind || *self.generations.get(id.index())? != id.generation {
            return None;
        }
        self.entries[id.index()].as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeapId, &HeapEntry)> {
        self.entries.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|entry| {
                let id = HeapId {
                    arena: self.kind,
                    index: u32::try_from(index).expect("Heap::iter: arena slot index overflow"),
                    generation: self.generations[index],
                };
                (id, entry)
            })
        })
    }

    /// Unlinks every object whose mark differs from `sense`, handing each to `on_free`.
    pub fn sweep(&mut self, sense: MarkSense, mut on_free: impl FnMut(HeapId, HeapEntry)) {
        for (index, slot) in self.entries.iter_mut().enumerate() {
            if slot.as_ref().is_none_or(|entry| entry.header.mark == sense) {
                continue;
            }
            let entry = slot.take().expect("Heap::sweep: slot missing");
            let index = u32::try_from(index).expect("Heap::sweep: arena slot index overflow");
            self.free_list.push(index);
            self.live -= 1;
            let id = HeapId {
                arena: self.kind,
                index,
                generation: self.generations[index as usize],
            };
            on_free(id, entry);
        }
        self.last_linked = None;
    }

    /// Unlinks every object, handing each to `on_free`, and releases the slot storage.
    fn drain(&mut self, mut on_free: impl FnMut(HeapId, HeapEntry)) {
        let entries = std::mem::take(&mut self.entries);
        let generations = std::mem::take(&mut self.generations);
        for (index, (slot, generation)) in entries.into_iter().zip(generations).enumerate() {
            if let Some(entry) = slot {
                let id = HeapId {
                    arena: self.kind,
                    index: u32::try_from(index).expect("Heap::drain: arena slot index overflow"),
                    generation,
                };
                on_free(id, entry);
            }
        }
        self.free_list = Vec::new();
        self.live = 0;
        self.last_linked = None;
    }

    pub fn stats(&self, bytes: usize) -> ArenaStats {
        ArenaStats {
            live_objects: self.live,
            free_slots: self.free_list.len(),
            total_slots: self.entries.len(),
            bytes,
        }
    }
}

/// What [`Heap::free_all`] released.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TeardownStats {
    pub collectable_objects: usize,
    pub collectable_bytes: usize,
    pub immortal_objects: usize,
    pub immortal_bytes: usize,
}

/// The object store of the interpreter.
///
/// Owns both arenas, the byte accountant, the collector's mark state, the root set,
/// the string intern pool and the constant table. There is exactly one heap per
/// interpreter; everything that allocates receives it by `&mut`.
#[derive(Debug)]
pub struct Heap {
    pub(crate) collectable: Arena,
    pub(crate) immortal: Arena,
    pub(crate) accountant: Accountant,
    /// The mark value meaning "reached" in the current cycle. Flips after every sweep.
    pub(crate) sense: MarkSense,
    /// Gray worklist. Never shrinks during collection; released by `free_all`.
    pub(crate) gray: Vec<HeapId>,
    pub(crate) roots: Roots,
    pub(crate) strings: StringPool,
    pub(crate) constants: ConstantPool,
    pub(crate) collections: usize,
    pub(crate) last_gc: Option<GcStats>,
    next_function_id: u32,
    init_string: Option<HeapId>,
}

macro_rules! typed_accessor {
    ($variant:ident => $get:ident: $ty:ty) => {
        #[doc = concat!("Returns the [`", stringify!($ty), "`] stored at `id`.")]
        ///
        /// # Panics
        /// Panics if `id` is stale or names an object of another type.
        #[must_use]
        pub fn $get(&self, id: HeapId) -> &$ty {
            match self.get(id) {
                HeapData::$variant(inner) => inner,
                other => panic!(
                    concat!("Heap::", stringify!($get), ": expected ", stringify!($variant), ", found {}"),
                    other.obj_type().name()
                ),
            }
        }
    };
    ($variant:ident => $get:ident, $vis:vis $get_mut:ident: $ty:ty) => {
        typed_accessor!($variant => $get: $ty);

        #[doc = concat!("Returns the [`", stringify!($ty), "`] stored at `id` mutably.")]
        ///
        /// # Panics
        /// Panics if `id` is stale or names an object of another type.
        $vis fn $get_mut(&mut self, id: HeapId) -> &mut $ty {
            match self.get_mut(id) {
                HeapData::$variant(inner) => inner,
                other => panic!(
                    concat!("Heap::", stringify!($get_mut), ": expected ", stringify!($variant), ", found {}"),
                    other.obj_type().name()
                ),
            }
        }
    };
}

impl Heap {
    /// Creates a heap and allocates its permanent roots: the `init` string, the
    /// sentinel class, the globals instance and one instance per builtin module with
    /// its natives installed.
    ///
    /// Fails only if `config.max_memory` is too small to hold those objects.
    pub fn new(config: HeapConfig) -> HeapResult<Self> {
        let mut heap = Self {
            collectable: Arena::new(ArenaKind::Collectable),
            immortal: Arena::new(ArenaKind::Immortal),
            accountant: Accountant::new(config),
            sense: MarkSense::Black,
            gray: Vec::new(),
            roots: Roots::default(),
            strings: StringPool::default(),
            constants: ConstantPool::default(),
            collections: 0,
            last_gc: None,
            next_function_id: 0,
            init_string: None,
        };
        heap.bootstrap()?;
        Ok(heap)
    }

    fn bootstrap(&mut self) -> HeapResult<()> {
        self.init_string = Some(self.intern_str("init")?);

        let sentinel = self.allocate(HeapData::Class(Class::new(None)))?;
        self.roots.empty_class = Some(sentinel);

        let globals = self.new_instance(sentinel)?;
        self.roots.globals = Some(globals);

        for _ in BuiltinModule::ALL {
            let instance = self.new_instance(sentinel)?;
            self.roots.builtins.push(instance);
        }
        builtins::install(self)
    }

    #[must_use]
    pub fn config(&self) -> &HeapConfig {
        self.accountant.config()
    }

    /// The instance holding global variables.
    #[must_use]
    pub fn globals(&self) -> HeapId {
        self.roots.globals.expect("Heap::globals: heap not bootstrapped")
    }

    /// The nameless class used for the globals and builtin module instances.
    #[must_use]
    pub fn empty_class(&self) -> HeapId {
        self.roots.empty_class.expect("Heap::empty_class: heap not bootstrapped")
    }

    /// The instance holding the natives of `module`.
    #[must_use]
    pub fn builtin(&self, module: BuiltinModule) -> HeapId {
        self.roots.builtins[module.index()]
    }

    /// The interned `init` string used to recognize initializers.
    #[must_use]
    pub fn init_string(&self) -> HeapId {
        self.init_string.expect("Heap::init_string: heap not bootstrapped")
    }

    /// Binds `value` to `name` in the globals instance.
    pub fn define_global(&mut self, name: &str, value: Value) -> HeapResult<()> {
        let key = self.intern_str(name)?;
        let globals = self.globals();
        self.set_field(globals, key, value)
    }

    /// Looks up a global by name without interning it.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        let key = self.find_string(name.as_bytes())?;
        self.get_field(self.globals(), key)
    }

    pub(crate) fn next_function_id(&mut self) -> HeapResult<u32> {
        let id = self.next_function_id;
        self.next_function_id = id.checked_add(1).ok_or(HeapError::CapacityOverflow {
            requested: u64::from(u32::MAX) + 1,
            max: u64::from(u32::MAX),
        })?;
        Ok(id)
    }

    pub(crate) fn arena(&self, kind: ArenaKind) -> &Arena {
        match kind {
            ArenaKind::Collectable => &self.collectable,
            ArenaKind::Immortal => &self.immortal,
        }
    }

    fn arena_mut(&mut self, kind: ArenaKind) -> &mut Arena {
        match kind {
            ArenaKind::Collectable => &mut self.collectable,
            ArenaKind::Immortal => &mut self.immortal,
        }
    }

    /// Charges a size change to `arena`, collecting first when the collectable arena
    /// is due.
    ///
    /// Every id in `pinned` survives any collection run here. On error nothing was
    /// charged.
    pub(crate) fn resize_object(
        &mut self,
        arena: ArenaKind,
        old_size: usize,
        new_size: usize,
        pinned: &[HeapId],
    ) -> HeapResult<()> {
        let growth = new_size.saturating_sub(old_size);
        if growth > 0 {
            let mut collected = false;
            if arena == ArenaKind::Collectable
                && let Some(reason) = self.accountant.collection_due(growth)
            {
                self.collect(reason, pinned);
                collected = true;
            }
            if let Err(err) = self.accountant.check_limit(growth) {
                if arena == ArenaKind::Immortal || collected {
                    return Err(err);
                }
                self.collect(GcReason::MemoryPressure, pinned);
                self.accountant.check_limit(growth)?;
            }
        }
        self.accountant.resize(arena, old_size, new_size);
        Ok(())
    }

    /// Charges `data` to its arena and links it in.
    ///
    /// The payload's references are pinned while a collection may run, so building an
    /// object out of otherwise unrooted parts is safe.
    pub(crate) fn allocate(&mut self, data: HeapData) -> HeapResult<HeapId> {
        let kind = data.obj_type();
        let arena = kind.arena();
        let size = data.estimate_size();

        let mut pinned = Vec::new();
        if arena == ArenaKind::Collectable {
            collect_child_ids(&data, &mut pinned);
        }
        self.resize_object(arena, 0, size, &pinned)?;

        // unreached in the current cycle
        let header = ObjHeader {
            kind,
            mark: self.sense.flip(),
            size,
        };
        let id = self.arena_mut(arena).link(HeapEntry { header, data });
        log::trace!("[gc] {id} allocate {size} for {}", kind.name());
        Ok(id)
    }

    /// Charges `additional` bytes to an existing object before the caller enlarges it.
    ///
    /// `id` and every object in `values` are pinned across a collection.
    pub(crate) fn grow_object(&mut self, id: HeapId, additional: usize, values: &[Value]) -> HeapResult<()> {
        if additional == 0 {
            return Ok(());
        }
        let old_size = self.entry(id).header.size;
        let mut pinned: SmallVec<[HeapId; 4]> = SmallVec::with_capacity(values.len() + 1);
        pinned.push(id);
        pinned.extend(values.iter().filter_map(|value| value.as_obj()));
        self.resize_object(id.arena(), old_size, old_size + additional, &pinned)?;
        self.entry_mut(id).header.size = old_size + additional;
        Ok(())
    }

    /// Returns `additional` bytes charged by [`Heap::grow_object`] when the enlargement
    /// could not happen after all.
    pub(crate) fn release_growth(&mut self, id: HeapId, additional: usize) {
        let size = self.entry(id).header.size;
        let shrunk = size
            .checked_sub(additional)
            .expect("Heap::release_growth: releasing more than was charged");
        self.accountant.resize(id.arena(), size, shrunk);
        self.entry_mut(id).header.size = shrunk;
    }

    /// Unlinks the most recent immortal allocation and returns its bytes.
    ///
    /// Used by the interner to discard a candidate string that turned out to be a
    /// duplicate.
    ///
    /// # Panics
    /// Panics if `id` is not the most recently linked immortal object.
    pub(crate) fn retract(&mut self, id: HeapId) {
        assert_eq!(
            self.immortal.last_linked(),
            Some(id),
            "Heap::retract: only the most recent immortal allocation can be retracted"
        );
        let entry = self.immortal.unlink(id);
        self.accountant.resize(ArenaKind::Immortal, entry.header.size, 0);
        log::trace!("[gc] {id} retract {} for {}", entry.header.size, entry.header.kind.name());
    }

    pub(crate) fn entry(&self, id: HeapId) -> &HeapEntry {
        self.arena(id.arena()).entry(id).expect("Heap::get: object already freed")
    }

    pub(crate) fn entry_mut(&mut self, id: HeapId) -> &mut HeapEntry {
        self.arena_mut(id.arena())
            .entry_mut(id)
            .expect("Heap::get_mut: object already freed")
    }

    /// Returns the payload stored at `id`.
    ///
    /// # Panics
    /// Panics if `id` is stale (its object was collected).
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entry(id).data
    }

    /// Returns the payload stored at `id` if the object is still alive.
    #[must_use]
    pub fn get_if_live(&self, id: HeapId) -> Option<&HeapData> {
        self.arena(id.arena()).entry(id).map(|entry| &entry.data)
    }

    /// Mutable payload access. Size-changing edits must go through the heap's
    /// growing operations so the accountant stays exact.
    pub(crate) fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entry_mut(id).data
    }

    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.arena(id.arena()).entry(id).is_some()
    }

    #[must_use]
    pub fn obj_type(&self, id: HeapId) -> ObjType {
        self.entry(id).header.kind
    }

    /// Bytes currently charged to `id`.
    #[must_use]
    pub fn object_size(&self, id: HeapId) -> usize {
        self.entry(id).header.size
    }

    typed_accessor!(Str => string: Str);
    typed_accessor!(Native => native: Native);
    typed_accessor!(Function => function, pub(crate) function_mut: Function);
    typed_accessor!(Upvalue => upvalue, pub upvalue_mut: Upvalue);
    typed_accessor!(Closure => closure, pub closure_mut: Closure);
    typed_accessor!(BoundMethod => bound_method: BoundMethod);
    typed_accessor!(Class => class, pub class_mut: Class);
    typed_accessor!(Instance => instance: Instance);
    typed_accessor!(Array => array, pub(crate) array_mut: Array);

    /// Ids of every live object in `arena`, in slot order.
    pub fn live_ids(&self, arena: ArenaKind) -> impl Iterator<Item = HeapId> + '_ {
        self.arena(arena).iter().map(|(id, _)| id)
    }

    /// Bytes live across both arenas.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.accountant.total_bytes()
    }

    #[must_use]
    pub fn arena_bytes(&self, arena: ArenaKind) -> usize {
        self.accountant.bytes(arena)
    }

    /// Collectable bytes that trigger the next collection.
    #[must_use]
    pub fn next_gc(&self) -> usize {
        self.accountant.next_gc()
    }

    /// Returns a snapshot of the current heap state.
    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        let mut objects_by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        for (_, entry) in self.collectable.iter().chain(self.immortal.iter()) {
            *objects_by_type.entry(entry.header.kind.name()).or_insert(0) += 1;
        }

        HeapStats {
            collectable: self.collectable.stats(self.accountant.bytes(ArenaKind::Collectable)),
            immortal: self.immortal.stats(self.accountant.bytes(ArenaKind::Immortal)),
            objects_by_type,
            interned_strings: self.strings.len(),
            constants: self.constants.len(),
            collections: self.collections,
            next_gc: self.accountant.next_gc(),
        }
    }

    /// Releases every object, collectable arena first, then the gray worklist, intern
    /// pool and constant table.
    ///
    /// Consumes the heap: no id can be used afterwards.
    pub fn free_all(mut self) -> TeardownStats {
        log::debug!("-- free collectable objects");
        let (collectable_objects, collectable_bytes) = self.release_arena(ArenaKind::Collectable);
        self.gray = Vec::new();

        log::debug!("-- free immortal objects");
        let (immortal_objects, immortal_bytes) = self.release_arena(ArenaKind::Immortal);
        self.strings.clear();
        self.constants.clear();

        debug_assert_eq!(self.accountant.total_bytes(), 0, "bytes still charged after teardown");
        TeardownStats {
            collectable_objects,
            collectable_bytes,
            immortal_objects,
            immortal_bytes,
        }
    }

    fn release_arena(&mut self, kind: ArenaKind) -> (usize, usize) {
        let mut objects = 0;
        let mut bytes = 0;
        let arena = match kind {
            ArenaKind::Collectable => &mut self.collectable,
            ArenaKind::Immortal => &mut self.immortal,
        };
        arena.drain(|id, entry| {
            debug_assert_eq!(entry.header.size, entry.data.estimate_size(), "{id} size drifted");
            log::trace!("[gc] {id} free type {}", entry.header.kind.name());
            objects += 1;
            bytes += entry.header.size;
        });
        self.accountant.resize(kind, bytes, 0);
        (objects, bytes)
    }
}
