//! Process-wide heap: the single indirection layer mapping handles to data.
//!
//! Every mutable sharing point (an array element, an object property, a
//! variable binding) stores a `Handle`, and the heap is the one source of
//! truth for the cell behind it. Handles are random base-16 renderings of a
//! 64-bit integer; the space makes collisions irrelevant. Access is
//! serialized with a read-write lock (single writer), and all accessors copy
//! data in or out so no lock is ever held across evaluator recursion.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{LazyLock, RwLock},
};

use ahash::AHashMap;

use crate::value::{
    ArrayData, ClassData, FunctionData, InstanceData, MacroData, NativeClassData, ObjectData, RawData, Value,
};

/// Opaque identifier for a heap slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// A fresh random handle.
    pub(crate) fn fresh() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Everything a heap slot can hold: a plain value cell, or the body of a
/// mutable container referenced by handle-carrying `Value` variants.
pub(crate) enum HeapData {
    Cell(Value),
    Array(ArrayData),
    Object(ObjectData),
    Function(FunctionData),
    Macro(MacroData),
    Class(ClassData),
    NativeClass(NativeClassData),
    Instance(InstanceData),
    Raw(RawData),
}

impl HeapData {
    fn type_name(&self) -> &'static str {
        match self {
            HeapData::Cell(_) => "Cell",
            HeapData::Array(_) => "Array",
            HeapData::Object(_) => "Object",
            HeapData::Function(_) => "Function",
            HeapData::Macro(_) => "Macro",
            HeapData::Class(_) => "Class",
            HeapData::NativeClass(_) => "NativeClass",
            HeapData::Instance(_) => "Instance",
            HeapData::Raw(_) => "Raw",
        }
    }
}

static HEAP: LazyLock<RwLock<AHashMap<Handle, HeapData>>> = LazyLock::new(|| RwLock::new(AHashMap::new()));

/// Snapshot of heap occupancy, mostly for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live slots.
    pub live_slots: usize,
    /// Breakdown of live slots by data variant name.
    pub slots_by_type: BTreeMap<&'static str, usize>,
}

pub(crate) fn alloc(data: HeapData) -> Handle {
    let handle = Handle::fresh();
    HEAP.write().expect("heap lock poisoned").insert(handle, data);
    handle
}

pub(crate) fn alloc_cell(value: Value) -> Handle {
    alloc(HeapData::Cell(value))
}

/// Reads the value behind a cell handle. Missing or non-cell slots read as
/// `Undefined`, mirroring out-of-range array holes.
pub(crate) fn get_cell(handle: Handle) -> Value {
    let heap = HEAP.read().expect("heap lock poisoned");
    match heap.get(&handle) {
        Some(HeapData::Cell(value)) => value.clone(),
        _ => Value::Undefined,
    }
}

/// Rebinds a cell handle to a new value, creating the slot if needed.
pub(crate) fn set_cell(handle: Handle, value: Value) {
    HEAP.write().expect("heap lock poisoned").insert(handle, HeapData::Cell(value));
}

pub(crate) fn delete(handle: Handle) {
    HEAP.write().expect("heap lock poisoned").remove(&handle);
}

/// Read access to a slot. `f` must not re-enter the heap.
pub(crate) fn with<R>(handle: Handle, f: impl FnOnce(&HeapData) -> R) -> Option<R> {
    let heap = HEAP.read().expect("heap lock poisoned");
    heap.get(&handle).map(f)
}

/// Write access to a slot. `f` must not re-enter the heap.
pub(crate) fn mutate<R>(handle: Handle, f: impl FnOnce(&mut HeapData) -> R) -> Option<R> {
    let mut heap = HEAP.write().expect("heap lock poisoned");
    heap.get_mut(&handle).map(f)
}

/// Current heap occupancy.
pub fn heap_stats() -> HeapStats {
    let heap = HEAP.read().expect("heap lock poisoned");
    let mut slots_by_type = BTreeMap::new();
    for data in heap.values() {
        *slots_by_type.entry(data.type_name()).or_insert(0) += 1;
    }
    HeapStats {
        live_slots: heap.len(),
        slots_by_type,
    }
}

/// Drops every slot. Part of `reset_runtime`.
pub(crate) fn clear() {
    HEAP.write().expect("heap lock poisoned").clear();
}
