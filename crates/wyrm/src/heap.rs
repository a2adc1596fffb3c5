//! Arena heap with explicit reference counting.
//!
//! Heap values live in a slab indexed by [`HeapId`]. The `Value` type holds
//! ids, never pointers, so the borrow checker stays out of the object graph.
//! Reference counts are explicit: `Value::clone_with_heap` increments,
//! `Value::drop_with_heap` decrements, and the release walk is iterative so
//! deeply nested structures cannot overflow the native stack.
//!
//! Mutating an object while other heap slots must stay readable uses the
//! take/restore pattern: [`Heap::take`] moves the data out (leaving a
//! tombstone), the caller works on it with full heap access, and
//! [`Heap::restore`] puts it back. A slot must never be observed taken by
//! Language code.

use std::cell::Cell;

use crate::{
    code::CodeObject,
    descriptor::{BoundMethod, ClassMethod, GetSetDescriptor, MemberDescriptor, MethodDescriptor, StaticMethod},
    exceptions::SimpleException,
    resource::{ResourceError, ResourceLimits},
    types::{
        Type,
        bytes::Bytes,
        class::{Instance, TypeObject},
        dict::Dict,
        function::Function,
        iter::ValueIter,
        list::List,
        long_int::LongInt,
        module::Module,
        str::Str,
        tuple::Tuple,
    },
    value::Value,
};

/// Identifier of a heap slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw slab index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Data stored in one heap slot.
#[derive(Debug)]
pub enum HeapData {
    Str(Str),
    Bytes(Bytes),
    LongInt(LongInt),
    List(List),
    Tuple(Tuple),
    Dict(Dict),
    Iter(ValueIter),
    Type(TypeObject),
    Instance(Instance),
    Module(Module),
    Function(Function),
    BoundMethod(BoundMethod),
    MethodDescriptor(MethodDescriptor),
    GetSet(GetSetDescriptor),
    Member(MemberDescriptor),
    ClassMethod(ClassMethod),
    StaticMethod(StaticMethod),
    Exception(SimpleException),
    Code(CodeObject),
    /// Tombstone left behind by [`Heap::take`]; also marks freed slots.
    Taken,
}

impl HeapData {
    /// The Language type of this data.
    #[must_use]
    pub fn py_type(&self) -> Type {
        match self {
            Self::Str(_) => Type::Str,
            Self::Bytes(_) => Type::Bytes,
            Self::LongInt(_) => Type::Int,
            Self::List(_) => Type::List,
            Self::Tuple(_) => Type::Tuple,
            Self::Dict(_) => Type::Dict,
            Self::Iter(_) => Type::Iterator,
            Self::Type(_) => Type::Type,
            Self::Instance(_) => Type::Instance,
            Self::Module(_) => Type::Module,
            Self::Function(_) => Type::Function,
            Self::BoundMethod(_) => Type::Method,
            Self::MethodDescriptor(_) => Type::MethodDescriptor,
            Self::GetSet(_) => Type::GetSetDescriptor,
            Self::Member(_) => Type::MemberDescriptor,
            Self::ClassMethod(_) => Type::ClassMethod,
            Self::StaticMethod(_) => Type::StaticMethod,
            Self::Exception(exc) => Type::Exception(exc.exc_type()),
            Self::Code(_) => Type::Code,
            Self::Taken => unreachable!("taken heap slot observed"),
        }
    }

    /// Pushes the HeapIds directly referenced by this data.
    ///
    /// Used by the iterative release walk in [`Heap::dec_ref`].
    fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        match self {
            Self::List(list) => list.collect_refs(stack),
            Self::Tuple(tuple) => tuple.collect_refs(stack),
            Self::Dict(dict) => dict.collect_refs(stack),
            Self::Iter(iter) => iter.collect_refs(stack),
            Self::Type(type_obj) => type_obj.collect_refs(stack),
            Self::Instance(instance) => instance.collect_refs(stack),
            Self::Module(module) => module.collect_refs(stack),
            Self::Function(function) => function.collect_refs(stack),
            Self::BoundMethod(method) => method.collect_refs(stack),
            Self::ClassMethod(cm) => cm.collect_refs(stack),
            Self::StaticMethod(sm) => sm.collect_refs(stack),
            Self::Str(_)
            | Self::Bytes(_)
            | Self::LongInt(_)
            | Self::MethodDescriptor(_)
            | Self::GetSet(_)
            | Self::Member(_)
            | Self::Exception(_)
            | Self::Code(_)
            | Self::Taken => {}
        }
    }

    /// Rough size of this data for memory accounting.
    fn estimate_size(&self) -> usize {
        let payload = match self {
            Self::Str(s) => s.as_str().len(),
            Self::Bytes(b) => b.as_slice().len(),
            Self::LongInt(li) => li.estimate_size(),
            Self::List(list) => list.len() * std::mem::size_of::<Value>(),
            Self::Tuple(tuple) => tuple.len() * std::mem::size_of::<Value>(),
            Self::Dict(dict) => dict.len() * 3 * std::mem::size_of::<Value>(),
            Self::Code(code) => code.estimate_size(),
            _ => 0,
        };
        std::mem::size_of::<HeapData>() + payload
    }
}

#[derive(Debug)]
struct HeapValue {
    refs: Cell<u32>,
    size: usize,
    data: HeapData,
}

/// The arena heap for one runtime.
#[derive(Debug)]
pub struct Heap {
    entries: Vec<HeapValue>,
    free: Vec<HeapId>,
    limits: ResourceLimits,
    live_bytes: usize,
    allocation_count: usize,
}

impl Heap {
    /// Creates an empty heap with the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            entries: Vec::with_capacity(64),
            free: Vec::new(),
            limits,
            live_bytes: 0,
            allocation_count: 0,
        }
    }

    /// The limits this heap enforces.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Total bytes of live heap data, as estimated at allocation time.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Allocates `data`, returning its id with a reference count of 1.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        let size = data.estimate_size();
        if let Some(limit) = self.limits.max_allocations {
            if self.allocation_count >= limit {
                return Err(ResourceError::Allocations { limit });
            }
        }
        if let Some(limit) = self.limits.max_memory {
            if self.live_bytes + size > limit {
                return Err(ResourceError::Memory { limit });
            }
        }
        self.allocation_count += 1;
        self.live_bytes += size;

        let entry = HeapValue {
            refs: Cell::new(1),
            size,
            data,
        };
        if let Some(id) = self.free.pop() {
            self.entries[id.index()] = entry;
            Ok(id)
        } else {
            let id = HeapId(self.entries.len());
            self.entries.push(entry);
            Ok(id)
        }
    }

    /// Returns the data at `id`.
    ///
    /// # Panics
    /// Panics if the slot is freed or currently taken; both indicate a bug
    /// in the core.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        let entry = &self.entries[id.index()];
        debug_assert!(!matches!(entry.data, HeapData::Taken), "heap slot {id:?} read while taken");
        &entry.data
    }

    /// Returns the data at `id` mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        let entry = &mut self.entries[id.index()];
        debug_assert!(!matches!(entry.data, HeapData::Taken), "heap slot {id:?} read while taken");
        &mut entry.data
    }

    /// Moves the data out of `id`, leaving a tombstone.
    ///
    /// Every `take` must be paired with a [`Heap::restore`] on all paths,
    /// error paths included.
    #[must_use]
    pub fn take(&mut self, id: HeapId) -> HeapData {
        let entry = &mut self.entries[id.index()];
        let data = std::mem::replace(&mut entry.data, HeapData::Taken);
        debug_assert!(!matches!(data, HeapData::Taken), "heap slot {id:?} taken twice");
        data
    }

    /// Restores data previously moved out with [`Heap::take`].
    pub fn restore(&mut self, id: HeapId, data: HeapData) {
        let entry = &mut self.entries[id.index()];
        debug_assert!(matches!(entry.data, HeapData::Taken), "restore into live slot {id:?}");
        entry.data = data;
    }

    /// Increments the reference count of `id`.
    pub fn inc_ref(&self, id: HeapId) {
        let refs = &self.entries[id.index()].refs;
        refs.set(refs.get() + 1);
    }

    /// Current reference count of `id`. Test and diagnostics helper.
    #[must_use]
    pub fn ref_count(&self, id: HeapId) -> u32 {
        self.entries[id.index()].refs.get()
    }

    /// Decrements the reference count of `id`, freeing the slot (and
    /// transitively releasing everything it referenced) when it reaches
    /// zero. Iterative, so nesting depth is bounded by heap size, not native
    /// stack size.
    pub fn dec_ref(&mut self, id: HeapId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let entry = &self.entries[id.index()];
            let refs = entry.refs.get();
            debug_assert!(refs > 0, "dec_ref on freed slot {id:?}");
            if refs > 1 {
                entry.refs.set(refs - 1);
                continue;
            }
            let entry = &mut self.entries[id.index()];
            entry.refs.set(0);
            let size = entry.size;
            let data = std::mem::replace(&mut entry.data, HeapData::Taken);
            data.collect_refs(&mut stack);
            self.live_bytes = self.live_bytes.saturating_sub(size);
            self.free.push(id);
        }
    }

    /// Number of live (allocated, unfreed) slots. Test helper.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.len() - self.free.len()
    }
}
