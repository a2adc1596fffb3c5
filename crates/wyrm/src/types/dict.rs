//! The insertion-ordered mapping type.
//!
//! # Storage strategy
//!
//! A `HashTable<usize>` maps key hashes to indices in a dense `Vec` of
//! entries, which preserves insertion order for iteration. Lookups are O(1)
//! and iteration order is insertion order.
//!
//! # Native iteration surface
//!
//! Host code iterates pairs in insertion order with [`Dict::iter`] /
//! [`Dict::get_entry`] and removes keys in place with
//! [`Dict::shift_remove`]; the removal is reflected in the backing map
//! immediately. Language-level iteration yields keys.

use hashbrown::HashTable;

use crate::{
    exceptions::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    ops::{Operations, bin, len_slot, tern, un},
    runtime::{Runtime, value_to_object},
    types::{iter::ValueIter, str::Str, tuple::hash_immutable},
    value::Value,
};

#[derive(Debug)]
struct DictEntry {
    hash: i64,
    key: Value,
    value: Value,
}

/// An insertion-ordered mapping with Language key-equality semantics.
#[derive(Debug, Default)]
pub struct Dict {
    /// Key hash → index into `entries`.
    indices: HashTable<usize>,
    /// Dense entry storage in insertion order.
    entries: Vec<DictEntry>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pair iteration in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    /// The (key, value) pair at insertion position `index`.
    #[must_use]
    pub fn get_entry(&self, index: usize) -> Option<(&Value, &Value)> {
        self.entries.get(index).map(|e| (&e.key, &e.value))
    }

    fn find_index(&self, key: &Value, hash: i64, heap: &Heap, interns: &Interns) -> Option<usize> {
        let entries = &self.entries;
        self.indices
            .find(hash_lane(hash), |&i| {
                entries[i].hash == hash && entries[i].key.py_eq(key, heap, interns)
            })
            .copied()
    }

    /// Looks up a key. `Err` only for unhashable keys.
    pub fn get<'a>(&'a self, key: &Value, heap: &'a Heap, interns: &Interns) -> RunResult<Option<&'a Value>> {
        let hash = hash_immutable(key, heap, interns)?;
        Ok(self.find_index(key, hash, heap, interns).map(|i| &self.entries[i].value))
    }

    /// Looks up a string key by content.
    #[must_use]
    pub fn get_by_str<'a>(&'a self, name: &str, heap: &'a Heap, interns: &Interns) -> Option<&'a Value> {
        let hash = crate::py_hash::hash_str(name);
        let entries = &self.entries;
        self.indices
            .find(hash_lane(hash), |&i| {
                entries[i].hash == hash
                    && entries[i]
                        .key
                        .as_either_str(heap, interns)
                        .is_some_and(|k| k == name)
            })
            .map(|&i| &entries[i].value)
    }

    /// Inserts an owned key/value pair.
    ///
    /// When the key already exists the first key is kept, the value is
    /// replaced, and the old value is returned for the caller to release.
    /// The duplicate key is released here.
    pub fn insert(
        &mut self,
        key: Value,
        value: Value,
        heap: &mut Heap,
        interns: &Interns,
    ) -> RunResult<Option<Value>> {
        let hash = match hash_immutable(&key, heap, interns) {
            Ok(hash) => hash,
            Err(err) => {
                key.drop_with_heap(heap);
                value.drop_with_heap(heap);
                return Err(err);
            }
        };
        if let Some(existing) = self.find_index(&key, hash, heap, interns) {
            key.drop_with_heap(heap);
            let old = std::mem::replace(&mut self.entries[existing].value, value);
            return Ok(Some(old));
        }
        let index = self.entries.len();
        self.entries.push(DictEntry { hash, key, value });
        let entries = &self.entries;
        self.indices
            .insert_unique(hash_lane(hash), index, |&j| hash_lane(entries[j].hash));
        Ok(None)
    }

    /// Removes a key, returning the owned (key, value) pair.
    ///
    /// The removal shifts later entries down, preserving the insertion
    /// order of the remainder, and is immediately visible to position-based
    /// iteration.
    pub fn shift_remove(
        &mut self,
        key: &Value,
        heap: &Heap,
        interns: &Interns,
    ) -> RunResult<Option<(Value, Value)>> {
        let hash = hash_immutable(key, heap, interns)?;
        let Some(index) = self.find_index(key, hash, heap, interns) else {
            return Ok(None);
        };
        let entry = self.entries.remove(index);
        self.rebuild_indices();
        Ok(Some((entry.key, entry.value)))
    }

    fn rebuild_indices(&mut self) {
        let hashes: Vec<u64> = self.entries.iter().map(|e| hash_lane(e.hash)).collect();
        self.indices.clear();
        for (i, &h) in hashes.iter().enumerate() {
            self.indices.insert_unique(h, i, |&j| hashes[j]);
        }
    }

    /// Structural equality against another dict.
    #[must_use]
    pub fn py_eq(&self, other: &Self, heap: &Heap, interns: &Interns) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|(key, value)| {
            match other.get(key, heap, interns) {
                Ok(Some(other_value)) => value.py_eq(other_value, heap, interns),
                _ => false,
            }
        })
    }

    /// Releases every entry, counting down key and value references.
    pub fn drop_entries(&mut self, heap: &mut Heap) {
        for entry in self.entries.drain(..) {
            entry.key.drop_with_heap(heap);
            entry.value.drop_with_heap(heap);
        }
        self.indices.clear();
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        for entry in &self.entries {
            entry.key.collect_refs(stack);
            entry.value.collect_refs(stack);
        }
    }
}

#[inline]
fn hash_lane(hash: i64) -> u64 {
    u64::from_ne_bytes(hash.to_ne_bytes())
}

fn expect_dict<'a>(v: &'a Value, heap: &'a Heap) -> RunResult<&'a Dict> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Dict(dict) => Ok(dict),
            _ => Err(RunError::internal("dict slot on non-dict carrier")),
        },
        _ => Err(RunError::internal("dict slot on non-dict carrier")),
    }
}

fn expect_dict_id(v: &Value, heap: &Heap) -> RunResult<HeapId> {
    match v {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::Dict(_)) => Ok(*id),
        _ => Err(RunError::internal("dict slot on non-dict carrier")),
    }
}

fn dict_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let len = expect_dict(v, &rt.heap)?.len();
    let mut out = String::from("{");
    for i in 0..len {
        if i > 0 {
            out.push_str(", ");
        }
        let (key, value) = {
            let dict = expect_dict(v, &rt.heap)?;
            let (k, val) = dict.get_entry(i).expect("index below len");
            (k.clone_with_heap(&rt.heap), val.clone_with_heap(&rt.heap))
        };
        let key_repr = crate::ops::repr_value(&key, rt);
        key.drop_with_heap(&mut rt.heap);
        out.push_str(&key_repr?);
        out.push_str(": ");
        let value_repr = crate::ops::repr_value(&value, rt);
        value.drop_with_heap(&mut rt.heap);
        out.push_str(&value_repr?);
    }
    out.push('}');
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn dict_len(v: &Value, rt: &Runtime) -> RunResult<usize> {
    Ok(expect_dict(v, &rt.heap)?.len())
}

fn dict_getitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let dict = expect_dict(v, &rt.heap)?;
    match dict.get(key, &rt.heap, &rt.interns)? {
        Some(value) => Ok(value.clone_with_heap(&rt.heap)),
        None => Err(ExcType::key_error(value_to_object(key, &rt.heap, &rt.interns))),
    }
}

fn dict_setitem(v: &Value, key: &Value, item: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_dict_id(v, &rt.heap)?;
    let owned_key = key.clone_with_heap(&rt.heap);
    let owned_value = item.clone_with_heap(&rt.heap);
    let mut dict = match rt.heap.take(id) {
        HeapData::Dict(dict) => dict,
        _ => unreachable!("checked dict carrier above"),
    };
    let result = dict.insert(owned_key, owned_value, &mut rt.heap, &rt.interns);
    rt.heap.restore(id, HeapData::Dict(dict));
    if let Some(old) = result? {
        old.drop_with_heap(&mut rt.heap);
    }
    Ok(Value::None)
}

fn dict_delitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_dict_id(v, &rt.heap)?;
    let mut dict = match rt.heap.take(id) {
        HeapData::Dict(dict) => dict,
        _ => unreachable!("checked dict carrier above"),
    };
    let result = dict.shift_remove(key, &rt.heap, &rt.interns);
    rt.heap.restore(id, HeapData::Dict(dict));
    match result? {
        Some((old_key, old_value)) => {
            old_key.drop_with_heap(&mut rt.heap);
            old_value.drop_with_heap(&mut rt.heap);
            Ok(Value::None)
        }
        None => Err(ExcType::key_error(value_to_object(key, &rt.heap, &rt.interns))),
    }
}

fn dict_contains(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let dict = expect_dict(v, &rt.heap)?;
    Ok(Value::Bool(dict.get(key, &rt.heap, &rt.interns)?.is_some()))
}

fn dict_iter(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let backing = v.clone_with_heap(&rt.heap);
    let iter = ValueIter::dict_keys(backing);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Iter(iter))?))
}

fn dict_eq(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let rhs_is_dict = matches!(w, Value::Ref(id) if matches!(rt.heap.get(*id), HeapData::Dict(_)));
    if !rhs_is_dict {
        return Ok(Value::NotImplemented);
    }
    Ok(Value::Bool(v.py_eq(w, &rt.heap, &rt.interns)))
}

fn dict_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match dict_eq(v, w, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

pub(crate) const OPS: Operations = Operations {
    repr: un(dict_repr),
    len: len_slot(dict_len),
    getitem: bin(dict_getitem),
    setitem: tern(dict_setitem),
    delitem: bin(dict_delitem),
    contains: bin(dict_contains),
    iter: un(dict_iter),
    eq: bin(dict_eq),
    ne: bin(dict_ne),
    // Dicts are mutable, so no hash slot.
    ..Operations::EMPTY
};

// --- named methods --------------------------------------------------------

use crate::{
    argparse::ParamDef,
    expose::{MethodDef, MethodHandle, MethodKind},
};

fn dict_get_method(v: &Value, args: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    let (key, default) = match args {
        [key] => (key, None),
        [key, default] => (key, Some(default)),
        _ => return Err(ExcType::type_error_at_most("get", 2, args.len())),
    };
    let dict = expect_dict(v, &rt.heap)?;
    match dict.get(key, &rt.heap, &rt.interns)? {
        Some(value) => Ok(value.clone_with_heap(&rt.heap)),
        None => Ok(default.map_or(Value::None, |d| d.clone_with_heap(&rt.heap))),
    }
}

/// Method table scanned by exposure when the `dict` type object is built.
pub(crate) static METHODS: &[MethodDef] = &[MethodDef {
    name: "get",
    kind: MethodKind::Instance,
    doc: Some("Return the value for key if key is in the dictionary, else default."),
    params: &[
        ParamDef::positional_only("key"),
        ParamDef::positional_only_defaulted("default", crate::argparse::DefaultArg::None_),
    ],
    handle: MethodHandle::Positional(dict_get_method),
    carrier: None,
    primary: true,
}];
