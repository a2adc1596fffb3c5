//! The iterator value type over built-in containers.
//!
//! One iterator shape covers every built-in sequence plus dict keys; user
//! types iterate through their own `iter`/`next` slots and never reach this
//! type. Exhaustion raises the statically-allocated `StopIteration`, which
//! carries no stack context.

use crate::{
    exceptions::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    ops::{Operations, un},
    runtime::Runtime,
    types::str::Str,
    value::Value,
};

/// Iterator state over a built-in container.
///
/// The `backing` value is an owned reference, so the container outlives the
/// iterator. Sequence iteration reads by position; mutation of the backing
/// container during iteration is observed positionally.
#[derive(Debug)]
pub enum ValueIter {
    /// Position-based iteration over list, tuple, str or bytes.
    Sequence { backing: Value, index: usize },
    /// Key iteration over a dict in insertion order.
    DictKeys { backing: Value, index: usize },
}

impl ValueIter {
    #[must_use]
    pub fn sequence(backing: Value) -> Self {
        Self::Sequence { backing, index: 0 }
    }

    #[must_use]
    pub fn dict_keys(backing: Value) -> Self {
        Self::DictKeys { backing, index: 0 }
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        match self {
            Self::Sequence { backing, .. } | Self::DictKeys { backing, .. } => backing.collect_refs(stack),
        }
    }
}

/// Copies the carrier-identifying payload of a backing value without
/// touching reference counts. Only valid while the iterator keeps the
/// backing reference alive.
fn shallow_backing(backing: &Value) -> Value {
    match backing {
        Value::InternString(id) => Value::InternString(*id),
        Value::Ref(id) => Value::Ref(*id),
        _ => Value::Undefined,
    }
}

fn expect_iter_id(v: &Value, heap: &Heap) -> RunResult<HeapId> {
    match v {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::Iter(_)) => Ok(*id),
        _ => Err(RunError::internal("iterator slot on non-iterator carrier")),
    }
}

fn iter_self(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    Ok(v.clone_with_heap(&rt.heap))
}

fn iter_next_slot(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_iter_id(v, &rt.heap)?;
    let (is_dict, backing, index) = match rt.heap.get(id) {
        HeapData::Iter(ValueIter::Sequence { backing, index }) => (false, shallow_backing(backing), *index),
        HeapData::Iter(ValueIter::DictKeys { backing, index }) => (true, shallow_backing(backing), *index),
        _ => unreachable!("checked iterator carrier above"),
    };

    let item = if is_dict {
        dict_key_at(&backing, index, rt)?
    } else {
        sequence_item_at(&backing, index, rt)?
    };

    let Some(item) = item else {
        return Err(ExcType::stop_iteration());
    };
    match rt.heap.get_mut(id) {
        HeapData::Iter(ValueIter::Sequence { index, .. } | ValueIter::DictKeys { index, .. }) => *index += 1,
        _ => unreachable!("checked iterator carrier above"),
    }
    Ok(item)
}

fn dict_key_at(backing: &Value, index: usize, rt: &mut Runtime) -> RunResult<Option<Value>> {
    let Value::Ref(id) = backing else {
        return Err(RunError::internal("dict iterator over non-dict backing"));
    };
    match rt.heap.get(*id) {
        HeapData::Dict(dict) => Ok(dict.get_entry(index).map(|(key, _)| key.clone_with_heap(&rt.heap))),
        _ => Err(RunError::internal("dict iterator over non-dict backing")),
    }
}

fn sequence_item_at(backing: &Value, index: usize, rt: &mut Runtime) -> RunResult<Option<Value>> {
    match backing {
        Value::InternString(sid) => {
            let ch = rt.interns.get_str(*sid).chars().nth(index);
            match ch {
                Some(ch) => {
                    let out = ch.to_string();
                    Ok(Some(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?)))
                }
                None => Ok(None),
            }
        }
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::List(list) => Ok(list.as_slice().get(index).map(|v| v.clone_with_heap(&rt.heap))),
            HeapData::Tuple(tuple) => Ok(tuple.as_slice().get(index).map(|v| v.clone_with_heap(&rt.heap))),
            HeapData::Str(s) => match s.as_str().chars().nth(index) {
                Some(ch) => {
                    let out = ch.to_string();
                    Ok(Some(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?)))
                }
                None => Ok(None),
            },
            HeapData::Bytes(b) => Ok(b.as_slice().get(index).map(|&byte| Value::Int(i64::from(byte)))),
            _ => Err(RunError::internal("sequence iterator over non-sequence backing")),
        },
        _ => Err(RunError::internal("sequence iterator over non-sequence backing")),
    }
}

pub(crate) const OPS: Operations = Operations {
    iter: un(iter_self),
    next: un(iter_next_slot),
    ..Operations::EMPTY
};
