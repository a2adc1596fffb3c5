//! The immutable sequence type.

use crate::{
    exceptions::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    ops::{Operations, bin, hash_slot, len_slot, un},
    py_hash,
    runtime::Runtime,
    types::{iter::ValueIter, str::Str},
    value::Value,
};

/// Heap storage for a tuple. The element values are owned references.
#[derive(Debug)]
pub struct Tuple(Vec<Value>);

impl Tuple {
    /// Takes ownership of already-counted values.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        for value in &self.0 {
            value.collect_refs(stack);
        }
    }
}

/// Allocates a tuple from owned values.
pub(crate) fn allocate_tuple(values: Vec<Value>, heap: &mut Heap) -> RunResult<Value> {
    Ok(Value::Ref(heap.allocate(HeapData::Tuple(Tuple::new(values)))?))
}

fn expect_tuple<'a>(v: &'a Value, heap: &'a Heap) -> RunResult<&'a Tuple> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Tuple(t) => Ok(t),
            _ => Err(RunError::internal("tuple slot on non-tuple carrier")),
        },
        _ => Err(RunError::internal("tuple slot on non-tuple carrier")),
    }
}

fn tuple_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let len = expect_tuple(v, &rt.heap)?.len();
    let mut out = String::from("(");
    for i in 0..len {
        if i > 0 {
            out.push_str(", ");
        }
        let item = expect_tuple(v, &rt.heap)?.as_slice()[i].clone_with_heap(&rt.heap);
        let rendered = crate::ops::repr_value(&item, rt);
        item.drop_with_heap(&mut rt.heap);
        out.push_str(&rendered?);
    }
    if len == 1 {
        out.push(',');
    }
    out.push(')');
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn tuple_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    let tuple = expect_tuple(v, &rt.heap)?;
    let mut hashes = Vec::with_capacity(tuple.len());
    for item in tuple.as_slice() {
        hashes.push(hash_immutable(item, &rt.heap, &rt.interns)?);
    }
    Ok(py_hash::hash_tuple(hashes.into_iter()))
}

/// Hashes a value without dunder dispatch; mutable containers are
/// unhashable. This is the hash the dict index uses for its keys.
pub(crate) fn hash_immutable(v: &Value, heap: &Heap, interns: &crate::intern::Interns) -> RunResult<i64> {
    match v {
        Value::None => Ok(0x2b3_c1a5),
        Value::Ellipsis => Ok(0x5e1_f00d),
        Value::NotImplemented => Ok(0x70_0d1e),
        Value::Bool(b) => Ok(py_hash::hash_int(i64::from(*b))),
        Value::Int(i) => Ok(py_hash::hash_int(*i)),
        Value::Float(f) => Ok(py_hash::hash_float(*f)),
        Value::InternString(id) => Ok(py_hash::hash_str(interns.get_str(*id))),
        Value::Builtin(_) => Ok(0x6_b171),
        Value::Undefined => Err(RunError::internal("hash of undefined value")),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Str(s) => Ok(py_hash::hash_str(s.as_str())),
            HeapData::Bytes(b) => Ok(py_hash::hash_bytes(b.as_slice())),
            HeapData::LongInt(li) => Ok(py_hash::hash_bigint(li.inner())),
            HeapData::Tuple(t) => {
                let mut hashes = Vec::with_capacity(t.len());
                for item in t.as_slice() {
                    hashes.push(hash_immutable(item, heap, interns)?);
                }
                Ok(py_hash::hash_tuple(hashes.into_iter()))
            }
            // Identity hash for instances and other reference objects.
            HeapData::Instance(_)
            | HeapData::Function(_)
            | HeapData::BoundMethod(_)
            | HeapData::Type(_)
            | HeapData::Module(_)
            | HeapData::Exception(_) => Ok(py_hash::hash_int(i64::try_from(id.index()).unwrap_or(i64::MAX))),
            data => Err(ExcType::type_error_unhashable(data.py_type())),
        },
    }
}

fn tuple_len(v: &Value, rt: &Runtime) -> RunResult<usize> {
    Ok(expect_tuple(v, &rt.heap)?.len())
}

fn tuple_add(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let rhs_is_tuple = matches!(w, Value::Ref(id) if matches!(rt.heap.get(*id), HeapData::Tuple(_)));
    if !rhs_is_tuple {
        return Ok(Value::NotImplemented);
    }
    let mut out = Vec::new();
    for source in [v, w] {
        let len = expect_tuple(source, &rt.heap)?.len();
        for i in 0..len {
            let item = expect_tuple(source, &rt.heap)?.as_slice()[i].clone_with_heap(&rt.heap);
            out.push(item);
        }
    }
    allocate_tuple(out, &mut rt.heap)
}

fn tuple_getitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let tuple = expect_tuple(v, &rt.heap)?;
    let Some(index) = key.as_index(&rt.heap) else {
        let key_type = key.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "tuple indices must be integers, not '{key_type}'"
        )));
    };
    let len = tuple.len();
    let resolved = if index < 0 {
        index + i64::try_from(len).unwrap_or(i64::MAX)
    } else {
        index
    };
    match usize::try_from(resolved).ok().filter(|&i| i < len) {
        Some(position) => Ok(tuple.as_slice()[position].clone_with_heap(&rt.heap)),
        None => Err(ExcType::tuple_index_error()),
    }
}

fn tuple_contains(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let tuple = expect_tuple(v, &rt.heap)?;
    let found = tuple
        .as_slice()
        .iter()
        .any(|item| item.py_eq(w, &rt.heap, &rt.interns));
    Ok(Value::Bool(found))
}

fn tuple_iter(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let backing = v.clone_with_heap(&rt.heap);
    let iter = ValueIter::sequence(backing);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Iter(iter))?))
}

fn tuple_eq(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let rhs_is_tuple = matches!(w, Value::Ref(id) if matches!(rt.heap.get(*id), HeapData::Tuple(_)));
    if !rhs_is_tuple {
        return Ok(Value::NotImplemented);
    }
    Ok(Value::Bool(v.py_eq(w, &rt.heap, &rt.interns)))
}

fn tuple_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match tuple_eq(v, w, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

pub(crate) const OPS: Operations = Operations {
    repr: un(tuple_repr),
    hash: hash_slot(tuple_hash),
    len: len_slot(tuple_len),
    add: bin(tuple_add),
    getitem: bin(tuple_getitem),
    contains: bin(tuple_contains),
    iter: un(tuple_iter),
    eq: bin(tuple_eq),
    ne: bin(tuple_ne),
    ..Operations::EMPTY
};
