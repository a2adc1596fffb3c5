//! The mutable sequence type.
//!
//! Lists can be constructed empty, with reserved capacity, from an owned
//! vector, or from a borrowed slice of values. `__eq__` and `__setitem__`
//! are part of the surface, as is in-place growth through `append`.

use crate::{
    argparse::ParamDef,
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    expose::{MethodDef, MethodHandle, MethodKind},
    heap::{Heap, HeapData, HeapId},
    ops::{Operations, bin, len_slot, tern, un},
    runtime::Runtime,
    types::{iter::ValueIter, str::Str},
    value::Value,
};

/// Heap storage for a list. The element values are owned references.
#[derive(Debug, Default)]
pub struct List(Vec<Value>);

impl List {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// An empty list with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Builds a list from a borrowed slice, counting each element.
    #[must_use]
    pub fn from_slice(values: &[Value], heap: &Heap) -> Self {
        Self(values.iter().map(|v| v.clone_with_heap(heap)).collect())
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

    /// Appends an owned value.
    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Replaces the element at `index`, returning the old value.
    pub fn replace(&mut self, index: usize, value: Value) -> Value {
        std::mem::replace(&mut self.0[index], value)
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&mut self, index: usize) -> Value {
        self.0.remove(index)
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        for value in &self.0 {
            value.collect_refs(stack);
        }
    }
}

fn expect_list<'a>(v: &'a Value, heap: &'a Heap) -> RunResult<&'a List> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::List(list) => Ok(list),
            _ => Err(RunError::internal("list slot on non-list carrier")),
        },
        _ => Err(RunError::internal("list slot on non-list carrier")),
    }
}

fn expect_list_id(v: &Value, heap: &Heap) -> RunResult<HeapId> {
    match v {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::List(_)) => Ok(*id),
        _ => Err(RunError::internal("list slot on non-list carrier")),
    }
}

/// Resolves a (possibly negative) index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        index + i64::try_from(len).unwrap_or(i64::MAX)
    } else {
        index
    };
    usize::try_from(resolved).ok().filter(|&i| i < len)
}

fn list_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let len = expect_list(v, &rt.heap)?.len();
    let mut out = String::from("[");
    for i in 0..len {
        if i > 0 {
            out.push_str(", ");
        }
        let item = expect_list(v, &rt.heap)?.as_slice()[i].clone_with_heap(&rt.heap);
        let rendered = crate::ops::repr_value(&item, rt);
        item.drop_with_heap(&mut rt.heap);
        out.push_str(&rendered?);
    }
    out.push(']');
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn list_len(v: &Value, rt: &Runtime) -> RunResult<usize> {
    Ok(expect_list(v, &rt.heap)?.len())
}

fn list_add(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let rhs_is_list = matches!(w, Value::Ref(id) if matches!(rt.heap.get(*id), HeapData::List(_)));
    if !rhs_is_list {
        let lhs_type = v.py_type(&rt.heap);
        let rhs_type = w.type_name(&rt.heap, &rt.interns).into_owned();
        return Err(ExcType::type_error(format!(
            "can only concatenate {lhs_type} (not \"{rhs_type}\") to {lhs_type}"
        )));
    }
    let mut out = Vec::new();
    for source in [v, w] {
        let len = expect_list(source, &rt.heap)?.len();
        for i in 0..len {
            out.push(expect_list(source, &rt.heap)?.as_slice()[i].clone_with_heap(&rt.heap));
        }
    }
    Ok(Value::Ref(rt.heap.allocate(HeapData::List(List::new(out)))?))
}

fn list_mul(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let Some(count) = w.as_index(&rt.heap) else {
        return Ok(Value::NotImplemented);
    };
    let count = usize::try_from(count.max(0)).expect("clamped to non-negative");
    let len = expect_list(v, &rt.heap)?.len();
    let mut out = Vec::with_capacity(len * count);
    for _ in 0..count {
        for i in 0..len {
            out.push(expect_list(v, &rt.heap)?.as_slice()[i].clone_with_heap(&rt.heap));
        }
    }
    Ok(Value::Ref(rt.heap.allocate(HeapData::List(List::new(out)))?))
}

fn list_getitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let list = expect_list(v, &rt.heap)?;
    let Some(index) = key.as_index(&rt.heap) else {
        let key_type = key.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "list indices must be integers, not '{key_type}'"
        )));
    };
    match resolve_index(index, list.len()) {
        Some(position) => Ok(list.as_slice()[position].clone_with_heap(&rt.heap)),
        None => Err(ExcType::list_index_error()),
    }
}

fn list_setitem(v: &Value, key: &Value, item: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_list_id(v, &rt.heap)?;
    let Some(index) = key.as_index(&rt.heap) else {
        let key_type = key.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "list indices must be integers, not '{key_type}'"
        )));
    };
    let len = expect_list(v, &rt.heap)?.len();
    let Some(position) = resolve_index(index, len) else {
        return Err(ExcType::list_assignment_index_error());
    };
    let new_value = item.clone_with_heap(&rt.heap);
    let old = match rt.heap.get_mut(id) {
        HeapData::List(list) => list.replace(position, new_value),
        _ => unreachable!("checked list carrier above"),
    };
    old.drop_with_heap(&mut rt.heap);
    Ok(Value::None)
}

fn list_delitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_list_id(v, &rt.heap)?;
    let Some(index) = key.as_index(&rt.heap) else {
        let key_type = key.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "list indices must be integers, not '{key_type}'"
        )));
    };
    let len = expect_list(v, &rt.heap)?.len();
    let Some(position) = resolve_index(index, len) else {
        return Err(ExcType::list_assignment_index_error());
    };
    let removed = match rt.heap.get_mut(id) {
        HeapData::List(list) => list.remove(position),
        _ => unreachable!("checked list carrier above"),
    };
    removed.drop_with_heap(&mut rt.heap);
    Ok(Value::None)
}

fn list_contains(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let list = expect_list(v, &rt.heap)?;
    let found = list.as_slice().iter().any(|item| item.py_eq(w, &rt.heap, &rt.interns));
    Ok(Value::Bool(found))
}

fn list_iter(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let backing = v.clone_with_heap(&rt.heap);
    let iter = ValueIter::sequence(backing);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Iter(iter))?))
}

fn list_eq(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let rhs_is_list = matches!(w, Value::Ref(id) if matches!(rt.heap.get(*id), HeapData::List(_)));
    if !rhs_is_list {
        return Ok(Value::NotImplemented);
    }
    Ok(Value::Bool(v.py_eq(w, &rt.heap, &rt.interns)))
}

fn list_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match list_eq(v, w, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

pub(crate) const OPS: Operations = Operations {
    repr: un(list_repr),
    len: len_slot(list_len),
    add: bin(list_add),
    mul: bin(list_mul),
    rmul: bin(list_mul),
    getitem: bin(list_getitem),
    setitem: tern(list_setitem),
    delitem: bin(list_delitem),
    contains: bin(list_contains),
    iter: un(list_iter),
    eq: bin(list_eq),
    ne: bin(list_ne),
    // Lists are mutable, so no hash slot.
    ..Operations::EMPTY
};

// --- named methods --------------------------------------------------------

fn list_append(v: &Value, item: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_list_id(v, &rt.heap)?;
    let owned = item.clone_with_heap(&rt.heap);
    match rt.heap.get_mut(id) {
        HeapData::List(list) => list.push(owned),
        _ => unreachable!("checked list carrier above"),
    }
    Ok(Value::None)
}

fn list_pop(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_list_id(v, &rt.heap)?;
    let len = expect_list(v, &rt.heap)?.len();
    if len == 0 {
        return Err(SimpleException::new_msg(ExcType::IndexError, "pop from empty list").into());
    }
    match rt.heap.get_mut(id) {
        HeapData::List(list) => Ok(list.remove(len - 1)),
        _ => unreachable!("checked list carrier above"),
    }
}

/// Method table scanned by exposure when the `list` type object is built.
pub(crate) static METHODS: &[MethodDef] = &[
    MethodDef {
        name: "append",
        kind: MethodKind::Instance,
        doc: Some("Append object to the end of the list."),
        params: &[ParamDef::positional_only("object")],
        handle: MethodHandle::One(list_append),
        carrier: None,
        primary: true,
    },
    MethodDef {
        name: "pop",
        kind: MethodKind::Instance,
        doc: Some("Remove and return the last item of the list."),
        params: &[],
        handle: MethodHandle::NoArgs(list_pop),
        carrier: None,
        primary: true,
    },
];
