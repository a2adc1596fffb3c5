//! Operations for the canonical unique values: `None`, `Ellipsis`,
//! `NotImplemented`.
//!
//! The singletons are inline `Value` variants, so identity holds across
//! every construction path by representation alone. The two boolean
//! singletons live with the numeric tower in `types::num`.

use crate::{
    exceptions::{RunError, RunResult},
    heap::HeapData,
    ops::{Operations, bin, hash_slot, un},
    runtime::Runtime,
    types::str::Str,
    value::Value,
};

fn singleton_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let text = match v {
        Value::None => "None",
        Value::Ellipsis => "Ellipsis",
        Value::NotImplemented => "NotImplemented",
        _ => return Err(RunError::internal("singleton repr slot on non-singleton carrier")),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::new(text)))?))
}

fn singleton_truth(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    Ok(Value::Bool(v.py_bool(&rt.heap, &rt.interns)))
}

fn singleton_eq(v: &Value, w: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    if std::mem::discriminant(v) == std::mem::discriminant(w) {
        Ok(Value::Bool(v.is_(w)))
    } else {
        Ok(Value::NotImplemented)
    }
}

fn singleton_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match singleton_eq(v, w, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

fn singleton_hash(v: &Value, _rt: &Runtime) -> RunResult<i64> {
    Ok(match v {
        Value::None => 0x2b3_c1a5,
        Value::Ellipsis => 0x5e1_f00d,
        Value::NotImplemented => 0x70_0d1e,
        _ => return Err(RunError::internal("singleton hash slot on non-singleton carrier")),
    })
}

pub(crate) const OPS: Operations = Operations {
    repr: un(singleton_repr),
    bool_: un(singleton_truth),
    eq: bin(singleton_eq),
    ne: bin(singleton_ne),
    hash: hash_slot(singleton_hash),
    ..Operations::EMPTY
};
