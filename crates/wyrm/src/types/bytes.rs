//! The bytes container.
//!
//! Construction accepts a list or tuple of integers in `0..=255`;
//! concatenation, repetition by an integer, and indexing (which yields
//! integers) follow sequence semantics.

use std::fmt::{self, Write};

use crate::{
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    heap::{Heap, HeapData},
    ops::{Operations, bin, hash_slot, len_slot, un},
    py_hash,
    runtime::Runtime,
    types::{iter::ValueIter, str::Str},
    value::Value,
};

/// Heap storage for a bytes object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    #[must_use]
    pub fn new(value: Vec<u8>) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Writes the `b'…'` repr of byte content.
pub fn bytes_repr_fmt(bytes: &[u8], f: &mut impl Write) -> fmt::Result {
    f.write_str("b'")?;
    for &b in bytes {
        match b {
            b'\\' => f.write_str("\\\\")?,
            b'\'' => f.write_str("\\'")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            0x20..=0x7e => f.write_char(char::from(b))?,
            _ => write!(f, "\\x{b:02x}")?,
        }
    }
    f.write_char('\'')
}

fn expect_bytes<'a>(v: &'a Value, heap: &'a Heap) -> RunResult<&'a [u8]> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Bytes(b) => Ok(b.as_slice()),
            _ => Err(RunError::internal("bytes slot on non-bytes carrier")),
        },
        _ => Err(RunError::internal("bytes slot on non-bytes carrier")),
    }
}

fn bytes_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_bytes(v, &rt.heap)?;
    let mut out = String::with_capacity(content.len() + 3);
    bytes_repr_fmt(content, &mut out).expect("string write cannot fail");
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn bytes_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    Ok(py_hash::hash_bytes(expect_bytes(v, &rt.heap)?))
}

fn bytes_len(v: &Value, rt: &Runtime) -> RunResult<usize> {
    Ok(expect_bytes(v, &rt.heap)?.len())
}

fn bytes_add(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let lhs = expect_bytes(v, &rt.heap)?;
    let rhs = match w {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::Bytes(b) => b.as_slice(),
            _ => return Ok(Value::NotImplemented),
        },
        _ => return Ok(Value::NotImplemented),
    };
    let mut out = Vec::with_capacity(lhs.len() + rhs.len());
    out.extend_from_slice(lhs);
    out.extend_from_slice(rhs);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(Bytes::new(out)))?))
}

fn bytes_mul(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_bytes(v, &rt.heap)?;
    let Some(count) = w.as_index(&rt.heap) else {
        return Ok(Value::NotImplemented);
    };
    let count = usize::try_from(count.max(0)).expect("clamped to non-negative");
    let out = content.repeat(count);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(Bytes::new(out)))?))
}

fn bytes_getitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_bytes(v, &rt.heap)?;
    let Some(index) = key.as_index(&rt.heap) else {
        let key_type = key.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "byte indices must be integers, not '{key_type}'"
        )));
    };
    let resolved = if index < 0 {
        index + i64::try_from(content.len()).unwrap_or(i64::MAX)
    } else {
        index
    };
    let in_range = usize::try_from(resolved).ok().filter(|&i| i < content.len());
    match in_range {
        // Indexing yields the byte as an integer.
        Some(position) => Ok(Value::Int(i64::from(content[position]))),
        None => Err(ExcType::bytes_index_error()),
    }
}

fn bytes_contains(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let haystack = expect_bytes(v, &rt.heap)?;
    if let Some(byte) = w.as_index(&rt.heap) {
        let byte = u8::try_from(byte)
            .map_err(|_| SimpleException::new_msg(crate::exceptions::ExcType::ValueError, "byte must be in range(0, 256)"))?;
        return Ok(Value::Bool(haystack.contains(&byte)));
    }
    if let Value::Ref(id) = w {
        if let HeapData::Bytes(needle) = rt.heap.get(*id) {
            let needle = needle.as_slice();
            let found = needle.is_empty() || haystack.windows(needle.len().max(1)).any(|win| win == needle);
            return Ok(Value::Bool(found));
        }
    }
    Err(ExcType::type_error("a bytes-like object is required"))
}

fn bytes_iter(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let backing = v.clone_with_heap(&rt.heap);
    let iter = ValueIter::sequence(backing);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Iter(iter))?))
}

fn bytes_eq(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let lhs = expect_bytes(v, &rt.heap)?;
    match w {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::Bytes(b) => Ok(Value::Bool(lhs == b.as_slice())),
            _ => Ok(Value::NotImplemented),
        },
        _ => Ok(Value::NotImplemented),
    }
}

fn bytes_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match bytes_eq(v, w, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

pub(crate) const OPS: Operations = Operations {
    repr: un(bytes_repr),
    hash: hash_slot(bytes_hash),
    len: len_slot(bytes_len),
    add: bin(bytes_add),
    mul: bin(bytes_mul),
    rmul: bin(bytes_mul),
    getitem: bin(bytes_getitem),
    contains: bin(bytes_contains),
    iter: un(bytes_iter),
    eq: bin(bytes_eq),
    ne: bin(bytes_ne),
    ..Operations::EMPTY
};

/// Builds a bytes value from a constructor argument: another bytes value,
/// a list/tuple of integers in `0..=255`, or an integer count of zeros.
pub(crate) fn bytes_from_value(arg: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if let Value::Ref(id) = arg {
        match rt.heap.get(*id) {
            HeapData::Bytes(b) => {
                let out = b.as_slice().to_vec();
                return Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(Bytes::new(out)))?));
            }
            HeapData::List(list) => {
                let out = collect_byte_values(list.as_slice(), &rt.heap)?;
                return Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(Bytes::new(out)))?));
            }
            HeapData::Tuple(tuple) => {
                let out = collect_byte_values(tuple.as_slice(), &rt.heap)?;
                return Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(Bytes::new(out)))?));
            }
            _ => {}
        }
    }
    if let Some(count) = arg.as_index(&rt.heap) {
        if count < 0 {
            return Err(SimpleException::new_msg(crate::exceptions::ExcType::ValueError, "negative count").into());
        }
        let out = vec![0u8; usize::try_from(count).expect("checked non-negative")];
        return Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(Bytes::new(out)))?));
    }
    let type_name = arg.py_type(&rt.heap);
    Err(ExcType::type_error(format!("cannot convert '{type_name}' object to bytes")))
}

fn collect_byte_values(items: &[Value], heap: &Heap) -> RunResult<Vec<u8>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(i) = item.as_index(heap) else {
            let type_name = item.py_type(heap);
            return Err(ExcType::type_error(format!(
                "'{type_name}' object cannot be interpreted as an integer"
            )));
        };
        let byte = u8::try_from(i)
            .map_err(|_| SimpleException::new_msg(crate::exceptions::ExcType::ValueError, "bytes must be in range(0, 256)"))?;
        out.push(byte);
    }
    Ok(out)
}
