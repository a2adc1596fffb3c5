//! The string type and its heap carrier.
//!
//! `str` adopts two carriers: interned strings (`Value::InternString`, id
//! into the intern table) and heap strings ([`Str`]). Both dispatch through
//! the same Operations table; every handle goes through
//! `Value::as_either_str` so the carrier split never leaks.

use std::fmt::{self, Write};

use crate::{
    argparse::ParamDef,
    exceptions::{ExcType, RunError, RunResult},
    expose::{MethodDef, MethodHandle, MethodKind},
    heap::{Heap, HeapData},
    ops::{Operations, bin, hash_slot, len_slot, un},
    py_hash,
    runtime::Runtime,
    types::iter::ValueIter,
    value::Value,
};

/// Heap storage for a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Str(Box<str>);

impl Str {
    #[must_use]
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Str {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for Str {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

/// Writes the Language repr of string content: preferred single quotes,
/// double quotes when the content contains a single quote but no double
/// quote, backslash escapes for control characters.
pub fn string_repr_fmt(value: &str, f: &mut impl Write) -> fmt::Result {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    f.write_char(quote)?;
    for ch in value.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            ch if ch == quote => {
                f.write_char('\\')?;
                f.write_char(ch)?;
            }
            ch if (ch as u32) < 0x20 || (ch as u32) == 0x7f => {
                write!(f, "\\x{:02x}", ch as u32)?;
            }
            ch => f.write_char(ch)?,
        }
    }
    f.write_char(quote)
}

fn expect_str<'a>(v: &'a Value, heap: &'a Heap, interns: &'a crate::intern::Interns) -> RunResult<&'a str> {
    v.as_either_str(heap, interns)
        .ok_or_else(|| RunError::internal("str slot on non-string carrier"))
}

fn str_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?;
    let mut out = String::with_capacity(content.len() + 2);
    string_repr_fmt(content, &mut out).expect("string write cannot fail");
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn str_str(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    Ok(v.clone_with_heap(&rt.heap))
}

fn str_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    let content = expect_str(v, &rt.heap, &rt.interns)?;
    Ok(py_hash::hash_str(content))
}

fn str_len(v: &Value, rt: &Runtime) -> RunResult<usize> {
    // Characters, not bytes.
    Ok(expect_str(v, &rt.heap, &rt.interns)?.chars().count())
}

fn str_add(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let lhs = expect_str(v, &rt.heap, &rt.interns)?;
    let Some(rhs) = w.as_either_str(&rt.heap, &rt.interns) else {
        return Ok(Value::NotImplemented);
    };
    let mut out = String::with_capacity(lhs.len() + rhs.len());
    out.push_str(lhs);
    out.push_str(rhs);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn str_mul(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?;
    let Some(count) = w.as_index(&rt.heap) else {
        return Ok(Value::NotImplemented);
    };
    let count = usize::try_from(count.max(0)).expect("clamped to non-negative");
    let out = content.repeat(count);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn str_contains(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let haystack = expect_str(v, &rt.heap, &rt.interns)?;
    let Some(needle) = w.as_either_str(&rt.heap, &rt.interns) else {
        let type_name = w.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "'in <string>' requires string as left operand, not {type_name}"
        )));
    };
    Ok(Value::Bool(haystack.contains(needle)))
}

fn str_getitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?;
    let Some(index) = key.as_index(&rt.heap) else {
        let key_type = key.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "string indices must be integers, not '{key_type}'"
        )));
    };
    let char_count = content.chars().count();
    let resolved = if index < 0 {
        index + i64::try_from(char_count).unwrap_or(i64::MAX)
    } else {
        index
    };
    let in_range = usize::try_from(resolved).ok().filter(|&i| i < char_count);
    let Some(position) = in_range else {
        return Err(ExcType::str_index_error());
    };
    let ch = content.chars().nth(position).expect("bounds checked");
    let out = ch.to_string();
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(out)))?))
}

fn str_iter(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let backing = v.clone_with_heap(&rt.heap);
    let iter = ValueIter::sequence(backing);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Iter(iter))?))
}

macro_rules! str_compare {
    ($name:ident, $method:ident) => {
        fn $name(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
            let lhs = expect_str(v, &rt.heap, &rt.interns)?;
            let Some(rhs) = w.as_either_str(&rt.heap, &rt.interns) else {
                return Ok(Value::NotImplemented);
            };
            Ok(Value::Bool(lhs.$method(rhs)))
        }
    };
}

str_compare!(str_lt, lt);
str_compare!(str_le, le);
str_compare!(str_ge, ge);
str_compare!(str_gt, gt);

fn str_eq(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let lhs = expect_str(v, &rt.heap, &rt.interns)?;
    match w.as_either_str(&rt.heap, &rt.interns) {
        Some(rhs) => Ok(Value::Bool(lhs == rhs)),
        None => Ok(Value::NotImplemented),
    }
}

fn str_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match str_eq(v, w, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

pub(crate) const OPS: Operations = Operations {
    repr: un(str_repr),
    str_: un(str_str),
    hash: hash_slot(str_hash),
    len: len_slot(str_len),
    add: bin(str_add),
    mul: bin(str_mul),
    rmul: bin(str_mul),
    contains: bin(str_contains),
    getitem: bin(str_getitem),
    iter: un(str_iter),
    lt: bin(str_lt),
    le: bin(str_le),
    eq: bin(str_eq),
    ne: bin(str_ne),
    ge: bin(str_ge),
    gt: bin(str_gt),
    ..Operations::EMPTY
};

// --- named methods, built by the exposure pipeline ------------------------

fn str_upper(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?.to_uppercase();
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(content)))?))
}

fn str_lower(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?.to_lowercase();
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(content)))?))
}

fn str_startswith(v: &Value, prefix: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?;
    let Some(prefix) = prefix.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("startswith first arg must be str"));
    };
    Ok(Value::Bool(content.starts_with(prefix)))
}

fn str_endswith(v: &Value, suffix: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let content = expect_str(v, &rt.heap, &rt.interns)?;
    let Some(suffix) = suffix.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("endswith first arg must be str"));
    };
    Ok(Value::Bool(content.ends_with(suffix)))
}

/// Method table scanned by exposure when the `str` type object is built.
pub(crate) static METHODS: &[MethodDef] = &[
    MethodDef {
        name: "upper",
        kind: MethodKind::Instance,
        doc: Some("Return a copy of the string converted to uppercase."),
        params: &[],
        handle: MethodHandle::NoArgs(str_upper),
        carrier: None,
        primary: true,
    },
    MethodDef {
        name: "lower",
        kind: MethodKind::Instance,
        doc: Some("Return a copy of the string converted to lowercase."),
        params: &[],
        handle: MethodHandle::NoArgs(str_lower),
        carrier: None,
        primary: true,
    },
    MethodDef {
        name: "startswith",
        kind: MethodKind::Instance,
        doc: None,
        params: &[ParamDef::positional_only("prefix")],
        handle: MethodHandle::One(str_startswith),
        carrier: None,
        primary: true,
    },
    MethodDef {
        name: "endswith",
        kind: MethodKind::Instance,
        doc: None,
        params: &[ParamDef::positional_only("suffix")],
        handle: MethodHandle::One(str_endswith),
        carrier: None,
        primary: true,
    },
];
