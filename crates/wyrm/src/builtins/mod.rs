//! Builtin functions and exception-type constructors.
//!
//! Each builtin function lives in its own submodule. Builtins are
//! immediate values (`Value::Builtin`) and dispatch through the same call
//! protocol as every other callable: the `Builtin` carrier's Operations
//! table routes `call` here.

mod abs;
mod callable;
mod exec;
mod isinstance;
mod iter;
mod len;
mod min_max; // min and max share implementation
mod repr;

use strum::{Display, EnumString, IntoStaticStr};

pub use exec::ExecSource;
pub(crate) use exec::exec_impl;

use crate::{
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    heap::HeapData,
    intern::StringId,
    ops::{Operations, bin, call_slot, hash_slot, un},
    runtime::{Runtime, value_to_object},
    types::{Type, str::Str},
    value::Value,
};

/// Builtin functions reachable from Language code.
///
/// The strum string form is the Language-visible name (lowercase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinFunctions {
    Abs,
    Callable,
    Exec,
    Isinstance,
    Issubclass,
    Iter,
    Len,
    Max,
    Min,
    Next,
    Repr,
}

/// An immediate builtin value: a function or an exception type.
///
/// Non-exception built-in types are canonical heap `TypeObject`s; exception
/// types stay immediate so raise sites and `except` matching need no heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtins {
    /// A builtin function like `len`, `repr`, `min`.
    Function(BuiltinFunctions),
    /// An exception type constructor like `ValueError`.
    ExcType(ExcType),
}

impl Builtins {
    /// The Language type of this builtin value.
    #[must_use]
    pub fn py_type(self) -> Type {
        match self {
            Self::Function(_) => Type::BuiltinFunction,
            // Exception types are classes.
            Self::ExcType(_) => Type::Type,
        }
    }

    /// Calls this builtin.
    pub fn call(self, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
        match self {
            Self::Function(f) => f.call(values, names, rt),
            Self::ExcType(exc) => {
                reject_keywords(exc.into(), names)?;
                construct_exception(exc, values, rt)
            }
        }
    }
}

impl BuiltinFunctions {
    /// Dispatches to the function's implementation module.
    pub fn call(self, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
        match self {
            Self::Abs => {
                reject_keywords("abs", names)?;
                abs::builtin_abs(values, rt)
            }
            Self::Callable => {
                reject_keywords("callable", names)?;
                callable::builtin_callable(values, rt)
            }
            Self::Exec => exec::builtin_exec(values, names, rt),
            Self::Isinstance => {
                reject_keywords("isinstance", names)?;
                isinstance::builtin_isinstance(values, rt)
            }
            Self::Issubclass => {
                reject_keywords("issubclass", names)?;
                isinstance::builtin_issubclass(values, rt)
            }
            Self::Iter => {
                reject_keywords("iter", names)?;
                iter::builtin_iter(values, rt)
            }
            Self::Len => {
                reject_keywords("len", names)?;
                len::builtin_len(values, rt)
            }
            Self::Max => min_max::builtin_max(values, names, rt),
            Self::Min => min_max::builtin_min(values, names, rt),
            Self::Next => {
                reject_keywords("next", names)?;
                iter::builtin_next(values, rt)
            }
            Self::Repr => {
                reject_keywords("repr", names)?;
                repr::builtin_repr(values, rt)
            }
        }
    }
}

/// Raises the no-keyword-arguments error builtins share.
fn reject_keywords(name: &str, names: &[StringId]) -> RunResult<()> {
    if names.is_empty() {
        Ok(())
    } else {
        Err(SimpleException::new_msg(ExcType::TypeError, format!("{name}() takes no keyword arguments")).into())
    }
}

/// Constructs an exception instance from its type and arguments.
///
/// `KeyError` retains the raw key value; other types render their single
/// argument into the deferred message.
pub(crate) fn construct_exception(exc: ExcType, values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    let payload = match values {
        [] => SimpleException::new_none(exc),
        [arg] => {
            if exc == ExcType::KeyError {
                SimpleException::with_key(exc, value_to_object(arg, &rt.heap, &rt.interns))
            } else if let Some(text) = arg.as_either_str(&rt.heap, &rt.interns) {
                SimpleException::new_msg(exc, text)
            } else {
                let rendered = crate::ops::repr_value(arg, rt)?;
                SimpleException::new_msg(exc, rendered)
            }
        }
        _ => {
            return Err(SimpleException::new_msg(
                ExcType::TypeError,
                format!("{exc}() takes at most 1 argument ({} given)", values.len()),
            )
            .into());
        }
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Exception(payload))?))
}

// --- Operations for the Builtin carrier ----------------------------------

fn expect_builtin(v: &Value) -> RunResult<Builtins> {
    match v {
        Value::Builtin(b) => Ok(*b),
        _ => Err(RunError::internal("builtin slot on non-builtin carrier")),
    }
}

fn builtin_call(callee: &Value, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    expect_builtin(callee)?.call(values, names, rt)
}

fn builtin_repr_slot(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let text = match expect_builtin(v)? {
        Builtins::Function(f) => format!("<built-in function {f}>"),
        Builtins::ExcType(exc) => format!("<class '{exc}'>"),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

fn builtin_eq(v: &Value, w: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    match w {
        Value::Builtin(_) => Ok(Value::Bool(v.is_(w))),
        _ => Ok(Value::NotImplemented),
    }
}

fn builtin_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    crate::types::tuple::hash_immutable(v, &rt.heap, &rt.interns)
}

pub(crate) const OPS: Operations = Operations {
    call: call_slot(builtin_call),
    repr: un(builtin_repr_slot),
    eq: bin(builtin_eq),
    hash: hash_slot(builtin_hash),
    ..Operations::EMPTY
};
