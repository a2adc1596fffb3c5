//! Implementation of the iter() and next() builtin functions.

use crate::{
    exceptions::{ExcType, RunResult},
    ops::{iter_next, iter_value},
    runtime::Runtime,
    value::Value,
};

/// `iter(x)` through the `iter` operation slot.
pub fn builtin_iter(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [v] => iter_value(v, rt),
        _ => Err(ExcType::type_error_arg_count("iter", 1, values.len())),
    }
}

/// `next(iterator[, default])`: advances the iterator; with a default, a
/// `StopIteration` yields the default instead of propagating.
pub fn builtin_next(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [iterator] => iter_next(iterator, rt),
        [iterator, default] => match iter_next(iterator, rt) {
            Err(err) if err.is_stop_iteration() => Ok(default.clone_with_heap(&rt.heap)),
            other => other,
        },
        _ => Err(ExcType::type_error_at_most("next", 2, values.len())),
    }
}
