//! Implementation of the min() and max() builtin functions.
//!
//! Two forms: `min(iterable)` and `min(a, b, ...)`, both with optional
//! `key=` and `default=` keywords. `default=` is only valid with the
//! single-iterable form.

use crate::{
    call::call_value,
    exceptions::{ExcType, RunResult, SimpleException},
    intern::StringId,
    ops::{CmpOp, compare_op, iter_next, iter_value, truthy},
    runtime::Runtime,
    value::Value,
};

/// Implementation of the min() builtin function.
pub fn builtin_min(values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    builtin_min_max(values, names, rt, true)
}

/// Implementation of the max() builtin function.
pub fn builtin_max(values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    builtin_min_max(values, names, rt, false)
}

/// Shared implementation; `is_min` selects the ordering.
fn builtin_min_max(values: &[Value], names: &[StringId], rt: &mut Runtime, is_min: bool) -> RunResult<Value> {
    let func_name = if is_min { "min" } else { "max" };
    let np = values.len() - names.len();
    let positional = &values[..np];

    let mut key_fn: Option<&Value> = None;
    let mut default: Option<&Value> = None;
    for (i, &name_id) in names.iter().enumerate() {
        let value = &values[np + i];
        match rt.interns.get_str(name_id) {
            "key" => {
                if key_fn.is_some() {
                    return Err(ExcType::type_error_duplicate_arg(func_name, "key"));
                }
                if !matches!(value, Value::None) {
                    key_fn = Some(value);
                }
            }
            "default" => {
                if default.is_some() {
                    return Err(ExcType::type_error_duplicate_arg(func_name, "default"));
                }
                default = Some(value);
            }
            other => {
                return Err(ExcType::type_error_unexpected_keyword(func_name, other));
            }
        }
    }

    match positional {
        [] => Err(SimpleException::new_msg(
            ExcType::TypeError,
            format!("{func_name} expected at least 1 argument, got 0"),
        )
        .into()),
        [iterable] => {
            // Single argument: iterate it.
            let iterator = iter_value(iterable, rt)?;
            let first = match iter_next(&iterator, rt) {
                Ok(item) => Some(item),
                Err(err) if err.is_stop_iteration() => None,
                Err(err) => {
                    iterator.drop_with_heap(&mut rt.heap);
                    return Err(err);
                }
            };
            let Some(first) = first else {
                iterator.drop_with_heap(&mut rt.heap);
                return match default {
                    Some(value) => Ok(value.clone_with_heap(&rt.heap)),
                    None => Err(SimpleException::new_msg(
                        ExcType::ValueError,
                        format!("{func_name}() iterable argument is empty"),
                    )
                    .into()),
                };
            };

            let result = reduce_iterator(first, &iterator, key_fn, is_min, rt);
            iterator.drop_with_heap(&mut rt.heap);
            result
        }
        _ => {
            // Multiple arguments: compare them directly.
            if default.is_some() {
                return Err(SimpleException::new_msg(
                    ExcType::TypeError,
                    format!("Cannot specify a default for {func_name}() with multiple positional arguments"),
                )
                .into());
            }
            let mut best = positional[0].clone_with_heap(&rt.heap);
            let mut best_key = match apply_key(key_fn, &best, rt) {
                Ok(key) => key,
                Err(err) => {
                    best.drop_with_heap(&mut rt.heap);
                    return Err(err);
                }
            };
            for item in &positional[1..] {
                let item = item.clone_with_heap(&rt.heap);
                match consider(&mut best, &mut best_key, item, key_fn, is_min, rt) {
                    Ok(()) => {}
                    Err(err) => {
                        best.drop_with_heap(&mut rt.heap);
                        if let Some(key) = best_key {
                            key.drop_with_heap(&mut rt.heap);
                        }
                        return Err(err);
                    }
                }
            }
            if let Some(key) = best_key {
                key.drop_with_heap(&mut rt.heap);
            }
            Ok(best)
        }
    }
}

/// Folds the remaining iterator items into the running best value.
fn reduce_iterator(
    first: Value,
    iterator: &Value,
    key_fn: Option<&Value>,
    is_min: bool,
    rt: &mut Runtime,
) -> RunResult<Value> {
    let mut best = first;
    let mut best_key = match apply_key(key_fn, &best, rt) {
        Ok(key) => key,
        Err(err) => {
            best.drop_with_heap(&mut rt.heap);
            return Err(err);
        }
    };

    loop {
        let item = match iter_next(iterator, rt) {
            Ok(item) => item,
            Err(err) if err.is_stop_iteration() => break,
            Err(err) => {
                best.drop_with_heap(&mut rt.heap);
                if let Some(key) = best_key {
                    key.drop_with_heap(&mut rt.heap);
                }
                return Err(err);
            }
        };
        if let Err(err) = consider(&mut best, &mut best_key, item, key_fn, is_min, rt) {
            best.drop_with_heap(&mut rt.heap);
            if let Some(key) = best_key {
                key.drop_with_heap(&mut rt.heap);
            }
            return Err(err);
        }
    }

    if let Some(key) = best_key {
        key.drop_with_heap(&mut rt.heap);
    }
    Ok(best)
}

/// Compares one candidate (owned) against the running best, swapping when
/// the candidate wins. Consumes the candidate either way.
fn consider(
    best: &mut Value,
    best_key: &mut Option<Value>,
    item: Value,
    key_fn: Option<&Value>,
    is_min: bool,
    rt: &mut Runtime,
) -> RunResult<()> {
    let item_key = match apply_key(key_fn, &item, rt) {
        Ok(key) => key,
        Err(err) => {
            item.drop_with_heap(&mut rt.heap);
            return Err(err);
        }
    };

    let (lhs, rhs) = match (&item_key, &*best_key) {
        (Some(ik), Some(bk)) => (ik, bk),
        _ => (&item, &*best),
    };
    let op = if is_min { CmpOp::Lt } else { CmpOp::Gt };
    let verdict = compare_op(op, lhs, rhs, rt);
    let wins = match verdict {
        Ok(result) => {
            let truth = truthy(&result, rt);
            result.drop_with_heap(&mut rt.heap);
            match truth {
                Ok(b) => b,
                Err(err) => {
                    item.drop_with_heap(&mut rt.heap);
                    if let Some(key) = item_key {
                        key.drop_with_heap(&mut rt.heap);
                    }
                    return Err(err);
                }
            }
        }
        Err(err) => {
            item.drop_with_heap(&mut rt.heap);
            if let Some(key) = item_key {
                key.drop_with_heap(&mut rt.heap);
            }
            return Err(err);
        }
    };

    if wins {
        std::mem::replace(best, item).drop_with_heap(&mut rt.heap);
        if let Some(old) = std::mem::replace(best_key, item_key) {
            old.drop_with_heap(&mut rt.heap);
        }
    } else {
        item.drop_with_heap(&mut rt.heap);
        if let Some(key) = item_key {
            key.drop_with_heap(&mut rt.heap);
        }
    }
    Ok(())
}

/// Applies the `key=` callable to one item.
fn apply_key(key_fn: Option<&Value>, item: &Value, rt: &mut Runtime) -> RunResult<Option<Value>> {
    match key_fn {
        None => Ok(None),
        Some(callable) => {
            let result = call_value(callable, std::slice::from_ref(item), &[], rt)?;
            Ok(Some(result))
        }
    }
}
