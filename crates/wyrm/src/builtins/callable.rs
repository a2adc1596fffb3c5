//! Implementation of the callable() builtin function.

use crate::{
    exceptions::{ExcType, RunResult},
    ops::ops_of,
    runtime::Runtime,
    value::Value,
};

/// `callable(x)`: whether the value's Operations table has a call handle.
pub fn builtin_callable(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [v] => Ok(Value::Bool(ops_of(v, rt).call.is_some())),
        _ => Err(ExcType::type_error_arg_count("callable", 1, values.len())),
    }
}
