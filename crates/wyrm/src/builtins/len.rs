//! Implementation of the len() builtin function.

use crate::{
    exceptions::{ExcType, RunResult},
    ops::len_of,
    runtime::Runtime,
    value::Value,
};

/// `len(x)` through the `len` operation slot.
pub fn builtin_len(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [v] => {
            let length = len_of(v, rt)?;
            Ok(Value::Int(i64::try_from(length).unwrap_or(i64::MAX)))
        }
        _ => Err(ExcType::type_error_arg_count("len", 1, values.len())),
    }
}
