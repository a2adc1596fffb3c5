//! Implementation of the abs() builtin function.

use crate::{
    exceptions::{ExcType, RunResult},
    ops::{UnOp, unary_op},
    runtime::Runtime,
    value::Value,
};

/// `abs(x)` through the `abs` operation slot.
pub fn builtin_abs(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [v] => unary_op(UnOp::Abs, v, rt),
        _ => Err(ExcType::type_error_arg_count("abs", 1, values.len())),
    }
}
