//! Implementation of the repr() builtin function.

use crate::{
    exceptions::{ExcType, RunResult},
    heap::HeapData,
    ops::repr_value,
    runtime::Runtime,
    types::str::Str,
    value::Value,
};

/// `repr(x)` through the `repr` operation slot.
pub fn builtin_repr(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [v] => {
            let text = repr_value(v, rt)?;
            Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
        }
        _ => Err(ExcType::type_error_arg_count("repr", 1, values.len())),
    }
}
