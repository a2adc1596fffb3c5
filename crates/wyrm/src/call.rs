//! The call protocol.
//!
//! [`FastCall`] is the surface every callable exposes: the canonical
//! `call(values, names)` plus arity-specialised entries and a vectorcall
//! entry that takes a stack slice instead of an allocated payload. The
//! default implementations all funnel into `call`, and `call` dispatches
//! through the callee's Operations table, so every shape of the same
//! payload produces the same result.

use crate::{
    exceptions::{ExcType, RunResult},
    intern::StringId,
    ops::{CallSlot, ops_of},
    runtime::Runtime,
    tracer::TraceEvent,
    value::Value,
};

/// The callable surface.
///
/// `call(values, names)` is ground truth: `values` holds positional values
/// followed by keyword values, `names` the keyword names for the trailing
/// `names.len()` values. Implementations may override any subset of the
/// other entries, but every override must route through the same argument
/// parser so the shapes cannot diverge.
pub trait FastCall {
    /// The canonical entry; always available.
    fn call(&self, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value>;

    /// Zero-argument entry.
    fn call0(&self, rt: &mut Runtime) -> RunResult<Value> {
        self.call(&[], &[], rt)
    }

    /// One-argument entry.
    fn call1(&self, a0: &Value, rt: &mut Runtime) -> RunResult<Value> {
        self.call(std::slice::from_ref(a0), &[], rt)
    }

    /// Two-argument entry.
    fn call2(&self, a0: &Value, a1: &Value, rt: &mut Runtime) -> RunResult<Value> {
        let payload = [a0.clone_with_heap(&rt.heap), a1.clone_with_heap(&rt.heap)];
        let result = self.call(&payload, &[], rt);
        for value in payload {
            value.drop_with_heap(&mut rt.heap);
        }
        result
    }

    /// Three-argument entry.
    fn call3(&self, a0: &Value, a1: &Value, a2: &Value, rt: &mut Runtime) -> RunResult<Value> {
        let payload = [
            a0.clone_with_heap(&rt.heap),
            a1.clone_with_heap(&rt.heap),
            a2.clone_with_heap(&rt.heap),
        ];
        let result = self.call(&payload, &[], rt);
        for value in payload {
            value.drop_with_heap(&mut rt.heap);
        }
        result
    }

    /// Four-argument entry.
    fn call4(&self, a0: &Value, a1: &Value, a2: &Value, a3: &Value, rt: &mut Runtime) -> RunResult<Value> {
        let payload = [
            a0.clone_with_heap(&rt.heap),
            a1.clone_with_heap(&rt.heap),
            a2.clone_with_heap(&rt.heap),
            a3.clone_with_heap(&rt.heap),
        ];
        let result = self.call(&payload, &[], rt);
        for value in payload {
            value.drop_with_heap(&mut rt.heap);
        }
        result
    }

    /// Vectorcall entry: `n` values starting at `stack[sp]`, the trailing
    /// `names.len()` of them keyword values. The default slices the stack
    /// and dispatches to `call`.
    fn vectorcall(
        &self,
        stack: &[Value],
        sp: usize,
        n: usize,
        names: &[StringId],
        rt: &mut Runtime,
    ) -> RunResult<Value> {
        self.call(&stack[sp..sp + n], names, rt)
    }
}

/// Every value is callable through its Operations table; values without a
/// `call` slot raise `TypeError`.
impl FastCall for Value {
    fn call(&self, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
        call_value(self, values, names, rt)
    }
}

/// The call-site dispatch: consults the callee's Operations table, guards
/// native recursion depth, and reports the call to the tracer.
pub fn call_value(callee: &Value, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    debug_assert!(names.len() <= values.len(), "more keyword names than values");
    let slot = ops_of(callee, rt).call;
    let Some(slot) = slot else {
        let type_name = callee.type_name(&rt.heap, &rt.interns).into_owned();
        return Err(ExcType::type_error_not_callable(type_name));
    };

    rt.thread.enter_call()?;
    rt.trace(TraceEvent::Call {
        what: callee.type_name(&rt.heap, &rt.interns).into_owned(),
        nargs: values.len() - names.len(),
    });

    let result = match slot {
        CallSlot::Native(f) => f(callee, values, names, rt),
        CallSlot::Defined(descr) => {
            // A user-defined `__call__`: the callee travels as the
            // receiver in front of the payload.
            let mut combined: Vec<Value> = Vec::with_capacity(values.len() + 1);
            combined.push(callee.clone_with_heap(&rt.heap));
            for value in values {
                combined.push(value.clone_with_heap(&rt.heap));
            }
            let descr_value = Value::Ref(descr);
            let result = call_value(&descr_value, &combined, names, rt);
            for value in combined {
                value.drop_with_heap(&mut rt.heap);
            }
            result
        }
    };

    rt.thread.exit_call();
    if let Err(err) = &result {
        if let Some(exc) = err.exception() {
            rt.trace(TraceEvent::Raise {
                exc_type: exc.exc_type(),
            });
        }
    }
    result
}
