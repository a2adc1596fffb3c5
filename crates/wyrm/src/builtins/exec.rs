//! Implementation of the exec() builtin function.
//!
//! `exec(source, globals=None, locals=None, closure=None)` follows this
//! contract:
//!
//! 1. Globals: the argument when given and not `None`; otherwise the top
//!    frame's globals; with no frame and none given, `SystemError`.
//! 2. Locals: the argument when given; else the globals when only globals
//!    were supplied; else the top frame's locals.
//! 3. Non-mapping locals are a `TypeError`.
//! 4. `__builtins__` is ensured in the globals.
//! 5. A code-object source has its closure arity-checked against the
//!    code's free variables; then a function and frame are built and
//!    evaluated.
//! 6. A string source rejects a closure and goes through the compiler
//!    collaborator.

use std::rc::Rc;

use crate::{
    code::CodeObject,
    exceptions::{ExcType, RunResult, SimpleException},
    frame::Frame,
    heap::HeapData,
    intern::StringId,
    runtime::Runtime,
    tracer::TraceEvent,
    types::{function::Function, module::ensure_builtins},
    value::Value,
};

/// The source form accepted by `exec`.
#[derive(Debug, Clone)]
pub enum ExecSource {
    /// Source text, compiled through the compiler collaborator.
    Str(String),
    /// An already-compiled code object.
    Code(Rc<CodeObject>),
}

/// The Language-visible `exec` entry: positional source/globals/locals,
/// optional `closure=` keyword.
pub fn builtin_exec(values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    let np = values.len() - names.len();
    let positional = &values[..np];

    let mut closure: Option<&Value> = None;
    for (i, &name_id) in names.iter().enumerate() {
        let value = &values[np + i];
        match rt.interns.get_str(name_id) {
            "closure" => {
                if !matches!(value, Value::None) {
                    closure = Some(value);
                }
            }
            other => return Err(ExcType::type_error_unexpected_keyword("exec", other)),
        }
    }

    let (source_value, globals, locals) = match positional {
        [source] => (source, None, None),
        [source, globals] => (source, not_none(globals), None),
        [source, globals, locals] => (source, not_none(globals), not_none(locals)),
        [] => return Err(ExcType::type_error_at_least("exec", 1, 0)),
        _ => return Err(ExcType::type_error_at_most("exec", 3, positional.len())),
    };

    let source = if let Some(text) = source_value.as_either_str(&rt.heap, &rt.interns) {
        ExecSource::Str(text.to_owned())
    } else if let Value::Ref(id) = source_value {
        match rt.heap.get(*id) {
            HeapData::Code(code) => ExecSource::Code(Rc::new(code.clone())),
            _ => {
                let type_name = source_value.py_type(&rt.heap);
                return Err(ExcType::type_error(format!(
                    "exec() arg 1 must be a string or code object, not {type_name}"
                )));
            }
        }
    } else {
        let type_name = source_value.py_type(&rt.heap);
        return Err(ExcType::type_error(format!(
            "exec() arg 1 must be a string or code object, not {type_name}"
        )));
    };

    exec_impl(source, globals, locals, closure, rt)
}

fn not_none(v: &Value) -> Option<&Value> {
    match v {
        Value::None => None,
        other => Some(other),
    }
}

/// The `exec` contract over resolved arguments. Returns `None`.
pub(crate) fn exec_impl(
    source: ExecSource,
    globals_arg: Option<&Value>,
    locals_arg: Option<&Value>,
    closure: Option<&Value>,
    rt: &mut Runtime,
) -> RunResult<Value> {
    // 1. Resolve globals.
    let globals = match globals_arg {
        Some(globals) => globals.clone_with_heap(&rt.heap),
        None => match rt.thread.current_frame() {
            Some(frame) => frame.globals.clone_with_heap(&rt.heap),
            None => return Err(ExcType::system_error("exec(): no current frame and no globals supplied")),
        },
    };
    if !matches!(globals.ref_id().map(|id| rt.heap.get(id)), Some(HeapData::Dict(_))) {
        let type_name = globals.py_type(&rt.heap);
        globals.drop_with_heap(&mut rt.heap);
        return Err(ExcType::type_error(format!("exec() globals must be a dict, not {type_name}")));
    }

    // 2. Resolve locals.
    let locals = match (locals_arg, globals_arg) {
        (Some(locals), _) => locals.clone_with_heap(&rt.heap),
        (None, Some(_)) => globals.clone_with_heap(&rt.heap),
        (None, None) => match rt.thread.current_frame() {
            Some(frame) => match &frame.locals {
                Some(locals) => locals.clone_with_heap(&rt.heap),
                None => globals.clone_with_heap(&rt.heap),
            },
            None => globals.clone_with_heap(&rt.heap),
        },
    };

    // 3. Locals must be a mapping.
    let locals_ops = crate::ops::ops_of(&locals, rt);
    let is_mapping = locals_ops.getitem.is_some() && locals_ops.setitem.is_some();
    if !is_mapping {
        let type_name = locals.py_type(&rt.heap);
        globals.drop_with_heap(&mut rt.heap);
        locals.drop_with_heap(&mut rt.heap);
        return Err(ExcType::type_error(format!(
            "locals must be a mapping or None, not {type_name}"
        )));
    }

    // 4. Ensure `__builtins__`.
    if let Err(err) = ensure_builtins(&globals, rt) {
        globals.drop_with_heap(&mut rt.heap);
        locals.drop_with_heap(&mut rt.heap);
        return Err(err);
    }

    // 5/6. Resolve the code object.
    let code = match source {
        ExecSource::Code(code) => {
            let nfree = code.freevars.len();
            match (nfree, closure) {
                (0, Some(_)) => {
                    globals.drop_with_heap(&mut rt.heap);
                    locals.drop_with_heap(&mut rt.heap);
                    return Err(ExcType::type_error(
                        "cannot use a closure with this code object",
                    ));
                }
                (0, None) => {}
                (n, maybe_closure) => {
                    let supplied = maybe_closure.map_or(0, |c| closure_len(c, rt));
                    if supplied != n {
                        globals.drop_with_heap(&mut rt.heap);
                        locals.drop_with_heap(&mut rt.heap);
                        return Err(SimpleException::new_msg(
                            ExcType::TypeError,
                            format!("code object requires a closure of exactly {n} cells, got {supplied}"),
                        )
                        .into());
                    }
                }
            }
            code
        }
        ExecSource::Str(text) => {
            if closure.is_some() {
                globals.drop_with_heap(&mut rt.heap);
                locals.drop_with_heap(&mut rt.heap);
                return Err(ExcType::type_error(
                    "closure can only be used when source is a code object",
                ));
            }
            let Some(compiler) = rt.compiler() else {
                globals.drop_with_heap(&mut rt.heap);
                locals.drop_with_heap(&mut rt.heap);
                return Err(ExcType::system_error("exec(): no compiler collaborator installed"));
            };
            match compiler.compile(&text) {
                Ok(code) => code,
                Err(err) => {
                    globals.drop_with_heap(&mut rt.heap);
                    locals.drop_with_heap(&mut rt.heap);
                    return Err(err);
                }
            }
        }
    };

    // Build the function and its frame, then evaluate.
    let function = match Function::new(
        code.clone(),
        globals.clone_with_heap(&rt.heap),
        Vec::new(),
        closure.map(|c| c.clone_with_heap(&rt.heap)),
        &mut rt.interns,
    ) {
        Ok(function) => function,
        Err(err) => {
            globals.drop_with_heap(&mut rt.heap);
            locals.drop_with_heap(&mut rt.heap);
            return Err(err);
        }
    };
    let function_id = match rt.heap.allocate(HeapData::Function(function)) {
        Ok(id) => id,
        Err(err) => {
            globals.drop_with_heap(&mut rt.heap);
            locals.drop_with_heap(&mut rt.heap);
            return Err(err.into());
        }
    };

    if let Err(err) = rt.thread.ensure_frame_capacity() {
        Value::Ref(function_id).drop_with_heap(&mut rt.heap);
        globals.drop_with_heap(&mut rt.heap);
        locals.drop_with_heap(&mut rt.heap);
        return Err(err);
    }
    let frame = Frame::new(Some(Value::Ref(function_id)), code.clone(), globals, Some(locals));
    rt.trace(TraceEvent::FramePush {
        code_name: code.name.clone(),
    });
    rt.thread.push(frame)?;
    let result = rt.evaluate_top_frame();
    let finished = rt.thread.pop()?;
    finished.drop_with_heap(&mut rt.heap);
    rt.trace(TraceEvent::FramePop {
        code_name: code.name.clone(),
    });

    result?.drop_with_heap(&mut rt.heap);
    Ok(Value::None)
}

/// The closure length: a tuple's element count, otherwise 0.
fn closure_len(closure: &Value, rt: &Runtime) -> usize {
    match closure {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::Tuple(tuple) => tuple.len(),
            _ => 0,
        },
        _ => 0,
    }
}
