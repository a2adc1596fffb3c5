//! User-defined functions.
//!
//! A function pairs a code object with its globals, evaluated defaults and
//! an optional closure tuple. Calling one binds the payload through the
//! function's `ArgParser`, pushes a frame carrying the bound slots, and
//! hands the frame to the interpreter collaborator. The frame keeps the
//! code object it started with even if the function's code is replaced
//! while the frame runs.

use std::rc::Rc;

use crate::{
    argparse::{ArgParser, ParamDef, ParamKind},
    code::CodeObject,
    exceptions::{RunError, RunResult},
    frame::Frame,
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    ops::{Operations, call_slot, tern, un},
    runtime::Runtime,
    tracer::TraceEvent,
    types::str::Str,
    value::Value,
};

/// A function defined by Language code.
#[derive(Debug)]
pub struct Function {
    name: StringId,
    code: Rc<CodeObject>,
    parser: Rc<ArgParser>,
    /// Owned reference to the defining module's globals dict.
    globals: Value,
    /// Evaluated default values, right-aligned over the regulars.
    defaults: Vec<Value>,
    /// Closure cells: a tuple matching the code's free variables.
    closure: Option<Value>,
}

impl Function {
    /// Builds a function over a code object, deriving the `ArgParser` from
    /// the code's parameter layout.
    pub fn new(
        code: Rc<CodeObject>,
        globals: Value,
        defaults: Vec<Value>,
        closure: Option<Value>,
        interns: &mut Interns,
    ) -> RunResult<Self> {
        let parser = Rc::new(parser_from_code(&code, interns)?);
        let name = interns.intern(&code.name);
        Ok(Self {
            name,
            code,
            parser,
            globals,
            defaults,
            closure,
        })
    }

    #[must_use]
    pub fn name(&self) -> StringId {
        self.name
    }

    #[must_use]
    pub fn code(&self) -> &Rc<CodeObject> {
        &self.code
    }

    #[must_use]
    pub fn parser(&self) -> &Rc<ArgParser> {
        &self.parser
    }

    #[must_use]
    pub fn globals(&self) -> &Value {
        &self.globals
    }

    #[must_use]
    pub fn closure(&self) -> Option<&Value> {
        self.closure.as_ref()
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        self.globals.collect_refs(stack);
        for default in &self.defaults {
            default.collect_refs(stack);
        }
        if let Some(closure) = &self.closure {
            closure.collect_refs(stack);
        }
    }
}

/// Derives an `ArgParser` from a code object's parameter counts.
fn parser_from_code(code: &CodeObject, interns: &mut Interns) -> RunResult<ArgParser> {
    let named = code.posonly_count + code.arg_count + code.kwonly_count;
    if code.varnames.len() < named {
        return Err(RunError::internal(format!(
            "code object '{}' has fewer varnames than parameters",
            code.name
        )));
    }
    let mut defs: Vec<ParamDef> = Vec::with_capacity(named + 2);
    // Leak-free static names are not available for dynamic code objects;
    // the parser interns the names itself, so build transient ParamDefs
    // over interned content.
    let mut name_iter = code.varnames.iter();
    for _ in 0..code.posonly_count {
        let name = name_iter.next().expect("counted above");
        defs.push(param_def(name, ParamKind::PositionalOnly, interns));
    }
    for _ in 0..code.arg_count {
        let name = name_iter.next().expect("counted above");
        defs.push(param_def(name, ParamKind::PositionalOrKeyword, interns));
    }
    if code.has_varargs {
        defs.push(ParamDef::var_args("args"));
    }
    for _ in 0..code.kwonly_count {
        let name = name_iter.next().expect("counted above");
        defs.push(param_def(name, ParamKind::KeywordOnly, interns));
    }
    if code.has_varkwargs {
        defs.push(ParamDef::var_kwargs("kwargs"));
    }
    ArgParser::new(&code.name, &defs, interns)
}

/// Builds a `ParamDef` for a dynamically-named parameter.
///
/// `ParamDef` names carry a `'static` bound; code-object parameter names
/// are leaked once, at function construction, to satisfy it.
fn param_def(name: &str, kind: ParamKind, interns: &mut Interns) -> ParamDef {
    let id = interns.intern(name);
    let leaked: &'static str = Box::leak(interns.get_str(id).to_owned().into_boxed_str());
    ParamDef {
        name: leaked,
        kind,
        default: None,
        rename: None,
    }
}

fn expect_function_id(v: &Value, heap: &Heap) -> RunResult<HeapId> {
    match v {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::Function(_)) => Ok(*id),
        _ => Err(RunError::internal("function slot on non-function carrier")),
    }
}

/// Calls a function: bind, frame, evaluate.
fn fn_call(callee: &Value, args: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_function_id(callee, &rt.heap)?;
    let (parser, code, globals, defaults) = match rt.heap.get(id) {
        HeapData::Function(f) => (
            f.parser.clone(),
            f.code.clone(),
            f.globals.clone_with_heap(&rt.heap),
            f.defaults.iter().map(|d| d.clone_with_heap(&rt.heap)).collect::<Vec<_>>(),
        ),
        _ => unreachable!("checked function carrier above"),
    };

    if let Err(err) = rt.thread.ensure_frame_capacity() {
        globals.drop_with_heap(&mut rt.heap);
        for default in defaults {
            default.drop_with_heap(&mut rt.heap);
        }
        return Err(err);
    }

    let slots = match parser.bind_with_defaults(args, names, &defaults, rt) {
        Ok(slots) => slots,
        Err(err) => {
            globals.drop_with_heap(&mut rt.heap);
            for default in defaults {
                default.drop_with_heap(&mut rt.heap);
            }
            return Err(err);
        }
    };
    for default in defaults {
        default.drop_with_heap(&mut rt.heap);
    }

    let mut frame = Frame::new(Some(callee.clone_with_heap(&rt.heap)), code.clone(), globals, None);
    frame.slots = slots.into_vec();

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
    result
}

fn fn_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_function_id(v, &rt.heap)?;
    let text = match rt.heap.get(id) {
        HeapData::Function(f) => format!("<function {}>", rt.interns.get_str(f.name)),
        _ => unreachable!("checked function carrier above"),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

/// Functions are non-data descriptors: class attribute access binds them.
fn fn_get(descr: &Value, instance: &Value, _owner: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if matches!(instance, Value::None | Value::Undefined) {
        return Ok(descr.clone_with_heap(&rt.heap));
    }
    let method = crate::descriptor::BoundMethod::new(descr.clone_with_heap(&rt.heap), instance.clone_with_heap(&rt.heap));
    Ok(Value::Ref(rt.heap.allocate(HeapData::BoundMethod(method))?))
}

pub(crate) const OPS: Operations = Operations {
    call: call_slot(fn_call),
    repr: un(fn_repr),
    get: tern(fn_get),
    ..Operations::EMPTY
};
