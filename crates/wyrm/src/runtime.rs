//! The runtime: one interpreter's heap, interned strings, thread state,
//! type registry and collaborators, plus the host-facing entry points.
//!
//! One `Runtime` is one interpreter. Multiple runtimes in a process have
//! fully disjoint state; sharing values across them is undefined and
//! prevented by the ownership model.

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    builtins::{BuiltinFunctions, Builtins, ExecSource},
    call::call_value,
    code::{Compiler, Evaluator},
    exceptions::{ExcType, RunResult, SimpleException},
    frame::ThreadState,
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    object::Object,
    ops::{BinOp, CmpOp, UnOp},
    resource::ResourceLimits,
    tracer::{CallTracer, NoopTracer, TraceEvent},
    types::{
        Type,
        bytes::Bytes,
        class::{self, TypeSpec},
        dict::Dict,
        list::List,
        long_int::LongInt,
        module::{Module, ensure_builtins},
        str::Str,
        tuple::Tuple,
    },
    value::Value,
};

/// One interpreter.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) interns: Interns,
    pub(crate) thread: ThreadState,
    tracer: Box<dyn CallTracer>,
    compiler: Option<Rc<dyn Compiler>>,
    evaluator: Option<Rc<dyn Evaluator>>,
    /// Lazily-created built-in type objects, one per token.
    builtin_types: AHashMap<Type, HeapId>,
    /// The cached `builtins` module (an owned reference).
    builtins_module: Option<Value>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::default())
    }

    /// A runtime with explicit resource limits.
    #[must_use]
    pub fn with_limits(limits: ResourceLimits) -> Self {
        let recursion_limit = limits.max_recursion_depth;
        Self {
            heap: Heap::new(limits),
            interns: Interns::new(),
            thread: ThreadState::new(recursion_limit),
            tracer: Box::new(NoopTracer),
            compiler: None,
            evaluator: None,
            builtin_types: AHashMap::new(),
            builtins_module: None,
        }
    }

    /// Installs the compiler collaborator.
    pub fn set_compiler(&mut self, compiler: Rc<dyn Compiler>) {
        self.compiler = Some(compiler);
    }

    /// Installs the interpreter-loop collaborator.
    pub fn set_evaluator(&mut self, evaluator: Rc<dyn Evaluator>) {
        self.evaluator = Some(evaluator);
    }

    /// Installs a tracer for call-protocol events.
    pub fn set_tracer(&mut self, tracer: Box<dyn CallTracer>) {
        self.tracer = tracer;
    }

    pub(crate) fn compiler(&self) -> Option<Rc<dyn Compiler>> {
        self.compiler.clone()
    }

    pub(crate) fn trace(&mut self, event: TraceEvent) {
        self.tracer.on_event(event);
    }

    /// Evaluates the frame on top of the stack through the interpreter
    /// collaborator.
    pub(crate) fn evaluate_top_frame(&mut self) -> RunResult<Value> {
        let Some(evaluator) = self.evaluator.clone() else {
            return Err(ExcType::system_error("no interpreter collaborator installed"));
        };
        evaluator.evaluate(self)
    }

    /// The per-thread execution state: current frame, stack, depth limit.
    #[must_use]
    pub fn thread(&self) -> &ThreadState {
        &self.thread
    }

    /// Read access to the heap, mainly for tests and diagnostics.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable heap access for hosts that work with heap data directly
    /// (take/restore discipline applies).
    #[must_use]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Clones a value, counting the new reference.
    #[must_use]
    pub fn clone_value(&self, v: &Value) -> Value {
        v.clone_with_heap(&self.heap)
    }

    /// Read access to the intern table.
    #[must_use]
    pub fn interns(&self) -> &Interns {
        &self.interns
    }

    /// Interns a string, returning its id.
    pub fn intern(&mut self, s: &str) -> StringId {
        self.interns.intern(s)
    }

    /// The current frame's globals dict, if a frame is executing.
    #[must_use]
    pub fn current_globals(&self) -> Option<&Value> {
        self.thread.current_frame().map(|frame| &frame.globals)
    }

    /// The current frame's locals mapping, if any.
    #[must_use]
    pub fn current_locals(&self) -> Option<&Value> {
        self.thread.current_frame().and_then(|frame| frame.locals.as_ref())
    }

    /// The interpreter's builtins module, as an owned reference.
    pub fn builtins(&mut self) -> RunResult<Value> {
        self.builtins_module()
    }

    // -----------------------------------------------------------------
    // Type registry
    // -----------------------------------------------------------------

    /// The heap id of a built-in type object, created on first use.
    ///
    /// Creation recurses through the base chain so `bool` forces `int`
    /// which forces `object`; every type object is created exactly once
    /// per runtime.
    pub fn type_object(&mut self, t: Type) -> RunResult<HeapId> {
        if let Some(&id) = self.builtin_types.get(&t) {
            return Ok(id);
        }
        let bases = match t.builtin_base() {
            Some(base) => {
                let base_id = self.type_object(base)?;
                self.heap.inc_ref(base_id);
                vec![base_id]
            }
            None => Vec::new(),
        };
        let spec = TypeSpec::for_builtin(t);
        let id = class::from_spec(&spec, bases, self)?;
        self.builtin_types.insert(t, id);
        Ok(id)
    }

    /// A built-in type as an owned value.
    pub fn type_value(&mut self, t: Type) -> RunResult<Value> {
        let id = self.type_object(t)?;
        self.heap.inc_ref(id);
        Ok(Value::Ref(id))
    }

    /// `type(x)`: the type of a value, as an owned type value.
    pub fn type_value_of(&mut self, v: &Value) -> RunResult<Value> {
        if let Value::Ref(id) = v {
            if let HeapData::Instance(instance) = self.heap.get(*id) {
                let class_id = instance.class_id();
                self.heap.inc_ref(class_id);
                return Ok(Value::Ref(class_id));
            }
        }
        self.type_value(v.py_type(&self.heap))
    }

    /// Builds an `ArgParser` against this runtime's intern table.
    pub fn arg_parser(&mut self, name: &str, defs: &[crate::argparse::ParamDef]) -> RunResult<crate::argparse::ArgParser> {
        crate::argparse::ArgParser::new(name, defs, &mut self.interns)
    }

    /// Runs one exposure scan over a host-declared method table, returning
    /// named descriptor values ready for [`Runtime::build_class`].
    pub fn expose(&mut self, owner: &str, methods: &[crate::expose::MethodDef]) -> RunResult<Vec<(String, Value)>> {
        let entries = crate::expose::expose_type(owner, methods, &[], &[], self)?;
        Ok(entries
            .into_iter()
            .map(|(name_id, value)| (self.interns.get_str(name_id).to_owned(), value))
            .collect())
    }

    /// Constructs a type from a host-declared [`TypeSpec`] through the
    /// canonical `from_spec` pipeline, based on `object`.
    pub fn register_type(&mut self, spec: &TypeSpec) -> RunResult<Value> {
        let object_id = self.type_object(Type::Object)?;
        self.heap.inc_ref(object_id);
        let id = class::from_spec(spec, vec![object_id], self)?;
        Ok(Value::Ref(id))
    }

    /// Builds a user-defined class from a name, base types and a
    /// namespace. Namespace values are consumed; base values are borrowed.
    pub fn build_class(&mut self, name: &str, bases: &[Value], namespace: Vec<(String, Value)>) -> RunResult<Value> {
        let mut base_ids = Vec::with_capacity(bases.len());
        for base in bases {
            let Some(id) = base.ref_id() else {
                // Release everything taken so far before failing.
                for (_, value) in namespace {
                    value.drop_with_heap(&mut self.heap);
                }
                for taken in base_ids {
                    self.heap.dec_ref(taken);
                }
                return Err(ExcType::type_error("bases must be types"));
            };
            self.heap.inc_ref(id);
            base_ids.push(id);
        }
        let mut interned: Vec<(StringId, Value)> = Vec::with_capacity(namespace.len());
        for (attr_name, value) in namespace {
            let name_id = self.interns.intern(&attr_name);
            interned.push((name_id, value));
        }
        match class::build_class(name, base_ids, interned, self) {
            Ok(id) => Ok(Value::Ref(id)),
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------
    // The builtins module
    // -----------------------------------------------------------------

    /// The `builtins` module, created once per runtime. Returns an owned
    /// reference.
    pub(crate) fn builtins_module(&mut self) -> RunResult<Value> {
        if let Some(module) = &self.builtins_module {
            return Ok(module.clone_with_heap(&self.heap));
        }

        let name_id = self.interns.intern("builtins");
        let dict_id = self.heap.allocate(HeapData::Dict(Dict::new()))?;
        let module = Module::new(name_id, Value::Ref(dict_id));
        let module_value = Value::Ref(self.heap.allocate(HeapData::Module(module))?);

        for function in [
            BuiltinFunctions::Abs,
            BuiltinFunctions::Callable,
            BuiltinFunctions::Exec,
            BuiltinFunctions::Isinstance,
            BuiltinFunctions::Issubclass,
            BuiltinFunctions::Iter,
            BuiltinFunctions::Len,
            BuiltinFunctions::Max,
            BuiltinFunctions::Min,
            BuiltinFunctions::Next,
            BuiltinFunctions::Repr,
        ] {
            let name: &'static str = function.into();
            self.dict_insert_str(dict_id, name, Value::Builtin(Builtins::Function(function)))?;
        }

        for (t, name) in [
            (Type::Type, "type"),
            (Type::Object, "object"),
            (Type::Bool, "bool"),
            (Type::Int, "int"),
            (Type::Float, "float"),
            (Type::Str, "str"),
            (Type::Bytes, "bytes"),
            (Type::List, "list"),
            (Type::Tuple, "tuple"),
            (Type::Dict, "dict"),
            (Type::StaticMethod, "staticmethod"),
            (Type::ClassMethod, "classmethod"),
        ] {
            let type_value = self.type_value(t)?;
            self.dict_insert_str(dict_id, name, type_value)?;
        }

        for exc in [
            ExcType::BaseException,
            ExcType::Exception,
            ExcType::ArithmeticError,
            ExcType::ZeroDivisionError,
            ExcType::OverflowError,
            ExcType::LookupError,
            ExcType::IndexError,
            ExcType::KeyError,
            ExcType::NameError,
            ExcType::UnboundLocalError,
            ExcType::RuntimeError,
            ExcType::NotImplementedError,
            ExcType::RecursionError,
            ExcType::AttributeError,
            ExcType::MemoryError,
            ExcType::StopIteration,
            ExcType::SystemError,
            ExcType::TypeError,
            ExcType::ValueError,
            ExcType::KeyboardInterrupt,
            ExcType::Warning,
            ExcType::DeprecationWarning,
            ExcType::RuntimeWarning,
        ] {
            let name: &'static str = exc.into();
            self.dict_insert_str(dict_id, name, Value::Builtin(Builtins::ExcType(exc)))?;
        }

        self.builtins_module = Some(module_value.clone_with_heap(&self.heap));
        Ok(module_value)
    }

    fn dict_insert_str(&mut self, dict_id: HeapId, name: &str, value: Value) -> RunResult<()> {
        let key = Value::InternString(self.interns.intern(name));
        let mut dict = match self.heap.take(dict_id) {
            HeapData::Dict(dict) => dict,
            _ => unreachable!("builtins dict is a dict"),
        };
        let result = dict.insert(key, value, &mut self.heap, &self.interns);
        self.heap.restore(dict_id, HeapData::Dict(dict));
        if let Some(old) = result? {
            old.drop_with_heap(&mut self.heap);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Value construction and conversion
    // -----------------------------------------------------------------

    /// Allocates a heap string value.
    pub fn str_value(&mut self, text: &str) -> RunResult<Value> {
        Ok(Value::Ref(self.heap.allocate(HeapData::Str(Str::from(text)))?))
    }

    /// Allocates an empty dict value.
    pub fn new_dict(&mut self) -> RunResult<Value> {
        Ok(Value::Ref(self.heap.allocate(HeapData::Dict(Dict::new()))?))
    }

    /// Releases an owned value back to the heap.
    pub fn release(&mut self, value: Value) {
        value.drop_with_heap(&mut self.heap);
    }

    /// Converts a host object into a runtime value.
    pub fn object_to_value(&mut self, obj: Object) -> RunResult<Value> {
        Ok(match obj {
            Object::None => Value::None,
            Object::Ellipsis => Value::Ellipsis,
            Object::NotImplemented => Value::NotImplemented,
            Object::Bool(b) => Value::Bool(b),
            Object::Int(i) => Value::Int(i),
            Object::BigInt(big) => LongInt::new(big).into_value(&mut self.heap)?,
            Object::Float(f) => Value::Float(f),
            Object::String(s) => Value::Ref(self.heap.allocate(HeapData::Str(Str::from(s)))?),
            Object::Bytes(b) => Value::Ref(self.heap.allocate(HeapData::Bytes(Bytes::new(b)))?),
            Object::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.object_to_value(item)?);
                }
                Value::Ref(self.heap.allocate(HeapData::List(List::new(values)))?)
            }
            Object::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.object_to_value(item)?);
                }
                Value::Ref(self.heap.allocate(HeapData::Tuple(Tuple::new(values)))?)
            }
            Object::Dict(pairs) => {
                let dict_id = self.heap.allocate(HeapData::Dict(Dict::new()))?;
                for (key, value) in pairs {
                    let key = self.object_to_value(key)?;
                    let value = self.object_to_value(value)?;
                    let mut dict = match self.heap.take(dict_id) {
                        HeapData::Dict(dict) => dict,
                        _ => unreachable!("allocated as a dict above"),
                    };
                    let result = dict.insert(key, value, &mut self.heap, &self.interns);
                    self.heap.restore(dict_id, HeapData::Dict(dict));
                    if let Some(old) = result? {
                        old.drop_with_heap(&mut self.heap);
                    }
                }
                Value::Ref(dict_id)
            }
            Object::Exception { exc_type, message } => {
                let exc = match message {
                    Some(msg) => SimpleException::new_msg(exc_type, msg),
                    None => SimpleException::new_none(exc_type),
                };
                Value::Ref(self.heap.allocate(HeapData::Exception(exc))?)
            }
            Object::Type(_) | Object::Repr(_) => {
                return Err(ExcType::type_error("output-only object cannot be used as an input"));
            }
        })
    }

    /// Converts a runtime value into a host object without consuming it.
    #[must_use]
    pub fn value_to_object(&self, v: &Value) -> Object {
        value_to_object(v, &self.heap, &self.interns)
    }

    // -----------------------------------------------------------------
    // Dispatch entry points
    // -----------------------------------------------------------------

    /// Dispatches a binary operation over host objects.
    pub fn binary(&mut self, op: BinOp, lhs: Object, rhs: Object) -> RunResult<Object> {
        let lhs = self.object_to_value(lhs)?;
        let rhs = match self.object_to_value(rhs) {
            Ok(value) => value,
            Err(err) => {
                lhs.drop_with_heap(&mut self.heap);
                return Err(err);
            }
        };
        let result = crate::ops::binary_op(op, &lhs, &rhs, self);
        lhs.drop_with_heap(&mut self.heap);
        rhs.drop_with_heap(&mut self.heap);
        let result = result?;
        let out = self.value_to_object(&result);
        result.drop_with_heap(&mut self.heap);
        Ok(out)
    }

    /// Dispatches a rich comparison over host objects.
    pub fn compare(&mut self, op: CmpOp, lhs: Object, rhs: Object) -> RunResult<Object> {
        let lhs = self.object_to_value(lhs)?;
        let rhs = match self.object_to_value(rhs) {
            Ok(value) => value,
            Err(err) => {
                lhs.drop_with_heap(&mut self.heap);
                return Err(err);
            }
        };
        let result = crate::ops::compare_op(op, &lhs, &rhs, self);
        lhs.drop_with_heap(&mut self.heap);
        rhs.drop_with_heap(&mut self.heap);
        let result = result?;
        let out = self.value_to_object(&result);
        result.drop_with_heap(&mut self.heap);
        Ok(out)
    }

    /// Dispatches a unary operation over host objects.
    pub fn unary(&mut self, op: UnOp, operand: Object) -> RunResult<Object> {
        let operand = self.object_to_value(operand)?;
        let result = crate::ops::unary_op(op, &operand, self);
        operand.drop_with_heap(&mut self.heap);
        let result = result?;
        let out = self.value_to_object(&result);
        result.drop_with_heap(&mut self.heap);
        Ok(out)
    }

    /// Calls a callable value through the call protocol.
    pub fn call(&mut self, callee: &Value, args: &[Value], names: &[StringId]) -> RunResult<Value> {
        call_value(callee, args, names, self)
    }

    /// The `repr` of a value.
    pub fn repr(&mut self, v: &Value) -> RunResult<String> {
        crate::ops::repr_value(v, self)
    }

    /// The `repr` of a host object, through the runtime's dispatch.
    pub fn repr_object(&mut self, obj: Object) -> RunResult<String> {
        let value = self.object_to_value(obj)?;
        let result = crate::ops::repr_value(&value, self);
        value.drop_with_heap(&mut self.heap);
        result
    }

    /// Attribute access through the `getattribute` slot, with the generic
    /// type-dict fallback for carriers that do not override it.
    pub fn getattr(&mut self, v: &Value, name: &str) -> RunResult<Value> {
        let name_value = Value::InternString(self.interns.intern(name));
        if let Some(slot) = crate::ops::ops_of(v, self).getattribute {
            return crate::ops::invoke_binary(slot, v, &name_value, self);
        }
        self.generic_getattr(v, &name_value)
    }

    /// Attribute assignment through the `setattr` slot.
    pub fn setattr(&mut self, v: &Value, name: &str, value: &Value) -> RunResult<()> {
        let name_value = Value::InternString(self.interns.intern(name));
        match crate::ops::ops_of(v, self).setattr {
            Some(slot) => {
                let result = crate::ops::invoke_ternary(slot, v, &name_value, value, self)?;
                result.drop_with_heap(&mut self.heap);
                Ok(())
            }
            None => {
                let type_name = v.type_name(&self.heap, &self.interns).into_owned();
                Err(ExcType::attribute_error(type_name, name))
            }
        }
    }

    /// Attribute deletion through the `delattr` slot.
    pub fn delattr(&mut self, v: &Value, name: &str) -> RunResult<()> {
        let name_value = Value::InternString(self.interns.intern(name));
        match crate::ops::ops_of(v, self).delattr {
            Some(slot) => {
                let result = crate::ops::invoke_binary(slot, v, &name_value, self)?;
                result.drop_with_heap(&mut self.heap);
                Ok(())
            }
            None => {
                let type_name = v.type_name(&self.heap, &self.interns).into_owned();
                Err(ExcType::attribute_error(type_name, name))
            }
        }
    }

    /// The type-dict attribute path for built-in carriers: walk the MRO of
    /// the value's type object and apply descriptor retrieval.
    fn generic_getattr(&mut self, v: &Value, name_value: &Value) -> RunResult<Value> {
        let name = name_value
            .as_either_str(&self.heap, &self.interns)
            .expect("interned name")
            .to_owned();
        let name_id = self.interns.intern(&name);
        let type_id = match v {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Instance(instance) => instance.class_id(),
                _ => self.type_object(v.py_type(&self.heap))?,
            },
            _ => self.type_object(v.py_type(&self.heap))?,
        };
        let Some(attr) = class::mro_lookup(type_id, name_id, &self.heap) else {
            let type_name = v.type_name(&self.heap, &self.interns).into_owned();
            return Err(ExcType::attribute_error(type_name, &name));
        };
        let owner = Value::Ref(type_id);
        if let Some(slot) = crate::ops::ops_of(&attr, self).get {
            let result = crate::ops::invoke_ternary(slot, &attr, v, &owner, self);
            attr.drop_with_heap(&mut self.heap);
            return result;
        }
        Ok(attr)
    }

    /// Runs `exec` with explicit parts; the Language-visible builtin wraps
    /// this same path.
    pub fn exec(
        &mut self,
        source: ExecSource,
        globals: Option<&Value>,
        locals: Option<&Value>,
        closure: Option<&Value>,
    ) -> RunResult<()> {
        let result = crate::builtins::exec_impl(source, globals, locals, closure, self)?;
        result.drop_with_heap(&mut self.heap);
        Ok(())
    }

    /// Injects `__builtins__` into a globals dict if absent.
    pub fn ensure_builtins_in(&mut self, globals: &Value) -> RunResult<()> {
        ensure_builtins(globals, self)
    }

    /// Creates an empty module value with a fresh globals dict.
    pub fn new_module(&mut self, name: &str) -> RunResult<Value> {
        crate::types::module::new_module(name, self)
    }

    /// Creates and populates a native-defined module from its definition.
    pub fn init_module(&mut self, def: &dyn crate::types::ModuleDef) -> RunResult<Value> {
        let module = crate::types::module::new_module(def.name(), self)?;
        def.add_members(&module, self)?;
        Ok(module)
    }
}

/// Converts a runtime value into a host object. Containers convert
/// recursively; values with no direct mapping become `Object::Repr`.
#[must_use]
pub fn value_to_object(v: &Value, heap: &Heap, interns: &Interns) -> Object {
    match v {
        Value::Undefined => Object::Repr("<undefined>".to_owned()),
        Value::None => Object::None,
        Value::Ellipsis => Object::Ellipsis,
        Value::NotImplemented => Object::NotImplemented,
        Value::Bool(b) => Object::Bool(*b),
        Value::Int(i) => Object::Int(*i),
        Value::Float(f) => Object::Float(*f),
        Value::InternString(id) => Object::String(interns.get_str(*id).to_owned()),
        Value::Builtin(Builtins::Function(f)) => Object::Repr(format!("<built-in function {f}>")),
        Value::Builtin(Builtins::ExcType(exc)) => Object::Type(exc.to_string()),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Str(s) => Object::String(s.as_str().to_owned()),
            HeapData::Bytes(b) => Object::Bytes(b.as_slice().to_vec()),
            HeapData::LongInt(li) => Object::BigInt(li.inner().clone()),
            HeapData::List(list) => Object::List(
                list.as_slice()
                    .iter()
                    .map(|item| value_to_object(item, heap, interns))
                    .collect(),
            ),
            HeapData::Tuple(tuple) => Object::Tuple(
                tuple
                    .as_slice()
                    .iter()
                    .map(|item| value_to_object(item, heap, interns))
                    .collect(),
            ),
            HeapData::Dict(dict) => Object::Dict(
                dict.iter()
                    .map(|(key, value)| {
                        (
                            value_to_object(key, heap, interns),
                            value_to_object(value, heap, interns),
                        )
                    })
                    .collect(),
            ),
            HeapData::Exception(exc) => Object::Exception {
                exc_type: exc.exc_type(),
                message: {
                    let msg = exc.message();
                    if msg.is_empty() { None } else { Some(msg.into_owned()) }
                },
            },
            HeapData::Type(type_obj) => Object::Type(interns.get_str(type_obj.name()).to_owned()),
            HeapData::Instance(instance) => {
                let class_name = match heap.get(instance.class_id()) {
                    HeapData::Type(type_obj) => interns.get_str(type_obj.name()).to_owned(),
                    _ => "object".to_owned(),
                };
                Object::Repr(format!("<{class_name} object>"))
            }
            data => Object::Repr(format!("<{} object>", data.py_type())),
        },
    }
}
