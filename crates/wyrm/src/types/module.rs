//! The module type: a name plus a globals dict.
//!
//! A module's dict is a real Language dict, shared by reference with the
//! frames executing in the module, so assignments through either side are
//! visible to both. Native-defined modules describe their members through
//! [`ModuleDef`]; `__builtins__` is injected into the globals before first
//! execution.

use crate::{
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    heap::{Heap, HeapData, HeapId},
    intern::{StaticStrings, StringId},
    ops::{Operations, bin, tern, un},
    runtime::Runtime,
    types::{dict::Dict, str::Str},
    value::Value,
};

/// A Language module.
#[derive(Debug)]
pub struct Module {
    name: StringId,
    /// Owned reference to the module's globals dict.
    dict: Value,
}

impl Module {
    /// Creates a module fronting an existing globals dict (owned ref).
    #[must_use]
    pub fn new(name: StringId, dict: Value) -> Self {
        Self { name, dict }
    }

    #[must_use]
    pub fn name(&self) -> StringId {
        self.name
    }

    /// The module's globals dict value.
    #[must_use]
    pub fn dict(&self) -> &Value {
        &self.dict
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        self.dict.collect_refs(stack);
    }
}

/// Describes the members a native-defined module publishes.
///
/// `add_members` runs once, before the module's first use; it writes
/// directly into the module's globals dict.
pub trait ModuleDef: std::fmt::Debug {
    /// The module's canonical name.
    fn name(&self) -> &str;

    /// Populates the module instance's dict.
    fn add_members(&self, module: &Value, rt: &mut Runtime) -> RunResult<()>;
}

fn expect_module_dict(v: &Value, heap: &Heap) -> RunResult<Value> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Module(module) => Ok(module.dict.clone_with_heap(heap)),
            _ => Err(RunError::internal("module slot on non-module carrier")),
        },
        _ => Err(RunError::internal("module slot on non-module carrier")),
    }
}

fn module_name(v: &Value, rt: &Runtime) -> RunResult<String> {
    match v {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::Module(module) => Ok(rt.interns.get_str(module.name).to_owned()),
            _ => Err(RunError::internal("module slot on non-module carrier")),
        },
        _ => Err(RunError::internal("module slot on non-module carrier")),
    }
}

fn module_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let text = format!("<module '{}'>", module_name(v, rt)?);
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

fn module_getattribute(v: &Value, name_value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let dict_value = expect_module_dict(v, &rt.heap)?;
    let result = crate::ops::getitem(&dict_value, name_value, rt);
    dict_value.drop_with_heap(&mut rt.heap);
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.exc_type() == Some(ExcType::KeyError) => {
            let module = module_name(v, rt)?;
            let attr = name_value
                .as_either_str(&rt.heap, &rt.interns)
                .unwrap_or_default()
                .to_owned();
            Err(SimpleException::new_msg(
                ExcType::AttributeError,
                format!("module '{module}' has no attribute '{attr}'"),
            )
            .into())
        }
        Err(err) => Err(err),
    }
}

fn module_setattr(v: &Value, name_value: &Value, value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let dict_value = expect_module_dict(v, &rt.heap)?;
    let result = crate::ops::setitem(&dict_value, name_value, value, rt);
    dict_value.drop_with_heap(&mut rt.heap);
    result?;
    Ok(Value::None)
}

pub(crate) const OPS: Operations = Operations {
    repr: un(module_repr),
    getattribute: bin(module_getattribute),
    setattr: tern(module_setattr),
    ..Operations::EMPTY
};

/// Ensures `__builtins__` is present in a globals dict, injecting the
/// runtime's builtins module when absent.
pub(crate) fn ensure_builtins(globals: &Value, rt: &mut Runtime) -> RunResult<()> {
    let Value::Ref(dict_id) = globals else {
        return Err(ExcType::type_error("globals must be a dict"));
    };
    let dict_id = *dict_id;
    if !matches!(rt.heap.get(dict_id), HeapData::Dict(_)) {
        return Err(ExcType::type_error("globals must be a dict"));
    }

    let key = Value::InternString(StaticStrings::DunderBuiltins.into());
    let present = match rt.heap.get(dict_id) {
        HeapData::Dict(dict) => dict.get(&key, &rt.heap, &rt.interns)?.is_some(),
        _ => unreachable!("checked dict carrier above"),
    };
    if present {
        return Ok(());
    }

    let builtins = rt.builtins_module()?;
    let mut dict = match rt.heap.take(dict_id) {
        HeapData::Dict(dict) => dict,
        _ => unreachable!("checked dict carrier above"),
    };
    let result = dict.insert(key, builtins, &mut rt.heap, &rt.interns);
    rt.heap.restore(dict_id, HeapData::Dict(dict));
    if let Some(old) = result? {
        old.drop_with_heap(&mut rt.heap);
    }
    Ok(())
}

/// Creates a module value over a fresh dict, registering nothing.
pub(crate) fn new_module(name: &str, rt: &mut Runtime) -> RunResult<Value> {
    let name_id = rt.interns.intern(name);
    let dict_id = rt.heap.allocate(HeapData::Dict(Dict::new()))?;
    let module = Module::new(name_id, Value::Ref(dict_id));
    Ok(Value::Ref(rt.heap.allocate(HeapData::Module(module))?))
}
