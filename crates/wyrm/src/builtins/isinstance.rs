//! Implementation of the isinstance() and issubclass() builtin functions.

use crate::{
    builtins::Builtins,
    exceptions::{ExcType, RunResult},
    heap::HeapData,
    runtime::Runtime,
    types::Type,
    value::Value,
};

/// `isinstance(obj, classinfo)`: classinfo is a type, an exception type,
/// or a tuple of either.
pub fn builtin_isinstance(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [obj, classinfo] => Ok(Value::Bool(matches_classinfo(obj, classinfo, rt, value_isinstance)?)),
        _ => Err(ExcType::type_error_arg_count("isinstance", 2, values.len())),
    }
}

/// `issubclass(cls, classinfo)`.
pub fn builtin_issubclass(values: &[Value], rt: &mut Runtime) -> RunResult<Value> {
    match values {
        [cls, classinfo] => Ok(Value::Bool(matches_classinfo(cls, classinfo, rt, value_issubclass)?)),
        _ => Err(ExcType::type_error_arg_count("issubclass", 2, values.len())),
    }
}

fn matches_classinfo(
    subject: &Value,
    classinfo: &Value,
    rt: &mut Runtime,
    check: fn(&Value, &Value, &mut Runtime) -> RunResult<bool>,
) -> RunResult<bool> {
    if let Value::Ref(id) = classinfo {
        if let HeapData::Tuple(tuple) = rt.heap.get(*id) {
            let entries: Vec<Value> = tuple.as_slice().iter().map(|v| v.clone_with_heap(&rt.heap)).collect();
            let mut found = false;
            let mut failure = None;
            for entry in &entries {
                match check(subject, entry, rt) {
                    Ok(true) => {
                        found = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            for entry in entries {
                entry.drop_with_heap(&mut rt.heap);
            }
            return match failure {
                Some(err) => Err(err),
                None => Ok(found),
            };
        }
    }
    check(subject, classinfo, rt)
}

/// Whether `obj` is an instance of the type value `cls`.
pub(crate) fn value_isinstance(obj: &Value, cls: &Value, rt: &mut Runtime) -> RunResult<bool> {
    match cls {
        Value::Builtin(Builtins::ExcType(handler)) => Ok(match obj {
            Value::Ref(id) => match rt.heap.get(*id) {
                HeapData::Exception(exc) => exc.exc_type().is_subclass_of(*handler),
                _ => false,
            },
            _ => false,
        }),
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::Type(type_obj) => {
                // Built-in targets use the token chain; user-defined types
                // walk the instance's MRO.
                if let Some(builtin) = type_obj.builtin() {
                    if builtin == Type::Object {
                        return Ok(true);
                    }
                    if let Value::Ref(obj_id) = obj {
                        match rt.heap.get(*obj_id) {
                            HeapData::Exception(exc) => {
                                if let Type::Exception(handler) = builtin {
                                    return Ok(exc.exc_type().is_subclass_of(handler));
                                }
                            }
                            // A user class may inherit from a built-in type;
                            // its MRO then contains the built-in TypeObject.
                            HeapData::Instance(instance) => {
                                let class_id = instance.class_id();
                                if let HeapData::Type(obj_type) = rt.heap.get(class_id) {
                                    let inherits = obj_type.mro().iter().any(|&entry| match rt.heap.get(entry) {
                                        HeapData::Type(base) => base.builtin() == Some(builtin),
                                        _ => false,
                                    });
                                    return Ok(inherits);
                                }
                            }
                            _ => {}
                        }
                    }
                    return Ok(obj.py_type(&rt.heap).is_instance_of(builtin));
                }
                let cls_id = *id;
                match obj {
                    Value::Ref(obj_id) => match rt.heap.get(*obj_id) {
                        HeapData::Instance(instance) => {
                            let class_id = instance.class_id();
                            match rt.heap.get(class_id) {
                                HeapData::Type(obj_type) => Ok(obj_type.is_subtype_of(class_id, cls_id)),
                                _ => Ok(false),
                            }
                        }
                        _ => Ok(false),
                    },
                    _ => Ok(false),
                }
            }
            _ => Err(ExcType::type_error(
                "isinstance() arg 2 must be a type or tuple of types",
            )),
        },
        _ => Err(ExcType::type_error(
            "isinstance() arg 2 must be a type or tuple of types",
        )),
    }
}

/// Whether the type value `sub` is a subtype of the type value `sup`.
pub(crate) fn value_issubclass(sub: &Value, sup: &Value, rt: &mut Runtime) -> RunResult<bool> {
    // Exception-type immediates compare through the exception hierarchy.
    if let (Value::Builtin(Builtins::ExcType(a)), Value::Builtin(Builtins::ExcType(b))) = (sub, sup) {
        return Ok(a.is_subclass_of(*b));
    }
    let (Value::Ref(sub_id), Value::Ref(sup_id)) = (sub, sup) else {
        return Err(ExcType::type_error("issubclass() arguments must be types"));
    };
    let (HeapData::Type(sub_type), HeapData::Type(_)) = (rt.heap.get(*sub_id), rt.heap.get(*sup_id)) else {
        return Err(ExcType::type_error("issubclass() arguments must be types"));
    };
    Ok(sub_type.is_subtype_of(*sub_id, *sup_id))
}
