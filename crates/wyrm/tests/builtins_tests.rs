//! Builtin functions through the call protocol: min/max with `key=` and
//! `default=`, repr, len, iter/next, isinstance.

use pretty_assertions::assert_eq;
use wyrm::{
    BuiltinFunctions, Builtins, ExcType, FastCall, Object, Runtime, Type, Value,
};

fn builtin(f: BuiltinFunctions) -> Value {
    Value::Builtin(Builtins::Function(f))
}

#[test]
fn max_over_an_iterable() {
    let mut rt = Runtime::new();
    let list = rt
        .object_to_value(Object::List(
            [3, 1, 4, 1, 5, 9, 2, 6].into_iter().map(Object::Int).collect(),
        ))
        .unwrap();
    let result = builtin(BuiltinFunctions::Max).call1(&list, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::Int(9));
    rt.release(result);
    rt.release(list);
}

#[test]
fn min_of_an_empty_iterator_uses_the_default() {
    let mut rt = Runtime::new();
    let empty = rt.object_to_value(Object::List(vec![])).unwrap();
    let iterator = builtin(BuiltinFunctions::Iter).call1(&empty, &mut rt).unwrap();

    let default_name = rt.intern("default");
    let payload = [rt.clone_value(&iterator), Value::Int(-1)];
    let result = rt
        .call(&builtin(BuiltinFunctions::Min), &payload, &[default_name])
        .unwrap();
    assert_eq!(rt.value_to_object(&result), Object::Int(-1));

    rt.release(result);
    let [first, second] = payload;
    rt.release(first);
    rt.release(second);
    rt.release(iterator);
    rt.release(empty);
}

#[test]
fn min_of_an_empty_iterable_without_default_raises() {
    let mut rt = Runtime::new();
    let empty = rt.object_to_value(Object::List(vec![])).unwrap();
    let err = builtin(BuiltinFunctions::Min).call1(&empty, &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ValueError));
    rt.release(empty);
}

#[test]
fn max_over_positional_arguments() {
    let mut rt = Runtime::new();
    let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
    let result = rt.call(&builtin(BuiltinFunctions::Max), &args, &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::Int(3));
    rt.release(result);
}

#[test]
fn max_with_default_and_multiple_positionals_is_rejected() {
    let mut rt = Runtime::new();
    let default_name = rt.intern("default");
    let args = [Value::Int(1), Value::Int(2), Value::Int(0)];
    let err = rt
        .call(&builtin(BuiltinFunctions::Max), &args, &[default_name])
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("default"), "{message}");
}

#[test]
fn min_with_a_key_function() {
    let mut rt = Runtime::new();
    // key=abs over [-9, 2, -1] picks -1.
    let list = rt
        .object_to_value(Object::List(vec![Object::Int(-9), Object::Int(2), Object::Int(-1)]))
        .unwrap();
    let key_name = rt.intern("key");
    let payload = [rt.clone_value(&list), builtin(BuiltinFunctions::Abs)];
    let result = rt
        .call(&builtin(BuiltinFunctions::Min), &payload, &[key_name])
        .unwrap();
    assert_eq!(rt.value_to_object(&result), Object::Int(-1));

    rt.release(result);
    let [first, _] = payload;
    rt.release(first);
    rt.release(list);
}

#[test]
fn repr_of_the_singletons() {
    let mut rt = Runtime::new();
    assert_eq!(rt.repr_object(Object::Bool(true)).unwrap(), "True");
    assert_eq!(rt.repr_object(Object::Ellipsis).unwrap(), "Ellipsis");
    assert_eq!(rt.repr_object(Object::None).unwrap(), "None");
    assert_eq!(rt.repr_object(Object::NotImplemented).unwrap(), "NotImplemented");
}

#[test]
fn repr_of_strings_quotes_like_the_language() {
    let mut rt = Runtime::new();
    assert_eq!(rt.repr_object(Object::from("spam")).unwrap(), "'spam'");
    assert_eq!(rt.repr_object(Object::from("it's")).unwrap(), "\"it's\"");
    assert_eq!(rt.repr_object(Object::from("a\nb")).unwrap(), "'a\\nb'");
}

#[test]
fn isinstance_over_the_numeric_tower() {
    let mut rt = Runtime::new();
    let int_type = rt.type_value(Type::Int).unwrap();
    let bool_type = rt.type_value(Type::Bool).unwrap();
    let object_type = rt.type_value(Type::Object).unwrap();

    let check = |rt: &mut Runtime, obj: Value, cls: &Value| -> bool {
        let payload = [obj, rt.clone_value(cls)];
        let result = rt.call(&builtin(BuiltinFunctions::Isinstance), &payload, &[]).unwrap();
        let out = matches!(rt.value_to_object(&result), Object::Bool(true));
        rt.release(result);
        let [a, b] = payload;
        rt.release(a);
        rt.release(b);
        out
    };

    // bool is a subtype of int.
    assert!(check(&mut rt, Value::Bool(true), &int_type));
    assert!(check(&mut rt, Value::Int(1), &int_type));
    assert!(!check(&mut rt, Value::Int(1), &bool_type));
    assert!(check(&mut rt, Value::Int(1), &object_type));
    assert!(check(&mut rt, Value::None, &object_type));

    for value in [int_type, bool_type, object_type] {
        rt.release(value);
    }
}

#[test]
fn isinstance_with_exception_values() {
    let mut rt = Runtime::new();
    let key_error_type = Value::Builtin(Builtins::ExcType(ExcType::KeyError));
    let lookup_type = Value::Builtin(Builtins::ExcType(ExcType::LookupError));
    let value_error_type = Value::Builtin(Builtins::ExcType(ExcType::ValueError));

    // Construct KeyError("k") by calling the exception type.
    let message = rt.str_value("k").unwrap();
    let exc = rt.call(&key_error_type, std::slice::from_ref(&message), &[]).unwrap();

    let isinstance = builtin(BuiltinFunctions::Isinstance);
    for (cls, expected) in [(&key_error_type, true), (&lookup_type, true), (&value_error_type, false)] {
        let payload = [rt.clone_value(&exc), rt.clone_value(cls)];
        let result = rt.call(&isinstance, &payload, &[]).unwrap();
        assert_eq!(rt.value_to_object(&result), Object::Bool(expected));
        rt.release(result);
        let [a, b] = payload;
        rt.release(a);
        rt.release(b);
    }

    rt.release(exc);
    rt.release(message);
}

#[test]
fn len_and_callable() {
    let mut rt = Runtime::new();
    let text = rt.str_value("spam").unwrap();
    let length = builtin(BuiltinFunctions::Len).call1(&text, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&length), Object::Int(4));
    rt.release(length);

    let yes = builtin(BuiltinFunctions::Callable)
        .call1(&builtin(BuiltinFunctions::Len), &mut rt)
        .unwrap();
    assert_eq!(rt.value_to_object(&yes), Object::Bool(true));
    rt.release(yes);

    let no = builtin(BuiltinFunctions::Callable).call1(&text, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&no), Object::Bool(false));
    rt.release(no);
    rt.release(text);
}

#[test]
fn str_methods_reach_through_both_carriers() {
    let mut rt = Runtime::new();
    let heap_str = rt.str_value("Spam").unwrap();
    let upper = rt.getattr(&heap_str, "upper").unwrap();
    let result = rt.call(&upper, &[], &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::from("SPAM"));
    for value in [result, upper, heap_str] {
        rt.release(value);
    }
}
