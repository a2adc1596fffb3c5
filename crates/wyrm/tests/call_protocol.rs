//! The call protocol: canonical call, arity-specialised entries,
//! vectorcall equivalence, bound methods, and the recursion guard.

use pretty_assertions::assert_eq;
use wyrm::{
    BuiltinFunctions, Builtins, ExcType, FastCall, Object, ResourceLimits, Runtime, Value,
};

fn len_builtin() -> Value {
    Value::Builtin(Builtins::Function(BuiltinFunctions::Len))
}

#[test]
fn call_and_vectorcall_agree_for_every_shape() {
    let mut rt = Runtime::new();
    let list = rt
        .object_to_value(Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)]))
        .unwrap();
    let callee = len_builtin();

    // Canonical entry.
    let via_call = callee.call(std::slice::from_ref(&list), &[], &mut rt).unwrap();
    // Arity-specialised entry.
    let via_call1 = callee.call1(&list, &mut rt).unwrap();
    // Vectorcall entry over a stack slice with a leading non-argument.
    let stack = [Value::None, rt.clone_value(&list)];
    let via_vectorcall = callee.vectorcall(&stack, 1, 1, &[], &mut rt).unwrap();

    assert_eq!(rt.value_to_object(&via_call), Object::Int(3));
    assert_eq!(rt.value_to_object(&via_call1), Object::Int(3));
    assert_eq!(rt.value_to_object(&via_vectorcall), Object::Int(3));

    for value in [via_call, via_call1, via_vectorcall, list] {
        rt.release(value);
    }
    let [keep, stack_list] = stack;
    rt.release(keep);
    rt.release(stack_list);
}

#[test]
fn calling_a_non_callable_raises_type_error() {
    let mut rt = Runtime::new();
    let one = Value::Int(1);
    let err = rt.call(&one, &[], &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert_eq!(message, "'int' object is not callable");
}

#[test]
fn bound_method_prepends_the_receiver() {
    let mut rt = Runtime::new();
    let list = rt.object_to_value(Object::List(vec![Object::Int(1)])).unwrap();

    // `list.append` retrieval binds the descriptor to the receiver.
    let append = rt.getattr(&list, "append").unwrap();
    let result = rt.call(&append, &[Value::Int(2)], &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::None);
    assert_eq!(
        rt.value_to_object(&list),
        Object::List(vec![Object::Int(1), Object::Int(2)])
    );

    rt.release(result);
    rt.release(append);
    rt.release(list);
}

#[test]
fn unbound_descriptor_call_takes_the_receiver_first() {
    let mut rt = Runtime::new();
    let list = rt.object_to_value(Object::List(vec![])).unwrap();

    // `list.append` on the type is the descriptor itself (unbound).
    let list_type = rt.type_value(wyrm::Type::List).unwrap();
    let descriptor = rt.getattr(&list_type, "append").unwrap();
    let result = rt
        .call(&descriptor, &[rt.clone_value(&list), Value::Int(9)], &[])
        .unwrap();
    assert_eq!(rt.value_to_object(&list), Object::List(vec![Object::Int(9)]));

    // Calling the descriptor with no receiver at all is an error.
    let err = rt.call(&descriptor, &[], &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));

    rt.release(result);
    rt.release(descriptor);
    rt.release(list_type);
    rt.release(list);
}

#[test]
fn method_binding_errors_use_the_qualified_name() {
    let mut rt = Runtime::new();
    let list = rt.object_to_value(Object::List(vec![])).unwrap();
    let append = rt.getattr(&list, "append").unwrap();

    let err = rt.call(&append, &[], &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("list.append"), "{message}");

    rt.release(append);
    rt.release(list);
}

#[test]
fn recursion_guard_raises_before_the_host_stack_overflows() {
    let limits = ResourceLimits {
        max_recursion_depth: 16,
        ..ResourceLimits::default()
    };
    let mut rt = Runtime::with_limits(limits);

    // A self-calling user class: `C()()` calls `__call__`, which calls
    // itself again through the descriptor, forever.
    let namespace = rt.expose("C", CALL_METHODS).unwrap();
    let class = rt.build_class("C", &[], namespace).unwrap();
    let instance = rt.call(&class, &[], &[]).unwrap();

    let err = rt.call(&instance, &[], &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RecursionError));

    rt.release(instance);
    rt.release(class);
}

fn c_call(receiver: &Value, _args: &[Value], rt: &mut Runtime) -> wyrm::RunResult<Value> {
    // Call self again; the recursion guard must stop this.
    rt.call(receiver, &[], &[])
}

static CALL_METHODS: &[wyrm::MethodDef] = &[wyrm::MethodDef {
    name: "__call__",
    kind: wyrm::MethodKind::Instance,
    doc: None,
    params: &[wyrm::ParamDef::var_args("args")],
    handle: wyrm::MethodHandle::General(c_call),
    carrier: None,
    primary: true,
}];

#[test]
fn the_tracer_observes_calls_and_raises() {
    use wyrm::{RecordingTracer, TraceEvent};

    let mut rt = Runtime::new();
    let tracer = RecordingTracer::new();
    rt.set_tracer(Box::new(tracer.clone()));

    let list = rt.object_to_value(Object::List(vec![])).unwrap();
    let length = rt.call(&len_builtin(), std::slice::from_ref(&list), &[]).unwrap();
    rt.release(length);

    let one = Value::Int(1);
    let _ = rt.call(&one, &[], &[]);

    let events = tracer.events();
    assert!(
        events.iter().any(|e| matches!(e, TraceEvent::Call { nargs: 1, .. })),
        "{events:?}"
    );

    rt.release(list);
}

#[test]
fn singletons_survive_every_call_path() {
    let mut rt = Runtime::new();
    let repr = Value::Builtin(Builtins::Function(BuiltinFunctions::Repr));

    for (value, expected) in [
        (Value::None, "None"),
        (Value::Ellipsis, "Ellipsis"),
        (Value::NotImplemented, "NotImplemented"),
        (Value::Bool(true), "True"),
        (Value::Bool(false), "False"),
    ] {
        let out = repr.call1(&value, &mut rt).unwrap();
        assert_eq!(rt.value_to_object(&out), Object::String(expected.to_owned()));
        rt.release(out);
        // Identity: the same singleton from any construction path.
        let round_tripped = rt.value_to_object(&value);
        let again = rt.object_to_value(round_tripped).unwrap();
        assert!(value.is_(&again));
        rt.release(again);
    }
}
