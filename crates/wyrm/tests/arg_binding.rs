//! The argument binding engine: the positional/keyword/defaults/collector
//! matrix of the parser, and the error message family.

use pretty_assertions::assert_eq;
use wyrm::{BindTag, DefaultArg, ExcType, HeapData, Object, ParamDef, Runtime, Value};

fn bound_objects(rt: &Runtime, slots: &[Value]) -> Vec<Object> {
    slots.iter().map(|slot| rt.value_to_object(slot)).collect()
}

fn release_all(rt: &mut Runtime, slots: wyrm::BoundArgs) {
    for slot in slots {
        rt.release(slot);
    }
}

#[test]
fn positional_binding_fills_slots_in_order() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser(
            "f",
            &[ParamDef::positional_only("a"), ParamDef::pos_or_kw("b")],
        )
        .unwrap();
    assert_eq!(parser.tag(), BindTag::Two);

    let args = [Value::Int(1), Value::Int(2)];
    let slots = parser.bind(&args, &[], &mut rt).unwrap();
    assert_eq!(bound_objects(&rt, &slots), vec![Object::Int(1), Object::Int(2)]);
    release_all(&mut rt, slots);
}

#[test]
fn keyword_binding_targets_regular_parameters() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser("f", &[ParamDef::pos_or_kw("a"), ParamDef::pos_or_kw("b")])
        .unwrap();

    let b_name = rt.intern("b");
    let args = [Value::Int(1), Value::Int(2)];
    let slots = parser.bind(&args, &[b_name], &mut rt).unwrap();
    assert_eq!(bound_objects(&rt, &slots), vec![Object::Int(1), Object::Int(2)]);
    release_all(&mut rt, slots);
}

#[test]
fn positional_only_by_keyword_is_rejected() {
    let mut rt = Runtime::new();
    let parser = rt.arg_parser("f", &[ParamDef::positional_only("a")]).unwrap();

    let a_name = rt.intern("a");
    let args = [Value::Int(1)];
    let err = parser.bind(&args, &[a_name], &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("positional-only"), "{message}");
}

#[test]
fn duplicate_binding_is_rejected() {
    let mut rt = Runtime::new();
    let parser = rt.arg_parser("f", &[ParamDef::pos_or_kw("a")]).unwrap();

    let a_name = rt.intern("a");
    let args = [Value::Int(1), Value::Int(2)];
    let err = parser.bind(&args, &[a_name], &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("multiple values for argument 'a'"), "{message}");
}

#[test]
fn unexpected_keyword_is_rejected_without_a_collector() {
    let mut rt = Runtime::new();
    let parser = rt.arg_parser("f", &[ParamDef::pos_or_kw("a")]).unwrap();

    let stray = rt.intern("stray");
    let args = [Value::Int(1), Value::Int(2)];
    let err = parser.bind(&args, &[stray], &mut rt).unwrap_err();
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("unexpected keyword argument 'stray'"), "{message}");
}

#[test]
fn missing_required_arguments_are_listed() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser("f", &[ParamDef::pos_or_kw("a"), ParamDef::pos_or_kw("b")])
        .unwrap();

    let err = parser.bind(&[], &[], &mut rt).unwrap_err();
    let message = err.exception().unwrap().message().into_owned();
    assert!(
        message.contains("missing 2 required positional arguments: 'a', and 'b'"),
        "{message}"
    );
}

#[test]
fn defaults_are_right_aligned_over_regulars() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser(
            "f",
            &[
                ParamDef::pos_or_kw("a"),
                ParamDef::pos_or_kw_defaulted("b", DefaultArg::Int(10)),
                ParamDef::pos_or_kw_defaulted("c", DefaultArg::Str("x")),
            ],
        )
        .unwrap();
    assert_eq!(parser.tag(), BindTag::General);

    let args = [Value::Int(1)];
    let slots = parser.bind(&args, &[], &mut rt).unwrap();
    assert_eq!(
        bound_objects(&rt, &slots),
        vec![Object::Int(1), Object::Int(10), Object::from("x")]
    );
    release_all(&mut rt, slots);

    // An explicit value overrides its default but leaves the rest.
    let args = [Value::Int(1), Value::Int(2)];
    let slots = parser.bind(&args, &[], &mut rt).unwrap();
    assert_eq!(
        bound_objects(&rt, &slots),
        vec![Object::Int(1), Object::Int(2), Object::from("x")]
    );
    release_all(&mut rt, slots);
}

#[test]
fn excess_positionals_collect_into_varargs() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser("f", &[ParamDef::pos_or_kw("a"), ParamDef::var_args("rest")])
        .unwrap();

    let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
    let slots = parser.bind(&args, &[], &mut rt).unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(rt.value_to_object(&slots[0]), Object::Int(1));
    assert_eq!(
        rt.value_to_object(&slots[1]),
        Object::Tuple(vec![Object::Int(2), Object::Int(3)])
    );
    release_all(&mut rt, slots);

    // Without a collector the same payload is an arity error.
    let strict = rt.arg_parser("f", &[ParamDef::pos_or_kw("a")]).unwrap();
    let err = strict.bind(&args, &[], &mut rt).unwrap_err();
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("takes 1 positional argument but 3 were given"), "{message}");
}

#[test]
fn stray_keywords_collect_into_varkwargs() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser("f", &[ParamDef::pos_or_kw("a"), ParamDef::var_kwargs("extra")])
        .unwrap();

    let color = rt.intern("color");
    let args = [Value::Int(1), Value::Int(7)];
    let slots = parser.bind(&args, &[color], &mut rt).unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(rt.value_to_object(&slots[0]), Object::Int(1));
    match &slots[1] {
        Value::Ref(id) => match rt.heap().get(*id) {
            HeapData::Dict(dict) => {
                assert_eq!(dict.len(), 1);
                let (key, value) = dict.get_entry(0).unwrap();
                assert_eq!(rt.value_to_object(key), Object::from("color"));
                assert_eq!(rt.value_to_object(value), Object::Int(7));
            }
            _ => panic!("expected the **kwargs dict"),
        },
        _ => panic!("expected a heap value"),
    }
    release_all(&mut rt, slots);
}

#[test]
fn keyword_only_parameters_require_keywords() {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser(
            "f",
            &[
                ParamDef::pos_or_kw("a"),
                ParamDef::kw_only("flag"),
                ParamDef::kw_only_defaulted("level", DefaultArg::Int(0)),
            ],
        )
        .unwrap();

    // Passing the keyword-only parameter positionally is an arity error.
    let args = [Value::Int(1), Value::Bool(true)];
    let err = parser.bind(&args, &[], &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));

    // By keyword it binds, and the defaulted one fills in.
    let flag = rt.intern("flag");
    let slots = parser.bind(&args, &[flag], &mut rt).unwrap();
    assert_eq!(
        bound_objects(&rt, &slots),
        vec![Object::Int(1), Object::Bool(true), Object::Int(0)]
    );
    release_all(&mut rt, slots);

    // Missing required keyword-only argument.
    let args = [Value::Int(1)];
    let err = parser.bind(&args, &[], &mut rt).unwrap_err();
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("keyword-only argument: 'flag'"), "{message}");
}

/// Re-binding an already-bound payload yields the identical slot vector.
#[test]
fn rebinding_is_idempotent()  {
    let mut rt = Runtime::new();
    let parser = rt
        .arg_parser(
            "f",
            &[
                ParamDef::pos_or_kw("a"),
                ParamDef::pos_or_kw_defaulted("b", DefaultArg::Int(5)),
            ],
        )
        .unwrap();

    let b_name = rt.intern("b");
    let args = [Value::Int(1), Value::Int(2)];

    let first = parser.bind(&args, &[b_name], &mut rt).unwrap();
    let second = parser.bind(&args, &[b_name], &mut rt).unwrap();
    assert_eq!(bound_objects(&rt, &first), bound_objects(&rt, &second));

    release_all(&mut rt, first);
    release_all(&mut rt, second);
}
