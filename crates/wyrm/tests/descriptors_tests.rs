//! Descriptors: member descriptors (read-only and optional semantics),
//! getset descriptors, staticmethod and classmethod wrappers, and the
//! exposure validation rules behind them.

use pretty_assertions::assert_eq;
use wyrm::{
    BuiltinFunctions, Builtins, ExcType, GetSetDef, MemberDef, MethodDef, MethodHandle, MethodKind, Object, ParamDef,
    RunResult, Runtime, Type, TypeFlags, TypeSpec, Value,
};

fn point_answer(_receiver: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    Ok(Value::Int(42))
}

fn point_scale(_receiver: &Value, factor: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let factor = factor.as_index(rt.heap()).unwrap_or(0);
    Ok(Value::Int(factor * 10))
}

static POINT_METHODS: &[MethodDef] = &[MethodDef {
    name: "scale",
    kind: MethodKind::Instance,
    doc: Some("Scale by an integer factor."),
    params: &[ParamDef::positional_only("factor")],
    handle: MethodHandle::One(point_scale),
    carrier: None,
    primary: true,
}];

static POINT_GETSETS: &[GetSetDef] = &[GetSetDef {
    name: "answer",
    doc: None,
    get: point_answer,
    set: None,
    delete: None,
}];

static POINT_MEMBERS: &[MemberDef] = &[
    MemberDef {
        name: "x",
        doc: None,
        index: 0,
        read_only: false,
        optional: false,
    },
    MemberDef {
        name: "tag",
        doc: None,
        index: 1,
        read_only: false,
        optional: true,
    },
    MemberDef {
        name: "kind",
        doc: None,
        index: 2,
        read_only: true,
        optional: false,
    },
];

static POINT_SPEC: TypeSpec = TypeSpec {
    name: "Point",
    builtin: None,
    flags: TypeFlags {
        basetype: true,
        instantiable: true,
    },
    methods: POINT_METHODS,
    getsets: POINT_GETSETS,
    members: POINT_MEMBERS,
    doc: Some("A point with reflected fields."),
};

fn point_instance(rt: &mut Runtime) -> (Value, Value) {
    let class = rt.register_type(&POINT_SPEC).unwrap();
    let instance = rt.call(&class, &[], &[]).unwrap();
    (class, instance)
}

#[test]
fn member_descriptors_reflect_instance_slots() {
    let mut rt = Runtime::new();
    let (class, instance) = point_instance(&mut rt);

    // An unset plain member reads as None.
    let unset = rt.getattr(&instance, "x").unwrap();
    assert_eq!(rt.value_to_object(&unset), Object::None);
    rt.release(unset);

    let seven = Value::Int(7);
    rt.setattr(&instance, "x", &seven).unwrap();
    let read = rt.getattr(&instance, "x").unwrap();
    assert_eq!(rt.value_to_object(&read), Object::Int(7));
    rt.release(read);

    // Delete on a plain member is "set to None".
    rt.delattr(&instance, "x").unwrap();
    let after_delete = rt.getattr(&instance, "x").unwrap();
    assert_eq!(rt.value_to_object(&after_delete), Object::None);
    rt.release(after_delete);

    rt.release(instance);
    rt.release(class);
}

#[test]
fn optional_members_raise_after_delete() {
    let mut rt = Runtime::new();
    let (class, instance) = point_instance(&mut rt);

    let label = rt.str_value("blue").unwrap();
    rt.setattr(&instance, "tag", &label).unwrap();
    rt.release(label);
    let read = rt.getattr(&instance, "tag").unwrap();
    assert_eq!(rt.value_to_object(&read), Object::from("blue"));
    rt.release(read);

    rt.delattr(&instance, "tag").unwrap();
    let err = rt.getattr(&instance, "tag").unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::AttributeError));

    rt.release(instance);
    rt.release(class);
}

#[test]
fn read_only_members_refuse_assignment() {
    let mut rt = Runtime::new();
    let (class, instance) = point_instance(&mut rt);

    let value = Value::Int(1);
    let err = rt.setattr(&instance, "kind", &value).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("not writable"), "{message}");

    rt.release(instance);
    rt.release(class);
}

#[test]
fn getset_descriptors_compute_on_access_and_refuse_writes() {
    let mut rt = Runtime::new();
    let (class, instance) = point_instance(&mut rt);

    let answer = rt.getattr(&instance, "answer").unwrap();
    assert_eq!(rt.value_to_object(&answer), Object::Int(42));
    rt.release(answer);

    let value = Value::Int(0);
    let err = rt.setattr(&instance, "answer", &value).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));

    // Unbound access on the type returns the descriptor itself.
    let descriptor = rt.getattr(&class, "answer").unwrap();
    let repr = rt.repr(&descriptor).unwrap();
    assert!(repr.contains("attribute 'answer'"), "{repr}");
    rt.release(descriptor);

    rt.release(instance);
    rt.release(class);
}

#[test]
fn exposed_methods_carry_doc_and_bind_like_methods() {
    let mut rt = Runtime::new();
    let (class, instance) = point_instance(&mut rt);

    let method = rt.getattr(&instance, "scale").unwrap();
    let result = rt.call(&method, &[Value::Int(4)], &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::Int(40));

    rt.release(result);
    rt.release(method);
    rt.release(instance);
    rt.release(class);
}

#[test]
fn staticmethod_retrieval_skips_binding() {
    let mut rt = Runtime::new();
    let staticmethod_type = rt.type_value(Type::StaticMethod).unwrap();
    let wrapped = rt
        .call(
            &staticmethod_type,
            &[Value::Builtin(Builtins::Function(BuiltinFunctions::Len))],
            &[],
        )
        .unwrap();

    let namespace = vec![("probe".to_owned(), rt.clone_value(&wrapped))];
    let class = rt.build_class("Util", &[], namespace).unwrap();
    let instance = rt.call(&class, &[], &[]).unwrap();

    // Retrieval strips the wrapper: the instance is NOT prepended.
    let probe = rt.getattr(&instance, "probe").unwrap();
    let text = rt.str_value("wyrm").unwrap();
    let length = rt.call(&probe, std::slice::from_ref(&text), &[]).unwrap();
    assert_eq!(rt.value_to_object(&length), Object::Int(4));

    for value in [length, text, probe, instance, class, wrapped, staticmethod_type] {
        rt.release(value);
    }
}

#[test]
fn classmethod_retrieval_binds_the_owner_type() {
    let mut rt = Runtime::new();
    let classmethod_type = rt.type_value(Type::ClassMethod).unwrap();
    let wrapped = rt
        .call(
            &classmethod_type,
            &[Value::Builtin(Builtins::Function(BuiltinFunctions::Repr))],
            &[],
        )
        .unwrap();

    let namespace = vec![("describe".to_owned(), rt.clone_value(&wrapped))];
    let class = rt.build_class("Token", &[], namespace).unwrap();
    let instance = rt.call(&class, &[], &[]).unwrap();

    // The receiver is the class, so repr() sees the type object.
    let describe = rt.getattr(&instance, "describe").unwrap();
    let result = rt.call(&describe, &[], &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::from("<class 'Token'>"));

    for value in [result, describe, instance, class, wrapped, classmethod_type] {
        rt.release(value);
    }
}

// --- per-carrier method declarations --------------------------------------

fn which_small(_receiver: &Value, rt: &mut Runtime) -> RunResult<Value> {
    rt.str_value("small")
}

fn which_big(_receiver: &Value, rt: &mut Runtime) -> RunResult<Value> {
    rt.str_value("big")
}

static WHICH_METHODS: &[MethodDef] = &[
    MethodDef {
        name: "which",
        kind: MethodKind::Instance,
        doc: None,
        params: &[],
        handle: MethodHandle::NoArgs(which_small),
        carrier: Some(wyrm::Carrier::Int64),
        primary: true,
    },
    MethodDef {
        name: "which",
        kind: MethodKind::Instance,
        doc: None,
        params: &[],
        handle: MethodHandle::NoArgs(which_big),
        carrier: Some(wyrm::Carrier::BigInt),
        primary: false,
    },
];

/// One Language-level method, one declaration per integer carrier; the
/// receiver's carrier picks the handle and both dispatch uniformly.
#[test]
fn carrier_specific_declarations_dispatch_by_receiver_carrier() {
    let mut rt = Runtime::new();
    let mut exposed = rt.expose("int", WHICH_METHODS).unwrap();
    let (_, descriptor) = exposed.pop().unwrap();

    // Inline carrier.
    let result = rt.call(&descriptor, &[Value::Int(5)], &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::from("small"));
    rt.release(result);

    // BigInt carrier: build a value beyond the inline range.
    let big = {
        let huge = rt
            .binary(wyrm::BinOp::Add, Object::Int(i64::MAX), Object::Int(1))
            .unwrap();
        rt.object_to_value(huge).unwrap()
    };
    let result = rt.call(&descriptor, std::slice::from_ref(&big), &[]).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::from("big"));

    rt.release(result);
    rt.release(big);
    rt.release(descriptor);
}

static MISMATCHED_CARRIER_METHODS: &[MethodDef] = &[
    MethodDef {
        name: "which",
        kind: MethodKind::Instance,
        doc: None,
        params: &[],
        handle: MethodHandle::NoArgs(which_small),
        carrier: Some(wyrm::Carrier::Int64),
        primary: true,
    },
    MethodDef {
        name: "which",
        kind: MethodKind::Instance,
        doc: None,
        params: &[ParamDef::positional_only("extra")],
        handle: MethodHandle::One(point_scale),
        carrier: Some(wyrm::Carrier::BigInt),
        primary: false,
    },
];

/// A secondary carrier declaration must be signature-compatible with the
/// primary; exposure checks this once, at type construction.
#[test]
fn incompatible_carrier_signatures_are_an_exposure_error() {
    let mut rt = Runtime::new();
    let err = rt.expose("int", MISMATCHED_CARRIER_METHODS).unwrap_err();
    assert!(err.exc_type().is_none(), "exposure table errors are internal");
}

#[test]
fn duplicate_primary_declarations_are_an_exposure_error() {
    let mut rt = Runtime::new();
    let err = rt.expose("Bad", DUPLICATE_METHODS).unwrap_err();
    assert!(err.exc_type().is_none(), "exposure table errors are internal");
}

static DUPLICATE_METHODS: &[MethodDef] = &[
    MethodDef {
        name: "probe",
        kind: MethodKind::Instance,
        doc: None,
        params: &[],
        handle: MethodHandle::NoArgs(point_answer),
        carrier: None,
        primary: true,
    },
    MethodDef {
        name: "probe",
        kind: MethodKind::Instance,
        doc: None,
        params: &[],
        handle: MethodHandle::NoArgs(point_answer),
        carrier: None,
        primary: true,
    },
];
