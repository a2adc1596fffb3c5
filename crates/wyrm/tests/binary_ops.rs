//! Binary dispatch: the numeric tower, the reflected-operator rule and the
//! `NotImplemented` sentinel.

use pretty_assertions::assert_eq;
use wyrm::{
    BinOp, CmpOp, ExcType, MethodDef, MethodHandle, MethodKind, Object, ParamDef, RunResult, Runtime, Value, binary_op,
    compare_op,
};

fn int(i: i64) -> Object {
    Object::Int(i)
}

#[test]
fn integer_arithmetic() {
    let mut rt = Runtime::new();
    assert_eq!(rt.binary(BinOp::Add, int(2), int(3)).unwrap(), int(5));
    assert_eq!(rt.binary(BinOp::Sub, int(2), int(5)).unwrap(), int(-3));
    assert_eq!(rt.binary(BinOp::Mul, int(7), int(6)).unwrap(), int(42));
    assert_eq!(rt.binary(BinOp::FloorDiv, int(7), int(2)).unwrap(), int(3));
    assert_eq!(rt.binary(BinOp::FloorDiv, int(-7), int(2)).unwrap(), int(-4));
    assert_eq!(rt.binary(BinOp::Mod, int(-7), int(2)).unwrap(), int(1));
}

#[test]
fn true_division_yields_float() {
    let mut rt = Runtime::new();
    assert_eq!(rt.binary(BinOp::TrueDiv, int(7), int(2)).unwrap(), Object::Float(3.5));
}

#[test]
fn division_by_zero_raises() {
    let mut rt = Runtime::new();
    let err = rt.binary(BinOp::TrueDiv, int(1), int(0)).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ZeroDivisionError));
    let err = rt.binary(BinOp::Mod, int(1), int(0)).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ZeroDivisionError));
}

#[test]
fn overflow_promotes_to_the_bigint_carrier() {
    let mut rt = Runtime::new();
    let result = rt.binary(BinOp::Add, int(i64::MAX), int(1)).unwrap();
    match result {
        Object::BigInt(big) => assert_eq!(big.to_string(), "9223372036854775808"),
        other => panic!("expected BigInt, got {other:?}"),
    }
    // A BigInt result that fits inline normalises back down.
    let big = rt_big(&mut rt, i64::MAX, 1);
    let back = rt.binary(BinOp::Sub, big, int(1)).unwrap();
    assert_eq!(back, int(i64::MAX));
}

/// Builds `base + extra` as a BigInt object through the runtime.
fn rt_big(rt: &mut Runtime, base: i64, extra: i64) -> Object {
    rt.binary(BinOp::Add, int(base), int(extra)).unwrap()
}

#[test]
fn bool_demotes_to_integer_arithmetic() {
    let mut rt = Runtime::new();
    // True + True == 2
    assert_eq!(
        rt.binary(BinOp::Add, Object::Bool(true), Object::Bool(true)).unwrap(),
        int(2)
    );
    // True & False is False (stays boolean)
    assert_eq!(
        rt.binary(BinOp::And, Object::Bool(true), Object::Bool(false)).unwrap(),
        Object::Bool(false)
    );
    // True | 2 == 3 (the non-bool operand demotes to integer arithmetic)
    assert_eq!(rt.binary(BinOp::Or, Object::Bool(true), int(2)).unwrap(), int(3));
}

#[test]
fn mixed_int_float_arithmetic_goes_through_the_reflected_slot() {
    let mut rt = Runtime::new();
    assert_eq!(rt.binary(BinOp::Add, int(1), Object::Float(0.5)).unwrap(), Object::Float(1.5));
    assert_eq!(rt.binary(BinOp::Add, Object::Float(0.5), int(1)).unwrap(), Object::Float(1.5));
}

#[test]
fn unsupported_operands_name_both_types() {
    let mut rt = Runtime::new();
    let err = rt.binary(BinOp::Add, int(1), Object::None).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains('+'), "message should name the op: {message}");
    assert!(message.contains("int") && message.contains("NoneType"), "{message}");
}

#[test]
fn string_concatenation_and_repetition() {
    let mut rt = Runtime::new();
    assert_eq!(
        rt.binary(BinOp::Add, Object::from("sp"), Object::from("am")).unwrap(),
        Object::from("spam")
    );
    assert_eq!(
        rt.binary(BinOp::Mul, Object::from("ab"), int(3)).unwrap(),
        Object::from("ababab")
    );
}

#[test]
fn comparisons_follow_the_mirror_pairs() {
    let mut rt = Runtime::new();
    assert_eq!(rt.compare(CmpOp::Lt, int(1), int(2)).unwrap(), Object::Bool(true));
    assert_eq!(rt.compare(CmpOp::Ge, int(1), int(2)).unwrap(), Object::Bool(false));
    assert_eq!(rt.compare(CmpOp::Eq, int(1), Object::Float(1.0)).unwrap(), Object::Bool(true));
    assert_eq!(rt.compare(CmpOp::Eq, Object::Bool(true), int(1)).unwrap(), Object::Bool(true));
    // Equality between unrelated types falls back to identity, not an error.
    assert_eq!(rt.compare(CmpOp::Eq, int(1), Object::from("1")).unwrap(), Object::Bool(false));
    let err = rt.compare(CmpOp::Lt, int(1), Object::from("1")).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
}

// --- the reflected rule with user-defined types ---------------------------

fn t_add(_receiver: &Value, _other: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    Ok(Value::NotImplemented)
}

fn s_radd(_receiver: &Value, _other: &Value, rt: &mut Runtime) -> RunResult<Value> {
    rt.str_value("S.radd")
}

static T_METHODS: &[MethodDef] = &[MethodDef {
    name: "__add__",
    kind: MethodKind::Instance,
    doc: None,
    params: &[ParamDef::positional_only("other")],
    handle: MethodHandle::One(t_add),
    carrier: None,
    primary: true,
}];

static S_METHODS: &[MethodDef] = &[MethodDef {
    name: "__radd__",
    kind: MethodKind::Instance,
    doc: None,
    params: &[ParamDef::positional_only("other")],
    handle: MethodHandle::One(s_radd),
    carrier: None,
    primary: true,
}];

/// Subtype-first dispatch: for `S <: T` where `S` overrides `radd`,
/// `T() + S()` invokes `S.radd` before `T.add`.
#[test]
fn subtype_reflected_op_wins() {
    let mut rt = Runtime::new();

    let t_namespace = rt.expose("T", T_METHODS).unwrap();
    let t_class = rt.build_class("T", &[], t_namespace).unwrap();
    let s_namespace = rt.expose("S", S_METHODS).unwrap();
    let s_class = rt.build_class("S", std::slice::from_ref(&t_class), s_namespace).unwrap();

    let t_instance = rt.call(&t_class, &[], &[]).unwrap();
    let s_instance = rt.call(&s_class, &[], &[]).unwrap();

    let result = binary_op(BinOp::Add, &t_instance, &s_instance, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&result), Object::from("S.radd"));

    // The same pair the other way round also resolves through S.radd,
    // because T.add returns the NotImplemented sentinel.
    let result2 = binary_op(BinOp::Add, &s_instance, &t_instance, &mut rt);
    assert!(result2.is_err(), "S has no add and T has no radd");

    rt.release(result);
    rt.release(t_instance);
    rt.release(s_instance);
    rt.release(t_class);
    rt.release(s_class);
}

/// Both sides returning the sentinel raises a TypeError naming the types.
#[test]
fn sentinel_on_both_sides_raises() {
    let mut rt = Runtime::new();
    let t_namespace = rt.expose("T", T_METHODS).unwrap();
    let t_class = rt.build_class("T", &[], t_namespace).unwrap();
    let a = rt.call(&t_class, &[], &[]).unwrap();
    let b = rt.call(&t_class, &[], &[]).unwrap();

    let err = binary_op(BinOp::Add, &a, &b, &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains('T'), "{message}");

    rt.release(a);
    rt.release(b);
    rt.release(t_class);
}

/// Comparison dispatch accepts user types through the same machinery.
#[test]
fn user_type_equality_defaults_to_identity() {
    let mut rt = Runtime::new();
    let t_namespace = rt.expose("T", T_METHODS).unwrap();
    let t_class = rt.build_class("T", &[], t_namespace).unwrap();
    let a = rt.call(&t_class, &[], &[]).unwrap();
    let b = rt.call(&t_class, &[], &[]).unwrap();

    let same = compare_op(CmpOp::Eq, &a, &a, &mut rt).unwrap();
    let different = compare_op(CmpOp::Eq, &a, &b, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&same), Object::Bool(true));
    assert_eq!(rt.value_to_object(&different), Object::Bool(false));

    rt.release(same);
    rt.release(different);
    rt.release(a);
    rt.release(b);
    rt.release(t_class);
}
