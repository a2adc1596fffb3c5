//! Exception values: hierarchy, retained keys, deferred messages, and the
//! propagation rule that `NotImplemented` is a value while everything else
//! raises.

use pretty_assertions::assert_eq;
use wyrm::{
    BinOp, Builtins, ExcType, Object, Runtime, SimpleException, Value,
};

#[test]
fn key_error_quotes_its_key_on_demand() {
    let exc = SimpleException::with_key(ExcType::KeyError, Object::from("k"));
    assert_eq!(exc.message(), "'k'");
    assert_eq!(exc.key(), Some(&Object::from("k")));
    assert_eq!(exc.args(), vec![Object::from("k")]);
}

#[test]
fn duplicate_key_error_carries_the_key_unchanged() {
    let exc = SimpleException::duplicate_key(Object::Int(42));
    assert_eq!(exc.exc_type(), ExcType::KeyError);
    assert_eq!(exc.key(), Some(&Object::Int(42)));
    assert_eq!(exc.message(), "duplicate key 42");
}

#[test]
fn messages_format_lazily() {
    let exc = SimpleException::new_lazy(
        ExcType::ValueError,
        "expected {} got {}",
        [Object::from("int"), Object::from("str")],
    );
    // Rendering happens at request time, and is stable.
    assert_eq!(exc.message(), "expected 'int' got 'str'");
    assert_eq!(exc.message(), "expected 'int' got 'str'");
}

#[test]
fn exception_values_round_trip_through_the_runtime() {
    let mut rt = Runtime::new();
    let value_error = Value::Builtin(Builtins::ExcType(ExcType::ValueError));
    let message = rt.str_value("bad input").unwrap();
    let exc = rt.call(&value_error, std::slice::from_ref(&message), &[]).unwrap();

    assert_eq!(
        rt.value_to_object(&exc),
        Object::Exception {
            exc_type: ExcType::ValueError,
            message: Some("bad input".to_owned()),
        }
    );
    assert_eq!(rt.repr(&exc).unwrap(), "ValueError('bad input')");

    rt.release(exc);
    rt.release(message);
}

#[test]
fn raising_preserves_the_exception_across_the_call_boundary() {
    let mut rt = Runtime::new();
    // A binary op that raises inside native code propagates the same
    // exception unchanged to the caller.
    let err = rt.binary(BinOp::TrueDiv, Object::Int(1), Object::Int(0)).unwrap_err();
    let exc = err.exception().unwrap();
    assert_eq!(exc.exc_type(), ExcType::ZeroDivisionError);
    assert_eq!(exc.message(), "division by zero");
}

#[test]
fn warnings_sit_under_exception() {
    assert!(ExcType::DeprecationWarning.is_subclass_of(ExcType::Warning));
    assert!(ExcType::RuntimeWarning.is_subclass_of(ExcType::Exception));
    assert!(!ExcType::Warning.is_subclass_of(ExcType::RuntimeError));
}

#[test]
fn stop_iteration_is_cheap_and_distinct() {
    assert!(ExcType::StopIteration.is_subclass_of(ExcType::Exception));
    assert!(!ExcType::StopIteration.is_subclass_of(ExcType::LookupError));
}

#[test]
fn float_to_int_conversion_errors() {
    let mut rt = Runtime::new();
    let int_type = rt.type_value(wyrm::Type::Int).unwrap();

    // int(inf) overflows the conversion to an arbitrary-precision integer.
    let err = rt
        .call(&int_type, &[Value::Float(f64::INFINITY)], &[])
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::OverflowError));

    // int(nan) has no integer value.
    let err = rt.call(&int_type, &[Value::Float(f64::NAN)], &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ValueError));

    // int(3.9) truncates toward zero.
    let truncated = rt.call(&int_type, &[Value::Float(3.9)], &[]).unwrap();
    assert_eq!(rt.value_to_object(&truncated), Object::Int(3));
    rt.release(truncated);

    rt.release(int_type);
}
