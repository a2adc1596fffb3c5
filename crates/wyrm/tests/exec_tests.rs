//! The `exec` contract, exercised with stub compiler and interpreter
//! collaborators.
//!
//! The stub compiler produces a module-body code object that keeps the
//! source; the stub evaluator understands `name = <int>` statements and
//! writes them into the frame's locals mapping (or globals when locals are
//! absent), which is all the contract tests need.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use wyrm::{
    CodeObject, Compiler, Evaluator, ExcType, ExecSource, Object, RunResult, Runtime, Value, getitem, setitem,
};

#[derive(Debug)]
struct LineCompiler;

impl Compiler for LineCompiler {
    fn compile(&self, source: &str) -> RunResult<Rc<CodeObject>> {
        Ok(Rc::new(CodeObject::module_body("<module>", source)))
    }
}

#[derive(Debug)]
struct AssignmentEvaluator;

impl Evaluator for AssignmentEvaluator {
    fn evaluate(&self, rt: &mut Runtime) -> RunResult<Value> {
        let (source, target) = {
            let frame = rt.thread().current_frame().expect("evaluator runs with a frame");
            let source = frame.code.source.clone().unwrap_or_default();
            let target = match &frame.locals {
                Some(locals) => rt.clone_value(locals),
                None => rt.clone_value(&frame.globals),
            };
            (source, target)
        };

        for line in source.lines() {
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let value: i64 = value.trim().parse().expect("stub evaluator handles int literals only");
            let key = match rt.str_value(name) {
                Ok(key) => key,
                Err(err) => {
                    rt.release(target);
                    return Err(err);
                }
            };
            let result = setitem(&target, &key, &Value::Int(value), rt);
            rt.release(key);
            if let Err(err) = result {
                rt.release(target);
                return Err(err);
            }
        }
        rt.release(target);
        Ok(Value::None)
    }
}

fn runtime_with_collaborators() -> Runtime {
    let mut rt = Runtime::new();
    rt.set_compiler(Rc::new(LineCompiler));
    rt.set_evaluator(Rc::new(AssignmentEvaluator));
    rt
}

#[test]
fn exec_assigns_into_fresh_globals() {
    let mut rt = runtime_with_collaborators();
    let globals = rt.new_dict().unwrap();

    rt.exec(ExecSource::Str("x = 1".to_owned()), Some(&globals), None, None)
        .unwrap();

    let key = rt.str_value("x").unwrap();
    let value = getitem(&globals, &key, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&value), Object::Int(1));
    rt.release(value);
    rt.release(key);

    // `__builtins__` was injected before execution.
    let builtins_key = rt.str_value("__builtins__").unwrap();
    let injected = getitem(&globals, &builtins_key, &mut rt).unwrap();
    assert!(matches!(
        rt.value_to_object(&injected),
        Object::Repr(text) if text.contains("module")
    ));
    rt.release(injected);
    rt.release(builtins_key);
    rt.release(globals);
}

#[test]
fn exec_with_non_mapping_locals_raises_type_error() {
    let mut rt = runtime_with_collaborators();
    let globals = rt.new_dict().unwrap();
    let locals = Value::Int(3);

    let err = rt
        .exec(ExecSource::Str("x = 1".to_owned()), Some(&globals), Some(&locals), None)
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("mapping"), "{message}");

    rt.release(globals);
}

#[test]
fn exec_without_frame_or_globals_is_a_system_error() {
    let mut rt = runtime_with_collaborators();
    let err = rt
        .exec(ExecSource::Str("x = 1".to_owned()), None, None, None)
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::SystemError));
}

#[test]
fn exec_with_string_source_and_closure_is_a_type_error() {
    let mut rt = runtime_with_collaborators();
    let globals = rt.new_dict().unwrap();
    let closure = rt.object_to_value(Object::Tuple(vec![Object::Int(1)])).unwrap();

    let err = rt
        .exec(
            ExecSource::Str("x = 1".to_owned()),
            Some(&globals),
            None,
            Some(&closure),
        )
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));

    rt.release(closure);
    rt.release(globals);
}

#[test]
fn exec_checks_closure_arity_against_free_variables() {
    let mut rt = runtime_with_collaborators();
    let globals = rt.new_dict().unwrap();

    let mut code = CodeObject::module_body("<module>", "x = 1");
    code.freevars = vec!["a".to_owned(), "b".to_owned()];
    let code = Rc::new(code);

    // A closure of length 1 against 2 free variables: TypeError quoting
    // "exactly 2".
    let short_closure = rt.object_to_value(Object::Tuple(vec![Object::Int(1)])).unwrap();
    let err = rt
        .exec(ExecSource::Code(code.clone()), Some(&globals), None, Some(&short_closure))
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("exactly 2"), "{message}");
    rt.release(short_closure);

    // No closure at all is also a mismatch.
    let err = rt
        .exec(ExecSource::Code(code.clone()), Some(&globals), None, None)
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));

    // The right length runs.
    let full_closure = rt
        .object_to_value(Object::Tuple(vec![Object::Int(1), Object::Int(2)]))
        .unwrap();
    rt.exec(ExecSource::Code(code), Some(&globals), None, Some(&full_closure))
        .unwrap();
    rt.release(full_closure);

    rt.release(globals);
}

#[test]
fn exec_code_with_closure_but_no_free_variables_is_rejected() {
    let mut rt = runtime_with_collaborators();
    let globals = rt.new_dict().unwrap();
    let code = Rc::new(CodeObject::module_body("<module>", "x = 1"));
    let closure = rt.object_to_value(Object::Tuple(vec![Object::Int(1)])).unwrap();

    let err = rt
        .exec(ExecSource::Code(code), Some(&globals), None, Some(&closure))
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("closure"), "{message}");

    rt.release(closure);
    rt.release(globals);
}

#[test]
fn exec_without_compiler_is_a_system_error() {
    let mut rt = Runtime::new();
    rt.set_evaluator(Rc::new(AssignmentEvaluator));
    let globals = rt.new_dict().unwrap();

    let err = rt
        .exec(ExecSource::Str("x = 1".to_owned()), Some(&globals), None, None)
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::SystemError));

    rt.release(globals);
}

#[test]
fn exec_locals_default_to_globals_when_only_globals_are_supplied() {
    let mut rt = runtime_with_collaborators();
    let globals = rt.new_dict().unwrap();

    rt.exec(ExecSource::Str("y = 41".to_owned()), Some(&globals), None, None)
        .unwrap();

    let key = rt.str_value("y").unwrap();
    let value = getitem(&globals, &key, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&value), Object::Int(41));

    rt.release(value);
    rt.release(key);
    rt.release(globals);
}
