//! Container stubs: bytes, list, dict — including the native dict
//! iteration surface with in-place removal.

use pretty_assertions::assert_eq;
use wyrm::{
    BinOp, ExcType, HeapData, Object, Runtime, Value, contains, delitem, getitem, iter_next, iter_value, len_of,
    setitem,
};

#[test]
fn bytes_concatenation_repetition_and_indexing() {
    let mut rt = Runtime::new();
    // bytes([1, 2, 3]) + bytes([4, 5]) == bytes([1, 2, 3, 4, 5])
    assert_eq!(
        rt.binary(BinOp::Add, Object::Bytes(vec![1, 2, 3]), Object::Bytes(vec![4, 5]))
            .unwrap(),
        Object::Bytes(vec![1, 2, 3, 4, 5])
    );
    // bytes([1, 2]) * 3
    assert_eq!(
        rt.binary(BinOp::Mul, Object::Bytes(vec![1, 2]), Object::Int(3)).unwrap(),
        Object::Bytes(vec![1, 2, 1, 2, 1, 2])
    );
    // bytes([0xff])[0] == 255
    let value = rt.object_to_value(Object::Bytes(vec![0xff])).unwrap();
    let item = getitem(&value, &Value::Int(0), &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&item), Object::Int(255));
    rt.release(item);
    rt.release(value);
}

#[test]
fn bytes_constructor_accepts_int_lists_and_rejects_out_of_range() {
    let mut rt = Runtime::new();
    let bytes_type = rt.type_value(wyrm::Type::Bytes).unwrap();
    let source = rt
        .object_to_value(Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)]))
        .unwrap();
    let built = rt.call(&bytes_type, std::slice::from_ref(&source), &[]).unwrap();
    assert_eq!(rt.value_to_object(&built), Object::Bytes(vec![1, 2, 3]));
    rt.release(built);
    rt.release(source);

    let bad = rt.object_to_value(Object::List(vec![Object::Int(300)])).unwrap();
    let err = rt.call(&bytes_type, std::slice::from_ref(&bad), &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ValueError));
    rt.release(bad);
    rt.release(bytes_type);
}

#[test]
fn dict_len_membership_and_ordered_language_iteration() {
    let mut rt = Runtime::new();
    let dict = rt
        .object_to_value(Object::Dict(vec![
            (Object::from("a"), Object::Int(1)),
            (Object::from("b"), Object::Int(2)),
        ]))
        .unwrap();

    // len({"a": 1, "b": 2}) == 2
    assert_eq!(len_of(&dict, &mut rt).unwrap(), 2);

    let a_key = rt.str_value("a").unwrap();
    assert!(contains(&dict, &a_key, &mut rt).unwrap());

    // Language iteration yields keys in insertion order.
    let iterator = iter_value(&dict, &mut rt).unwrap();
    let first = iter_next(&iterator, &mut rt).unwrap();
    let second = iter_next(&iterator, &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&first), Object::from("a"));
    assert_eq!(rt.value_to_object(&second), Object::from("b"));
    let exhausted = iter_next(&iterator, &mut rt).unwrap_err();
    assert!(exhausted.is_stop_iteration());

    for value in [first, second, iterator, a_key, dict] {
        rt.release(value);
    }
}

/// The native map surface: pair iteration in insertion order, and removal
/// through that surface is reflected in the backing map immediately.
#[test]
fn native_dict_iteration_and_in_place_removal() {
    let mut rt = Runtime::new();
    let dict_value = rt
        .object_to_value(Object::Dict(vec![
            (Object::from("a"), Object::Int(1)),
            (Object::from("b"), Object::Int(2)),
        ]))
        .unwrap();
    let dict_id = dict_value.ref_id().expect("dicts are heap values");

    // Pair iteration in insertion order.
    {
        let HeapData::Dict(dict) = rt.heap().get(dict_id) else {
            panic!("expected a dict");
        };
        let pairs: Vec<(Object, Object)> = dict
            .iter()
            .map(|(k, v)| (rt.value_to_object(k), rt.value_to_object(v)))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Object::from("a"), Object::Int(1)),
                (Object::from("b"), Object::Int(2)),
            ]
        );
    }

    // Remove "a" through the native surface.
    let a_key = rt.str_value("a").unwrap();
    let mut dict = match rt.heap_mut().take(dict_id) {
        HeapData::Dict(dict) => dict,
        _ => panic!("expected a dict"),
    };
    let removed = dict.shift_remove(&a_key, rt.heap(), rt.interns()).unwrap();
    rt.heap_mut().restore(dict_id, HeapData::Dict(dict));
    let (removed_key, removed_value) = removed.expect("key was present");
    rt.release(removed_key);
    rt.release(removed_value);
    rt.release(a_key);

    // The backing map no longer has the key.
    assert_eq!(
        rt.value_to_object(&dict_value),
        Object::Dict(vec![(Object::from("b"), Object::Int(2))])
    );

    rt.release(dict_value);
}

#[test]
fn dict_missing_key_raises_key_error_carrying_the_key() {
    let mut rt = Runtime::new();
    let dict = rt.object_to_value(Object::Dict(vec![])).unwrap();
    let key = rt.str_value("k").unwrap();

    let err = getitem(&dict, &key, &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::KeyError));
    let exc = err.exception().unwrap();
    // The raw key is retained, and the message quotes it.
    assert_eq!(exc.key(), Some(&Object::from("k")));
    assert_eq!(exc.message(), "'k'");

    rt.release(key);
    rt.release(dict);
}

#[test]
fn list_setitem_delitem_and_equality() {
    let mut rt = Runtime::new();
    let list = rt
        .object_to_value(Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)]))
        .unwrap();

    setitem(&list, &Value::Int(1), &Value::Int(20), &mut rt).unwrap();
    assert_eq!(
        rt.value_to_object(&list),
        Object::List(vec![Object::Int(1), Object::Int(20), Object::Int(3)])
    );

    // Negative index.
    let last = getitem(&list, &Value::Int(-1), &mut rt).unwrap();
    assert_eq!(rt.value_to_object(&last), Object::Int(3));
    rt.release(last);

    delitem(&list, &Value::Int(0), &mut rt).unwrap();
    assert_eq!(
        rt.value_to_object(&list),
        Object::List(vec![Object::Int(20), Object::Int(3)])
    );

    let err = getitem(&list, &Value::Int(10), &mut rt).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::IndexError));

    rt.release(list);
}

#[test]
fn container_reprs() {
    let mut rt = Runtime::new();
    assert_eq!(
        rt.repr_object(Object::List(vec![Object::Int(1), Object::from("a"), Object::None]))
            .unwrap(),
        "[1, 'a', None]"
    );
    assert_eq!(
        rt.repr_object(Object::Dict(vec![(Object::from("a"), Object::Int(1))]))
            .unwrap(),
        "{'a': 1}"
    );
    assert_eq!(rt.repr_object(Object::Bytes(vec![0x61, 0xff])).unwrap(), "b'a\\xff'");
    assert_eq!(rt.repr_object(Object::Tuple(vec![Object::Int(1)])).unwrap(), "(1,)");
}
