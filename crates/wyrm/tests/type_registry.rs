//! The type registry: MRO properties, subtype checks, flags, adopted
//! carriers.

use pretty_assertions::assert_eq;
use wyrm::{Carrier, ExcType, HeapData, Object, Runtime, Type, Value};

fn type_name(rt: &Runtime, id: wyrm::HeapId) -> String {
    match rt.heap().get(id) {
        HeapData::Type(type_obj) => rt.interns().get_str(type_obj.name()).to_owned(),
        _ => panic!("expected a type object"),
    }
}

#[test]
fn every_type_appears_in_its_own_mro_and_object_terminates() {
    let mut rt = Runtime::new();
    for t in [Type::Object, Type::Int, Type::Bool, Type::Str, Type::List, Type::Dict] {
        let id = rt.type_object(t).unwrap();
        let HeapData::Type(type_obj) = rt.heap().get(id) else {
            panic!("expected a type object");
        };
        let mro = type_obj.mro().to_vec();
        assert_eq!(mro[0], id, "a type leads its own MRO");
        let object_id = rt.type_object(Type::Object).unwrap();
        assert_eq!(*mro.last().unwrap(), object_id, "object terminates every MRO");
        // Reflexive subtype check.
        let HeapData::Type(type_obj) = rt.heap().get(id) else {
            panic!("expected a type object");
        };
        assert!(type_obj.is_subtype_of(id, id));
    }
}

#[test]
fn bool_chains_to_int_in_the_registry() {
    let mut rt = Runtime::new();
    let bool_id = rt.type_object(Type::Bool).unwrap();
    let int_id = rt.type_object(Type::Int).unwrap();
    let HeapData::Type(bool_type) = rt.heap().get(bool_id) else {
        panic!("expected a type object");
    };
    assert!(bool_type.is_subtype_of(bool_id, int_id));
    assert_eq!(bool_type.bases(), &[int_id]);
    assert!(!bool_type.flags().basetype, "bool may not be subclassed");
}

#[test]
fn int_adopts_both_integer_carriers() {
    let mut rt = Runtime::new();
    let int_id = rt.type_object(Type::Int).unwrap();
    let HeapData::Type(int_type) = rt.heap().get(int_id) else {
        panic!("expected a type object");
    };
    assert_eq!(int_type.adopted(), &[Carrier::Int64, Carrier::BigInt]);
}

#[test]
fn diamond_inheritance_linearises_with_c3() {
    let mut rt = Runtime::new();
    let a = rt.build_class("A", &[], Vec::new()).unwrap();
    let b = rt.build_class("B", std::slice::from_ref(&a), Vec::new()).unwrap();
    let c = rt.build_class("C", std::slice::from_ref(&a), Vec::new()).unwrap();
    let d = rt.build_class("D", &[rt.clone_value(&b), rt.clone_value(&c)], Vec::new()).unwrap();

    let d_id = d.ref_id().unwrap();
    let HeapData::Type(d_type) = rt.heap().get(d_id) else {
        panic!("expected a type object");
    };
    let names: Vec<String> = d_type.mro().iter().map(|&id| type_name(&rt, id)).collect();
    assert_eq!(names, ["D", "B", "C", "A", "object"]);

    for value in [a, b, c, d] {
        rt.release(value);
    }
}

#[test]
fn inconsistent_hierarchies_are_rejected() {
    let mut rt = Runtime::new();
    let a = rt.build_class("A", &[], Vec::new()).unwrap();
    let b = rt.build_class("B", std::slice::from_ref(&a), Vec::new()).unwrap();
    // bases (A, B): A precedes its own subtype, which C3 cannot satisfy.
    let err = rt
        .build_class("Broken", &[rt.clone_value(&a), rt.clone_value(&b)], Vec::new())
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("consistent method resolution order"), "{message}");

    rt.release(a);
    rt.release(b);
}

#[test]
fn non_basetype_builtins_reject_subclassing() {
    let mut rt = Runtime::new();
    let bool_type = rt.type_value(Type::Bool).unwrap();
    let err = rt
        .build_class("MyBool", std::slice::from_ref(&bool_type), Vec::new())
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
    let message = err.exception().unwrap().message().into_owned();
    assert!(message.contains("not an acceptable base type"), "{message}");
    rt.release(bool_type);
}

#[test]
fn type_of_returns_registered_types() {
    let mut rt = Runtime::new();
    // type(1) is int — through the one-argument type() call.
    let type_type = rt.type_value(Type::Type).unwrap();
    let int_type = rt.type_value(Type::Int).unwrap();
    let result = rt.call(&type_type, &[Value::Int(1)], &[]).unwrap();
    assert!(result.is_(&int_type), "type(1) is the canonical int type object");
    rt.release(result);

    // type(instance) is the class.
    let class = rt.build_class("Spam", &[], Vec::new()).unwrap();
    let instance = rt.call(&class, &[], &[]).unwrap();
    let result = rt.call(&type_type, std::slice::from_ref(&instance), &[]).unwrap();
    assert!(result.is_(&class));

    for value in [result, instance, class, int_type, type_type] {
        rt.release(value);
    }
}

#[test]
fn type_reprs_and_dunder_name() {
    let mut rt = Runtime::new();
    let int_type = rt.type_value(Type::Int).unwrap();
    assert_eq!(rt.repr(&int_type).unwrap(), "<class 'int'>");

    let name = rt.getattr(&int_type, "__name__").unwrap();
    assert_eq!(rt.value_to_object(&name), Object::from("int"));

    rt.release(name);
    rt.release(int_type);
}

#[test]
fn type_attribute_mutation_is_guarded_and_refuses_unknown_deletes() {
    let mut rt = Runtime::new();
    let class = rt.build_class("Holder", &[], Vec::new()).unwrap();

    let value = rt.object_to_value(Object::Int(7)).unwrap();
    rt.setattr(&class, "limit", &value).unwrap();
    rt.release(value);

    let read = rt.getattr(&class, "limit").unwrap();
    assert_eq!(rt.value_to_object(&read), Object::Int(7));
    rt.release(read);

    let err = rt.getattr(&class, "missing").unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::AttributeError));

    rt.release(class);
}
