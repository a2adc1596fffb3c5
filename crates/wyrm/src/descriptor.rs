//! Descriptors: the bridge between native code and Language attribute
//! semantics.
//!
//! A method descriptor owns the fused result of exposure: name, owner,
//! documentation, `ArgParser`, and one handle per adopted carrier. Retrieval
//! follows the descriptor protocol: unbound access returns the descriptor
//! itself, instance access returns a bound method fronting the descriptor
//! with the receiver prepended. Get/set descriptors and member descriptors
//! implement the data half of the protocol.

use std::rc::Rc;

use crate::{
    argparse::ArgParser,
    call::call_value,
    exceptions::{ExcType, RunError, RunResult},
    expose::{MethodHandle, MethodKind},
    heap::{Heap, HeapData, HeapId},
    intern::StringId,
    ops::{Operations, bin, call_slot, tern, un},
    runtime::Runtime,
    types::str::Str,
    value::{Carrier, Value},
};

/// A named native method bound to an owner type.
#[derive(Debug)]
pub struct MethodDescriptor {
    name: StringId,
    /// Owner type name, for reprs and error messages.
    owner: Box<str>,
    doc: Option<&'static str>,
    kind: MethodKind,
    parser: Rc<ArgParser>,
    /// One handle per adopted carrier; `None` is the any-carrier primary.
    handles: Vec<(Option<Carrier>, MethodHandle)>,
}

impl MethodDescriptor {
    #[must_use]
    pub(crate) fn new(
        name: StringId,
        owner: &str,
        doc: Option<&'static str>,
        kind: MethodKind,
        parser: Rc<ArgParser>,
        handles: Vec<(Option<Carrier>, MethodHandle)>,
    ) -> Self {
        Self {
            name,
            owner: owner.into(),
            doc,
            kind,
            parser,
            handles,
        }
    }

    #[must_use]
    pub fn name(&self) -> StringId {
        self.name
    }

    #[must_use]
    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }

    #[must_use]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    #[must_use]
    pub fn parser(&self) -> &Rc<ArgParser> {
        &self.parser
    }

    /// Selects the handle for a receiver carrier: an exact carrier match
    /// wins, then the any-carrier declaration.
    fn handle_for(&self, carrier: Carrier) -> MethodHandle {
        self.handles
            .iter()
            .find(|(c, _)| *c == Some(carrier))
            .or_else(|| self.handles.iter().find(|(c, _)| c.is_none()))
            .map_or(self.handles[0].1, |(_, h)| *h)
    }
}

/// Invokes a method descriptor with an explicit receiver.
///
/// Every call shape funnels through here and through one `ArgParser`, so
/// arity-specialised entry points cannot diverge from the canonical
/// `call(args, names)`.
pub(crate) fn invoke_method_descriptor(
    descr_id: HeapId,
    receiver: &Value,
    args: &[Value],
    names: &[StringId],
    rt: &mut Runtime,
) -> RunResult<Value> {
    let (parser, handle) = match rt.heap.get(descr_id) {
        HeapData::MethodDescriptor(md) => (md.parser.clone(), md.handle_for(receiver_carrier(receiver, &rt.heap))),
        _ => return Err(RunError::internal("method descriptor invoke on wrong carrier")),
    };
    let mut slots = parser.bind(args, names, rt)?;
    let result = match handle {
        MethodHandle::NoArgs(f) => f(receiver, rt),
        MethodHandle::One(f) => f(receiver, &slots[0], rt),
        MethodHandle::Two(f) => f(receiver, &slots[0], &slots[1], rt),
        MethodHandle::Three(f) => f(receiver, &slots[0], &slots[1], &slots[2], rt),
        MethodHandle::Positional(f) | MethodHandle::General(f) => f(receiver, &slots, rt),
    };
    for slot in slots.drain(..) {
        slot.drop_with_heap(&mut rt.heap);
    }
    result
}

fn receiver_carrier(receiver: &Value, heap: &Heap) -> Carrier {
    match receiver {
        Value::Undefined | Value::None => Carrier::None,
        other => other.carrier(heap),
    }
}

/// The unbound call path: `descriptor(receiver, *args)`.
fn md_call(callee: &Value, args: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    let Value::Ref(id) = callee else {
        return Err(RunError::internal("method descriptor call on wrong carrier"));
    };
    let (kind, qualified) = match rt.heap.get(*id) {
        HeapData::MethodDescriptor(md) => (md.kind, format!("{}.{}", md.owner, rt.interns.get_str(md.name))),
        _ => return Err(RunError::internal("method descriptor call on wrong carrier")),
    };
    match kind {
        MethodKind::Static => invoke_method_descriptor(*id, &Value::None, args, names, rt),
        MethodKind::Instance | MethodKind::Class => {
            let positional = args.len() - names.len();
            if positional == 0 {
                return Err(ExcType::type_error(format!(
                    "unbound method {qualified}() needs an argument"
                )));
            }
            let receiver = &args[0];
            invoke_method_descriptor(*id, receiver, &args[1..], names, rt)
        }
    }
}

fn md_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let Value::Ref(id) = v else {
        return Err(RunError::internal("method descriptor repr on wrong carrier"));
    };
    let text = match rt.heap.get(*id) {
        HeapData::MethodDescriptor(md) => {
            format!("<method '{}' of '{}' objects>", rt.interns.get_str(md.name), md.owner)
        }
        _ => return Err(RunError::internal("method descriptor repr on wrong carrier")),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

/// Descriptor `get` slot: unbound access returns the descriptor, instance
/// access allocates a bound method.
fn md_get(descr: &Value, instance: &Value, _owner: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if matches!(instance, Value::None | Value::Undefined) {
        return Ok(descr.clone_with_heap(&rt.heap));
    }
    let method = BoundMethod::new(descr.clone_with_heap(&rt.heap), instance.clone_with_heap(&rt.heap));
    Ok(Value::Ref(rt.heap.allocate(HeapData::BoundMethod(method))?))
}

pub(crate) const METHOD_DESCRIPTOR_OPS: Operations = Operations {
    call: call_slot(md_call),
    repr: un(md_repr),
    get: tern(md_get),
    ..Operations::EMPTY
};

// ---------------------------------------------------------------------------
// Bound methods
// ---------------------------------------------------------------------------

/// A callable fronting another callable with a receiver prepended.
///
/// The pair is two owned references; binding a method is one small heap
/// allocation and two reference-count increments.
#[derive(Debug)]
pub struct BoundMethod {
    func: Value,
    receiver: Value,
}

impl BoundMethod {
    #[must_use]
    pub fn new(func: Value, receiver: Value) -> Self {
        Self { func, receiver }
    }

    #[must_use]
    pub fn func(&self) -> &Value {
        &self.func
    }

    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        self.func.collect_refs(stack);
        self.receiver.collect_refs(stack);
    }
}

/// Bound-method call: prepend the receiver to the positional payload, then
/// delegate to the fronted callable.
fn bm_call(callee: &Value, args: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    let Value::Ref(id) = callee else {
        return Err(RunError::internal("bound method call on wrong carrier"));
    };
    let (func, receiver) = match rt.heap.get(*id) {
        HeapData::BoundMethod(bm) => (bm.func.clone_with_heap(&rt.heap), bm.receiver.clone_with_heap(&rt.heap)),
        _ => return Err(RunError::internal("bound method call on wrong carrier")),
    };

    // Fast path: the fronted callable is a method descriptor, so binding
    // can go straight to the descriptor without building a combined
    // payload.
    if let Value::Ref(func_id) = &func {
        if matches!(rt.heap.get(*func_id), HeapData::MethodDescriptor(_)) {
            let func_id = *func_id;
            let result = invoke_method_descriptor(func_id, &receiver, args, names, rt);
            func.drop_with_heap(&mut rt.heap);
            receiver.drop_with_heap(&mut rt.heap);
            return result;
        }
    }

    let mut combined: Vec<Value> = Vec::with_capacity(args.len() + 1);
    combined.push(receiver);
    for arg in args {
        combined.push(arg.clone_with_heap(&rt.heap));
    }
    let result = call_value(&func, &combined, names, rt);
    for value in combined {
        value.drop_with_heap(&mut rt.heap);
    }
    func.drop_with_heap(&mut rt.heap);
    result
}

fn bm_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let Value::Ref(id) = v else {
        return Err(RunError::internal("bound method repr on wrong carrier"));
    };
    let text = match rt.heap.get(*id) {
        HeapData::BoundMethod(bm) => {
            let receiver_type = bm.receiver.type_name(&rt.heap, &rt.interns);
            format!("<bound method of '{receiver_type}' object>")
        }
        _ => return Err(RunError::internal("bound method repr on wrong carrier")),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

pub(crate) const BOUND_METHOD_OPS: Operations = Operations {
    call: call_slot(bm_call),
    repr: un(bm_repr),
    ..Operations::EMPTY
};

// ---------------------------------------------------------------------------
// Get/set descriptors
// ---------------------------------------------------------------------------

/// A get/set/delete triple exposed as one named attribute.
#[derive(Debug)]
pub struct GetSetDescriptor {
    name: StringId,
    owner: Box<str>,
    doc: Option<&'static str>,
    get: fn(&Value, &mut Runtime) -> RunResult<Value>,
    set: Option<fn(&Value, &Value, &mut Runtime) -> RunResult<Value>>,
    delete: Option<fn(&Value, &mut Runtime) -> RunResult<Value>>,
}

impl GetSetDescriptor {
    #[must_use]
    pub(crate) fn new(
        name: StringId,
        owner: &str,
        doc: Option<&'static str>,
        get: fn(&Value, &mut Runtime) -> RunResult<Value>,
        set: Option<fn(&Value, &Value, &mut Runtime) -> RunResult<Value>>,
        delete: Option<fn(&Value, &mut Runtime) -> RunResult<Value>>,
    ) -> Self {
        Self {
            name,
            owner: owner.into(),
            doc,
            get,
            set,
            delete,
        }
    }

    #[must_use]
    pub fn name(&self) -> StringId {
        self.name
    }

    #[must_use]
    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }
}

fn gs_parts(v: &Value, heap: &Heap) -> RunResult<(StringId, Box<str>)> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::GetSet(gs) => Ok((gs.name, gs.owner.clone())),
            _ => Err(RunError::internal("getset slot on wrong carrier")),
        },
        _ => Err(RunError::internal("getset slot on wrong carrier")),
    }
}

fn gs_get(descr: &Value, instance: &Value, _owner: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if matches!(instance, Value::None | Value::Undefined) {
        return Ok(descr.clone_with_heap(&rt.heap));
    }
    let getter = match descr {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::GetSet(gs) => gs.get,
            _ => return Err(RunError::internal("getset slot on wrong carrier")),
        },
        _ => return Err(RunError::internal("getset slot on wrong carrier")),
    };
    getter(instance, rt)
}

fn gs_set(descr: &Value, instance: &Value, value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let setter = match descr {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::GetSet(gs) => gs.set,
            _ => return Err(RunError::internal("getset slot on wrong carrier")),
        },
        _ => return Err(RunError::internal("getset slot on wrong carrier")),
    };
    match setter {
        Some(set) => set(instance, value, rt),
        None => {
            let (name, owner) = gs_parts(descr, &rt.heap)?;
            let name = rt.interns.get_str(name).to_owned();
            Err(ExcType::type_error(format!(
                "attribute '{name}' of '{owner}' objects is not writable"
            )))
        }
    }
}

/// `__delete__` raises `AttributeError` when the underlying storage
/// disallows deletion.
fn gs_delete(descr: &Value, instance: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let deleter = match descr {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::GetSet(gs) => gs.delete,
            _ => return Err(RunError::internal("getset slot on wrong carrier")),
        },
        _ => return Err(RunError::internal("getset slot on wrong carrier")),
    };
    match deleter {
        Some(delete) => delete(instance, rt),
        None => {
            let (name, owner) = gs_parts(descr, &rt.heap)?;
            let name = rt.interns.get_str(name).to_owned();
            Err(ExcType::attribute_error(owner, &name))
        }
    }
}

fn gs_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (name, owner) = gs_parts(v, &rt.heap)?;
    let text = format!("<attribute '{}' of '{owner}' objects>", rt.interns.get_str(name));
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

pub(crate) const GETSET_OPS: Operations = Operations {
    get: tern(gs_get),
    set: tern(gs_set),
    delete: bin(gs_delete),
    repr: un(gs_repr),
    ..Operations::EMPTY
};

// ---------------------------------------------------------------------------
// Member descriptors
// ---------------------------------------------------------------------------

/// Field reflection over an instance's slot storage.
#[derive(Debug)]
pub struct MemberDescriptor {
    name: StringId,
    owner: Box<str>,
    doc: Option<&'static str>,
    index: usize,
    read_only: bool,
    optional: bool,
}

impl MemberDescriptor {
    #[must_use]
    pub(crate) fn new(
        name: StringId,
        owner: &str,
        doc: Option<&'static str>,
        index: usize,
        read_only: bool,
        optional: bool,
    ) -> Self {
        Self {
            name,
            owner: owner.into(),
            doc,
            index,
            read_only,
            optional,
        }
    }

    #[must_use]
    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }
}

fn member_parts(v: &Value, heap: &Heap) -> RunResult<(StringId, Box<str>, usize, bool, bool)> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Member(m) => Ok((m.name, m.owner.clone(), m.index, m.read_only, m.optional)),
            _ => Err(RunError::internal("member slot on wrong carrier")),
        },
        _ => Err(RunError::internal("member slot on wrong carrier")),
    }
}

fn member_slot_instance(instance: &Value, heap: &Heap) -> RunResult<HeapId> {
    match instance {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::Instance(_)) => Ok(*id),
        _ => Err(ExcType::type_error("member descriptor requires an instance")),
    }
}

fn member_get(descr: &Value, instance: &Value, _owner: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if matches!(instance, Value::None | Value::Undefined) {
        return Ok(descr.clone_with_heap(&rt.heap));
    }
    let (name, owner, index, _, optional) = member_parts(descr, &rt.heap)?;
    let instance_id = member_slot_instance(instance, &rt.heap)?;
    let slot = match rt.heap.get(instance_id) {
        HeapData::Instance(inst) => inst.slot(index).map(|v| v.clone_with_heap(&rt.heap)),
        _ => unreachable!("checked instance carrier above"),
    };
    match slot {
        // An unset slot: optional members read as missing, plain members
        // read as None (delete is "set to None" for them).
        Some(Value::Undefined) | None => {
            if optional {
                let name = rt.interns.get_str(name).to_owned();
                Err(ExcType::attribute_error(owner, &name))
            } else {
                Ok(Value::None)
            }
        }
        Some(value) => Ok(value),
    }
}

fn member_set(descr: &Value, instance: &Value, value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (name, owner, index, read_only, _) = member_parts(descr, &rt.heap)?;
    if read_only {
        let name = rt.interns.get_str(name).to_owned();
        return Err(ExcType::type_error(format!(
            "attribute '{name}' of '{owner}' objects is not writable"
        )));
    }
    let instance_id = member_slot_instance(instance, &rt.heap)?;
    let owned = value.clone_with_heap(&rt.heap);
    let old = match rt.heap.get_mut(instance_id) {
        HeapData::Instance(inst) => inst.set_slot(index, owned),
        _ => unreachable!("checked instance carrier above"),
    };
    old.drop_with_heap(&mut rt.heap);
    Ok(Value::None)
}

/// Member delete: "set to None" unless declared optional, in which case a
/// subsequent get raises `AttributeError`.
fn member_delete(descr: &Value, instance: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (name, owner, index, read_only, optional) = member_parts(descr, &rt.heap)?;
    if read_only {
        let name = rt.interns.get_str(name).to_owned();
        return Err(ExcType::attribute_error(owner, &name));
    }
    let instance_id = member_slot_instance(instance, &rt.heap)?;
    let replacement = if optional { Value::Undefined } else { Value::None };
    let old = match rt.heap.get_mut(instance_id) {
        HeapData::Instance(inst) => inst.set_slot(index, replacement),
        _ => unreachable!("checked instance carrier above"),
    };
    old.drop_with_heap(&mut rt.heap);
    Ok(Value::None)
}

fn member_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (name, owner, ..) = member_parts(v, &rt.heap)?;
    let text = format!("<member '{}' of '{owner}' objects>", rt.interns.get_str(name));
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

pub(crate) const MEMBER_OPS: Operations = Operations {
    get: tern(member_get),
    set: tern(member_set),
    delete: bin(member_delete),
    repr: un(member_repr),
    ..Operations::EMPTY
};

// ---------------------------------------------------------------------------
// classmethod / staticmethod wrappers
// ---------------------------------------------------------------------------

/// Wrapper binding its callable to the owning type on retrieval.
#[derive(Debug)]
pub struct ClassMethod {
    func: Value,
}

impl ClassMethod {
    #[must_use]
    pub fn new(func: Value) -> Self {
        Self { func }
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        self.func.collect_refs(stack);
    }
}

/// Wrapper suppressing receiver binding on retrieval.
#[derive(Debug)]
pub struct StaticMethod {
    func: Value,
}

impl StaticMethod {
    #[must_use]
    pub fn new(func: Value) -> Self {
        Self { func }
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        self.func.collect_refs(stack);
    }
}

fn cm_get(descr: &Value, _instance: &Value, owner: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let func = match descr {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::ClassMethod(cm) => cm.func.clone_with_heap(&rt.heap),
            _ => return Err(RunError::internal("classmethod slot on wrong carrier")),
        },
        _ => return Err(RunError::internal("classmethod slot on wrong carrier")),
    };
    let method = BoundMethod::new(func, owner.clone_with_heap(&rt.heap));
    Ok(Value::Ref(rt.heap.allocate(HeapData::BoundMethod(method))?))
}

fn sm_get(descr: &Value, _instance: &Value, _owner: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match descr {
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::StaticMethod(sm) => Ok(sm.func.clone_with_heap(&rt.heap)),
            _ => Err(RunError::internal("staticmethod slot on wrong carrier")),
        },
        _ => Err(RunError::internal("staticmethod slot on wrong carrier")),
    }
}

pub(crate) const CLASS_METHOD_OPS: Operations = Operations {
    get: tern(cm_get),
    ..Operations::EMPTY
};

pub(crate) const STATIC_METHOD_OPS: Operations = Operations {
    get: tern(sm_get),
    ..Operations::EMPTY
};
