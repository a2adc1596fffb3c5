//! Language-visible type objects and user-defined classes.
//!
//! A [`TypeObject`] is the full type value: canonical name, bases, C3 MRO,
//! attribute dict, flags, adopted carriers and the Operations table its
//! instances dispatch through. Built-in types get one lazily per runtime
//! from a [`TypeSpec`]; user-defined types are built at runtime from a
//! class namespace.
//!
//! Identity, MRO and the adopted-carrier set are immutable once a type is
//! constructed. The attribute dict is mutable through the guarded
//! `setattr`/`delattr` path below, which keeps the fused Operations slots
//! in sync with the dict for the type's own declarations. Inherited slots
//! are fused at construction; later mutation of a base does not re-fuse
//! subclasses: resolution is a cached handle, not a live search.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    expose::{GetSetDef, MemberDef, MethodDef, expose_type},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StaticStrings, StringId},
    ops::{
        BinarySlot, CallSlot, HashSlot, LenSlot, Operations, TernarySlot, UnarySlot, bin, call_slot, hash_slot,
        invoke_ternary, ops_for_carrier, tern, un,
    },
    resource::{MAX_INHERITANCE_DEPTH, MAX_MRO_LENGTH},
    runtime::Runtime,
    types::{Type, bytes, dict::Dict, list::List, str::Str, tuple::Tuple},
    value::{Carrier, Value},
};

/// Construction-time flags of a type.
#[derive(Debug, Clone, Copy)]
pub struct TypeFlags {
    /// May be subclassed.
    pub basetype: bool,
    /// Calling the type constructs instances.
    pub instantiable: bool,
}

/// The data record used to construct a type.
#[derive(Debug)]
pub struct TypeSpec {
    pub name: &'static str,
    /// Bootstrap token authorising carrier adoption; `None` for
    /// user-defined types.
    pub builtin: Option<Type>,
    pub flags: TypeFlags,
    pub methods: &'static [MethodDef],
    pub getsets: &'static [GetSetDef],
    pub members: &'static [MemberDef],
    pub doc: Option<&'static str>,
}

impl TypeSpec {
    /// The spec of a built-in type.
    #[must_use]
    pub(crate) fn for_builtin(t: Type) -> Self {
        let methods: &'static [MethodDef] = match t {
            Type::Str => crate::types::str::METHODS,
            Type::List => crate::types::list::METHODS,
            Type::Dict => crate::types::dict::METHODS,
            _ => &[],
        };
        Self {
            name: builtin_type_name(t),
            builtin: Some(t),
            flags: TypeFlags {
                basetype: t.basetype(),
                instantiable: t.instantiable(),
            },
            methods,
            getsets: &[],
            members: &[],
            doc: None,
        }
    }
}

fn builtin_type_name(t: Type) -> &'static str {
    match t {
        Type::Type => "type",
        Type::Object => "object",
        Type::NoneType => "NoneType",
        Type::NotImplementedType => "NotImplementedType",
        Type::Ellipsis => "ellipsis",
        Type::Bool => "bool",
        Type::Int => "int",
        Type::Float => "float",
        Type::Str => "str",
        Type::Bytes => "bytes",
        Type::List => "list",
        Type::Tuple => "tuple",
        Type::Dict => "dict",
        Type::Iterator => "iterator",
        Type::Module => "module",
        Type::Function => "function",
        Type::BuiltinFunction => "builtin_function_or_method",
        Type::Method => "method",
        Type::MethodDescriptor => "method_descriptor",
        Type::GetSetDescriptor => "getset_descriptor",
        Type::MemberDescriptor => "member_descriptor",
        Type::StaticMethod => "staticmethod",
        Type::ClassMethod => "classmethod",
        Type::Code => "code",
        Type::Exception(exc) => exc.into(),
        Type::Instance => "instance",
    }
}

/// A live Language type.
#[derive(Debug)]
pub struct TypeObject {
    name: StringId,
    builtin: Option<Type>,
    /// Direct bases; owned references.
    bases: Vec<HeapId>,
    /// C3 linearisation, self first. References owned for `mro[1..]` only
    /// (a self-reference would keep the type alive forever).
    mro: Vec<HeapId>,
    dict: IndexMap<StringId, Value>,
    flags: TypeFlags,
    adopted: SmallVec<[Carrier; 2]>,
    /// Operations for instances of this type, fused at construction.
    ops: Operations,
    /// Slot storage size for member descriptors on instances.
    member_slot_count: usize,
}

impl TypeObject {
    #[must_use]
    pub fn name(&self) -> StringId {
        self.name
    }

    #[must_use]
    pub fn builtin(&self) -> Option<Type> {
        self.builtin
    }

    #[must_use]
    pub fn bases(&self) -> &[HeapId] {
        &self.bases
    }

    /// The MRO, self first, `object` last.
    #[must_use]
    pub fn mro(&self) -> &[HeapId] {
        &self.mro
    }

    #[must_use]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    #[must_use]
    pub fn adopted(&self) -> &[Carrier] {
        &self.adopted
    }

    #[must_use]
    pub fn ops(&self) -> &Operations {
        &self.ops
    }

    #[must_use]
    pub fn dict(&self) -> &IndexMap<StringId, Value> {
        &self.dict
    }

    #[must_use]
    pub fn member_slot_count(&self) -> usize {
        self.member_slot_count
    }

    /// Whether this type is `other` or inherits from it: a linear scan of
    /// the MRO.
    #[must_use]
    pub fn is_subtype_of(&self, self_id: HeapId, other_id: HeapId) -> bool {
        self_id == other_id || self.mro.contains(&other_id)
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        for &base in &self.bases {
            stack.push(base);
        }
        for &entry in self.mro.iter().skip(1) {
            stack.push(entry);
        }
        for value in self.dict.values() {
            value.collect_refs(stack);
        }
    }
}

/// A user-defined class instance.
#[derive(Debug)]
pub struct Instance {
    /// Owned reference to the class `TypeObject`.
    class_id: HeapId,
    attrs: IndexMap<StringId, Value>,
    /// Member-descriptor slot storage; `Undefined` marks unset/deleted
    /// optional members.
    slots: Vec<Value>,
}

impl Instance {
    #[must_use]
    pub fn new(class_id: HeapId, slot_count: usize) -> Self {
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || Value::Undefined);
        Self {
            class_id,
            attrs: IndexMap::new(),
            slots,
        }
    }

    #[must_use]
    pub fn class_id(&self) -> HeapId {
        self.class_id
    }

    #[must_use]
    pub fn attr(&self, name: StringId) -> Option<&Value> {
        self.attrs.get(&name)
    }

    /// Inserts an owned attribute value, returning the replaced value.
    pub fn set_attr(&mut self, name: StringId, value: Value) -> Option<Value> {
        self.attrs.insert(name, value)
    }

    /// Removes an attribute, returning the owned value.
    pub fn remove_attr(&mut self, name: StringId) -> Option<Value> {
        self.attrs.shift_remove(&name)
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Replaces a member slot, returning the old value.
    pub fn set_slot(&mut self, index: usize, value: Value) -> Value {
        std::mem::replace(&mut self.slots[index], value)
    }

    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        stack.push(self.class_id);
        for value in self.attrs.values() {
            value.collect_refs(stack);
        }
        for value in &self.slots {
            value.collect_refs(stack);
        }
    }
}

// ---------------------------------------------------------------------------
// Type construction
// ---------------------------------------------------------------------------

/// The canonical type constructor. Computes the MRO, exposes the
/// declaration tables, fuses the Operations table and publishes the type.
///
/// `bases` are owned references consumed by the new type.
pub(crate) fn from_spec(spec: &TypeSpec, bases: Vec<HeapId>, rt: &mut Runtime) -> RunResult<HeapId> {
    let name = rt.interns.intern(spec.name);

    let adopted: SmallVec<[Carrier; 2]> = match spec.builtin {
        Some(t) => SmallVec::from_slice(t.adopted_carriers()),
        None => SmallVec::from_slice(&[Carrier::Instance]),
    };

    // 1. Allocate the shell so the MRO can contain the type itself.
    let shell = TypeObject {
        name,
        builtin: spec.builtin,
        bases,
        mro: Vec::new(),
        dict: IndexMap::new(),
        flags: spec.flags,
        adopted,
        ops: Operations::EMPTY,
        member_slot_count: 0,
    };
    let self_id = rt.heap.allocate(HeapData::Type(shell))?;

    // 2. C3 linearisation over the bases.
    let base_ids: Vec<HeapId> = match rt.heap.get(self_id) {
        HeapData::Type(t) => t.bases.to_vec(),
        _ => unreachable!("allocated as a type above"),
    };
    let mro = compute_c3_mro(self_id, &base_ids, &rt.heap, &rt.interns)?;
    for &entry in mro.iter().skip(1) {
        rt.heap.inc_ref(entry);
    }

    // 3. Exposure: scan the declaration tables into descriptors.
    let entries = expose_type(spec.name, spec.methods, spec.getsets, spec.members, rt)?;
    let member_slot_count = spec.members.iter().map(|m| m.index + 1).max().unwrap_or(0);

    // 4. The Operations table. Built-in types publish per adopted carrier
    //    through the process-wide map; the canonical table lands here too.
    //    Host-specced types inherit along their MRO like user classes.
    let ops = match spec.builtin {
        Some(t) => *ops_for_carrier(t.adopted_carriers()[0]),
        None => {
            let mut ops = Operations::EMPTY;
            for &entry in mro.iter().skip(1) {
                match rt.heap.get(entry) {
                    HeapData::Type(base) => {
                        let base_ops = match base.builtin {
                            Some(t) => *ops_for_carrier(t.adopted_carriers()[0]),
                            None => base.ops,
                        };
                        ops.inherit_from(&base_ops);
                    }
                    _ => return Err(RunError::internal("non-type in MRO")),
                }
            }
            ops
        }
    };

    match rt.heap.get_mut(self_id) {
        HeapData::Type(t) => {
            t.mro = mro;
            t.ops = ops;
            t.member_slot_count = member_slot_count;
            for (attr_name, value) in entries {
                t.dict.insert(attr_name, value);
            }
        }
        _ => unreachable!("allocated as a type above"),
    }

    if let Some(doc) = spec.doc {
        let doc_value = Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(doc)))?);
        match rt.heap.get_mut(self_id) {
            HeapData::Type(t) => {
                t.dict.insert(StaticStrings::DunderDoc.into(), doc_value);
            }
            _ => unreachable!("allocated as a type above"),
        }
    }

    Ok(self_id)
}

/// Builds a user-defined class from a class-statement namespace.
///
/// Dunder entries in the namespace are fused into the Operations table as
/// `Defined` slots; everything unset inherits along the MRO.
pub(crate) fn build_class(
    name: &str,
    bases: Vec<HeapId>,
    namespace: Vec<(StringId, Value)>,
    rt: &mut Runtime,
) -> RunResult<HeapId> {
    let mut base_error = None;
    for &base in &bases {
        match rt.heap.get(base) {
            HeapData::Type(base_type) if base_type.flags.basetype => {}
            HeapData::Type(base_type) => {
                let base_name = rt.interns.get_str(base_type.name).to_owned();
                base_error = Some(ExcType::type_error(format!(
                    "type '{base_name}' is not an acceptable base type"
                )));
                break;
            }
            _ => {
                base_error = Some(ExcType::type_error("bases must be types"));
                break;
            }
        }
    }
    if let Some(err) = base_error {
        for (_, value) in namespace {
            value.drop_with_heap(&mut rt.heap);
        }
        for base in bases {
            rt.heap.dec_ref(base);
        }
        return Err(err);
    }

    let name_id = rt.interns.intern(name);
    let shell = TypeObject {
        name: name_id,
        builtin: None,
        bases,
        mro: Vec::new(),
        dict: IndexMap::new(),
        flags: TypeFlags {
            basetype: true,
            instantiable: true,
        },
        adopted: SmallVec::from_slice(&[Carrier::Instance]),
        ops: Operations::EMPTY,
        member_slot_count: 0,
    };
    let self_id = rt.heap.allocate(HeapData::Type(shell))?;

    let base_ids: Vec<HeapId> = match rt.heap.get(self_id) {
        HeapData::Type(t) => t.bases.to_vec(),
        _ => unreachable!("allocated as a type above"),
    };
    let base_ids = if base_ids.is_empty() {
        let object_id = rt.type_object(Type::Object)?;
        rt.heap.inc_ref(object_id);
        match rt.heap.get_mut(self_id) {
            HeapData::Type(t) => t.bases.push(object_id),
            _ => unreachable!("allocated as a type above"),
        }
        vec![object_id]
    } else {
        base_ids
    };

    let mro = compute_c3_mro(self_id, &base_ids, &rt.heap, &rt.interns)?;
    for &entry in mro.iter().skip(1) {
        rt.heap.inc_ref(entry);
    }

    // Deduplicate the namespace (last declaration wins) before any of it
    // is fused or published.
    let mut dict: IndexMap<StringId, Value> = IndexMap::with_capacity(namespace.len());
    for (attr_name, value) in namespace {
        if let Some(old) = dict.insert(attr_name, value) {
            old.drop_with_heap(&mut rt.heap);
        }
    }

    // Fuse Operations: own dunders first, then the MRO walk.
    let mut ops = Operations::EMPTY;
    for (attr_name, value) in &dict {
        fill_slot_from_dunder(&mut ops, *attr_name, value);
    }
    for &entry in mro.iter().skip(1) {
        match rt.heap.get(entry) {
            HeapData::Type(base) => {
                let base_ops = match base.builtin {
                    Some(t) => *ops_for_carrier(t.adopted_carriers()[0]),
                    None => base.ops,
                };
                ops.inherit_from(&base_ops);
            }
            _ => return Err(RunError::internal("non-type in MRO")),
        }
    }

    match rt.heap.get_mut(self_id) {
        HeapData::Type(t) => {
            t.mro = mro;
            t.ops = ops;
            t.dict = dict;
        }
        _ => unreachable!("allocated as a type above"),
    }

    Ok(self_id)
}

/// Maps a dunder name in a class namespace onto its Operations slot.
fn fill_slot_from_dunder(ops: &mut Operations, name: StringId, value: &Value) {
    let Value::Ref(id) = value else { return };
    let defined_un = Some(UnarySlot::Defined(*id));
    let defined_bin = Some(BinarySlot::Defined(*id));
    let defined_tern = Some(TernarySlot::Defined(*id));
    let defined_call = Some(CallSlot::Defined(*id));
    let defined_hash = Some(HashSlot::Defined(*id));
    let defined_len = Some(LenSlot::Defined(*id));

    for &(tag, slot_name) in StaticStrings::iter_slotted() {
        if StringId::from(slot_name) != name {
            continue;
        }
        match tag {
            SlotTag::Repr => ops.repr = defined_un,
            SlotTag::Str => ops.str_ = defined_un,
            SlotTag::Hash => ops.hash = defined_hash,
            SlotTag::Call => ops.call = defined_call,
            SlotTag::Getattribute => ops.getattribute = defined_bin,
            SlotTag::Getattr => ops.getattr = defined_bin,
            SlotTag::Setattr => ops.setattr = defined_tern,
            SlotTag::Delattr => ops.delattr = defined_bin,
            SlotTag::Lt => ops.lt = defined_bin,
            SlotTag::Le => ops.le = defined_bin,
            SlotTag::Eq => ops.eq = defined_bin,
            SlotTag::Ne => ops.ne = defined_bin,
            SlotTag::Ge => ops.ge = defined_bin,
            SlotTag::Gt => ops.gt = defined_bin,
            SlotTag::Iter => ops.iter = defined_un,
            SlotTag::Next => ops.next = defined_un,
            SlotTag::Get => ops.get = defined_tern,
            SlotTag::Set => ops.set = defined_tern,
            SlotTag::Delete => ops.delete = defined_bin,
            SlotTag::Init => ops.init = defined_call,
            SlotTag::New => ops.new = defined_call,
            SlotTag::Add => ops.add = defined_bin,
            SlotTag::Radd => ops.radd = defined_bin,
            SlotTag::Sub => ops.sub = defined_bin,
            SlotTag::Rsub => ops.rsub = defined_bin,
            SlotTag::Mul => ops.mul = defined_bin,
            SlotTag::Rmul => ops.rmul = defined_bin,
            SlotTag::Truediv => ops.truediv = defined_bin,
            SlotTag::Rtruediv => ops.rtruediv = defined_bin,
            SlotTag::Floordiv => ops.floordiv = defined_bin,
            SlotTag::Rfloordiv => ops.rfloordiv = defined_bin,
            SlotTag::Mod => ops.mod_ = defined_bin,
            SlotTag::Rmod => ops.rmod = defined_bin,
            SlotTag::And => ops.and_ = defined_bin,
            SlotTag::Rand => ops.rand = defined_bin,
            SlotTag::Or => ops.or_ = defined_bin,
            SlotTag::Ror => ops.ror = defined_bin,
            SlotTag::Xor => ops.xor = defined_bin,
            SlotTag::Rxor => ops.rxor = defined_bin,
            SlotTag::Neg => ops.neg = defined_un,
            SlotTag::Abs => ops.abs = defined_un,
            SlotTag::Bool => ops.bool_ = defined_un,
            SlotTag::Int => ops.int = defined_un,
            SlotTag::Float => ops.float = defined_un,
            SlotTag::Index => ops.index = defined_un,
            SlotTag::Len => ops.len = defined_len,
            SlotTag::Contains => ops.contains = defined_bin,
            SlotTag::Getitem => ops.getitem = defined_bin,
            SlotTag::Setitem => ops.setitem = defined_tern,
            SlotTag::Delitem => ops.delitem = defined_bin,
        }
        return;
    }
}

/// One well-known operation, used to map dunder names to slots.
#[derive(Debug, Clone, Copy)]
enum SlotTag {
    Repr,
    Str,
    Hash,
    Call,
    Getattribute,
    Getattr,
    Setattr,
    Delattr,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Iter,
    Next,
    Get,
    Set,
    Delete,
    Init,
    New,
    Add,
    Radd,
    Sub,
    Rsub,
    Mul,
    Rmul,
    Truediv,
    Rtruediv,
    Floordiv,
    Rfloordiv,
    Mod,
    Rmod,
    And,
    Rand,
    Or,
    Ror,
    Xor,
    Rxor,
    Neg,
    Abs,
    Bool,
    Int,
    Float,
    Index,
    Len,
    Contains,
    Getitem,
    Setitem,
    Delitem,
}

impl StaticStrings {
    /// (slot, dunder name) pairs for every slotted operation.
    fn iter_slotted() -> &'static [(SlotTag, Self)] {
        use SlotTag as T;
        &[
            (T::Repr, Self::DunderRepr),
            (T::Str, Self::DunderStr),
            (T::Hash, Self::DunderHash),
            (T::Call, Self::DunderCall),
            (T::Getattribute, Self::DunderGetattribute),
            (T::Getattr, Self::DunderGetattr),
            (T::Setattr, Self::DunderSetattr),
            (T::Delattr, Self::DunderDelattr),
            (T::Lt, Self::DunderLt),
            (T::Le, Self::DunderLe),
            (T::Eq, Self::DunderEq),
            (T::Ne, Self::DunderNe),
            (T::Ge, Self::DunderGe),
            (T::Gt, Self::DunderGt),
            (T::Iter, Self::DunderIter),
            (T::Next, Self::DunderNext),
            (T::Get, Self::DunderGet),
            (T::Set, Self::DunderSet),
            (T::Delete, Self::DunderDelete),
            (T::Init, Self::DunderInit),
            (T::New, Self::DunderNew),
            (T::Add, Self::DunderAdd),
            (T::Radd, Self::DunderRadd),
            (T::Sub, Self::DunderSub),
            (T::Rsub, Self::DunderRsub),
            (T::Mul, Self::DunderMul),
            (T::Rmul, Self::DunderRmul),
            (T::Truediv, Self::DunderTruediv),
            (T::Rtruediv, Self::DunderRtruediv),
            (T::Floordiv, Self::DunderFloordiv),
            (T::Rfloordiv, Self::DunderRfloordiv),
            (T::Mod, Self::DunderMod),
            (T::Rmod, Self::DunderRmod),
            (T::And, Self::DunderAnd),
            (T::Rand, Self::DunderRand),
            (T::Or, Self::DunderOr),
            (T::Ror, Self::DunderRor),
            (T::Xor, Self::DunderXor),
            (T::Rxor, Self::DunderRxor),
            (T::Neg, Self::DunderNeg),
            (T::Abs, Self::DunderAbs),
            (T::Bool, Self::DunderBool),
            (T::Int, Self::DunderInt),
            (T::Float, Self::DunderFloat),
            (T::Index, Self::DunderIndex),
            (T::Len, Self::DunderLen),
            (T::Contains, Self::DunderContains),
            (T::Getitem, Self::DunderGetitem),
            (T::Setitem, Self::DunderSetitem),
            (T::Delitem, Self::DunderDelitem),
        ]
    }
}

// ---------------------------------------------------------------------------
// C3 linearisation
// ---------------------------------------------------------------------------

/// Computes the C3 linearisation (MRO) for a type with the given bases.
///
/// Merges the MROs of all bases with the list of bases itself; a head is
/// taken only when it appears in no tail. An empty result set with
/// non-empty inputs means the hierarchy has no consistent ordering.
pub(crate) fn compute_c3_mro(
    self_id: HeapId,
    bases: &[HeapId],
    heap: &Heap,
    interns: &Interns,
) -> RunResult<Vec<HeapId>> {
    if bases.is_empty() {
        return Ok(vec![self_id]);
    }
    if bases.contains(&self_id) {
        return Err(ExcType::type_error("a class cannot inherit from itself"));
    }

    let mut linearizations: Vec<Vec<HeapId>> = Vec::with_capacity(bases.len() + 1);
    for &base_id in bases {
        match heap.get(base_id) {
            HeapData::Type(base) => linearizations.push(base.mro.to_vec()),
            _ => return Err(ExcType::type_error("bases must be types")),
        }
    }
    for lin in &linearizations {
        if lin.len() > MAX_INHERITANCE_DEPTH {
            return Err(ExcType::type_error(format!(
                "inheritance chain too deep (maximum depth {MAX_INHERITANCE_DEPTH})"
            )));
        }
    }
    linearizations.push(bases.to_vec());

    let mut result = vec![self_id];
    loop {
        linearizations.retain(|l| !l.is_empty());
        if linearizations.is_empty() {
            break;
        }

        // A good head appears in no tail.
        let mut found = None;
        for lin in &linearizations {
            let candidate = lin[0];
            let in_tail = linearizations.iter().any(|other| other[1..].contains(&candidate));
            if !in_tail {
                found = Some(candidate);
                break;
            }
        }

        let Some(next) = found else {
            let base_names: Vec<String> = bases
                .iter()
                .map(|&id| match heap.get(id) {
                    HeapData::Type(base) => interns.get_str(base.name).to_owned(),
                    _ => "?".to_owned(),
                })
                .collect();
            return Err(ExcType::type_error(format!(
                "Cannot create a consistent method resolution order (MRO) for bases {}",
                base_names.join(", ")
            )));
        };
        result.push(next);
        for lin in &mut linearizations {
            if !lin.is_empty() && lin[0] == next {
                lin.remove(0);
            }
        }

        if result.len() > MAX_MRO_LENGTH {
            return Err(ExcType::type_error("MRO exceeds maximum length"));
        }
    }

    Ok(result)
}

// ---------------------------------------------------------------------------
// Attribute lookup helpers
// ---------------------------------------------------------------------------

/// Looks up an attribute along a type's MRO, returning an owned value.
pub(crate) fn mro_lookup(type_id: HeapId, name: StringId, heap: &Heap) -> Option<Value> {
    let HeapData::Type(type_obj) = heap.get(type_id) else {
        return None;
    };
    for &entry in &type_obj.mro {
        if let HeapData::Type(member) = heap.get(entry) {
            if let Some(value) = member.dict.get(&name) {
                return Some(value.clone_with_heap(heap));
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Operations for type objects (carrier Type)
// ---------------------------------------------------------------------------

fn expect_type_id(v: &Value, heap: &Heap) -> RunResult<HeapId> {
    match v {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::Type(_)) => Ok(*id),
        _ => Err(RunError::internal("type slot on non-type carrier")),
    }
}

fn type_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_type_id(v, &rt.heap)?;
    let text = match rt.heap.get(id) {
        HeapData::Type(t) => format!("<class '{}'>", rt.interns.get_str(t.name)),
        _ => unreachable!("checked type carrier above"),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

fn type_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    crate::types::tuple::hash_immutable(v, &rt.heap, &rt.interns)
}

fn type_eq(v: &Value, w: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    Ok(Value::Bool(v.is_(w)))
}

/// `type(...)` and user/builtin constructors.
fn type_call(callee: &Value, args: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_type_id(callee, &rt.heap)?;
    let (builtin, instantiable, name, slot_count) = match rt.heap.get(id) {
        HeapData::Type(t) => (
            t.builtin,
            t.flags.instantiable,
            rt.interns.get_str(t.name).to_owned(),
            t.member_slot_count,
        ),
        _ => unreachable!("checked type carrier above"),
    };

    // `type(x)`: the one-argument form reports the type of its argument.
    if builtin == Some(Type::Type) && args.len() == 1 && names.is_empty() {
        return rt.type_value_of(&args[0]);
    }

    if !instantiable {
        return Err(SimpleException::new_msg(ExcType::TypeError, format!("cannot create '{name}' instances")).into());
    }

    if let Some(t) = builtin {
        return construct_builtin(t, args, names, rt);
    }

    // User-defined class: allocate the instance, then run `__init__`.
    rt.heap.inc_ref(id);
    let instance = Instance::new(id, slot_count);
    let instance_id = rt.heap.allocate(HeapData::Instance(instance))?;
    let instance_value = Value::Ref(instance_id);

    let init_slot = match rt.heap.get(id) {
        HeapData::Type(t) => t.ops.init,
        _ => unreachable!("checked type carrier above"),
    };
    if let Some(CallSlot::Defined(init_id)) = init_slot {
        let mut combined: Vec<Value> = Vec::with_capacity(args.len() + 1);
        combined.push(instance_value.clone_with_heap(&rt.heap));
        for arg in args {
            combined.push(arg.clone_with_heap(&rt.heap));
        }
        let init_callee = Value::Ref(init_id);
        let result = crate::call::call_value(&init_callee, &combined, names, rt);
        for value in combined {
            value.drop_with_heap(&mut rt.heap);
        }
        match result {
            Ok(out) => out.drop_with_heap(&mut rt.heap),
            Err(err) => {
                instance_value.drop_with_heap(&mut rt.heap);
                return Err(err);
            }
        }
    } else if !args.is_empty() {
        instance_value.drop_with_heap(&mut rt.heap);
        return Err(ExcType::type_error(format!("{name}() takes no arguments")));
    }

    Ok(instance_value)
}

/// Constructors for the built-in types.
fn construct_builtin(t: Type, args: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<Value> {
    if !names.is_empty() {
        return Err(SimpleException::new_msg(
            ExcType::TypeError,
            format!("{}() takes no keyword arguments", builtin_type_name(t)),
        )
        .into());
    }
    match t {
        Type::Object => {
            if !args.is_empty() {
                return Err(ExcType::type_error_no_args("object", args.len()));
            }
            let object_type = rt.type_object(Type::Object)?;
            rt.heap.inc_ref(object_type);
            let instance = Instance::new(object_type, 0);
            Ok(Value::Ref(rt.heap.allocate(HeapData::Instance(instance))?))
        }
        Type::Bool => match args {
            [] => Ok(Value::Bool(false)),
            [v] => Ok(Value::Bool(crate::ops::truthy(v, rt)?)),
            _ => Err(ExcType::type_error_at_most("bool", 1, args.len())),
        },
        Type::Int => match args {
            [] => Ok(Value::Int(0)),
            [v] => crate::ops::index_value(v, rt).or_else(|_| {
                let type_name = v.py_type(&rt.heap);
                match crate::ops::ops_of(v, rt).int {
                    Some(slot) => crate::ops::invoke_unary(slot, v, rt),
                    None => Err(ExcType::type_error(format!(
                        "int() argument must be a string, a bytes-like object or a real number, not '{type_name}'"
                    ))),
                }
            }),
            _ => Err(ExcType::type_error_at_most("int", 2, args.len())),
        },
        Type::Float => match args {
            [] => Ok(Value::Float(0.0)),
            [v] => match crate::ops::ops_of(v, rt).float {
                Some(slot) => crate::ops::invoke_unary(slot, v, rt),
                None => {
                    let type_name = v.py_type(&rt.heap);
                    Err(ExcType::type_error(format!(
                        "float() argument must be a string or a real number, not '{type_name}'"
                    )))
                }
            },
            _ => Err(ExcType::type_error_at_most("float", 1, args.len())),
        },
        Type::Str => match args {
            [] => Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from("")))?)),
            [v] => {
                let text = crate::ops::str_value(v, rt)?;
                Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
            }
            _ => Err(ExcType::type_error_at_most("str", 1, args.len())),
        },
        Type::Bytes => match args {
            [] => Ok(Value::Ref(rt.heap.allocate(HeapData::Bytes(bytes::Bytes::new(Vec::new())))?)),
            [v] => bytes::bytes_from_value(v, rt),
            _ => Err(ExcType::type_error_at_most("bytes", 1, args.len())),
        },
        Type::List => match args {
            [] => Ok(Value::Ref(rt.heap.allocate(HeapData::List(List::default()))?)),
            [v] => {
                let items = collect_iterable(v, rt)?;
                Ok(Value::Ref(rt.heap.allocate(HeapData::List(List::new(items)))?))
            }
            _ => Err(ExcType::type_error_at_most("list", 1, args.len())),
        },
        Type::Tuple => match args {
            [] => Ok(Value::Ref(rt.heap.allocate(HeapData::Tuple(Tuple::new(Vec::new())))?)),
            [v] => {
                let items = collect_iterable(v, rt)?;
                Ok(Value::Ref(rt.heap.allocate(HeapData::Tuple(Tuple::new(items)))?))
            }
            _ => Err(ExcType::type_error_at_most("tuple", 1, args.len())),
        },
        Type::Dict => match args {
            [] => Ok(Value::Ref(rt.heap.allocate(HeapData::Dict(Dict::new()))?)),
            _ => Err(ExcType::type_error_at_most("dict", 0, args.len())),
        },
        Type::StaticMethod => match args {
            [func] => {
                let wrapper = crate::descriptor::StaticMethod::new(func.clone_with_heap(&rt.heap));
                Ok(Value::Ref(rt.heap.allocate(HeapData::StaticMethod(wrapper))?))
            }
            _ => Err(ExcType::type_error_arg_count("staticmethod", 1, args.len())),
        },
        Type::ClassMethod => match args {
            [func] => {
                let wrapper = crate::descriptor::ClassMethod::new(func.clone_with_heap(&rt.heap));
                Ok(Value::Ref(rt.heap.allocate(HeapData::ClassMethod(wrapper))?))
            }
            _ => Err(ExcType::type_error_arg_count("classmethod", 1, args.len())),
        },
        Type::Exception(exc) => crate::builtins::construct_exception(exc, args, rt),
        _ => Err(SimpleException::new_msg(
            ExcType::TypeError,
            format!("cannot create '{}' instances", builtin_type_name(t)),
        )
        .into()),
    }
}

/// Drains an iterable into an owned vector through the iteration protocol.
pub(crate) fn collect_iterable(v: &Value, rt: &mut Runtime) -> RunResult<Vec<Value>> {
    let iterator = crate::ops::iter_value(v, rt)?;
    let mut items = Vec::new();
    loop {
        match crate::ops::iter_next(&iterator, rt) {
            Ok(item) => items.push(item),
            Err(err) if err.is_stop_iteration() => break,
            Err(err) => {
                for item in items {
                    item.drop_with_heap(&mut rt.heap);
                }
                iterator.drop_with_heap(&mut rt.heap);
                return Err(err);
            }
        }
    }
    iterator.drop_with_heap(&mut rt.heap);
    Ok(items)
}

/// Attribute access on a type object: the type dict along the MRO, with
/// descriptor retrieval (unbound for methods, class-bound for
/// classmethods).
fn type_getattribute(v: &Value, name_value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_type_id(v, &rt.heap)?;
    let Some(name) = name_value.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("attribute name must be string"));
    };
    let name_owned = name.to_owned();
    let name_id = rt.interns.intern(&name_owned);

    // Special attributes first.
    if name_id == StringId::from(StaticStrings::DunderName) {
        let text = match rt.heap.get(id) {
            HeapData::Type(t) => rt.interns.get_str(t.name).to_owned(),
            _ => unreachable!("checked type carrier above"),
        };
        return Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?));
    }
    if name_id == StringId::from(StaticStrings::DunderMro) {
        let mro = match rt.heap.get(id) {
            HeapData::Type(t) => t.mro.to_vec(),
            _ => unreachable!("checked type carrier above"),
        };
        let values: Vec<Value> = mro
            .into_iter()
            .map(|entry| {
                rt.heap.inc_ref(entry);
                Value::Ref(entry)
            })
            .collect();
        return crate::types::tuple::allocate_tuple(values, &mut rt.heap);
    }
    if name_id == StringId::from(StaticStrings::DunderBases) {
        let bases = match rt.heap.get(id) {
            HeapData::Type(t) => t.bases.to_vec(),
            _ => unreachable!("checked type carrier above"),
        };
        let values: Vec<Value> = bases
            .into_iter()
            .map(|entry| {
                rt.heap.inc_ref(entry);
                Value::Ref(entry)
            })
            .collect();
        return crate::types::tuple::allocate_tuple(values, &mut rt.heap);
    }

    let Some(attr) = mro_lookup(id, name_id, &rt.heap) else {
        let type_name = match rt.heap.get(id) {
            HeapData::Type(t) => rt.interns.get_str(t.name).to_owned(),
            _ => unreachable!("checked type carrier above"),
        };
        let attr_name = rt.interns.get_str(name_id).to_owned();
        return Err(SimpleException::new_msg(
            ExcType::AttributeError,
            format!("type object '{type_name}' has no attribute '{attr_name}'"),
        )
        .into());
    };

    // Unbound retrieval: descriptors see no instance, only the owner.
    let get_slot = crate::ops::ops_of(&attr, rt).get;
    if let Some(slot) = get_slot {
        let result = invoke_ternary(slot, &attr, &Value::None, v, rt);
        attr.drop_with_heap(&mut rt.heap);
        return result;
    }
    Ok(attr)
}

/// Guarded mutation of a type's attribute dict: the dict entry and the
/// fused slot for the type's own declaration move together.
fn type_setattr(v: &Value, name_value: &Value, value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_type_id(v, &rt.heap)?;
    let Some(name) = name_value.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("attribute name must be string"));
    };
    let name_owned = name.to_owned();
    let name_id = rt.interns.intern(&name_owned);
    let owned = value.clone_with_heap(&rt.heap);
    let old = match rt.heap.get_mut(id) {
        HeapData::Type(t) => {
            let old = t.dict.insert(name_id, owned);
            if let Some(new_ref) = value.ref_id() {
                let probe = Value::Ref(new_ref);
                fill_slot_from_dunder(&mut t.ops, name_id, &probe);
            }
            old
        }
        _ => unreachable!("checked type carrier above"),
    };
    if let Some(old) = old {
        old.drop_with_heap(&mut rt.heap);
    }
    Ok(Value::None)
}

fn type_delattr(v: &Value, name_value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_type_id(v, &rt.heap)?;
    let Some(name) = name_value.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("attribute name must be string"));
    };
    let name_owned = name.to_owned();
    let name_id = rt.interns.intern(&name_owned);
    let removed = match rt.heap.get_mut(id) {
        HeapData::Type(t) => {
            let removed = t.dict.shift_remove(&name_id);
            if removed.is_some() {
                clear_slot_for_dunder(&mut t.ops, name_id);
            }
            removed
        }
        _ => unreachable!("checked type carrier above"),
    };
    match removed {
        Some(old) => {
            old.drop_with_heap(&mut rt.heap);
            Ok(Value::None)
        }
        None => {
            let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
            Err(ExcType::attribute_error(type_name, &name_owned))
        }
    }
}

/// Clears the Operations slot matching a deleted dunder entry.
fn clear_slot_for_dunder(ops: &mut Operations, name: StringId) {
    for &(tag, slot_name) in StaticStrings::iter_slotted() {
        if StringId::from(slot_name) != name {
            continue;
        }
        match tag {
            SlotTag::Repr => ops.repr = None,
            SlotTag::Str => ops.str_ = None,
            SlotTag::Hash => ops.hash = None,
            SlotTag::Call => ops.call = None,
            SlotTag::Getattribute => ops.getattribute = None,
            SlotTag::Getattr => ops.getattr = None,
            SlotTag::Setattr => ops.setattr = None,
            SlotTag::Delattr => ops.delattr = None,
            SlotTag::Lt => ops.lt = None,
            SlotTag::Le => ops.le = None,
            SlotTag::Eq => ops.eq = None,
            SlotTag::Ne => ops.ne = None,
            SlotTag::Ge => ops.ge = None,
            SlotTag::Gt => ops.gt = None,
            SlotTag::Iter => ops.iter = None,
            SlotTag::Next => ops.next = None,
            SlotTag::Get => ops.get = None,
            SlotTag::Set => ops.set = None,
            SlotTag::Delete => ops.delete = None,
            SlotTag::Init => ops.init = None,
            SlotTag::New => ops.new = None,
            SlotTag::Add => ops.add = None,
            SlotTag::Radd => ops.radd = None,
            SlotTag::Sub => ops.sub = None,
            SlotTag::Rsub => ops.rsub = None,
            SlotTag::Mul => ops.mul = None,
            SlotTag::Rmul => ops.rmul = None,
            SlotTag::Truediv => ops.truediv = None,
            SlotTag::Rtruediv => ops.rtruediv = None,
            SlotTag::Floordiv => ops.floordiv = None,
            SlotTag::Rfloordiv => ops.rfloordiv = None,
            SlotTag::Mod => ops.mod_ = None,
            SlotTag::Rmod => ops.rmod = None,
            SlotTag::And => ops.and_ = None,
            SlotTag::Rand => ops.rand = None,
            SlotTag::Or => ops.or_ = None,
            SlotTag::Ror => ops.ror = None,
            SlotTag::Xor => ops.xor = None,
            SlotTag::Rxor => ops.rxor = None,
            SlotTag::Neg => ops.neg = None,
            SlotTag::Abs => ops.abs = None,
            SlotTag::Bool => ops.bool_ = None,
            SlotTag::Int => ops.int = None,
            SlotTag::Float => ops.float = None,
            SlotTag::Index => ops.index = None,
            SlotTag::Len => ops.len = None,
            SlotTag::Contains => ops.contains = None,
            SlotTag::Getitem => ops.getitem = None,
            SlotTag::Setitem => ops.setitem = None,
            SlotTag::Delitem => ops.delitem = None,
        }
        return;
    }
}

pub(crate) const TYPE_OPS: Operations = Operations {
    call: call_slot(type_call),
    repr: un(type_repr),
    hash: hash_slot(type_hash),
    eq: bin(type_eq),
    getattribute: bin(type_getattribute),
    setattr: tern(type_setattr),
    delattr: bin(type_delattr),
    ..Operations::EMPTY
};

// ---------------------------------------------------------------------------
// Operations for user-defined instances (carrier Instance)
// ---------------------------------------------------------------------------

fn expect_instance_id(v: &Value, heap: &Heap) -> RunResult<HeapId> {
    match v {
        Value::Ref(id) if matches!(heap.get(*id), HeapData::Instance(_)) => Ok(*id),
        _ => Err(RunError::internal("instance slot on non-instance carrier")),
    }
}

fn instance_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
    let text = format!("<{type_name} object>");
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::from(text)))?))
}

fn instance_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    crate::types::tuple::hash_immutable(v, &rt.heap, &rt.interns)
}

/// Instance attribute access: class data descriptors first, then the
/// instance dict, then class attributes (with descriptor retrieval), then
/// the `getattr` fallback slot.
fn instance_getattribute(v: &Value, name_value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_instance_id(v, &rt.heap)?;
    let Some(name) = name_value.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("attribute name must be string"));
    };
    let name_owned = name.to_owned();
    let name_id = rt.interns.intern(&name_owned);

    let class_id = match rt.heap.get(id) {
        HeapData::Instance(instance) => instance.class_id,
        _ => unreachable!("checked instance carrier above"),
    };

    let class_attr = mro_lookup(class_id, name_id, &rt.heap);
    let owner_value = Value::Ref(class_id);

    // Data descriptors shadow the instance dict.
    let mut data_get = None;
    if let Some(attr) = &class_attr {
        let attr_ops = crate::ops::ops_of(attr, rt);
        if attr_ops.set.is_some() {
            data_get = attr_ops.get;
        }
    }
    if let Some(get) = data_get {
        let attr = class_attr.expect("data descriptor implies class attribute");
        let result = invoke_ternary(get, &attr, v, &owner_value, rt);
        attr.drop_with_heap(&mut rt.heap);
        return result;
    }

    let instance_attr = match rt.heap.get(id) {
        HeapData::Instance(instance) => instance.attr(name_id).map(|value| value.clone_with_heap(&rt.heap)),
        _ => unreachable!("checked instance carrier above"),
    };
    if let Some(value) = instance_attr {
        if let Some(attr) = class_attr {
            attr.drop_with_heap(&mut rt.heap);
        }
        return Ok(value);
    }

    if let Some(attr) = class_attr {
        let get_slot = crate::ops::ops_of(&attr, rt).get;
        if let Some(slot) = get_slot {
            let result = invoke_ternary(slot, &attr, v, &owner_value, rt);
            attr.drop_with_heap(&mut rt.heap);
            return result;
        }
        return Ok(attr);
    }

    // The optional `getattr` fallback slot.
    let fallback = crate::ops::ops_of(v, rt).getattr;
    if let Some(slot) = fallback {
        return crate::ops::invoke_binary(slot, v, name_value, rt);
    }

    let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
    Err(ExcType::attribute_error(type_name, rt.interns.get_str(name_id)))
}

fn instance_setattr(v: &Value, name_value: &Value, value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_instance_id(v, &rt.heap)?;
    let Some(name) = name_value.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("attribute name must be string"));
    };
    let name_owned = name.to_owned();
    let name_id = rt.interns.intern(&name_owned);

    let class_id = match rt.heap.get(id) {
        HeapData::Instance(instance) => instance.class_id,
        _ => unreachable!("checked instance carrier above"),
    };

    // A class data descriptor with a `set` slot intercepts assignment.
    if let Some(attr) = mro_lookup(class_id, name_id, &rt.heap) {
        let set_slot = crate::ops::ops_of(&attr, rt).set;
        if let Some(slot) = set_slot {
            let result = invoke_ternary(slot, &attr, v, value, rt);
            attr.drop_with_heap(&mut rt.heap);
            result?.drop_with_heap(&mut rt.heap);
            return Ok(Value::None);
        }
        attr.drop_with_heap(&mut rt.heap);
    }

    let owned = value.clone_with_heap(&rt.heap);
    let old = match rt.heap.get_mut(id) {
        HeapData::Instance(instance) => instance.set_attr(name_id, owned),
        _ => unreachable!("checked instance carrier above"),
    };
    if let Some(old) = old {
        old.drop_with_heap(&mut rt.heap);
    }
    Ok(Value::None)
}

fn instance_delattr(v: &Value, name_value: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let id = expect_instance_id(v, &rt.heap)?;
    let Some(name) = name_value.as_either_str(&rt.heap, &rt.interns) else {
        return Err(ExcType::type_error("attribute name must be string"));
    };
    let name_owned = name.to_owned();
    let name_id = rt.interns.intern(&name_owned);

    let class_id = match rt.heap.get(id) {
        HeapData::Instance(instance) => instance.class_id,
        _ => unreachable!("checked instance carrier above"),
    };
    if let Some(attr) = mro_lookup(class_id, name_id, &rt.heap) {
        let delete_slot = crate::ops::ops_of(&attr, rt).delete;
        if let Some(slot) = delete_slot {
            let result = crate::ops::invoke_binary(slot, &attr, v, rt);
            attr.drop_with_heap(&mut rt.heap);
            result?.drop_with_heap(&mut rt.heap);
            return Ok(Value::None);
        }
        attr.drop_with_heap(&mut rt.heap);
    }

    let removed = match rt.heap.get_mut(id) {
        HeapData::Instance(instance) => instance.remove_attr(name_id),
        _ => unreachable!("checked instance carrier above"),
    };
    match removed {
        Some(old) => {
            old.drop_with_heap(&mut rt.heap);
            Ok(Value::None)
        }
        None => {
            let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
            Err(ExcType::attribute_error(type_name, &name_owned))
        }
    }
}

pub(crate) const OBJECT_OPS: Operations = Operations {
    repr: un(instance_repr),
    hash: hash_slot(instance_hash),
    getattribute: bin(instance_getattribute),
    setattr: tern(instance_setattr),
    delattr: bin(instance_delattr),
    ..Operations::EMPTY
};
