//! Per-carrier operation tables and the dispatch machinery over them.
//!
//! Every (type, carrier) pair has one [`Operations`] record: a struct of
//! nullable operation handles. A handle is either native code or a
//! descriptor found on a user-defined type. A null handle means the
//! operation is absent; depending on the operation the dispatcher then
//! returns the `NotImplemented` sentinel or raises.
//!
//! Built-in carriers publish their tables into a process-wide array of
//! `OnceLock`s, populated lazily on first lookup; writes are serialised by
//! the cell and reads are wait-free after publication. User-defined types carry their
//! table inside their `TypeObject`, fused at class-creation time from the
//! class namespace and the MRO.

use std::sync::OnceLock;

use strum::EnumCount;

use crate::{
    call::call_value,
    exceptions::{ExcType, RunResult},
    heap::{HeapData, HeapId},
    runtime::Runtime,
    types::{self, Type},
    value::{Carrier, Value},
};

/// Native handle for unary operation slots (`repr`, `neg`, `iter`, …).
pub type NativeUnary = fn(&Value, &mut Runtime) -> RunResult<Value>;
/// Native handle for binary operation slots (`add`, `lt`, `getitem`, …).
pub type NativeBinary = fn(&Value, &Value, &mut Runtime) -> RunResult<Value>;
/// Native handle for ternary operation slots (`setitem`, `setattr`, `get`).
pub type NativeTernary = fn(&Value, &Value, &Value, &mut Runtime) -> RunResult<Value>;
/// Native handle for call slots: `(callee, values, names)`.
pub type NativeCall = fn(&Value, &[Value], &[crate::intern::StringId], &mut Runtime) -> RunResult<Value>;
/// Native handle for the `len` slot.
pub type NativeLen = fn(&Value, &Runtime) -> RunResult<usize>;
/// Native handle for the `hash` slot.
pub type NativeHash = fn(&Value, &Runtime) -> RunResult<i64>;

macro_rules! slot_enum {
    ($(#[$doc:meta])* $name:ident, $native:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub enum $name {
            /// Native code.
            Native($native),
            /// A descriptor on a user-defined type, called through the
            /// call protocol.
            Defined(HeapId),
        }

        impl $name {
            /// Whether two handles are the same operation implementation.
            ///
            /// Used by the reflected-dispatch rule to detect overrides.
            #[must_use]
            pub fn same_as(self, other: Self) -> bool {
                match (self, other) {
                    (Self::Native(a), Self::Native(b)) => std::ptr::fn_addr_eq(a, b),
                    (Self::Defined(a), Self::Defined(b)) => a == b,
                    _ => false,
                }
            }
        }
    };
}

slot_enum!(
    /// A unary operation handle.
    UnarySlot,
    NativeUnary
);
slot_enum!(
    /// A binary operation handle.
    BinarySlot,
    NativeBinary
);
slot_enum!(
    /// A ternary operation handle.
    TernarySlot,
    NativeTernary
);
slot_enum!(
    /// A call-shaped operation handle.
    CallSlot,
    NativeCall
);
slot_enum!(
    /// A length handle.
    LenSlot,
    NativeLen
);
slot_enum!(
    /// A hash handle.
    HashSlot,
    NativeHash
);

/// Const helpers used by the per-type `OPS` tables.
pub(crate) const fn un(f: NativeUnary) -> Option<UnarySlot> {
    Some(UnarySlot::Native(f))
}
pub(crate) const fn bin(f: NativeBinary) -> Option<BinarySlot> {
    Some(BinarySlot::Native(f))
}
pub(crate) const fn tern(f: NativeTernary) -> Option<TernarySlot> {
    Some(TernarySlot::Native(f))
}
pub(crate) const fn call_slot(f: NativeCall) -> Option<CallSlot> {
    Some(CallSlot::Native(f))
}
pub(crate) const fn len_slot(f: NativeLen) -> Option<LenSlot> {
    Some(LenSlot::Native(f))
}
pub(crate) const fn hash_slot(f: NativeHash) -> Option<HashSlot> {
    Some(HashSlot::Native(f))
}

/// One Operations record: per-(type, carrier) operation handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Operations {
    pub repr: Option<UnarySlot>,
    pub str_: Option<UnarySlot>,
    pub hash: Option<HashSlot>,
    pub call: Option<CallSlot>,
    pub vectorcall: Option<CallSlot>,
    pub getattribute: Option<BinarySlot>,
    pub getattr: Option<BinarySlot>,
    pub setattr: Option<TernarySlot>,
    pub delattr: Option<BinarySlot>,
    pub lt: Option<BinarySlot>,
    pub le: Option<BinarySlot>,
    pub eq: Option<BinarySlot>,
    pub ne: Option<BinarySlot>,
    pub ge: Option<BinarySlot>,
    pub gt: Option<BinarySlot>,
    pub iter: Option<UnarySlot>,
    pub next: Option<UnarySlot>,
    pub get: Option<TernarySlot>,
    pub set: Option<TernarySlot>,
    pub delete: Option<BinarySlot>,
    pub init: Option<CallSlot>,
    pub new: Option<CallSlot>,
    pub add: Option<BinarySlot>,
    pub radd: Option<BinarySlot>,
    pub sub: Option<BinarySlot>,
    pub rsub: Option<BinarySlot>,
    pub mul: Option<BinarySlot>,
    pub rmul: Option<BinarySlot>,
    pub truediv: Option<BinarySlot>,
    pub rtruediv: Option<BinarySlot>,
    pub floordiv: Option<BinarySlot>,
    pub rfloordiv: Option<BinarySlot>,
    pub mod_: Option<BinarySlot>,
    pub rmod: Option<BinarySlot>,
    pub and_: Option<BinarySlot>,
    pub rand: Option<BinarySlot>,
    pub xor: Option<BinarySlot>,
    pub rxor: Option<BinarySlot>,
    pub or_: Option<BinarySlot>,
    pub ror: Option<BinarySlot>,
    pub neg: Option<UnarySlot>,
    pub abs: Option<UnarySlot>,
    pub bool_: Option<UnarySlot>,
    pub int: Option<UnarySlot>,
    pub float: Option<UnarySlot>,
    pub index: Option<UnarySlot>,
    pub len: Option<LenSlot>,
    pub contains: Option<BinarySlot>,
    pub getitem: Option<BinarySlot>,
    pub setitem: Option<TernarySlot>,
    pub delitem: Option<BinarySlot>,
}

impl Operations {
    /// The all-absent table.
    pub const EMPTY: Self = Self {
        repr: None,
        str_: None,
        hash: None,
        call: None,
        vectorcall: None,
        getattribute: None,
        getattr: None,
        setattr: None,
        delattr: None,
        lt: None,
        le: None,
        eq: None,
        ne: None,
        ge: None,
        gt: None,
        iter: None,
        next: None,
        get: None,
        set: None,
        delete: None,
        init: None,
        new: None,
        add: None,
        radd: None,
        sub: None,
        rsub: None,
        mul: None,
        rmul: None,
        truediv: None,
        rtruediv: None,
        floordiv: None,
        rfloordiv: None,
        mod_: None,
        rmod: None,
        and_: None,
        rand: None,
        xor: None,
        rxor: None,
        or_: None,
        ror: None,
        neg: None,
        abs: None,
        bool_: None,
        int: None,
        float: None,
        index: None,
        len: None,
        contains: None,
        getitem: None,
        setitem: None,
        delitem: None,
    };

    /// Fills every unset slot of `self` from `base`.
    ///
    /// This is the MRO walk of type construction: own slots win, inherited
    /// slots fill the gaps.
    pub fn inherit_from(&mut self, base: &Self) {
        macro_rules! inherit {
            ($($field:ident),* $(,)?) => {
                $(if self.$field.is_none() { self.$field = base.$field; })*
            };
        }
        inherit!(
            repr, str_, hash, call, vectorcall, getattribute, getattr, setattr, delattr, lt, le, eq, ne, ge, gt,
            iter, next, get, set, delete, init, new, add, radd, sub, rsub, mul, rmul, truediv, rtruediv, floordiv,
            rfloordiv, mod_, rmod, and_, rand, xor, rxor, or_, ror, neg, abs, bool_, int, float, index, len,
            contains, getitem, setitem, delitem,
        );
    }
}

/// Process-wide carrier → Operations map for built-in carriers.
///
/// Lazily populated on first lookup; `OnceLock` serialises the write and
/// publication happens-before every subsequent read.
static BUILTIN_OPS: [OnceLock<Operations>; Carrier::COUNT] = [const { OnceLock::new() }; Carrier::COUNT];

/// Returns the Operations table for a built-in carrier.
pub fn ops_for_carrier(carrier: Carrier) -> &'static Operations {
    BUILTIN_OPS[carrier.index()].get_or_init(|| build_builtin_ops(carrier))
}

/// Builds a built-in carrier's table: own slots, then the base chain.
fn build_builtin_ops(carrier: Carrier) -> Operations {
    let mut ops = own_ops(carrier);
    let mut base = base_type_of_carrier(carrier).and_then(Type::builtin_base);
    while let Some(t) = base {
        // All carriers of one type share a table shape; use the canonical.
        ops.inherit_from(&own_ops(t.adopted_carriers()[0]));
        base = t.builtin_base();
    }
    ops
}

/// The Language type owning a built-in carrier.
fn base_type_of_carrier(carrier: Carrier) -> Option<Type> {
    Some(match carrier {
        Carrier::None => Type::NoneType,
        Carrier::Ellipsis => Type::Ellipsis,
        Carrier::NotImplemented => Type::NotImplementedType,
        Carrier::Bool => Type::Bool,
        Carrier::Int64 | Carrier::BigInt => Type::Int,
        Carrier::Float => Type::Float,
        Carrier::InternStr | Carrier::Str => Type::Str,
        Carrier::Bytes => Type::Bytes,
        Carrier::List => Type::List,
        Carrier::Tuple => Type::Tuple,
        Carrier::Dict => Type::Dict,
        Carrier::Iterator => Type::Iterator,
        Carrier::Builtin => Type::BuiltinFunction,
        Carrier::Type => Type::Type,
        Carrier::Instance => Type::Object,
        Carrier::Module => Type::Module,
        Carrier::Function => Type::Function,
        Carrier::BoundMethod => Type::Method,
        Carrier::MethodDescriptor => Type::MethodDescriptor,
        Carrier::GetSetDescriptor => Type::GetSetDescriptor,
        Carrier::MemberDescriptor => Type::MemberDescriptor,
        Carrier::ClassMethod => Type::ClassMethod,
        Carrier::StaticMethod => Type::StaticMethod,
        Carrier::Exception => Type::Exception(ExcType::BaseException),
        Carrier::Code => Type::Code,
    })
}

/// The declared (pre-inheritance) table of a built-in carrier.
fn own_ops(carrier: Carrier) -> Operations {
    match carrier {
        Carrier::None | Carrier::Ellipsis | Carrier::NotImplemented => types::singletons::OPS,
        Carrier::Bool => types::num::BOOL_OPS,
        Carrier::Int64 | Carrier::BigInt => types::num::INT_OPS,
        Carrier::Float => types::num::FLOAT_OPS,
        Carrier::InternStr | Carrier::Str => types::str::OPS,
        Carrier::Bytes => types::bytes::OPS,
        Carrier::List => types::list::OPS,
        Carrier::Tuple => types::tuple::OPS,
        Carrier::Dict => types::dict::OPS,
        Carrier::Iterator => types::iter::OPS,
        Carrier::Builtin => crate::builtins::OPS,
        Carrier::Type => types::class::TYPE_OPS,
        Carrier::Instance => types::class::OBJECT_OPS,
        Carrier::Module => types::module::OPS,
        Carrier::Function => types::function::OPS,
        Carrier::BoundMethod => crate::descriptor::BOUND_METHOD_OPS,
        Carrier::MethodDescriptor => crate::descriptor::METHOD_DESCRIPTOR_OPS,
        Carrier::GetSetDescriptor => crate::descriptor::GETSET_OPS,
        Carrier::MemberDescriptor => crate::descriptor::MEMBER_OPS,
        Carrier::ClassMethod => crate::descriptor::CLASS_METHOD_OPS,
        Carrier::StaticMethod => crate::descriptor::STATIC_METHOD_OPS,
        Carrier::Exception => crate::exceptions::EXCEPTION_OPS,
        Carrier::Code => Operations::EMPTY,
    }
}

/// Returns the Operations table governing `v`.
///
/// User-defined instances dispatch through the table fused into their
/// class; everything else through the published carrier table.
pub fn ops_of<'a>(v: &Value, rt: &'a Runtime) -> &'a Operations {
    let carrier = v.carrier(&rt.heap);
    if carrier == Carrier::Instance {
        if let Value::Ref(id) = v {
            if let HeapData::Instance(instance) = rt.heap.get(*id) {
                if let HeapData::Type(type_obj) = rt.heap.get(instance.class_id()) {
                    return type_obj.ops();
                }
            }
        }
    }
    ops_for_carrier(carrier)
}

// ---------------------------------------------------------------------------
// Slot invocation
// ---------------------------------------------------------------------------

/// Invokes a unary slot. `Defined` handles go through the call protocol
/// with the receiver as the only argument.
pub(crate) fn invoke_unary(slot: UnarySlot, v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match slot {
        UnarySlot::Native(f) => f(v, rt),
        UnarySlot::Defined(descr) => invoke_defined(descr, &[v], rt),
    }
}

/// Invokes a binary slot.
pub(crate) fn invoke_binary(slot: BinarySlot, v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match slot {
        BinarySlot::Native(f) => f(v, w, rt),
        BinarySlot::Defined(descr) => invoke_defined(descr, &[v, w], rt),
    }
}

/// Invokes a ternary slot.
pub(crate) fn invoke_ternary(slot: TernarySlot, a: &Value, b: &Value, c: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match slot {
        TernarySlot::Native(f) => f(a, b, c, rt),
        TernarySlot::Defined(descr) => invoke_defined(descr, &[a, b, c], rt),
    }
}

/// Calls a descriptor unbound: the receiver travels as the first argument.
fn invoke_defined(descr: HeapId, args: &[&Value], rt: &mut Runtime) -> RunResult<Value> {
    let owned: Vec<Value> = args.iter().map(|a| a.clone_with_heap(&rt.heap)).collect();
    let callee = Value::Ref(descr);
    let result = call_value(&callee, &owned, &[], rt);
    for value in owned {
        value.drop_with_heap(&mut rt.heap);
    }
    result
}

// ---------------------------------------------------------------------------
// Binary dispatch with the reflected-operator rule
// ---------------------------------------------------------------------------

/// A binary numeric operation with a reflected form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    And,
    Or,
    Xor,
}

impl BinOp {
    /// The operator symbol for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }

    /// (forward, reflected) slots of this operation in a table.
    fn slots(self, ops: &Operations) -> (Option<BinarySlot>, Option<BinarySlot>) {
        match self {
            Self::Add => (ops.add, ops.radd),
            Self::Sub => (ops.sub, ops.rsub),
            Self::Mul => (ops.mul, ops.rmul),
            Self::TrueDiv => (ops.truediv, ops.rtruediv),
            Self::FloorDiv => (ops.floordiv, ops.rfloordiv),
            Self::Mod => (ops.mod_, ops.rmod),
            Self::And => (ops.and_, ops.rand),
            Self::Or => (ops.or_, ops.ror),
            Self::Xor => (ops.xor, ops.rxor),
        }
    }
}

/// Dispatches `op(v, w)` with the reflected-operator rule:
///
/// 1. If `type(w)` is a proper subtype of `type(v)` and overrides the
///    reflected slot, try `w.rop(v)` first.
/// 2. Otherwise try `v.op(w)`; on the `NotImplemented` sentinel try
///    `w.rop(v)`.
/// 3. If both return `NotImplemented`, raise a `TypeError` naming the
///    operation and both operand types.
pub fn binary_op(op: BinOp, v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (v_slot, v_rslot) = op.slots(ops_of(v, rt));
    let (_, w_rslot) = op.slots(ops_of(w, rt));

    let w_overrides = match (w_rslot, v_rslot) {
        (Some(w_r), Some(v_r)) => !w_r.same_as(v_r),
        (Some(_), None) => true,
        (None, _) => false,
    };
    let mut tried_reflected = false;

    if w_overrides && is_proper_subtype(w, v, rt) {
        if let Some(slot) = w_rslot {
            tried_reflected = true;
            let result = invoke_binary(slot, w, v, rt)?;
            if !matches!(result, Value::NotImplemented) {
                return Ok(result);
            }
            result.drop_with_heap(&mut rt.heap);
        }
    }

    if let Some(slot) = v_slot {
        let result = invoke_binary(slot, v, w, rt)?;
        if !matches!(result, Value::NotImplemented) {
            return Ok(result);
        }
        result.drop_with_heap(&mut rt.heap);
    }

    // When both operands have the same type, the reflected slot is the same
    // implementation again; a failed forward call settles the operation.
    if !tried_reflected && !same_type(v, w, rt) {
        if let Some(slot) = w_rslot {
            let result = invoke_binary(slot, w, v, rt)?;
            if !matches!(result, Value::NotImplemented) {
                return Ok(result);
            }
            result.drop_with_heap(&mut rt.heap);
        }
    }

    let lhs = v.type_name(&rt.heap, &rt.interns).into_owned();
    let rhs = w.type_name(&rt.heap, &rt.interns).into_owned();
    Err(ExcType::binary_type_error(op.symbol(), lhs, rhs))
}

/// Whether `v` and `w` have the same Language type.
fn same_type(v: &Value, w: &Value, rt: &Runtime) -> bool {
    let tv = v.py_type(&rt.heap);
    let tw = w.py_type(&rt.heap);
    if tv != tw {
        return false;
    }
    if tv == Type::Instance {
        let (Value::Ref(a), Value::Ref(b)) = (v, w) else {
            return false;
        };
        let (HeapData::Instance(ia), HeapData::Instance(ib)) = (rt.heap.get(*a), rt.heap.get(*b)) else {
            return false;
        };
        return ia.class_id() == ib.class_id();
    }
    true
}

/// Whether `type(w)` is a proper subtype of `type(v)`.
fn is_proper_subtype(w: &Value, v: &Value, rt: &Runtime) -> bool {
    let tw = w.py_type(&rt.heap);
    let tv = v.py_type(&rt.heap);
    match (tw, tv) {
        (Type::Instance, Type::Instance) => {
            let (Value::Ref(wid), Value::Ref(vid)) = (w, v) else {
                return false;
            };
            let (HeapData::Instance(wi), HeapData::Instance(vi)) = (rt.heap.get(*wid), rt.heap.get(*vid)) else {
                return false;
            };
            let w_class = wi.class_id();
            let v_class = vi.class_id();
            if w_class == v_class {
                return false;
            }
            match rt.heap.get(w_class) {
                HeapData::Type(type_obj) => type_obj.mro().contains(&v_class),
                _ => false,
            }
        }
        (Type::Instance, _) => {
            // A user class may inherit from a built-in type.
            let Value::Ref(wid) = w else { return false };
            let HeapData::Instance(wi) = rt.heap.get(*wid) else {
                return false;
            };
            match rt.heap.get(wi.class_id()) {
                HeapData::Type(type_obj) => type_obj.mro().iter().any(|&id| match rt.heap.get(id) {
                    HeapData::Type(base) => base.builtin() == Some(tv),
                    _ => false,
                }),
                _ => false,
            }
        }
        (_, Type::Instance) => false,
        _ => tw != tv && tw.is_instance_of(tv),
    }
}

// ---------------------------------------------------------------------------
// Comparison dispatch
// ---------------------------------------------------------------------------

/// A rich comparison operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CmpOp {
    /// The operator symbol for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }

    /// The mirror-image operation: (lt, gt), (le, ge), (eq, eq), (ne, ne).
    #[must_use]
    pub fn reflected(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Ge => Self::Le,
            Self::Gt => Self::Lt,
        }
    }

    fn slot(self, ops: &Operations) -> Option<BinarySlot> {
        match self {
            Self::Lt => ops.lt,
            Self::Le => ops.le,
            Self::Eq => ops.eq,
            Self::Ne => ops.ne,
            Self::Ge => ops.ge,
            Self::Gt => ops.gt,
        }
    }
}

/// Dispatches a rich comparison with the reflected rule of `binary_op`,
/// parametrised by the mirror pairs. `Eq`/`Ne` fall back to identity when
/// neither side implements them.
pub fn compare_op(op: CmpOp, v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let v_slot = op.slot(ops_of(v, rt));
    let w_rslot = op.reflected().slot(ops_of(w, rt));
    let v_rslot = op.reflected().slot(ops_of(v, rt));

    let w_overrides = match (w_rslot, v_rslot) {
        (Some(w_r), Some(v_r)) => !w_r.same_as(v_r),
        (Some(_), None) => true,
        (None, _) => false,
    };
    let mut tried_reflected = false;

    if w_overrides && is_proper_subtype(w, v, rt) {
        if let Some(slot) = w_rslot {
            tried_reflected = true;
            let result = invoke_binary(slot, w, v, rt)?;
            if !matches!(result, Value::NotImplemented) {
                return Ok(result);
            }
            result.drop_with_heap(&mut rt.heap);
        }
    }

    if let Some(slot) = v_slot {
        let result = invoke_binary(slot, v, w, rt)?;
        if !matches!(result, Value::NotImplemented) {
            return Ok(result);
        }
        result.drop_with_heap(&mut rt.heap);
    }

    if !tried_reflected && !same_type(v, w, rt) {
        if let Some(slot) = w_rslot {
            let result = invoke_binary(slot, w, v, rt)?;
            if !matches!(result, Value::NotImplemented) {
                return Ok(result);
            }
            result.drop_with_heap(&mut rt.heap);
        }
    }

    match op {
        CmpOp::Eq => Ok(Value::Bool(v.is_(w))),
        CmpOp::Ne => Ok(Value::Bool(!v.is_(w))),
        _ => {
            let lhs = v.py_type(&rt.heap);
            let rhs = w.py_type(&rt.heap);
            Err(ExcType::comparison_type_error(op.symbol(), lhs, rhs))
        }
    }
}

// ---------------------------------------------------------------------------
// Unary and protocol dispatch
// ---------------------------------------------------------------------------

/// A unary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Abs,
}

/// Dispatches a unary operation.
pub fn unary_op(op: UnOp, v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let ops = ops_of(v, rt);
    let (slot, symbol) = match op {
        UnOp::Neg => (ops.neg, "-"),
        UnOp::Abs => (ops.abs, "abs()"),
    };
    match slot {
        Some(slot) => invoke_unary(slot, v, rt),
        None => Err(ExcType::unary_type_error(symbol, v.py_type(&rt.heap))),
    }
}

/// The `repr` protocol. Falls back to an angle-bracket form.
pub fn repr_value(v: &Value, rt: &mut Runtime) -> RunResult<String> {
    if let Some(slot) = ops_of(v, rt).repr {
        let result = invoke_unary(slot, v, rt)?;
        let text = match result.as_either_str(&rt.heap, &rt.interns) {
            Some(s) => s.to_owned(),
            None => {
                let type_name = result.type_name(&rt.heap, &rt.interns).into_owned();
                result.drop_with_heap(&mut rt.heap);
                return Err(ExcType::type_error(format!(
                    "__repr__ returned non-string (type {type_name})"
                )));
            }
        };
        result.drop_with_heap(&mut rt.heap);
        return Ok(text);
    }
    let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
    Ok(format!("<{type_name} object>"))
}

/// The `str` protocol; falls back to `repr`.
pub fn str_value(v: &Value, rt: &mut Runtime) -> RunResult<String> {
    if let Some(s) = v.as_either_str(&rt.heap, &rt.interns) {
        return Ok(s.to_owned());
    }
    if let Some(slot) = ops_of(v, rt).str_ {
        let result = invoke_unary(slot, v, rt)?;
        if let Some(s) = result.as_either_str(&rt.heap, &rt.interns) {
            let text = s.to_owned();
            result.drop_with_heap(&mut rt.heap);
            return Ok(text);
        }
        result.drop_with_heap(&mut rt.heap);
    }
    repr_value(v, rt)
}

/// The truth protocol: the `bool` slot, then the `len` slot, then true.
pub fn truthy(v: &Value, rt: &mut Runtime) -> RunResult<bool> {
    let ops = ops_of(v, rt);
    if let Some(slot) = ops.bool_ {
        let result = invoke_unary(slot, v, rt)?;
        let truth = match result {
            Value::Bool(b) => b,
            other => {
                let type_name = other.type_name(&rt.heap, &rt.interns).into_owned();
                other.drop_with_heap(&mut rt.heap);
                return Err(ExcType::type_error(format!(
                    "__bool__ should return bool, returned {type_name}"
                )));
            }
        };
        return Ok(truth);
    }
    if let Some(slot) = ops.len {
        return Ok(match slot {
            LenSlot::Native(f) => f(v, rt)? != 0,
            LenSlot::Defined(descr) => {
                let result = invoke_defined(descr, &[v], rt)?;
                let n = result.as_index(&rt.heap);
                result.drop_with_heap(&mut rt.heap);
                n.ok_or_else(|| ExcType::type_error("__len__ should return an integer"))? != 0
            }
        });
    }
    Ok(true)
}

/// The `len` protocol.
pub fn len_of(v: &Value, rt: &mut Runtime) -> RunResult<usize> {
    match ops_of(v, rt).len {
        Some(LenSlot::Native(f)) => f(v, rt),
        Some(LenSlot::Defined(descr)) => {
            let result = invoke_defined(descr, &[v], rt)?;
            let n = result.as_index(&rt.heap);
            result.drop_with_heap(&mut rt.heap);
            match n {
                Some(n) if n >= 0 => Ok(usize::try_from(n).expect("checked non-negative")),
                Some(_) => Err(ExcType::type_error("__len__() should return >= 0")),
                None => Err(ExcType::type_error("__len__ should return an integer")),
            }
        }
        None => {
            let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
            Err(ExcType::type_error(format!("object of type '{type_name}' has no len()")))
        }
    }
}

/// The hash protocol. Unhashable types raise `TypeError`.
pub fn hash_value(v: &Value, rt: &mut Runtime) -> RunResult<i64> {
    match ops_of(v, rt).hash {
        Some(HashSlot::Native(f)) => f(v, rt),
        Some(HashSlot::Defined(descr)) => {
            let result = invoke_defined(descr, &[v], rt)?;
            let n = result.as_index(&rt.heap);
            result.drop_with_heap(&mut rt.heap);
            n.ok_or_else(|| ExcType::type_error("__hash__ should return an integer"))
        }
        None => Err(ExcType::type_error_unhashable(v.py_type(&rt.heap))),
    }
}

/// The membership protocol: the `contains` slot, else iterate and compare.
pub fn contains(haystack: &Value, needle: &Value, rt: &mut Runtime) -> RunResult<bool> {
    if let Some(slot) = ops_of(haystack, rt).contains {
        let result = invoke_binary(slot, haystack, needle, rt)?;
        let truth = truthy(&result, rt)?;
        result.drop_with_heap(&mut rt.heap);
        return Ok(truth);
    }
    let iter = iter_value(haystack, rt)?;
    loop {
        match iter_next(&iter, rt) {
            Ok(item) => {
                let found = item.py_eq(needle, &rt.heap, &rt.interns);
                item.drop_with_heap(&mut rt.heap);
                if found {
                    iter.drop_with_heap(&mut rt.heap);
                    return Ok(true);
                }
            }
            Err(err) if err.is_stop_iteration() => {
                iter.drop_with_heap(&mut rt.heap);
                return Ok(false);
            }
            Err(err) => {
                iter.drop_with_heap(&mut rt.heap);
                return Err(err);
            }
        }
    }
}

/// The subscript-read protocol.
pub fn getitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match ops_of(v, rt).getitem {
        Some(slot) => invoke_binary(slot, v, key, rt),
        None => Err(ExcType::type_error_not_sub(v.py_type(&rt.heap))),
    }
}

/// The subscript-write protocol.
pub fn setitem(v: &Value, key: &Value, item: &Value, rt: &mut Runtime) -> RunResult<()> {
    match ops_of(v, rt).setitem {
        Some(slot) => {
            let result = invoke_ternary(slot, v, key, item, rt)?;
            result.drop_with_heap(&mut rt.heap);
            Ok(())
        }
        None => Err(ExcType::type_error_not_sub_assignment(v.py_type(&rt.heap))),
    }
}

/// The subscript-delete protocol.
pub fn delitem(v: &Value, key: &Value, rt: &mut Runtime) -> RunResult<()> {
    match ops_of(v, rt).delitem {
        Some(slot) => {
            let result = invoke_binary(slot, v, key, rt)?;
            result.drop_with_heap(&mut rt.heap);
            Ok(())
        }
        None => {
            let type_name = v.type_name(&rt.heap, &rt.interns).into_owned();
            Err(ExcType::type_error(format!(
                "'{type_name}' object does not support item deletion"
            )))
        }
    }
}

/// The iteration protocol: returns an iterator over `v`.
pub fn iter_value(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match ops_of(v, rt).iter {
        Some(slot) => invoke_unary(slot, v, rt),
        None => Err(ExcType::type_error_not_iterable(
            v.type_name(&rt.heap, &rt.interns).into_owned(),
        )),
    }
}

/// Advances an iterator; exhaustion raises `StopIteration`.
pub fn iter_next(iterator: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match ops_of(iterator, rt).next {
        Some(slot) => invoke_unary(slot, iterator, rt),
        None => {
            let type_name = iterator.type_name(&rt.heap, &rt.interns).into_owned();
            Err(ExcType::type_error(format!("'{type_name}' object is not an iterator")))
        }
    }
}

/// The `index` protocol: losslessly converts to an integer value.
pub fn index_value(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match ops_of(v, rt).index {
        Some(slot) => invoke_unary(slot, v, rt),
        None => Err(ExcType::type_error_not_integer(v.py_type(&rt.heap))),
    }
}
