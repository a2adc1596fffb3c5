//! Primary value type representing Language objects at runtime.
//!
//! Small immediate values (ints, bools, floats, the singletons) are stored
//! inline; everything else lives in the arena heap behind `Ref(HeapId)`.
//!
//! NOTE: `Clone` is intentionally NOT derived. Use `clone_with_heap()` so
//! reference counts stay correct; a bare clone of a `Ref` would alias the
//! slot without accounting for it.

use std::borrow::Cow;

use num_traits::Zero;
use strum::EnumCount;

use crate::{
    builtins::Builtins,
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    types::Type,
};

/// A Language value.
#[derive(Debug)]
pub enum Value {
    /// Placeholder for an unbound slot. Never visible to Language code.
    Undefined,
    /// The `None` singleton.
    None,
    /// The `Ellipsis` singleton.
    Ellipsis,
    /// The `NotImplemented` sentinel.
    ///
    /// Returned by binary operation slots to signal that the operation is
    /// not supported for the given operand types; the dispatcher then tries
    /// the reflected operation on the other operand. A value, never an
    /// error.
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// An interned string. Content lives in the `Interns` table.
    InternString(StringId),
    /// A builtin function, type constructor or exception type.
    Builtin(Builtins),
    /// A heap-allocated value.
    Ref(HeapId),
}

/// The native in-memory shape of a value.
///
/// One Language type may adopt several carriers: `int` is carried by both
/// `Int64` and `BigInt`, `str` by `InternStr` and `Str`. Dispatch goes
/// carrier → Operations in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount)]
pub enum Carrier {
    None,
    Ellipsis,
    NotImplemented,
    Bool,
    Int64,
    Float,
    InternStr,
    Builtin,
    BigInt,
    Str,
    Bytes,
    List,
    Tuple,
    Dict,
    Iterator,
    Type,
    Instance,
    Module,
    Function,
    BoundMethod,
    MethodDescriptor,
    GetSetDescriptor,
    MemberDescriptor,
    ClassMethod,
    StaticMethod,
    Exception,
    Code,
}

impl Carrier {
    /// Index into the carrier → Operations table.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Value {
    /// The Language type of this value. O(1).
    #[must_use]
    pub fn py_type(&self, heap: &Heap) -> Type {
        match self {
            Self::Undefined => unreachable!("cannot get type of undefined value"),
            Self::None => Type::NoneType,
            Self::Ellipsis => Type::Ellipsis,
            Self::NotImplemented => Type::NotImplementedType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::InternString(_) => Type::Str,
            Self::Builtin(b) => b.py_type(),
            Self::Ref(id) => heap.get(*id).py_type(),
        }
    }

    /// The native carrier of this value. O(1).
    #[must_use]
    pub fn carrier(&self, heap: &Heap) -> Carrier {
        match self {
            Self::Undefined => unreachable!("cannot get carrier of undefined value"),
            Self::None => Carrier::None,
            Self::Ellipsis => Carrier::Ellipsis,
            Self::NotImplemented => Carrier::NotImplemented,
            Self::Bool(_) => Carrier::Bool,
            Self::Int(_) => Carrier::Int64,
            Self::Float(_) => Carrier::Float,
            Self::InternString(_) => Carrier::InternStr,
            Self::Builtin(_) => Carrier::Builtin,
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) => Carrier::Str,
                HeapData::Bytes(_) => Carrier::Bytes,
                HeapData::LongInt(_) => Carrier::BigInt,
                HeapData::List(_) => Carrier::List,
                HeapData::Tuple(_) => Carrier::Tuple,
                HeapData::Dict(_) => Carrier::Dict,
                HeapData::Iter(_) => Carrier::Iterator,
                HeapData::Type(_) => Carrier::Type,
                HeapData::Instance(_) => Carrier::Instance,
                HeapData::Module(_) => Carrier::Module,
                HeapData::Function(_) => Carrier::Function,
                HeapData::BoundMethod(_) => Carrier::BoundMethod,
                HeapData::MethodDescriptor(_) => Carrier::MethodDescriptor,
                HeapData::GetSet(_) => Carrier::GetSetDescriptor,
                HeapData::Member(_) => Carrier::MemberDescriptor,
                HeapData::ClassMethod(_) => Carrier::ClassMethod,
                HeapData::StaticMethod(_) => Carrier::StaticMethod,
                HeapData::Exception(_) => Carrier::Exception,
                HeapData::Code(_) => Carrier::Code,
                HeapData::Taken => unreachable!("taken heap slot observed"),
            },
        }
    }

    /// The heap id if this is a `Ref`.
    #[inline]
    #[must_use]
    pub fn ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Clones this value, incrementing the reference count of heap values.
    #[must_use]
    pub fn clone_with_heap(&self, heap: &Heap) -> Self {
        match self {
            Self::Undefined => Self::Undefined,
            Self::None => Self::None,
            Self::Ellipsis => Self::Ellipsis,
            Self::NotImplemented => Self::NotImplemented,
            Self::Bool(b) => Self::Bool(*b),
            Self::Int(i) => Self::Int(*i),
            Self::Float(f) => Self::Float(*f),
            Self::InternString(id) => Self::InternString(*id),
            Self::Builtin(b) => Self::Builtin(*b),
            Self::Ref(id) => {
                heap.inc_ref(*id);
                Self::Ref(*id)
            }
        }
    }

    /// Drops this value, decrementing the reference count of heap values.
    pub fn drop_with_heap(self, heap: &mut Heap) {
        if let Self::Ref(id) = self {
            heap.dec_ref(id);
        }
    }

    /// Pushes the heap id of a `Ref` onto a release stack.
    pub(crate) fn collect_refs(&self, stack: &mut Vec<HeapId>) {
        if let Self::Ref(id) = self {
            stack.push(*id);
        }
    }

    /// Identity comparison.
    ///
    /// The singletons (`None`, `Ellipsis`, `NotImplemented`, `True`,
    /// `False`) compare identical across every construction path; heap
    /// values are identical only when they are the same slot.
    #[must_use]
    pub fn is_(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None)
            | (Self::Ellipsis, Self::Ellipsis)
            | (Self::NotImplemented, Self::NotImplemented) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::InternString(a), Self::InternString(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }

    /// Default truthiness, without dunder dispatch.
    #[must_use]
    pub fn py_bool(&self, heap: &Heap, interns: &Interns) -> bool {
        match self {
            Self::Undefined => unreachable!("cannot take truth of undefined value"),
            Self::None => false,
            Self::Ellipsis | Self::NotImplemented | Self::Builtin(_) => true,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::InternString(id) => !interns.get_str(*id).is_empty(),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => !s.as_str().is_empty(),
                HeapData::Bytes(b) => !b.as_slice().is_empty(),
                HeapData::LongInt(li) => !li.inner().is_zero(),
                HeapData::List(list) => !list.is_empty(),
                HeapData::Tuple(tuple) => !tuple.is_empty(),
                HeapData::Dict(dict) => !dict.is_empty(),
                _ => true,
            },
        }
    }

    /// Structural equality without dunder dispatch.
    ///
    /// Covers the cross-carrier ladders: `Int`/`Bool`/`Float`/`BigInt`
    /// compare numerically, interned and heap strings compare by content,
    /// containers compare element-wise. Reference identity short-circuits.
    #[must_use]
    pub fn py_eq(&self, other: &Self, heap: &Heap, interns: &Interns) -> bool {
        if let (Self::Ref(a), Self::Ref(b)) = (self, other) {
            if a == b {
                return true;
            }
        }
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => false,
            (Self::None, Self::None)
            | (Self::Ellipsis, Self::Ellipsis)
            | (Self::NotImplemented, Self::NotImplemented) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Int(b)) => i64::from(*a) == *b,
            (Self::Int(a), Self::Bool(b)) => *a == i64::from(*b),
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) => (*a as f64) == *b,
            (Self::Float(a), Self::Int(b)) => *a == (*b as f64),
            (Self::Bool(a), Self::Float(b)) => f64::from(*a) == *b,
            (Self::Float(a), Self::Bool(b)) => *a == f64::from(*b),
            (Self::InternString(a), Self::InternString(b)) => a == b,
            (Self::InternString(sid), Self::Ref(id)) => match heap.get(*id) {
                HeapData::Str(s) => interns.get_str(*sid) == s.as_str(),
                _ => false,
            },
            (Self::Ref(id), Self::InternString(sid)) => match heap.get(*id) {
                HeapData::Str(s) => s.as_str() == interns.get_str(*sid),
                _ => false,
            },
            (Self::Int(a), Self::Ref(id)) => match heap.get(*id) {
                HeapData::LongInt(li) => li.eq_i64(*a),
                _ => false,
            },
            (Self::Ref(id), Self::Int(b)) => match heap.get(*id) {
                HeapData::LongInt(li) => li.eq_i64(*b),
                _ => false,
            },
            (Self::Float(a), Self::Ref(id)) => match heap.get(*id) {
                HeapData::LongInt(li) => li.eq_f64(*a),
                _ => false,
            },
            (Self::Ref(id), Self::Float(b)) => match heap.get(*id) {
                HeapData::LongInt(li) => li.eq_f64(*b),
                _ => false,
            },
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => match (heap.get(*a), heap.get(*b)) {
                (HeapData::Str(x), HeapData::Str(y)) => x.as_str() == y.as_str(),
                (HeapData::Bytes(x), HeapData::Bytes(y)) => x.as_slice() == y.as_slice(),
                (HeapData::LongInt(x), HeapData::LongInt(y)) => x.inner() == y.inner(),
                (HeapData::List(x), HeapData::List(y)) => {
                    x.len() == y.len()
                        && x.as_slice()
                            .iter()
                            .zip(y.as_slice())
                            .all(|(a, b)| a.py_eq(b, heap, interns))
                }
                (HeapData::Tuple(x), HeapData::Tuple(y)) => {
                    x.len() == y.len()
                        && x.as_slice()
                            .iter()
                            .zip(y.as_slice())
                            .all(|(a, b)| a.py_eq(b, heap, interns))
                }
                (HeapData::Dict(x), HeapData::Dict(y)) => x.py_eq(y, heap, interns),
                _ => false,
            },
            _ => false,
        }
    }

    /// String content when this value is a string of either carrier.
    #[must_use]
    pub fn as_either_str<'a>(&'a self, heap: &'a Heap, interns: &'a Interns) -> Option<&'a str> {
        match self {
            Self::InternString(id) => Some(interns.get_str(*id)),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// The value as an index-sized integer, when it is integer-like.
    ///
    /// Accepts `Int`, `Bool` and `BigInt` values that fit in `i64`.
    #[must_use]
    pub fn as_index(&self, heap: &Heap) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::LongInt(li) => li.to_i64(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Human-readable type name for error messages.
    ///
    /// For user-defined instances this is the class name, not `instance`.
    #[must_use]
    pub fn type_name<'a>(&self, heap: &'a Heap, interns: &'a Interns) -> Cow<'a, str> {
        match self {
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Instance(instance) => {
                    let class_id = instance.class_id();
                    match heap.get(class_id) {
                        HeapData::Type(type_obj) => Cow::Borrowed(interns.get_str(type_obj.name())),
                        _ => Cow::Borrowed("instance"),
                    }
                }
                data => Cow::Owned(data.py_type().to_string()),
            },
            other => Cow::Owned(other.py_type(heap).to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
