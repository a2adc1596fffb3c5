//! The built-in type tokens.
//!
//! [`Type`] is the O(1) identity of every built-in type, used for dispatch
//! and error messages. The full Language-visible type value (name, bases,
//! MRO, attribute dict, Operations) is the heap-resident `TypeObject` in
//! `types::class`, created lazily per runtime from these tokens.

use std::fmt;

use crate::{exceptions::ExcType, value::Carrier};

/// Identity token of a built-in type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Type {
    Type,
    /// The universal base type; terminates every MRO.
    Object,
    NoneType,
    NotImplementedType,
    Ellipsis,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Tuple,
    Dict,
    Iterator,
    Module,
    Function,
    BuiltinFunction,
    /// A bound method created by attribute access on instances.
    Method,
    MethodDescriptor,
    GetSetDescriptor,
    MemberDescriptor,
    StaticMethod,
    ClassMethod,
    Code,
    Exception(ExcType),
    /// A user-defined class instance; the concrete class lives on the heap.
    Instance,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => f.write_str("type"),
            Self::Object => f.write_str("object"),
            Self::NoneType => f.write_str("NoneType"),
            Self::NotImplementedType => f.write_str("NotImplementedType"),
            Self::Ellipsis => f.write_str("ellipsis"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Bytes => f.write_str("bytes"),
            Self::List => f.write_str("list"),
            Self::Tuple => f.write_str("tuple"),
            Self::Dict => f.write_str("dict"),
            Self::Iterator => f.write_str("iterator"),
            Self::Module => f.write_str("module"),
            Self::Function => f.write_str("function"),
            Self::BuiltinFunction => f.write_str("builtin_function_or_method"),
            Self::Method => f.write_str("method"),
            Self::MethodDescriptor => f.write_str("method_descriptor"),
            Self::GetSetDescriptor => f.write_str("getset_descriptor"),
            Self::MemberDescriptor => f.write_str("member_descriptor"),
            Self::StaticMethod => f.write_str("staticmethod"),
            Self::ClassMethod => f.write_str("classmethod"),
            Self::Code => f.write_str("code"),
            Self::Exception(exc_type) => write!(f, "{exc_type}"),
            Self::Instance => f.write_str("instance"),
        }
    }
}

impl Type {
    /// The immediate base of this built-in type. `Object` has none.
    #[must_use]
    pub fn builtin_base(self) -> Option<Self> {
        match self {
            Self::Object => None,
            Self::Bool => Some(Self::Int),
            Self::Exception(exc) => match exc.base() {
                Some(parent) => Some(Self::Exception(parent)),
                None => Some(Self::Object),
            },
            _ => Some(Self::Object),
        }
    }

    /// Whether a value of type `self` is an instance of `other`.
    ///
    /// Walks the built-in base chain: `bool` is a subtype of `int`, every
    /// exception type chains to `BaseException`, everything is an instance
    /// of `object`.
    #[must_use]
    pub fn is_instance_of(self, other: Self) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if t == other {
                return true;
            }
            current = t.builtin_base();
        }
        false
    }

    /// Whether this type may be subclassed (the BASETYPE flag).
    #[must_use]
    pub fn basetype(self) -> bool {
        matches!(
            self,
            Self::Object
                | Self::Int
                | Self::Float
                | Self::Str
                | Self::Bytes
                | Self::List
                | Self::Tuple
                | Self::Dict
                | Self::Type
                | Self::Exception(_)
        )
    }

    /// Whether calling the type constructs instances (the INSTANTIABLE flag).
    #[must_use]
    pub fn instantiable(self) -> bool {
        matches!(
            self,
            Self::Object
                | Self::Bool
                | Self::Int
                | Self::Float
                | Self::Str
                | Self::Bytes
                | Self::List
                | Self::Tuple
                | Self::Dict
                | Self::Type
                | Self::StaticMethod
                | Self::ClassMethod
                | Self::Exception(_)
        )
    }

    /// The native carriers whose instances belong to this type without
    /// wrapping: the adopted set. The first entry is the canonical carrier.
    #[must_use]
    pub fn adopted_carriers(self) -> &'static [Carrier] {
        match self {
            Self::Type => &[Carrier::Type],
            Self::Object => &[Carrier::Instance],
            Self::NoneType => &[Carrier::None],
            Self::NotImplementedType => &[Carrier::NotImplemented],
            Self::Ellipsis => &[Carrier::Ellipsis],
            Self::Bool => &[Carrier::Bool],
            // Two integer carriers: the inline i64 and the heap BigInt.
            Self::Int => &[Carrier::Int64, Carrier::BigInt],
            Self::Float => &[Carrier::Float],
            // Two string carriers: interned and heap-allocated.
            Self::Str => &[Carrier::InternStr, Carrier::Str],
            Self::Bytes => &[Carrier::Bytes],
            Self::List => &[Carrier::List],
            Self::Tuple => &[Carrier::Tuple],
            Self::Dict => &[Carrier::Dict],
            Self::Iterator => &[Carrier::Iterator],
            Self::Module => &[Carrier::Module],
            Self::Function => &[Carrier::Function],
            Self::BuiltinFunction => &[Carrier::Builtin],
            Self::Method => &[Carrier::BoundMethod],
            Self::MethodDescriptor => &[Carrier::MethodDescriptor],
            Self::GetSetDescriptor => &[Carrier::GetSetDescriptor],
            Self::MemberDescriptor => &[Carrier::MemberDescriptor],
            Self::StaticMethod => &[Carrier::StaticMethod],
            Self::ClassMethod => &[Carrier::ClassMethod],
            Self::Code => &[Carrier::Code],
            Self::Exception(_) => &[Carrier::Exception],
            Self::Instance => &[Carrier::Instance],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_is_subtype_of_int() {
        assert!(Type::Bool.is_instance_of(Type::Int));
        assert!(Type::Bool.is_instance_of(Type::Object));
        assert!(!Type::Int.is_instance_of(Type::Bool));
    }

    #[test]
    fn exception_types_chain_to_object() {
        let key_error = Type::Exception(ExcType::KeyError);
        assert!(key_error.is_instance_of(Type::Exception(ExcType::LookupError)));
        assert!(key_error.is_instance_of(Type::Exception(ExcType::BaseException)));
        assert!(key_error.is_instance_of(Type::Object));
    }

    #[test]
    fn int_adopts_two_carriers() {
        assert_eq!(Type::Int.adopted_carriers(), &[Carrier::Int64, Carrier::BigInt]);
        assert_eq!(Type::Str.adopted_carriers().len(), 2);
    }
}
