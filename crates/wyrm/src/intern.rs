//! Interned strings.
//!
//! Names that the runtime touches constantly (dunder method names, parameter
//! names, well-known attributes) are pre-interned at fixed indices via
//! [`StaticStrings`], so comparing them is an integer compare. Everything
//! else is interned on demand.

use ahash::AHashMap;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Identifier of an interned string.
///
/// The first `StaticStrings::COUNT` ids are the static strings, in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index into the intern table.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Strings interned at fixed indices before any user code runs.
///
/// The strum `Display` serialisation is the actual string content; the
/// discriminant is the `StringId` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[repr(u32)]
pub enum StaticStrings {
    #[strum(serialize = "__add__")]
    DunderAdd,
    #[strum(serialize = "__radd__")]
    DunderRadd,
    #[strum(serialize = "__sub__")]
    DunderSub,
    #[strum(serialize = "__rsub__")]
    DunderRsub,
    #[strum(serialize = "__mul__")]
    DunderMul,
    #[strum(serialize = "__rmul__")]
    DunderRmul,
    #[strum(serialize = "__truediv__")]
    DunderTruediv,
    #[strum(serialize = "__rtruediv__")]
    DunderRtruediv,
    #[strum(serialize = "__floordiv__")]
    DunderFloordiv,
    #[strum(serialize = "__rfloordiv__")]
    DunderRfloordiv,
    #[strum(serialize = "__mod__")]
    DunderMod,
    #[strum(serialize = "__rmod__")]
    DunderRmod,
    #[strum(serialize = "__and__")]
    DunderAnd,
    #[strum(serialize = "__rand__")]
    DunderRand,
    #[strum(serialize = "__or__")]
    DunderOr,
    #[strum(serialize = "__ror__")]
    DunderRor,
    #[strum(serialize = "__xor__")]
    DunderXor,
    #[strum(serialize = "__rxor__")]
    DunderRxor,
    #[strum(serialize = "__neg__")]
    DunderNeg,
    #[strum(serialize = "__abs__")]
    DunderAbs,
    #[strum(serialize = "__bool__")]
    DunderBool,
    #[strum(serialize = "__int__")]
    DunderInt,
    #[strum(serialize = "__float__")]
    DunderFloat,
    #[strum(serialize = "__index__")]
    DunderIndex,
    #[strum(serialize = "__len__")]
    DunderLen,
    #[strum(serialize = "__contains__")]
    DunderContains,
    #[strum(serialize = "__getitem__")]
    DunderGetitem,
    #[strum(serialize = "__setitem__")]
    DunderSetitem,
    #[strum(serialize = "__delitem__")]
    DunderDelitem,
    #[strum(serialize = "__iter__")]
    DunderIter,
    #[strum(serialize = "__next__")]
    DunderNext,
    #[strum(serialize = "__repr__")]
    DunderRepr,
    #[strum(serialize = "__str__")]
    DunderStr,
    #[strum(serialize = "__hash__")]
    DunderHash,
    #[strum(serialize = "__call__")]
    DunderCall,
    #[strum(serialize = "__init__")]
    DunderInit,
    #[strum(serialize = "__new__")]
    DunderNew,
    #[strum(serialize = "__get__")]
    DunderGet,
    #[strum(serialize = "__set__")]
    DunderSet,
    #[strum(serialize = "__delete__")]
    DunderDelete,
    #[strum(serialize = "__getattribute__")]
    DunderGetattribute,
    #[strum(serialize = "__getattr__")]
    DunderGetattr,
    #[strum(serialize = "__setattr__")]
    DunderSetattr,
    #[strum(serialize = "__delattr__")]
    DunderDelattr,
    #[strum(serialize = "__lt__")]
    DunderLt,
    #[strum(serialize = "__le__")]
    DunderLe,
    #[strum(serialize = "__eq__")]
    DunderEq,
    #[strum(serialize = "__ne__")]
    DunderNe,
    #[strum(serialize = "__ge__")]
    DunderGe,
    #[strum(serialize = "__gt__")]
    DunderGt,
    #[strum(serialize = "__name__")]
    DunderName,
    #[strum(serialize = "__doc__")]
    DunderDoc,
    #[strum(serialize = "__dict__")]
    DunderDict,
    #[strum(serialize = "__mro__")]
    DunderMro,
    #[strum(serialize = "__bases__")]
    DunderBases,
    #[strum(serialize = "__module__")]
    DunderModule,
    #[strum(serialize = "__builtins__")]
    DunderBuiltins,
    #[strum(serialize = "__main__")]
    DunderMain,
    #[strum(serialize = "self")]
    SelfParam,
    #[strum(serialize = "key")]
    Key,
    #[strum(serialize = "default")]
    Default,
    #[strum(serialize = "iterable")]
    Iterable,
    #[strum(serialize = "object")]
    ObjectParam,
    #[strum(serialize = "args")]
    Args,
    #[strum(serialize = "kwargs")]
    Kwargs,
    #[strum(serialize = "value")]
    ValueParam,
    #[strum(serialize = "builtins")]
    Builtins,
    #[strum(serialize = "exec")]
    Exec,
    #[strum(serialize = "<module>")]
    ModuleCodeName,
}

impl StaticStrings {
    /// Number of static strings; the intern table starts with exactly these.
    #[must_use]
    pub fn count() -> usize {
        Self::iter().count()
    }
}

impl From<StaticStrings> for StringId {
    fn from(s: StaticStrings) -> Self {
        Self(s as u32)
    }
}

/// Interned string store.
///
/// Seeded with every [`StaticStrings`] entry; further strings are interned
/// on demand. Ids are stable for the lifetime of the runtime.
#[derive(Debug)]
pub struct Interns {
    strings: Vec<Box<str>>,
    index: AHashMap<Box<str>, StringId>,
}

impl Default for Interns {
    fn default() -> Self {
        Self::new()
    }
}

impl Interns {
    /// Creates the store with all static strings pre-interned.
    #[must_use]
    pub fn new() -> Self {
        let mut this = Self {
            strings: Vec::with_capacity(StaticStrings::count() + 32),
            index: AHashMap::with_capacity(StaticStrings::count() + 32),
        };
        for s in StaticStrings::iter() {
            let text = s.to_string();
            let id = this.push(&text);
            debug_assert_eq!(id, StringId::from(s), "static string out of order: {text}");
        }
        this
    }

    fn push(&mut self, s: &str) -> StringId {
        let id = StringId(u32::try_from(self.strings.len()).expect("intern table overflow"));
        self.strings.push(s.into());
        self.index.insert(s.into(), id);
        id
    }

    /// Interns `s`, returning the existing id if already present.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        self.push(s)
    }

    /// Returns the id for `s` if it has been interned.
    #[must_use]
    pub fn try_get(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied()
    }

    /// Returns the string content for an id.
    ///
    /// # Panics
    /// Panics if the id was not produced by this store.
    #[must_use]
    pub fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Number of interned strings, static entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always false: the static strings are seeded at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_strings_round_trip() {
        let interns = Interns::new();
        assert_eq!(interns.get_str(StaticStrings::DunderAdd.into()), "__add__");
        assert_eq!(interns.get_str(StaticStrings::SelfParam.into()), "self");
        assert_eq!(interns.try_get("__radd__"), Some(StaticStrings::DunderRadd.into()));
    }

    #[test]
    fn intern_is_idempotent() {
        let mut interns = Interns::new();
        let a = interns.intern("spam");
        let b = interns.intern("spam");
        assert_eq!(a, b);
        assert_eq!(interns.get_str(a), "spam");
    }
}
