//! The exposure pipeline: declarative method tables become live
//! descriptors.
//!
//! There is no runtime reflection here; native classes declare their
//! Language surface in static [`MethodDef`] / [`GetSetDef`] / [`MemberDef`]
//! tables. Exposure scans a type's tables exactly once, at type
//! construction: it validates the declarations, builds one `ArgParser` per
//! method, checks the handle arity against the parser's fast-path tag, and
//! allocates the descriptors that land in the type's attribute dict.
//!
//! A type that adopts several carriers may declare the same method once per
//! carrier. Exactly one declaration is marked primary and provides the
//! signature; the others must be signature-compatible, which exposure
//! checks here, and contribute their handle to the same descriptor.

use std::rc::Rc;

use crate::{
    argparse::{ArgParser, BindTag, ParamDef},
    descriptor::{GetSetDescriptor, MemberDescriptor, MethodDescriptor},
    exceptions::{RunError, RunResult},
    heap::HeapData,
    intern::StringId,
    runtime::Runtime,
    value::{Carrier, Value},
};

/// How a method binds to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// First parameter is the receiver, implicit in the parameter table.
    Instance,
    /// No implicit receiver.
    Static,
    /// The receiver is the owning type.
    Class,
}

/// A native method implementation at a specific arity.
///
/// The variant must agree with the `ArgParser`'s tag: a signature that
/// binds to two slots needs a `Two` handle, anything with defaults or
/// collectors needs `Positional`/`General`.
#[derive(Debug, Clone, Copy)]
pub enum MethodHandle {
    NoArgs(fn(&Value, &mut Runtime) -> RunResult<Value>),
    One(fn(&Value, &Value, &mut Runtime) -> RunResult<Value>),
    Two(fn(&Value, &Value, &Value, &mut Runtime) -> RunResult<Value>),
    Three(fn(&Value, &Value, &Value, &Value, &mut Runtime) -> RunResult<Value>),
    /// Receives the bound positional slots.
    Positional(fn(&Value, &[Value], &mut Runtime) -> RunResult<Value>),
    /// Receives the full bound slot vector, collectors included.
    General(fn(&Value, &[Value], &mut Runtime) -> RunResult<Value>),
}

impl MethodHandle {
    /// Whether this handle arity can consume slots bound under `tag`.
    fn matches_tag(self, tag: BindTag) -> bool {
        match self {
            Self::NoArgs(_) => tag == BindTag::NoArgs,
            Self::One(_) => tag == BindTag::One,
            Self::Two(_) => tag == BindTag::Two,
            Self::Three(_) => tag == BindTag::Three,
            Self::Positional(_) => matches!(tag, BindTag::Positional | BindTag::General),
            Self::General(_) => true,
        }
    }
}

/// One method declaration in a native class's table.
#[derive(Debug, Clone, Copy)]
pub struct MethodDef {
    pub name: &'static str,
    pub kind: MethodKind,
    pub doc: Option<&'static str>,
    /// Parameters excluding the implicit receiver.
    pub params: &'static [ParamDef],
    pub handle: MethodHandle,
    /// Restricts this declaration to one carrier; `None` covers all
    /// adopted carriers.
    pub carrier: Option<Carrier>,
    /// The primary declaration provides the signature.
    pub primary: bool,
}

/// A get/set/delete triple contributing to one named getset descriptor.
#[derive(Debug, Clone, Copy)]
pub struct GetSetDef {
    pub name: &'static str,
    pub doc: Option<&'static str>,
    pub get: fn(&Value, &mut Runtime) -> RunResult<Value>,
    pub set: Option<fn(&Value, &Value, &mut Runtime) -> RunResult<Value>>,
    pub delete: Option<fn(&Value, &mut Runtime) -> RunResult<Value>>,
}

/// A reflected field declaration producing a member descriptor.
#[derive(Debug, Clone, Copy)]
pub struct MemberDef {
    pub name: &'static str,
    pub doc: Option<&'static str>,
    /// Index into the instance slot storage.
    pub index: usize,
    pub read_only: bool,
    /// Optional members raise `AttributeError` after deletion instead of
    /// reading as `None`.
    pub optional: bool,
}

/// Exposes one type's declaration tables as attribute-dict entries.
///
/// `owner` is the type's canonical name (used in descriptor reprs and
/// binding errors). The returned values are owned descriptor references
/// ready to be moved into the type dict.
pub(crate) fn expose_type(
    owner: &str,
    methods: &[MethodDef],
    getsets: &[GetSetDef],
    members: &[MemberDef],
    rt: &mut Runtime,
) -> RunResult<Vec<(StringId, Value)>> {
    let mut entries: Vec<(StringId, Value)> = Vec::with_capacity(methods.len() + getsets.len() + members.len());
    let mut seen: Vec<&'static str> = Vec::with_capacity(methods.len());

    // Group method declarations by name; exactly one primary per name.
    let mut index = 0;
    while index < methods.len() {
        let def = &methods[index];
        if seen.contains(&def.name) {
            index += 1;
            continue;
        }
        seen.push(def.name);

        let group: Vec<&MethodDef> = methods.iter().filter(|m| m.name == def.name).collect();
        let primaries = group.iter().filter(|m| m.primary).count();
        if primaries != 1 {
            return Err(RunError::internal(format!(
                "{owner}.{}: {primaries} primary declarations (exactly one required)",
                def.name
            )));
        }
        let primary = group.iter().find(|m| m.primary).expect("counted above");

        let qualified = format!("{owner}.{}", primary.name);
        let parser = ArgParser::new(&qualified, primary.params, &mut rt.interns)?;
        if !primary.handle.matches_tag(parser.tag()) {
            return Err(RunError::internal(format!(
                "{qualified}: handle arity does not match bind tag {:?}",
                parser.tag()
            )));
        }

        // Secondary, per-carrier declarations must agree with the primary
        // signature and carry a carrier restriction.
        let mut handles: Vec<(Option<Carrier>, MethodHandle)> = Vec::with_capacity(group.len());
        for decl in &group {
            if !decl.primary {
                if decl.carrier.is_none() {
                    return Err(RunError::internal(format!(
                        "{qualified}: secondary declaration must name a carrier"
                    )));
                }
                let secondary = ArgParser::new(&qualified, decl.params, &mut rt.interns)?;
                if !parser.signature_compatible(&secondary) {
                    return Err(RunError::internal(format!(
                        "{qualified}: carrier declaration signature differs from primary"
                    )));
                }
                if !decl.handle.matches_tag(parser.tag()) {
                    return Err(RunError::internal(format!(
                        "{qualified}: carrier handle arity does not match bind tag"
                    )));
                }
            }
            handles.push((decl.carrier, decl.handle));
        }

        let name_id = rt.interns.intern(primary.name);
        let descriptor = MethodDescriptor::new(name_id, owner, primary.doc, primary.kind, Rc::new(parser), handles);
        let value = Value::Ref(rt.heap.allocate(HeapData::MethodDescriptor(descriptor))?);
        entries.push((name_id, value));
        index += 1;
    }

    for def in getsets {
        if seen.contains(&def.name) {
            return Err(RunError::internal(format!(
                "{owner}.{}: duplicate declaration across tables",
                def.name
            )));
        }
        seen.push(def.name);
        let name_id = rt.interns.intern(def.name);
        let descriptor = GetSetDescriptor::new(name_id, owner, def.doc, def.get, def.set, def.delete);
        let value = Value::Ref(rt.heap.allocate(HeapData::GetSet(descriptor))?);
        entries.push((name_id, value));
    }

    for def in members {
        if seen.contains(&def.name) {
            return Err(RunError::internal(format!(
                "{owner}.{}: duplicate declaration across tables",
                def.name
            )));
        }
        seen.push(def.name);
        let name_id = rt.interns.intern(def.name);
        let descriptor = MemberDescriptor::new(name_id, owner, def.doc, def.index, def.read_only, def.optional);
        let value = Value::Ref(rt.heap.allocate(HeapData::Member(descriptor))?);
        entries.push((name_id, value));
    }

    Ok(entries)
}
