//! Callable signature description and the argument binding engine.
//!
//! An [`ArgParser`] is the immutable description of a callable's parameter
//! layout: positional-only parameters, regular (positional-or-keyword)
//! parameters, keyword-only parameters, right-aligned defaults, and the
//! `*args` / `**kwargs` collectors. Binding takes the call payload (a value
//! slice plus a names array for the trailing keyword values) and produces
//! the slot vector the bound handle consumes.
//!
//! The parser precomputes a [`BindTag`]; the small-arity tags let call
//! sites skip the full algorithm when the payload shape allows it.

use smallvec::SmallVec;

use crate::{
    exceptions::{ExcType, RunError, RunResult},
    heap::HeapData,
    intern::{Interns, StringId},
    runtime::Runtime,
    types::{dict::Dict, tuple::allocate_tuple},
    value::Value,
};

/// The kind of one declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Before the `/` marker: never bindable by keyword.
    PositionalOnly,
    /// A regular parameter: positional or keyword.
    PositionalOrKeyword,
    /// After the `*` marker: keyword only.
    KeywordOnly,
    /// The `*args` collector; at most one, its type is the tuple type.
    VarArgs,
    /// The `**kwargs` collector; at most one, its type is the mapping type.
    VarKwargs,
}

/// A default literal attached to a parameter declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultArg {
    /// Defaults to `None`.
    None_,
    /// No value: the slot stays unbound and the handle must check.
    NotGiven,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl DefaultArg {
    fn to_value(self, rt: &mut Runtime) -> RunResult<Value> {
        Ok(match self {
            Self::None_ => Value::None,
            Self::NotGiven => Value::Undefined,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
            Self::Str(s) => Value::InternString(rt.interns.intern(s)),
        })
    }
}

/// One parameter declaration in a native method table.
#[derive(Debug, Clone, Copy)]
pub struct ParamDef {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<DefaultArg>,
    /// Overrides the Language-visible name.
    pub rename: Option<&'static str>,
}

impl ParamDef {
    #[must_use]
    pub const fn positional_only(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::PositionalOnly,
            default: None,
            rename: None,
        }
    }

    #[must_use]
    pub const fn positional_only_defaulted(name: &'static str, default: DefaultArg) -> Self {
        Self {
            name,
            kind: ParamKind::PositionalOnly,
            default: Some(default),
            rename: None,
        }
    }

    #[must_use]
    pub const fn pos_or_kw(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::PositionalOrKeyword,
            default: None,
            rename: None,
        }
    }

    #[must_use]
    pub const fn pos_or_kw_defaulted(name: &'static str, default: DefaultArg) -> Self {
        Self {
            name,
            kind: ParamKind::PositionalOrKeyword,
            default: Some(default),
            rename: None,
        }
    }

    #[must_use]
    pub const fn kw_only(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::KeywordOnly,
            default: None,
            rename: None,
        }
    }

    #[must_use]
    pub const fn kw_only_defaulted(name: &'static str, default: DefaultArg) -> Self {
        Self {
            name,
            kind: ParamKind::KeywordOnly,
            default: Some(default),
            rename: None,
        }
    }

    #[must_use]
    pub const fn var_args(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::VarArgs,
            default: None,
            rename: None,
        }
    }

    #[must_use]
    pub const fn var_kwargs(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::VarKwargs,
            default: None,
            rename: None,
        }
    }

    fn visible_name(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }
}

/// The precomputed fast-path classification of a signature.
///
/// The first four apply when a call carries no keyword arguments, invokes
/// no defaults and the signature has no collectors, with arity 0–3;
/// `Positional` covers longer positional-only shapes; `General` everything
/// else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTag {
    NoArgs,
    One,
    Two,
    Three,
    Positional,
    General,
}

/// The slot vector produced by binding.
pub type BoundArgs = SmallVec<[Value; 6]>;

/// Immutable description of a callable signature.
///
/// Slot layout: `[positional-only][regular][keyword-only][*args?][**kwargs?]`.
#[derive(Debug)]
pub struct ArgParser {
    /// Callable name for error messages.
    name: Box<str>,
    /// Language-visible parameter names in slot order (named params only).
    params: Vec<StringId>,
    posonly: usize,
    regular: usize,
    kwonly: usize,
    /// Right-aligned defaults over the positional-only + regular span.
    defaults: Vec<DefaultArg>,
    /// Per keyword-only parameter: its default, if any.
    kw_defaults: Vec<Option<DefaultArg>>,
    varargs: bool,
    varkwargs: bool,
    tag: BindTag,
}

impl ArgParser {
    /// Builds a parser from a declaration table, validating the layout.
    ///
    /// Layout errors in native tables are core bugs and surface as
    /// internal errors, never as Language exceptions.
    pub fn new(name: &str, defs: &[ParamDef], interns: &mut Interns) -> RunResult<Self> {
        let mut params = Vec::with_capacity(defs.len());
        let mut posonly = 0usize;
        let mut regular = 0usize;
        let mut kwonly = 0usize;
        let mut defaults = Vec::new();
        let mut kw_defaults = Vec::new();
        let mut varargs = false;
        let mut varkwargs = false;

        // Declaration order: positional-only, regular, *args, keyword-only,
        // **kwargs. Anything else is a malformed table.
        let mut stage = 0u8;
        for def in defs {
            let next_stage = match def.kind {
                ParamKind::PositionalOnly => 0,
                ParamKind::PositionalOrKeyword => 1,
                ParamKind::VarArgs => 2,
                ParamKind::KeywordOnly => 3,
                ParamKind::VarKwargs => 4,
            };
            if next_stage < stage {
                return Err(RunError::internal(format!(
                    "{name}: parameter '{}' declared out of order",
                    def.name
                )));
            }
            stage = next_stage;

            match def.kind {
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword => {
                    if def.kind == ParamKind::PositionalOnly {
                        posonly += 1;
                    } else {
                        regular += 1;
                    }
                    match def.default {
                        Some(default) => defaults.push(default),
                        None if !defaults.is_empty() => {
                            return Err(RunError::internal(format!(
                                "{name}: non-default parameter '{}' follows default parameter",
                                def.name
                            )));
                        }
                        None => {}
                    }
                    params.push(interns.intern(def.visible_name()));
                }
                ParamKind::KeywordOnly => {
                    kwonly += 1;
                    kw_defaults.push(def.default);
                    params.push(interns.intern(def.visible_name()));
                }
                ParamKind::VarArgs => {
                    if varargs {
                        return Err(RunError::internal(format!("{name}: duplicate *args collector")));
                    }
                    varargs = true;
                }
                ParamKind::VarKwargs => {
                    if varkwargs {
                        return Err(RunError::internal(format!("{name}: duplicate **kwargs collector")));
                    }
                    varkwargs = true;
                }
            }
        }

        // Duplicate Language-visible names are a table error.
        for (i, a) in params.iter().enumerate() {
            if params[..i].contains(a) {
                return Err(RunError::internal(format!(
                    "{name}: duplicate parameter name '{}'",
                    interns.get_str(*a)
                )));
            }
        }

        let tag = if defaults.is_empty() && kw_defaults.is_empty() && !varargs && !varkwargs {
            match posonly + regular {
                0 => BindTag::NoArgs,
                1 => BindTag::One,
                2 => BindTag::Two,
                3 => BindTag::Three,
                _ => BindTag::Positional,
            }
        } else {
            BindTag::General
        };

        Ok(Self {
            name: name.into(),
            params,
            posonly,
            regular,
            kwonly,
            defaults,
            kw_defaults,
            varargs,
            varkwargs,
            tag,
        })
    }

    /// The precomputed fast-path tag.
    #[must_use]
    pub fn tag(&self) -> BindTag {
        self.tag
    }

    /// The callable name used in binding errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of named parameter slots (`P + R + K`).
    #[must_use]
    pub fn named_count(&self) -> usize {
        self.posonly + self.regular + self.kwonly
    }

    /// Total slots, collectors included.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.named_count() + usize::from(self.varargs) + usize::from(self.varkwargs)
    }

    /// Whether the signature is compatible with another declaration of the
    /// same method for a different carrier: same names, kinds and counts.
    #[must_use]
    pub fn signature_compatible(&self, other: &Self) -> bool {
        self.params == other.params
            && self.posonly == other.posonly
            && self.regular == other.regular
            && self.kwonly == other.kwonly
            && self.varargs == other.varargs
            && self.varkwargs == other.varkwargs
    }

    /// Binds a call payload to parameter slots.
    ///
    /// `values` holds positional values followed by keyword values;
    /// `names` holds the keyword names for the trailing `names.len()`
    /// values. The result is the owned slot vector in layout
    /// `[positional-only][regular][keyword-only][*args?][**kwargs?]`.
    ///
    /// Binding is pure with respect to the payload: rebinding the same
    /// payload yields the identical slot vector.
    pub fn bind(&self, values: &[Value], names: &[StringId], rt: &mut Runtime) -> RunResult<BoundArgs> {
        self.bind_with_defaults(values, names, &[], rt)
    }

    /// Like [`ArgParser::bind`], with runtime default values supplied by
    /// the callable (a function's evaluated defaults), right-aligned over
    /// the regular parameters. Declared default literals fill anything the
    /// runtime defaults do not cover.
    pub fn bind_with_defaults(
        &self,
        values: &[Value],
        names: &[StringId],
        value_defaults: &[Value],
        rt: &mut Runtime,
    ) -> RunResult<BoundArgs> {
        debug_assert!(names.len() <= values.len(), "more keyword names than values");
        let np = values.len() - names.len();
        let positional_span = self.posonly + self.regular;

        // Fast path: purely positional payload, exact arity, no defaults.
        if names.is_empty() && self.tag != BindTag::General && np == positional_span {
            let mut slots = BoundArgs::with_capacity(positional_span);
            for value in values {
                slots.push(value.clone_with_heap(&rt.heap));
            }
            return Ok(slots);
        }

        let mut slots = BoundArgs::with_capacity(self.slot_count());
        for _ in 0..self.named_count() {
            slots.push(Value::Undefined);
        }

        // Bitmap of bound named parameters; 64 named params is far beyond
        // any real signature.
        let mut bound: u64 = 0;

        // 1. Positional values fill the positional span in order.
        let direct = np.min(positional_span);
        for (i, value) in values[..direct].iter().enumerate() {
            slots[i] = value.clone_with_heap(&rt.heap);
            bound |= 1 << i;
        }

        // 2. Excess positionals go to *args, or are an arity error.
        let mut varargs_value: Option<Value> = None;
        if np > positional_span {
            if self.varargs {
                let excess: Vec<Value> = values[positional_span..np]
                    .iter()
                    .map(|v| v.clone_with_heap(&rt.heap))
                    .collect();
                match allocate_tuple(excess, &mut rt.heap) {
                    Ok(tuple) => varargs_value = Some(tuple),
                    Err(err) => {
                        self.cleanup(&mut slots, None, None, rt);
                        return Err(err);
                    }
                }
            } else {
                self.cleanup(&mut slots, None, None, rt);
                return Err(ExcType::type_error_too_many_positional(&self.name, positional_span, np));
            }
        }

        // 3. Keyword values bind to regular and keyword-only parameters.
        let mut varkwargs_dict: Option<Dict> = None;
        for (i, &name_id) in names.iter().enumerate() {
            let value = &values[np + i];
            match self.params.iter().position(|&p| p == name_id) {
                Some(index) if index < self.posonly => {
                    let param = rt.interns.get_str(self.params[index]).to_owned();
                    self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
                    return Err(ExcType::type_error_positional_only(&self.name, &param));
                }
                Some(index) => {
                    if bound & (1 << index) != 0 {
                        let param = rt.interns.get_str(self.params[index]).to_owned();
                        self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
                        return Err(ExcType::type_error_duplicate_arg(&self.name, &param));
                    }
                    slots[index] = value.clone_with_heap(&rt.heap);
                    bound |= 1 << index;
                }
                None if self.varkwargs => {
                    let dict = varkwargs_dict.get_or_insert_with(Dict::new);
                    let key = Value::InternString(name_id);
                    let owned = value.clone_with_heap(&rt.heap);
                    if let Err(err) = dict.insert(key, owned, &mut rt.heap, &rt.interns) {
                        self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
                        return Err(err);
                    }
                }
                None => {
                    let key = rt.interns.get_str(name_id).to_owned();
                    self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
                    return Err(ExcType::type_error_unexpected_keyword(&self.name, &key));
                }
            }
        }

        // 4. Defaults, right-aligned over the positional span. Runtime
        // value defaults first, then declared literals.
        if !value_defaults.is_empty() && value_defaults.len() <= positional_span {
            let first_optional = positional_span - value_defaults.len();
            for (offset, default) in value_defaults.iter().enumerate() {
                let index = first_optional + offset;
                if bound & (1 << index) == 0 {
                    slots[index] = default.clone_with_heap(&rt.heap);
                    bound |= 1 << index;
                }
            }
        }
        if !self.defaults.is_empty() {
            let first_optional = positional_span - self.defaults.len();
            for (offset, default) in self.defaults.iter().enumerate() {
                let index = first_optional + offset;
                if bound & (1 << index) == 0 {
                    match default.to_value(rt) {
                        Ok(value) => {
                            slots[index] = value;
                            bound |= 1 << index;
                        }
                        Err(err) => {
                            self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
                            return Err(err);
                        }
                    }
                }
            }
        }
        for (offset, default) in self.kw_defaults.iter().enumerate() {
            let index = positional_span + offset;
            if bound & (1 << index) == 0 {
                if let Some(default) = default {
                    match default.to_value(rt) {
                        Ok(value) => {
                            slots[index] = value;
                            bound |= 1 << index;
                        }
                        Err(err) => {
                            self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
                            return Err(err);
                        }
                    }
                }
            }
        }

        // 5. Anything still unbound without a default is missing.
        let mut missing_positional: Vec<String> = Vec::new();
        for index in 0..positional_span {
            if bound & (1 << index) == 0 {
                missing_positional.push(rt.interns.get_str(self.params[index]).to_owned());
            }
        }
        if !missing_positional.is_empty() {
            self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
            let refs: Vec<&str> = missing_positional.iter().map(String::as_str).collect();
            return Err(ExcType::type_error_missing_positional(&self.name, &refs));
        }
        let mut missing_kwonly: Vec<String> = Vec::new();
        for offset in 0..self.kwonly {
            let index = positional_span + offset;
            if bound & (1 << index) == 0 {
                missing_kwonly.push(rt.interns.get_str(self.params[index]).to_owned());
            }
        }
        if !missing_kwonly.is_empty() {
            self.cleanup(&mut slots, varargs_value.take(), varkwargs_dict.take(), rt);
            let refs: Vec<&str> = missing_kwonly.iter().map(String::as_str).collect();
            return Err(ExcType::type_error_missing_kwonly(&self.name, &refs));
        }

        // 6. Collector slots.
        if self.varargs {
            match varargs_value {
                Some(tuple) => slots.push(tuple),
                None => slots.push(allocate_tuple(Vec::new(), &mut rt.heap)?),
            }
        }
        if self.varkwargs {
            let dict = varkwargs_dict.unwrap_or_default();
            slots.push(Value::Ref(rt.heap.allocate(HeapData::Dict(dict))?));
        }

        Ok(slots)
    }

    /// Releases every owned value bound so far after a binding error.
    fn cleanup(&self, slots: &mut BoundArgs, varargs: Option<Value>, varkwargs: Option<Dict>, rt: &mut Runtime) {
        for slot in slots.drain(..) {
            slot.drop_with_heap(&mut rt.heap);
        }
        if let Some(tuple) = varargs {
            tuple.drop_with_heap(&mut rt.heap);
        }
        if let Some(mut dict) = varkwargs {
            dict.drop_entries(&mut rt.heap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_arity() {
        let mut interns = Interns::new();
        let p0 = ArgParser::new("f", &[], &mut interns).unwrap();
        assert_eq!(p0.tag(), BindTag::NoArgs);
        let p2 = ArgParser::new(
            "f",
            &[ParamDef::positional_only("a"), ParamDef::positional_only("b")],
            &mut interns,
        )
        .unwrap();
        assert_eq!(p2.tag(), BindTag::Two);
        let p5 = ArgParser::new(
            "f",
            &[
                ParamDef::positional_only("a"),
                ParamDef::positional_only("b"),
                ParamDef::positional_only("c"),
                ParamDef::positional_only("d"),
                ParamDef::positional_only("e"),
            ],
            &mut interns,
        )
        .unwrap();
        assert_eq!(p5.tag(), BindTag::Positional);
        let general = ArgParser::new(
            "f",
            &[ParamDef::pos_or_kw_defaulted("a", DefaultArg::Int(1))],
            &mut interns,
        )
        .unwrap();
        assert_eq!(general.tag(), BindTag::General);
    }

    #[test]
    fn out_of_order_declarations_are_rejected() {
        let mut interns = Interns::new();
        let err = ArgParser::new(
            "f",
            &[ParamDef::kw_only("a"), ParamDef::positional_only("b")],
            &mut interns,
        )
        .unwrap_err();
        assert!(err.exc_type().is_none(), "table errors are internal, not raises");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut interns = Interns::new();
        let err = ArgParser::new(
            "f",
            &[ParamDef::positional_only("a"), ParamDef::pos_or_kw("a")],
            &mut interns,
        )
        .unwrap_err();
        assert!(err.exc_type().is_none());
    }
}
