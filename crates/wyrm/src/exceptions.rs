//! The built-in exception hierarchy and the runtime error channel.
//!
//! Exceptions are Language values and native error payloads at the same
//! time: every raise travels as a [`RunError`] through `Result`, and the
//! same [`SimpleException`] can be allocated on the heap and handed to
//! Language code. Message formatting is deferred: a constructor stores a
//! template plus its arguments and nothing is rendered until the message is
//! asked for.

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    object::Object,
    resource::ResourceError,
    types::Type,
};

/// Result type alias for operations that can raise.
pub type RunResult<T> = Result<T, RunError>;

/// Exception types built into the runtime.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and
/// `Into<&'static str>`; the string form is the variant name exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Root of the hierarchy; catches everything.
    BaseException,
    /// Base class of every ordinary exception.
    Exception,

    // --- direct BaseException subclasses ---
    KeyboardInterrupt,

    // --- ArithmeticError hierarchy ---
    ArithmeticError,
    ZeroDivisionError,
    /// Numeric operand out of representable range; notably raised converting
    /// a non-finite float to an arbitrary-precision integer.
    OverflowError,

    // --- LookupError hierarchy ---
    LookupError,
    IndexError,
    KeyError,

    // --- NameError hierarchy ---
    NameError,
    UnboundLocalError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    /// Deliberately unimplemented fork of a code path.
    NotImplementedError,
    RecursionError,

    // --- standalone Exception subclasses ---
    AttributeError,
    MemoryError,
    StopIteration,
    /// Internal invariant violated by correct-seeming source code.
    SystemError,
    TypeError,
    ValueError,

    // --- Warning hierarchy ---
    Warning,
    DeprecationWarning,
    RuntimeWarning,
}

impl ExcType {
    /// Returns the immediate base of this exception type.
    ///
    /// `BaseException` is the root and has no base.
    #[must_use]
    pub fn base(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::Exception | Self::KeyboardInterrupt => Some(Self::BaseException),
            Self::ZeroDivisionError | Self::OverflowError => Some(Self::ArithmeticError),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::UnboundLocalError => Some(Self::NameError),
            Self::NotImplementedError | Self::RecursionError => Some(Self::RuntimeError),
            Self::DeprecationWarning | Self::RuntimeWarning => Some(Self::Warning),
            _ => Some(Self::Exception),
        }
    }

    /// Returns true when `self` would be caught by `except handler_type:`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if t == handler_type {
                return true;
            }
            current = t.base();
        }
        false
    }

    /// The MRO of this exception type as a chain of `ExcType`s, self first.
    pub fn mro(self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(self), |t| t.base())
    }

    /// Creates a simple TypeError with a custom message.
    #[must_use]
    pub(crate) fn type_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg).into()
    }

    /// Creates an AttributeError for a missing attribute.
    ///
    /// Format: `'{type}' object has no attribute '{attr}'`
    #[must_use]
    pub(crate) fn attribute_error(type_name: impl fmt::Display, attr: &str) -> RunError {
        SimpleException::new_msg(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
        .into()
    }

    /// Creates a KeyError that retains the raw key value.
    ///
    /// The message, when asked for, quotes the key.
    #[must_use]
    pub(crate) fn key_error(key: Object) -> RunError {
        SimpleException::with_key(Self::KeyError, key).into()
    }

    /// Creates a NameError for an unresolved name.
    #[must_use]
    pub(crate) fn name_error(name: &str) -> RunError {
        SimpleException::new_msg(Self::NameError, format!("name '{name}' is not defined")).into()
    }

    /// Creates an UnboundLocalError for a local read before assignment.
    #[must_use]
    pub(crate) fn unbound_local_error(name: &str) -> RunError {
        SimpleException::new_msg(
            Self::UnboundLocalError,
            format!("cannot access local variable '{name}' where it is not associated with a value"),
        )
        .into()
    }

    /// Creates a ZeroDivisionError for division by zero.
    #[must_use]
    pub(crate) fn zero_division() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "division by zero").into()
    }

    /// Creates a ZeroDivisionError for modulo by zero.
    #[must_use]
    pub(crate) fn zero_modulo() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "integer modulo by zero").into()
    }

    /// Creates the OverflowError raised converting a non-finite float to int.
    #[must_use]
    pub(crate) fn overflow_float_to_int(what: &str) -> RunError {
        SimpleException::new_msg(Self::OverflowError, format!("cannot convert float {what} to integer")).into()
    }

    /// Creates a SystemError for a violated internal contract reachable from
    /// correct-seeming source (e.g. `globals()` with no current frame).
    #[must_use]
    pub(crate) fn system_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::SystemError, msg).into()
    }

    /// Creates a NotImplementedError naming a deliberately missing feature.
    #[must_use]
    pub(crate) fn missing_feature(what: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::NotImplementedError, format!("missing feature: {what}")).into()
    }

    /// Creates a RecursionError for an exceeded frame depth limit.
    #[must_use]
    pub(crate) fn recursion_error() -> RunError {
        SimpleException::new_msg(Self::RecursionError, "maximum recursion depth exceeded").into()
    }

    /// Creates a StopIteration for iterator exhaustion.
    ///
    /// The payload is the statically-known no-message shape; like every
    /// `SimpleException` it carries no captured stack context, which is the
    /// point: conversion and iteration hot paths construct it freely.
    #[must_use]
    pub(crate) fn stop_iteration() -> RunError {
        RunError::Raise(Box::new(STOP_ITERATION))
    }

    /// Creates a TypeError for an unsupported binary operation.
    ///
    /// Format: `unsupported operand type(s) for {op}: '{left}' and '{right}'`
    #[must_use]
    pub(crate) fn binary_type_error(op: &str, lhs: impl fmt::Display, rhs: impl fmt::Display) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("unsupported operand type(s) for {op}: '{lhs}' and '{rhs}'"),
        )
        .into()
    }

    /// Creates a TypeError for an unsupported unary operation.
    #[must_use]
    pub(crate) fn unary_type_error(op: &str, value_type: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("bad operand type for unary {op}: '{value_type}'")).into()
    }

    /// Creates a TypeError for an unsupported ordering comparison.
    #[must_use]
    pub(crate) fn comparison_type_error(op: &str, lhs: Type, rhs: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{op}' not supported between instances of '{lhs}' and '{rhs}'"),
        )
        .into()
    }

    /// Creates a TypeError for calling a non-callable value.
    #[must_use]
    pub(crate) fn type_error_not_callable(type_: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not callable")).into()
    }

    /// Creates a TypeError for iterating a non-iterable value.
    #[must_use]
    pub(crate) fn type_error_not_iterable(type_: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not iterable")).into()
    }

    /// Creates a TypeError for values that cannot stand in for an integer.
    #[must_use]
    pub(crate) fn type_error_not_integer(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{type_}' object cannot be interpreted as an integer"),
        )
        .into()
    }

    /// Creates a TypeError for unhashable values.
    #[must_use]
    pub(crate) fn type_error_unhashable(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("unhashable type: '{type_}'")).into()
    }

    /// Creates a TypeError for subscripting a non-subscriptable value.
    #[must_use]
    pub(crate) fn type_error_not_sub(type_: Type) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not subscriptable")).into()
    }

    /// Creates a TypeError for item assignment on types without `setitem`.
    #[must_use]
    pub(crate) fn type_error_not_sub_assignment(type_: Type) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{type_}' object does not support item assignment"),
        )
        .into()
    }

    /// Creates a TypeError for a function receiving the wrong argument count.
    ///
    /// - 1 expected: `{name}() takes exactly one argument ({actual} given)`
    /// - otherwise: `{name} expected {expected} arguments, got {actual}`
    #[must_use]
    pub(crate) fn type_error_arg_count(name: &str, expected: usize, actual: usize) -> RunError {
        if expected == 1 {
            SimpleException::new_msg(
                Self::TypeError,
                format!("{name}() takes exactly one argument ({actual} given)"),
            )
            .into()
        } else {
            SimpleException::new_msg(Self::TypeError, format!("{name} expected {expected} arguments, got {actual}"))
                .into()
        }
    }

    /// Creates a TypeError for a no-argument callable receiving arguments.
    #[must_use]
    pub(crate) fn type_error_no_args(name: &str, actual: usize) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("{name}() takes no arguments ({actual} given)")).into()
    }

    /// Creates a TypeError for too few arguments.
    #[must_use]
    pub(crate) fn type_error_at_least(name: &str, min: usize, actual: usize) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name} expected at least {min} argument, got {actual}"),
        )
        .into()
    }

    /// Creates a TypeError for too many arguments.
    #[must_use]
    pub(crate) fn type_error_at_most(name: &str, max: usize, actual: usize) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name} expected at most {max} arguments, got {actual}"),
        )
        .into()
    }

    /// Creates a TypeError for missing required positional arguments.
    #[must_use]
    pub(crate) fn type_error_missing_positional(name: &str, missing: &[&str]) -> RunError {
        let count = missing.len();
        let names = format_param_names(missing);
        let plural = if count == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() missing {count} required positional {plural}: {names}"),
        )
        .into()
    }

    /// Creates a TypeError for missing required keyword-only arguments.
    #[must_use]
    pub(crate) fn type_error_missing_kwonly(name: &str, missing: &[&str]) -> RunError {
        let count = missing.len();
        let names = format_param_names(missing);
        let plural = if count == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() missing {count} required keyword-only {plural}: {names}"),
        )
        .into()
    }

    /// Creates a TypeError for too many positional arguments.
    #[must_use]
    pub(crate) fn type_error_too_many_positional(name: &str, max: usize, actual: usize) -> RunError {
        let takes_word = if max == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() takes {max} positional {takes_word} but {actual} were given"),
        )
        .into()
    }

    /// Creates a TypeError for a positional-only parameter passed by keyword.
    #[must_use]
    pub(crate) fn type_error_positional_only(name: &str, param: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got some positional-only arguments passed as keyword arguments: '{param}'"),
        )
        .into()
    }

    /// Creates a TypeError for a parameter bound twice.
    #[must_use]
    pub(crate) fn type_error_duplicate_arg(name: &str, param: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got multiple values for argument '{param}'"),
        )
        .into()
    }

    /// Creates a TypeError for an unexpected keyword argument.
    #[must_use]
    pub(crate) fn type_error_unexpected_keyword(name: &str, key: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got an unexpected keyword argument '{key}'"),
        )
        .into()
    }

    /// Creates a TypeError for keyword names that are not strings.
    #[must_use]
    pub(crate) fn type_error_kwargs_nonstring_key() -> RunError {
        SimpleException::new_msg(Self::TypeError, "keywords must be strings").into()
    }

    /// Creates an IndexError for list index out of range.
    #[must_use]
    pub(crate) fn list_index_error() -> RunError {
        SimpleException::new_msg(Self::IndexError, "list index out of range").into()
    }

    /// Creates an IndexError for list assignment index out of range.
    #[must_use]
    pub(crate) fn list_assignment_index_error() -> RunError {
        SimpleException::new_msg(Self::IndexError, "list assignment index out of range").into()
    }

    /// Creates an IndexError for tuple index out of range.
    #[must_use]
    pub(crate) fn tuple_index_error() -> RunError {
        SimpleException::new_msg(Self::IndexError, "tuple index out of range").into()
    }

    /// Creates an IndexError for string index out of range.
    #[must_use]
    pub(crate) fn str_index_error() -> RunError {
        SimpleException::new_msg(Self::IndexError, "string index out of range").into()
    }

    /// Creates an IndexError for bytes index out of range.
    #[must_use]
    pub(crate) fn bytes_index_error() -> RunError {
        SimpleException::new_msg(Self::IndexError, "index out of range").into()
    }
}

/// Joins quoted parameter names for binding errors: `'a'`, `'a', and 'b'`,
/// `'a', 'b', and 'c'`.
fn format_param_names(names: &[&str]) -> String {
    let mut quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    let last = quoted.pop().unwrap_or_default();
    if quoted.is_empty() {
        last
    } else {
        format!("{}, and {last}", quoted.join(", "))
    }
}

/// Statically-known StopIteration payload for hot iteration paths.
///
/// Captured stack context is absent by design; see the static-sentinel note
/// in the design ledger.
pub(crate) const STOP_ITERATION: SimpleException = SimpleException {
    exc_type: ExcType::StopIteration,
    message: ExcMessage::Empty,
    key: None,
};

/// An exception message, rendered lazily.
///
/// Serialize-only: the lazy template is static program text and has no
/// deserialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) enum ExcMessage {
    /// No message at all (`StopIteration`, bare raises).
    Empty,
    /// Finished text.
    Text(Box<str>),
    /// A format template plus arguments; `{}` placeholders are substituted
    /// in order with the repr of each argument when the message is asked
    /// for.
    Lazy {
        template: &'static str,
        args: SmallVec<[Object; 2]>,
    },
}

/// Lightweight representation of an exception.
///
/// This is both the native error payload and, when allocated on the heap,
/// the Language-visible exception object. The type, args and message are
/// read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleException {
    exc_type: ExcType,
    message: ExcMessage,
    /// Raw key retained by `KeyError` so handlers can recover it unchanged.
    key: Option<Box<Object>>,
}

impl SimpleException {
    /// Creates an exception with a finished message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, msg: impl fmt::Display) -> Self {
        Self {
            exc_type,
            message: ExcMessage::Text(msg.to_string().into_boxed_str()),
            key: None,
        }
    }

    /// Creates an exception with no message.
    #[must_use]
    pub fn new_none(exc_type: ExcType) -> Self {
        Self {
            exc_type,
            message: ExcMessage::Empty,
            key: None,
        }
    }

    /// Creates an exception whose message is a format template resolved on
    /// first request. Each `{}` in the template is replaced, in order, with
    /// the repr of the corresponding argument.
    #[must_use]
    pub fn new_lazy(exc_type: ExcType, template: &'static str, args: impl IntoIterator<Item = Object>) -> Self {
        Self {
            exc_type,
            message: ExcMessage::Lazy {
                template,
                args: args.into_iter().collect(),
            },
            key: None,
        }
    }

    /// Creates a `KeyError` retaining the missing key.
    #[must_use]
    pub fn with_key(exc_type: ExcType, key: Object) -> Self {
        Self {
            exc_type,
            message: ExcMessage::Empty,
            key: Some(Box::new(key)),
        }
    }

    /// Creates the conventional pre-formatted duplicate-key error, carrying
    /// the key unchanged.
    #[must_use]
    pub fn duplicate_key(key: Object) -> Self {
        Self {
            exc_type: ExcType::KeyError,
            message: ExcMessage::Lazy {
                template: "duplicate key {}",
                args: std::iter::once(key.clone()).collect(),
            },
            key: Some(Box::new(key)),
        }
    }

    /// The exception's type.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// The raw key carried by a `KeyError`, if any.
    #[must_use]
    pub fn key(&self) -> Option<&Object> {
        self.key.as_deref()
    }

    /// Renders the message. For a `KeyError` with no explicit message this
    /// quotes the retained key.
    #[must_use]
    pub fn message(&self) -> Cow<'_, str> {
        match &self.message {
            ExcMessage::Empty => match &self.key {
                Some(key) => Cow::Owned(key.repr_string()),
                None => Cow::Borrowed(""),
            },
            ExcMessage::Text(text) => Cow::Borrowed(text),
            ExcMessage::Lazy { template, args } => {
                let mut rendered = String::with_capacity(template.len() + 16);
                let mut parts = template.split("{}");
                if let Some(first) = parts.next() {
                    rendered.push_str(first);
                }
                let mut args_iter = args.iter();
                for part in parts {
                    match args_iter.next() {
                        Some(arg) => rendered.push_str(&arg.repr_string()),
                        None => rendered.push_str("{}"),
                    }
                    rendered.push_str(part);
                }
                Cow::Owned(rendered)
            }
        }
    }

    /// The exception's args tuple, as exchange objects.
    ///
    /// A `KeyError` carries its raw key, not the rendered text.
    #[must_use]
    pub fn args(&self) -> Vec<Object> {
        if let Some(key) = &self.key {
            return vec![(**key).clone()];
        }
        match &self.message {
            ExcMessage::Empty => vec![],
            _ => vec![Object::String(self.message().into_owned())],
        }
    }
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = self.message();
        if msg.is_empty() {
            write!(f, "{}", self.exc_type)
        } else {
            write!(f, "{}: {}", self.exc_type, msg)
        }
    }
}

/// Internal invariant violated by the implementation itself.
///
/// Never visible to Language code; reaching one of these always indicates a
/// bug in the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterError {
    message: String,
}

impl InterpreterError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interpreter invariant violated: {}", self.message)
    }
}

impl std::error::Error for InterpreterError {}

/// A runtime error: either a Language exception being raised, or a core bug.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    /// A Language exception propagating through native frames.
    Raise(Box<SimpleException>),
    /// A violated internal invariant; never surfaces as a Language value.
    Internal(InterpreterError),
}

impl RunError {
    /// Creates an internal error. Reaching this path is a core bug.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(InterpreterError::new(message))
    }

    /// The exception type carried by a raise, `None` for internal errors.
    #[must_use]
    pub fn exc_type(&self) -> Option<ExcType> {
        match self {
            Self::Raise(exc) => Some(exc.exc_type()),
            Self::Internal(_) => None,
        }
    }

    /// The raised exception, `None` for internal errors.
    #[must_use]
    pub fn exception(&self) -> Option<&SimpleException> {
        match self {
            Self::Raise(exc) => Some(exc),
            Self::Internal(_) => None,
        }
    }

    /// True when this is a `StopIteration` raise.
    #[must_use]
    pub fn is_stop_iteration(&self) -> bool {
        self.exc_type() == Some(ExcType::StopIteration)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise(exc) => exc.fmt(f),
            Self::Internal(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RunError {}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Raise(Box::new(exc))
    }
}

impl From<InterpreterError> for RunError {
    fn from(err: InterpreterError) -> Self {
        Self::Internal(err)
    }
}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Recursion { .. } => {
                SimpleException::new_msg(ExcType::RecursionError, "maximum recursion depth exceeded").into()
            }
            ResourceError::Memory { .. } | ResourceError::Allocations { .. } => {
                SimpleException::new_msg(ExcType::MemoryError, err).into()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operations for heap-allocated exception values
// ---------------------------------------------------------------------------

use crate::{
    heap::HeapData,
    ops::{Operations, bin, un},
    runtime::Runtime,
    value::Value,
};

fn expect_exception<'a>(v: &'a Value, heap: &'a crate::heap::Heap) -> RunResult<&'a SimpleException> {
    match v {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Exception(exc) => Ok(exc),
            _ => Err(RunError::internal("exception slot on wrong carrier")),
        },
        _ => Err(RunError::internal("exception slot on wrong carrier")),
    }
}

fn exc_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let exc = expect_exception(v, &rt.heap)?;
    let msg = exc.message();
    let text = if msg.is_empty() {
        format!("{}()", exc.exc_type())
    } else {
        let mut out = format!("{}(", exc.exc_type());
        crate::types::str::string_repr_fmt(&msg, &mut out).expect("string write cannot fail");
        out.push(')');
        out
    };
    Ok(Value::Ref(
        rt.heap.allocate(HeapData::Str(crate::types::str::Str::from(text)))?,
    ))
}

fn exc_str(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let exc = expect_exception(v, &rt.heap)?;
    let text = exc.message().into_owned();
    Ok(Value::Ref(
        rt.heap.allocate(HeapData::Str(crate::types::str::Str::from(text)))?,
    ))
}

fn exc_eq(v: &Value, w: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    // Exceptions compare by identity, like other reference objects.
    Ok(Value::Bool(v.is_(w)))
}

pub(crate) const EXCEPTION_OPS: Operations = Operations {
    repr: un(exc_repr),
    str_: un(exc_str),
    eq: bin(exc_eq),
    ..Operations::EMPTY
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_chains_to_base_exception() {
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::ArithmeticError));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::Exception));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::BaseException));
        assert!(!ExcType::ZeroDivisionError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::UnboundLocalError.is_subclass_of(ExcType::NameError));
        assert!(ExcType::RecursionError.is_subclass_of(ExcType::RuntimeError));
        assert!(ExcType::KeyboardInterrupt.is_subclass_of(ExcType::BaseException));
        assert!(!ExcType::KeyboardInterrupt.is_subclass_of(ExcType::Exception));
        assert!(ExcType::DeprecationWarning.is_subclass_of(ExcType::Warning));
    }

    #[test]
    fn key_error_message_quotes_the_key() {
        let exc = SimpleException::with_key(ExcType::KeyError, Object::String("k".to_owned()));
        assert_eq!(exc.message(), "'k'");
        assert_eq!(exc.key(), Some(&Object::String("k".to_owned())));
    }

    #[test]
    fn duplicate_key_carries_key_unchanged() {
        let exc = SimpleException::duplicate_key(Object::Int(7));
        assert_eq!(exc.key(), Some(&Object::Int(7)));
        assert_eq!(exc.message(), "duplicate key 7");
    }

    #[test]
    fn lazy_message_renders_on_demand() {
        let exc = SimpleException::new_lazy(
            ExcType::ValueError,
            "bad pair: {} and {}",
            [Object::Int(1), Object::String("x".to_owned())],
        );
        assert_eq!(exc.message(), "bad pair: 1 and 'x'");
    }
}
