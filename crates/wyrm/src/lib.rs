#![doc = include_str!("../../../README.md")]
#![allow(dead_code, reason = "host-facing APIs keep some currently-unused surface")]
#![allow(clippy::unnecessary_wraps, reason = "dispatch signatures are uniform")]
#![allow(clippy::needless_pass_by_value, reason = "call APIs pass values consistently")]
#![allow(clippy::trivially_copy_pass_by_ref, reason = "API signatures stay stable")]

mod argparse;
mod builtins;
mod call;
mod code;
mod descriptor;
mod exceptions;
mod expose;
mod frame;
mod heap;
mod intern;
mod object;
mod ops;
mod py_hash;
mod resource;
mod runtime;
mod tracer;
mod types;
mod value;

pub use crate::{
    argparse::{ArgParser, BindTag, BoundArgs, DefaultArg, ParamDef, ParamKind},
    builtins::{BuiltinFunctions, Builtins, ExecSource},
    call::{FastCall, call_value},
    code::{CodeObject, Compiler, Evaluator},
    descriptor::{BoundMethod, ClassMethod, GetSetDescriptor, MemberDescriptor, MethodDescriptor, StaticMethod},
    exceptions::{ExcType, InterpreterError, RunError, RunResult, SimpleException},
    expose::{GetSetDef, MemberDef, MethodDef, MethodHandle, MethodKind},
    frame::{Frame, ThreadState},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StaticStrings, StringId},
    object::Object,
    ops::{
        BinOp, CmpOp, Operations, UnOp, binary_op, compare_op, contains, delitem, getitem, hash_value, index_value,
        iter_next, iter_value, len_of, ops_for_carrier, ops_of, repr_value, setitem, str_value, truthy, unary_op,
    },
    resource::{DEFAULT_MAX_RECURSION_DEPTH, ResourceError, ResourceLimits},
    runtime::{Runtime, value_to_object},
    tracer::{CallTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{Instance, ModuleDef, Type, TypeFlags, TypeObject, TypeSpec},
    value::{Carrier, Value},
};
