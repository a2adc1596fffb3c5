//! Native operation handles for the numeric tower: `bool` < `int` < `float`.
//!
//! Integer arithmetic works across both integer carriers (inline `i64` and
//! heap `BigInt`) and accepts `bool` operands, which is how booleans demote
//! to integer arithmetic (`True + True == 2`, `True | 2 == 3`). Inline
//! results that overflow promote to the `BigInt` carrier; `BigInt` results
//! normalise back down when they fit.
//!
//! Every handle returns the `NotImplemented` sentinel for foreign operand
//! types so the dispatcher can apply the reflected rule.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    heap::{Heap, HeapData},
    ops::{Operations, bin, hash_slot, un},
    py_hash,
    runtime::Runtime,
    types::{
        long_int::{LongInt, big_from_f64},
        str::Str,
    },
    value::Value,
};

/// An integer operand extracted from either carrier (or a bool).
enum IntOperand {
    Small(i64),
    Big(BigInt),
}

/// Extracts an integer operand; `None` for non-integer values.
fn as_int_operand(v: &Value, heap: &Heap) -> Option<IntOperand> {
    match v {
        Value::Int(i) => Some(IntOperand::Small(*i)),
        Value::Bool(b) => Some(IntOperand::Small(i64::from(*b))),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::LongInt(li) => Some(IntOperand::Big(li.inner().clone())),
            _ => None,
        },
        _ => None,
    }
}

/// Extracts a float operand, coercing integer carriers.
fn as_float_operand(v: &Value, heap: &Heap) -> Option<f64> {
    match v {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(f64::from(*b)),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::LongInt(li) => Some(li.to_f64()),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a value belongs to the numeric tower at all.
fn is_numeric(v: &Value, heap: &Heap) -> bool {
    as_float_operand(v, heap).is_some()
}

/// Numeric ordering across all carriers. `None` when either operand is not
/// numeric or the comparison is unordered (NaN).
fn numeric_cmp(v: &Value, w: &Value, heap: &Heap) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_int_operand(v, heap), as_int_operand(w, heap)) {
        return Some(match (a, b) {
            (IntOperand::Small(x), IntOperand::Small(y)) => x.cmp(&y),
            (IntOperand::Small(x), IntOperand::Big(y)) => BigInt::from(x).cmp(&y),
            (IntOperand::Big(x), IntOperand::Small(y)) => x.cmp(&BigInt::from(y)),
            (IntOperand::Big(x), IntOperand::Big(y)) => x.cmp(&y),
        });
    }
    let a = as_float_operand(v, heap)?;
    let b = as_float_operand(w, heap)?;
    a.partial_cmp(&b)
}

macro_rules! int_binary {
    ($name:ident, $checked:ident, $big_op:expr) => {
        fn $name(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
            let (Some(a), Some(b)) = (as_int_operand(v, &rt.heap), as_int_operand(w, &rt.heap)) else {
                return Ok(Value::NotImplemented);
            };
            match (a, b) {
                (IntOperand::Small(x), IntOperand::Small(y)) => match x.$checked(y) {
                    Some(out) => Ok(Value::Int(out)),
                    // Overflow promotes to the BigInt carrier.
                    None => {
                        let big = $big_op(BigInt::from(x), BigInt::from(y));
                        Ok(LongInt::new(big).into_value(&mut rt.heap)?)
                    }
                },
                (a, b) => {
                    let (x, y) = (int_operand_big(a), int_operand_big(b));
                    Ok(LongInt::new($big_op(x, y)).into_value(&mut rt.heap)?)
                }
            }
        }
    };
}

fn int_operand_big(op: IntOperand) -> BigInt {
    match op {
        IntOperand::Small(x) => BigInt::from(x),
        IntOperand::Big(x) => x,
    }
}

int_binary!(int_add, checked_add, |x, y| x + y);
int_binary!(int_sub, checked_sub, |x, y| x - y);
int_binary!(int_mul, checked_mul, |x, y| x * y);

fn int_rsub(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_sub(w, v, rt)
}

fn int_bitwise(v: &Value, w: &Value, rt: &mut Runtime, op: fn(BigInt, BigInt) -> BigInt, small: fn(i64, i64) -> i64) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_int_operand(v, &rt.heap), as_int_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    match (a, b) {
        (IntOperand::Small(x), IntOperand::Small(y)) => Ok(Value::Int(small(x, y))),
        (a, b) => {
            let out = op(int_operand_big(a), int_operand_big(b));
            Ok(LongInt::new(out).into_value(&mut rt.heap)?)
        }
    }
}

fn int_and(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_bitwise(v, w, rt, |x, y| x & y, |x, y| x & y)
}

fn int_or(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_bitwise(v, w, rt, |x, y| x | y, |x, y| x | y)
}

fn int_xor(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_bitwise(v, w, rt, |x, y| x ^ y, |x, y| x ^ y)
}

/// True division always yields a float; division by zero raises.
fn int_truediv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_float_operand(v, &rt.heap), as_float_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    if as_int_operand(w, &rt.heap).is_none() {
        return Ok(Value::NotImplemented);
    }
    if b == 0.0 {
        return Err(ExcType::zero_division());
    }
    Ok(Value::Float(a / b))
}

fn int_rtruediv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_truediv(w, v, rt)
}

fn int_floordiv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_int_operand(v, &rt.heap), as_int_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    match (a, b) {
        (IntOperand::Small(x), IntOperand::Small(y)) => {
            if y == 0 {
                return Err(ExcType::zero_division());
            }
            Ok(Value::Int(x.div_floor(&y)))
        }
        (a, b) => {
            let (x, y) = (int_operand_big(a), int_operand_big(b));
            if y.is_zero() {
                return Err(ExcType::zero_division());
            }
            Ok(LongInt::new(x.div_floor(&y)).into_value(&mut rt.heap)?)
        }
    }
}

fn int_rfloordiv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_floordiv(w, v, rt)
}

fn int_mod(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_int_operand(v, &rt.heap), as_int_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    match (a, b) {
        (IntOperand::Small(x), IntOperand::Small(y)) => {
            if y == 0 {
                return Err(ExcType::zero_modulo());
            }
            Ok(Value::Int(x.mod_floor(&y)))
        }
        (a, b) => {
            let (x, y) = (int_operand_big(a), int_operand_big(b));
            if y.is_zero() {
                return Err(ExcType::zero_modulo());
            }
            Ok(LongInt::new(x.mod_floor(&y)).into_value(&mut rt.heap)?)
        }
    }
}

fn int_rmod(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    int_mod(w, v, rt)
}

fn int_neg(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match as_int_operand(v, &rt.heap) {
        Some(IntOperand::Small(x)) => match x.checked_neg() {
            Some(out) => Ok(Value::Int(out)),
            None => Ok(LongInt::new(-BigInt::from(x)).into_value(&mut rt.heap)?),
        },
        Some(IntOperand::Big(x)) => Ok(LongInt::new(-x).into_value(&mut rt.heap)?),
        None => Err(RunError::internal("int neg slot on non-integer carrier")),
    }
}

fn int_abs(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match as_int_operand(v, &rt.heap) {
        Some(IntOperand::Small(x)) => match x.checked_abs() {
            Some(out) => Ok(Value::Int(out)),
            None => Ok(LongInt::new(BigInt::from(x).abs()).into_value(&mut rt.heap)?),
        },
        Some(IntOperand::Big(x)) => Ok(LongInt::new(x.abs()).into_value(&mut rt.heap)?),
        None => Err(RunError::internal("int abs slot on non-integer carrier")),
    }
}

fn int_truth(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    Ok(Value::Bool(v.py_bool(&rt.heap, &rt.interns)))
}

/// `int` conversion: identity for either integer carrier.
fn int_int(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    Ok(v.clone_with_heap(&rt.heap))
}

fn int_float(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    match as_float_operand(v, &rt.heap) {
        Some(f) => Ok(Value::Float(f)),
        None => Err(RunError::internal("int float slot on non-integer carrier")),
    }
}

fn int_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let text = match v {
        Value::Int(i) => i.to_string(),
        Value::Bool(_) => unreachable!("bool has its own repr slot"),
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::LongInt(li) => li.to_string(),
            _ => return Err(RunError::internal("int repr slot on non-integer carrier")),
        },
        _ => return Err(RunError::internal("int repr slot on non-integer carrier")),
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::new(text)))?))
}

fn num_hash(v: &Value, rt: &Runtime) -> RunResult<i64> {
    match v {
        Value::Int(i) => Ok(py_hash::hash_int(*i)),
        Value::Bool(b) => Ok(py_hash::hash_int(i64::from(*b))),
        Value::Float(f) => Ok(py_hash::hash_float(*f)),
        Value::Ref(id) => match rt.heap.get(*id) {
            HeapData::LongInt(li) => Ok(py_hash::hash_bigint(li.inner())),
            _ => Err(RunError::internal("numeric hash slot on non-numeric carrier")),
        },
        _ => Err(RunError::internal("numeric hash slot on non-numeric carrier")),
    }
}

macro_rules! num_compare {
    ($name:ident, $($pat:pat_param)|+) => {
        fn $name(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
            if !is_numeric(w, &rt.heap) {
                return Ok(Value::NotImplemented);
            }
            match numeric_cmp(v, w, &rt.heap) {
                Some(ordering) => Ok(Value::Bool(matches!(ordering, $($pat)|+))),
                // Unordered (NaN operand): every ordering test is false.
                None => Ok(Value::Bool(false)),
            }
        }
    };
}

num_compare!(num_lt, Ordering::Less);
num_compare!(num_le, Ordering::Less | Ordering::Equal);
num_compare!(num_ge, Ordering::Greater | Ordering::Equal);
num_compare!(num_gt, Ordering::Greater);

fn num_eq(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if !is_numeric(w, &rt.heap) {
        return Ok(Value::NotImplemented);
    }
    Ok(Value::Bool(v.py_eq(w, &rt.heap, &rt.interns)))
}

fn num_ne(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    if !is_numeric(w, &rt.heap) {
        return Ok(Value::NotImplemented);
    }
    Ok(Value::Bool(!v.py_eq(w, &rt.heap, &rt.interns)))
}

/// The `int` carrier tables. Both carriers (`Int64`, `BigInt`) share it.
pub(crate) const INT_OPS: Operations = Operations {
    repr: un(int_repr),
    hash: hash_slot(num_hash),
    lt: bin(num_lt),
    le: bin(num_le),
    eq: bin(num_eq),
    ne: bin(num_ne),
    ge: bin(num_ge),
    gt: bin(num_gt),
    add: bin(int_add),
    radd: bin(int_add),
    sub: bin(int_sub),
    rsub: bin(int_rsub),
    mul: bin(int_mul),
    rmul: bin(int_mul),
    truediv: bin(int_truediv),
    rtruediv: bin(int_rtruediv),
    floordiv: bin(int_floordiv),
    rfloordiv: bin(int_rfloordiv),
    mod_: bin(int_mod),
    rmod: bin(int_rmod),
    and_: bin(int_and),
    rand: bin(int_and),
    or_: bin(int_or),
    ror: bin(int_or),
    xor: bin(int_xor),
    rxor: bin(int_xor),
    neg: un(int_neg),
    abs: un(int_abs),
    bool_: un(int_truth),
    int: un(int_int),
    float: un(int_float),
    index: un(int_int),
    ..Operations::EMPTY
};

// --- bool ---------------------------------------------------------------

fn bool_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let Value::Bool(b) = v else {
        return Err(RunError::internal("bool repr slot on non-bool carrier"));
    };
    let text = if *b { "True" } else { "False" };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::new(text)))?))
}

macro_rules! bool_bitwise {
    ($name:ident, $op:tt) => {
        /// Bool-typed result only when both operands are bools; any other
        /// operand demotes to integer arithmetic via the reflected rule.
        fn $name(v: &Value, w: &Value, _rt: &mut Runtime) -> RunResult<Value> {
            match (v, w) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a $op *b)),
                _ => Ok(Value::NotImplemented),
            }
        }
    };
}

bool_bitwise!(bool_and, &);
bool_bitwise!(bool_or, |);
bool_bitwise!(bool_xor, ^);

/// The `bool` table. Arithmetic is inherited from `int` during publication.
pub(crate) const BOOL_OPS: Operations = Operations {
    repr: un(bool_repr),
    hash: hash_slot(num_hash),
    and_: bin(bool_and),
    rand: bin(bool_and),
    or_: bin(bool_or),
    ror: bin(bool_or),
    xor: bin(bool_xor),
    rxor: bin(bool_xor),
    ..Operations::EMPTY
};

// --- float ---------------------------------------------------------------

macro_rules! float_binary {
    ($name:ident, $op:tt) => {
        fn $name(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
            let (Some(a), Some(b)) = (as_float_operand(v, &rt.heap), as_float_operand(w, &rt.heap)) else {
                return Ok(Value::NotImplemented);
            };
            Ok(Value::Float(a $op b))
        }
    };
}

float_binary!(float_add, +);
float_binary!(float_mul, *);

fn float_sub(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_float_operand(v, &rt.heap), as_float_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    Ok(Value::Float(a - b))
}

fn float_rsub(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    float_sub(w, v, rt)
}

fn float_truediv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_float_operand(v, &rt.heap), as_float_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    if b == 0.0 {
        return Err(SimpleException::new_msg(ExcType::ZeroDivisionError, "float division by zero").into());
    }
    Ok(Value::Float(a / b))
}

fn float_rtruediv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    float_truediv(w, v, rt)
}

fn float_floordiv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_float_operand(v, &rt.heap), as_float_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    if b == 0.0 {
        return Err(SimpleException::new_msg(ExcType::ZeroDivisionError, "float floor division by zero").into());
    }
    Ok(Value::Float((a / b).floor()))
}

fn float_rfloordiv(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    float_floordiv(w, v, rt)
}

fn float_mod(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let (Some(a), Some(b)) = (as_float_operand(v, &rt.heap), as_float_operand(w, &rt.heap)) else {
        return Ok(Value::NotImplemented);
    };
    if b == 0.0 {
        return Err(SimpleException::new_msg(ExcType::ZeroDivisionError, "float modulo").into());
    }
    // Sign follows the divisor, as floor-division modulo requires.
    let out = a - b * (a / b).floor();
    Ok(Value::Float(out))
}

fn float_rmod(v: &Value, w: &Value, rt: &mut Runtime) -> RunResult<Value> {
    float_mod(w, v, rt)
}

fn float_neg(v: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    match v {
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(RunError::internal("float neg slot on non-float carrier")),
    }
}

fn float_abs(v: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    match v {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        _ => Err(RunError::internal("float abs slot on non-float carrier")),
    }
}

/// `int(float)`: truncates toward zero, promoting to the `BigInt` carrier
/// outside the inline range. Non-finite input raises: infinity overflows
/// the conversion to an arbitrary-precision integer, NaN has no integer
/// value at all.
fn float_int(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let Value::Float(f) = v else {
        return Err(RunError::internal("float int slot on non-float carrier"));
    };
    if f.is_nan() {
        return Err(SimpleException::new_msg(ExcType::ValueError, "cannot convert float NaN to integer").into());
    }
    if f.is_infinite() {
        return Err(ExcType::overflow_float_to_int("infinity"));
    }
    let truncated = f.trunc();
    if let Some(small) = truncated.to_i64() {
        return Ok(Value::Int(small));
    }
    Ok(LongInt::new(big_from_f64(truncated)).into_value(&mut rt.heap)?)
}

fn float_float(v: &Value, _rt: &mut Runtime) -> RunResult<Value> {
    match v {
        Value::Float(f) => Ok(Value::Float(*f)),
        _ => Err(RunError::internal("float float slot on non-float carrier")),
    }
}

fn float_repr(v: &Value, rt: &mut Runtime) -> RunResult<Value> {
    let Value::Float(f) = v else {
        return Err(RunError::internal("float repr slot on non-float carrier"));
    };
    Ok(Value::Ref(rt.heap.allocate(HeapData::Str(Str::new(format_float(*f))))?))
}

/// Shortest round-trip float formatting in the Language's notation.
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    let text = buffer.format_finite(value);
    // ryu prints `1e300`; the Language notation is `1e+300`.
    match text.find('e') {
        Some(pos) if !matches!(text.as_bytes().get(pos + 1), Some(b'-' | b'+')) => {
            format!("{}e+{}", &text[..pos], &text[pos + 1..])
        }
        _ => text.to_owned(),
    }
}

/// The `float` table.
pub(crate) const FLOAT_OPS: Operations = Operations {
    repr: un(float_repr),
    hash: hash_slot(num_hash),
    lt: bin(num_lt),
    le: bin(num_le),
    eq: bin(num_eq),
    ne: bin(num_ne),
    ge: bin(num_ge),
    gt: bin(num_gt),
    add: bin(float_add),
    radd: bin(float_add),
    sub: bin(float_sub),
    rsub: bin(float_rsub),
    mul: bin(float_mul),
    rmul: bin(float_mul),
    truediv: bin(float_truediv),
    rtruediv: bin(float_rtruediv),
    floordiv: bin(float_floordiv),
    rfloordiv: bin(float_rfloordiv),
    mod_: bin(float_mod),
    rmod: bin(float_rmod),
    neg: un(float_neg),
    abs: un(float_abs),
    bool_: un(int_truth),
    int: un(float_int),
    float: un(float_float),
    ..Operations::EMPTY
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(1e300), "1e+300");
        assert_eq!(format_float(1e-300), "1e-300");
    }
}
