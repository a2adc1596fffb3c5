//! The arbitrary-precision integer carrier.
//!
//! `int` adopts two carriers: the inline `i64` and this heap `BigInt`
//! wrapper. Arithmetic promotes into this carrier on overflow and results
//! normalise back into the inline carrier whenever they fit, so one logical
//! integer value has exactly one canonical representation.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    heap::{Heap, HeapData},
    resource::ResourceError,
    value::Value,
};

/// Heap storage for integers outside the `i64` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongInt(BigInt);

impl LongInt {
    #[must_use]
    pub fn new(value: BigInt) -> Self {
        Self(value)
    }

    /// The wrapped big integer.
    #[must_use]
    pub fn inner(&self) -> &BigInt {
        &self.0
    }

    /// Converts to `i64` when in range.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    /// Lossy conversion to `f64`; saturates to infinity out of range.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::INFINITY)
    }

    #[must_use]
    pub fn eq_i64(&self, other: i64) -> bool {
        self.0 == BigInt::from(other)
    }

    #[must_use]
    pub fn eq_f64(&self, other: f64) -> bool {
        other.is_finite() && other.trunc() == other && self.0 == big_from_f64(other)
    }

    /// Rough byte size for heap accounting.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        (self.0.bits() as usize).div_ceil(8)
    }

    /// Converts into a value, normalising into the inline carrier when the
    /// value fits. This keeps the canonical-representation invariant: a
    /// `BigInt` carrier never holds an `i64`-sized value.
    pub fn into_value(self, heap: &mut Heap) -> Result<Value, ResourceError> {
        if let Some(small) = self.to_i64() {
            return Ok(Value::Int(small));
        }
        Ok(Value::Ref(heap.allocate(HeapData::LongInt(self))?))
    }
}

impl From<i64> for LongInt {
    fn from(value: i64) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<BigInt> for LongInt {
    fn from(value: BigInt) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for LongInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Converts an integral, finite `f64` into a `BigInt` exactly.
pub(crate) fn big_from_f64(value: f64) -> BigInt {
    debug_assert!(value.is_finite() && value.trunc() == value);
    num_traits::FromPrimitive::from_f64(value).unwrap_or_default()
}
