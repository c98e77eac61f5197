//! Element types the kernels can be specialised for.
//!
//! [`Element`] ties a Rust scalar to its [`DType`]; [`ScatterElement`] adds
//! the vector-unit addition used by `scatter_nd_add`. Single-byte integers
//! have no native add on the vector unit, so their addition widens both
//! operands to `f16`, adds, and narrows the sum back.

use aicore_common::DType;
use half::f16;
use std::fmt::Debug;

/// A scalar type with a fixed device dtype.
pub trait Element: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    const DTYPE: DType;
}

/// Element types accepted by `scatter_nd_add`.
pub trait ScatterElement: Element {
    /// `self + rhs` with the vector unit's semantics for this type.
    fn vadd(self, rhs: Self) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(impl Element for $ty {
            const DTYPE: DType = $dtype;
        })*
    };
}

impl_element!(
    f16 => DType::Float16,
    f32 => DType::Float32,
    i8 => DType::Int8,
    u8 => DType::Uint8,
    i32 => DType::Int32,
    i64 => DType::Int64,
);

impl ScatterElement for f32 {
    #[inline]
    fn vadd(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl ScatterElement for f16 {
    #[inline]
    fn vadd(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl ScatterElement for i32 {
    #[inline]
    fn vadd(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl ScatterElement for i8 {
    #[inline]
    fn vadd(self, rhs: Self) -> Self {
        narrow_i8(widen(self as f32) + widen(rhs as f32))
    }
}

impl ScatterElement for u8 {
    #[inline]
    fn vadd(self, rhs: Self) -> Self {
        narrow_u8(widen(self as f32) + widen(rhs as f32))
    }
}

#[inline]
fn widen(v: f32) -> f16 {
    f16::from_f32(v)
}

/// f16 -> i8, truncating toward zero and saturating at the type bounds.
#[inline]
pub fn narrow_i8(v: f16) -> i8 {
    v.to_f32() as i8
}

/// f16 -> u8, truncating toward zero and saturating at the type bounds.
#[inline]
pub fn narrow_u8(v: f16) -> u8 {
    v.to_f32() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtypes() {
        assert_eq!(<f16 as Element>::DTYPE, DType::Float16);
        assert_eq!(<u8 as Element>::DTYPE, DType::Uint8);
    }

    #[test]
    fn int8_widened_add_matches_direct_add_in_range() {
        for a in -128i16..=127 {
            for b in [-100i16, -1, 0, 1, 57] {
                let sum = a + b;
                if (-128..=127).contains(&sum) {
                    assert_eq!((a as i8).vadd(b as i8), sum as i8, "{a} + {b}");
                }
            }
        }
    }

    #[test]
    fn int8_widened_add_saturates() {
        assert_eq!(100i8.vadd(100), i8::MAX);
        assert_eq!((-100i8).vadd(-100), i8::MIN);
        assert_eq!(200u8.vadd(100), u8::MAX);
    }

    #[test]
    fn int32_add_wraps() {
        assert_eq!(i32::MAX.vadd(1), i32::MIN);
    }

    #[test]
    fn f16_add() {
        let a = f16::from_f32(1.5);
        assert_eq!(a.vadd(a).to_f32(), 3.0);
    }
}
