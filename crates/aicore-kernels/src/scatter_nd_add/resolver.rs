//! Index tuple -> flat element offset.

/// Linearizes index tuples with the plan's strides.
///
/// Coordinates are not bounds-checked; the result may be negative or beyond
/// the target buffer, in which case no unit owns it.
#[derive(Debug, Clone, Copy)]
pub struct IndexResolver<'p> {
    strides: &'p [i64],
}

impl<'p> IndexResolver<'p> {
    pub fn new(strides: &'p [i64]) -> Self {
        Self { strides }
    }

    /// Flat offset of the tuple starting at `indices[base]`.
    ///
    /// Missing trailing coordinates (a truncated buffer) count as zero.
    #[inline]
    pub fn resolve(&self, indices: &[i32], base: usize) -> i64 {
        let coords = indices.get(base..).unwrap_or(&[]);
        self.strides
            .iter()
            .zip(coords)
            .fold(0i64, |acc, (&stride, &coord)| acc.wrapping_add(stride.wrapping_mul(coord as i64)))
    }
}
