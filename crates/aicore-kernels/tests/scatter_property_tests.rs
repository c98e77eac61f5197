//! Property tests for `scatter_nd_add`.
//!
//! 1. **Range disjointness** – owned ranges of distinct units never intersect.
//! 2. **Order independence** – permuting tuples (with their update rows) does
//!    not change the integer result, which always matches a row-wise reference.
//! 3. **Tail isolation** – unaligned rows never touch elements outside the target row.
//! 4. **Linearization** – zero strides give a fixed offset; row-major strides
//!    reproduce row-major linear offsets.

use aicore_common::{SocConfig, TensorDesc};
use aicore_kernels::scatter_nd_add::{IndexResolver, RangeGate, TilingMode, row_major_strides};
use aicore_kernels::{KernelContext, ScatterNdAddKernel, scatter_nd_add};
use proptest::prelude::*;

fn kernel(core_num: usize) -> ScatterNdAddKernel {
    let mut ctx = KernelContext::new(SocConfig { core_num, ..SocConfig::default() }).unwrap();
    let any = TensorDesc::new(vec![-1], "int32");
    scatter_nd_add(&any, &TensorDesc::new(vec![-1, 1], "int32"), &any, &any, false, "prop", &mut ctx)
        .unwrap()
}

fn run(kernel: &ScatterNdAddKernel, rows: usize, width: usize, indices: &[i32], adds: &[i32]) -> Vec<i32> {
    let plan = kernel.planner().plan(&[rows, width], &[indices.len(), 1]).unwrap();
    let mut var: Vec<i32> = (0..rows * width).map(|i| i as i32 * 3).collect();
    kernel.launch(&plan.encode(), &mut var, indices, adds).unwrap();
    var
}

fn reference(rows: usize, width: usize, indices: &[i32], adds: &[i32]) -> Vec<i32> {
    let mut var: Vec<i32> = (0..rows * width).map(|i| i as i32 * 3).collect();
    for (t, &row) in indices.iter().enumerate() {
        let dst = row as usize * width;
        for j in 0..width {
            var[dst + j] = var[dst + j].wrapping_add(adds[t * width + j]);
        }
    }
    var
}

/// `(rows, width, cores, indices)` with every index inside `0..rows`.
fn scatter_case() -> impl Strategy<Value = (usize, usize, usize, Vec<i32>)> {
    (1usize..7, 1usize..41, 1usize..5).prop_flat_map(|(rows, width, cores)| {
        (Just(rows), Just(width), Just(cores), prop::collection::vec(0..rows as i32, 1..12))
    })
}

// ---------------------------------------------------------------------------
// Properties: range gates
// ---------------------------------------------------------------------------

proptest! {
    /// Every offset is owned by exactly the unit `offset / step`.
    #[test]
    fn prop_owned_ranges_are_disjoint(step in 1usize..64, units in 1usize..9, offset in 0i64..600) {
        let owners: Vec<usize> = (0..units)
            .filter(|&u| RangeGate::new(u, step).owns(offset))
            .collect();
        prop_assert!(owners.len() <= 1, "offset {} owned by {:?}", offset, owners);
        let expected = offset as usize / step;
        if expected < units {
            prop_assert_eq!(owners, vec![expected]);
        }
    }

    /// Negative offsets are never owned.
    #[test]
    fn prop_negative_offsets_unowned(step in 1usize..64, unit in 0usize..8, offset in i64::MIN..0) {
        prop_assert!(!RangeGate::new(unit, step).owns(offset));
    }
}

// ---------------------------------------------------------------------------
// Properties: accumulation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Launch output equals the reference and ignores tuple order.
    #[test]
    fn prop_result_is_order_independent((rows, width, cores, indices) in scatter_case()) {
        let kernel = kernel(cores);
        let adds: Vec<i32> = (0..indices.len() * width).map(|i| (i as i32 % 13) - 6).collect();
        let forward = run(&kernel, rows, width, &indices, &adds);
        prop_assert_eq!(&forward, &reference(rows, width, &indices, &adds));

        let rev_indices: Vec<i32> = indices.iter().rev().copied().collect();
        let rev_adds: Vec<i32> = adds.chunks(width).rev().flatten().copied().collect();
        let backward = run(&kernel, rows, width, &rev_indices, &rev_adds);
        prop_assert_eq!(forward, backward);
    }

    /// With unaligned rows only the targeted row changes.
    #[test]
    fn prop_unaligned_tail_is_isolated(
        rows in 2usize..6,
        width in (9usize..64).prop_filter("unaligned", |w| w % 8 != 0),
        cores in 1usize..4,
        target in 0usize..6,
    ) {
        let target = target % rows;
        let kernel = kernel(cores);
        let plan = kernel.planner().plan(&[rows, width], &[1, 1]).unwrap();
        prop_assert_eq!(plan.mode, TilingMode::UnalignedStreamed);

        let before: Vec<i32> = (0..rows * width).map(|i| i as i32 * 3).collect();
        let after = run(&kernel, rows, width, &[target as i32], &vec![1; width]);
        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            if i / width == target {
                prop_assert_eq!(*a, b + 1, "element {} of target row", i);
            } else {
                prop_assert_eq!(a, b, "element {} outside target row", i);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Properties: index resolution
// ---------------------------------------------------------------------------

proptest! {
    /// All-zero strides resolve every tuple to zero.
    #[test]
    fn prop_zero_strides_fixed_offset(coords in prop::collection::vec(-100i32..100, 1..8)) {
        let strides = vec![0i64; coords.len()];
        prop_assert_eq!(IndexResolver::new(&strides).resolve(&coords, 0), 0);
    }

    /// Row-major strides reproduce row-major linearization.
    #[test]
    fn prop_row_major_linearization(
        dims in prop::collection::vec(1usize..6, 1..5),
        width in 1usize..10,
        seed in any::<u64>(),
    ) {
        let coords: Vec<i32> = dims
            .iter()
            .enumerate()
            .map(|(i, &d)| ((seed >> (i * 8)) % d as u64) as i32)
            .collect();
        let strides = row_major_strides(&dims, width);
        let linear = coords
            .iter()
            .zip(&dims)
            .fold(0usize, |acc, (&c, &d)| acc * d + c as usize);
        prop_assert_eq!(
            IndexResolver::new(&strides).resolve(&coords, 0),
            (linear * width) as i64
        );
    }
}
