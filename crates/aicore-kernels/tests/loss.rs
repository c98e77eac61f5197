//! Integration tests for `binary_cross_entropy`.

use aicore_common::{DType, KernelKind, SocConfig, SocVersion, TensorDesc};
use aicore_kernels::{
    BinaryCrossEntropyKernel, KernelContext, LossOutput, LossReduction, binary_cross_entropy,
};
use half::f16;

fn build(soc_version: SocVersion, dtype: &str, weighted: bool, reduction: &str) -> BinaryCrossEntropyKernel {
    let mut ctx = KernelContext::new(SocConfig { soc_version, ..SocConfig::default() }).unwrap();
    let d = TensorDesc::new(vec![-1], dtype);
    binary_cross_entropy(&d, &d, weighted.then_some(&d), &d, reduction, "bce", &mut ctx).unwrap()
}

fn reference(x: &[f32], y: &[f32]) -> Vec<f32> {
    x.iter()
        .zip(y)
        .map(|(&x, &y)| {
            let x = x.max(1e-12);
            -(y * x.ln() + (1.0 - y) * (1.0 - x).max(1e-12).ln())
        })
        .collect()
}

// ── Reductions ───────────────────────────────────────────────────────

#[test]
fn elementwise_matches_reference() {
    let kernel = build(SocVersion::Ascend910, "float32", false, "none");
    let x = [0.1f32, 0.4, 0.7, 0.95, 1.0];
    let y = [0.0f32, 1.0, 0.5, 1.0, 0.0];
    let LossOutput::Elementwise(out) = kernel.run(&x, &y, None).unwrap() else {
        panic!("expected elementwise output");
    };
    for (got, want) in out.iter().zip(reference(&x, &y)) {
        assert!((got - want).abs() < 1e-5, "{got} vs {want}");
    }
}

#[test]
fn mean_equals_sum_over_count() {
    let x: Vec<f32> = (1..=8).map(|i| i as f32 / 10.0).collect();
    let y: Vec<f32> = (0..8).map(|i| (i % 2) as f32).collect();
    let sum = build(SocVersion::Ascend910, "float32", false, "sum").run(&x, &y, None).unwrap();
    let mean = build(SocVersion::Ascend910, "float32", false, "mean").run(&x, &y, None).unwrap();
    let (sum, mean) = (sum.scalar().unwrap(), mean.scalar().unwrap());
    assert!((mean - sum / 8.0).abs() < 1e-5);
}

#[test]
fn weighted_sum() {
    let kernel = build(SocVersion::Ascend610, "float32", true, "sum");
    let out = kernel.run(&[0.5f32, 0.5, 0.5], &[1.0; 3], Some(&[1.0, 2.0, 3.0])).unwrap();
    assert!((out.scalar().unwrap() - 6.0 * std::f32::consts::LN_2).abs() < 1e-5);
}

// ── Precision ────────────────────────────────────────────────────────

#[test]
fn float16_output_stays_float16() {
    let kernel = build(SocVersion::Ascend910, "float16", false, "none");
    assert_eq!(kernel.dtype(), DType::Float16);
    assert_eq!(kernel.compute_dtype(), DType::Float32);
    let x = [f16::from_f32(0.25), f16::from_f32(0.75)];
    let y = [f16::ONE, f16::ZERO];
    let LossOutput::Elementwise(out) = kernel.run(&x, &y, None).unwrap() else {
        panic!("expected elementwise output");
    };
    let want = -(0.25f32).ln();
    assert!((out[0].to_f32() - want).abs() < 1e-3);
    assert!((out[1].to_f32() - want).abs() < 1e-3);
}

#[test]
fn consumer_parts_compute_in_float16() {
    let kernel = build(SocVersion::SD3403, "float16", false, "sum");
    assert_eq!(kernel.compute_dtype(), DType::Float16);
    let x = vec![f16::from_f32(0.5); 16];
    let y = vec![f16::ZERO; 16];
    let out = kernel.run(&x, &y, None).unwrap().scalar().unwrap();
    assert!((out.to_f32() - 16.0 * std::f32::consts::LN_2).abs() < 0.05);
}

// ── Build ────────────────────────────────────────────────────────────

#[test]
fn registers_compile_info() {
    let mut ctx = KernelContext::new(SocConfig::default()).unwrap();
    let d = TensorDesc::new(vec![8], "float32");
    binary_cross_entropy(&d, &d, None, &d, "sum", "bce_sum", &mut ctx).unwrap();
    let artifact = ctx.registry().get("bce_sum").unwrap();
    assert_eq!(artifact.kind, KernelKind::BinaryCrossEntropy);
    assert_eq!(artifact.compile_info.get("reduction").and_then(|v| v.as_str()), Some("sum"));
    assert!(artifact.compile_info.get("reduce_mean_cof_dtype").is_none());
}

#[test]
fn reduction_is_case_sensitive() {
    let mut ctx = KernelContext::new(SocConfig::default()).unwrap();
    let d = TensorDesc::new(vec![8], "float32");
    assert!(binary_cross_entropy(&d, &d, None, &d, "Mean", "bce", &mut ctx).is_err());
    assert_eq!("mean".parse::<LossReduction>().unwrap(), LossReduction::Mean);
}

#[test]
fn weight_dtype_must_match() {
    let mut ctx = KernelContext::new(SocConfig::default()).unwrap();
    let d = TensorDesc::new(vec![8], "float32");
    let w = TensorDesc::new(vec![8], "float16");
    let err = binary_cross_entropy(&d, &d, Some(&w), &d, "mean", "bce", &mut ctx).unwrap_err();
    assert!(err.to_string().contains("'weight'"));
}

#[test]
fn integer_inputs_are_rejected() {
    let mut ctx = KernelContext::new(SocConfig::default()).unwrap();
    let d = TensorDesc::new(vec![8], "int32");
    assert!(binary_cross_entropy(&d, &d, None, &d, "mean", "bce", &mut ctx).is_err());
    assert!(ctx.registry().is_empty());
}
