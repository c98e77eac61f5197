//! Parameter validation as seen by kernel builders.

use aicore_common::{
    AicoreError, CompileInfo, DType, KernelArtifact, KernelKind, KernelRegistry, ParamError,
    TensorDesc, check_same_dtype,
};

// ── Dtype allow-lists ────────────────────────────────────────────────

#[test]
fn unknown_dtype_names_parameter() {
    let desc = TensorDesc::new(vec![4], "BFloat16");
    let err = desc.check_dtype("broadcast_to", "x", &[DType::Float16, DType::Float32]).unwrap_err();
    assert_eq!(err.kernel(), "broadcast_to");
    assert_eq!(err.field(), "x");
    insta::assert_snapshot!(err.to_string(), @"broadcast_to: dtype of 'x' is bfloat16, expected one of [float16, float32]");
}

#[test]
fn dtype_names_are_case_insensitive() {
    let desc = TensorDesc::new(vec![4], "Float16");
    assert_eq!(desc.check_dtype("k", "x", &[DType::Float16]).unwrap(), DType::Float16);
}

#[test]
fn mismatch_wraps_into_top_level_error() {
    let err: AicoreError =
        check_same_dtype("scatter_nd_add", "adds", DType::Float16, "var", DType::Float32)
            .unwrap_err()
            .into();
    assert!(matches!(err, AicoreError::Param(ParamError::DtypeMismatch { .. })));
    insta::assert_snapshot!(err.to_string(), @"parameter error: scatter_nd_add: dtype of 'adds' (float16) must equal dtype of 'var' (float32)");
}

// ── Registry ─────────────────────────────────────────────────────────

#[test]
fn rebuild_replaces_artifact() {
    let mut registry = KernelRegistry::new();
    let artifact = |dtype| KernelArtifact {
        name: "k".to_string(),
        kind: KernelKind::BroadcastTo,
        dtype,
        compile_info: CompileInfo::new(),
    };
    assert!(registry.register(artifact(DType::Int8)).is_none());
    let old = registry.register(artifact(DType::Int32)).unwrap();
    assert_eq!(old.dtype, DType::Int8);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("k").unwrap().dtype, DType::Int32);
}
