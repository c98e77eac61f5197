//! Snapshot tests for stable aicore-kernels surfaces.
//! These pin the Display/JSON format of values the CLI and external planners read.

use aicore_common::{SocConfig, TensorDesc};
use aicore_kernels::{
    KernelContext, LossReduction, TilingMode, binary_cross_entropy, scatter_nd_add, select_format,
};

fn ctx(core_num: usize) -> KernelContext {
    KernelContext::new(SocConfig { core_num, ..SocConfig::default() }).unwrap()
}

#[test]
fn tiling_mode_display() {
    let names: Vec<String> = TilingMode::ALL.iter().map(|m| m.to_string()).collect();
    insta::assert_snapshot!(names.join(" "), @"aligned_resident(1) aligned_streamed(2) small_resident(3) small_streamed(4) unaligned_streamed(5)");
}

#[test]
fn scatter_compile_info_json() {
    let mut ctx = ctx(32);
    let d = TensorDesc::new(vec![4, 8], "float32");
    let kernel =
        scatter_nd_add(&d, &TensorDesc::new(vec![2, 1], "int32"), &d, &d, false, "snap", &mut ctx).unwrap();
    insta::assert_snapshot!(kernel.compile_info().to_json(), @r#"{"vars":{"core_num":32,"indices_size":4,"ub_size":169280,"var_size":4}}"#);
}

#[test]
fn tiling_blob_layout() {
    let mut ctx = ctx(2);
    let d = TensorDesc::new(vec![4, 8], "float32");
    let kernel =
        scatter_nd_add(&d, &TensorDesc::new(vec![2, 1], "int32"), &d, &d, false, "snap", &mut ctx).unwrap();
    let blob = kernel.planner().plan(&[4, 8], &[2, 1]).unwrap().encode();
    insta::assert_snapshot!(format!("{blob:?}"), @"[1, 16, 2, 8, 0, 2, 16, 0, 8, 8, 0, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, 0, 0, 0]");
}

#[test]
fn tiling_plan_json() {
    let mut ctx = ctx(2);
    let d = TensorDesc::new(vec![4, 8], "float32");
    let kernel =
        scatter_nd_add(&d, &TensorDesc::new(vec![2, 1], "int32"), &d, &d, false, "snap", &mut ctx).unwrap();
    let plan = kernel.planner().plan(&[4, 8], &[2, 1]).unwrap();
    insta::assert_snapshot!(serde_json::to_string(&plan).unwrap(), @r#"{"mode":"aligned_resident","index_step":16,"core_count":2,"update_width":8,"indices_loop_count":0,"indices_last_count":2,"adds_num":16,"updates_loop_count":0,"updates_last_count":8,"strides":[8,0,0,0,0,0,0],"indices_last_dim":1,"indices_front_dim":2}"#);
}

#[test]
fn invalid_reduction_message() {
    let d = TensorDesc::new(vec![4], "float32");
    let err = binary_cross_entropy(&d, &d, None, &d, "max", "bce", &mut ctx(1)).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"parameter error: binary_cross_entropy: invalid value 'max' for attribute 'reduction': reduction type should in mean/sum/none");
}

#[test]
fn loss_format_selection() {
    let x = TensorDesc::new(vec![32, 16, 7, 7], "float16").with_origin(vec![32, 16, 7, 7], "NCHW");
    let sel = select_format(&x, LossReduction::Sum, aicore_common::SocVersion::Ascend910);
    insta::assert_snapshot!(format!("{} | {}", sel.dtypes(), sel.formats()), @"float16,float32,float16,float32 | ND,ND,FRACTAL_Z,FRACTAL_Z");
}
