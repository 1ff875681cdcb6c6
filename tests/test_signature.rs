// tests/test_signature.rs — Host-side validation: signatures, argument
// binding, work shapes and compile diagnostics. No device needed.

use gridline::kernel::{reflect, ArgKind, BuildOptions, ParamKind};
use gridline::shape::{plan_dispatch, WorkShape};
use gridline::{ComputeError, ElementFormat, ScalarType};

const INCREMENT: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;
@group(0) @binding(1) var<uniform> amount: u32;
@group(0) @binding(2) var<uniform> n: u32;

@compute @workgroup_size({{WG_X}})
fn increment(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= n) { return; }
    data[gid.x] = data[gid.x] + amount;
}
"#;

const HSV: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var hue: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var<uniform> scale: f32;

@compute @workgroup_size(8, 8)
fn split(@builtin(global_invocation_id) gid: vec3<u32>) {
    let c = textureLoad(src, vec2<i32>(gid.xy), 0);
    textureStore(hue, vec2<i32>(gid.xy), c * scale);
}

@compute @workgroup_size(8, 8)
fn passthrough(@builtin(global_invocation_id) gid: vec3<u32>) {
    textureStore(hue, vec2<i32>(gid.xy), textureLoad(src, vec2<i32>(gid.xy), 0));
}
"#;

fn increment_source() -> String {
    BuildOptions::new().define("WG_X", 64).apply(INCREMENT).unwrap()
}

fn buf(bytes: u64) -> ArgKind {
    ArgKind::Buffer { byte_length: bytes }
}

// ===== Argument binding =====

#[test]
fn exact_arguments_accepted() {
    let layout = reflect(&increment_source()).unwrap();
    let sig = layout.kernel("increment").unwrap();
    sig.check_args(&[buf(64), ArgKind::Scalar(ScalarType::U32), ArgKind::Scalar(ScalarType::U32)])
        .unwrap();
}

#[test]
fn one_too_few_arguments() {
    let layout = reflect(&increment_source()).unwrap();
    let sig = layout.kernel("increment").unwrap();
    let err = sig
        .check_args(&[buf(64), ArgKind::Scalar(ScalarType::U32)])
        .unwrap_err();
    match err {
        ComputeError::ArgumentBinding { position, entry_point, reason } => {
            assert_eq!(position, 2);
            assert_eq!(entry_point, "increment");
            assert!(reason.contains("expected 3"), "{reason}");
        }
        other => panic!("expected ArgumentBinding, got {other:?}"),
    }
}

#[test]
fn one_too_many_arguments() {
    let layout = reflect(&increment_source()).unwrap();
    let sig = layout.kernel("increment").unwrap();
    let s = ArgKind::Scalar(ScalarType::U32);
    let err = sig.check_args(&[buf(64), s, s, s]).unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentBinding { position: 3, .. }));
}

#[test]
fn scalar_where_memory_expected() {
    let layout = reflect(&increment_source()).unwrap();
    let sig = layout.kernel("increment").unwrap();
    let s = ArgKind::Scalar(ScalarType::U32);
    let err = sig.check_args(&[s, s, s]).unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentBinding { position: 0, .. }));
    assert!(err.to_string().contains("argument 0 of `increment`"), "{err}");
}

#[test]
fn memory_where_scalar_expected() {
    let layout = reflect(&increment_source()).unwrap();
    let sig = layout.kernel("increment").unwrap();
    let err = sig
        .check_args(&[buf(64), buf(4), ArgKind::Scalar(ScalarType::U32)])
        .unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentBinding { position: 1, .. }));
}

#[test]
fn image_format_must_match_storage_declaration() {
    let layout = reflect(HSV).unwrap();
    let sig = layout.kernel("split").unwrap();
    let f = ArgKind::Scalar(ScalarType::F32);
    let rgba8 = ArgKind::Image { format: ElementFormat::RGBA8_UNORM };
    sig.check_args(&[rgba8, rgba8, f]).unwrap();

    let wrong = ArgKind::Image { format: ElementFormat::RGBA32_FLOAT };
    let err = sig.check_args(&[rgba8, wrong, f]).unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentBinding { position: 1, .. }));

    // Sampled float textures accept float32 but not integer images.
    sig.check_args(&[wrong, rgba8, f]).unwrap();
    let uint = ArgKind::Image { format: ElementFormat::RGBA8_UINT };
    let err = sig.check_args(&[uint, rgba8, f]).unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentBinding { position: 0, .. }));
}

#[test]
fn entry_points_have_independent_signatures() {
    let layout = reflect(HSV).unwrap();
    assert_eq!(layout.entry_points(), vec!["split", "passthrough"]);
    let pass = layout.kernel("passthrough").unwrap();
    // `scale` is unused by passthrough, so it is not a parameter.
    assert_eq!(pass.params.len(), 2);
    assert!(matches!(pass.params[1].kind, ParamKind::StorageImage { .. }));
    assert!(layout.kernel("nope").is_none());
}

// ===== Work shape =====

#[test]
fn local_shape_must_divide_global() {
    let err = plan_dispatch(WorkShape::d1(1000), Some(WorkShape::d1(64)), [64, 1, 1], 65_535)
        .unwrap_err();
    assert!(matches!(err, ComputeError::WorkShape(_)));
}

#[test]
fn local_shape_2d() {
    let plan = plan_dispatch(
        WorkShape::d2(640, 480),
        Some(WorkShape::d2(8, 8)),
        [8, 8, 1],
        65_535,
    )
    .unwrap();
    assert_eq!(plan.workgroups, [80, 60, 1]);

    let err = plan_dispatch(
        WorkShape::d2(640, 481),
        Some(WorkShape::d2(8, 8)),
        [8, 8, 1],
        65_535,
    )
    .unwrap_err();
    assert!(err.to_string().contains("dimension 1"), "{err}");
}

#[test]
fn omitted_local_shape_always_plans() {
    for n in [1, 63, 64, 65, 1_000_003] {
        let plan = plan_dispatch(WorkShape::d1(n), None, [64, 1, 1], 65_535).unwrap();
        assert!(plan.workgroups[0] as u64 * 64 >= n as u64);
    }
}

// ===== Compile diagnostics =====

#[test]
fn malformed_source_reports_location() {
    let err = reflect("@compute @workgroup_size(1)\nfn main() {\n    let x: u32 = ;\n}\n").unwrap_err();
    match err {
        ComputeError::Compile { log } => {
            assert!(!log.is_empty());
            assert!(log.starts_with("wgsl:3:"), "{log}");
        }
        other => panic!("expected Compile, got {other:?}"),
    }
}

#[test]
fn type_error_is_a_compile_error() {
    let src = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;
@compute @workgroup_size(1)
fn main() {
    data[0] = 1.5;
}
"#;
    let err = reflect(src).unwrap_err();
    match err {
        ComputeError::Compile { log } => assert!(log.contains("error"), "{log}"),
        other => panic!("expected Compile, got {other:?}"),
    }
}

#[test]
fn missing_build_option_is_a_compile_error() {
    let err = BuildOptions::new().apply(INCREMENT).unwrap_err();
    match err {
        ComputeError::Compile { log } => {
            assert!(log.contains("{{WG_X}}"), "{log}");
            assert!(log.starts_with("wgsl:6:"), "{log}");
        }
        other => panic!("expected Compile, got {other:?}"),
    }
}
