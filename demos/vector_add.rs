// demos/vector_add.rs
//
// Element-wise `c = a + b` over one million floats.
//
// Usage:
//   cargo run --example vector_add --release
//   RUST_LOG=gridline=debug cargo run --example vector_add

use gridline::{DeviceContext, HostAccess, KernelArg, ParallelTask};
use tracing_subscriber::EnvFilter;

const VECTOR_ADD: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read_write> c: array<f32>;
@group(0) @binding(3) var<uniform> n: u32;

@compute @workgroup_size(256)
fn vector_add(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= n) { return; }
    c[gid.x] = a[gid.x] + b[gid.x];
}
"#;

const N: u32 = 1 << 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ctx = DeviceContext::create()?;
    println!("Device: {ctx}");

    let a: Vec<f32> = (0..N).map(|i| i as f32).collect();
    let b: Vec<f32> = (0..N).map(|i| (N - i) as f32 * 0.5).collect();

    let a_mem = ctx.allocate_buffer_from(&a, HostAccess::Write)?;
    let b_mem = ctx.allocate_buffer_from(&b, HostAccess::Write)?;
    let c_mem = ctx.allocate_buffer_zeroed::<f32>(N as usize, HostAccess::Read)?;

    let add = ParallelTask::new(&ctx, VECTOR_ADD, None)?;
    add.execute(
        N,
        [
            KernelArg::from(&a_mem),
            KernelArg::from(&b_mem),
            KernelArg::from(&c_mem),
            N.into(),
        ],
        None,
    )?;

    let c: Vec<f32> = c_mem.read_vec()?;
    let mismatches = c
        .iter()
        .zip(a.iter().zip(&b))
        .filter(|(got, (x, y))| **got != *x + *y)
        .count();

    println!("c[0..4]   = {:?}", &c[..4]);
    println!("c[last]   = {}", c[c.len() - 1]);
    println!("mismatches: {mismatches} / {N}");
    if mismatches != 0 {
        std::process::exit(1);
    }
    Ok(())
}
