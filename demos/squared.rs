// demos/squared.rs
//
// Stateful computation: one buffer is both input and output of a kernel
// that is re-executed without reallocating or copying back in between.
//
// Usage:
//   cargo run --example squared -- [steps]

use std::env;

use gridline::{DeviceContext, HostAccess, KernelArg, ParallelTask};
use tracing_subscriber::EnvFilter;

const SQUARE: &str = r#"
@group(0) @binding(0) var<storage, read_write> values: array<f32>;
@group(0) @binding(1) var<uniform> n: u32;

@compute @workgroup_size(64)
fn square(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= n) { return; }
    values[gid.x] = values[gid.x] * values[gid.x];
}
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let steps: usize = env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(5);

    let ctx = DeviceContext::create()?;
    let initial = [1.01f32, 1.1, 0.9, 2.0];
    let n = initial.len() as u32;
    let values = ctx.allocate_buffer_from(&initial, HostAccess::ReadWrite)?;
    let square = ParallelTask::new(&ctx, SQUARE, None)?;

    println!("step 0: {initial:?}");
    for step in 1..=steps {
        square.execute(n, [KernelArg::from(&values), n.into()], None)?;
        ctx.synchronize()?;
        let now: Vec<f32> = values.read_vec()?;
        println!("step {step}: {now:?}");
    }
    println!("{} dispatches", ctx.dispatch_count());
    Ok(())
}
