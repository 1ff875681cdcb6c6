// demos/primes.rs
//
// Primes up to N on the device, checked against the CPU sieve.
//
// Usage:
//   cargo run --example primes --release -- [N] [segment_size]
//
// Defaults: N = 10_000_000, segment size = GpuSieve::DEFAULT_SEGMENT_SIZE.

use std::env;
use std::time::Instant;

use gridline::sieve::segmented_sieve;
use gridline::{DeviceContext, GpuSieve};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let limit: u32 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10_000_000);
    let segment_size: u32 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(GpuSieve::DEFAULT_SEGMENT_SIZE);

    let ctx = DeviceContext::create()?;
    println!("Device: {ctx}");

    let sieve = GpuSieve::new(&ctx, segment_size)?;
    let t = Instant::now();
    let gpu = sieve.primes_up_to(limit)?;
    let gpu_time = t.elapsed();

    let t = Instant::now();
    let cpu = segmented_sieve(limit, segment_size);
    let cpu_time = t.elapsed();

    println!("N = {limit}, segment size = {segment_size}");
    println!("  device: {:>9} primes in {gpu_time:?}", gpu.len());
    println!("  host:   {:>9} primes in {cpu_time:?}", cpu.len());
    if let Some(last) = gpu.last() {
        println!("  largest: {last}");
    }

    if gpu != cpu {
        eprintln!("Error: device and host results differ");
        std::process::exit(1);
    }
    Ok(())
}
