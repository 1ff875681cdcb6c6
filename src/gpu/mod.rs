// gpu/mod.rs — wgpu-backed device layer.
//
//   device   context creation, adapter selection, synchronization
//   memory   buffers and 2D images with blocking transfers
//   program  WGSL compilation, program and pipeline caches
//   task     argument binding and dispatch
//   sieve    segmented prime sieve built on the above
//
// The CPU modules in the parent crate remain the reference: the device
// sieve is validated against `crate::sieve`, and every argument or shape
// check runs host-side before anything is enqueued.

pub mod device;
pub mod memory;
pub mod program;
pub mod sieve;
pub mod task;
