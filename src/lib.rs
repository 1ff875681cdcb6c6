// gridline: host-side orchestration for grid-dispatched compute kernels
//
// A device context owns one adapter and one in-order queue. Programs are
// WGSL compiled against that context, memory objects are buffers or 2D
// images resident on it, and tasks bind the two together and dispatch a
// kernel over an N-dimensional work shape.
//
// The pure modules (format, shape, kernel, image, sieve) need no device and
// carry most of the validation; `gpu` is the wgpu-backed layer.

pub mod config;
pub mod error;
pub mod format;
pub mod image;
pub mod kernel;
pub mod shape;
pub mod sieve;

pub mod gpu;

pub use config::{ContextConfig, DevicePreference, LimitsProfile};
pub use error::{ComputeError, Result};
pub use format::{ChannelType, ElementFormat, HostAccess, SampleKind, ScalarType, ScalarValue};
pub use gpu::device::{AdapterInfo, DeviceContext};
pub use gpu::memory::{MemoryKind, MemoryObject, MemoryShape};
pub use gpu::program::{Kernel, Program};
pub use gpu::sieve::GpuSieve;
pub use gpu::task::{KernelArg, ParallelTask, Task};
pub use image::HostImage;
pub use kernel::{BuildOptions, KernelParam, KernelSignature, ParamKind};
pub use shape::WorkShape;
