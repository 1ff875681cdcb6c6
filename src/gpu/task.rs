// gpu/task.rs — Kernel dispatch.
//
// A `Task` is one kernel invocation: a kernel handle, an ordered argument
// list, a global shape and an optional local shape. `execute()` runs in two
// halves:
//
//   host-side checks (nothing touches the queue if any of these fail)
//     1. argument count and kinds against the reflected signature
//     2. every memory argument belongs to the kernel's context
//     3. storage images are storage-capable on this adapter
//     4. dispatch planning (divisibility, declared workgroup size, limits)
//
//   enqueue
//     5. scalar arguments become 16-byte uniform buffers
//     6. bind group, compute pass, dispatch, submit
//
// Submission does not wait. Call `DeviceContext::synchronize()` or a
// blocking `read()` before looking at anything the kernel wrote.
//
// Binding the same memory object at two positions (or re-running a task
// whose input and output are the same object) is allowed; wgpu orders
// successive submissions on the one queue.

use std::ptr;

use tracing::trace;
use wgpu::util::DeviceExt;

use crate::error::{ComputeError, Result};
use crate::format::ScalarValue;
use crate::gpu::device::DeviceContext;
use crate::gpu::memory::MemoryObject;
use crate::gpu::program::{Kernel, Program};
use crate::kernel::{ArgKind, BuildOptions, ParamKind};
use crate::shape::{plan_dispatch, WorkShape};

/// One positional kernel argument.
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    Memory(&'a MemoryObject<'a>),
    Scalar(ScalarValue),
}

impl KernelArg<'_> {
    fn kind(&self) -> ArgKind {
        match self {
            KernelArg::Memory(m) => m.arg_kind(),
            KernelArg::Scalar(v) => ArgKind::Scalar(v.scalar_type()),
        }
    }
}

impl<'a> From<&'a MemoryObject<'a>> for KernelArg<'a> {
    fn from(m: &'a MemoryObject<'a>) -> Self {
        KernelArg::Memory(m)
    }
}

impl From<ScalarValue> for KernelArg<'_> {
    fn from(v: ScalarValue) -> Self {
        KernelArg::Scalar(v)
    }
}

impl From<u32> for KernelArg<'_> {
    fn from(v: u32) -> Self {
        KernelArg::Scalar(ScalarValue::U32(v))
    }
}

impl From<i32> for KernelArg<'_> {
    fn from(v: i32) -> Self {
        KernelArg::Scalar(ScalarValue::I32(v))
    }
}

impl From<f32> for KernelArg<'_> {
    fn from(v: f32) -> Self {
        KernelArg::Scalar(ScalarValue::F32(v))
    }
}

/// A resource ready to go into a bind group.
enum Bound<'a> {
    Memory(&'a MemoryObject<'a>),
    Uniform(wgpu::Buffer),
}

/// A kernel invocation: kernel, arguments and work shape.
#[derive(Debug, Clone)]
pub struct Task<'a> {
    kernel: Kernel<'a>,
    args: Vec<KernelArg<'a>>,
    global: WorkShape,
    local: Option<WorkShape>,
}

impl<'a> Task<'a> {
    pub fn new(
        kernel: Kernel<'a>,
        args: impl IntoIterator<Item = KernelArg<'a>>,
        global: impl Into<WorkShape>,
        local: Option<WorkShape>,
    ) -> Self {
        Task {
            kernel,
            args: args.into_iter().collect(),
            global: global.into(),
            local,
        }
    }

    pub fn kernel(&self) -> &Kernel<'a> {
        &self.kernel
    }

    pub fn args(&self) -> &[KernelArg<'a>] {
        &self.args
    }

    pub fn global_shape(&self) -> WorkShape {
        self.global
    }

    /// Replace the argument at `position`, e.g. to feed a scalar that
    /// changes between runs.
    ///
    /// # Errors
    /// `ArgumentBinding` if `position` is past the end of the list.
    pub fn set_arg(&mut self, position: usize, arg: KernelArg<'a>) -> Result<()> {
        let len = self.args.len();
        match self.args.get_mut(position) {
            Some(slot) => {
                *slot = arg;
                Ok(())
            }
            None => Err(ComputeError::ArgumentBinding {
                entry_point: self.kernel.name().to_string(),
                position,
                reason: format!("task has only {len} arguments"),
            }),
        }
    }

    /// Validate and enqueue. Returns once the work is submitted, not once
    /// it has run.
    ///
    /// # Errors
    /// `ArgumentBinding` or `WorkShape` before anything is enqueued;
    /// `DeviceExecution` if the device rejects the dispatch.
    pub fn execute(&self) -> Result<()> {
        let ctx = self.kernel.context();
        let signature = self.kernel.signature();

        let kinds: Vec<ArgKind> = self.args.iter().map(KernelArg::kind).collect();
        signature.check_args(&kinds)?;
        self.check_placement(ctx)?;

        let plan = plan_dispatch(
            self.global,
            self.local,
            signature.workgroup_size,
            ctx.limits().max_compute_workgroups_per_dimension,
        )?;

        let kernel = self.kernel.pipeline();
        let (_, error) = ctx.scoped(|| {
            let bound: Vec<Bound<'_>> = self
                .args
                .iter()
                .map(|arg| match *arg {
                    KernelArg::Memory(m) => Bound::Memory(m),
                    KernelArg::Scalar(v) => Bound::Uniform(ctx.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some("gridline scalar"),
                            contents: &v.uniform_bytes(),
                            usage: wgpu::BufferUsages::UNIFORM,
                        },
                    )),
                })
                .collect();

            let entries: Vec<wgpu::BindGroupEntry<'_>> = signature
                .params
                .iter()
                .zip(&bound)
                .map(|(param, b)| wgpu::BindGroupEntry {
                    binding: param.binding,
                    resource: match b {
                        Bound::Memory(m) => m.binding_resource(),
                        Bound::Uniform(buffer) => buffer.as_entire_binding(),
                    },
                })
                .collect();

            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(self.kernel.name()),
                layout: &kernel.bind_group_layout,
                entries: &entries,
            });

            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("gridline dispatch"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(self.kernel.name()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&kernel.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                let [x, y, z] = plan.workgroups;
                pass.dispatch_workgroups(x, y, z);
            }
            ctx.queue.submit(std::iter::once(encoder.finish()))
        });
        if let Some(error) = error {
            return Err(ComputeError::DeviceExecution(format!(
                "dispatch of `{}` rejected: {error}",
                self.kernel.name()
            )));
        }

        ctx.record_dispatch();
        for (param, arg) in signature.params.iter().zip(&self.args) {
            if let KernelArg::Memory(m) = arg {
                if param.kind.writes_memory() {
                    m.mark_dirty();
                }
            }
        }
        trace!(
            kernel = self.kernel.name(),
            global = %self.global,
            workgroups = ?plan.workgroups,
            "dispatched"
        );
        Ok(())
    }

    fn check_placement(&self, ctx: &DeviceContext) -> Result<()> {
        let signature = self.kernel.signature();
        for (position, (param, arg)) in signature.params.iter().zip(&self.args).enumerate() {
            let KernelArg::Memory(m) = arg else { continue };
            let reason = if !ptr::eq(m.context(), ctx) {
                "memory object belongs to another device context".to_string()
            } else if let ParamKind::StorageImage { format, .. } = param.kind {
                match format.texture_format() {
                    Some(tf) if ctx.supports_storage(tf) => continue,
                    _ => format!("{format} images cannot be bound as storage on this adapter"),
                }
            } else {
                continue;
            };
            return Err(ComputeError::ArgumentBinding {
                entry_point: signature.entry_point.clone(),
                position,
                reason,
            });
        }
        Ok(())
    }
}

/// Compile-once, run-many wrapper around a single-kernel program.
///
/// ```ignore
/// let square = ParallelTask::new(&ctx, SQUARE_WGSL, None)?;
/// square.execute(n, [KernelArg::from(&values), n.into()], None)?;
/// ctx.synchronize()?;
/// ```
#[derive(Debug, Clone)]
pub struct ParallelTask<'ctx> {
    kernel: Kernel<'ctx>,
}

impl<'ctx> ParallelTask<'ctx> {
    /// Build `source` and take its only entry point.
    ///
    /// # Errors
    /// `Compile`, or `UnknownEntryPoint` unless the source has exactly one
    /// compute entry point.
    pub fn new(
        ctx: &'ctx DeviceContext,
        source: &str,
        options: Option<&BuildOptions>,
    ) -> Result<Self> {
        let kernel = Program::build(ctx, source, options)?.sole_entry_point()?;
        Ok(ParallelTask { kernel })
    }

    pub fn kernel(&self) -> &Kernel<'ctx> {
        &self.kernel
    }

    /// Enqueue one run over `global`.
    pub fn execute<'a>(
        &self,
        global: impl Into<WorkShape>,
        args: impl IntoIterator<Item = KernelArg<'a>>,
        local: Option<WorkShape>,
    ) -> Result<()>
    where
        'ctx: 'a,
    {
        Task::new(self.kernel.clone(), args, global, local).execute()
    }
}
