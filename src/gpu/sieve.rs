// gpu/sieve.rs — Segmented prime sieve on the device.
//
// Phase 1 (base primes ≤ ⌈√N⌉) and the final reduction run on the host,
// phase 2 runs as one work-item per segment. The CPU reference in
// `crate::sieve` implements the same marking and is what the device result
// is checked against.
//
// Buffers per call:
//   flags        u32 × (N + 1), host-read   (index = the number itself)
//   base_primes  u32 × max(count, 1), host-write
//
// Scalars: limit, segment_size, base_count.

use tracing::debug;

use crate::error::{ComputeError, Result};
use crate::format::HostAccess;
use crate::gpu::device::DeviceContext;
use crate::gpu::program::{Kernel, Program};
use crate::gpu::task::{KernelArg, Task};
use crate::kernel::BuildOptions;
use crate::sieve::{base_primes, collect_primes, SegmentPlan};

const SIEVE_WGSL: &str = include_str!("../shaders/sieve.wgsl");

/// Work-items per workgroup for the segment kernel.
const WORKGROUP_X: u32 = 64;

/// Reusable device sieve. Compiles the kernel once.
pub struct GpuSieve<'ctx> {
    ctx: &'ctx DeviceContext,
    kernel: Kernel<'ctx>,
    segment_size: u32,
}

impl<'ctx> GpuSieve<'ctx> {
    /// Numbers per work-item when no segment size is given.
    pub const DEFAULT_SEGMENT_SIZE: u32 = 1024;

    /// # Errors
    /// `WorkShape` for a zero segment size, `Compile` if the device rejects
    /// the kernel.
    pub fn new(ctx: &'ctx DeviceContext, segment_size: u32) -> Result<Self> {
        if segment_size == 0 {
            return Err(ComputeError::WorkShape(
                "sieve segment size must be positive".to_string(),
            ));
        }
        let options = BuildOptions::new().define("WG_X", WORKGROUP_X);
        let program = Program::build(ctx, SIEVE_WGSL, Some(&options))?;
        let kernel = program.entry_point("sieve_segment")?;
        Ok(GpuSieve { ctx, kernel, segment_size })
    }

    pub fn segment_size(&self) -> u32 {
        self.segment_size
    }

    /// All primes ≤ `limit`, ascending.
    ///
    /// # Errors
    /// `CapacityExceeded` if the flag array does not fit one storage
    /// binding; `DeviceExecution` on device failure.
    pub fn primes_up_to(&self, limit: u32) -> Result<Vec<u32>> {
        let plan = SegmentPlan::new(limit, self.segment_size);
        if plan.segment_count() == 0 {
            return Ok(Vec::new());
        }

        let limits = self.ctx.limits();
        let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let flag_bytes = plan.flag_len() as u64 * 4;
        if flag_bytes > max {
            return Err(ComputeError::CapacityExceeded {
                what: "sieve flag array",
                requested: flag_bytes,
                max,
            });
        }

        let base = base_primes(limit);
        let base_count = base.len() as u32;
        // Zero-length storage bindings are invalid; pad to one element.
        let base_data = if base.is_empty() { vec![0u32] } else { base };

        let flags = self
            .ctx
            .allocate_buffer_zeroed::<u32>(plan.flag_len(), HostAccess::Read)?;
        let primes = self.ctx.allocate_buffer_from(&base_data, HostAccess::Write)?;

        Task::new(
            self.kernel.clone(),
            [
                KernelArg::from(&flags),
                KernelArg::from(&primes),
                limit.into(),
                self.segment_size.into(),
                base_count.into(),
            ],
            plan.segment_count(),
            None,
        )
        .execute()?;

        // Blocking read; waits for the dispatch above.
        let flags: Vec<u32> = flags.read_vec()?;
        let found = collect_primes(&flags);
        debug!(
            limit,
            segments = plan.segment_count(),
            base_primes = base_count,
            primes = found.len(),
            "device sieve finished"
        );
        Ok(found)
    }
}
