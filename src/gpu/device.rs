// gpu/device.rs — Device context: adapter selection, queue, synchronization.
//
// Responsibilities:
//   - Enumerate adapters and pick one according to a `ContextConfig`.
//   - Own the single in-order queue every allocation, transfer and kernel
//     run is submitted to.
//   - Hold the per-context program cache and the dispatch counter.
//   - Collect device errors that wgpu reports outside an error scope and
//     surface them from the next `synchronize()`.
//
// ADAPTER SELECTION
// ─────────────────
// wgpu's `request_adapter` picks by power preference, which happily returns
// llvmpipe on a headless box and never explains why a real GPU was skipped.
// We enumerate explicitly and select in tiers:
//
//   0. discard adapters without compute shaders, and (if required) without
//      storage-image support for 4×unorm8
//   1. preferred class, best first:
//        Accelerator: DiscreteGpu > IntegratedGpu > VirtualGpu > Other
//        Cpu        : Cpu
//   2. anything left, if fallback is allowed
//   3. NoDevice
//
// Every candidate is logged at `info` so the chosen device is never a
// mystery.
//
// LIFETIMES
// ─────────
// Memory objects, programs, kernels and tasks all borrow `&DeviceContext`.
// `teardown(self)` consumes the context, so the compiler rejects any use of
// a derived object after teardown.
//
// SYNCHRONIZATION
// ───────────────
// Submission never blocks. `synchronize()` is `device.poll(Maintain::Wait)`:
// it returns once everything submitted so far has finished. Blocking reads
// in the memory layer do the same before mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{ContextConfig, DevicePreference};
use crate::error::{ComputeError, Result};
use crate::gpu::program::{CompiledProgram, Program, ProgramKey};

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub driver: String,
}

impl From<wgpu::AdapterInfo> for AdapterInfo {
    fn from(raw: wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: raw.name,
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
            driver: raw.driver,
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?})",
            self.name, self.backend, self.device_type
        )
    }
}

/// What selection needs to know about one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub compute: bool,
    pub storage_images: bool,
}

/// Tiered adapter choice. Returns the index of the winner in `candidates`.
pub(crate) fn select_adapter(
    candidates: &[Candidate],
    config: &ContextConfig,
) -> std::result::Result<usize, String> {
    let usable: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.compute && (!config.require_image_support || c.storage_images))
        .map(|(i, _)| i)
        .collect();

    if usable.is_empty() {
        return Err(if candidates.is_empty() {
            format!("no adapters found on backends {:?}", config.backends)
        } else if config.require_image_support {
            format!(
                "{} adapter(s) found, none with compute shaders and storage images",
                candidates.len()
            )
        } else {
            format!("{} adapter(s) found, none with compute shaders", candidates.len())
        });
    }

    let preferred = usable
        .iter()
        .copied()
        .filter_map(|i| {
            let c = &candidates[i];
            class_rank(config.preference, c.device_type).map(|r| ((r, backend_rank(c.backend)), i))
        })
        .min_by_key(|&(rank, _)| rank)
        .map(|(_, i)| i);

    match preferred {
        Some(i) => Ok(i),
        None if config.allow_fallback => Ok(usable
            .iter()
            .copied()
            .min_by_key(|&i| backend_rank(candidates[i].backend))
            .unwrap_or(usable[0])),
        None => Err(format!(
            "no {} adapter among {} usable adapter(s) and fallback is disabled",
            config.preference,
            usable.len()
        )),
    }
}

/// Rank of `device_type` within the preferred class; lower is better.
fn class_rank(preference: DevicePreference, device_type: wgpu::DeviceType) -> Option<u8> {
    use wgpu::DeviceType::*;
    match (preference, device_type) {
        (DevicePreference::Accelerator, DiscreteGpu) => Some(0),
        (DevicePreference::Accelerator, IntegratedGpu) => Some(1),
        (DevicePreference::Accelerator, VirtualGpu) => Some(2),
        (DevicePreference::Accelerator, Other) => Some(3),
        (DevicePreference::Cpu, Cpu) => Some(0),
        _ => None,
    }
}

/// Native backends before GL when the same class is reachable through both.
fn backend_rank(backend: wgpu::Backend) -> u8 {
    match backend {
        wgpu::Backend::Gl => 1,
        _ => 0,
    }
}

/// The compute context: one adapter, one device, one in-order queue.
///
/// Create via [`DeviceContext::create`] or [`DeviceContext::create_with`].
/// Everything allocated or compiled through a context borrows it.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is declared last so the
/// `wgpu::Instance` outlives the device, queue and adapter. Some Vulkan
/// layers crash if the instance is destroyed while device-level objects
/// still refer back to it.
pub struct DeviceContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) programs: RwLock<HashMap<ProgramKey, Arc<CompiledProgram>>>,
    adapter: wgpu::Adapter,
    adapter_info: AdapterInfo,
    limits: wgpu::Limits,
    dispatches: AtomicU64,
    next_object_id: AtomicU64,
    /// First device error reported outside an error scope since the last
    /// `synchronize()`.
    uncaptured: Arc<Mutex<Option<String>>>,
    _instance: wgpu::Instance,
}

impl DeviceContext {
    /// Create a context with `ContextConfig::from_env()`.
    ///
    /// # Errors
    /// `Config` for malformed environment variables, `NoDevice` if no
    /// adapter passes selection, `DeviceRequest` if the adapter refuses.
    pub fn create() -> Result<Self> {
        Self::create_with(ContextConfig::from_env()?)
    }

    pub fn create_with(config: ContextConfig) -> Result<Self> {
        pollster::block_on(Self::init_async(config))
    }

    async fn init_async(config: ContextConfig) -> Result<Self> {
        // Validation layer in debug builds for shader error feedback.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.backends,
            flags,
            ..Default::default()
        });

        let mut adapters = instance.enumerate_adapters(config.backends);
        let candidates: Vec<Candidate> = adapters
            .iter()
            .map(|a| {
                let info = a.get_info();
                let candidate = Candidate {
                    device_type: info.device_type,
                    backend: info.backend,
                    compute: a
                        .get_downlevel_capabilities()
                        .flags
                        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
                    storage_images: a
                        .get_texture_format_features(wgpu::TextureFormat::Rgba8Unorm)
                        .allowed_usages
                        .contains(wgpu::TextureUsages::STORAGE_BINDING),
                };
                info!(
                    name = %info.name,
                    backend = ?info.backend,
                    device_type = ?info.device_type,
                    compute = candidate.compute,
                    storage_images = candidate.storage_images,
                    "adapter"
                );
                candidate
            })
            .collect();

        let index = select_adapter(&candidates, &config)
            .map_err(|reason| ComputeError::NoDevice { reason })?;
        let adapter = adapters.swap_remove(index);
        let adapter_info = AdapterInfo::from(adapter.get_info());

        let supported = adapter.limits();
        let mut limits = config.limits.limits(&supported);
        if !limits.check_limits(&supported) {
            warn!(
                profile = ?config.limits,
                "adapter does not reach the requested limits profile, using adapter limits"
            );
            limits = supported;
        }

        // wgpu 22: request_device returns (Device, Queue) directly.
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gridline"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let uncaptured: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&uncaptured);
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            let message = error.to_string();
            warn!(%message, "uncaptured device error");
            slot.lock().get_or_insert(message);
        }));

        info!(adapter = %adapter_info, preference = %config.preference, "device context created");

        Ok(DeviceContext {
            device,
            queue,
            programs: RwLock::new(HashMap::new()),
            adapter,
            adapter_info,
            limits,
            dispatches: AtomicU64::new(0),
            next_object_id: AtomicU64::new(0),
            uncaptured,
            _instance: instance,
        })
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    /// Limits the device was created with. Allocations and dispatches are
    /// checked against these.
    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Number of kernel runs successfully enqueued on this context.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Block until all submitted work has completed.
    ///
    /// Dirty flags on memory objects are not touched; each object's flag is
    /// cleared by reading that object.
    ///
    /// # Errors
    /// `DeviceExecution` if the device reported an error since the last
    /// synchronization.
    pub fn synchronize(&self) -> Result<()> {
        self.device.poll(wgpu::Maintain::Wait);
        self.take_device_error()
    }

    /// Wait for outstanding work and release the device.
    pub fn teardown(self) {
        self.device.poll(wgpu::Maintain::Wait);
        if let Some(message) = self.uncaptured.lock().take() {
            warn!(%message, "device error pending at teardown");
        }
        debug!(
            adapter = %self.adapter_info,
            dispatches = self.dispatch_count(),
            programs = self.programs.read().len(),
            "device context torn down"
        );
    }

    /// Compile `source` without build options.
    pub fn compile(&self, source: &str) -> Result<Program<'_>> {
        Program::build(self, source, None)
    }

    /// Whether textures of `format` can be bound as storage images.
    pub(crate) fn supports_storage(&self, format: wgpu::TextureFormat) -> bool {
        self.adapter
            .get_texture_format_features(format)
            .allowed_usages
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
    }

    pub(crate) fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn next_object_id(&self) -> u64 {
        self.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn take_device_error(&self) -> Result<()> {
        match self.uncaptured.lock().take() {
            Some(message) => Err(ComputeError::DeviceExecution(message)),
            None => Ok(()),
        }
    }

    /// Run `f` inside a validation error scope. The error, if any, is
    /// returned alongside `f`'s result.
    pub(crate) fn scoped<T>(&self, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }
}

impl fmt::Display for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceContext {{ adapter: {}, max workgroups/dim: {}, max buffer: {} }}",
            self.adapter_info,
            self.limits.max_compute_workgroups_per_dimension,
            self.limits.max_buffer_size
        )
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("adapter", &self.adapter_info)
            .field("dispatches", &self.dispatch_count())
            .finish_non_exhaustive()
    }
}
