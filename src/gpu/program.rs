// gpu/program.rs — Program compilation and kernel handles.
//
// `Program::build` turns WGSL text plus build options into a shader module.
// Compilation happens once per distinct (source, options) pair per context;
// later builds of the same pair are served from the context's program cache.
//
// PIPELINE CONSTRUCTION
// ─────────────────────
// Each entry point gets an explicit bind group layout derived from its
// reflected signature rather than `layout: None`. wgpu's automatic layout
// would accept any binding the shader happens to use; an explicit layout
// keeps the bind group we build in `Task::execute` and the kernel's
// declared parameters in lockstep.
//
//   ParamKind                   BindingType
//   ─────────────────────────   ───────────────────────────────────────────
//   Buffer { writable }         Buffer { Storage { read_only: !writable } }
//   Buffer { uniform } / Scalar Buffer { Uniform }
//   SampledImage { kind }       Texture { D2, Float{filterable:false}|Uint|Sint }
//   StorageImage { fmt, acc }   StorageTexture { D2, fmt, acc }
//
// Pipelines are cached per entry point inside the compiled program, so
// `entry_point(name)` is cheap after the first call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ComputeError, Result};
use crate::format::SampleKind;
use crate::gpu::device::DeviceContext;
use crate::kernel::{reflect, BuildOptions, KernelSignature, ModuleLayout, ParamKind};

/// Cache key: unexpanded source text plus the option set applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ProgramKey {
    source: String,
    options: BuildOptions,
}

/// A shader module shared by every `Program` built from the same key.
pub(crate) struct CompiledProgram {
    layout: ModuleLayout,
    module: wgpu::ShaderModule,
    pipelines: RwLock<HashMap<String, Arc<KernelPipeline>>>,
}

/// A compute pipeline for one entry point and the layout its arguments
/// are bound with.
pub(crate) struct KernelPipeline {
    pub(crate) signature: KernelSignature,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pub(crate) pipeline: wgpu::ComputePipeline,
}

/// A compiled program on one device context.
#[derive(Clone)]
pub struct Program<'ctx> {
    ctx: &'ctx DeviceContext,
    compiled: Arc<CompiledProgram>,
}

impl<'ctx> Program<'ctx> {
    /// Compile `source` after applying `options`.
    ///
    /// # Errors
    /// `Compile` carrying the full diagnostic for unresolved placeholders,
    /// parse or validation errors, unsupported parameter types, and anything
    /// the device's shader compiler rejects.
    pub fn build(
        ctx: &'ctx DeviceContext,
        source: &str,
        options: Option<&BuildOptions>,
    ) -> Result<Self> {
        let key = ProgramKey {
            source: source.to_string(),
            options: options.cloned().unwrap_or_default(),
        };

        if let Some(hit) = ctx.programs.read().get(&key) {
            debug!(entry_points = ?hit.layout.entry_points(), "program cache hit");
            return Ok(Program { ctx, compiled: Arc::clone(hit) });
        }

        let expanded = key.options.apply(source)?;
        let layout = reflect(&expanded)?;

        let (module, error) = ctx.scoped(|| {
            ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("gridline program"),
                source: wgpu::ShaderSource::Wgsl(expanded.as_str().into()),
            })
        });
        if let Some(error) = error {
            return Err(ComputeError::Compile { log: error.to_string() });
        }

        debug!(
            entry_points = ?layout.entry_points(),
            options = key.options.iter().count(),
            "program compiled"
        );

        let compiled = Arc::new(CompiledProgram {
            layout,
            module,
            pipelines: RwLock::new(HashMap::new()),
        });
        // A concurrent build of the same key may have won the race; keep
        // whichever entry landed first.
        let compiled = Arc::clone(ctx.programs.write().entry(key).or_insert(compiled));
        Ok(Program { ctx, compiled })
    }

    /// Names of the compute entry points, in declaration order.
    pub fn entry_points(&self) -> Vec<String> {
        self.compiled.layout.entry_points()
    }

    /// Reflected signature of `name`, without building a pipeline.
    pub fn signature(&self, name: &str) -> Option<&KernelSignature> {
        self.compiled.layout.kernel(name)
    }

    /// Kernel handle for the entry point `name`.
    ///
    /// # Errors
    /// `UnknownEntryPoint` if the program has no compute entry point of that
    /// name. `Compile` if the device rejects the pipeline.
    pub fn entry_point(&self, name: &str) -> Result<Kernel<'ctx>> {
        if let Some(hit) = self.compiled.pipelines.read().get(name) {
            return Ok(Kernel { ctx: self.ctx, pipeline: Arc::clone(hit) });
        }

        let signature = self
            .compiled
            .layout
            .kernel(name)
            .ok_or_else(|| ComputeError::UnknownEntryPoint {
                name: name.to_string(),
                available: self.entry_points(),
            })?
            .clone();

        let pipeline = Arc::new(build_pipeline(self.ctx, &self.compiled.module, signature)?);
        let pipeline = Arc::clone(
            self.compiled
                .pipelines
                .write()
                .entry(name.to_string())
                .or_insert(pipeline),
        );
        Ok(Kernel { ctx: self.ctx, pipeline })
    }

    /// The program's only entry point.
    ///
    /// # Errors
    /// `UnknownEntryPoint` (listing the candidates) unless the program has
    /// exactly one compute entry point.
    pub fn sole_entry_point(&self) -> Result<Kernel<'ctx>> {
        match self.compiled.layout.kernels.as_slice() {
            [only] => self.entry_point(&only.entry_point),
            _ => Err(ComputeError::UnknownEntryPoint {
                name: "<sole entry point>".to_string(),
                available: self.entry_points(),
            }),
        }
    }

    pub fn context(&self) -> &'ctx DeviceContext {
        self.ctx
    }
}

impl std::fmt::Debug for Program<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("entry_points", &self.entry_points())
            .finish_non_exhaustive()
    }
}

fn build_pipeline(
    ctx: &DeviceContext,
    module: &wgpu::ShaderModule,
    signature: KernelSignature,
) -> Result<KernelPipeline> {
    let entries = signature
        .params
        .iter()
        .map(|p| {
            Ok(wgpu::BindGroupLayoutEntry {
                binding: p.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: binding_type(p.kind)?,
                count: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let ((bind_group_layout, pipeline), error) = ctx.scoped(|| {
        let bgl = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(signature.entry_point.as_str()),
            entries: &entries,
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(signature.entry_point.as_str()),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = ctx.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(signature.entry_point.as_str()),
            layout: Some(&pipeline_layout),
            module,
            entry_point: &signature.entry_point,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        (bgl, pipeline)
    });

    if let Some(error) = error {
        return Err(ComputeError::Compile {
            log: format!("entry point `{}`: {error}", signature.entry_point),
        });
    }

    debug!(kernel = %signature, "pipeline created");
    Ok(KernelPipeline { signature, bind_group_layout, pipeline })
}

fn binding_type(kind: ParamKind) -> Result<wgpu::BindingType> {
    Ok(match kind {
        ParamKind::Buffer { uniform: false, writable } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: !writable },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        ParamKind::Buffer { uniform: true, .. } | ParamKind::Scalar(_) => {
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            }
        }
        ParamKind::SampledImage { kind } => wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: match kind {
                SampleKind::Float => wgpu::TextureSampleType::Float { filterable: false },
                SampleKind::Uint => wgpu::TextureSampleType::Uint,
                SampleKind::Sint => wgpu::TextureSampleType::Sint,
            },
        },
        ParamKind::StorageImage { format, access } => wgpu::BindingType::StorageTexture {
            access: access.to_wgpu(),
            format: format
                .texture_format()
                .ok_or(ComputeError::UnsupportedFormat(format))?,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
    })
}

/// Handle to one compute entry point of a built program.
#[derive(Clone)]
pub struct Kernel<'ctx> {
    ctx: &'ctx DeviceContext,
    pipeline: Arc<KernelPipeline>,
}

impl<'ctx> Kernel<'ctx> {
    pub fn name(&self) -> &str {
        &self.pipeline.signature.entry_point
    }

    pub fn signature(&self) -> &KernelSignature {
        &self.pipeline.signature
    }

    pub fn context(&self) -> &'ctx DeviceContext {
        self.ctx
    }

    pub(crate) fn pipeline(&self) -> &KernelPipeline {
        &self.pipeline
    }
}

impl std::fmt::Debug for Kernel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Kernel").field(&self.pipeline.signature).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ElementFormat, ScalarType};
    use crate::kernel::ImageAccess;

    #[test]
    fn test_binding_types() {
        assert!(matches!(
            binding_type(ParamKind::Buffer { writable: false, uniform: false }).unwrap(),
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                ..
            }
        ));
        assert!(matches!(
            binding_type(ParamKind::Scalar(ScalarType::F32)).unwrap(),
            wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, .. }
        ));
        assert!(matches!(
            binding_type(ParamKind::StorageImage {
                format: ElementFormat::RGBA8_UNORM,
                access: ImageAccess::WriteOnly,
            })
            .unwrap(),
            wgpu::BindingType::StorageTexture {
                format: wgpu::TextureFormat::Rgba8Unorm,
                access: wgpu::StorageTextureAccess::WriteOnly,
                ..
            }
        ));
    }

    #[test]
    fn test_sampled_float_is_unfilterable() {
        let ty = binding_type(ParamKind::SampledImage { kind: SampleKind::Float }).unwrap();
        assert!(matches!(
            ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                ..
            }
        ));
    }
}
