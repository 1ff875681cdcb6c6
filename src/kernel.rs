// kernel.rs — Kernel source handling: build options, reflection, signatures.
//
// A program is WGSL text. Before it ever reaches a device we:
//
//   1. Expand build options: every `{{NAME}}` token is replaced by the
//      option's value. Kernels bake `@workgroup_size` this way; naga
//      does not accept `override` expressions there, so the dimensions are
//      substituted as text.
//   2. Parse and validate with naga. Failures become `ComputeError::Compile`
//      with the full rendered diagnostic (file:line:column plus a source
//      excerpt). That log is the only debugging signal for bad kernel
//      source, so it is never truncated.
//   3. Reflect every `@compute` entry point into a `KernelSignature`: the
//      ordered `@group(0)` bindings the entry point actually uses, each
//      classified as buffer / scalar / sampled image / storage image.
//
// The signature is what `Task::execute` checks arguments against. Because
// reflection needs only naga, argument checking is testable without a GPU.
//
// PARAMETER MAPPING
// ─────────────────
//   var<storage, read>  a: array<f32>      → buffer (read-only)
//   var<storage, read_write> a: array<u32> → buffer (writable)
//   var<uniform> n: u32                    → scalar u32
//   var<uniform> p: Params                 → buffer (uniform)
//   var src: texture_2d<f32>               → sampled image, float texels
//   var dst: texture_storage_2d<rgba8unorm, write> → storage image, exact format

use std::collections::BTreeMap;
use std::fmt;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::{ComputeError, Result};
use crate::format::{ChannelType, ElementFormat, SampleKind, ScalarType};

// ---------------------------------------------------------------------------
// Build options
// ---------------------------------------------------------------------------

/// Named text substitutions applied to kernel source before compilation.
///
/// Options are kept sorted so two option sets with the same entries compare
/// and hash equal regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BuildOptions {
    defines: BTreeMap<String, String>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `{{name}}` with `value` in the source.
    pub fn define(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.defines.insert(name.into(), value.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expand the source. Fails if a `{{...}}` placeholder survives, naming
    /// its line and column.
    pub fn apply(&self, source: &str) -> Result<String> {
        let mut out = source.to_string();
        for (name, value) in &self.defines {
            out = out.replace(&format!("{{{{{name}}}}}"), value);
        }
        if let Some((line, column, token)) = find_placeholder(&out) {
            return Err(ComputeError::Compile {
                log: format!(
                    "wgsl:{line}:{column}: error: unresolved build option placeholder `{token}`"
                ),
            });
        }
        Ok(out)
    }
}

/// Locate the first `{{NAME}}` token. Returns 1-based (line, column, token).
fn find_placeholder(source: &str) -> Option<(usize, usize, String)> {
    for (line_idx, line) in source.lines().enumerate() {
        if let Some(start) = line.find("{{") {
            let token = match line[start..].find("}}") {
                Some(end) => line[start..start + end + 2].to_string(),
                None => line[start..].to_string(),
            };
            let column = line[..start].chars().count() + 1;
            return Some((line_idx + 1, column, token));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Access of a storage texture parameter as declared in the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl ImageAccess {
    pub fn to_wgpu(self) -> wgpu::StorageTextureAccess {
        match self {
            ImageAccess::ReadOnly => wgpu::StorageTextureAccess::ReadOnly,
            ImageAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
            ImageAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
        }
    }
}

/// Declared type of one kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Linear memory. `uniform` buffers are always read-only.
    Buffer { writable: bool, uniform: bool },
    Scalar(ScalarType),
    /// `texture_2d<T>`, read with `textureLoad`.
    SampledImage { kind: SampleKind },
    /// `texture_storage_2d<format, access>`.
    StorageImage { format: ElementFormat, access: ImageAccess },
}

impl ParamKind {
    /// Whether a kernel invocation may modify the bound memory object.
    pub fn writes_memory(&self) -> bool {
        match self {
            ParamKind::Buffer { writable, .. } => *writable,
            ParamKind::StorageImage { access, .. } => *access != ImageAccess::ReadOnly,
            ParamKind::Scalar(_) | ParamKind::SampledImage { .. } => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Buffer { uniform: true, .. } => write!(f, "uniform buffer"),
            ParamKind::Buffer { writable: true, .. } => write!(f, "read_write buffer"),
            ParamKind::Buffer { .. } => write!(f, "read-only buffer"),
            ParamKind::Scalar(t) => write!(f, "{t} scalar"),
            ParamKind::SampledImage { kind } => write!(f, "texture_2d<{kind}>"),
            ParamKind::StorageImage { format, access } => {
                write!(f, "storage image {format} ({access:?})")
            }
        }
    }
}

/// One parameter of a kernel entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelParam {
    /// `@binding(n)` within group 0. Arguments are ordered by this.
    pub binding: u32,
    pub name: String,
    pub kind: ParamKind,
}

/// The declared parameter list of a compute entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    pub entry_point: String,
    pub params: Vec<KernelParam>,
    /// `@workgroup_size(x, y, z)`, unspecified dimensions are 1.
    pub workgroup_size: [u32; 3],
}

/// What a caller is binding at one argument position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgKind {
    Buffer { byte_length: u64 },
    Image { format: ElementFormat },
    Scalar(ScalarType),
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Buffer { byte_length } => write!(f, "buffer of {byte_length} bytes"),
            ArgKind::Image { format } => write!(f, "image {format}"),
            ArgKind::Scalar(t) => write!(f, "{t} scalar"),
        }
    }
}

impl KernelSignature {
    /// Check `args` against the declared parameters, in order.
    ///
    /// # Errors
    /// `ArgumentBinding` naming the first offending position: the first
    /// missing or extra argument on a count mismatch, otherwise the first
    /// argument whose kind does not fit its parameter.
    pub fn check_args(&self, args: &[ArgKind]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(self.binding_error(
                args.len().min(self.params.len()),
                format!(
                    "expected {} arguments, got {}",
                    self.params.len(),
                    args.len()
                ),
            ));
        }

        for (position, (param, arg)) in self.params.iter().zip(args).enumerate() {
            let fits = match (param.kind, *arg) {
                (ParamKind::Buffer { .. }, ArgKind::Buffer { .. }) => true,
                (ParamKind::Scalar(want), ArgKind::Scalar(got)) => want == got,
                (ParamKind::SampledImage { kind }, ArgKind::Image { format }) => {
                    format.channel_type.sample_kind() == kind
                }
                (ParamKind::StorageImage { format: want, .. }, ArgKind::Image { format }) => {
                    want == format
                }
                _ => false,
            };
            if !fits {
                return Err(self.binding_error(
                    position,
                    format!("parameter `{}` expects {}, got {}", param.name, param.kind, arg),
                ));
            }
        }
        Ok(())
    }

    fn binding_error(&self, position: usize, reason: String) -> ComputeError {
        ComputeError::ArgumentBinding {
            entry_point: self.entry_point.clone(),
            position,
            reason,
        }
    }
}

impl fmt::Display for KernelSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.entry_point)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "@{} {}: {}", p.binding, p.name, p.kind)?;
        }
        let [x, y, z] = self.workgroup_size;
        write!(f, ") @workgroup_size({x}, {y}, {z})")
    }
}

// ---------------------------------------------------------------------------
// Reflection
// ---------------------------------------------------------------------------

/// A parsed and validated kernel module with its compute entry points.
#[derive(Debug, Clone)]
pub struct ModuleLayout {
    pub kernels: Vec<KernelSignature>,
}

impl ModuleLayout {
    pub fn kernel(&self, name: &str) -> Option<&KernelSignature> {
        self.kernels.iter().find(|k| k.entry_point == name)
    }

    pub fn entry_points(&self) -> Vec<String> {
        self.kernels.iter().map(|k| k.entry_point.clone()).collect()
    }
}

/// Parse, validate and reflect already-expanded WGSL source.
///
/// # Errors
/// `Compile` carrying the rendered diagnostic for syntax errors, validation
/// errors, and parameters this crate cannot bind (samplers, groups other
/// than 0, non-2D textures).
pub fn reflect(source: &str) -> Result<ModuleLayout> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        let log = match e.location(source) {
            Some(loc) => format!(
                "wgsl:{}:{}: error: {}\n{}",
                loc.line_number,
                loc.line_position,
                e.message(),
                e.emit_to_string(source)
            ),
            None => e.emit_to_string(source),
        };
        ComputeError::Compile { log }
    })?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| {
            let log = match e.location(source) {
                Some(loc) => format!(
                    "wgsl:{}:{}: error: {}\n{}",
                    loc.line_number,
                    loc.line_position,
                    e.as_inner(),
                    e.emit_to_string(source)
                ),
                None => e.emit_to_string(source),
            };
            ComputeError::Compile { log }
        })?;

    let mut kernels = Vec::new();
    for (index, ep) in module.entry_points.iter().enumerate() {
        if ep.stage != naga::ShaderStage::Compute {
            continue;
        }
        let usage = info.get_entry_point(index);

        let mut params = Vec::new();
        for (handle, var) in module.global_variables.iter() {
            if usage[handle].is_empty() {
                continue;
            }
            let Some(binding) = &var.binding else {
                continue;
            };
            let name = var
                .name
                .clone()
                .unwrap_or_else(|| format!("binding{}", binding.binding));
            if binding.group != 0 {
                return Err(ComputeError::Compile {
                    log: format!(
                        "entry point `{}`: parameter `{name}` is in @group({}); \
                         kernel parameters must be declared in @group(0)",
                        ep.name, binding.group
                    ),
                });
            }
            let kind = param_kind(&module, var).map_err(|reason| ComputeError::Compile {
                log: format!("entry point `{}`: parameter `{name}`: {reason}", ep.name),
            })?;
            params.push(KernelParam { binding: binding.binding, name, kind });
        }
        params.sort_by_key(|p| p.binding);

        kernels.push(KernelSignature {
            entry_point: ep.name.clone(),
            params,
            workgroup_size: ep.workgroup_size,
        });
    }

    Ok(ModuleLayout { kernels })
}

fn param_kind(module: &naga::Module, var: &naga::GlobalVariable) -> std::result::Result<ParamKind, String> {
    use naga::{AddressSpace, ImageClass, ImageDimension, TypeInner};

    let inner = &module.types[var.ty].inner;
    match var.space {
        AddressSpace::Storage { access } => Ok(ParamKind::Buffer {
            writable: access.contains(naga::StorageAccess::STORE),
            uniform: false,
        }),
        AddressSpace::Uniform => match inner {
            TypeInner::Scalar(scalar) => scalar_type(*scalar)
                .map(ParamKind::Scalar)
                .ok_or_else(|| format!("unsupported uniform scalar {:?}", scalar)),
            _ => Ok(ParamKind::Buffer { writable: false, uniform: true }),
        },
        AddressSpace::Handle => match inner {
            TypeInner::Image { dim: ImageDimension::D2, arrayed: false, class } => match *class {
                ImageClass::Sampled { kind, multi: false } => sample_kind(kind)
                    .map(|kind| ParamKind::SampledImage { kind })
                    .ok_or_else(|| format!("unsupported texel kind {kind:?}")),
                ImageClass::Storage { format, access } => {
                    let format = storage_format(format)
                        .ok_or_else(|| format!("unsupported storage texel format {format:?}"))?;
                    let access = match (
                        access.contains(naga::StorageAccess::LOAD),
                        access.contains(naga::StorageAccess::STORE),
                    ) {
                        (true, true) => ImageAccess::ReadWrite,
                        (true, false) => ImageAccess::ReadOnly,
                        _ => ImageAccess::WriteOnly,
                    };
                    Ok(ParamKind::StorageImage { format, access })
                }
                _ => Err("depth and multisampled textures are not supported".to_string()),
            },
            TypeInner::Image { .. } => {
                Err("only non-arrayed 2D textures are supported".to_string())
            }
            TypeInner::Sampler { .. } => {
                Err("samplers are not supported; read images with textureLoad".to_string())
            }
            other => Err(format!("unsupported handle type {other:?}")),
        },
        other => Err(format!("unsupported address space {other:?}")),
    }
}

fn scalar_type(scalar: naga::Scalar) -> Option<ScalarType> {
    match (scalar.kind, scalar.width) {
        (naga::ScalarKind::Uint, 4) => Some(ScalarType::U32),
        (naga::ScalarKind::Sint, 4) => Some(ScalarType::I32),
        (naga::ScalarKind::Float, 4) => Some(ScalarType::F32),
        _ => None,
    }
}

fn sample_kind(kind: naga::ScalarKind) -> Option<SampleKind> {
    match kind {
        naga::ScalarKind::Float => Some(SampleKind::Float),
        naga::ScalarKind::Uint => Some(SampleKind::Uint),
        naga::ScalarKind::Sint => Some(SampleKind::Sint),
        _ => None,
    }
}

fn storage_format(format: naga::StorageFormat) -> Option<ElementFormat> {
    use naga::StorageFormat as S;
    use ChannelType::*;
    let (channel_type, count) = match format {
        S::R8Unorm => (Unorm8, 1),
        S::Rg8Unorm => (Unorm8, 2),
        S::Rgba8Unorm => (Unorm8, 4),
        S::R8Uint => (Uint8, 1),
        S::Rg8Uint => (Uint8, 2),
        S::Rgba8Uint => (Uint8, 4),
        S::R8Sint => (Sint8, 1),
        S::Rg8Sint => (Sint8, 2),
        S::Rgba8Sint => (Sint8, 4),
        S::R32Uint => (Uint32, 1),
        S::Rg32Uint => (Uint32, 2),
        S::Rgba32Uint => (Uint32, 4),
        S::R32Sint => (Sint32, 1),
        S::Rg32Sint => (Sint32, 2),
        S::Rgba32Sint => (Sint32, 4),
        S::R32Float => (Float32, 1),
        S::Rg32Float => (Float32, 2),
        S::Rgba32Float => (Float32, 4),
        _ => return None,
    };
    Some(ElementFormat::new(channel_type, count))
}
