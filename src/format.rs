// format.rs — Element formats, host access modes and scalar argument types.
//
// These are plain host-side descriptions with no device state attached. The
// memory layer uses them to size allocations and pick texture formats; the
// signature layer uses them to check kernel arguments structurally.
//
// ELEMENT FORMAT
// ──────────────
// An image element is `channel_count` channels of one `ChannelType`:
//
//   4 × unorm8   → Rgba8Unorm   (4 bytes per pixel, float in shaders)
//   4 × uint8    → Rgba8Uint    (4 bytes per pixel, u32 in shaders)
//   1 × float32  → R32Float     (4 bytes per pixel)
//   4 × float32  → Rgba32Float  (16 bytes per pixel)
//
// The format is fixed at allocation time. A kernel that declares a storage
// texture of a different format cannot be bound to the image; the mismatch
// is reported as an argument-binding error instead of being coerced.

use std::fmt;

// ---------------------------------------------------------------------------
// Channel type
// ---------------------------------------------------------------------------

/// Per-channel numeric type of an image element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// 8-bit unsigned, normalised to [0, 1] when read in a shader.
    Unorm8,
    Uint8,
    Sint8,
    Uint32,
    Sint32,
    Float32,
}

impl ChannelType {
    /// Width of one channel in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            ChannelType::Unorm8 | ChannelType::Uint8 | ChannelType::Sint8 => 1,
            ChannelType::Uint32 | ChannelType::Sint32 | ChannelType::Float32 => 4,
        }
    }

    /// The shader-side scalar kind a texel of this type is read as.
    pub fn sample_kind(self) -> SampleKind {
        match self {
            ChannelType::Unorm8 | ChannelType::Float32 => SampleKind::Float,
            ChannelType::Uint8 | ChannelType::Uint32 => SampleKind::Uint,
            ChannelType::Sint8 | ChannelType::Sint32 => SampleKind::Sint,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ChannelType::Unorm8 => "unorm8",
            ChannelType::Uint8 => "uint8",
            ChannelType::Sint8 => "sint8",
            ChannelType::Uint32 => "uint32",
            ChannelType::Sint32 => "sint32",
            ChannelType::Float32 => "float32",
        }
    }
}

/// How a sampled texture's texels surface in a kernel (`texture_2d<T>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Float,
    Uint,
    Sint,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::Float => write!(f, "f32"),
            SampleKind::Uint => write!(f, "u32"),
            SampleKind::Sint => write!(f, "i32"),
        }
    }
}

// ---------------------------------------------------------------------------
// Element format
// ---------------------------------------------------------------------------

/// Channel type × channel count of one image element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementFormat {
    pub channel_type: ChannelType,
    pub channel_count: u8,
}

impl ElementFormat {
    pub const R8_UNORM: Self = Self::new(ChannelType::Unorm8, 1);
    pub const RGBA8_UNORM: Self = Self::new(ChannelType::Unorm8, 4);
    pub const RGBA8_UINT: Self = Self::new(ChannelType::Uint8, 4);
    pub const R32_UINT: Self = Self::new(ChannelType::Uint32, 1);
    pub const R32_FLOAT: Self = Self::new(ChannelType::Float32, 1);
    pub const RGBA32_FLOAT: Self = Self::new(ChannelType::Float32, 4);

    pub const fn new(channel_type: ChannelType, channel_count: u8) -> Self {
        ElementFormat { channel_type, channel_count }
    }

    /// Bytes per element (channel width × channel count).
    pub fn element_size(&self) -> usize {
        self.channel_type.size_bytes() * self.channel_count as usize
    }

    /// The wgpu texture format backing this element format, if one exists.
    ///
    /// Only 1, 2 and 4 channels are representable; 3-channel data must be
    /// expanded to 4 on the host.
    pub fn texture_format(&self) -> Option<wgpu::TextureFormat> {
        use wgpu::TextureFormat as T;
        use ChannelType::*;
        let format = match (self.channel_type, self.channel_count) {
            (Unorm8, 1) => T::R8Unorm,
            (Unorm8, 2) => T::Rg8Unorm,
            (Unorm8, 4) => T::Rgba8Unorm,
            (Uint8, 1) => T::R8Uint,
            (Uint8, 2) => T::Rg8Uint,
            (Uint8, 4) => T::Rgba8Uint,
            (Sint8, 1) => T::R8Sint,
            (Sint8, 2) => T::Rg8Sint,
            (Sint8, 4) => T::Rgba8Sint,
            (Uint32, 1) => T::R32Uint,
            (Uint32, 2) => T::Rg32Uint,
            (Uint32, 4) => T::Rgba32Uint,
            (Sint32, 1) => T::R32Sint,
            (Sint32, 2) => T::Rg32Sint,
            (Sint32, 4) => T::Rgba32Sint,
            (Float32, 1) => T::R32Float,
            (Float32, 2) => T::Rg32Float,
            (Float32, 4) => T::Rgba32Float,
            _ => return None,
        };
        Some(format)
    }
}

impl fmt::Display for ElementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.channel_count, self.channel_type.name())
    }
}

// ---------------------------------------------------------------------------
// Host access
// ---------------------------------------------------------------------------

/// Which host-side transfers a memory object accepts.
///
/// This is a documented contract, not a device capability: the device can
/// always copy both ways. Declaring `Read` makes `write()` fail with
/// `AccessMode`, declaring `Write` makes `read()` fail. Initial data supplied
/// at allocation is accepted for every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostAccess {
    /// Host reads results; only kernels write.
    Read,
    /// Host uploads inputs; results are never read back.
    Write,
    #[default]
    ReadWrite,
}

impl HostAccess {
    pub fn allows_read(self) -> bool {
        matches!(self, HostAccess::Read | HostAccess::ReadWrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, HostAccess::Write | HostAccess::ReadWrite)
    }
}

impl fmt::Display for HostAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAccess::Read => write!(f, "read-only"),
            HostAccess::Write => write!(f, "write-only"),
            HostAccess::ReadWrite => write!(f, "read-write"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Numeric type of a scalar kernel parameter (`var<uniform> x: u32;`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U32,
    I32,
    F32,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::U32 => write!(f, "u32"),
            ScalarType::I32 => write!(f, "i32"),
            ScalarType::F32 => write!(f, "f32"),
        }
    }
}

/// A scalar argument with an explicit numeric type.
///
/// There is no implicit conversion: binding `ScalarValue::I32(3)` to a `u32`
/// parameter is an argument-binding error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    U32(u32),
    I32(i32),
    F32(f32),
}

impl ScalarValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::U32(_) => ScalarType::U32,
            ScalarValue::I32(_) => ScalarType::I32,
            ScalarValue::F32(_) => ScalarType::F32,
        }
    }

    /// Little-endian bytes, zero-padded to 16 so the value can back a
    /// uniform binding on every backend.
    pub fn uniform_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        let raw: [u8; 4] = match *self {
            ScalarValue::U32(v) => v.to_le_bytes(),
            ScalarValue::I32(v) => v.to_le_bytes(),
            ScalarValue::F32(v) => v.to_le_bytes(),
        };
        out[..4].copy_from_slice(&raw);
        out
    }
}

impl From<u32> for ScalarValue {
    fn from(v: u32) -> Self {
        ScalarValue::U32(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::I32(v)
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        ScalarValue::F32(v)
    }
}
