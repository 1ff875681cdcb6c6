// gpu/memory.rs — Memory objects: device buffers and 2D images.
//
// A `MemoryObject` is a tagged variant over two storage kinds that share one
// transfer interface:
//
//   Linear:  a `wgpu::Buffer` addressed by byte offset.
//   Image2D: a `wgpu::Texture` with a fixed element format and a host-side
//            row pitch.
//
// Both `write` and `read` block until the transfer has completed on the
// device. Because the queue is in-order, a `read` issued after `execute`
// observes the kernel's output without a separate `synchronize()`.
//
//
// THE ROW-PITCH PROBLEM
// ─────────────────────
// Host images carry a row pitch that may exceed the packed row size.
// wgpu's buffer↔texture copies need `bytes_per_row` to be a multiple of
// `COPY_BYTES_PER_ROW_ALIGNMENT` (256). Host pitch and device pitch are
// therefore independent, and every image transfer goes through a staging
// buffer with 256-aligned rows:
//
//   host (pitch 13, width 3 × 4 B):    staging (pitch 256):
//     row0: [ 12 B active | 1 B pad ]    row0: [ 12 B active | 244 B pad ]
//     row1: [ 12 B active | 1 B pad ]    row1: [ 12 B active | 244 B pad ]
//
// Only active bytes are copied in either direction.
//
//
// LINEAR PADDING
// ──────────────
// wgpu buffer sizes and `write_buffer` lengths must be multiples of 4
// (`COPY_BUFFER_ALIGNMENT`) and non-zero for binding. Buffers are allocated
// at `max(align4(len), 4)` bytes; reads return exactly the declared length.

use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::Pod;
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::error::{ComputeError, Result};
use crate::format::{ElementFormat, HostAccess};
use crate::gpu::device::DeviceContext;
use crate::image::HostImage;
use crate::kernel::ArgKind;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Row alignment for buffer↔texture copies.
const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Size alignment for buffers and buffer writes.
const BUFFER_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Buffer,
    Image,
}

/// Declared shape of a memory object, as the host sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryShape {
    Linear {
        byte_length: u64,
    },
    Image2D {
        width: u32,
        height: u32,
        /// Host row pitch in bytes.
        row_pitch: usize,
        format: ElementFormat,
    },
}

impl MemoryShape {
    /// Bytes a host transfer of the whole object carries.
    pub fn host_bytes(&self) -> u64 {
        match *self {
            MemoryShape::Linear { byte_length } => byte_length,
            MemoryShape::Image2D { height, row_pitch, .. } => height as u64 * row_pitch as u64,
        }
    }
}

enum Storage {
    Linear {
        buffer: wgpu::Buffer,
        byte_length: u64,
    },
    Image2D {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
        row_pitch: usize,
        format: ElementFormat,
    },
}

// ---------------------------------------------------------------------------
// MemoryObject
// ---------------------------------------------------------------------------

/// A buffer or image resident on one device context.
pub struct MemoryObject<'ctx> {
    ctx: &'ctx DeviceContext,
    id: u64,
    access: HostAccess,
    storage: Storage,
    /// Set when a kernel that may write this object has been enqueued;
    /// cleared by the next host read of this object. `synchronize()` leaves
    /// it alone: a context-wide wait is not a read of this object.
    dirty: AtomicBool,
}

impl DeviceContext {
    /// Allocate a linear buffer of `byte_length` bytes.
    ///
    /// `initial_data` is uploaded regardless of `access`. Without it the
    /// buffer is zero-filled.
    ///
    /// # Errors
    /// `ShapeMismatch` if `initial_data` is not exactly `byte_length` bytes.
    /// `CapacityExceeded` above the device's `max_buffer_size`.
    pub fn allocate_buffer(
        &self,
        byte_length: u64,
        access: HostAccess,
        initial_data: Option<&[u8]>,
    ) -> Result<MemoryObject<'_>> {
        if let Some(data) = initial_data {
            if data.len() as u64 != byte_length {
                return Err(ComputeError::ShapeMismatch(format!(
                    "initial data is {} bytes, buffer is {byte_length}",
                    data.len()
                )));
            }
        }
        let max = self.limits().max_buffer_size;
        if byte_length > max {
            return Err(ComputeError::CapacityExceeded {
                what: "buffer size",
                requested: byte_length,
                max,
            });
        }

        let id = self.next_object_id();
        let size = device_buffer_size(byte_length);
        let label = format!("gridline buffer #{id}");

        let (buffer, error) = self.scoped(|| {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label.as_str()),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: initial_data.is_some(),
            });
            if let Some(data) = initial_data {
                buffer.slice(..).get_mapped_range_mut()[..data.len()].copy_from_slice(data);
                buffer.unmap();
            }
            buffer
        });
        if let Some(error) = error {
            return Err(ComputeError::DeviceExecution(error.to_string()));
        }

        debug!(id, byte_length, %access, initialised = initial_data.is_some(), "buffer allocated");
        Ok(MemoryObject {
            ctx: self,
            id,
            access,
            storage: Storage::Linear { buffer, byte_length },
            dirty: AtomicBool::new(false),
        })
    }

    /// Allocate a buffer initialised from a host slice.
    pub fn allocate_buffer_from<T: Pod>(
        &self,
        data: &[T],
        access: HostAccess,
    ) -> Result<MemoryObject<'_>> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.allocate_buffer(bytes.len() as u64, access, Some(bytes))
    }

    /// Allocate a zero-filled buffer holding `len` elements of `T`.
    ///
    /// # Errors
    /// `CapacityExceeded` if `len × size_of::<T>()` overflows or is above
    /// the device's `max_buffer_size`.
    pub fn allocate_buffer_zeroed<T: Pod>(
        &self,
        len: usize,
        access: HostAccess,
    ) -> Result<MemoryObject<'_>> {
        let byte_length = len
            .checked_mul(std::mem::size_of::<T>())
            .and_then(|n| u64::try_from(n).ok())
            .ok_or(ComputeError::CapacityExceeded {
                what: "buffer size",
                requested: u64::MAX,
                max: self.limits().max_buffer_size,
            })?;
        self.allocate_buffer(byte_length, access, None)
    }

    /// Allocate a 2D image.
    ///
    /// The host row pitch is taken from `initial_data` when given, otherwise
    /// rows are packed.
    ///
    /// # Errors
    /// `ShapeMismatch` for zero extents, initial data of another shape or
    /// format, or initial data with non-zero row padding. `UnsupportedFormat` if `format` has no texture equivalent.
    /// `CapacityExceeded` above `max_texture_dimension_2d`.
    pub fn allocate_image(
        &self,
        width: u32,
        height: u32,
        format: ElementFormat,
        access: HostAccess,
        initial_data: Option<&HostImage>,
    ) -> Result<MemoryObject<'_>> {
        if width == 0 || height == 0 {
            return Err(ComputeError::ShapeMismatch(format!(
                "image extent {width}×{height} has a zero dimension"
            )));
        }
        let texture_format = format
            .texture_format()
            .ok_or(ComputeError::UnsupportedFormat(format))?;
        let max = self.limits().max_texture_dimension_2d;
        if width.max(height) > max {
            return Err(ComputeError::CapacityExceeded {
                what: "image dimension",
                requested: width.max(height) as u64,
                max: max as u64,
            });
        }
        if let Some(img) = initial_data {
            check_image_shape(img, width, height, format)?;
            check_zero_padding(img)?;
        }

        let id = self.next_object_id();
        let row_pitch = initial_data
            .map(HostImage::row_pitch)
            .unwrap_or(width as usize * format.element_size());

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        if self.supports_storage(texture_format) {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }

        let label = format!("gridline image #{id}");
        let (texture, error) = self.scoped(|| {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label.as_str()),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format,
                usage,
                view_formats: &[],
            })
        });
        if let Some(error) = error {
            return Err(ComputeError::DeviceExecution(error.to_string()));
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let object = MemoryObject {
            ctx: self,
            id,
            access,
            storage: Storage::Image2D { texture, view, width, height, row_pitch, format },
            dirty: AtomicBool::new(false),
        };
        if let (Some(img), Storage::Image2D { texture, .. }) = (initial_data, &object.storage) {
            object.upload_image(texture, img)?;
        }

        debug!(id, width, height, %format, row_pitch, %access, "image allocated");
        Ok(object)
    }
}

impl<'ctx> MemoryObject<'ctx> {
    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    pub fn kind(&self) -> MemoryKind {
        match self.storage {
            Storage::Linear { .. } => MemoryKind::Buffer,
            Storage::Image2D { .. } => MemoryKind::Image,
        }
    }

    pub fn shape(&self) -> MemoryShape {
        match self.storage {
            Storage::Linear { byte_length, .. } => MemoryShape::Linear { byte_length },
            Storage::Image2D { width, height, row_pitch, format, .. } => {
                MemoryShape::Image2D { width, height, row_pitch, format }
            }
        }
    }

    pub fn access(&self) -> HostAccess {
        self.access
    }

    /// Bytes moved by `write`/`read` of the whole object.
    pub fn byte_length(&self) -> u64 {
        self.shape().host_bytes()
    }

    /// Whether a kernel that may write this object was enqueued since the
    /// last successful `read`, `read_vec` or `read_image`.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn context(&self) -> &'ctx DeviceContext {
        self.ctx
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Upload raw bytes. Images expect `height × row_pitch` bytes in the
    /// object's declared pitch, with zero padding.
    ///
    /// # Errors
    /// `AccessMode` for host-read-only objects, `ShapeMismatch` for the
    /// wrong length or non-zero image padding.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.check_access(HostAccess::allows_write, "write")?;
        if data.len() as u64 != self.byte_length() {
            return Err(ComputeError::ShapeMismatch(format!(
                "write of {} bytes to an object of {} bytes",
                data.len(),
                self.byte_length()
            )));
        }
        match &self.storage {
            Storage::Linear { buffer, .. } => self.upload_linear(buffer, data),
            Storage::Image2D { texture, width, height, row_pitch, format, .. } => {
                let img = HostImage::from_vec_with_pitch(
                    *width as usize,
                    *height as usize,
                    *row_pitch,
                    *format,
                    data.to_vec(),
                )?;
                check_zero_padding(&img)?;
                self.upload_image(texture, &img)
            }
        }
    }

    /// Download the whole object. Waits for all previously enqueued work.
    ///
    /// # Errors
    /// `AccessMode` for host-write-only objects, `DeviceExecution` if the
    /// device reported a failure.
    pub fn read(&self) -> Result<Vec<u8>> {
        self.check_access(HostAccess::allows_read, "read")?;
        let bytes = match &self.storage {
            Storage::Linear { buffer, byte_length } => self.download_linear(buffer, *byte_length)?,
            Storage::Image2D { .. } => self.download_image()?.into_bytes(),
        };
        self.dirty.store(false, Ordering::Release);
        Ok(bytes)
    }

    /// Upload a typed slice.
    pub fn write_slice<T: Pod>(&self, data: &[T]) -> Result<()> {
        self.write(bytemuck::cast_slice(data))
    }

    /// Download as a typed vector.
    ///
    /// # Errors
    /// As `read`, plus `ShapeMismatch` if the byte length is not a multiple
    /// of `size_of::<T>()`.
    pub fn read_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let bytes = self.read()?;
        let size = std::mem::size_of::<T>();
        if size == 0 || bytes.len() % size != 0 {
            return Err(ComputeError::ShapeMismatch(format!(
                "{} bytes is not a whole number of {size}-byte elements",
                bytes.len()
            )));
        }
        // `bytes` has no alignment guarantee for T.
        Ok(bytes.chunks_exact(size).map(bytemuck::pod_read_unaligned).collect())
    }

    /// Upload an image of any row pitch.
    ///
    /// # Errors
    /// `AccessMode`, or `ShapeMismatch` if the object is not an image of the
    /// same extent and format.
    pub fn write_image(&self, img: &HostImage) -> Result<()> {
        self.check_access(HostAccess::allows_write, "write")?;
        match &self.storage {
            Storage::Image2D { texture, width, height, format, .. } => {
                check_image_shape(img, *width, *height, *format)?;
                self.upload_image(texture, img)
            }
            Storage::Linear { .. } => Err(ComputeError::ShapeMismatch(
                "write_image on a linear buffer".to_string(),
            )),
        }
    }

    /// Download an image in the object's declared row pitch.
    pub fn read_image(&self) -> Result<HostImage> {
        self.check_access(HostAccess::allows_read, "read")?;
        let img = self.download_image()?;
        self.dirty.store(false, Ordering::Release);
        Ok(img)
    }

    /// Destroy the device resource now instead of at drop.
    pub fn release(self) {
        match &self.storage {
            Storage::Linear { buffer, .. } => buffer.destroy(),
            Storage::Image2D { texture, .. } => texture.destroy(),
        }
        debug!(id = self.id, "memory object released");
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    pub(crate) fn arg_kind(&self) -> ArgKind {
        match self.storage {
            Storage::Linear { byte_length, .. } => ArgKind::Buffer { byte_length },
            Storage::Image2D { format, .. } => ArgKind::Image { format },
        }
    }

    pub(crate) fn binding_resource(&self) -> wgpu::BindingResource<'_> {
        match &self.storage {
            Storage::Linear { buffer, .. } => buffer.as_entire_binding(),
            Storage::Image2D { view, .. } => wgpu::BindingResource::TextureView(view),
        }
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check_access(&self, allowed: fn(HostAccess) -> bool, operation: &'static str) -> Result<()> {
        if allowed(self.access) {
            Ok(())
        } else {
            Err(ComputeError::AccessMode { access: self.access, operation })
        }
    }

    fn upload_linear(&self, buffer: &wgpu::Buffer, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        // `write_buffer` lengths must be 4-byte multiples; pad the tail.
        let padded;
        let data = if data.len() as u64 % BUFFER_ALIGNMENT == 0 {
            data
        } else {
            let mut v = data.to_vec();
            v.resize(align_to_u64(data.len() as u64, BUFFER_ALIGNMENT) as usize, 0);
            padded = v;
            &padded[..]
        };
        self.ctx.queue.write_buffer(buffer, 0, data);
        self.finish_transfer()?;
        trace!(id = self.id, bytes = data.len(), "buffer written");
        Ok(())
    }

    fn download_linear(&self, buffer: &wgpu::Buffer, byte_length: u64) -> Result<Vec<u8>> {
        if byte_length == 0 {
            self.ctx.synchronize()?;
            return Ok(Vec::new());
        }
        let size = device_buffer_size(byte_length);
        let readback = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gridline readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gridline readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &readback, 0, size);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let mut out = map_readback(self.ctx, &readback)?;
        out.truncate(byte_length as usize);
        trace!(id = self.id, bytes = byte_length, "buffer read");
        Ok(out)
    }

    fn upload_image(&self, texture: &wgpu::Texture, img: &HostImage) -> Result<()> {
        let (width, height) = (img.width() as u32, img.height() as u32);
        let packed = img.packed_row_bytes();
        let aligned = align_to(packed as u32, COPY_ALIGNMENT) as usize;

        let staging = restride(img.as_bytes(), img.row_pitch(), packed, img.height(), aligned);
        let staging_buf = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gridline image staging"),
            contents: &staging,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gridline image upload"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.finish_transfer()?;
        trace!(id = self.id, width, height, host_pitch = img.row_pitch(), "image written");
        Ok(())
    }

    fn download_image(&self) -> Result<HostImage> {
        let Storage::Image2D { texture, width, height, row_pitch, format, .. } = &self.storage else {
            return Err(ComputeError::ShapeMismatch(
                "image read on a linear buffer".to_string(),
            ));
        };
        let (width, height, row_pitch, format) = (*width, *height, *row_pitch, *format);
        let packed = width as usize * format.element_size();
        let aligned = align_to(packed as u32, COPY_ALIGNMENT);
        let readback = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gridline image readback"),
            size: aligned as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gridline image readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let staged = map_readback(self.ctx, &readback)?;
        let bytes = restride(&staged, aligned as usize, packed, height as usize, row_pitch);
        trace!(id = self.id, width, height, "image read");
        HostImage::from_vec_with_pitch(width as usize, height as usize, row_pitch, format, bytes)
    }

    /// Flush queued writes and wait for them to land.
    fn finish_transfer(&self) -> Result<()> {
        let index = self.ctx.queue.submit(std::iter::empty());
        self.ctx.device.poll(wgpu::Maintain::wait_for(index));
        self.ctx.take_device_error()
    }
}

impl std::fmt::Debug for MemoryObject<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObject")
            .field("id", &self.id)
            .field("shape", &self.shape())
            .field("access", &self.access)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a MAP_READ buffer after all submitted work, returning its bytes.
fn map_readback(ctx: &DeviceContext, readback: &wgpu::Buffer) -> Result<Vec<u8>> {
    let slice = readback.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    // Poll until the copy is done and the map callback fires.
    ctx.device.poll(wgpu::Maintain::Wait);
    ctx.take_device_error()?;
    receiver
        .recv()
        .map_err(|_| ComputeError::DeviceExecution("readback map callback never fired".into()))?
        .map_err(|e| ComputeError::DeviceExecution(format!("readback map failed: {e}")))?;

    let out = slice.get_mapped_range().to_vec();
    readback.unmap();
    Ok(out)
}

fn check_image_shape(img: &HostImage, width: u32, height: u32, format: ElementFormat) -> Result<()> {
    if img.width() != width as usize || img.height() != height as usize || img.format() != format {
        return Err(ComputeError::ShapeMismatch(format!(
            "host image is {}×{} {}, object is {width}×{height} {format}",
            img.width(),
            img.height(),
            img.format()
        )));
    }
    Ok(())
}

/// Padding is never transferred, so non-zero padding could not read back.
fn check_zero_padding(img: &HostImage) -> Result<()> {
    if img.padding_is_zero() {
        Ok(())
    } else {
        Err(ComputeError::ShapeMismatch(format!(
            "image data has non-zero bytes in the row padding (pitch {}, active row {} bytes)",
            img.row_pitch(),
            img.packed_row_bytes()
        )))
    }
}

/// Copy `rows` rows of `active` bytes from a `src_pitch` layout into a
/// zeroed `dst_pitch` layout.
fn restride(src: &[u8], src_pitch: usize, active: usize, rows: usize, dst_pitch: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_pitch * rows];
    for y in 0..rows {
        let s = y * src_pitch;
        let d = y * dst_pitch;
        dst[d..d + active].copy_from_slice(&src[s..s + active]);
    }
    dst
}

/// Device size for a buffer of `byte_length` declared bytes.
fn device_buffer_size(byte_length: u64) -> u64 {
    align_to_u64(byte_length, BUFFER_ALIGNMENT).max(BUFFER_ALIGNMENT)
}

/// Round `value` up to the next multiple of `alignment`.
///
///   align_to(100, 256) = 256
///   align_to(256, 256) = 256
///   align_to(257, 256) = 512
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

#[inline]
fn align_to_u64(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(641, 256), 768);
    }

    #[test]
    fn test_device_buffer_size() {
        assert_eq!(device_buffer_size(0), 4);
        assert_eq!(device_buffer_size(1), 4);
        assert_eq!(device_buffer_size(4), 4);
        assert_eq!(device_buffer_size(6), 8);
    }

    #[test]
    fn test_restride_to_aligned_rows() {
        // width 3, pitch 4: one padding byte per row.
        let src = [10, 20, 30, 99, 40, 50, 60, 99];
        let aligned = align_to(3, 256) as usize;
        let staged = restride(&src, 4, 3, 2, aligned);
        assert_eq!(staged.len(), 512);
        assert_eq!(&staged[0..3], &[10, 20, 30]);
        assert_eq!(&staged[aligned..aligned + 3], &[40, 50, 60]);
        // Padding is never copied.
        assert!(staged[3..aligned].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_restride_back_to_host_pitch() {
        let aligned = 256;
        let mut staged = vec![0u8; aligned * 2];
        staged[..2].copy_from_slice(&[1, 2]);
        staged[aligned..aligned + 2].copy_from_slice(&[3, 4]);
        let host = restride(&staged, aligned, 2, 2, 5);
        assert_eq!(host, vec![1, 2, 0, 0, 0, 3, 4, 0, 0, 0]);
    }

    #[test]
    fn test_host_bytes() {
        assert_eq!(MemoryShape::Linear { byte_length: 7 }.host_bytes(), 7);
        let img = MemoryShape::Image2D {
            width: 3,
            height: 2,
            row_pitch: 13,
            format: ElementFormat::RGBA8_UNORM,
        };
        assert_eq!(img.host_bytes(), 26);
    }
}
