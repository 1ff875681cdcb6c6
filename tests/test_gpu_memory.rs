// tests/test_gpu_memory.rs — Memory object transfers on a real device.
//
// Needs an adapter (a software one will do); see tests/common/mod.rs.

mod common;

use common::context;
use gridline::{
    ChannelType, ComputeError, ElementFormat, HostAccess, HostImage, MemoryKind, MemoryShape,
};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

/// Image with every active byte set and every padding byte zero.
fn patterned_image(width: usize, height: usize, pitch: usize, format: ElementFormat) -> HostImage {
    let mut img = HostImage::with_pitch(width, height, pitch, format).unwrap();
    for y in 0..height {
        for (x, b) in img.row_mut(y).iter_mut().enumerate() {
            *b = (x * 7 + y * 13 + 1) as u8;
        }
    }
    img
}

// ===== Buffers =====

#[test]
fn buffer_round_trip_three_sizes() {
    let Some(ctx) = context() else { return };
    for len in [1usize, 1001, 1 << 20] {
        let data = pattern(len);
        let buf = ctx
            .allocate_buffer(len as u64, HostAccess::ReadWrite, None)
            .unwrap();
        buf.write(&data).unwrap();
        ctx.synchronize().unwrap();
        assert_eq!(buf.read().unwrap(), data, "len {len}");
    }
}

#[test]
fn buffer_initial_data_round_trip() {
    let Some(ctx) = context() else { return };
    let data = pattern(37);
    let buf = ctx
        .allocate_buffer(37, HostAccess::Read, Some(&data))
        .unwrap();
    assert_eq!(buf.kind(), MemoryKind::Buffer);
    assert_eq!(buf.shape(), MemoryShape::Linear { byte_length: 37 });
    assert_eq!(buf.read().unwrap(), data);
}

#[test]
fn typed_round_trip() {
    let Some(ctx) = context() else { return };
    let values: Vec<f32> = (0..500).map(|i| i as f32 * 0.25 - 3.0).collect();
    let buf = ctx
        .allocate_buffer_from(&values, HostAccess::ReadWrite)
        .unwrap();
    assert_eq!(buf.read_vec::<f32>().unwrap(), values);

    let zeros = ctx
        .allocate_buffer_zeroed::<u32>(64, HostAccess::ReadWrite)
        .unwrap();
    assert_eq!(zeros.read_vec::<u32>().unwrap(), vec![0u32; 64]);
    zeros.write_slice(&[9u32; 64]).unwrap();
    assert_eq!(zeros.read_vec::<u32>().unwrap(), vec![9u32; 64]);
}

#[test]
fn empty_buffer_reads_empty() {
    let Some(ctx) = context() else { return };
    let buf = ctx.allocate_buffer(0, HostAccess::ReadWrite, None).unwrap();
    buf.write(&[]).unwrap();
    assert!(buf.read().unwrap().is_empty());
}

#[test]
fn buffer_shape_mismatch() {
    let Some(ctx) = context() else { return };
    let err = ctx
        .allocate_buffer(8, HostAccess::ReadWrite, Some(&[1, 2, 3]))
        .unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));

    let buf = ctx.allocate_buffer(8, HostAccess::ReadWrite, None).unwrap();
    let err = buf.write(&[0; 9]).unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));
    let err = buf.read_vec::<[u8; 3]>().unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));
}

#[test]
fn buffer_over_device_limit() {
    let Some(ctx) = context() else { return };
    let max = ctx.limits().max_buffer_size;
    let err = ctx
        .allocate_buffer(max + 1, HostAccess::ReadWrite, None)
        .unwrap_err();
    match err {
        ComputeError::CapacityExceeded { requested, max: m, .. } => {
            assert_eq!(requested, max + 1);
            assert_eq!(m, max);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

// ===== Access modes =====

#[test]
fn zeroed_allocation_size_overflow() {
    let Some(ctx) = context() else { return };
    let err = ctx
        .allocate_buffer_zeroed::<u64>(usize::MAX, HostAccess::ReadWrite)
        .unwrap_err();
    assert!(matches!(err, ComputeError::CapacityExceeded { .. }), "{err}");
}

#[test]
fn read_only_object_refuses_write() {
    let Some(ctx) = context() else { return };
    // Initial data is accepted regardless of the declared mode.
    let buf = ctx
        .allocate_buffer(4, HostAccess::Read, Some(&[1, 2, 3, 4]))
        .unwrap();
    let err = buf.write(&[0; 4]).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::AccessMode { access: HostAccess::Read, operation: "write" }
    ));
    assert_eq!(buf.read().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn write_only_object_refuses_read() {
    let Some(ctx) = context() else { return };
    let buf = ctx.allocate_buffer(4, HostAccess::Write, None).unwrap();
    buf.write(&[5; 4]).unwrap();
    let err = buf.read().unwrap_err();
    assert!(matches!(
        err,
        ComputeError::AccessMode { access: HostAccess::Write, operation: "read" }
    ));

    let img = ctx
        .allocate_image(2, 2, ElementFormat::R8_UNORM, HostAccess::Write, None)
        .unwrap();
    assert!(matches!(
        img.read_image().unwrap_err(),
        ComputeError::AccessMode { .. }
    ));
}

// ===== Images =====

#[test]
fn image_round_trip_three_sizes() {
    let Some(ctx) = context() else { return };
    let cases = [
        // Misaligned pitch: 3 × 4 B active, 13 B pitch.
        (3usize, 2usize, 13usize, ElementFormat::RGBA8_UNORM),
        // Packed single-channel.
        (64, 64, 64, ElementFormat::R8_UNORM),
        // Wider than one 256-byte staging row, padded pitch.
        (257, 5, 257 * 16 + 12, ElementFormat::RGBA32_FLOAT),
    ];
    for (w, h, pitch, format) in cases {
        let src = patterned_image(w, h, pitch, format);
        let img = ctx
            .allocate_image(w as u32, h as u32, format, HostAccess::ReadWrite, Some(&src))
            .unwrap();
        assert_eq!(img.kind(), MemoryKind::Image);
        let back = img.read_image().unwrap();
        assert_eq!(back.row_pitch(), pitch, "{w}×{h}");
        assert_eq!(back, src, "{w}×{h} {format}");
    }
}

#[test]
fn image_write_accepts_any_pitch() {
    let Some(ctx) = context() else { return };
    let format = ElementFormat::RGBA8_UNORM;
    let img = ctx
        .allocate_image(5, 3, format, HostAccess::ReadWrite, None)
        .unwrap();
    // Freshly allocated images read back as zeros in packed pitch.
    let zeros = img.read_image().unwrap();
    assert_eq!(zeros.row_pitch(), 20);
    assert!(zeros.as_bytes().iter().all(|&b| b == 0));

    let src = patterned_image(5, 3, 29, format);
    img.write_image(&src).unwrap();
    let back = img.read_image().unwrap();
    assert_eq!(back.row_pitch(), 20);
    assert!(back.same_pixels(&src));
}

#[test]
fn image_raw_bytes_use_declared_pitch() {
    let Some(ctx) = context() else { return };
    let format = ElementFormat::R8_UNORM;
    let src = patterned_image(3, 4, 8, format);
    let img = ctx
        .allocate_image(3, 4, format, HostAccess::ReadWrite, Some(&src))
        .unwrap();
    assert_eq!(img.byte_length(), 32);
    assert_eq!(img.read().unwrap(), src.as_bytes());

    let err = img.write(&[0; 12]).unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));

    let raw: Vec<u8> = (0..32u8).map(|i| if i % 8 < 3 { i + 1 } else { 0 }).collect();
    img.write(&raw).unwrap();
    assert_eq!(img.read().unwrap(), raw);
    let back = img.read_image().unwrap();
    assert_eq!(back.row(2), &[17, 18, 19]);
}

#[test]
fn image_write_rejects_nonzero_padding() {
    let Some(ctx) = context() else { return };
    let format = ElementFormat::R8_UNORM;
    let img = ctx
        .allocate_image(3, 4, format, HostAccess::ReadWrite, None)
        .unwrap();
    assert_eq!(img.byte_length(), 12);

    // Packed rows: every byte is active, so any data round-trips.
    let packed: Vec<u8> = (1..=12).collect();
    img.write(&packed).unwrap();
    assert_eq!(img.read().unwrap(), packed);

    // Pitch 4 leaves one padding byte per row; 1..=16 fills it.
    let dirty = HostImage::from_vec_with_pitch(3, 4, 4, format, (1..=16).collect()).unwrap();
    let target = ctx
        .allocate_image(3, 4, format, HostAccess::ReadWrite, None)
        .unwrap();
    let err = ctx
        .allocate_image(3, 4, format, HostAccess::ReadWrite, Some(&dirty))
        .unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));

    let clean = patterned_image(3, 4, 4, format);
    let pitched = ctx
        .allocate_image(3, 4, format, HostAccess::ReadWrite, Some(&clean))
        .unwrap();
    let err = pitched.write(dirty.as_bytes()).unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));
    // Rejected writes leave the contents alone.
    assert_eq!(pitched.read().unwrap(), clean.as_bytes());
    // write_image copies active bytes only, whatever the source pitch.
    target.write_image(&dirty).unwrap();
    assert!(target.read_image().unwrap().same_pixels(&dirty));
}

#[test]
fn image_shape_errors() {
    let Some(ctx) = context() else { return };
    let err = ctx
        .allocate_image(0, 4, ElementFormat::R8_UNORM, HostAccess::ReadWrite, None)
        .unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));

    let other = HostImage::new(4, 4, ElementFormat::RGBA8_UNORM);
    let err = ctx
        .allocate_image(4, 4, ElementFormat::R8_UNORM, HostAccess::ReadWrite, Some(&other))
        .unwrap_err();
    assert!(matches!(err, ComputeError::ShapeMismatch(_)));

    let three = ElementFormat::new(ChannelType::Uint8, 3);
    let err = ctx
        .allocate_image(4, 4, three, HostAccess::ReadWrite, None)
        .unwrap_err();
    assert!(matches!(err, ComputeError::UnsupportedFormat(_)));

    let max = ctx.limits().max_texture_dimension_2d;
    let err = ctx
        .allocate_image(max + 1, 1, ElementFormat::R8_UNORM, HostAccess::ReadWrite, None)
        .unwrap_err();
    assert!(matches!(err, ComputeError::CapacityExceeded { .. }));
}

#[test]
fn release_consumes_object() {
    let Some(ctx) = context() else { return };
    let buf = ctx.allocate_buffer(16, HostAccess::ReadWrite, None).unwrap();
    assert!(!buf.is_dirty());
    buf.release();
    ctx.synchronize().unwrap();
    ctx.teardown();
}
