// demos/hsv_split.rs
//
// Split view of an image: left half as loaded, right half with the HSV
// channels shown as RGB. Both inputs and the output are image objects.
//
// Usage:
//   cargo run --example hsv_split --release -- <input.png> [output.png]
//
// Output defaults to `<input>_hsv_split.png` next to the input.

use std::env;
use std::path::{Path, PathBuf};

use gridline::{DeviceContext, ElementFormat, HostAccess, HostImage, KernelArg, ParallelTask};
use tracing_subscriber::EnvFilter;

const HSV_SPLIT: &str = r#"
@group(0) @binding(0) var rgb_img: texture_2d<f32>;
@group(0) @binding(1) var hsv_img: texture_2d<f32>;
@group(0) @binding(2) var dst_img: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(3) var<uniform> width: i32;
@group(0) @binding(4) var<uniform> height: i32;

@compute @workgroup_size(16, 16)
fn hsv_split_view(@builtin(global_invocation_id) gid: vec3<u32>) {
    let pos = vec2<i32>(gid.xy);
    if (pos.x >= width || pos.y >= height) { return; }

    var color: vec4<f32>;
    if (pos.x < width / 2) {
        color = textureLoad(rgb_img, pos, 0);
    } else {
        color = textureLoad(hsv_img, pos, 0);
    }
    textureStore(dst_img, pos, color);
}
"#;

/// RGB to HSV with all three channels scaled to 0..=255.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max == 0.0 { 0.0 } else { delta / max };

    [
        (hue / 360.0 * 255.0).round() as u8,
        (sat * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    ]
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    input.with_file_name(format!("{stem}_hsv_split.png"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input.png> [output.png]", args[0]);
        std::process::exit(1);
    }
    let input = PathBuf::from(&args[1]);
    let output = args.get(2).map(PathBuf::from).unwrap_or_else(|| default_output(&input));

    let rgba = image::open(&input)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    println!("Loaded {}: {width}x{height}", input.display());

    let mut hsv = rgba.clone();
    for px in hsv.pixels_mut() {
        let [h, s, v] = rgb_to_hsv(px[0], px[1], px[2]);
        px.0 = [h, s, v, px[3]];
    }

    let format = ElementFormat::RGBA8_UNORM;
    let (w, h) = (width as usize, height as usize);
    let rgb_host = HostImage::from_vec(w, h, format, rgba.into_raw())?;
    let hsv_host = HostImage::from_vec(w, h, format, hsv.into_raw())?;

    let ctx = DeviceContext::create()?;
    let rgb_mem = ctx.allocate_image(width, height, format, HostAccess::Write, Some(&rgb_host))?;
    let hsv_mem = ctx.allocate_image(width, height, format, HostAccess::Write, Some(&hsv_host))?;
    let dst_mem = ctx.allocate_image(width, height, format, HostAccess::Read, None)?;

    let split = ParallelTask::new(&ctx, HSV_SPLIT, None)?;
    split.execute(
        (width, height),
        [
            KernelArg::from(&rgb_mem),
            KernelArg::from(&hsv_mem),
            KernelArg::from(&dst_mem),
            (width as i32).into(),
            (height as i32).into(),
        ],
        None,
    )?;

    let result = dst_mem.read_image()?.to_packed();
    let out = image::RgbaImage::from_raw(width, height, result.into_bytes())
        .ok_or("device image does not match the requested extent")?;
    out.save(&output)?;
    println!("Split view saved to {}", output.display());
    Ok(())
}
