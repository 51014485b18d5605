//! Procedural Texture Generators
//!
//! Test images for uploads and mipmap checks. Every generator returns an
//! RGBA8 [`PixelBuffer`] in the requested layout.

use serde::{Deserialize, Serialize};

use crate::buffer::{Layout, PixelBuffer};
use crate::texel::Rgba8;

/// Named generator, as selected from the command line or a config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    #[default]
    Checkerboard,
    Xor,
    Plasma,
    Gradient,
}

impl Pattern {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "checkerboard" => Some(Self::Checkerboard),
            "xor" => Some(Self::Xor),
            "plasma" => Some(Self::Plasma),
            "gradient" => Some(Self::Gradient),
            _ => None,
        }
    }

    pub fn generate(self, width: usize, height: usize, layout: Layout) -> PixelBuffer<Rgba8> {
        match self {
            Self::Checkerboard => checkerboard(
                width,
                height,
                (width / 8).max(1),
                Rgba8::WHITE,
                Rgba8::new(40, 40, 40, 255),
                layout,
            ),
            Self::Xor => xor_pattern(width, height, layout),
            Self::Plasma => plasma(width, height, &rainbow_palette(256), layout),
            Self::Gradient => gradient(width, height, layout),
        }
    }
}

fn generate_with(
    width: usize,
    height: usize,
    layout: Layout,
    f: impl Fn(usize, usize) -> Rgba8,
) -> PixelBuffer<Rgba8> {
    let mut buffer = PixelBuffer::with_layout(width, height, layout);
    for y in 0..height {
        for x in 0..width {
            buffer.set(x, y, f(x, y));
        }
    }
    buffer
}

/// Alternating square tiles of `c1` and `c2`
pub fn checkerboard(
    width: usize,
    height: usize,
    tile_size: usize,
    c1: Rgba8,
    c2: Rgba8,
    layout: Layout,
) -> PixelBuffer<Rgba8> {
    let tile_size = tile_size.max(1);
    generate_with(width, height, layout, |x, y| {
        if ((x / tile_size) + (y / tile_size)) % 2 == 0 {
            c1
        } else {
            c2
        }
    })
}

/// Gray XOR pattern
pub fn xor_pattern(width: usize, height: usize, layout: Layout) -> PixelBuffer<Rgba8> {
    generate_with(width, height, layout, |x, y| {
        let v = (x ^ y) as u8;
        Rgba8::new(v, v, v, 255)
    })
}

/// Sum of sines mapped through `palette`
pub fn plasma(width: usize, height: usize, palette: &[Rgba8], layout: Layout) -> PixelBuffer<Rgba8> {
    if palette.is_empty() {
        return PixelBuffer::with_layout(width, height, layout);
    }
    let scale_x = std::f32::consts::TAU / width.max(1) as f32;
    let scale_y = std::f32::consts::TAU / height.max(1) as f32;

    generate_with(width, height, layout, |x, y| {
        let fx = x as f32 * scale_x;
        let fy = y as f32 * scale_y;

        let v1 = (fx * 2.0).sin();
        let v2 = (fy * 3.0).sin();
        let v3 = ((fx + fy) * 1.5).sin();
        let v4 = ((fx * fx + fy * fy).sqrt() * 2.0).sin();

        let sum = (v1 + v2 + v3 + v4 + 4.0) / 8.0;
        let idx = (sum * (palette.len() - 1) as f32) as usize;
        palette[idx.min(palette.len() - 1)]
    })
}

/// Red ramps along x, green along y, alpha opaque
pub fn gradient(width: usize, height: usize, layout: Layout) -> PixelBuffer<Rgba8> {
    let ramp = |i: usize, n: usize| -> u8 {
        if n <= 1 {
            0
        } else {
            (i * 255 / (n - 1)) as u8
        }
    };
    generate_with(width, height, layout, |x, y| Rgba8::new(ramp(x, width), ramp(y, height), 128, 255))
}

/// HSV to RGB color conversion
/// h: 0-360, s: 0-1, v: 0-1
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgba8 {
    let c = v * s;
    let h_prime = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match h_prime as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgba8::new(
        ((r1 + m) * 255.0) as u8,
        ((g1 + m) * 255.0) as u8,
        ((b1 + m) * 255.0) as u8,
        255,
    )
}

/// `count` fully saturated hues evenly spaced around the wheel
pub fn rainbow_palette(count: usize) -> Vec<Rgba8> {
    (0..count)
        .map(|i| hsv_to_rgb(i as f32 * 360.0 / count as f32, 1.0, 1.0))
        .collect()
}
