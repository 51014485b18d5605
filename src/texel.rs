//! Texel element types.
//!
//! Buffers, mip chains and samplers are generic over [`Texel`]. The trait is
//! the minimum the sampler needs: a zero value (via `Zeroable`), raw byte
//! access for persistence (via `Pod`) and interpolation.

use std::fmt::Debug;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::math::Vec4;

pub trait Texel: Pod + Default + PartialEq + Debug + Send + Sync + 'static {
    /// Linear interpolation `a * (1 - t) + b * t`.
    fn mix(a: Self, b: Self, t: f32) -> Self;

    #[inline]
    fn zero() -> Self {
        Self::zeroed()
    }
}

impl Texel for f32 {
    #[inline]
    fn mix(a: Self, b: Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

impl Texel for Vec4 {
    #[inline]
    fn mix(a: Self, b: Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

/// 8-bit-per-channel RGBA texel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Quantize a normalized color, clamping each channel to [0, 1].
    #[inline]
    pub fn from_vec4(c: Vec4) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(q(c.x), q(c.y), q(c.z), q(c.w))
    }

    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }
}

impl Texel for Rgba8 {
    /// Channels interpolate in float and round to the nearest step.
    #[inline]
    fn mix(a: Self, b: Self, t: f32) -> Self {
        let ch = |x: u8, y: u8| -> u8 {
            let v = x as f32 * (1.0 - t) + y as f32 * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Self::new(ch(a.r, b.r), ch(a.g, b.g), ch(a.b, b.b), ch(a.a, b.a))
    }
}
