//! Blend Unit
//!
//! Pure functions evaluating a separable blend equation. Nothing here clamps:
//! `ONE, ONE, ADD` can exceed 1.0 and it is up to the caller to quantize.

use std::ops::{Add, Mul, Sub};

use crate::math::{Vec3, Vec4};
use crate::states::{BlendFactor, BlendFunction, BlendParameters};

/// A value the blend equation can operate on: a scalar (alpha) or an RGB
/// triple.
pub trait BlendOperand: Copy + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> {
    fn splat(v: f32) -> Self;
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;
}

impl BlendOperand for f32 {
    #[inline]
    fn splat(v: f32) -> Self {
        v
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        f32::min(self, other)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        f32::max(self, other)
    }
}

impl BlendOperand for Vec3 {
    #[inline]
    fn splat(v: f32) -> Self {
        Vec3::splat(v)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        Vec3::min(self, other)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        Vec3::max(self, other)
    }
}

/// Per-channel multiplier for one side of the blend equation
#[inline]
pub fn calc_blend_factor<T: BlendOperand>(
    src: T,
    src_alpha: f32,
    dst: T,
    dst_alpha: f32,
    factor: BlendFactor,
) -> T {
    match factor {
        BlendFactor::Zero => T::splat(0.0),
        BlendFactor::One => T::splat(1.0),
        BlendFactor::SrcColor => src,
        BlendFactor::SrcAlpha => T::splat(src_alpha),
        BlendFactor::DstColor => dst,
        BlendFactor::DstAlpha => T::splat(dst_alpha),
        BlendFactor::OneMinusSrcColor => T::splat(1.0) - src,
        BlendFactor::OneMinusSrcAlpha => T::splat(1.0 - src_alpha),
        BlendFactor::OneMinusDstColor => T::splat(1.0) - dst,
        BlendFactor::OneMinusDstAlpha => T::splat(1.0 - dst_alpha),
    }
}

/// Combine the already-weighted source and destination
#[inline]
pub fn calc_blend_func<T: BlendOperand>(src: T, dst: T, func: BlendFunction) -> T {
    match func {
        BlendFunction::Add => src + dst,
        BlendFunction::Subtract => src - dst,
        BlendFunction::ReverseSubtract => dst - src,
        BlendFunction::Min => src.min(dst),
        BlendFunction::Max => src.max(dst),
    }
}

/// Blend `src` over `dst`. RGB and alpha are evaluated independently with
/// their own factor pair and function.
pub fn calc_blend_color(src: Vec4, dst: Vec4, params: &BlendParameters) -> Vec4 {
    let src_rgb = src.rgb();
    let dst_rgb = dst.rgb();
    let src_rgb_f = calc_blend_factor(src_rgb, src.w, dst_rgb, dst.w, params.src_rgb);
    let dst_rgb_f = calc_blend_factor(src_rgb, src.w, dst_rgb, dst.w, params.dst_rgb);
    let rgb = calc_blend_func(src_rgb * src_rgb_f, dst_rgb * dst_rgb_f, params.func_rgb);

    let src_a_f = calc_blend_factor(src.w, src.w, dst.w, dst.w, params.src_alpha);
    let dst_a_f = calc_blend_factor(src.w, src.w, dst.w, dst.w, params.dst_alpha);
    let alpha = calc_blend_func(src.w * src_a_f, dst.w * dst_a_f, params.func_alpha);

    Vec4::from_rgb(rgb, alpha)
}
