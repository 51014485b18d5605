//! Sampler
//!
//! Filtered texel fetches from a [`MipChain`]. A [`Sampler`] only carries
//! state (wrap, filter, border, LOD callback); the chain is borrowed per call
//! and never owned. [`Sampler2D`] and [`SamplerCube`] bind a borrowed image
//! for the duration of a pass.

use std::fmt;
use std::sync::Arc;

use log::warn;

use crate::buffer::PixelBuffer;
use crate::image::{ImageBuffer, MipChain};
use crate::math::{IVec2, Vec2, Vec3};
use crate::texel::Texel;
use crate::texture::{CubeMapFace, FilterMode, SamplerDesc, WrapMode};

/// Caller-supplied level-of-detail estimate, evaluated once per
/// `texture_2d` / `texture_cube` call.
pub type LodFunc<T> = Arc<dyn Fn(&Sampler<T>) -> f32 + Send + Sync>;

// ============================================================================
// Sampler
// ============================================================================

pub struct Sampler<T: Texel> {
    wrap: WrapMode,
    filter: FilterMode,
    border: T,
    lod_func: Option<LodFunc<T>>,
    width: usize,
    height: usize,
}

impl<T: Texel> Sampler<T> {
    pub fn new() -> Self {
        Self {
            wrap: WrapMode::ClampToEdge,
            filter: FilterMode::Linear,
            border: T::zero(),
            lod_func: None,
            width: 0,
            height: 0,
        }
    }

    /// Configure from a texture's sampler description. A sampler has a single
    /// wrap and filter mode, so `wrap_s` and `filter_min` are used.
    pub fn from_desc(desc: &SamplerDesc, border: T) -> Self {
        Self {
            wrap: desc.wrap_s,
            filter: desc.filter_min,
            border,
            ..Self::new()
        }
    }

    #[inline]
    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap
    }

    #[inline]
    pub fn set_wrap_mode(&mut self, wrap: WrapMode) {
        self.wrap = wrap;
    }

    #[inline]
    pub fn filter_mode(&self) -> FilterMode {
        self.filter
    }

    #[inline]
    pub fn set_filter_mode(&mut self, filter: FilterMode) {
        self.filter = filter;
    }

    #[inline]
    pub fn border_color(&self) -> T {
        self.border
    }

    #[inline]
    pub fn set_border_color(&mut self, border: T) {
        self.border = border;
    }

    pub fn set_lod_func(&mut self, func: Option<LodFunc<T>>) {
        self.lod_func = func;
    }

    /// Level-0 width of the bound image (0 when unbound)
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the filter reads from more than level 0
    #[inline]
    pub fn use_mipmaps(&self) -> bool {
        self.filter.is_mipmap()
    }

    fn bind_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// `bias` plus the registered LOD estimate, when the filter uses mipmaps
    fn effective_lod(&self, bias: f32) -> f32 {
        match &self.lod_func {
            Some(func) if self.use_mipmaps() => bias + func(self),
            _ => bias,
        }
    }

    /// Sample `image` at `uv`. An unbound or empty chain yields the zero
    /// texel.
    pub fn texture_impl(
        &self,
        image: Option<&MipChain<T>>,
        uv: Vec2,
        lod: f32,
        offset: IVec2,
    ) -> T {
        let Some(chain) = image.filter(|c| !c.is_empty()) else {
            return T::zero();
        };
        let max_level = chain.level_count() as i64 - 1;
        let linear = self.filter.is_linear();

        let fetch = |level: i64| -> T {
            let Some(buffer) = chain.level(level as usize).and_then(ImageBuffer::buffer) else {
                return T::zero();
            };
            if linear {
                sample_bilinear(buffer, uv, self.wrap, offset, self.border)
            } else {
                sample_nearest(buffer, uv, self.wrap, offset, self.border)
            }
        };

        match self.filter {
            FilterMode::Nearest | FilterMode::Linear => fetch(0),
            FilterMode::NearestMipmapNearest | FilterMode::LinearMipmapNearest => {
                let level = ((lod + 0.5).ceil() as i64).saturating_sub(1).clamp(0, max_level);
                fetch(level)
            },
            FilterMode::NearestMipmapLinear | FilterMode::LinearMipmapLinear => {
                let level_hi = (lod.floor() as i64).clamp(0, max_level);
                let level_lo = (level_hi + 1).clamp(0, max_level);
                let texel_hi = fetch(level_hi);
                if level_hi == level_lo {
                    return texel_hi;
                }
                let texel_lo = fetch(level_lo);
                T::mix(texel_hi, texel_lo, texel_weight(lod))
            },
        }
    }
}

impl<T: Texel> Default for Sampler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Texel> Clone for Sampler<T> {
    fn clone(&self) -> Self {
        Self {
            wrap: self.wrap,
            filter: self.filter,
            border: self.border,
            lod_func: self.lod_func.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Texel> fmt::Debug for Sampler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("wrap", &self.wrap)
            .field("filter", &self.filter)
            .field("border", &self.border)
            .field("lod_func", &self.lod_func.is_some())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

// ============================================================================
// Texel fetch
// ============================================================================

#[inline]
fn mirror(i: i64, n: i64) -> i64 {
    let m = i.rem_euclid(2 * n);
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

/// Integer texel column/row containing `f`, shifted by `offset`. The cast
/// saturates (NaN becomes 0) and the shift saturates at the i64 range, so
/// every coordinate maps to some texel through the wrap mode.
#[inline]
fn texel_coord(f: f32, offset: i32) -> i64 {
    (f.floor() as i64).saturating_add(offset as i64)
}

/// Fractional position between two texel centers, 0 for non-finite input
#[inline]
fn texel_weight(f: f32) -> f32 {
    let t = f - f.floor();
    if t.is_finite() {
        t
    } else {
        0.0
    }
}

/// Fetch integer texel (x, y) after applying `wrap`
pub fn pixel_with_wrap_mode<T: Texel>(
    buffer: &PixelBuffer<T>,
    x: i64,
    y: i64,
    wrap: WrapMode,
    border: T,
) -> T {
    let w = buffer.width() as i64;
    let h = buffer.height() as i64;
    if w == 0 || h == 0 {
        return T::zero();
    }

    let (x, y) = match wrap {
        WrapMode::Repeat => (x.rem_euclid(w), y.rem_euclid(h)),
        WrapMode::MirroredRepeat => (mirror(x, w), mirror(y, h)),
        WrapMode::ClampToEdge => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        WrapMode::ClampToBorder => {
            if x < 0 || x >= w || y < 0 || y >= h {
                return border;
            }
            (x, y)
        },
    };
    buffer.get(x as usize, y as usize).copied().unwrap_or_else(T::zero)
}

/// Point sample: the texel containing `uv`, shifted by `offset`
pub fn sample_nearest<T: Texel>(
    buffer: &PixelBuffer<T>,
    uv: Vec2,
    wrap: WrapMode,
    offset: IVec2,
    border: T,
) -> T {
    let x = texel_coord(uv.x * buffer.width() as f32, offset.x);
    let y = texel_coord(uv.y * buffer.height() as f32, offset.y);
    pixel_with_wrap_mode(buffer, x, y, wrap, border)
}

/// Bilinear sample over the four texel centers surrounding `uv`
pub fn sample_bilinear<T: Texel>(
    buffer: &PixelBuffer<T>,
    uv: Vec2,
    wrap: WrapMode,
    offset: IVec2,
    border: T,
) -> T {
    let fx = uv.x * buffer.width() as f32 - 0.5;
    let fy = uv.y * buffer.height() as f32 - 0.5;
    let tx = texel_weight(fx);
    let ty = texel_weight(fy);

    let x = texel_coord(fx, offset.x);
    let y = texel_coord(fy, offset.y);
    let x1 = x.saturating_add(1);
    let y1 = y.saturating_add(1);

    let p00 = pixel_with_wrap_mode(buffer, x, y, wrap, border);
    let p10 = pixel_with_wrap_mode(buffer, x1, y, wrap, border);
    let p01 = pixel_with_wrap_mode(buffer, x, y1, wrap, border);
    let p11 = pixel_with_wrap_mode(buffer, x1, y1, wrap, border);

    let top = T::mix(p00, p10, tx);
    let bottom = T::mix(p01, p11, tx);
    T::mix(top, bottom, ty)
}

#[inline]
pub fn sample_pixel_bilinear<T: Texel>(
    buffer: &PixelBuffer<T>,
    uv: Vec2,
    wrap: WrapMode,
    border: T,
) -> T {
    sample_bilinear(buffer, uv, wrap, IVec2::ZERO, border)
}

/// Resample `input` into `output` by sampling `input` at each output texel
/// center with clamp-to-edge.
pub fn sample_buffer_bilinear<T: Texel>(output: &mut PixelBuffer<T>, input: &PixelBuffer<T>, border: T) {
    let w = output.width();
    let h = output.height();
    for y in 0..h {
        let v = (y as f32 + 0.5) / h as f32;
        for x in 0..w {
            let u = (x as f32 + 0.5) / w as f32;
            let texel = sample_pixel_bilinear(input, Vec2::new(u, v), WrapMode::ClampToEdge, border);
            output.set(x, y, texel);
        }
    }
}

// ============================================================================
// 2D and cube samplers
// ============================================================================

/// Sampler bound to a single borrowed mip chain
#[derive(Debug, Clone, Default)]
pub struct Sampler2D<'a, T: Texel> {
    pub sampler: Sampler<T>,
    image: Option<&'a MipChain<T>>,
}

impl<'a, T: Texel> Sampler2D<'a, T> {
    pub fn new(sampler: Sampler<T>) -> Self {
        Self {
            sampler,
            image: None,
        }
    }

    pub fn set_image(&mut self, image: Option<&'a MipChain<T>>) {
        self.image = image;
        let (w, h) = image.map_or((0, 0), |c| (c.width(), c.height()));
        self.sampler.bind_size(w, h);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }

    /// Sample with an explicit LOD
    #[inline]
    pub fn texture_2d_lod(&self, uv: Vec2, lod: f32, offset: IVec2) -> T {
        self.sampler.texture_impl(self.image, uv, lod, offset)
    }

    /// Sample with the registered LOD estimate plus `bias`
    #[inline]
    pub fn texture_2d(&self, uv: Vec2, bias: f32) -> T {
        let lod = self.sampler.effective_lod(bias);
        self.texture_2d_lod(uv, lod, IVec2::ZERO)
    }
}

/// Sampler bound to the six face chains of a cube texture
#[derive(Debug, Clone, Default)]
pub struct SamplerCube<'a, T: Texel> {
    pub sampler: Sampler<T>,
    faces: Option<&'a [MipChain<T>]>,
}

impl<'a, T: Texel> SamplerCube<'a, T> {
    pub fn new(sampler: Sampler<T>) -> Self {
        Self {
            sampler,
            faces: None,
        }
    }

    /// Bind six face chains in +X, -X, +Y, -Y, +Z, -Z order. Any other count
    /// leaves the sampler unbound.
    pub fn set_image(&mut self, faces: Option<&'a [MipChain<T>]>) {
        self.faces = match faces {
            Some(f) if f.len() != CubeMapFace::COUNT => {
                warn!("cube sampler: expected {} faces, got {}", CubeMapFace::COUNT, f.len());
                None
            },
            other => other,
        };
        let (w, h) = self
            .faces
            .and_then(<[MipChain<T>]>::first)
            .map_or((0, 0), |c| (c.width(), c.height()));
        self.sampler.bind_size(w, h);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_none()
    }

    pub fn texture_cube_lod(&self, dir: Vec3, lod: f32) -> T {
        let Some(faces) = self.faces else {
            return T::zero();
        };
        let (face, uv) = convert_xyz_to_uv(dir);
        self.sampler.texture_impl(faces.get(face.index()), uv, lod, IVec2::ZERO)
    }

    pub fn texture_cube(&self, dir: Vec3, bias: f32) -> T {
        let lod = self.sampler.effective_lod(bias);
        self.texture_cube_lod(dir, lod)
    }
}

/// Map a direction to the cube face it hits and the [0, 1] coordinates on
/// that face. The largest-magnitude axis wins; ties go to x, then y. A zero
/// vector maps to the center of +X.
pub fn convert_xyz_to_uv(dir: Vec3) -> (CubeMapFace, Vec2) {
    let Vec3 { x, y, z } = dir;
    let (ax, ay, az) = (x.abs(), y.abs(), z.abs());

    let (face, ma, sc, tc) = if ax >= ay && ax >= az {
        if x >= 0.0 {
            (CubeMapFace::PositiveX, ax, -z, -y)
        } else {
            (CubeMapFace::NegativeX, ax, z, -y)
        }
    } else if ay >= az {
        if y >= 0.0 {
            (CubeMapFace::PositiveY, ay, x, z)
        } else {
            (CubeMapFace::NegativeY, ay, x, -z)
        }
    } else if z >= 0.0 {
        (CubeMapFace::PositiveZ, az, x, -y)
    } else {
        (CubeMapFace::NegativeZ, az, -x, -y)
    };

    if ma == 0.0 {
        return (face, Vec2::new(0.5, 0.5));
    }
    let u = (sc / ma + 1.0) * 0.5;
    let v = (tc / ma + 1.0) * 0.5;
    (face, Vec2::new(u, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    use crate::math::Vec4;

    const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
    const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
    const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);
    const YELLOW: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);

    fn buffer_from(width: usize, height: usize, data: &[Vec4]) -> PixelBuffer<Vec4> {
        let mut buffer = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                buffer.set(x, y, data[y * width + x]);
            }
        }
        buffer
    }

    fn chain_2x2() -> MipChain<Vec4> {
        let buffer = buffer_from(2, 2, &[RED, GREEN, BLUE, YELLOW]);
        MipChain::with_base(ImageBuffer::from_shared(Arc::new(buffer)))
    }

    fn sampler(filter: FilterMode, wrap: WrapMode) -> Sampler<Vec4> {
        let mut s = Sampler::new();
        s.set_filter_mode(filter);
        s.set_wrap_mode(wrap);
        s
    }

    fn sampler_f32(filter: FilterMode, wrap: WrapMode) -> Sampler<f32> {
        let mut s = Sampler::new();
        s.set_filter_mode(filter);
        s.set_wrap_mode(wrap);
        s
    }

    #[test]
    fn test_nearest_picks_containing_texel() {
        let chain = chain_2x2();
        let s = sampler(FilterMode::Nearest, WrapMode::ClampToEdge);
        let at = |u, v| s.texture_impl(Some(&chain), Vec2::new(u, v), 0.0, IVec2::ZERO);
        assert_eq!(at(0.25, 0.25), RED);
        assert_eq!(at(0.75, 0.25), GREEN);
        assert_eq!(at(0.25, 0.75), BLUE);
        assert_eq!(at(0.75, 0.75), YELLOW);
    }

    #[test]
    fn test_bilinear_center_is_average() {
        let chain = chain_2x2();
        let s = sampler(FilterMode::Linear, WrapMode::ClampToEdge);
        let out = s.texture_impl(Some(&chain), Vec2::new(0.5, 0.5), 0.0, IVec2::ZERO);
        assert!(out.approx_eq(&Vec4::new(0.5, 0.5, 0.25, 1.0), 1e-3));
    }

    #[test]
    fn test_bilinear_texel_center_is_exact() {
        let chain = chain_2x2();
        let s = sampler(FilterMode::Linear, WrapMode::ClampToEdge);
        let out = s.texture_impl(Some(&chain), Vec2::new(0.75, 0.25), 0.0, IVec2::ZERO);
        assert!(out.approx_eq(&GREEN, 1e-6));
    }

    #[test]
    fn test_clamp_to_edge_outside() {
        let chain = chain_2x2();
        for filter in [FilterMode::Nearest, FilterMode::Linear] {
            let s = sampler(filter, WrapMode::ClampToEdge);
            let out = s.texture_impl(Some(&chain), Vec2::new(-0.5, -0.5), 0.0, IVec2::ZERO);
            assert_eq!(out, RED, "{:?}", filter);
            let out = s.texture_impl(Some(&chain), Vec2::new(1.5, 1.5), 0.0, IVec2::ZERO);
            assert_eq!(out, YELLOW, "{:?}", filter);
        }
    }

    #[test]
    fn test_clamp_to_border_outside() {
        let chain = chain_2x2();
        let mut s = sampler(FilterMode::Nearest, WrapMode::ClampToBorder);
        s.set_border_color(Vec4::new(0.2, 0.3, 0.4, 0.5));
        let out = s.texture_impl(Some(&chain), Vec2::new(-0.5, 0.25), 0.0, IVec2::ZERO);
        assert_eq!(out, Vec4::new(0.2, 0.3, 0.4, 0.5));
        let inside = s.texture_impl(Some(&chain), Vec2::new(0.25, 0.25), 0.0, IVec2::ZERO);
        assert_eq!(inside, RED);
    }

    #[test]
    fn test_repeat_integer_shift() {
        let chain = chain_2x2();
        let s = sampler(FilterMode::Nearest, WrapMode::Repeat);
        for (u, v) in [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.6, 0.9)] {
            let base = s.texture_impl(Some(&chain), Vec2::new(u, v), 0.0, IVec2::ZERO);
            for k in [-2.0, -1.0, 1.0, 3.0] {
                let shifted = s.texture_impl(Some(&chain), Vec2::new(u + k, v + k), 0.0, IVec2::ZERO);
                assert_eq!(shifted, base, "uv ({}, {}) shifted by {}", u, v, k);
            }
        }
    }

    #[test]
    fn test_repeat_non_power_of_two() {
        let data: Vec<Vec4> = (0..3).map(|i| Vec4::splat(i as f32)).collect();
        let buffer = buffer_from(3, 1, &data);
        assert_eq!(pixel_with_wrap_mode(&buffer, 4, 0, WrapMode::Repeat, Vec4::ZERO), data[1]);
        assert_eq!(pixel_with_wrap_mode(&buffer, -1, 0, WrapMode::Repeat, Vec4::ZERO), data[2]);
    }

    #[test]
    fn test_mirrored_repeat() {
        let data: Vec<Vec4> = (0..4).map(|i| Vec4::splat(i as f32)).collect();
        let buffer = buffer_from(4, 1, &data);
        let at = |x| pixel_with_wrap_mode(&buffer, x, 0, WrapMode::MirroredRepeat, Vec4::ZERO).x;
        let got: Vec<f32> = (-4..12).map(at).collect();
        assert_eq!(
            got,
            vec![3.0, 2.0, 1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 0.0, 0.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_offset_moves_one_texel() {
        let chain = chain_2x2();
        let s = sampler(FilterMode::Nearest, WrapMode::Repeat);
        let out = s.texture_impl(Some(&chain), Vec2::new(0.25, 0.25), 0.0, IVec2::new(1, 0));
        assert_eq!(out, GREEN);
        let out = s.texture_impl(Some(&chain), Vec2::new(0.25, 0.25), 0.0, IVec2::new(1, 1));
        assert_eq!(out, YELLOW);
    }

    #[test]
    fn test_unbound_returns_zero() {
        let s = sampler(FilterMode::LinearMipmapLinear, WrapMode::Repeat);
        assert_eq!(s.texture_impl(None, Vec2::new(0.5, 0.5), 0.0, IVec2::ZERO), Vec4::ZERO);

        let empty = MipChain::new();
        assert_eq!(s.texture_impl(Some(&empty), Vec2::new(0.5, 0.5), 0.0, IVec2::ZERO), Vec4::ZERO);

        let unbound = Sampler2D::<Vec4>::default();
        assert!(unbound.is_empty());
        assert_eq!(unbound.texture_2d(Vec2::new(0.5, 0.5), 0.0), Vec4::ZERO);
    }

    fn mip_chain_levels() -> MipChain<f32> {
        // Three levels holding 0, 10 and 20 so the selected level is observable
        let mut chain = MipChain::with_base(ImageBuffer::from_shared(Arc::new(PixelBuffer::new(4, 4))));
        chain.generate_mipmap(false);
        for (i, level) in chain.levels_mut().iter_mut().enumerate() {
            level.fill(i as f32 * 10.0);
        }
        chain
    }

    #[test]
    fn test_mipmap_nearest_level_selection() {
        let chain = mip_chain_levels();
        let s = {
            let mut s = Sampler::<f32>::new();
            s.set_filter_mode(FilterMode::NearestMipmapNearest);
            s
        };
        let at = |lod| s.texture_impl(Some(&chain), Vec2::new(0.5, 0.5), lod, IVec2::ZERO);
        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(0.4), 0.0);
        assert_eq!(at(0.6), 10.0);
        assert_eq!(at(1.4), 10.0);
        assert_eq!(at(1.6), 20.0);
        assert_eq!(at(9.0), 20.0);
        assert_eq!(at(-3.0), 0.0);
    }

    #[test]
    fn test_trilinear_blends_levels() {
        let chain = mip_chain_levels();
        let mut s = Sampler::<f32>::new();
        s.set_filter_mode(FilterMode::LinearMipmapLinear);
        let at = |lod| s.texture_impl(Some(&chain), Vec2::new(0.5, 0.5), lod, IVec2::ZERO);
        assert!((at(0.0) - 0.0).abs() < 1e-5);
        assert!((at(0.25) - 2.5).abs() < 1e-5);
        assert!((at(1.5) - 15.0).abs() < 1e-5);
        // Last level: no second sample
        assert!((at(2.0) - 20.0).abs() < 1e-5);
        assert!((at(7.5) - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_non_mipmap_filters_ignore_lod() {
        let chain = mip_chain_levels();
        let mut s = Sampler::<f32>::new();
        for filter in [FilterMode::Nearest, FilterMode::Linear] {
            s.set_filter_mode(filter);
            assert_eq!(s.texture_impl(Some(&chain), Vec2::new(0.5, 0.5), 2.0, IVec2::ZERO), 0.0);
        }
    }

    #[test]
    fn test_lod_func_applies_only_with_mipmaps() {
        let chain = mip_chain_levels();
        let mut s = Sampler::<f32>::new();
        s.set_lod_func(Some(Arc::new(|sampler: &Sampler<f32>| {
            // A 4-wide image reports lod 1 here
            (sampler.width() as f32).log2() - 1.0
        })));

        s.set_filter_mode(FilterMode::NearestMipmapNearest);
        let mut s2d = Sampler2D::new(s.clone());
        s2d.set_image(Some(&chain));
        assert_eq!(s2d.sampler.width(), 4);
        assert_eq!(s2d.texture_2d(Vec2::new(0.5, 0.5), 0.0), 10.0);
        assert_eq!(s2d.texture_2d(Vec2::new(0.5, 0.5), 1.0), 20.0);

        s2d.sampler.set_filter_mode(FilterMode::Nearest);
        assert_eq!(s2d.texture_2d(Vec2::new(0.5, 0.5), 1.0), 0.0);
    }

    /// Levels hold ramps rather than flat values, so a nearest and a
    /// bilinear fetch from the same level disagree.
    fn mip_chain_ramps() -> MipChain<f32> {
        let mut base = PixelBuffer::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                base.set(x, y, 100.0 + 10.0 * x as f32);
            }
        }
        let mut chain = MipChain::with_base(ImageBuffer::from_shared(Arc::new(base)));
        chain.generate_mipmap(false);
        if let Some(level) = chain.level_mut(1).and_then(ImageBuffer::buffer_mut) {
            for (i, v) in [0.0, 10.0, 20.0, 30.0].into_iter().enumerate() {
                level.set(i % 2, i / 2, v);
            }
        }
        if let Some(level) = chain.level_mut(2) {
            level.fill(1000.0);
        }
        chain
    }

    #[test]
    fn test_mipmap_nearest_families_use_their_level_filter() {
        let chain = mip_chain_ramps();
        let uv = Vec2::new(0.5, 0.25);
        let at = |filter, lod| {
            let mut s = Sampler::<f32>::new();
            s.set_filter_mode(filter);
            s.texture_impl(Some(&chain), uv, lod, IVec2::ZERO)
        };

        // Level 0: nearest reads x = 2, bilinear halves x = 1 and x = 2
        assert!((at(FilterMode::NearestMipmapNearest, 0.4) - 120.0).abs() < 1e-4);
        assert!((at(FilterMode::LinearMipmapNearest, 0.4) - 115.0).abs() < 1e-4);
        // Level 1: nearest reads x = 1, bilinear halves x = 0 and x = 1
        assert!((at(FilterMode::NearestMipmapNearest, 1.0) - 10.0).abs() < 1e-4);
        assert!((at(FilterMode::LinearMipmapNearest, 1.0) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_mipmap_linear_families_use_their_level_filter() {
        let chain = mip_chain_ramps();
        let uv = Vec2::new(0.5, 0.25);
        let at = |filter, lod| {
            let mut s = Sampler::<f32>::new();
            s.set_filter_mode(filter);
            s.texture_impl(Some(&chain), uv, lod, IVec2::ZERO)
        };

        // Halfway between level 0 and level 1
        assert!((at(FilterMode::NearestMipmapLinear, 0.5) - 65.0).abs() < 1e-4);
        assert!((at(FilterMode::LinearMipmapLinear, 0.5) - 60.0).abs() < 1e-4);
        // Quarter of the way from level 1 to level 2
        assert!((at(FilterMode::NearestMipmapLinear, 1.25) - 257.5).abs() < 1e-3);
        assert!((at(FilterMode::LinearMipmapLinear, 1.25) - 253.75).abs() < 1e-3);
    }

    #[test]
    fn test_extreme_uv_stays_in_texture() {
        let chain = mip_chain_ramps();
        let coords = [f32::INFINITY, f32::NEG_INFINITY, 1.0e19, -1.0e19, f32::NAN];
        let offsets = [IVec2::ZERO, IVec2::new(1, 1), IVec2::new(-1, -1), IVec2::new(i32::MAX, i32::MIN)];
        let wraps = [
            WrapMode::Repeat,
            WrapMode::MirroredRepeat,
            WrapMode::ClampToEdge,
            WrapMode::ClampToBorder,
        ];

        for wrap in wraps {
            for filter in [FilterMode::Nearest, FilterMode::Linear] {
                let mut s = sampler_f32(filter, wrap);
                s.set_border_color(-1.0);
                for &c in &coords {
                    for &offset in &offsets {
                        for uv in [Vec2::new(c, 0.5), Vec2::new(0.5, c), Vec2::new(c, c)] {
                            let out = s.texture_impl(Some(&chain), uv, 0.0, offset);
                            assert!(
                                out == -1.0 || (99.99..=130.01).contains(&out),
                                "{:?} {:?} uv {:?} offset {:?} -> {}",
                                wrap,
                                filter,
                                uv,
                                offset,
                                out
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_extreme_uv_clamp_to_edge_values() {
        let chain = mip_chain_ramps();
        let s = sampler_f32(FilterMode::Nearest, WrapMode::ClampToEdge);
        let at = |u: f32, offset| s.texture_impl(Some(&chain), Vec2::new(u, 0.5), 0.0, offset);
        assert_eq!(at(f32::INFINITY, IVec2::ZERO), 130.0);
        assert_eq!(at(1.0e19, IVec2::new(1, 0)), 130.0);
        assert_eq!(at(f32::NEG_INFINITY, IVec2::new(-1, 0)), 100.0);
        // NaN lands on column 0
        assert_eq!(at(f32::NAN, IVec2::ZERO), 100.0);

        let s = sampler_f32(FilterMode::Linear, WrapMode::ClampToEdge);
        let out = s.texture_impl(Some(&chain), Vec2::new(1.0e19, 0.5), 0.0, IVec2::ZERO);
        assert_eq!(out, 130.0);
    }

    #[test]
    fn test_non_finite_lod_is_total() {
        let chain = mip_chain_ramps();
        for filter in [
            FilterMode::NearestMipmapNearest,
            FilterMode::LinearMipmapNearest,
            FilterMode::NearestMipmapLinear,
            FilterMode::LinearMipmapLinear,
        ] {
            let mut s = Sampler::<f32>::new();
            s.set_filter_mode(filter);
            for lod in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
                let out = s.texture_impl(Some(&chain), Vec2::new(0.5, 0.5), lod, IVec2::ZERO);
                assert!(out.is_finite(), "{:?} lod {} -> {}", filter, lod, out);
            }
        }
    }

    #[test]
    fn test_from_desc() {
        let desc = SamplerDesc {
            filter_min: FilterMode::LinearMipmapNearest,
            wrap_s: WrapMode::MirroredRepeat,
            ..SamplerDesc::default()
        };
        let s = Sampler::from_desc(&desc, 1.0f32);
        assert_eq!(s.filter_mode(), FilterMode::LinearMipmapNearest);
        assert_eq!(s.wrap_mode(), WrapMode::MirroredRepeat);
        assert_eq!(s.border_color(), 1.0);
        assert!(s.use_mipmaps());
    }

    #[test]
    fn test_sample_buffer_bilinear_halves() {
        let input = buffer_from(2, 2, &[RED, GREEN, BLUE, YELLOW]);
        let mut output = PixelBuffer::new(1, 1);
        sample_buffer_bilinear(&mut output, &input, Vec4::ZERO);
        assert!(output.get(0, 0).unwrap().approx_eq(&Vec4::new(0.5, 0.5, 0.25, 1.0), 1e-6));
    }

    #[test]
    fn test_cube_face_selection() {
        assert_eq!(convert_xyz_to_uv(Vec3::new(1.0, 0.0, 0.0)).0.index(), 0);
        assert_eq!(convert_xyz_to_uv(Vec3::new(-1.0, 0.0, 0.0)).0.index(), 1);
        assert_eq!(convert_xyz_to_uv(Vec3::new(0.0, 1.0, 0.0)).0.index(), 2);
        assert_eq!(convert_xyz_to_uv(Vec3::new(0.0, -1.0, 0.0)).0.index(), 3);
        assert_eq!(convert_xyz_to_uv(Vec3::new(0.0, 0.0, 1.0)).0.index(), 4);
        assert_eq!(convert_xyz_to_uv(Vec3::new(0.0, 0.0, -1.0)).0.index(), 5);
    }

    #[test]
    fn test_cube_uv_in_range() {
        let dirs = [
            Vec3::new(1.0, 0.3, -0.7),
            Vec3::new(-0.2, 0.9, 0.5),
            Vec3::new(0.1, -0.1, -2.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        for dir in dirs {
            let (_, uv) = convert_xyz_to_uv(dir);
            assert!((0.0..=1.0).contains(&uv.x), "{:?} -> {:?}", dir, uv);
            assert!((0.0..=1.0).contains(&uv.y), "{:?} -> {:?}", dir, uv);
        }
    }

    #[test]
    fn test_cube_positive_x_basis() {
        let (face, uv) = convert_xyz_to_uv(Vec3::new(1.0, -0.5, 0.5));
        assert_eq!(face, CubeMapFace::PositiveX);
        // u = (-z/|x| + 1)/2, v = (-y/|x| + 1)/2
        assert!(uv.approx_eq(&Vec2::new(0.25, 0.75), 1e-6));
    }

    #[test]
    fn test_sampler_cube_reads_selected_face() {
        let faces: Vec<MipChain<f32>> = (0..6)
            .map(|i| {
                let mut buffer = PixelBuffer::new(2, 2);
                buffer.set_all(i as f32);
                MipChain::with_base(ImageBuffer::from_shared(Arc::new(buffer)))
            })
            .collect();

        let mut cube = SamplerCube::new(Sampler::new());
        cube.set_image(Some(faces.as_slice()));
        assert_eq!(cube.sampler.width(), 2);
        assert_eq!(cube.texture_cube(Vec3::new(0.0, -3.0, 0.1), 0.0), 3.0);
        assert_eq!(cube.texture_cube(Vec3::new(0.0, 0.0, -1.0), 0.0), 5.0);

        cube.set_image(Some(&faces[..4]));
        assert!(cube.is_empty());
        assert_eq!(cube.texture_cube(Vec3::new(1.0, 0.0, 0.0), 0.0), 0.0);
    }
}
