//! Texture Object
//!
//! A [`Texture`] owns one [`MipChain`] per layer (1 for 2D, 6 for cube maps)
//! plus the description it was created from. Image data is either uploaded
//! from caller buffers, which stay shared, or allocated empty for a
//! rasterizer to render into.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use log::{debug, error, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::buffer::{Layout, PixelBuffer};
use crate::error::{PipelineError, Result};
use crate::image::{ImageBuffer, MipChain, SOFT_MS_CNT};
use crate::math::Vec4;
use crate::sampler::Sampler;
use crate::texel::{Rgba8, Texel};

// ============================================================================
// Descriptions
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    #[default]
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl FilterMode {
    /// Reads levels other than 0
    #[inline]
    pub const fn is_mipmap(self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }

    /// Filters bilinearly within a level
    #[inline]
    pub const fn is_linear(self) -> bool {
        matches!(
            self,
            Self::Linear | Self::LinearMipmapNearest | Self::LinearMipmapLinear
        )
    }
}

/// Cube map faces in layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderColor {
    #[default]
    Black,
    White,
}

impl BorderColor {
    /// Normalized RGBA value
    #[inline]
    pub const fn to_vec4(self) -> Vec4 {
        match self {
            Self::Black => Vec4::ZERO,
            Self::White => Vec4::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureType {
    #[default]
    #[serde(rename = "2d")]
    Tex2D,
    #[serde(rename = "cube")]
    Cube,
}

impl TextureType {
    #[inline]
    pub const fn layer_count(self) -> usize {
        match self {
            Self::Tex2D => 1,
            Self::Cube => CubeMapFace::COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Float32,
}

bitflags! {
    /// What a texture may be used for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TextureUsage: u32 {
        const SAMPLER = 1 << 0;
        const UPLOAD_DATA = 1 << 1;
        const ATTACHMENT_COLOR = 1 << 2;
        const ATTACHMENT_DEPTH = 1 << 3;
        const RENDERER_OUTPUT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::SAMPLER
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerDesc {
    pub filter_min: FilterMode,
    pub filter_mag: FilterMode,

    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,

    pub border_color: BorderColor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureDesc {
    pub width: usize,
    pub height: usize,
    #[serde(rename = "type")]
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub use_mipmaps: bool,
    pub multi_sample: bool,
    /// Layout of buffers allocated by `init_image_data`
    pub layout: Layout,
    pub tag: String,
}

// ============================================================================
// Element types
// ============================================================================

/// A texel type a [`Texture`] can be created over. Ties the Rust type to its
/// [`TextureFormat`] and to its slot in [`AnyTexture`].
pub trait TextureElement: Texel {
    const FORMAT: TextureFormat;

    fn from_border(color: BorderColor) -> Self;

    /// Conversion used by image export
    fn to_rgba8(self) -> Rgba8;

    fn into_any(texture: Texture<Self>) -> AnyTexture;
    fn from_any(any: &AnyTexture) -> Option<&Texture<Self>>;
    fn from_any_mut(any: &mut AnyTexture) -> Option<&mut Texture<Self>>;
}

impl TextureElement for Rgba8 {
    const FORMAT: TextureFormat = TextureFormat::Rgba8;

    fn from_border(color: BorderColor) -> Self {
        Rgba8::from_vec4(color.to_vec4())
    }

    #[inline]
    fn to_rgba8(self) -> Rgba8 {
        self
    }

    fn into_any(texture: Texture<Self>) -> AnyTexture {
        AnyTexture::Rgba8(texture)
    }

    fn from_any(any: &AnyTexture) -> Option<&Texture<Self>> {
        match any {
            AnyTexture::Rgba8(t) => Some(t),
            AnyTexture::Float32(_) => None,
        }
    }

    fn from_any_mut(any: &mut AnyTexture) -> Option<&mut Texture<Self>> {
        match any {
            AnyTexture::Rgba8(t) => Some(t),
            AnyTexture::Float32(_) => None,
        }
    }
}

impl TextureElement for f32 {
    const FORMAT: TextureFormat = TextureFormat::Float32;

    fn from_border(color: BorderColor) -> Self {
        color.to_vec4().x.clamp(0.0, 1.0)
    }

    /// Gray replicated to RGB, opaque
    #[inline]
    fn to_rgba8(self) -> Rgba8 {
        let v = (self * 255.0).clamp(0.0, 255.0) as u8;
        Rgba8::new(v, v, v, 255)
    }

    fn into_any(texture: Texture<Self>) -> AnyTexture {
        AnyTexture::Float32(texture)
    }

    fn from_any(any: &AnyTexture) -> Option<&Texture<Self>> {
        match any {
            AnyTexture::Float32(t) => Some(t),
            AnyTexture::Rgba8(_) => None,
        }
    }

    fn from_any_mut(any: &mut AnyTexture) -> Option<&mut Texture<Self>> {
        match any {
            AnyTexture::Float32(t) => Some(t),
            AnyTexture::Rgba8(_) => None,
        }
    }
}

/// A texture of either element type, as held by frame buffer attachments
#[derive(Debug)]
pub enum AnyTexture {
    Rgba8(Texture<Rgba8>),
    Float32(Texture<f32>),
}

impl AnyTexture {
    pub fn format(&self) -> TextureFormat {
        match self {
            Self::Rgba8(_) => TextureFormat::Rgba8,
            Self::Float32(_) => TextureFormat::Float32,
        }
    }

    pub fn desc(&self) -> &TextureDesc {
        match self {
            Self::Rgba8(t) => t.desc(),
            Self::Float32(t) => t.desc(),
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Self::Rgba8(t) => t.id(),
            Self::Float32(t) => t.id(),
        }
    }

    pub fn dump_image(&self, path: impl AsRef<Path>, layer: usize, level: usize) -> Result<()> {
        match self {
            Self::Rgba8(t) => t.dump_image(path, layer, level),
            Self::Float32(t) => t.dump_image(path, layer, level),
        }
    }
}

impl<T: TextureElement> From<Texture<T>> for AnyTexture {
    fn from(texture: Texture<T>) -> Self {
        T::into_any(texture)
    }
}

/// Texture handle shared between owners and frame buffers
pub type SharedTexture = Arc<RwLock<AnyTexture>>;

/// Wrap a texture for sharing
pub fn share<T: TextureElement>(texture: Texture<T>) -> SharedTexture {
    Arc::new(RwLock::new(texture.into()))
}

// ============================================================================
// Texture
// ============================================================================

static NEXT_TEXTURE_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
pub struct Texture<T: TextureElement> {
    id: u32,
    desc: TextureDesc,
    sampler_desc: SamplerDesc,
    layers: Vec<MipChain<T>>,
}

impl<T: TextureElement> Texture<T> {
    /// Create a texture with the shape in `desc`. No image storage exists
    /// until `init_image_data` or `set_image_data`.
    pub fn new(mut desc: TextureDesc) -> Self {
        if desc.format != T::FORMAT {
            warn!(
                "texture '{}': format {:?} does not match element type, using {:?}",
                desc.tag,
                desc.format,
                T::FORMAT
            );
            desc.format = T::FORMAT;
        }
        let layer_count = desc.texture_type.layer_count();
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            desc,
            sampler_desc: SamplerDesc::default(),
            layers: vec![MipChain::new(); layer_count],
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.desc.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.desc.height
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }

    #[inline]
    pub fn usage(&self) -> TextureUsage {
        self.desc.usage
    }

    #[inline]
    pub fn is_multi_sample(&self) -> bool {
        self.desc.multi_sample
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn level_width(&self, level: usize) -> usize {
        self.desc.width.checked_shr(level as u32).unwrap_or(0).max(1)
    }

    #[inline]
    pub fn level_height(&self, level: usize) -> usize {
        self.desc.height.checked_shr(level as u32).unwrap_or(0).max(1)
    }

    #[inline]
    pub fn sampler_desc(&self) -> &SamplerDesc {
        &self.sampler_desc
    }

    pub fn set_sampler_desc(&mut self, desc: SamplerDesc) {
        self.sampler_desc = desc;
    }

    /// Border color of the current sampler description in this element type
    #[inline]
    pub fn border_color(&self) -> T {
        T::from_border(self.sampler_desc.border_color)
    }

    /// A sampler configured from this texture's sampler description
    pub fn make_sampler(&self) -> Sampler<T> {
        Sampler::from_desc(&self.sampler_desc, self.border_color())
    }

    #[inline]
    pub fn image(&self, layer: usize) -> Option<&MipChain<T>> {
        self.layers.get(layer)
    }

    #[inline]
    pub fn image_mut(&mut self, layer: usize) -> Option<&mut MipChain<T>> {
        self.layers.get_mut(layer)
    }

    #[inline]
    pub fn layers(&self) -> &[MipChain<T>] {
        &self.layers
    }

    /// Upload one buffer per layer. Level 0 of each layer shares the caller's
    /// buffer; mipmaps are regenerated when enabled. On error nothing changes.
    pub fn set_image_data(&mut self, buffers: &[Arc<PixelBuffer<T>>]) -> Result<()> {
        if self.desc.multi_sample {
            error!("texture '{}': set_image_data on a multi-sample texture", self.desc.tag);
            return Err(PipelineError::MultiSampleUpload);
        }
        let layer_count = self.layers.len();
        if buffers.len() < layer_count {
            error!(
                "texture '{}': set_image_data needs {} buffers, got {}",
                self.desc.tag,
                layer_count,
                buffers.len()
            );
            return Err(PipelineError::LayerCountMismatch {
                expected: layer_count,
                got: buffers.len(),
            });
        }
        if let Some(bad) = buffers[..layer_count]
            .iter()
            .find(|b| b.width() != self.desc.width || b.height() != self.desc.height)
        {
            error!(
                "texture '{}': set_image_data size mismatch, expected {}x{}, got {}x{}",
                self.desc.tag,
                self.desc.width,
                self.desc.height,
                bad.width(),
                bad.height()
            );
            return Err(PipelineError::SizeMismatch {
                expected_width: self.desc.width,
                expected_height: self.desc.height,
                width: bad.width(),
                height: bad.height(),
            });
        }

        for (layer, buffer) in self.layers.iter_mut().zip(buffers) {
            layer.set_base(ImageBuffer::from_shared(Arc::clone(buffer)));
            if self.desc.use_mipmaps {
                layer.generate_mipmap(true);
            }
        }
        Ok(())
    }

    /// Allocate zeroed level 0 storage for every layer (multi-sample when
    /// the texture is), plus unsampled mip levels when enabled.
    pub fn init_image_data(&mut self) -> Result<()> {
        let samples = if self.desc.multi_sample { SOFT_MS_CNT } else { 1 };
        for layer in &mut self.layers {
            let base = ImageBuffer::new(self.desc.width, self.desc.height, samples, self.desc.layout)?;
            layer.set_base(base);
            if self.desc.use_mipmaps {
                layer.generate_mipmap(false);
            }
        }
        Ok(())
    }

    /// Total bytes `store_to_file` writes
    pub fn raw_data_size(&self) -> usize {
        self.layers
            .iter()
            .flat_map(MipChain::levels)
            .map(|level| level.raw_bytes().len())
            .sum()
    }

    /// True when both textures have the same layer and level structure and
    /// every level holds the same raw bytes
    pub fn raw_eq(&self, other: &Self) -> bool {
        self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.level_count() == b.level_count()
                    && a.levels().iter().zip(b.levels()).all(|(x, y)| x.raw_bytes() == y.raw_bytes())
            })
    }

    /// Write the raw bytes of every level, layer-major then level-major. There
    /// is no header; the reader needs a texture of the same shape.
    pub fn store_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            error!("texture '{}': failed to create {}: {}", self.desc.tag, path.display(), e);
            PipelineError::io(path, e)
        })?;

        let mut writer = BufWriter::new(file);
        for level in self.layers.iter().flat_map(MipChain::levels) {
            writer
                .write_all(level.raw_bytes())
                .map_err(|e| PipelineError::io(path, e))?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;

        debug!(
            "texture '{}': stored {} bytes to {}",
            self.desc.tag,
            self.raw_data_size(),
            path.display()
        );
        Ok(())
    }

    /// Read raw level bytes written by `store_to_file` into the already
    /// allocated levels. A missing file or a short read leaves every level
    /// untouched.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            error!("texture '{}': failed to open {}: {}", self.desc.tag, path.display(), e);
            PipelineError::io(path, e)
        })?;

        let expected = self.raw_data_size();
        if data.len() < expected {
            error!(
                "texture '{}': {} holds {} bytes, need {}",
                self.desc.tag,
                path.display(),
                data.len(),
                expected
            );
            return Err(PipelineError::ShortRead {
                path: path.to_path_buf(),
                expected,
            });
        }
        if data.len() > expected {
            debug!(
                "texture '{}': ignoring {} trailing bytes in {}",
                self.desc.tag,
                data.len() - expected,
                path.display()
            );
        }

        let mut offset = 0;
        for level in self.layers.iter_mut().flat_map(|l| l.levels_mut().iter_mut()) {
            let dst = level.raw_bytes_mut();
            let len = dst.len();
            dst.copy_from_slice(&data[offset..offset + len]);
            offset += len;
        }
        Ok(())
    }

    /// Export one level as an RGBA8 PNG, flipped vertically. Multi-sample
    /// textures cannot be exported.
    pub fn dump_image(&self, path: impl AsRef<Path>, layer: usize, level: usize) -> Result<()> {
        let path = path.as_ref();
        if self.desc.multi_sample {
            error!("texture '{}': dump_image on a multi-sample texture", self.desc.tag);
            return Err(PipelineError::MultiSampleExport);
        }
        let Some(buffer) = self
            .layers
            .get(layer)
            .and_then(|l| l.level(level))
            .and_then(ImageBuffer::buffer)
        else {
            error!("texture '{}': layer {} level {} is not allocated", self.desc.tag, layer, level);
            return Err(PipelineError::MissingLevel { layer, level });
        };

        let width = buffer.width();
        let height = buffer.height();
        let mut pixels = Vec::with_capacity(width * height * 4);
        for y in (0..height).rev() {
            for x in 0..width {
                let px = buffer.get(x, y).copied().unwrap_or_else(T::zero).to_rgba8();
                pixels.extend_from_slice(&[px.r, px.g, px.b, px.a]);
            }
        }

        let file = File::create(path).map_err(|e| {
            error!("texture '{}': failed to create {}: {}", self.desc.tag, path.display(), e);
            PipelineError::io(path, e)
        })?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), width as u32, height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;
        writer.finish()?;

        debug!("texture '{}': wrote {}x{} image to {}", self.desc.tag, width, height, path.display());
        Ok(())
    }
}
