//! Mip-Chain Image
//!
//! [`ImageBuffer`] is one resolution level of one texture layer. It holds
//! either a single-sample buffer or a 4x multi-sample buffer, behind an `Arc`
//! so an uploader and the texture can share the same storage.
//! [`MipChain`] is the ordered list of levels for a layer.

use std::sync::Arc;

use log::{error, warn};

use crate::buffer::{Layout, PixelBuffer};
use crate::error::{PipelineError, Result};
use crate::sampler;
use crate::texel::Texel;

/// Samples per texel in multi-sample storage
pub const SOFT_MS_CNT: usize = 4;

#[derive(Debug, Clone)]
pub enum ImageStorage<T: Texel> {
    Single(Arc<PixelBuffer<T>>),
    Multi4(Arc<PixelBuffer<[T; SOFT_MS_CNT]>>),
}

// ============================================================================
// ImageBuffer
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageBuffer<T: Texel> {
    width: usize,
    height: usize,
    storage: ImageStorage<T>,
}

impl<T: Texel> ImageBuffer<T> {
    /// Allocate a zeroed level. `samples` must be 1 or [`SOFT_MS_CNT`].
    pub fn new(width: usize, height: usize, samples: usize, layout: Layout) -> Result<Self> {
        let storage = match samples {
            1 => ImageStorage::Single(Arc::new(PixelBuffer::with_layout(width, height, layout))),
            SOFT_MS_CNT => {
                ImageStorage::Multi4(Arc::new(PixelBuffer::with_layout(width, height, layout)))
            },
            _ => {
                error!("image buffer: unsupported sample count {}", samples);
                return Err(PipelineError::UnsupportedSampleCount(samples));
            },
        };
        Ok(Self {
            width,
            height,
            storage,
        })
    }

    /// Wrap an existing single-sample buffer without copying it
    pub fn from_shared(buffer: Arc<PixelBuffer<T>>) -> Self {
        Self {
            width: buffer.width(),
            height: buffer.height(),
            storage: ImageStorage::Single(buffer),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn storage(&self) -> &ImageStorage<T> {
        &self.storage
    }

    #[inline]
    pub fn is_multi_sample(&self) -> bool {
        matches!(self.storage, ImageStorage::Multi4(_))
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        match self.storage {
            ImageStorage::Single(_) => 1,
            ImageStorage::Multi4(_) => SOFT_MS_CNT,
        }
    }

    pub fn layout(&self) -> Layout {
        match &self.storage {
            ImageStorage::Single(b) => b.layout(),
            ImageStorage::Multi4(b) => b.layout(),
        }
    }

    /// The single-sample buffer, if this level has one
    #[inline]
    pub fn buffer(&self) -> Option<&PixelBuffer<T>> {
        match &self.storage {
            ImageStorage::Single(b) => Some(b),
            ImageStorage::Multi4(_) => None,
        }
    }

    #[inline]
    pub fn shared_buffer(&self) -> Option<&Arc<PixelBuffer<T>>> {
        match &self.storage {
            ImageStorage::Single(b) => Some(b),
            ImageStorage::Multi4(_) => None,
        }
    }

    /// Mutable access to the single-sample buffer. If the storage is still
    /// shared with an uploader it is copied first, so writes never reach a
    /// buffer someone else is reading.
    #[inline]
    pub fn buffer_mut(&mut self) -> Option<&mut PixelBuffer<T>> {
        match &mut self.storage {
            ImageStorage::Single(b) => Some(Arc::make_mut(b)),
            ImageStorage::Multi4(_) => None,
        }
    }

    #[inline]
    pub fn buffer_ms4(&self) -> Option<&PixelBuffer<[T; SOFT_MS_CNT]>> {
        match &self.storage {
            ImageStorage::Multi4(b) => Some(b),
            ImageStorage::Single(_) => None,
        }
    }

    #[inline]
    pub fn buffer_ms4_mut(&mut self) -> Option<&mut PixelBuffer<[T; SOFT_MS_CNT]>> {
        match &mut self.storage {
            ImageStorage::Multi4(b) => Some(Arc::make_mut(b)),
            ImageStorage::Single(_) => None,
        }
    }

    /// Raw bytes of whichever buffer backs this level
    pub fn raw_bytes(&self) -> &[u8] {
        match &self.storage {
            ImageStorage::Single(b) => b.as_bytes(),
            ImageStorage::Multi4(b) => b.as_bytes(),
        }
    }

    pub fn raw_bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            ImageStorage::Single(b) => Arc::make_mut(b).as_bytes_mut(),
            ImageStorage::Multi4(b) => Arc::make_mut(b).as_bytes_mut(),
        }
    }

    /// Every sample stored at (x, y): one for single-sample storage, four
    /// otherwise
    pub fn samples_mut(&mut self, x: usize, y: usize) -> Option<&mut [T]> {
        match &mut self.storage {
            ImageStorage::Single(b) => Arc::make_mut(b).get_mut(x, y).map(std::slice::from_mut),
            ImageStorage::Multi4(b) => Arc::make_mut(b).get_mut(x, y).map(|s| s.as_mut_slice()),
        }
    }

    /// Fill every slot (every sample, for multi-sample storage)
    pub fn fill(&mut self, value: T) {
        match &mut self.storage {
            ImageStorage::Single(b) => Arc::make_mut(b).set_all(value),
            ImageStorage::Multi4(b) => Arc::make_mut(b).set_all([value; SOFT_MS_CNT]),
        }
    }
}

// ============================================================================
// MipChain
// ============================================================================

/// Levels of one texture layer. Level 0 is full resolution, each following
/// level halves both dimensions (never below 1).
#[derive(Debug, Clone)]
pub struct MipChain<T: Texel> {
    levels: Vec<ImageBuffer<T>>,
}

impl<T: Texel> MipChain<T> {
    pub const fn new() -> Self {
        Self { levels: Vec::new() }
    }

    /// A chain holding only `base` as level 0
    pub fn with_base(base: ImageBuffer<T>) -> Self {
        Self { levels: vec![base] }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.levels.first().map_or(0, ImageBuffer::width)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.levels.first().map_or(0, ImageBuffer::height)
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn level(&self, level: usize) -> Option<&ImageBuffer<T>> {
        self.levels.get(level)
    }

    #[inline]
    pub fn level_mut(&mut self, level: usize) -> Option<&mut ImageBuffer<T>> {
        self.levels.get_mut(level)
    }

    #[inline]
    pub fn levels(&self) -> &[ImageBuffer<T>] {
        &self.levels
    }

    #[inline]
    pub fn levels_mut(&mut self) -> &mut [ImageBuffer<T>] {
        &mut self.levels
    }

    /// Replace the whole chain with a single base level
    pub fn set_base(&mut self, base: ImageBuffer<T>) {
        self.levels.clear();
        self.levels.push(base);
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Number of levels a full chain over `width x height` has
    pub fn full_level_count(width: usize, height: usize) -> usize {
        let max = width.max(height);
        if max == 0 {
            return 0;
        }
        max.ilog2() as usize + 1
    }

    /// Allocate the full level chain below level 0. With `sample`, each level
    /// is filled from the one above it by a bilinear sample at each output
    /// texel center, which approximates a 2x2 box filter. Without `sample`
    /// the levels are left zeroed for a rasterizer to render into.
    pub fn generate_mipmap(&mut self, sample: bool) {
        let Some(base) = self.levels.first() else {
            warn!("mip chain: generate_mipmap on an empty chain");
            return;
        };
        let width = base.width();
        let height = base.height();
        let samples = base.sample_count();
        let layout = base.layout();

        self.levels.truncate(1);
        let count = Self::full_level_count(width, height);
        for level in 1..count {
            let w = (width >> level).max(1);
            let h = (height >> level).max(1);
            match ImageBuffer::new(w, h, samples, layout) {
                Ok(img) => self.levels.push(img),
                Err(e) => {
                    error!("mip chain: level {} allocation failed: {}", level, e);
                    return;
                },
            }
        }

        if !sample {
            return;
        }
        if samples != 1 {
            warn!("mip chain: multi-sample levels are allocated but not downsampled");
            return;
        }

        for i in 1..self.levels.len() {
            let (upper, lower) = self.levels.split_at_mut(i);
            let (Some(src), Some(dst)) = (upper[i - 1].buffer(), lower[0].buffer_mut()) else {
                continue;
            };
            sampler::sample_buffer_bilinear(dst, src, T::zero());
        }
    }
}

impl<T: Texel> Default for MipChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
