//! Frame Buffer
//!
//! Color and depth attachments over shared textures. Color attachments must
//! hold RGBA8 texels and depth attachments f32; the element kind is checked
//! when binding, so buffer access never has to downcast.
//!
//! Writes go through a [`RenderPass`], which takes the attachment locks once
//! and keeps them for the whole pass.

use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, error};
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};

use crate::blend::calc_blend_color;
use crate::depth::depth_test;
use crate::error::{PipelineError, Result};
use crate::image::{ImageBuffer, SOFT_MS_CNT};
use crate::math::Vec4;
use crate::states::{ClearStates, RenderStates};
use crate::texel::Rgba8;
use crate::texture::{SharedTexture, TextureElement, TextureFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Color,
    Depth,
}

impl AttachmentKind {
    /// Texture format this kind of attachment accepts
    pub const fn format(self) -> TextureFormat {
        match self {
            Self::Color => TextureFormat::Rgba8,
            Self::Depth => TextureFormat::Float32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub texture: SharedTexture,
    pub layer: usize,
    pub level: usize,
}

impl Attachment {
    fn read<T: TextureElement>(&self) -> Option<MappedRwLockReadGuard<'_, ImageBuffer<T>>> {
        let (layer, level) = (self.layer, self.level);
        RwLockReadGuard::try_map(self.texture.read(), |any| {
            T::from_any(any)
                .and_then(|t| t.image(layer))
                .and_then(|chain| chain.level(level))
        })
        .ok()
    }

    fn write<T: TextureElement>(&self) -> Option<MappedRwLockWriteGuard<'_, ImageBuffer<T>>> {
        let (layer, level) = (self.layer, self.level);
        RwLockWriteGuard::try_map(self.texture.write(), |any| {
            T::from_any_mut(any)
                .and_then(|t| t.image_mut(layer))
                .and_then(|chain| chain.level_mut(level))
        })
        .ok()
    }
}

static NEXT_FRAMEBUFFER_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
pub struct FrameBuffer {
    id: u32,
    offscreen: bool,
    color: Option<Attachment>,
    depth: Option<Attachment>,
}

impl FrameBuffer {
    pub fn new(offscreen: bool) -> Self {
        Self {
            id: NEXT_FRAMEBUFFER_ID.fetch_add(1, Ordering::Relaxed),
            offscreen,
            color: None,
            depth: None,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    fn check_kind(texture: &SharedTexture, kind: AttachmentKind) -> Result<()> {
        let format = texture.read().format();
        if format != kind.format() {
            error!("framebuffer: {:?} attachment cannot bind a {:?} texture", kind, format);
            return Err(PipelineError::AttachmentMismatch { kind, format });
        }
        Ok(())
    }

    /// Bind an RGBA8 texture level as the color target
    pub fn set_color_attachment(&mut self, texture: SharedTexture, layer: usize, level: usize) -> Result<()> {
        Self::check_kind(&texture, AttachmentKind::Color)?;
        debug!("framebuffer {}: color <- texture {} layer {} level {}", self.id, texture.read().id(), layer, level);
        self.color = Some(Attachment {
            texture,
            layer,
            level,
        });
        Ok(())
    }

    /// Bind an f32 texture level as the depth target
    pub fn set_depth_attachment(&mut self, texture: SharedTexture, layer: usize, level: usize) -> Result<()> {
        Self::check_kind(&texture, AttachmentKind::Depth)?;
        debug!("framebuffer {}: depth <- texture {} layer {} level {}", self.id, texture.read().id(), layer, level);
        self.depth = Some(Attachment {
            texture,
            layer,
            level,
        });
        Ok(())
    }

    #[inline]
    pub fn color_attachment(&self) -> Option<&Attachment> {
        self.color.as_ref()
    }

    #[inline]
    pub fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth.as_ref()
    }

    #[inline]
    pub fn is_color_ready(&self) -> bool {
        self.color.is_some()
    }

    #[inline]
    pub fn is_depth_ready(&self) -> bool {
        self.depth.is_some()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_color_ready() || self.is_depth_ready()
    }

    /// The bound color level, or None if no color attachment is bound or the
    /// level is not allocated
    pub fn color_buffer(&self) -> Option<MappedRwLockReadGuard<'_, ImageBuffer<Rgba8>>> {
        self.color.as_ref().and_then(Attachment::read)
    }

    pub fn depth_buffer(&self) -> Option<MappedRwLockReadGuard<'_, ImageBuffer<f32>>> {
        self.depth.as_ref().and_then(Attachment::read)
    }

    pub fn color_buffer_mut(&self) -> Option<MappedRwLockWriteGuard<'_, ImageBuffer<Rgba8>>> {
        self.color.as_ref().and_then(Attachment::write)
    }

    pub fn depth_buffer_mut(&self) -> Option<MappedRwLockWriteGuard<'_, ImageBuffer<f32>>> {
        self.depth.as_ref().and_then(Attachment::write)
    }

    /// Lock both attachments for writing until the pass is dropped
    pub fn begin_pass(&self) -> RenderPass<'_> {
        let depth = self.depth_buffer_mut();
        let color = self.color_buffer_mut();
        RenderPass { color, depth }
    }

    pub fn clear(&self, states: &ClearStates) {
        self.begin_pass().clear(states);
    }

    /// Write a single fragment. Loops should hold one [`RenderPass`] instead.
    pub fn write_fragment(&self, x: usize, y: usize, color: Vec4, depth: f32, states: &RenderStates) -> bool {
        self.begin_pass().write_fragment(x, y, color, depth, states)
    }
}

/// Write access to a frame buffer's attachments for the length of a pass
pub struct RenderPass<'a> {
    color: Option<MappedRwLockWriteGuard<'a, ImageBuffer<Rgba8>>>,
    depth: Option<MappedRwLockWriteGuard<'a, ImageBuffer<f32>>>,
}

impl RenderPass<'_> {
    /// Size of the bound targets (color first, then depth)
    pub fn size(&self) -> (usize, usize) {
        self.color
            .as_deref()
            .map(|c| (c.width(), c.height()))
            .or_else(|| self.depth.as_deref().map(|d| (d.width(), d.height())))
            .unwrap_or((0, 0))
    }

    pub fn clear(&mut self, states: &ClearStates) {
        if states.color_flag {
            if let Some(color) = self.color.as_deref_mut() {
                color.fill(Rgba8::from_vec4(states.clear_color));
            }
        }
        if states.depth_flag {
            if let Some(depth) = self.depth.as_deref_mut() {
                depth.fill(states.clear_depth);
            }
        }
    }

    /// Depth-test, then blend `color` into the color target. Every sample of
    /// a multi-sample target is covered by the fragment and tested on its
    /// own. Returns false, with nothing written, if no sample passed or
    /// (x, y) is outside any bound target.
    pub fn write_fragment(&mut self, x: usize, y: usize, color: Vec4, depth: f32, states: &RenderStates) -> bool {
        let mut depth_samples = None;
        if states.depth_test {
            if let Some(target) = self.depth.as_deref_mut() {
                let Some(samples) = target.samples_mut(x, y) else {
                    return false;
                };
                depth_samples = Some(samples);
            }
        }
        let mut color_samples = None;
        if let Some(target) = self.color.as_deref_mut() {
            let Some(samples) = target.samples_mut(x, y) else {
                return false;
            };
            color_samples = Some(samples);
        }

        let mut coverage = [true; SOFT_MS_CNT];
        if let Some(samples) = depth_samples {
            for (covered, stored) in coverage.iter_mut().zip(samples.iter_mut()) {
                *covered = depth_test(depth, *stored, states.depth_func);
                if *covered && states.depth_mask {
                    *stored = depth;
                }
            }
            if !coverage[..samples.len()].iter().any(|&c| c) {
                return false;
            }
        }

        if let Some(samples) = color_samples {
            for (&covered, dst) in coverage.iter().zip(samples.iter_mut()) {
                if !covered {
                    continue;
                }
                let out = if states.blend {
                    calc_blend_color(color, dst.to_vec4(), &states.blend_params)
                } else {
                    color
                };
                *dst = Rgba8::from_vec4(out);
            }
        }
        true
    }

    /// Stored depth at (x, y), first sample for multi-sample targets
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        let target = self.depth.as_deref()?;
        match target.buffer() {
            Some(b) => b.get(x, y).copied(),
            None => target.buffer_ms4().and_then(|b| b.get(x, y)).map(|s| s[0]),
        }
    }

    /// Stored color at (x, y), first sample for multi-sample targets
    pub fn color_at(&self, x: usize, y: usize) -> Option<Rgba8> {
        let target = self.color.as_deref()?;
        match target.buffer() {
            Some(b) => b.get(x, y).copied(),
            None => target.buffer_ms4().and_then(|b| b.get(x, y)).map(|s| s[0]),
        }
    }
}
