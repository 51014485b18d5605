//! Pixel Buffer
//!
//! A 2D grid of `T` on top of an [`AlignedBlock`], addressed through one of
//! three layouts. The layout only changes the index function; bounds are
//! always checked against the logical (caller-visible) size, so padding slots
//! introduced by the tiled layouts can never be reached through `get`/`set`.

use bytemuck::Pod;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::aligned::AlignedBlock;

// ============================================================================
// Layout
// ============================================================================

/// Memory layout of a pixel buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Row-major, `x + y * inner_width`
    #[default]
    Linear,
    /// 4x4 tiles, row-major inside each tile
    Tiled,
    /// 32x32 tiles, Z-order inside each tile
    Morton,
}

impl Layout {
    /// log2 of the block edge (0 for linear)
    #[inline]
    pub const fn block_bits(self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::Tiled => 2,
            Self::Morton => 5,
        }
    }

    #[inline]
    pub const fn block_size(self) -> usize {
        1 << self.block_bits()
    }

    /// Parse a layout name as used on the command line
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "tiled" => Some(Self::Tiled),
            "morton" => Some(Self::Morton),
            _ => None,
        }
    }
}

/// Interleave the bits of two in-block coordinates into a 16-bit Z-order
/// index. Only the low 5 bits of each input are meaningful for the 32x32
/// Morton block.
#[inline]
pub fn encode16_morton2(x: u8, y: u8) -> u16 {
    debug_assert!(x < 32 && y < 32, "morton input out of block: ({}, {})", x, y);
    let mut res = x as u32 | ((y as u32) << 16);
    res = (res | (res << 4)) & 0x0f0f_0f0f;
    res = (res | (res << 2)) & 0x3333_3333;
    res = (res | (res << 1)) & 0x5555_5555;
    (res | (res >> 15)) as u16
}

// ============================================================================
// PixelBuffer
// ============================================================================

#[derive(Debug, Clone)]
pub struct PixelBuffer<T: Pod> {
    width: usize,
    height: usize,
    inner_width: usize,
    inner_height: usize,
    tile_cols: usize,
    layout: Layout,
    data: Option<AlignedBlock<T>>,
}

impl<T: Pod> PixelBuffer<T> {
    /// An empty buffer with no storage
    pub const fn empty(layout: Layout) -> Self {
        Self {
            width: 0,
            height: 0,
            inner_width: 0,
            inner_height: 0,
            tile_cols: 0,
            layout,
            data: None,
        }
    }

    /// Create a linear buffer of `width x height` zeroed texels
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_layout(width, height, Layout::Linear)
    }

    /// Create a buffer with an explicit layout
    pub fn with_layout(width: usize, height: usize, layout: Layout) -> Self {
        let mut buffer = Self::empty(layout);
        buffer.create(width, height);
        buffer
    }

    /// Allocate storage for `width x height`. Calling again with the same size
    /// is a no-op; a new size drops the old contents and starts zeroed.
    pub fn create(&mut self, width: usize, height: usize) {
        if width == 0 || height == 0 {
            warn!("pixel buffer: ignoring create({}, {})", width, height);
            return;
        }
        if self.data.is_some() && self.width == width && self.height == height {
            return;
        }

        let block = self.layout.block_size();
        let tile_cols = width.div_ceil(block);
        let tile_rows = height.div_ceil(block);
        let Some((inner_width, inner_height, len)) = tile_cols.checked_mul(block).and_then(|iw| {
            let ih = tile_rows.checked_mul(block)?;
            Some((iw, ih, iw.checked_mul(ih)?))
        }) else {
            error!("pixel buffer: create({}, {}) overflows the address space", width, height);
            self.destroy();
            return;
        };

        match AlignedBlock::new(len) {
            Ok(data) => {
                self.width = width;
                self.height = height;
                self.inner_width = inner_width;
                self.inner_height = inner_height;
                self.tile_cols = tile_cols;
                self.data = Some(data);
            },
            Err(e) => {
                error!("pixel buffer: create({}, {}) failed: {}", width, height, e);
                self.destroy();
            },
        }
    }

    /// Release storage and reset to 0x0
    pub fn destroy(&mut self) {
        self.data = None;
        self.width = 0;
        self.height = 0;
        self.inner_width = 0;
        self.inner_height = 0;
        self.tile_cols = 0;
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
    pub fn inner_width(&self) -> usize {
        self.inner_width
    }

    #[inline]
    pub fn inner_height(&self) -> usize {
        self.inner_height
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// Number of stored elements, padding included
    #[inline]
    pub fn raw_len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }

    #[inline]
    pub fn raw_bytes_len(&self) -> usize {
        self.raw_len() * std::mem::size_of::<T>()
    }

    #[inline]
    fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Storage index of (x, y). Only meaningful inside the inner grid.
    #[inline]
    pub fn convert_index(&self, x: usize, y: usize) -> usize {
        match self.layout {
            Layout::Linear => x + y * self.inner_width,
            Layout::Tiled => {
                let tile = (y >> 2) * self.tile_cols + (x >> 2);
                (tile << 4) + ((y & 3) << 2) + (x & 3)
            },
            Layout::Morton => {
                let tile = (y >> 5) * self.tile_cols + (x >> 5);
                let morton = encode16_morton2((x & 31) as u8, (y & 31) as u8);
                (tile << 10) + morton as usize
            },
        }
    }

    /// Read a texel. Returns None if out of bounds or unallocated.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let idx = self.convert_index(x, y);
        self.data.as_ref().and_then(|d| d.get(idx))
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let idx = self.convert_index(x, y);
        self.data.as_mut().and_then(|d| d.get_mut(idx))
    }

    /// Write a texel. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        if let Some(slot) = self.get_mut(x, y) {
            *slot = value;
        }
    }

    /// Raw storage in layout order, padding included
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(self.as_mut_slice())
    }

    /// Copy raw storage into `out`. With `flip_y`, output row `i` is source
    /// row `inner_height - 1 - i`. `out` must hold at least `raw_len()`
    /// elements; a shorter slice is left untouched.
    pub fn copy_raw_data_to(&self, out: &mut [T], flip_y: bool) {
        let src = self.as_slice();
        if src.is_empty() {
            return;
        }
        if out.len() < src.len() {
            error!(
                "pixel buffer: copy target holds {} elements, need {}",
                out.len(),
                src.len()
            );
            return;
        }

        if !flip_y {
            out[..src.len()].copy_from_slice(src);
            return;
        }

        let row = self.inner_width;
        for (i, dst_row) in out[..src.len()].chunks_exact_mut(row).enumerate() {
            let src_start = (self.inner_height - 1 - i) * row;
            dst_row.copy_from_slice(&src[src_start..src_start + row]);
        }
    }

    /// Zero every slot
    pub fn clear(&mut self) {
        self.as_mut_slice().fill(T::zeroed());
    }

    /// Fill every slot, padding included
    pub fn set_all(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }
}

impl<T: Pod> Default for PixelBuffer<T> {
    fn default() -> Self {
        Self::empty(Layout::Linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_log::test;

    use crate::texel::Rgba8;

    const LAYOUTS: [Layout; 3] = [Layout::Linear, Layout::Tiled, Layout::Morton];

    #[test]
    fn test_create_and_destroy() {
        let mut buffer = PixelBuffer::<Rgba8>::new(100, 100);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.width(), 100);
        assert_eq!(buffer.height(), 100);
        assert_eq!(buffer.raw_len(), 100 * 100);
        assert_eq!(buffer.raw_bytes_len(), 100 * 100 * 4);

        buffer.destroy();
        assert!(buffer.is_empty());
        assert_eq!(buffer.width(), 0);
        assert_eq!(buffer.height(), 0);
        assert!(buffer.get(0, 0).is_none());
    }

    #[test]
    fn test_create_same_size_keeps_contents() {
        let mut buffer = PixelBuffer::<u32>::new(8, 8);
        buffer.set(2, 3, 42);
        let ptr = buffer.as_slice().as_ptr();
        buffer.create(8, 8);
        assert_eq!(buffer.as_slice().as_ptr(), ptr);
        assert_eq!(buffer.get(2, 3), Some(&42));
    }

    #[test]
    fn test_create_new_size_reinitializes() {
        let mut buffer = PixelBuffer::<u32>::new(8, 8);
        buffer.set(2, 3, 42);
        buffer.create(16, 4);
        assert_eq!(buffer.width(), 16);
        assert_eq!(buffer.height(), 4);
        assert_eq!(buffer.get(2, 3), Some(&0));
        assert!(buffer.get(2, 4).is_none());
    }

    #[test]
    fn test_create_zero_size_is_ignored() {
        let buffer = PixelBuffer::<u32>::new(0, 5);
        assert!(buffer.is_empty());
        assert!(buffer.get(0, 0).is_none());
    }

    #[test]
    fn test_create_oversized_is_noop() {
        for layout in LAYOUTS {
            let mut buffer = PixelBuffer::<u8>::with_layout(1 << 33, 1 << 33, layout);
            assert!(buffer.is_empty(), "{:?}", layout);
            assert_eq!((buffer.width(), buffer.height()), (0, 0));

            buffer.create(usize::MAX, 2);
            assert!(buffer.is_empty(), "{:?}", layout);
            buffer.set(0, 0, 1);
            assert!(buffer.get(0, 0).is_none());
        }

        // An oversized request releases storage it held before
        let mut buffer = PixelBuffer::<u32>::new(4, 4);
        buffer.create(usize::MAX, usize::MAX);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_set_get_roundtrip_all_layouts() {
        for layout in LAYOUTS {
            let mut buffer = PixelBuffer::<u32>::with_layout(37, 19, layout);
            for y in 0..19 {
                for x in 0..37 {
                    buffer.set(x, y, (y * 1000 + x) as u32);
                }
            }
            for y in 0..19 {
                for x in 0..37 {
                    assert_eq!(buffer.get(x, y), Some(&((y * 1000 + x) as u32)), "{:?}", layout);
                }
            }
        }
    }

    #[test]
    fn test_out_of_bounds_access() {
        for layout in LAYOUTS {
            let mut buffer = PixelBuffer::<u32>::with_layout(10, 10, layout);
            assert!(buffer.get(10, 5).is_none());
            assert!(buffer.get(5, 10).is_none());
            assert!(buffer.get(15, 15).is_none());

            // Writes into padding coordinates must not land anywhere
            buffer.set(10, 0, 7);
            buffer.set(0, 12, 7);
            assert!(buffer.as_slice().iter().all(|&v| v == 0), "{:?}", layout);
        }
    }

    #[test]
    fn test_convert_index_is_bijection() {
        for layout in LAYOUTS {
            for (w, h) in [(1, 1), (5, 3), (33, 70), (64, 64)] {
                let buffer = PixelBuffer::<u8>::with_layout(w, h, layout);
                let total = buffer.inner_width() * buffer.inner_height();
                assert_eq!(buffer.raw_len(), total);

                let mut seen = HashSet::with_capacity(total);
                for y in 0..buffer.inner_height() {
                    for x in 0..buffer.inner_width() {
                        let idx = buffer.convert_index(x, y);
                        assert!(idx < total, "{:?} {}x{} ({}, {})", layout, w, h, x, y);
                        assert!(seen.insert(idx), "{:?} duplicate index {}", layout, idx);
                    }
                }
                assert_eq!(seen.len(), total);
            }
        }
    }

    #[test]
    fn test_linear_index() {
        let buffer = PixelBuffer::<u8>::with_layout(8, 8, Layout::Linear);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(buffer.convert_index(x, y), x + y * 8);
            }
        }
    }

    #[test]
    fn test_tiled_index() {
        let buffer = PixelBuffer::<u8>::with_layout(8, 8, Layout::Tiled);
        assert_eq!(buffer.convert_index(0, 0), 0);
        assert_eq!(buffer.convert_index(3, 3), 15);
        assert_eq!(buffer.convert_index(4, 0), 16);
        assert_eq!(buffer.convert_index(4, 3), 28);
        assert_eq!(buffer.convert_index(0, 4), 32);
    }

    #[test]
    fn test_tiled_padding() {
        let buffer = PixelBuffer::<u8>::with_layout(5, 3, Layout::Tiled);
        assert_eq!(buffer.inner_width(), 8);
        assert_eq!(buffer.inner_height(), 4);
    }

    #[test]
    fn test_morton_index() {
        let buffer = PixelBuffer::<u8>::with_layout(64, 64, Layout::Morton);
        assert_eq!(buffer.convert_index(0, 0), 0);
        assert_eq!(buffer.convert_index(1, 0), 1);
        assert_eq!(buffer.convert_index(0, 1), 2);
        assert_eq!(buffer.convert_index(1, 1), 3);
        assert_eq!(buffer.convert_index(2, 0), 4);
        assert_eq!(buffer.convert_index(31, 31), 1023);
        assert_eq!(buffer.convert_index(32, 0), 1024);
        assert_eq!(buffer.convert_index(0, 32), 2048);
    }

    #[test]
    fn test_morton_encode() {
        assert_eq!(encode16_morton2(0, 0), 0);
        assert_eq!(encode16_morton2(0b11111, 0), 0b0101010101);
        assert_eq!(encode16_morton2(0, 0b11111), 0b1010101010);
        assert_eq!(encode16_morton2(31, 31), 1023);
    }

    #[test]
    fn test_clear_and_set_all() {
        let mut buffer = PixelBuffer::<Rgba8>::with_layout(10, 10, Layout::Tiled);
        let px = Rgba8::new(100, 150, 200, 255);
        buffer.set_all(px);
        assert_eq!(buffer.get(3, 3), Some(&px));
        // Padding slots are filled too
        assert_eq!(buffer.raw_len(), 12 * 12);
        assert!(buffer.as_slice().iter().all(|&p| p == px));

        buffer.clear();
        assert_eq!(buffer.get(3, 3), Some(&Rgba8::TRANSPARENT));
    }

    #[test]
    fn test_copy_raw_data() {
        let mut buffer = PixelBuffer::<u32>::new(3, 2);
        for y in 0..2 {
            for x in 0..3 {
                buffer.set(x, y, (y * 3 + x) as u32);
            }
        }

        let mut out = vec![0u32; 6];
        buffer.copy_raw_data_to(&mut out, false);
        assert_eq!(out, vec![0, 1, 2, 3, 4, 5]);

        buffer.copy_raw_data_to(&mut out, true);
        assert_eq!(out, vec![3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_copy_raw_data_short_target_untouched() {
        let buffer = PixelBuffer::<u32>::new(4, 4);
        let mut out = vec![9u32; 3];
        buffer.copy_raw_data_to(&mut out, false);
        assert_eq!(out, vec![9, 9, 9]);
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!(Layout::parse("morton"), Some(Layout::Morton));
        assert_eq!(Layout::parse("tiled"), Some(Layout::Tiled));
        assert_eq!(Layout::parse("linear"), Some(Layout::Linear));
        assert_eq!(Layout::parse("zigzag"), None);
    }
}
