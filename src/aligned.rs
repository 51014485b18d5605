//! Aligned Storage
//!
//! Zero-initialized heap blocks aligned to a SIMD-friendly boundary. Every
//! pixel buffer sits on one of these; the allocation is released by `Drop`.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use bytemuck::Zeroable;
use log::error;

use crate::error::{PipelineError, Result};

/// Default block alignment in bytes (one AVX register).
pub const ALIGNMENT: usize = 32;

/// Round `size` up to the next multiple of [`ALIGNMENT`].
pub fn aligned_size(size: usize) -> usize {
    size.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Validate an alignment request: non-zero power of two.
pub fn check_alignment(alignment: usize) -> Result<()> {
    if alignment == 0 || !alignment.is_power_of_two() {
        error!("aligned alloc: alignment must be a power of two, got {}", alignment);
        return Err(PipelineError::InvalidAlignment(alignment));
    }
    Ok(())
}

/// A fixed-length, zeroed, aligned array of `T`.
pub struct AlignedBlock<T: Zeroable> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
    _marker: PhantomData<T>,
}

// Safety: the block uniquely owns its allocation, like Vec<T>.
unsafe impl<T: Zeroable + Send> Send for AlignedBlock<T> {}
unsafe impl<T: Zeroable + Sync> Sync for AlignedBlock<T> {}

impl<T: Zeroable> AlignedBlock<T> {
    /// Allocate `len` zeroed elements at the default alignment.
    pub fn new(len: usize) -> Result<Self> {
        Self::with_alignment(len, ALIGNMENT)
    }

    /// Allocate `len` zeroed elements aligned to `alignment` bytes (or the
    /// natural alignment of `T`, whichever is larger).
    pub fn with_alignment(len: usize, alignment: usize) -> Result<Self> {
        check_alignment(alignment)?;
        if len == 0 || std::mem::size_of::<T>() == 0 {
            error!("aligned alloc: refusing empty allocation of {} elements", len);
            return Err(PipelineError::InvalidAllocation(len));
        }

        let bytes = std::mem::size_of::<T>()
            .checked_mul(len)
            .ok_or(PipelineError::InvalidAllocation(len))?;
        let align = alignment.max(std::mem::align_of::<T>());
        let layout = Layout::from_size_align(bytes, align)
            .map_err(|_| PipelineError::InvalidAllocation(len))?;

        // Safety: layout has non-zero size; T: Zeroable so all-zero is valid.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<T>()) else {
            error!("aligned alloc: allocator returned null for {} bytes", bytes);
            return Err(PipelineError::InvalidAllocation(len));
        };

        Ok(Self {
            ptr,
            len,
            layout,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }
}

impl<T: Zeroable> Deref for AlignedBlock<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        // Safety: ptr is valid for len initialized elements.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Zeroable> DerefMut for AlignedBlock<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        // Safety: ptr is valid for len elements and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Zeroable + Copy> Clone for AlignedBlock<T> {
    fn clone(&self) -> Self {
        // Safety: layout was validated when self was allocated.
        let raw = unsafe { alloc::alloc(self.layout) };
        let Some(ptr) = NonNull::new(raw.cast::<T>()) else {
            alloc::handle_alloc_error(self.layout);
        };
        // Safety: both regions hold len elements and do not overlap.
        unsafe { std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), ptr.as_ptr(), self.len) };
        Self {
            ptr,
            len: self.len,
            layout: self.layout,
            _marker: PhantomData,
        }
    }
}

impl<T: Zeroable> Drop for AlignedBlock<T> {
    fn drop(&mut self) {
        // Safety: allocated in with_alignment/clone with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) };
    }
}

impl<T: Zeroable + fmt::Debug> fmt::Debug for AlignedBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBlock")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}
