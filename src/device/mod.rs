//! Accelerator resource layer.
//!
//! Every buffer the stereo passes touch is allocated through a
//! [`DeviceContext`], which tracks live allocations so that release after
//! success and after early errors can be observed. Buffers free themselves on
//! drop; allocation failures surface as fatal [`StereoError`]s carrying the
//! location of the failing call.
//!
//! The current backend keeps device memory in host RAM and runs kernels on the
//! rayon pool (feature `parallel`), but callers only see the synchronous
//! `upload → run → download` contract.

pub mod buffers;
pub mod resources;
pub mod texture;

pub use buffers::PixelBuffers;
pub use resources::{DeviceResources, MAX_IMAGES};
pub use texture::Texture;

use crate::error::StereoError;
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Live/peak allocation counters shared by a context and its buffers.
#[derive(Debug, Default)]
pub struct AllocationStats {
    live_allocations: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
}

impl AllocationStats {
    fn record_alloc(&self, bytes: usize) {
        self.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }

    fn record_free(&self, bytes: usize) {
        self.live_allocations.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Handle to the device; cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct DeviceContext {
    stats: Arc<AllocationStats>,
    memory_limit: Option<usize>,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that refuses allocations pushing live usage above `bytes`.
    pub fn with_memory_limit(bytes: usize) -> Self {
        Self {
            stats: Arc::default(),
            memory_limit: Some(bytes),
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.stats.live_allocations.load(Ordering::Relaxed)
    }

    pub fn live_bytes(&self) -> usize {
        self.stats.live_bytes.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.stats.peak_bytes.load(Ordering::Relaxed)
    }

    pub fn total_allocations(&self) -> usize {
        self.stats.total_allocations.load(Ordering::Relaxed)
    }

    #[track_caller]
    fn reserve<T>(&self, len: usize) -> Result<(Vec<T>, usize), StereoError> {
        let location = Location::caller();
        let bytes = len.saturating_mul(std::mem::size_of::<T>());
        if let Some(limit) = self.memory_limit {
            if self.live_bytes().saturating_add(bytes) > limit {
                return Err(StereoError::Allocation { bytes, location });
            }
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| StereoError::Allocation { bytes, location })?;
        Ok((data, bytes))
    }

    fn wrap<T>(&self, data: Vec<T>, bytes: usize) -> DeviceBuffer<T> {
        self.stats.record_alloc(bytes);
        DeviceBuffer {
            data,
            bytes,
            stats: Arc::clone(&self.stats),
        }
    }

    /// Allocate `len` elements initialised to `value`.
    #[track_caller]
    pub fn alloc<T: Clone>(&self, len: usize, value: T) -> Result<DeviceBuffer<T>, StereoError> {
        let (mut data, bytes) = self.reserve(len)?;
        data.resize(len, value);
        Ok(self.wrap(data, bytes))
    }

    /// Allocate `len` elements produced by `init(index)`.
    #[track_caller]
    pub fn alloc_with<T>(
        &self,
        len: usize,
        init: impl FnMut(usize) -> T,
    ) -> Result<DeviceBuffer<T>, StereoError> {
        let (mut data, bytes) = self.reserve(len)?;
        data.extend((0..len).map(init));
        Ok(self.wrap(data, bytes))
    }

    /// Copy a host slice into a new device buffer.
    #[track_caller]
    pub fn upload<T: Clone>(&self, host: &[T]) -> Result<DeviceBuffer<T>, StereoError> {
        let (mut data, bytes) = self.reserve(host.len())?;
        data.extend_from_slice(host);
        Ok(self.wrap(data, bytes))
    }
}

/// Owned device allocation; released on drop.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    data: Vec<T>,
    bytes: usize,
    stats: Arc<AllocationStats>,
}

impl<T> DeviceBuffer<T> {
    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    /// Copy the buffer contents back to the host.
    pub fn download(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.clone()
    }
}

impl<T> Deref for DeviceBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for DeviceBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.stats.record_free(self.bytes);
    }
}
