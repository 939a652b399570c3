// src/arena.rs
//
// Scratch arena: one growable region that every producing call writes its
// result into, replacing the previous contents.
//
// Storage is kept as `f32` words so float results can be handed out
// without realignment; byte results (WAV streams) go through a bytemuck
// view of the same words.

use log::{debug, error};

use crate::error::{AudioError, AudioResult};

const WORD: usize = std::mem::size_of::<f32>();

/// Zero-filled `Vec` for results allocated outside the arena.
///
/// Fails with `AllocationFailed` instead of aborting when the request
/// cannot be satisfied.
pub(crate) fn try_zeroed<T: Copy + Default>(count: usize) -> AudioResult<Vec<T>> {
    let mut out = Vec::new();
    if out.try_reserve_exact(count).is_err() {
        let requested = count.saturating_mul(std::mem::size_of::<T>());
        error!("Allocation of {} bytes failed", requested);
        return Err(AudioError::AllocationFailed {
            requested,
            limit: None,
        });
    }
    out.resize(count, T::default());
    Ok(out)
}

/// Growable output region with a generation counter.
///
/// `used` is the byte length of the most recent result. Every `claim_*`
/// bumps the generation so handles to earlier results can be detected as
/// stale.
#[derive(Debug, Default)]
pub struct ScratchArena {
    words: Vec<f32>,
    used: usize,
    generation: u64,
    limit: Option<usize>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena that refuses to grow past `limit` bytes.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Replace the storage with a fresh region of exactly `bytes` bytes.
    ///
    /// Prior contents are discarded and `used` resets to zero. Returns the
    /// granted size.
    pub fn init(&mut self, bytes: usize) -> AudioResult<usize> {
        self.check_limit(bytes)?;
        let mut words = Vec::new();
        words
            .try_reserve_exact(bytes.div_ceil(WORD))
            .map_err(|_| self.alloc_failed(bytes))?;
        words.resize(bytes.div_ceil(WORD), 0.0);
        self.words = words;
        self.used = 0;
        self.generation += 1;
        debug!("Arena initialized with {} bytes", bytes);
        Ok(bytes)
    }

    /// Grow to at least `bytes` bytes. Never shrinks.
    ///
    /// On failure nothing changes: contents, `used` and capacity stay as
    /// they were.
    pub fn ensure_capacity(&mut self, bytes: usize) -> AudioResult<usize> {
        let needed = bytes.div_ceil(WORD);
        if needed > self.words.len() {
            self.check_limit(bytes)?;
            let extra = needed - self.words.len();
            self.words
                .try_reserve_exact(extra)
                .map_err(|_| self.alloc_failed(bytes))?;
            self.words.resize(needed, 0.0);
            debug!("Arena grown to {} bytes", self.capacity());
        }
        Ok(self.capacity())
    }

    /// Claim the arena for a float result of `count` samples.
    pub fn claim_samples(&mut self, count: usize) -> AudioResult<&mut [f32]> {
        let bytes = count
            .checked_mul(WORD)
            .ok_or_else(|| self.alloc_failed(usize::MAX))?;
        self.ensure_capacity(bytes)?;
        self.used = bytes;
        self.generation += 1;
        Ok(&mut self.words[..count])
    }

    /// Claim the arena for a byte result of `len` bytes.
    pub fn claim_bytes(&mut self, len: usize) -> AudioResult<&mut [u8]> {
        self.ensure_capacity(len)?;
        self.used = len;
        self.generation += 1;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        Ok(&mut bytes[..len])
    }

    /// Free the storage. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.words.is_empty() {
            debug!("Arena released ({} bytes)", self.capacity());
        }
        self.words = Vec::new();
        self.used = 0;
        self.generation += 1;
    }

    /// Bytes of the most recent result.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes currently allocated.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// The most recent result as raw bytes.
    pub fn bytes(&self) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        &bytes[..self.used]
    }

    /// The first `count` float words of the arena.
    pub(crate) fn samples(&self, count: usize) -> &[f32] {
        &self.words[..count]
    }

    /// Start of the storage, for hosts that read the region directly.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        if self.words.is_empty() {
            std::ptr::null_mut()
        } else {
            self.words.as_mut_ptr().cast()
        }
    }

    /// Whether `ptr` points into the current storage.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let range = self.words.as_ptr_range();
        let start = range.start as usize;
        let end = range.end as usize;
        let addr = ptr as usize;
        addr >= start && addr < end
    }

    fn check_limit(&self, bytes: usize) -> AudioResult<()> {
        match self.limit {
            Some(limit) if bytes > limit => Err(self.alloc_failed(bytes)),
            _ => Ok(()),
        }
    }

    fn alloc_failed(&self, requested: usize) -> AudioError {
        error!(
            "Arena allocation of {} bytes failed (capacity {} bytes)",
            requested,
            self.capacity()
        );
        AudioError::AllocationFailed {
            requested,
            limit: self.limit,
        }
    }
}
