// src/audio_buffer.rs
//
// Channel-planar float buffers: channel 0's `length` samples, then
// channel 1's, and so on.

use crate::arena::try_zeroed;
use crate::error::{AudioError, AudioResult};

/// Length, channel count and sample rate of a planar buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferShape {
    /// Sample frames per channel.
    pub length: usize,
    pub channels: usize,
    pub sample_rate: u32,
}

impl BufferShape {
    pub fn new(length: usize, channels: usize, sample_rate: u32) -> Self {
        Self {
            length,
            channels,
            sample_rate,
        }
    }

    /// Total number of float samples across all channels.
    ///
    /// Only for shapes that already passed validation or `sample_count`.
    #[inline]
    pub fn total_samples(&self) -> usize {
        self.length * self.channels
    }

    /// Total number of float samples, failing when `length * channels`
    /// does not fit in `usize`.
    pub fn sample_count(&self) -> AudioResult<usize> {
        self.length
            .checked_mul(self.channels)
            .ok_or(AudioError::AllocationFailed {
                requested: usize::MAX,
                limit: None,
            })
    }

    fn check_format(&self) -> AudioResult<()> {
        if self.channels == 0 || self.channels > u16::MAX as usize {
            return Err(AudioError::InvalidChannels(
                self.channels.min(u16::MAX as usize) as u16,
            ));
        }
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(0));
        }
        Ok(())
    }

    fn validate(&self, available: usize) -> AudioResult<()> {
        self.check_format()?;
        // An overflowing product can never be backed by real storage.
        let needed = self.length.checked_mul(self.channels).unwrap_or(usize::MAX);
        if available < needed {
            return Err(AudioError::StorageTooSmall { needed, available });
        }
        Ok(())
    }
}

/// Borrowed view of planar samples owned elsewhere (caller memory or the arena).
#[derive(Debug, Clone, Copy)]
pub struct AudioBufferRef<'a> {
    shape: BufferShape,
    data: &'a [f32],
}

impl<'a> AudioBufferRef<'a> {
    /// Wrap existing planar data. `data` may be longer than `length * channels`.
    pub fn new(
        data: &'a [f32],
        length: usize,
        channels: usize,
        sample_rate: u32,
    ) -> AudioResult<Self> {
        let shape = BufferShape::new(length, channels, sample_rate);
        shape.validate(data.len())?;
        Ok(Self { shape, data })
    }

    /// View without revalidating; `shape` must already fit `data`.
    #[inline]
    pub(crate) fn from_parts(shape: BufferShape, data: &'a [f32]) -> Self {
        debug_assert!(data.len() >= shape.total_samples());
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.length == 0
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.shape.sample_rate
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &'a [f32] {
        let start = ch * self.shape.length;
        &self.data[start..start + self.shape.length]
    }

    /// Like [`channel`](Self::channel), but rejects an out-of-range index.
    pub fn get_channel(&self, ch: usize) -> AudioResult<&'a [f32]> {
        if ch >= self.shape.channels {
            return Err(AudioError::ChannelOutOfRange {
                channel: ch,
                channels: self.shape.channels,
            });
        }
        Ok(self.channel(ch))
    }

    /// All channels, planar.
    #[inline]
    pub fn samples(&self) -> &'a [f32] {
        &self.data[..self.shape.total_samples()]
    }

    pub fn duration_secs(&self) -> f64 {
        self.shape.length as f64 / self.shape.sample_rate as f64
    }

    /// Interleave into frame order (ch0, ch1, .., ch0, ch1, ..).
    pub fn to_interleaved(&self) -> Vec<f32> {
        let channels = self.shape.channels;
        let mut out = vec![0.0; self.shape.total_samples()];
        for ch in 0..channels {
            for (frame, &sample) in self.channel(ch).iter().enumerate() {
                out[frame * channels + ch] = sample;
            }
        }
        out
    }

    /// Copy into an independently owned buffer.
    pub fn to_owned(&self) -> AudioBuffer {
        AudioBuffer {
            shape: self.shape,
            data: self.samples().to_vec(),
        }
    }
}

/// Owned planar buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    shape: BufferShape,
    data: Vec<f32>,
}

impl AudioBuffer {
    /// Take ownership of planar data. Extra trailing samples are dropped.
    pub fn new(
        mut data: Vec<f32>,
        length: usize,
        channels: usize,
        sample_rate: u32,
    ) -> AudioResult<Self> {
        let shape = BufferShape::new(length, channels, sample_rate);
        shape.validate(data.len())?;
        data.truncate(shape.total_samples());
        Ok(Self { shape, data })
    }

    /// Zero-filled buffer of the given shape.
    pub fn silence(length: usize, channels: usize, sample_rate: u32) -> AudioResult<Self> {
        let shape = BufferShape::new(length, channels, sample_rate);
        shape.check_format()?;
        Self::zeroed(shape)
    }

    /// Zero-filled storage for `shape`; allocation failure is an error,
    /// not an abort.
    pub(crate) fn zeroed(shape: BufferShape) -> AudioResult<Self> {
        let data = try_zeroed(shape.sample_count()?)?;
        Ok(Self { shape, data })
    }

    /// Deinterleave frame-ordered samples into planar layout.
    /// A trailing partial frame is ignored.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> AudioResult<Self> {
        let length = if channels == 0 {
            0
        } else {
            interleaved.len() / channels
        };
        let mut buffer = Self::silence(length, channels, sample_rate)?;
        for ch in 0..channels {
            let dst = buffer.channel_mut(ch);
            for (frame, sample) in dst.iter_mut().enumerate() {
                *sample = interleaved[frame * channels + ch];
            }
        }
        Ok(buffer)
    }

    #[inline]
    pub fn view(&self) -> AudioBufferRef<'_> {
        AudioBufferRef::from_parts(self.shape, &self.data)
    }

    #[inline]
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.length == 0
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.shape.sample_rate
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.shape.length;
        &self.data[start..start + self.shape.length]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.shape.length;
        &mut self.data[start..start + self.shape.length]
    }

    /// Get direct access to the planar sample data.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable access to the planar sample data.
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn duration_secs(&self) -> f64 {
        self.view().duration_secs()
    }

    /// In-place volume change, clamped to [-1.0, 1.0].
    pub fn apply_gain(&mut self, factor: f32) {
        crate::transform::gain_in_place(&mut self.data, factor);
    }
}

impl<'a> From<&'a AudioBuffer> for AudioBufferRef<'a> {
    fn from(buffer: &'a AudioBuffer) -> Self {
        buffer.view()
    }
}
