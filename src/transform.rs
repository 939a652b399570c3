// src/transform.rs
//
// Buffer transforms: slice, merge, resample, volume and crossfade.
//
// Each transform first computes its output shape (which is where all
// validation happens), then renders into a planar output slice of exactly
// that size. The owned-buffer functions at the bottom allocate that slice
// fresh; the processor renders into its arena instead.

use log::{debug, warn};

use crate::audio_buffer::{AudioBuffer, AudioBufferRef, BufferShape};
use crate::error::{AudioError, AudioResult};

/// A buffer-producing operation.
pub trait Transform {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Validate inputs and compute the output shape.
    fn output_shape(&self) -> AudioResult<BufferShape>;

    /// Write the output. `out` holds exactly `shape.total_samples()` floats.
    fn render_into(&self, shape: &BufferShape, out: &mut [f32]);

    /// Render into a freshly allocated buffer.
    fn render(&self) -> AudioResult<AudioBuffer> {
        let shape = self.output_shape()?;
        let mut output = AudioBuffer::zeroed(shape)?;
        self.render_into(&shape, output.samples_mut());
        debug!(
            "{}: {} frames x {} ch @ {} Hz",
            self.name(),
            shape.length,
            shape.channels,
            shape.sample_rate
        );
        Ok(output)
    }
}

#[inline]
fn out_channel<'o>(out: &'o mut [f32], shape: &BufferShape, ch: usize) -> &'o mut [f32] {
    &mut out[ch * shape.length..(ch + 1) * shape.length]
}

// ───────────────────────────────────────────────────────────────────────────
// Slice
// ───────────────────────────────────────────────────────────────────────────

/// Copy `length` frames starting at `start`, truncated at the source end.
#[derive(Debug, Clone, Copy)]
pub struct Slice<'a> {
    pub source: AudioBufferRef<'a>,
    pub start: usize,
    pub length: usize,
}

impl Transform for Slice<'_> {
    fn name(&self) -> &'static str {
        "slice"
    }

    fn output_shape(&self) -> AudioResult<BufferShape> {
        let remaining = self.source.len().saturating_sub(self.start);
        if self.length > remaining {
            debug!(
                "slice: {} frames requested at {}, truncating to {}",
                self.length, self.start, remaining
            );
        }
        Ok(BufferShape {
            length: self.length.min(remaining),
            ..self.source.shape()
        })
    }

    fn render_into(&self, shape: &BufferShape, out: &mut [f32]) {
        if shape.length == 0 {
            return;
        }
        for ch in 0..shape.channels {
            let src = &self.source.channel(ch)[self.start..self.start + shape.length];
            out_channel(out, shape, ch).copy_from_slice(src);
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Merge
// ───────────────────────────────────────────────────────────────────────────

/// Concatenate buffers along the sample axis, per channel.
#[derive(Debug, Clone, Copy)]
pub struct Merge<'a, 'b> {
    pub buffers: &'b [AudioBufferRef<'a>],
}

impl Transform for Merge<'_, '_> {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn output_shape(&self) -> AudioResult<BufferShape> {
        let first = self.buffers.first().ok_or(AudioError::NothingToMerge)?;
        let mut length = 0usize;

        for (index, buffer) in self.buffers.iter().enumerate() {
            if buffer.channels() != first.channels() || buffer.sample_rate() != first.sample_rate() {
                warn!(
                    "merge: buffer {} is {} ch @ {} Hz, expected {} ch @ {} Hz",
                    index,
                    buffer.channels(),
                    buffer.sample_rate(),
                    first.channels(),
                    first.sample_rate()
                );
                return Err(AudioError::FormatMismatch {
                    index,
                    expected_channels: first.channels(),
                    found_channels: buffer.channels(),
                    expected_rate: first.sample_rate(),
                    found_rate: buffer.sample_rate(),
                });
            }
            length = length
                .checked_add(buffer.len())
                .ok_or(AudioError::AllocationFailed {
                    requested: usize::MAX,
                    limit: None,
                })?;
        }

        Ok(BufferShape {
            length,
            ..first.shape()
        })
    }

    fn render_into(&self, shape: &BufferShape, out: &mut [f32]) {
        let mut offset = 0;
        for buffer in self.buffers {
            for ch in 0..shape.channels {
                out_channel(out, shape, ch)[offset..offset + buffer.len()]
                    .copy_from_slice(buffer.channel(ch));
            }
            offset += buffer.len();
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Resample
// ───────────────────────────────────────────────────────────────────────────

/// Linear-interpolation sample rate conversion.
///
/// Equal rates produce a plain copy.
#[derive(Debug, Clone, Copy)]
pub struct Resample<'a> {
    pub source: AudioBufferRef<'a>,
    pub target_rate: u32,
}

impl Resample<'_> {
    #[inline]
    fn ratio(&self) -> f64 {
        self.target_rate as f64 / self.source.sample_rate() as f64
    }
}

impl Transform for Resample<'_> {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn output_shape(&self) -> AudioResult<BufferShape> {
        if self.target_rate == 0 {
            return Err(AudioError::InvalidSampleRate(0));
        }
        let length = if self.target_rate == self.source.sample_rate() {
            self.source.len()
        } else {
            (self.source.len() as f64 * self.ratio()).floor() as usize
        };
        Ok(BufferShape {
            length,
            sample_rate: self.target_rate,
            ..self.source.shape()
        })
    }

    fn render_into(&self, shape: &BufferShape, out: &mut [f32]) {
        if self.target_rate == self.source.sample_rate() {
            out.copy_from_slice(self.source.samples());
            return;
        }

        let ratio = self.ratio();
        let last = self.source.len().saturating_sub(1);

        for ch in 0..shape.channels {
            let src = self.source.channel(ch);
            let dst = out_channel(out, shape, ch);

            for (i, sample) in dst.iter_mut().enumerate() {
                let pos = i as f64 / ratio;
                let idx = pos as usize;
                let frac = pos - idx as f64;

                *sample = if idx >= last {
                    src[last]
                } else {
                    (src[idx] as f64 * (1.0 - frac) + src[idx + 1] as f64 * frac) as f32
                };
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Volume
// ───────────────────────────────────────────────────────────────────────────

/// Multiply every sample by `factor`, clamped to [-1.0, 1.0].
#[derive(Debug, Clone, Copy)]
pub struct Gain<'a> {
    pub source: AudioBufferRef<'a>,
    pub factor: f32,
}

impl Transform for Gain<'_> {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn output_shape(&self) -> AudioResult<BufferShape> {
        Ok(self.source.shape())
    }

    fn render_into(&self, _shape: &BufferShape, out: &mut [f32]) {
        for (dst, &src) in out.iter_mut().zip(self.source.samples()) {
            *dst = (src * self.factor).clamp(-1.0, 1.0);
        }
    }
}

/// Scale samples in place, clamped to [-1.0, 1.0].
pub(crate) fn gain_in_place(samples: &mut [f32], factor: f32) {
    for sample in samples {
        *sample = (*sample * factor).clamp(-1.0, 1.0);
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Crossfade
// ───────────────────────────────────────────────────────────────────────────

/// Join `a` and `b`, overlapping `a`'s last `fade_length` samples with
/// `b`'s first `fade_length` samples under linear weights.
#[derive(Debug, Clone, Copy)]
pub struct Crossfade<'a> {
    pub a: AudioBufferRef<'a>,
    pub b: AudioBufferRef<'a>,
    pub fade_length: usize,
}

impl Transform for Crossfade<'_> {
    fn name(&self) -> &'static str {
        "crossfade"
    }

    fn output_shape(&self) -> AudioResult<BufferShape> {
        if self.a.channels() != self.b.channels() {
            return Err(AudioError::ChannelMismatch {
                left: self.a.channels(),
                right: self.b.channels(),
            });
        }
        if self.fade_length > self.a.len() || self.fade_length > self.b.len() {
            warn!(
                "crossfade: fade of {} exceeds inputs ({} / {})",
                self.fade_length,
                self.a.len(),
                self.b.len()
            );
            return Err(AudioError::FadeTooLong {
                fade: self.fade_length,
                left: self.a.len(),
                right: self.b.len(),
            });
        }
        if self.a.sample_rate() != self.b.sample_rate() {
            warn!(
                "crossfade: mixing {} Hz into {} Hz without resampling",
                self.b.sample_rate(),
                self.a.sample_rate()
            );
        }

        Ok(BufferShape {
            length: self.a.len() + self.b.len() - self.fade_length,
            ..self.a.shape()
        })
    }

    fn render_into(&self, shape: &BufferShape, out: &mut [f32]) {
        let fade = self.fade_length;
        let head = self.a.len() - fade;

        for ch in 0..shape.channels {
            let a = self.a.channel(ch);
            let b = self.b.channel(ch);
            let dst = out_channel(out, shape, ch);

            dst[..head].copy_from_slice(&a[..head]);
            for i in 0..fade {
                let t = i as f32 / fade as f32;
                dst[head + i] = a[head + i] * (1.0 - t) + b[i] * t;
            }
            dst[self.a.len()..].copy_from_slice(&b[fade..]);
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Owned-buffer entry points
// ───────────────────────────────────────────────────────────────────────────

pub fn slice(source: AudioBufferRef<'_>, start: usize, length: usize) -> AudioResult<AudioBuffer> {
    Slice {
        source,
        start,
        length,
    }
    .render()
}

pub fn merge(buffers: &[AudioBufferRef<'_>]) -> AudioResult<AudioBuffer> {
    Merge { buffers }.render()
}

pub fn resample(source: AudioBufferRef<'_>, target_rate: u32) -> AudioResult<AudioBuffer> {
    Resample {
        source,
        target_rate,
    }
    .render()
}

/// Volume change returning a new buffer; see [`AudioBuffer::apply_gain`]
/// for the in-place form.
pub fn scale_volume(source: AudioBufferRef<'_>, factor: f32) -> AudioResult<AudioBuffer> {
    Gain { source, factor }.render()
}

pub fn crossfade(
    a: AudioBufferRef<'_>,
    b: AudioBufferRef<'_>,
    fade_length: usize,
) -> AudioResult<AudioBuffer> {
    Crossfade { a, b, fade_length }.render()
}
