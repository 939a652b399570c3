//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { wavbuf_init, WavbufProcessor, WavbufBuffer } from './wavbuf.js';
//!
//! await init();
//! wavbuf_init();
//!
//! const processor = new WavbufProcessor();
//!
//! // Planar: all of the left channel, then all of the right channel.
//! const recorded = new WavbufBuffer(planarSamples, frames, 2, 48000);
//! const resampled = processor.resample(recorded, 16000);
//! const wavBytes = processor.encode(resampled, 16);
//! const blob = new Blob([wavBytes], { type: 'audio/wav' });
//! ```
//!
//! Results are copied into JS-owned arrays, so nothing returned here is
//! invalidated by a later call.

use wasm_bindgen::prelude::*;

use crate::audio_buffer::{AudioBuffer, AudioBufferRef};
use crate::config::ProcessorConfig;
use crate::error::AudioError;
use crate::ffi;
use crate::processor::{ArenaBuffer, Processor};
use crate::wav::BitDepth;

fn js_error(e: AudioError) -> JsError {
    JsError::new(&e.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn wavbuf_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for creating a processor.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct WavbufConfig {
    /// Bytes reserved in the arena up front.
    pub initial_capacity: u32,
    /// Arena ceiling in bytes, 0 for unlimited.
    pub max_capacity: u32,
    /// Default bit depth for `encode_default` (16 or 24).
    pub bits_per_sample: u16,
    /// Write/read PCM interleaved instead of planar.
    pub interleaved: bool,
}

#[wasm_bindgen]
impl WavbufConfig {
    /// Create a new configuration with default values.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for WavbufConfig {
    fn default() -> Self {
        let c = ffi::WavbufConfig::default();
        Self {
            initial_capacity: c.initial_capacity,
            max_capacity: c.max_capacity,
            bits_per_sample: c.bits_per_sample,
            interleaved: c.interleaved,
        }
    }
}

impl TryFrom<WavbufConfig> for ProcessorConfig {
    type Error = AudioError;

    fn try_from(c: WavbufConfig) -> Result<Self, AudioError> {
        ProcessorConfig::try_from(ffi::WavbufConfig {
            initial_capacity: c.initial_capacity,
            max_capacity: c.max_capacity,
            bits_per_sample: c.bits_per_sample,
            interleaved: c.interleaved,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Audio Buffer
// ═══════════════════════════════════════════════════════════════════════════

/// Planar float buffer owned by the wasm side.
#[wasm_bindgen]
pub struct WavbufBuffer {
    inner: AudioBuffer,
}

#[wasm_bindgen]
impl WavbufBuffer {
    /// Wrap planar samples (`length` frames per channel).
    #[wasm_bindgen(constructor)]
    pub fn new(
        samples: Vec<f32>,
        length: u32,
        channels: u16,
        sample_rate: u32,
    ) -> Result<WavbufBuffer, JsError> {
        AudioBuffer::new(samples, length as usize, channels as usize, sample_rate)
            .map(|inner| Self { inner })
            .map_err(js_error)
    }

    /// Build from frame-interleaved samples, as Web Audio capture delivers.
    pub fn from_interleaved(
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<WavbufBuffer, JsError> {
        AudioBuffer::from_interleaved(samples, channels as usize, sample_rate)
            .map(|inner| Self { inner })
            .map_err(js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> u32 {
        self.inner.len() as u32
    }

    #[wasm_bindgen(getter)]
    pub fn channels(&self) -> u16 {
        self.inner.channels() as u16
    }

    #[wasm_bindgen(getter)]
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    #[wasm_bindgen(getter)]
    pub fn duration(&self) -> f64 {
        self.inner.duration_secs()
    }

    /// All samples, planar (copied into a Float32Array).
    pub fn samples(&self) -> Vec<f32> {
        self.inner.samples().to_vec()
    }

    /// One channel (copied into a Float32Array).
    pub fn channel(&self, ch: u16) -> Result<Vec<f32>, JsError> {
        self.inner
            .view()
            .get_channel(ch as usize)
            .map(<[f32]>::to_vec)
            .map_err(js_error)
    }

    /// Frame-interleaved copy for Web Audio playback paths.
    pub fn to_interleaved(&self) -> Vec<f32> {
        self.inner.view().to_interleaved()
    }

    /// Scale in place, clamped to [-1.0, 1.0].
    pub fn adjust_volume(&mut self, volume: f32) {
        self.inner.apply_gain(volume);
    }
}

impl WavbufBuffer {
    fn view(&self) -> AudioBufferRef<'_> {
        self.inner.view()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Processor
// ═══════════════════════════════════════════════════════════════════════════

/// Processing session over one scratch arena.
#[wasm_bindgen]
pub struct WavbufProcessor {
    inner: Processor,
}

#[wasm_bindgen]
impl WavbufProcessor {
    /// Create a processor with default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> WavbufProcessor {
        Self {
            inner: Processor::default(),
        }
    }

    /// Create a processor with custom configuration.
    pub fn new_with_config(config: WavbufConfig) -> Result<WavbufProcessor, JsError> {
        ProcessorConfig::try_from(config)
            .and_then(Processor::new)
            .map(|inner| Self { inner })
            .map_err(js_error)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memory
    // ─────────────────────────────────────────────────────────────────────────

    /// Pre-size the arena, discarding its contents. Returns the granted size.
    pub fn init_memory(&mut self, size: u32) -> Result<u32, JsError> {
        self.inner
            .init_memory(size as usize)
            .map(|n| n as u32)
            .map_err(js_error)
    }

    /// Byte offset of the arena in wasm memory, 0 when nothing is allocated.
    pub fn memory_ptr(&mut self) -> usize {
        self.inner.memory_ptr() as usize
    }

    /// Byte length of the most recent result.
    pub fn buffer_size(&self) -> u32 {
        self.inner.buffer_size() as u32
    }

    /// Release the arena.
    pub fn cleanup(&mut self) {
        self.inner.cleanup();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Codec
    // ─────────────────────────────────────────────────────────────────────────

    /// Encode as WAV at the given bit depth (16 or 24).
    pub fn encode(&mut self, buffer: &WavbufBuffer, bits_per_sample: u16) -> Result<Vec<u8>, JsError> {
        let depth = BitDepth::try_from(bits_per_sample).map_err(js_error)?;
        let handle = self
            .inner
            .encode_with(buffer.view(), depth)
            .map_err(js_error)?;
        self.inner
            .wav_bytes(&handle)
            .map(<[u8]>::to_vec)
            .map_err(js_error)
    }

    /// Encode as WAV at the configured bit depth.
    pub fn encode_default(&mut self, buffer: &WavbufBuffer) -> Result<Vec<u8>, JsError> {
        self.encode(buffer, self.inner.config().bits_per_sample.bits())
    }

    pub fn decode(&mut self, bytes: &[u8]) -> Result<WavbufBuffer, JsError> {
        let handle = self.inner.decode(bytes).map_err(js_error)?;
        self.take(&handle)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transforms
    // ─────────────────────────────────────────────────────────────────────────

    pub fn slice(
        &mut self,
        source: &WavbufBuffer,
        start: u32,
        length: u32,
    ) -> Result<WavbufBuffer, JsError> {
        let handle = self
            .inner
            .slice(source.view(), start as usize, length as usize)
            .map_err(js_error)?;
        self.take(&handle)
    }

    pub fn merge(&mut self, buffers: Vec<WavbufBuffer>) -> Result<WavbufBuffer, JsError> {
        let views: Vec<AudioBufferRef<'_>> = buffers.iter().map(WavbufBuffer::view).collect();
        let handle = self.inner.merge(&views).map_err(js_error)?;
        self.take(&handle)
    }

    pub fn resample(&mut self, source: &WavbufBuffer, target_rate: u32) -> Result<WavbufBuffer, JsError> {
        let handle = self
            .inner
            .resample(source.view(), target_rate)
            .map_err(js_error)?;
        self.take(&handle)
    }

    /// Volume change returning a new buffer.
    pub fn scale_volume(&mut self, source: &WavbufBuffer, factor: f32) -> Result<WavbufBuffer, JsError> {
        let handle = self
            .inner
            .scale_volume(source.view(), factor)
            .map_err(js_error)?;
        self.take(&handle)
    }

    pub fn crossfade(
        &mut self,
        a: &WavbufBuffer,
        b: &WavbufBuffer,
        fade_length: u32,
    ) -> Result<WavbufBuffer, JsError> {
        let handle = self
            .inner
            .crossfade(a.view(), b.view(), fade_length as usize)
            .map_err(js_error)?;
        self.take(&handle)
    }
}

impl WavbufProcessor {
    fn take(&self, handle: &ArenaBuffer) -> Result<WavbufBuffer, JsError> {
        self.inner
            .take(handle)
            .map(|inner| WavbufBuffer { inner })
            .map_err(js_error)
    }
}

impl Default for WavbufProcessor {
    fn default() -> Self {
        Self::new()
    }
}
