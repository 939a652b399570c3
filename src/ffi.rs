// C-compatible FFI bindings for hosts that share raw memory with the core
// (a wasm page, a Swift app, a C harness).
//
// Safety requirements:
// - Buffer descriptors must point at `length * num_channels` readable floats
// - Output descriptor pointers may be NULL when the caller only wants the count
// - Results live in one process-wide arena; copy them out before the next
//   producing call
//
// Every producing function returns 0 on failure and logs the reason.

use std::sync::{Mutex, PoisonError};

use log::{info, warn};

use crate::audio_buffer::{AudioBuffer, AudioBufferRef};
use crate::config::ProcessorConfig;
use crate::error::AudioResult;
use crate::processor::{ArenaBuffer, Processor};
use crate::wav::{BitDepth, PcmLayout};

#[cfg(feature = "ios")]
use log::LevelFilter;
#[cfg(feature = "ios")]
use oslog::OsLogger;

// Logger subsystem identifier
#[cfg(feature = "ios")]
const LOG_SUBSYSTEM: &str = "com.wavbuf.engine";

static PROCESSOR: Mutex<Option<Processor>> = Mutex::new(None);

fn with_processor<R>(f: impl FnOnce(&mut Processor) -> R) -> R {
    let mut guard = PROCESSOR.lock().unwrap_or_else(PoisonError::into_inner);
    f(guard.get_or_insert_with(Processor::default))
}

fn report<T>(op: &str, result: AudioResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} failed: {}", op, e);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup so logs show up in Console.app and
/// Xcode's debug console.
#[cfg(feature = "ios")]
#[unsafe(no_mangle)]
pub extern "C" fn wavbuf_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Types
// ═══════════════════════════════════════════════════════════════════════════

/// Planar float buffer descriptor shared with the host.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WavbufAudioBuffer {
    pub data: *mut f32,
    /// Sample frames per channel.
    pub length: u32,
    pub num_channels: u16,
    pub sample_rate: u32,
}

impl WavbufAudioBuffer {
    fn from_arena(processor: &mut Processor, handle: &ArenaBuffer) -> Self {
        let shape = handle.shape();
        Self {
            data: processor.memory_ptr().cast(),
            length: shape.length as u32,
            num_channels: shape.channels as u16,
            sample_rate: shape.sample_rate,
        }
    }
}

/// Configuration for the process-wide processor.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WavbufConfig {
    /// Bytes to reserve up front.
    pub initial_capacity: u32,
    /// Arena ceiling in bytes, 0 for unlimited.
    pub max_capacity: u32,
    /// Default bit depth (16 or 24).
    pub bits_per_sample: u16,
    /// Write/read PCM interleaved instead of planar.
    pub interleaved: bool,
}

impl Default for WavbufConfig {
    fn default() -> Self {
        let config = ProcessorConfig::default();
        Self {
            initial_capacity: config.initial_capacity as u32,
            max_capacity: 0,
            bits_per_sample: config.bits_per_sample.bits(),
            interleaved: config.layout == PcmLayout::Interleaved,
        }
    }
}

impl TryFrom<WavbufConfig> for ProcessorConfig {
    type Error = crate::error::AudioError;

    fn try_from(c: WavbufConfig) -> AudioResult<Self> {
        let mut config = ProcessorConfig::new()
            .with_initial_capacity(c.initial_capacity as usize)
            .with_bits_per_sample(BitDepth::try_from(c.bits_per_sample)?)
            .with_layout(if c.interleaved {
                PcmLayout::Interleaved
            } else {
                PcmLayout::Planar
            });
        if c.max_capacity > 0 {
            config = config.with_max_capacity(c.max_capacity as usize);
        }
        Ok(config)
    }
}

/// Input that may have to be copied out of the arena before the arena is
/// claimed for the output.
enum Input<'a> {
    Borrowed(AudioBufferRef<'a>),
    Detached(AudioBuffer),
}

impl Input<'_> {
    fn view(&self) -> AudioBufferRef<'_> {
        match self {
            Input::Borrowed(view) => *view,
            Input::Detached(buffer) => buffer.view(),
        }
    }
}

/// Borrow a host descriptor, copying it when it aliases the arena.
///
/// # Safety
/// `desc.data` must be valid for `length * num_channels` floats (or null
/// with a zero length) for the rest of the call.
unsafe fn input<'a>(processor: &Processor, desc: &WavbufAudioBuffer) -> AudioResult<Input<'a>> {
    // An overflowing count falls through to the storage check below.
    let count = (desc.length as usize).checked_mul(desc.num_channels as usize);
    let data: &'a [f32] = match count {
        Some(count) if count > 0 && !desc.data.is_null() => unsafe {
            std::slice::from_raw_parts(desc.data, count)
        },
        _ => &[],
    };
    let view = AudioBufferRef::new(
        data,
        desc.length as usize,
        desc.num_channels as usize,
        desc.sample_rate,
    )?;

    if !data.is_empty() && processor.arena().contains(data.as_ptr().cast()) {
        Ok(Input::Detached(view.to_owned()))
    } else {
        Ok(Input::Borrowed(view))
    }
}

/// Publish an arena result to the optional output descriptor.
///
/// # Safety
/// `output` must be NULL or point to a writable descriptor.
unsafe fn publish(
    processor: &mut Processor,
    handle: &ArenaBuffer,
    output: *mut WavbufAudioBuffer,
) -> u32 {
    if !output.is_null() {
        unsafe { *output = WavbufAudioBuffer::from_arena(processor, handle) };
    }
    handle.shape().length as u32
}

// ═══════════════════════════════════════════════════════════════════════════
// Memory Handoff
// ═══════════════════════════════════════════════════════════════════════════

/// Replace the process-wide processor with one built from `config`.
///
/// Returns 1 on success, 0 if the config is invalid or the initial
/// reservation fails. NULL restores the defaults.
///
/// # Safety
/// `config` must be NULL or point to a valid `WavbufConfig`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_configure(config: *const WavbufConfig) -> u32 {
    let cfg = if config.is_null() {
        WavbufConfig::default()
    } else {
        unsafe { std::ptr::read(config) }
    };

    let built = ProcessorConfig::try_from(cfg).and_then(Processor::new);
    match report("wavbuf_configure", built) {
        Some(processor) => {
            info!("Processor configured: {:?}", processor.config());
            *PROCESSOR.lock().unwrap_or_else(PoisonError::into_inner) = Some(processor);
            1
        }
        None => 0,
    }
}

/// Pre-size the arena to exactly `size` bytes, discarding its contents.
///
/// Returns the granted size, or 0 on allocation failure.
#[unsafe(no_mangle)]
pub extern "C" fn wavbuf_init_memory(size: u32) -> u32 {
    with_processor(|p| {
        report("wavbuf_init_memory", p.init_memory(size as usize)).map_or(0, |n| n as u32)
    })
}

/// Start of the arena. NULL when nothing is allocated.
#[unsafe(no_mangle)]
pub extern "C" fn wavbuf_get_memory_buffer() -> *mut u8 {
    with_processor(|p| p.memory_ptr())
}

/// Byte length of the most recent result.
#[unsafe(no_mangle)]
pub extern "C" fn wavbuf_get_buffer_size() -> u32 {
    with_processor(|p| p.buffer_size() as u32)
}

/// Release the arena. Safe to call repeatedly.
#[unsafe(no_mangle)]
pub extern "C" fn wavbuf_cleanup() {
    with_processor(|p| p.cleanup());
}

// ═══════════════════════════════════════════════════════════════════════════
// WAV Codec
// ═══════════════════════════════════════════════════════════════════════════

/// Encode planar floats as a WAV stream in the arena.
///
/// Returns the total byte length, or 0 on failure.
///
/// # Safety
/// `audio_data` must point to `length * num_channels` floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_audio_buffer_to_wav(
    audio_data: *const f32,
    length: u32,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
) -> u32 {
    let desc = WavbufAudioBuffer {
        data: audio_data.cast_mut(),
        length,
        num_channels,
        sample_rate,
    };

    with_processor(|p| {
        let result = BitDepth::try_from(bits_per_sample).and_then(|depth| {
            let source = unsafe { input(p, &desc) }?;
            p.encode_with(source.view(), depth)
        });
        report("wavbuf_audio_buffer_to_wav", result).map_or(0, |wav| wav.len() as u32)
    })
}

/// Decode a WAV stream into planar floats in the arena.
///
/// Returns the number of sample frames per channel, or 0 on failure.
///
/// # Safety
/// - `wav_data` must point to `wav_size` readable bytes
/// - `output` must be NULL or point to a writable `WavbufAudioBuffer`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_wav_to_audio_buffer(
    wav_data: *const u8,
    wav_size: u32,
    output: *mut WavbufAudioBuffer,
) -> u32 {
    if wav_data.is_null() {
        return 0;
    }
    let bytes = unsafe { std::slice::from_raw_parts(wav_data, wav_size as usize) };

    with_processor(|p| {
        let owned;
        let bytes = if p.arena().contains(wav_data) {
            owned = bytes.to_vec();
            &owned[..]
        } else {
            bytes
        };
        match report("wavbuf_wav_to_audio_buffer", p.decode(bytes)) {
            Some(handle) => unsafe { publish(p, &handle, output) },
            None => 0,
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Buffer Transforms
// ═══════════════════════════════════════════════════════════════════════════

/// Copy `slice_length` frames from `start_sample`, truncated at the end.
///
/// # Safety
/// - `source` must point to a valid descriptor
/// - `output` must be NULL or point to a writable descriptor
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_slice_audio(
    source: *const WavbufAudioBuffer,
    start_sample: u32,
    slice_length: u32,
    output: *mut WavbufAudioBuffer,
) -> u32 {
    if source.is_null() {
        return 0;
    }
    with_processor(|p| {
        let result = unsafe { input(p, &*source) }.and_then(|src| {
            p.slice(src.view(), start_sample as usize, slice_length as usize)
        });
        match report("wavbuf_slice_audio", result) {
            Some(handle) => unsafe { publish(p, &handle, output) },
            None => 0,
        }
    })
}

/// Concatenate `num_buffers` buffers sharing channel count and sample rate.
///
/// # Safety
/// - `buffers` must point to `num_buffers` valid descriptors
/// - `output` must be NULL or point to a writable descriptor
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_merge_audio_buffers(
    buffers: *const WavbufAudioBuffer,
    num_buffers: u32,
    output: *mut WavbufAudioBuffer,
) -> u32 {
    if buffers.is_null() || num_buffers == 0 {
        return 0;
    }
    let descs = unsafe { std::slice::from_raw_parts(buffers, num_buffers as usize) };

    with_processor(|p| {
        let inputs = descs
            .iter()
            .map(|desc| unsafe { input(p, desc) })
            .collect::<AudioResult<Vec<_>>>();
        let result = inputs.and_then(|inputs| {
            let views: Vec<AudioBufferRef<'_>> = inputs.iter().map(Input::view).collect();
            p.merge(&views)
        });
        match report("wavbuf_merge_audio_buffers", result) {
            Some(handle) => unsafe { publish(p, &handle, output) },
            None => 0,
        }
    })
}

/// Linear-interpolation resample. Equal rates produce a copy.
///
/// # Safety
/// - `source` must point to a valid descriptor
/// - `output` must be NULL or point to a writable descriptor
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_resample_audio(
    source: *const WavbufAudioBuffer,
    target_sample_rate: u32,
    output: *mut WavbufAudioBuffer,
) -> u32 {
    if source.is_null() {
        return 0;
    }
    with_processor(|p| {
        let result = unsafe { input(p, &*source) }
            .and_then(|src| p.resample(src.view(), target_sample_rate));
        match report("wavbuf_resample_audio", result) {
            Some(handle) => unsafe { publish(p, &handle, output) },
            None => 0,
        }
    })
}

/// Scale `buffer` in place, clamping to [-1.0, 1.0].
///
/// # Safety
/// `buffer` must point to a valid descriptor with writable data.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_adjust_volume(buffer: *mut WavbufAudioBuffer, volume: f32) {
    if buffer.is_null() {
        return;
    }
    let desc = unsafe { *buffer };
    let Some(count) = (desc.length as usize).checked_mul(desc.num_channels as usize) else {
        return;
    };
    if desc.data.is_null() || count == 0 {
        return;
    }
    let samples = unsafe { std::slice::from_raw_parts_mut(desc.data, count) };
    crate::transform::gain_in_place(samples, volume);
}

/// Crossfade the tail of `buffer1` into the head of `buffer2`.
///
/// Returns the output length (`len1 + len2 - fade_length`), or 0 when the
/// channel counts differ or the fade is longer than either input.
///
/// # Safety
/// - `buffer1` and `buffer2` must point to valid descriptors
/// - `output` must be NULL or point to a writable descriptor
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wavbuf_cross_fade(
    buffer1: *const WavbufAudioBuffer,
    buffer2: *const WavbufAudioBuffer,
    fade_length: u32,
    output: *mut WavbufAudioBuffer,
) -> u32 {
    if buffer1.is_null() || buffer2.is_null() {
        return 0;
    }
    with_processor(|p| {
        let result = unsafe { input(p, &*buffer1) }.and_then(|a| {
            let b = unsafe { input(p, &*buffer2) }?;
            p.crossfade(a.view(), b.view(), fade_length as usize)
        });
        match report("wavbuf_cross_fade", result) {
            Some(handle) => unsafe { publish(p, &handle, output) },
            None => 0,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // The arena is process-wide; keep these tests from interleaving.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn desc(data: &mut [f32], length: u32, num_channels: u16, sample_rate: u32) -> WavbufAudioBuffer {
        WavbufAudioBuffer {
            data: data.as_mut_ptr(),
            length,
            num_channels,
            sample_rate,
        }
    }

    fn empty() -> WavbufAudioBuffer {
        WavbufAudioBuffer {
            data: std::ptr::null_mut(),
            length: 0,
            num_channels: 0,
            sample_rate: 0,
        }
    }

    #[test]
    fn test_encode_decode_through_arena() {
        let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe { wavbuf_configure(std::ptr::null()) };

        let mut samples = [0.5f32, -0.5, 0.5, -0.5, 0.5, -0.5, 0.5, -0.5];
        let size = unsafe { wavbuf_audio_buffer_to_wav(samples.as_mut_ptr(), 4, 2, 8000, 16) };
        assert_eq!(size, 60);
        assert_eq!(wavbuf_get_buffer_size(), 60);

        let wav = unsafe { std::slice::from_raw_parts(wavbuf_get_memory_buffer(), 60) }.to_vec();
        assert_eq!(&wav[..4], b"RIFF");

        let mut out = empty();
        let frames = unsafe { wavbuf_wav_to_audio_buffer(wav.as_ptr(), 60, &mut out) };
        assert_eq!(frames, 4);
        assert_eq!(out.num_channels, 2);
        assert_eq!(out.sample_rate, 8000);
        let decoded = unsafe { std::slice::from_raw_parts(out.data, 8) };
        for (a, b) in decoded.iter().zip(samples.iter()) {
            assert!((a - b).abs() <= 1.0 / 32767.0);
        }

        // Unsupported bit depth and truncated input report 0.
        assert_eq!(unsafe { wavbuf_audio_buffer_to_wav(samples.as_mut_ptr(), 4, 2, 8000, 8) }, 0);
        assert_eq!(unsafe { wavbuf_wav_to_audio_buffer(wav.as_ptr(), 43, &mut out) }, 0);

        wavbuf_cleanup();
        assert_eq!(wavbuf_get_buffer_size(), 0);
        assert!(wavbuf_get_memory_buffer().is_null());
    }

    #[test]
    fn test_transform_reading_previous_result() {
        let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe { wavbuf_configure(std::ptr::null()) };

        let mut data = [0.0f32, 0.1, 0.2, 0.3, 0.4, 0.5];
        let source = desc(&mut data, 6, 1, 8000);
        let mut merged = empty();
        let len = unsafe {
            wavbuf_merge_audio_buffers([source, source].as_ptr(), 2, &mut merged)
        };
        assert_eq!(len, 12);

        // `merged` points into the arena; slicing it must not read clobbered data.
        let mut sliced = empty();
        let len = unsafe { wavbuf_slice_audio(&merged, 4, 4, &mut sliced) };
        assert_eq!(len, 4);
        let out = unsafe { std::slice::from_raw_parts(sliced.data, 4) };
        assert_eq!(out, &[0.4, 0.5, 0.0, 0.1]);

        let mut resampled = empty();
        let len = unsafe { wavbuf_resample_audio(&sliced, 8000, &mut resampled) };
        assert_eq!(len, 4);

        let mut faded = empty();
        let len = unsafe { wavbuf_cross_fade(&source, &source, 7, &mut faded) };
        assert_eq!(len, 0);
        let len = unsafe { wavbuf_cross_fade(&source, &source, 2, &mut faded) };
        assert_eq!(len, 10);

        // A descriptor claiming more samples than it points at is refused.
        let bogus = WavbufAudioBuffer {
            data: std::ptr::null_mut(),
            length: u32::MAX,
            num_channels: u16::MAX,
            sample_rate: 8000,
        };
        assert_eq!(unsafe { wavbuf_slice_audio(&bogus, 0, 4, &mut sliced) }, 0);

        let mut loud = [0.6f32, -0.6, 0.3];
        let mut buffer = desc(&mut loud, 3, 1, 8000);
        unsafe { wavbuf_adjust_volume(&mut buffer, 2.0) };
        assert_eq!(loud, [1.0, -1.0, 0.6]);

        wavbuf_cleanup();
    }

    #[test]
    fn test_configure_limit() {
        let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let config = WavbufConfig {
            max_capacity: 32,
            ..WavbufConfig::default()
        };
        assert_eq!(unsafe { wavbuf_configure(&config) }, 1);
        assert_eq!(wavbuf_init_memory(64), 0);
        assert_eq!(wavbuf_init_memory(32), 32);

        let bad = WavbufConfig {
            bits_per_sample: 12,
            ..WavbufConfig::default()
        };
        assert_eq!(unsafe { wavbuf_configure(&bad) }, 0);

        unsafe { wavbuf_configure(std::ptr::null()) };
        wavbuf_cleanup();
    }
}
