// src/processor.rs
//
// Arena-backed processing session.
//
// Every producing call writes its result into the session's scratch arena
// and returns a small handle tagged with the arena generation. Results
// alias the arena, so a handle stops resolving as soon as the next
// producing call (or init/cleanup) runs. Copy out with `take` first.

use log::debug;

use crate::arena::ScratchArena;
use crate::audio_buffer::{AudioBuffer, AudioBufferRef, BufferShape};
use crate::config::ProcessorConfig;
use crate::error::{AudioError, AudioResult};
use crate::transform::{Crossfade, Gain, Merge, Resample, Slice, Transform};
use crate::wav::{self, BitDepth};

/// Handle to a float result living in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBuffer {
    generation: u64,
    shape: BufferShape,
}

impl ArenaBuffer {
    #[inline]
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Handle to a WAV byte stream living in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBytes {
    generation: u64,
    len: usize,
}

impl ArenaBytes {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Single-owner session over one scratch arena.
#[derive(Debug)]
pub struct Processor {
    arena: ScratchArena,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(config: ProcessorConfig) -> AudioResult<Self> {
        let mut arena = ScratchArena::with_limit(config.max_capacity);
        if config.initial_capacity > 0 {
            arena.ensure_capacity(config.initial_capacity)?;
        }
        debug!(
            "Processor created ({} bytes reserved, limit {:?})",
            arena.capacity(),
            arena.limit()
        );
        Ok(Self { arena, config })
    }

    #[inline]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    #[inline]
    pub fn arena(&self) -> &ScratchArena {
        &self.arena
    }

    // ── Memory handoff ──────────────────────────────────────────────────

    /// Replace the arena with a fresh region of `bytes` bytes.
    pub fn init_memory(&mut self, bytes: usize) -> AudioResult<usize> {
        self.arena.init(bytes)
    }

    /// Byte length of the most recent result.
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.arena.used()
    }

    /// Start of the arena, null when nothing is allocated.
    pub fn memory_ptr(&mut self) -> *mut u8 {
        self.arena.as_mut_ptr()
    }

    pub fn cleanup(&mut self) {
        self.arena.release();
    }

    // ── Codec ───────────────────────────────────────────────────────────

    /// Encode at the configured bit depth.
    pub fn encode(&mut self, buffer: AudioBufferRef<'_>) -> AudioResult<ArenaBytes> {
        self.encode_with(buffer, self.config.bits_per_sample)
    }

    pub fn encode_with(
        &mut self,
        buffer: AudioBufferRef<'_>,
        depth: BitDepth,
    ) -> AudioResult<ArenaBytes> {
        let len = wav::encoded_len(&buffer.shape(), depth)?;
        let layout = self.config.layout;
        let out = self.arena.claim_bytes(len)?;
        wav::encode_into(buffer, depth, layout, out)?;
        Ok(ArenaBytes {
            generation: self.arena.generation(),
            len,
        })
    }

    pub fn decode(&mut self, bytes: &[u8]) -> AudioResult<ArenaBuffer> {
        let plan = wav::plan_decode(bytes)?;
        let out = self.arena.claim_samples(plan.shape.total_samples())?;
        wav::decode_into(bytes, &plan, self.config.layout, out);
        Ok(ArenaBuffer {
            generation: self.arena.generation(),
            shape: plan.shape,
        })
    }

    // ── Transforms ──────────────────────────────────────────────────────

    /// Render any transform into the arena.
    pub fn run<T: Transform>(&mut self, transform: &T) -> AudioResult<ArenaBuffer> {
        let shape = transform.output_shape()?;
        let out = self.arena.claim_samples(shape.sample_count()?)?;
        transform.render_into(&shape, out);
        debug!(
            "{}: {} frames x {} ch @ {} Hz into arena",
            transform.name(),
            shape.length,
            shape.channels,
            shape.sample_rate
        );
        Ok(ArenaBuffer {
            generation: self.arena.generation(),
            shape,
        })
    }

    pub fn slice(
        &mut self,
        source: AudioBufferRef<'_>,
        start: usize,
        length: usize,
    ) -> AudioResult<ArenaBuffer> {
        self.run(&Slice {
            source,
            start,
            length,
        })
    }

    pub fn merge(&mut self, buffers: &[AudioBufferRef<'_>]) -> AudioResult<ArenaBuffer> {
        self.run(&Merge { buffers })
    }

    pub fn resample(
        &mut self,
        source: AudioBufferRef<'_>,
        target_rate: u32,
    ) -> AudioResult<ArenaBuffer> {
        self.run(&Resample {
            source,
            target_rate,
        })
    }

    pub fn scale_volume(
        &mut self,
        source: AudioBufferRef<'_>,
        factor: f32,
    ) -> AudioResult<ArenaBuffer> {
        self.run(&Gain { source, factor })
    }

    pub fn crossfade(
        &mut self,
        a: AudioBufferRef<'_>,
        b: AudioBufferRef<'_>,
        fade_length: usize,
    ) -> AudioResult<ArenaBuffer> {
        self.run(&Crossfade { a, b, fade_length })
    }

    // ── Reading results ─────────────────────────────────────────────────

    fn check(&self, generation: u64) -> AudioResult<()> {
        if generation != self.arena.generation() {
            return Err(AudioError::StaleHandle {
                handle: generation,
                current: self.arena.generation(),
            });
        }
        Ok(())
    }

    /// Borrow a float result. Fails once the arena has been overwritten.
    pub fn read(&self, handle: &ArenaBuffer) -> AudioResult<AudioBufferRef<'_>> {
        self.check(handle.generation)?;
        let data = self.arena.samples(handle.shape.total_samples());
        Ok(AudioBufferRef::from_parts(handle.shape, data))
    }

    /// Copy a float result out of the arena.
    pub fn take(&self, handle: &ArenaBuffer) -> AudioResult<AudioBuffer> {
        Ok(self.read(handle)?.to_owned())
    }

    /// Borrow a WAV result.
    pub fn wav_bytes(&self, handle: &ArenaBytes) -> AudioResult<&[u8]> {
        self.check(handle.generation)?;
        Ok(self.arena.bytes())
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            arena: ScratchArena::new(),
            config: ProcessorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform;
    use crate::wav::PcmLayout;

    fn stereo() -> AudioBuffer {
        AudioBuffer::new(
            vec![0.5, -0.5, 0.5, -0.5, 0.25, 0.75, -0.25, -0.75],
            4,
            2,
            8000,
        )
        .unwrap()
    }

    #[test]
    fn test_encode_sets_buffer_size() {
        let mut processor = Processor::default();
        let input = stereo();
        let wav = processor.encode(input.view()).unwrap();
        assert_eq!(wav.len(), 60);
        assert_eq!(processor.buffer_size(), 60);
        assert_eq!(&processor.wav_bytes(&wav).unwrap()[..4], b"RIFF");
    }

    #[test]
    fn test_decode_into_arena() {
        let input = stereo();
        let bytes = wav::encode(input.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();

        let mut processor = Processor::default();
        let handle = processor.decode(&bytes).unwrap();
        assert_eq!(handle.shape(), input.shape());
        assert_eq!(processor.buffer_size(), 4 * 2 * 4);

        let decoded = processor.read(&handle).unwrap();
        for (a, b) in decoded.samples().iter().zip(input.samples()) {
            assert!((a - b).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn test_matches_owned_transforms() {
        let input = stereo();
        let mut processor = Processor::default();

        let handle = processor.slice(input.view(), 1, 2).unwrap();
        assert_eq!(
            processor.take(&handle).unwrap(),
            transform::slice(input.view(), 1, 2).unwrap()
        );

        let handle = processor.resample(input.view(), 16000).unwrap();
        assert_eq!(
            processor.take(&handle).unwrap(),
            transform::resample(input.view(), 16000).unwrap()
        );

        let handle = processor.crossfade(input.view(), input.view(), 2).unwrap();
        assert_eq!(processor.take(&handle).unwrap().len(), 6);

        let handle = processor.scale_volume(input.view(), 3.0).unwrap();
        assert_eq!(
            processor.read(&handle).unwrap().channel(0),
            &[1.0, -1.0, 1.0, -1.0]
        );
    }

    #[test]
    fn test_previous_handle_goes_stale() {
        let input = stereo();
        let mut processor = Processor::default();

        let first = processor.merge(&[input.view(), input.view()]).unwrap();
        let kept = processor.take(&first).unwrap();
        let second = processor.slice(kept.view(), 0, 1).unwrap();

        assert!(matches!(
            processor.read(&first),
            Err(AudioError::StaleHandle { .. })
        ));
        assert!(processor.read(&second).is_ok());
        assert_eq!(kept.len(), 8);
    }

    #[test]
    fn test_allocation_failure_keeps_previous_result() {
        let input = stereo();
        let config = ProcessorConfig::default().with_max_capacity(64);
        let mut processor = Processor::new(config).unwrap();

        let small = processor.slice(input.view(), 0, 2).unwrap();
        let used = processor.buffer_size();

        let err = processor
            .merge(&[input.view(), input.view(), input.view()])
            .unwrap_err();
        assert!(matches!(err, AudioError::AllocationFailed { .. }));
        assert_eq!(processor.buffer_size(), used);
        assert_eq!(
            processor.take(&small).unwrap(),
            transform::slice(input.view(), 0, 2).unwrap()
        );
    }

    #[test]
    fn test_init_memory_and_cleanup() {
        let input = stereo();
        let mut processor = Processor::default();

        assert_eq!(processor.init_memory(1024).unwrap(), 1024);
        assert!(!processor.memory_ptr().is_null());
        let wav = processor.encode(input.view()).unwrap();
        assert_eq!(processor.arena().capacity(), 1024);

        processor.cleanup();
        processor.cleanup();
        assert_eq!(processor.buffer_size(), 0);
        assert!(processor.memory_ptr().is_null());
        assert!(processor.wav_bytes(&wav).is_err());

        // Usable again after teardown.
        assert!(processor.encode(input.view()).is_ok());
    }

    #[test]
    fn test_configured_bit_depth() {
        let config = ProcessorConfig::default().with_bits_per_sample(BitDepth::TwentyFour);
        let mut processor = Processor::new(config).unwrap();
        let wav = processor.encode(stereo().view()).unwrap();
        assert_eq!(wav.len(), 44 + 4 * 2 * 3);
    }
}
