// src/config.rs
//
// Processor configuration shared by the Rust API, the C ABI and the
// wasm bindings.

use crate::wav::{BitDepth, PcmLayout};

// Default configuration
const DEFAULT_INITIAL_CAPACITY: usize = 0;

/// Configuration for a [`Processor`](crate::Processor) and its arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorConfig {
    /// Bytes reserved in the arena up front.
    pub initial_capacity: usize,
    /// Arena ceiling in bytes. Requests above it fail as allocation failures.
    pub max_capacity: Option<usize>,
    /// Bit depth used by `encode` when the caller does not pick one.
    pub bits_per_sample: BitDepth,
    /// PCM sample order inside the WAV data chunk.
    pub layout: PcmLayout,
}

impl ProcessorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_capacity(mut self, bytes: usize) -> Self {
        self.initial_capacity = bytes;
        self
    }

    pub fn with_max_capacity(mut self, bytes: usize) -> Self {
        self.max_capacity = Some(bytes);
        self
    }

    pub fn with_bits_per_sample(mut self, bits: BitDepth) -> Self {
        self.bits_per_sample = bits;
        self
    }

    pub fn with_layout(mut self, layout: PcmLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: None,
            bits_per_sample: BitDepth::Sixteen,
            layout: PcmLayout::Planar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.initial_capacity, 0);
        assert_eq!(config.max_capacity, None);
        assert_eq!(config.bits_per_sample, BitDepth::Sixteen);
        assert_eq!(config.layout, PcmLayout::Planar);
    }

    #[test]
    fn test_builder() {
        let config = ProcessorConfig::new()
            .with_initial_capacity(1024)
            .with_max_capacity(4096)
            .with_bits_per_sample(BitDepth::TwentyFour)
            .with_layout(PcmLayout::Interleaved);
        assert_eq!(config.initial_capacity, 1024);
        assert_eq!(config.max_capacity, Some(4096));
        assert_eq!(config.bits_per_sample, BitDepth::TwentyFour);
        assert_eq!(config.layout, PcmLayout::Interleaved);
    }
}
