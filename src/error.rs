// src/error.rs
//
// Error taxonomy shared by the codec, the transforms and the arena.

/// Error raised by a codec, transform or arena operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The arena could not grow to the requested size.
    AllocationFailed {
        requested: usize,
        limit: Option<usize>,
    },

    /// WAV input is shorter than the 44-byte canonical header.
    TooShort { len: usize },

    /// A RIFF/WAVE/fmt tag did not match.
    BadTag { expected: [u8; 4], found: [u8; 4] },

    /// Audio format code other than PCM (1).
    UnsupportedFormat(u16),

    /// Bit depth other than 16 or 24.
    UnsupportedBitDepth(u16),

    /// Channel count of zero, or more than a WAV header can describe.
    InvalidChannels(u16),

    /// Channel index past the buffer's channel count.
    ChannelOutOfRange { channel: usize, channels: usize },

    /// Sample rate of zero.
    InvalidSampleRate(u32),

    /// Sample storage holds fewer values than `length * channels`.
    StorageTooSmall { needed: usize, available: usize },

    /// A merge input disagrees with the first buffer's format.
    FormatMismatch {
        index: usize,
        expected_channels: usize,
        found_channels: usize,
        expected_rate: u32,
        found_rate: u32,
    },

    /// Merge called with no buffers.
    NothingToMerge,

    /// Two-input operation on buffers with different channel counts.
    ChannelMismatch { left: usize, right: usize },

    /// Fade region longer than one of the inputs.
    FadeTooLong {
        fade: usize,
        left: usize,
        right: usize,
    },

    /// Handle refers to an arena generation that has been overwritten.
    StaleHandle { handle: u64, current: u64 },
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::AllocationFailed { requested, limit } => match limit {
                Some(limit) => write!(
                    f,
                    "Cannot allocate {} bytes (arena limit {} bytes)",
                    requested, limit
                ),
                None => write!(f, "Cannot allocate {} bytes", requested),
            },
            AudioError::TooShort { len } => {
                write!(f, "WAV data is {} bytes, header needs 44", len)
            }
            AudioError::BadTag { expected, found } => write!(
                f,
                "Expected tag {:?}, found {:?}",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(found)
            ),
            AudioError::UnsupportedFormat(code) => {
                write!(f, "Unsupported audio format code {}", code)
            }
            AudioError::UnsupportedBitDepth(bits) => {
                write!(f, "Unsupported bit depth {}", bits)
            }
            AudioError::InvalidChannels(channels) => {
                write!(f, "Invalid channel count {}", channels)
            }
            AudioError::ChannelOutOfRange { channel, channels } => write!(
                f,
                "Channel {} out of range for a {}-channel buffer",
                channel, channels
            ),
            AudioError::InvalidSampleRate(rate) => write!(f, "Invalid sample rate {}", rate),
            AudioError::StorageTooSmall { needed, available } => write!(
                f,
                "Buffer needs {} samples but storage holds {}",
                needed, available
            ),
            AudioError::FormatMismatch {
                index,
                expected_channels,
                found_channels,
                expected_rate,
                found_rate,
            } => write!(
                f,
                "Buffer {} is {} ch @ {} Hz, expected {} ch @ {} Hz",
                index, found_channels, found_rate, expected_channels, expected_rate
            ),
            AudioError::NothingToMerge => write!(f, "No buffers to merge"),
            AudioError::ChannelMismatch { left, right } => {
                write!(f, "Channel mismatch: {} vs {}", left, right)
            }
            AudioError::FadeTooLong { fade, left, right } => write!(
                f,
                "Fade of {} samples exceeds input lengths {} / {}",
                fade, left, right
            ),
            AudioError::StaleHandle { handle, current } => write!(
                f,
                "Handle from generation {} is stale (arena at generation {})",
                handle, current
            ),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result of a codec, transform or arena operation.
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_bad_tag() {
        let err = AudioError::BadTag {
            expected: *b"RIFF",
            found: *b"RIFX",
        };
        assert_eq!(err.to_string(), "Expected tag \"RIFF\", found \"RIFX\"");
    }

    #[test]
    fn test_display_channel_out_of_range() {
        let err = AudioError::ChannelOutOfRange {
            channel: 3,
            channels: 2,
        };
        assert_eq!(err.to_string(), "Channel 3 out of range for a 2-channel buffer");
    }

    #[test]
    fn test_display_allocation_limit() {
        let err = AudioError::AllocationFailed {
            requested: 4096,
            limit: Some(1024),
        };
        assert_eq!(
            err.to_string(),
            "Cannot allocate 4096 bytes (arena limit 1024 bytes)"
        );
    }
}
