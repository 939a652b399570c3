// src/wav.rs
//
// Canonical 44-byte-header PCM WAV codec.
//
// Floats are clamped to [-1.0, 1.0] and scaled asymmetrically: negative
// values by 2^(bits-1), non-negative by 2^(bits-1) - 1. Decoding divides by
// the same factors, so a round trip is range-consistent but not bit-exact.

use log::{debug, warn};

use crate::arena::try_zeroed;
use crate::audio_buffer::{AudioBuffer, AudioBufferRef, BufferShape};
use crate::error::{AudioError, AudioResult};

/// Size of the canonical header.
pub const HEADER_LEN: usize = 44;

const FMT_CHUNK_LEN: u32 = 16;
const PCM_FORMAT: u16 = 1;

/// Supported PCM bit depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Sixteen = 16,
    TwentyFour = 24,
}

impl BitDepth {
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }

    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// Scale for negative samples (2^(bits-1)).
    #[inline]
    fn negative_scale(self) -> f32 {
        match self {
            BitDepth::Sixteen => 32768.0,
            BitDepth::TwentyFour => 8_388_608.0,
        }
    }

    /// Scale for non-negative samples (2^(bits-1) - 1).
    #[inline]
    fn positive_scale(self) -> f32 {
        match self {
            BitDepth::Sixteen => 32767.0,
            BitDepth::TwentyFour => 8_388_607.0,
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = AudioError;

    fn try_from(bits: u16) -> AudioResult<Self> {
        match bits {
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            other => Err(AudioError::UnsupportedBitDepth(other)),
        }
    }
}

/// Order of PCM samples inside the data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PcmLayout {
    /// Same order as the float buffer: all of channel 0, then channel 1.
    #[default]
    Planar,
    /// Frame order (ch0, ch1, ch0, ch1, ..), what standard players expect.
    Interleaved,
}

impl PcmLayout {
    #[inline]
    fn index(self, ch: usize, frame: usize, shape: &BufferShape) -> usize {
        match self {
            PcmLayout::Planar => ch * shape.length + frame,
            PcmLayout::Interleaved => frame * shape.channels + ch,
        }
    }
}

/// Convert one float sample to a signed PCM integer.
#[inline]
pub fn float_to_pcm(sample: f32, depth: BitDepth) -> i32 {
    let sample = sample.clamp(-1.0, 1.0);
    if sample < 0.0 {
        (sample * depth.negative_scale()) as i32
    } else {
        (sample * depth.positive_scale()) as i32
    }
}

/// Convert one signed PCM integer back to a float sample.
#[inline]
pub fn pcm_to_float(value: i32, depth: BitDepth) -> f32 {
    if value < 0 {
        value as f32 / depth.negative_scale()
    } else {
        value as f32 / depth.positive_scale()
    }
}

/// The 44-byte canonical header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Total size minus 8.
    pub file_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Header for `length` frames of PCM with all derived fields filled in.
    pub fn for_pcm(shape: &BufferShape, depth: BitDepth) -> AudioResult<Self> {
        let block_align = shape.channels * depth.bytes_per_sample();
        let data_size = shape.length as u64 * block_align as u64;
        let total = HEADER_LEN as u64 + data_size;
        if total > u32::MAX as u64 || block_align > u16::MAX as usize {
            return Err(AudioError::AllocationFailed {
                requested: total.min(usize::MAX as u64) as usize,
                limit: Some(u32::MAX as usize),
            });
        }

        Ok(Self {
            file_size: total as u32 - 8,
            audio_format: PCM_FORMAT,
            num_channels: shape.channels as u16,
            sample_rate: shape.sample_rate,
            byte_rate: shape.sample_rate.wrapping_mul(block_align as u32),
            block_align: block_align as u16,
            bits_per_sample: depth.bits(),
            data_size: data_size as u32,
        })
    }

    /// Read and validate the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> AudioResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AudioError::TooShort { len: bytes.len() });
        }
        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;

        let header = Self {
            file_size: read_u32(bytes, 4),
            audio_format: read_u16(bytes, 20),
            num_channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            byte_rate: read_u32(bytes, 28),
            block_align: read_u16(bytes, 32),
            bits_per_sample: read_u16(bytes, 34),
            data_size: read_u32(bytes, 40),
        };

        if header.audio_format != PCM_FORMAT {
            return Err(AudioError::UnsupportedFormat(header.audio_format));
        }
        if header.num_channels == 0 {
            return Err(AudioError::InvalidChannels(0));
        }
        if header.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(0));
        }
        BitDepth::try_from(header.bits_per_sample)?;

        Ok(header)
    }

    #[inline]
    pub fn bit_depth(&self) -> AudioResult<BitDepth> {
        BitDepth::try_from(self.bits_per_sample)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.num_channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }
}

fn expect_tag(bytes: &[u8], at: usize, expected: &[u8; 4]) -> AudioResult<()> {
    let mut found = [0u8; 4];
    found.copy_from_slice(&bytes[at..at + 4]);
    if &found != expected {
        warn!(
            "Rejecting WAV: expected {:?} at offset {}",
            String::from_utf8_lossy(expected),
            at
        );
        return Err(AudioError::BadTag {
            expected: *expected,
            found,
        });
    }
    Ok(())
}

#[inline]
fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

// ───────────────────────────────────────────────────────────────────────────
// Encoding
// ───────────────────────────────────────────────────────────────────────────

/// Total WAV byte length for a buffer of `shape` at `depth`.
pub fn encoded_len(shape: &BufferShape, depth: BitDepth) -> AudioResult<usize> {
    let header = WavHeader::for_pcm(shape, depth)?;
    Ok(HEADER_LEN + header.data_size as usize)
}

/// Encode a planar buffer into a freshly allocated WAV byte stream.
pub fn encode(buffer: AudioBufferRef<'_>, depth: BitDepth, layout: PcmLayout) -> AudioResult<Vec<u8>> {
    let mut out = try_zeroed::<u8>(encoded_len(&buffer.shape(), depth)?)?;
    encode_into(buffer, depth, layout, &mut out)?;
    Ok(out)
}

/// Encode into `out`, which must be exactly `encoded_len` bytes.
pub(crate) fn encode_into(
    buffer: AudioBufferRef<'_>,
    depth: BitDepth,
    layout: PcmLayout,
    out: &mut [u8],
) -> AudioResult<()> {
    let shape = buffer.shape();
    let header = WavHeader::for_pcm(&shape, depth)?;
    debug_assert_eq!(out.len(), HEADER_LEN + header.data_size as usize);

    out[..HEADER_LEN].copy_from_slice(&header.to_bytes());
    let pcm = &mut out[HEADER_LEN..];
    let width = depth.bytes_per_sample();

    for ch in 0..shape.channels {
        for (frame, &sample) in buffer.channel(ch).iter().enumerate() {
            let at = layout.index(ch, frame, &shape) * width;
            let value = float_to_pcm(sample, depth);
            match depth {
                BitDepth::Sixteen => {
                    pcm[at..at + 2].copy_from_slice(&(value as i16).to_le_bytes());
                }
                BitDepth::TwentyFour => {
                    pcm[at..at + 3].copy_from_slice(&value.to_le_bytes()[..3]);
                }
            }
        }
    }

    debug!(
        "Encoded {} frames x {} ch @ {} Hz as {}-bit WAV ({} bytes)",
        shape.length,
        shape.channels,
        shape.sample_rate,
        depth.bits(),
        out.len()
    );
    Ok(())
}

// ───────────────────────────────────────────────────────────────────────────
// Decoding
// ───────────────────────────────────────────────────────────────────────────

/// Parsed header plus where the PCM payload lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodePlan {
    pub header: WavHeader,
    pub depth: BitDepth,
    pub shape: BufferShape,
    pub data_offset: usize,
}

/// Locate the data chunk. Canonical files have it at byte 36; otherwise
/// walk the chunk list after `WAVE`.
fn locate_data(bytes: &[u8], header: &WavHeader) -> (usize, usize) {
    if &bytes[36..40] == b"data" {
        return (HEADER_LEN, header.data_size as usize);
    }

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let size = read_u32(bytes, pos + 4) as usize;
        if &bytes[pos..pos + 4] == b"data" {
            return (pos + 8, size);
        }
        pos = pos.saturating_add(8).saturating_add(size);
        if size % 2 == 1 {
            pos = pos.saturating_add(1);
        }
    }

    warn!("No data chunk found, reading PCM after the 44-byte header");
    (HEADER_LEN, header.data_size as usize)
}

pub(crate) fn plan_decode(bytes: &[u8]) -> AudioResult<DecodePlan> {
    let header = WavHeader::parse(bytes)?;
    let depth = header.bit_depth()?;
    let (data_offset, data_size) = locate_data(bytes, &header);

    let block_align = header.num_channels as usize * depth.bytes_per_sample();
    let declared = data_size / block_align;
    let available = bytes.len().saturating_sub(data_offset) / block_align;
    if declared > available {
        warn!(
            "WAV declares {} frames but only {} are present, truncating",
            declared, available
        );
    }

    Ok(DecodePlan {
        header,
        depth,
        shape: BufferShape::new(
            declared.min(available),
            header.num_channels as usize,
            header.sample_rate,
        ),
        data_offset,
    })
}

/// Fill `out` (exactly `plan.shape.total_samples()` floats) from the payload.
pub(crate) fn decode_into(bytes: &[u8], plan: &DecodePlan, layout: PcmLayout, out: &mut [f32]) {
    let shape = plan.shape;
    let width = plan.depth.bytes_per_sample();
    let pcm = &bytes[plan.data_offset..];

    for ch in 0..shape.channels {
        let dst = &mut out[ch * shape.length..(ch + 1) * shape.length];
        for (frame, sample) in dst.iter_mut().enumerate() {
            let at = layout.index(ch, frame, &shape) * width;
            let value = match plan.depth {
                BitDepth::Sixteen => i16::from_le_bytes([pcm[at], pcm[at + 1]]) as i32,
                BitDepth::TwentyFour => {
                    pcm[at] as i32 | (pcm[at + 1] as i32) << 8 | ((pcm[at + 2] as i8) as i32) << 16
                }
            };
            *sample = pcm_to_float(value, plan.depth);
        }
    }

    debug!(
        "Decoded {} frames x {} ch @ {} Hz from {}-bit WAV",
        shape.length,
        shape.channels,
        shape.sample_rate,
        plan.header.bits_per_sample
    );
}

/// Decode a WAV byte stream into a freshly allocated planar buffer.
pub fn decode(bytes: &[u8], layout: PcmLayout) -> AudioResult<AudioBuffer> {
    let plan = plan_decode(bytes)?;
    let mut buffer = AudioBuffer::zeroed(plan.shape)?;
    decode_into(bytes, &plan, layout, buffer.samples_mut());
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STEP_16: f32 = 1.0 / 32767.0;

    fn alternating(length: usize, channels: usize) -> AudioBuffer {
        let data = (0..length * channels)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        AudioBuffer::new(data, length, channels, 8000).unwrap()
    }

    #[test]
    fn test_encode_stereo_16_bit_scenario() {
        let buffer = alternating(4, 2);
        let bytes = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();
        assert_eq!(bytes.len(), 60);

        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.num_channels, 2);
        assert_eq!(header.sample_rate, 8000);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_size, 16);
        assert_eq!(header.file_size, 52);
        assert_eq!(header.block_align, 4);
        assert_eq!(header.byte_rate, 32000);

        let decoded = decode(&bytes, PcmLayout::Planar).unwrap();
        assert_eq!(decoded.shape(), buffer.shape());
        for (a, b) in decoded.samples().iter().zip(buffer.samples()) {
            assert!((a - b).abs() <= STEP_16);
        }
    }

    #[test]
    fn test_header_bytes_layout() {
        let shape = BufferShape::new(10, 1, 44100);
        let bytes = WavHeader::for_pcm(&shape, BitDepth::TwentyFour)
            .unwrap()
            .to_bytes();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(read_u32(&bytes, 16), 16);
        assert_eq!(read_u16(&bytes, 20), 1);
        assert_eq!(read_u32(&bytes, 28), 44100 * 3);
        assert_eq!(read_u16(&bytes, 32), 3);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(&bytes, 40), 30);
    }

    #[test]
    fn test_asymmetric_scaling() {
        assert_eq!(float_to_pcm(-1.0, BitDepth::Sixteen), -32768);
        assert_eq!(float_to_pcm(1.0, BitDepth::Sixteen), 32767);
        assert_eq!(float_to_pcm(2.5, BitDepth::Sixteen), 32767);
        assert_eq!(float_to_pcm(-3.0, BitDepth::Sixteen), -32768);
        assert_eq!(float_to_pcm(-1.0, BitDepth::TwentyFour), -8_388_608);
        assert_eq!(float_to_pcm(1.0, BitDepth::TwentyFour), 8_388_607);

        assert_eq!(pcm_to_float(-32768, BitDepth::Sixteen), -1.0);
        assert_eq!(pcm_to_float(32767, BitDepth::Sixteen), 1.0);
        assert_eq!(pcm_to_float(-8_388_608, BitDepth::TwentyFour), -1.0);
        assert_eq!(pcm_to_float(8_388_607, BitDepth::TwentyFour), 1.0);
    }

    #[test]
    fn test_planar_pcm_order() {
        let buffer = AudioBuffer::new(vec![1.0, 1.0, -1.0, -1.0], 2, 2, 8000).unwrap();
        let bytes = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();
        let pcm: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, 32767, -32768, -32768]);
    }

    #[test]
    fn test_interleaved_pcm_order() {
        let buffer = AudioBuffer::new(vec![1.0, 1.0, -1.0, -1.0], 2, 2, 8000).unwrap();
        let bytes = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Interleaved).unwrap();
        let pcm: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, -32768, 32767, -32768]);

        let decoded = decode(&bytes, PcmLayout::Interleaved).unwrap();
        assert_eq!(decoded.channel(0), &[1.0, 1.0]);
        assert_eq!(decoded.channel(1), &[-1.0, -1.0]);
    }

    #[test]
    fn test_24_bit_roundtrip_and_sign_extension() {
        let buffer = AudioBuffer::new(vec![-0.25, 0.75, -1.0, 0.0], 4, 1, 48000).unwrap();
        let bytes = encode(buffer.view(), BitDepth::TwentyFour, PcmLayout::Planar).unwrap();
        assert_eq!(bytes.len(), 44 + 12);
        // -1.0 -> -8388608 -> 0x800000
        assert_eq!(&bytes[44 + 6..44 + 9], &[0x00, 0x00, 0x80]);

        let decoded = decode(&bytes, PcmLayout::Planar).unwrap();
        for (a, b) in decoded.samples().iter().zip(buffer.samples()) {
            assert!((a - b).abs() <= 1.0 / 8_388_607.0);
        }
        assert!(decoded.samples()[0] < 0.0);
    }

    #[test]
    fn test_decode_rejects_short_input() {
        assert_eq!(
            decode(&[0u8; 43], PcmLayout::Planar).unwrap_err(),
            AudioError::TooShort { len: 43 }
        );
    }

    #[test]
    fn test_decode_rejects_bad_tags() {
        let buffer = alternating(2, 1);
        let good = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();

        for (at, tag) in [(0, b"RIFF"), (8, b"WAVE"), (12, b"fmt ")] {
            let mut bad = good.clone();
            bad[at] = b'X';
            let mut found = *tag;
            found[0] = b'X';
            assert_eq!(
                decode(&bad, PcmLayout::Planar).unwrap_err(),
                AudioError::BadTag {
                    expected: *tag,
                    found
                }
            );
        }
    }

    #[test]
    fn test_decode_rejects_unsupported_formats() {
        let buffer = alternating(2, 1);
        let good = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();

        let mut float_format = good.clone();
        float_format[20] = 3;
        assert_eq!(
            decode(&float_format, PcmLayout::Planar).unwrap_err(),
            AudioError::UnsupportedFormat(3)
        );

        let mut eight_bit = good.clone();
        eight_bit[34] = 8;
        assert_eq!(
            decode(&eight_bit, PcmLayout::Planar).unwrap_err(),
            AudioError::UnsupportedBitDepth(8)
        );

        let mut no_channels = good;
        no_channels[22] = 0;
        assert_eq!(
            decode(&no_channels, PcmLayout::Planar).unwrap_err(),
            AudioError::InvalidChannels(0)
        );
    }

    #[test]
    fn test_decode_truncates_to_available_frames() {
        let buffer = alternating(8, 1);
        let bytes = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();
        // Drop the last frame and a half.
        let cut = &bytes[..bytes.len() - 3];
        let decoded = decode(cut, PcmLayout::Planar).unwrap();
        assert_eq!(decoded.len(), 6);
    }

    #[test]
    fn test_decode_finds_data_after_extra_chunk() {
        let buffer = AudioBuffer::new(vec![0.5, -0.5], 2, 1, 8000).unwrap();
        let canonical = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();

        let mut bytes = canonical[..36].to_vec();
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 0]);
        bytes.extend_from_slice(&canonical[36..]);

        let decoded = decode(&bytes, PcmLayout::Planar).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!((decoded.samples()[0] - 0.5).abs() <= STEP_16);
        assert_eq!(decoded.samples()[1], -0.5);
    }

    #[test]
    fn test_encode_empty_buffer() {
        let buffer = AudioBuffer::silence(0, 2, 8000).unwrap();
        let bytes = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let decoded = decode(&bytes, PcmLayout::Planar).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.channels(), 2);
    }

    proptest! {
        #[test]
        fn roundtrip_16_bit_within_one_step(
            samples in proptest::collection::vec(-1.0f32..=1.0, 1..64),
        ) {
            let len = samples.len();
            let buffer = AudioBuffer::new(samples, len, 1, 16000).unwrap();
            let bytes = encode(buffer.view(), BitDepth::Sixteen, PcmLayout::Planar).unwrap();
            let decoded = decode(&bytes, PcmLayout::Planar).unwrap();
            for (a, b) in decoded.samples().iter().zip(buffer.samples()) {
                prop_assert!((a - b).abs() <= STEP_16 * 1.001);
            }
        }
    }
}
