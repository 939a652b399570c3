// src/main.rs
//
// Demo: build two tones, join them with a crossfade, resample, and write
// the result as a standard (interleaved) 16-bit WAV.
//
//     wavbuf-engine [output.wav]

use std::f32::consts::PI;

use wavbuf::{AudioBuffer, BitDepth, PcmLayout, Processor, ProcessorConfig, wav};

const SAMPLE_RATE: u32 = 48_000;
const TARGET_RATE: u32 = 16_000;
const TONE_FRAMES: usize = 24_000;
const FADE_FRAMES: usize = 4_800;

/// Stereo sine, slightly quieter on the right.
fn tone(freq: f32) -> AudioBuffer {
    let mut data = Vec::with_capacity(TONE_FRAMES * 2);
    for gain in [0.5f32, 0.4] {
        for i in 0..TONE_FRAMES {
            let t = i as f32 / SAMPLE_RATE as f32;
            data.push((t * freq * 2.0 * PI).sin() * gain);
        }
    }
    AudioBuffer::new(data, TONE_FRAMES, 2, SAMPLE_RATE).expect("tone shape is valid")
}

fn main() {
    let output = std::env::args().nth(1);

    let config = ProcessorConfig::default().with_layout(PcmLayout::Interleaved);
    let mut processor = Processor::new(config).expect("default processor");

    let a = tone(440.0);
    let b = tone(660.0);

    // Copy each result out before the next call reuses the arena.
    let joined = processor
        .crossfade(a.view(), b.view(), FADE_FRAMES)
        .and_then(|h| processor.take(&h))
        .expect("crossfade");
    let resampled = processor
        .resample(joined.view(), TARGET_RATE)
        .and_then(|h| processor.take(&h))
        .expect("resample");
    let wav = processor.encode(resampled.view()).expect("encode");

    println!(
        "crossfaded {} + {} frames -> {} frames @ {} Hz",
        a.len(),
        b.len(),
        joined.len(),
        joined.sample_rate()
    );
    println!(
        "resampled to {} frames @ {} Hz ({:.3} s)",
        resampled.len(),
        resampled.sample_rate(),
        resampled.duration_secs()
    );
    println!("encoded {} bytes of WAV", wav.len());

    let bytes = processor.wav_bytes(&wav).expect("fresh handle");
    let header = wav::WavHeader::parse(bytes).expect("valid header");
    println!("{:?}", header);

    if let Some(path) = output {
        match std::fs::write(&path, bytes) {
            Ok(()) => println!("wrote {}", path),
            Err(e) => eprintln!("failed to write {}: {}", path, e),
        }
    } else {
        // Round-trip check without touching the filesystem.
        let decoded = wav::decode(bytes, PcmLayout::Interleaved).expect("decode");
        println!(
            "decoded back {} frames x {} ch at {}-bit",
            decoded.len(),
            decoded.channels(),
            BitDepth::Sixteen.bits()
        );
    }
}
