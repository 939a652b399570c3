// src/lib.rs
//
// Library entry point for Rust, C/Swift (ffi) and browser (wasm) consumers.

mod arena;
mod audio_buffer;
mod config;
mod error;
mod processor;
pub mod transform;
pub mod wav;

pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;


// Re-export key types for Rust consumers
pub use arena::ScratchArena;
pub use audio_buffer::{AudioBuffer, AudioBufferRef, BufferShape};
pub use config::ProcessorConfig;
pub use error::{AudioError, AudioResult};
pub use processor::{ArenaBuffer, ArenaBytes, Processor};
pub use transform::{Transform, crossfade, merge, resample, scale_volume, slice};
pub use wav::{BitDepth, PcmLayout, WavHeader};
