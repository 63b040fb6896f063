//! Audio ingestion
//!
//! - File and byte-buffer decoding (WAV, MP3, FLAC, OGG, WebM)
//! - Stereo-to-mono downmix
//! - Sample rate conversion to the classifier's training rate
//! - ffmpeg transcode fallback for containers symphonia cannot open

mod loader;
mod resampler;
mod transcode;

pub use loader::AudioLoader;
pub use transcode::ffmpeg_available;

/// Mono audio samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the waveform in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}
