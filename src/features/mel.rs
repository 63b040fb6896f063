//! Log-mel spectrogram features
//!
//! Turns a mono waveform into the fixed-size spectrogram image the CNN was
//! trained on: power mel spectrogram converted to decibels, clipped or
//! zero-padded to a fixed duration.

use std::f32::consts::PI;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::error::{Result, WildearError};

/// dB floor relative to the loudest bin, matching librosa's `top_db`.
const TOP_DB: f32 = 80.0;
/// Power floor before taking the logarithm.
const AMIN: f32 = 1e-10;

/// Spectrogram parameters. These are training-time constants; changing them
/// without retraining the model produces garbage predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Sample rate audio is resampled to before analysis
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// FFT size
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    /// Hop between frames
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Analysis window length
    #[serde(default = "default_win_length")]
    pub win_length: usize,
    /// Number of mel bands
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    /// Lowest filterbank frequency in Hz
    #[serde(default)]
    pub fmin: f32,
    /// Highest filterbank frequency in Hz (None = Nyquist)
    #[serde(default)]
    pub fmax: Option<f32>,
    /// Fixed clip duration the network expects
    #[serde(default = "default_clip_seconds")]
    pub clip_seconds: f32,
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_n_fft() -> usize {
    2048
}

fn default_hop_length() -> usize {
    512
}

fn default_win_length() -> usize {
    2048
}

fn default_n_mels() -> usize {
    128
}

fn default_clip_seconds() -> f32 {
    5.0
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            win_length: default_win_length(),
            n_mels: default_n_mels(),
            fmin: 0.0,
            fmax: None,
            clip_seconds: default_clip_seconds(),
        }
    }
}

impl FeatureConfig {
    /// Samples in one fixed-duration clip.
    pub fn clip_samples(&self) -> usize {
        (self.clip_seconds * self.sample_rate as f32) as usize
    }

    /// Frames produced by a centered STFT over one clip.
    pub fn frames_per_clip(&self) -> usize {
        self.clip_samples() / self.hop_length + 1
    }
}

/// Mel spectrogram computer over precomputed window, filterbank and FFT plan.
pub struct MelSpectrogram {
    n_fft: usize,
    hop_length: usize,
    win_length: usize,
    n_mels: usize,
    mel_filters: Vec<Vec<f32>>,
    window: Vec<f32>,
    fft: Arc<dyn rustfft::Fft<f32>>,
}

impl MelSpectrogram {
    pub fn new(config: &FeatureConfig) -> Self {
        let window = Self::hann_window(config.win_length);
        let fmax = config.fmax.unwrap_or(config.sample_rate as f32 / 2.0);
        let mel_filters = Self::mel_filterbank(
            config.n_fft,
            config.n_mels,
            config.sample_rate,
            config.fmin,
            fmax,
        );

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        Self {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            win_length: config.win_length,
            n_mels: config.n_mels,
            mel_filters,
            window,
            fft,
        }
    }

    /// Compute the dB-scaled mel spectrogram, shape `[n_mels][n_frames]`.
    pub fn compute(&self, audio: &[f32]) -> Result<Vec<Vec<f32>>> {
        if audio.is_empty() {
            return Err(WildearError::feature("cannot analyze empty audio"));
        }

        let stft = self.stft(audio);
        let power_spec = Self::power_spectrum(&stft);
        let mel_spec = self.apply_mel_filters(&power_spec);
        Ok(Self::power_to_db(&mel_spec))
    }

    /// Short-time Fourier transform with reflect-padded, centered frames.
    /// Output is `[n_frames][n_fft / 2 + 1]`.
    fn stft(&self, audio: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let pad_len = self.n_fft / 2;
        let mut padded = vec![0.0f32; audio.len() + 2 * pad_len];
        padded[pad_len..pad_len + audio.len()].copy_from_slice(audio);

        // Reflect padding at boundaries
        for i in 0..pad_len {
            padded[pad_len - 1 - i] = audio[(i + 1).min(audio.len() - 1)];
            padded[pad_len + audio.len() + i] =
                audio[audio.len().saturating_sub(i + 2).min(audio.len() - 1)];
        }

        let num_frames = (padded.len() - self.n_fft) / self.hop_length + 1;
        let mut stft_frames = Vec::with_capacity(num_frames);

        let mut frame_buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.n_fft];

        for i in 0..num_frames {
            let start = i * self.hop_length;

            for j in 0..self.n_fft {
                let sample = padded.get(start + j).copied().unwrap_or(0.0);
                let window_val = if j < self.win_length {
                    self.window[j]
                } else {
                    0.0
                };
                frame_buffer[j] = Complex::new(sample * window_val, 0.0);
            }

            self.fft.process(&mut frame_buffer);

            // Keep only positive frequencies
            stft_frames.push(frame_buffer[..self.n_fft / 2 + 1].to_vec());
        }

        stft_frames
    }

    /// Power spectrum |z|^2 per bin.
    fn power_spectrum(stft: &[Vec<Complex<f32>>]) -> Vec<Vec<f32>> {
        stft.iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Apply the filterbank, transposing to `[n_mels][n_frames]`.
    fn apply_mel_filters(&self, power_spec: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let n_frames = power_spec.len();
        let mut mel = vec![vec![0.0f32; n_frames]; self.n_mels];

        for (m, filter) in self.mel_filters.iter().enumerate() {
            for (t, frame) in power_spec.iter().enumerate() {
                mel[m][t] = filter
                    .iter()
                    .zip(frame.iter())
                    .map(|(f, p)| f * p)
                    .sum::<f32>();
            }
        }

        mel
    }

    /// Convert power values to decibels relative to the spectrogram peak,
    /// floored `TOP_DB` below it.
    fn power_to_db(mel_spec: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let peak = mel_spec
            .iter()
            .flat_map(|row| row.iter().copied())
            .fold(AMIN, f32::max);
        let ref_db = 10.0 * peak.log10();

        mel_spec
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&p| (10.0 * p.max(AMIN).log10() - ref_db).max(-TOP_DB))
                    .collect()
            })
            .collect()
    }

    /// Hann window (periodic variant for STFT)
    fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
            .collect()
    }

    /// Hz to mel (HTK formula)
    fn hz_to_mel(hz: f32) -> f32 {
        2595.0 * (1.0 + hz / 700.0).log10()
    }

    /// Mel to Hz (HTK formula)
    fn mel_to_hz(mel: f32) -> f32 {
        700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
    }

    /// Triangular mel filterbank, each filter normalized to unit weight sum.
    fn mel_filterbank(n_fft: usize, n_mels: usize, sr: u32, fmin: f32, fmax: f32) -> Vec<Vec<f32>> {
        let n_freqs = n_fft / 2 + 1;
        let freq_bins: Vec<f32> = (0..n_freqs)
            .map(|i| i as f32 * sr as f32 / n_fft as f32)
            .collect();

        let mel_min = Self::hz_to_mel(fmin);
        let mel_max = Self::hz_to_mel(fmax);

        let mel_points: Vec<f32> = (0..=n_mels + 1)
            .map(|i| Self::mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let mut filters = vec![vec![0.0; n_freqs]; n_mels];

        for i in 0..n_mels {
            let left = mel_points[i];
            let center = mel_points[i + 1];
            let right = mel_points[i + 2];

            for (j, &freq) in freq_bins.iter().enumerate() {
                if freq >= left && freq < center {
                    filters[i][j] = (freq - left) / (center - left);
                } else if freq >= center && freq <= right {
                    filters[i][j] = (right - freq) / (right - center);
                }
            }

            let sum: f32 = filters[i].iter().sum();
            if sum > 0.0 {
                for val in filters[i].iter_mut() {
                    *val /= sum;
                }
            }
        }

        filters
    }
}

/// Produces the `(1, 1, n_mels, n_frames)` input tensor for the classifier.
pub struct FeatureExtractor {
    config: FeatureConfig,
    mel: MelSpectrogram,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        let mel = MelSpectrogram::new(&config);
        Self { config, mel }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the network input from a waveform.
    ///
    /// The waveform must already be at the configured sample rate; the clip
    /// is truncated or zero-padded to the fixed duration before analysis.
    pub fn extract(&self, waveform: &Waveform, device: &Device) -> Result<Tensor> {
        if waveform.sample_rate != self.config.sample_rate {
            return Err(WildearError::feature(format!(
                "waveform at {} Hz, expected {} Hz",
                waveform.sample_rate, self.config.sample_rate
            )));
        }
        if waveform.samples.is_empty() {
            return Err(WildearError::feature("cannot analyze empty audio"));
        }

        let clip = self.fix_length(&waveform.samples);
        let mel = self.mel.compute(&clip)?;

        let n_mels = self.config.n_mels;
        let n_frames = self.config.frames_per_clip();
        if mel.len() != n_mels || mel.first().map_or(0, Vec::len) != n_frames {
            return Err(WildearError::Shape {
                expected: format!("{}x{}", n_mels, n_frames),
                actual: format!("{}x{}", mel.len(), mel.first().map_or(0, Vec::len)),
            });
        }

        let mut flat = Vec::with_capacity(n_mels * n_frames);
        for row in &mel {
            flat.extend_from_slice(row);
        }

        let tensor = Tensor::from_vec(flat, (1, 1, n_mels, n_frames), device)?;
        Ok(tensor)
    }

    /// Truncate or zero-pad to exactly one clip length.
    fn fix_length(&self, samples: &[f32]) -> Vec<f32> {
        let target = self.config.clip_samples();
        let mut clip = samples.to_vec();
        clip.resize(target, 0.0);
        clip
    }
}
