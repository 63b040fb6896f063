//! Feature extraction
//!
//! Fixed-geometry log-mel spectrograms matching the classifier's training
//! pipeline.

mod mel;

pub use mel::{FeatureConfig, FeatureExtractor, MelSpectrogram};
