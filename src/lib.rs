//! # Wildear - Wildlife Sound Identification
//!
//! Identifies animal species from short field recordings using a
//! convolutional network over log-mel spectrograms.
//!
//! ## Features
//!
//! - **Broad format support**: WAV decoded natively, compressed formats via
//!   Symphonia with an ffmpeg fallback for anything exotic
//! - **Fixed-length analysis windows**: clips are resampled, downmixed and
//!   padded or truncated to a uniform spectrogram before inference
//! - **ResNet-50 backbone**: single-channel variant loaded from safetensors
//!   or PyTorch checkpoints via Candle
//! - **Web front-end**: upload form plus an in-browser recorder posting
//!   base64 clips as JSON
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use candle_core::Device;
//! use wildear::{FeatureConfig, Predictor};
//!
//! let predictor = Predictor::from_files(
//!     "model/sound_model.safetensors",
//!     "model/labels.json",
//!     FeatureConfig::default(),
//!     Device::Cpu,
//! )?;
//!
//! let prediction = predictor.predict_file("meadow_morning.wav")?;
//! println!("{}", prediction.display_text());
//! ```
//!
//! ## Serving
//!
//! ```rust,ignore
//! use wildear::{AppConfig, Server};
//!
//! let server = Server::new(config, predictor);
//! server.run().await?;
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod labels;
pub mod model;
pub mod server;

// Re-exports for convenience
pub use audio::{AudioLoader, Waveform};
pub use config::AppConfig;
pub use error::{Result, WildearError};
pub use features::{FeatureConfig, FeatureExtractor};
pub use inference::{Prediction, Predictor};
pub use labels::LabelSet;
pub use model::{SpeciesClassifier, NUM_CLASSES};
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate every clip is resampled to before analysis (22050 Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
