//! Inference pipeline
//!
//! The complete audio-to-species path behind both the HTTP handlers and the
//! command line.

mod predictor;

pub use predictor::{Prediction, Predictor};
