//! Prediction pipeline
//!
//! Owns the feature extractor, the classifier and the label set, and runs
//! the full decode → features → forward → label lookup chain. Everything in
//! here is immutable after construction, so one instance serves concurrent
//! requests without locking.

use std::path::Path;
use std::time::Instant;

use candle_core::Device;
use tracing::{debug, info};

use crate::audio::{AudioLoader, Waveform};
use crate::error::{Result, WildearError};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::labels::LabelSet;
use crate::model::SpeciesClassifier;

/// Result of classifying one clip.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub class_index: usize,
    /// Stored class name, underscores and all.
    pub label: String,
    /// Softmax probability of the winning class.
    pub score: f32,
}

impl Prediction {
    /// Human-readable species name.
    pub fn display_name(&self) -> String {
        self.label.replace('_', " ")
    }

    /// The line shown to users.
    pub fn display_text(&self) -> String {
        format!("Predicted Species: {}", self.display_name())
    }
}

/// End-to-end classifier over audio files and byte buffers.
pub struct Predictor {
    extractor: FeatureExtractor,
    classifier: SpeciesClassifier,
    labels: LabelSet,
}

impl Predictor {
    /// Assemble a predictor, enforcing that the label set matches the
    /// classifier head.
    pub fn new(
        classifier: SpeciesClassifier,
        labels: LabelSet,
        feature_config: FeatureConfig,
    ) -> Result<Self> {
        labels.validate_count(classifier.num_classes())?;
        Ok(Self {
            extractor: FeatureExtractor::new(feature_config),
            classifier,
            labels,
        })
    }

    /// Load model weights and labels from disk and assemble the pipeline.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        weights_path: P,
        labels_path: Q,
        feature_config: FeatureConfig,
        device: &Device,
    ) -> Result<Self> {
        let labels = LabelSet::load(labels_path)?;
        let classifier = SpeciesClassifier::load(weights_path, labels.len(), device)?;
        let predictor = Self::new(classifier, labels, feature_config)?;
        info!(
            num_classes = predictor.labels.len(),
            "Prediction pipeline ready"
        );
        Ok(predictor)
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.classifier.num_classes()
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        self.extractor.config()
    }

    /// Classify an audio file on disk.
    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<Prediction> {
        let path = path.as_ref();
        let waveform = AudioLoader::load(path, self.feature_config().sample_rate)?;
        debug!(
            path = %path.display(),
            duration_secs = waveform.duration_secs(),
            "Decoded audio file"
        );
        self.predict_waveform(&waveform)
    }

    /// Classify an in-memory audio buffer.
    pub fn predict_bytes(&self, data: &[u8], ext_hint: Option<&str>) -> Result<Prediction> {
        let waveform =
            AudioLoader::load_bytes(data, ext_hint, self.feature_config().sample_rate)?;
        self.predict_waveform(&waveform)
    }

    /// Classify a decoded waveform.
    pub fn predict_waveform(&self, waveform: &Waveform) -> Result<Prediction> {
        let started = Instant::now();

        let features = self.extractor.extract(waveform, self.classifier.device())?;
        let (class_index, score) = self.classifier.predict(&features)?;

        let label = self
            .labels
            .get(class_index)
            .ok_or_else(|| {
                WildearError::internal(format!("classifier produced class {} outside the label set", class_index))
            })?
            .to_string();

        debug!(
            class_index,
            label = %label,
            score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Classified clip"
        );

        Ok(Prediction {
            class_index,
            label,
            score,
        })
    }
}
