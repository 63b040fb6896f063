//! CNN classifier
//!
//! ResNet-50 backbone adapted for single-channel spectrograms, with a
//! softmax head over the species label set.

mod classifier;
mod resnet;

pub use classifier::SpeciesClassifier;
pub use resnet::{ResNet, FEATURE_DIM};

/// Number of species the shipped model was trained on. The label set and
/// the checkpoint's final layer must both agree with this.
pub const NUM_CLASSES: usize = 23;
