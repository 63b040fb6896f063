//! Species classifier
//!
//! Wraps the ResNet backbone with checkpoint loading and softmax scoring.

use std::path::Path;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use tracing::{info, warn};

use super::resnet::ResNet;
use crate::error::{Result, WildearError};

/// Trained CNN plus the device it runs on.
pub struct SpeciesClassifier {
    net: ResNet,
    device: Device,
}

impl SpeciesClassifier {
    /// Load a checkpoint, dispatching on the file extension: `.safetensors`
    /// or a PyTorch `.pth`/`.pt` state dict.
    ///
    /// When the configured file is absent, a sibling `.pth`/`.pt` state dict
    /// with the same stem is accepted, since training pipelines commonly ship
    /// that format. With no checkpoint at all the classifier degrades to
    /// random weights with a warning, so the service can come up in
    /// development without the trained model present.
    pub fn load<P: AsRef<Path>>(path: P, num_classes: usize, device: &Device) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            for ext in ["pth", "pt"] {
                let sibling = path.with_extension(ext);
                if sibling.exists() {
                    info!(
                        configured = %path.display(),
                        found = %sibling.display(),
                        "Configured checkpoint absent, loading sibling state dict"
                    );
                    return Self::load(sibling, num_classes, device);
                }
            }
            warn!(
                path = %path.display(),
                "Model checkpoint not found, using random weights"
            );
            return Self::random(num_classes, device);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let vb = match ext.as_str() {
            "safetensors" => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device).map_err(|e| {
                    WildearError::ModelLoad {
                        message: format!("failed to map safetensors: {}", e),
                        path: Some(path.to_path_buf()),
                    }
                })?
            },
            "pth" | "pt" => {
                VarBuilder::from_pth(path, DType::F32, device).map_err(|e| {
                    WildearError::ModelLoad {
                        message: format!("failed to read state dict: {}", e),
                        path: Some(path.to_path_buf()),
                    }
                })?
            }
            other => {
                return Err(WildearError::ModelLoad {
                    message: format!("unsupported checkpoint format: .{}", other),
                    path: Some(path.to_path_buf()),
                });
            }
        };

        let net = ResNet::load(vb, num_classes).map_err(|e| WildearError::ModelLoad {
            message: format!("checkpoint does not match the network: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        info!(path = %path.display(), num_classes, "Loaded model checkpoint");

        Ok(Self {
            net,
            device: device.clone(),
        })
    }

    /// Random-weight classifier, used when no checkpoint is available.
    pub fn random(num_classes: usize, device: &Device) -> Result<Self> {
        let net = ResNet::random(num_classes, device)?;
        Ok(Self {
            net,
            device: device.clone(),
        })
    }

    pub fn num_classes(&self) -> usize {
        self.net.num_classes()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Raw logits for a feature tensor of shape (1, 1, height, width).
    pub fn forward(&self, features: &Tensor) -> Result<Tensor> {
        let dims = features.dims();
        if dims.len() != 4 || dims[0] != 1 || dims[1] != 1 {
            return Err(WildearError::Shape {
                expected: "(1, 1, height, width)".to_string(),
                actual: format!("{:?}", dims),
            });
        }
        self.net.forward(features)
    }

    /// Classify a feature tensor, returning the winning class index and its
    /// softmax probability.
    pub fn predict(&self, features: &Tensor) -> Result<(usize, f32)> {
        let logits = self.forward(features)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        let probs: Vec<f32> = probs.squeeze(0)?.to_vec1()?;

        let mut best_index = 0;
        let mut best_score = f32::MIN;
        for (i, &p) in probs.iter().enumerate() {
            if p > best_score {
                best_index = i;
                best_score = p;
            }
        }

        Ok((best_index, best_score))
    }
}
