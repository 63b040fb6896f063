//! Species label set
//!
//! Class-index-ordered names loaded from a JSON file. The file is either a
//! plain array (`["Alcedo_atthis", ...]`) or an index map
//! (`{"0": "Alcedo_atthis", ...}`), both common export formats for training
//! scripts. Stored names use underscores; the display form swaps them for
//! spaces.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, WildearError};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelFile {
    List(Vec<String>),
    IndexMap(HashMap<String, String>),
}

/// Ordered class names, read-only after startup.
#[derive(Debug, Clone)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Load labels from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| WildearError::Io {
            message: format!("failed to read label file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let parsed: LabelFile = serde_json::from_str(&raw).map_err(|e| WildearError::Label {
            message: format!("invalid label file {}: {}", path.display(), e),
        })?;

        match parsed {
            LabelFile::List(labels) => Self::from_labels(labels),
            LabelFile::IndexMap(map) => Self::from_index_map(map),
        }
    }

    pub fn from_labels(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(WildearError::Label {
                message: "label set is empty".to_string(),
            });
        }
        Ok(Self { labels })
    }

    /// Build from a `{"0": name, "1": name, ...}` map. Keys must form a
    /// contiguous range starting at zero; keys are ordered numerically, not
    /// lexicographically, so `"10"` sorts after `"2"`.
    fn from_index_map(map: HashMap<String, String>) -> Result<Self> {
        let count = map.len();
        let mut labels = vec![None; count];
        for (key, name) in map {
            let index: usize = key.parse().map_err(|_| WildearError::Label {
                message: format!("label index {:?} is not a number", key),
            })?;
            let slot = labels.get_mut(index).ok_or_else(|| WildearError::Label {
                message: format!("label index {} out of range for {} entries", index, count),
            })?;
            if slot.replace(name).is_some() {
                return Err(WildearError::Label {
                    message: format!("duplicate label index {}", index),
                });
            }
        }

        // A hole is impossible here: map keys are unique, in range, and
        // exactly len of them, so every slot got filled.
        let labels = labels.into_iter().flatten().collect();
        Self::from_labels(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Raw stored name for a class index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Human-readable name: underscores become spaces.
    pub fn display_name(&self, index: usize) -> Result<String> {
        self.get(index)
            .map(|name| name.replace('_', " "))
            .ok_or_else(|| WildearError::Label {
                message: format!("class index {} out of range ({} labels)", index, self.len()),
            })
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    /// Startup invariant: the label count must match the classifier head.
    pub fn validate_count(&self, num_classes: usize) -> Result<()> {
        if self.len() != num_classes {
            return Err(WildearError::config(format!(
                "label file has {} entries but the model has {} classes",
                self.len(),
                num_classes
            )));
        }
        Ok(())
    }
}
