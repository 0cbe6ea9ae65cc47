//! Class-index → raw-label table for a sequence classification head.
//!
//! Read from the `id2label` entry of a Hugging Face `config.json`. Models
//! exported without one get the hub default names `LABEL_0`, `LABEL_1`, ...

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use mailguard_core::Prediction;
use serde::Deserialize;
use tracing::debug;

/// Labels ordered by class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

impl LabelTable {
    /// Hub default names for a head with `num_labels` outputs.
    pub fn with_defaults(num_labels: usize) -> Self {
        Self {
            labels: (0..num_labels).map(|i| format!("LABEL_{i}")).collect(),
        }
    }

    /// Parse the `id2label` table out of a `config.json` document.
    ///
    /// Returns `Ok(None)` when the config carries no table.
    pub fn from_config_json(json: &str) -> anyhow::Result<Option<Self>> {
        let config: ModelConfig = serde_json::from_str(json).context("parse config.json")?;
        if config.id2label.is_empty() {
            return Ok(None);
        }

        let mut indexed = Vec::with_capacity(config.id2label.len());
        for (id, label) in config.id2label {
            let idx: usize = id
                .parse()
                .with_context(|| format!("id2label key {id:?} is not a class index"))?;
            indexed.push((idx, label));
        }
        indexed.sort_by_key(|(idx, _)| *idx);

        // Indices must be dense: 0..n with no gaps.
        for (expected, (idx, _)) in indexed.iter().enumerate() {
            anyhow::ensure!(
                *idx == expected,
                "id2label is missing class index {expected}"
            );
        }

        Ok(Some(Self {
            labels: indexed.into_iter().map(|(_, label)| label).collect(),
        }))
    }

    /// Load from `<model_dir>/config.json`, falling back to defaults when
    /// the file or its table is absent.
    pub fn load(model_dir: &Path, num_labels: usize) -> anyhow::Result<Self> {
        let config_path = model_dir.join("config.json");
        if !config_path.exists() {
            debug!(num_labels, "no config.json, using default label names");
            return Ok(Self::with_defaults(num_labels));
        }

        let json = std::fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        match Self::from_config_json(&json)? {
            Some(table) => {
                anyhow::ensure!(
                    table.len() == num_labels,
                    "config.json names {} labels but the model has {num_labels} outputs",
                    table.len()
                );
                debug!(labels = ?table.labels, "read id2label from config.json");
                Ok(table)
            }
            None => {
                debug!(num_labels, "config.json has no id2label, using default label names");
                Ok(Self::with_defaults(num_labels))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Softmax the logits of one example and return the top-ranked class.
    pub fn top_prediction(&self, logits: &[f32]) -> anyhow::Result<Prediction> {
        anyhow::ensure!(
            logits.len() == self.labels.len(),
            "got {} logits for {} labels",
            logits.len(),
            self.labels.len()
        );

        let probs = softmax(logits);
        let (idx, &score) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| anyhow::anyhow!("model produced no logits"))?;

        Ok(Prediction {
            label: self.labels[idx].clone(),
            score,
        })
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
