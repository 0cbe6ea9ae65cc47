//! Verdict types returned to callers of the scan endpoint and the CLI.
//!
//! A model produces a raw [`Prediction`] (class token + probability). The
//! fixed label table turns it into a [`Category`], and [`ClassificationResult`]
//! is the shape that goes over the wire.

use serde::{Deserialize, Serialize};

/// Raw class token the reference model uses for spam.
pub const SPAM_LABEL: &str = "LABEL_1";
/// Raw class token the reference model uses for legitimate mail.
pub const LEGIT_LABEL: &str = "LABEL_0";

/// Domain-facing category for a piece of mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Spam,
    Legit,
    /// The model answered with a class token outside the label table.
    Unknown,
}

impl Category {
    /// Map a raw model label onto a category.
    ///
    /// Only exact matches against the fixed table count; the label text is
    /// never interpreted.
    pub fn from_raw_label(label: &str) -> Self {
        match label {
            SPAM_LABEL => Self::Spam,
            LEGIT_LABEL => Self::Legit,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Legit => "legit",
            Self::Unknown => "unknown",
        }
    }
}

/// Top-1 output of a text classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Raw class token, e.g. `LABEL_1`.
    pub label: String,
    /// Probability of `label`, in [0, 1].
    pub score: f32,
}

/// Result of classifying one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification: Category,
    /// Model probability for the top label, rounded to two decimals.
    pub confidence: f64,
    /// `Predicted '<raw label>' with score <confidence>`.
    pub explanation: String,
}

impl ClassificationResult {
    pub fn from_prediction(prediction: &Prediction) -> Self {
        let confidence = round_confidence(prediction.score);
        Self {
            classification: Category::from_raw_label(&prediction.label),
            confidence,
            // Debug keeps the trailing `.0` on whole numbers (`1.0`, not `1`).
            explanation: format!(
                "Predicted '{}' with score {confidence:?}",
                prediction.label
            ),
        }
    }
}

/// Round a model score to two decimal places, ties to even.
pub fn round_confidence(score: f32) -> f64 {
    (f64::from(score) * 100.0).round_ties_even() / 100.0
}
