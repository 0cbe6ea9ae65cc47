//! The seam between the service and whatever model backs it.

use tracing::debug;

use crate::verdict::{ClassificationResult, Prediction};

/// A pretrained single-label text classifier.
///
/// Implementations must be safe to call from several request handlers at
/// once: either immutable after load or internally synchronized.
pub trait TextClassifier: Send + Sync {
    /// Run the model once on `text` and return its top-ranked label.
    ///
    /// Over-long input is truncated by the implementation; it is never an error.
    fn predict(&self, text: &str) -> anyhow::Result<Prediction>;

    /// Human-readable identifier of the loaded model, for logs.
    fn model_id(&self) -> &str;
}

/// Classify `text` with a single model call.
///
/// Failures from the model propagate unchanged; there is no retry and no
/// fallback verdict.
pub fn classify(
    classifier: &dyn TextClassifier,
    text: &str,
) -> anyhow::Result<ClassificationResult> {
    let prediction = classifier.predict(text)?;
    anyhow::ensure!(
        (0.0..=1.0).contains(&prediction.score),
        "model {} returned score {} outside [0, 1]",
        classifier.model_id(),
        prediction.score
    );

    let result = ClassificationResult::from_prediction(&prediction);
    debug!(
        model = classifier.model_id(),
        label = %prediction.label,
        score = prediction.score,
        classification = result.classification.as_str(),
        "classified text"
    );
    Ok(result)
}
