pub mod classifier;
pub mod verdict;

pub use classifier::{TextClassifier, classify};
pub use verdict::{Category, ClassificationResult, Prediction, round_confidence};
