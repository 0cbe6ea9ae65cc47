//! Model binding: ONNX Runtime sequence classification for the mail scanner.

mod labels;
pub use labels::LabelTable;

#[cfg(feature = "onnx")]
mod classifier;
#[cfg(feature = "onnx")]
pub use classifier::OnnxClassifier;

/// Token budget of the reference BERT model; longer input is truncated.
pub const DEFAULT_MAX_LENGTH: usize = 512;
