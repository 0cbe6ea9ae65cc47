//! ONNX Runtime sequence classification for BERT-style spam detectors.
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`, and
//! may contain the `config.json` the model was exported with (for `id2label`).
//! The reference model is `mrm8488/bert-tiny-finetuned-sms-spam-detection`.

use std::path::Path;
use std::sync::Mutex;

use mailguard_core::{Prediction, TextClassifier};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::labels::LabelTable;

/// Pretrained binary (or n-ary) text classifier running on ONNX Runtime.
///
/// Safe to share between threads: the session is the only part that needs
/// exclusive access and it sits behind a mutex.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: LabelTable,
    uses_token_type_ids: bool,
    model_id: String,
}

impl OnnxClassifier {
    /// Load a classifier from `model_dir`, truncating inputs to `max_length` tokens.
    pub fn load(model_dir: &Path, max_length: usize) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );
        anyhow::ensure!(max_length > 0, "max_length must be positive");

        let session = Session::builder()?.commit_from_file(&model_path)?;

        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let num_labels = infer_num_labels(session.outputs().iter().map(|output| output.dtype()))?;
        let labels = LabelTable::load(model_dir, num_labels)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        configure_tokenizer(&mut tokenizer, max_length)?;

        let model_id = model_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_dir.display().to_string());

        info!(
            model = %model_path.display(),
            num_labels = labels.len(),
            max_length,
            uses_token_type_ids,
            "loaded classification model"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            uses_token_type_ids,
            model_id,
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Run the model on one text and return the logits of its single row.
    fn logits(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encoding.get_ids().len();
        let shape = [1i64, seq_len as i64];

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let mut inputs = ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
        ];
        if self.uses_token_type_ids {
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            inputs.push(("token_type_ids".into(), type_tensor.into()));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("onnx session mutex poisoned"))?;
        let outputs = session.run(inputs)?;

        // Logits: [1, num_labels].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] == 1 && dims[1] as usize == self.labels.len(),
            "unexpected output shape: {dims:?}, expected [1, {}]",
            self.labels.len()
        );

        Ok(output_data.to_vec())
    }
}

impl TextClassifier for OnnxClassifier {
    fn predict(&self, text: &str) -> anyhow::Result<Prediction> {
        let logits = self.logits(text)?;
        self.labels.top_prediction(&logits)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Number of classes, read from the width of the first (logits) output.
///
/// Falls back to 2 when the width is dynamic; a graph with no outputs is an error.
fn infer_num_labels<'a>(
    output_types: impl IntoIterator<Item = &'a ort::value::ValueType>,
) -> anyhow::Result<usize> {
    let logits = output_types
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("model graph declares no outputs"))?;
    let width = match logits {
        ort::value::ValueType::Tensor { shape, .. } => logits_width(shape),
        _ => None,
    };
    Ok(width.unwrap_or(2))
}

/// Last dimension of a logits shape, if it is static.
fn logits_width(dims: &[i64]) -> Option<usize> {
    dims.last()
        .and_then(|&d| if d > 0 { Some(d as usize) } else { None })
}

/// Truncate to `max_length` tokens and turn padding off (one text per run).
fn configure_tokenizer(tokenizer: &mut Tokenizer, max_length: usize) -> anyhow::Result<()> {
    // Over-long mail is cut at the model's token budget, never rejected.
    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
    tokenizer.with_padding(None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailguard_core::{Category, classify};
    use std::path::PathBuf;
    use std::str::FromStr;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("bert-tiny-sms-spam")
    }

    fn require_model() -> PathBuf {
        let dir = model_dir();
        if !dir.join("model.onnx").exists() {
            panic!(
                "Model not found. Export it from HuggingFace:\n  \
                 optimum-cli export onnx --task text-classification \
                 --model mrm8488/bert-tiny-finetuned-sms-spam-detection \
                 models/bert-tiny-sms-spam"
            );
        }
        dir
    }

    fn load() -> OnnxClassifier {
        OnnxClassifier::load(&require_model(), crate::DEFAULT_MAX_LENGTH).unwrap()
    }

    /// Word-level tokenizer with a whitespace pre-tokenizer; every word is one token.
    fn word_tokenizer() -> Tokenizer {
        let json = r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "[UNK]": 0, "This": 1, "is": 2, "a": 3, "long": 4, "sentence": 5, ".": 6 },
                "unk_token": "[UNK]"
            }
        }"#;
        Tokenizer::from_str(json).unwrap()
    }

    #[test]
    fn long_input_is_truncated_to_max_length() {
        let mut tokenizer = word_tokenizer();
        configure_tokenizer(&mut tokenizer, 16).unwrap();

        let text = "This is a long sentence. ".repeat(500);
        let encoding = tokenizer.encode(text.as_str(), true).unwrap();
        assert_eq!(encoding.get_ids().len(), 16);
        assert_eq!(encoding.get_attention_mask().len(), 16);
    }

    #[test]
    fn short_and_empty_input_are_not_padded() {
        let mut tokenizer = word_tokenizer();
        configure_tokenizer(&mut tokenizer, 16).unwrap();

        let encoding = tokenizer.encode("This is a sentence.", true).unwrap();
        assert_eq!(encoding.get_ids(), [1, 2, 3, 5, 6]);

        let encoding = tokenizer.encode("", true).unwrap();
        assert!(encoding.get_ids().is_empty());
    }

    #[test]
    fn graph_without_outputs_is_an_error() {
        let err = infer_num_labels(std::iter::empty::<&ort::value::ValueType>()).unwrap_err();
        assert!(err.to_string().contains("no outputs"), "got: {err}");
    }

    #[test]
    fn logits_width_reads_static_last_dim() {
        assert_eq!(logits_width(&[1, 2]), Some(2));
        assert_eq!(logits_width(&[-1, 3]), Some(3));
        assert_eq!(logits_width(&[1, -1]), None);
        assert_eq!(logits_width(&[]), None);
    }

    #[test]
    fn missing_model_dir_is_an_error() {
        let err = OnnxClassifier::load(Path::new("/nonexistent/model"), 512)
            .err()
            .expect("load should fail");
        assert!(err.to_string().contains("model.onnx not found"), "got: {err}");
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn load_model() {
        let clf = load();
        assert_eq!(clf.labels().len(), 2);
        assert_eq!(clf.labels().get(0), Some("LABEL_0"));
        assert_eq!(clf.labels().get(1), Some("LABEL_1"));
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn legit_email() {
        let clf = load();
        let result = classify(
            &clf,
            "Hi team, just a reminder about our meeting tomorrow at 10 AM. See you there.",
        )
        .unwrap();
        assert_eq!(result.classification, Category::Legit);
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.explanation.contains("LABEL_0"));
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn spam_email() {
        let clf = load();
        let result = classify(
            &clf,
            "Free entry in to weekly competition to win a £100. Text 'WIN' to 80085 now!",
        )
        .unwrap();
        assert_eq!(result.classification, Category::Spam);
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.explanation.contains("LABEL_1"));
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn phishing_email_is_spam() {
        let clf = load();
        let text = "Subject: Urgent Security Alert: Your Apple ID Has Been Locked\n\
                    Dear Customer,\n\
                    Your Apple ID has been temporarily locked due to unusual activity.\n\
                    To unlock your account, click: http://verify-apple-account.malicious-site.com/login\n\
                    Apple Support";
        let result = classify(&clf, text).unwrap();
        assert_eq!(result.classification, Category::Spam);
        assert!(result.explanation.contains("LABEL_1"));
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn empty_input_is_legit() {
        let clf = load();
        let result = classify(&clf, "").unwrap();
        assert_eq!(result.classification, Category::Legit);
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn very_long_input_is_truncated() {
        let clf = load();
        let text = "This is a long sentence. ".repeat(500);
        let result = classify(&clf, &text).unwrap();
        assert!(
            matches!(result.classification, Category::Legit | Category::Spam),
            "got {:?}",
            result.classification
        );
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    #[ignore = "needs the exported ONNX model under models/"]
    fn inference_is_deterministic() {
        let clf = load();
        let text = "URGENT! You have won a 1 week FREE membership";
        let a = classify(&clf, text).unwrap();
        let b = classify(&clf, text).unwrap();
        assert_eq!(a.classification, b.classification);
        assert_eq!(a.confidence, b.confidence);
    }
}
