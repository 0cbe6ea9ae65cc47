use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailguard_ai::{DEFAULT_MAX_LENGTH, OnnxClassifier};
use mailguard_http::{ApiKey, ServerConfig};

#[derive(Parser)]
#[command(name = "mailguard", version, about = "Spam scanner for email text")]
struct Cli {
    /// Directory holding model.onnx, tokenizer.json and (optionally) config.json.
    #[arg(
        long,
        env = "MAILGUARD_MODEL_DIR",
        default_value = "models/bert-tiny-sms-spam",
        global = true
    )]
    model_dir: PathBuf,

    /// Token budget; longer input is truncated.
    #[arg(long, env = "MAILGUARD_MAX_LENGTH", default_value_t = DEFAULT_MAX_LENGTH, global = true)]
    max_length: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify the given words (joined with spaces) and print the verdict as JSON.
    ///
    /// Put `--` before text that starts with a flag, e.g. `classify -- --help me`.
    Classify {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },
    /// Serve `POST /scan` over HTTP.
    Serve {
        #[arg(long, env = "MAILGUARD_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        /// Shared secret clients send as `Authorization: Bearer <key>`.
        #[arg(long, env = "MAILGUARD_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the classify output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Classify { words } => {
            let classifier = load_classifier(&cli.model_dir, cli.max_length)?;
            let result = mailguard_core::classify(&classifier, &words.join(" "))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Serve { bind, api_key } => {
            let config = ServerConfig {
                bind,
                api_key: ApiKey::new(api_key)?,
            };
            // Load before binding so the first request always sees a model.
            let classifier = load_classifier(&cli.model_dir, cli.max_length)?;
            tracing::info!("mailguard v{}", env!("CARGO_PKG_VERSION"));
            mailguard_http::serve(config, Arc::new(classifier)).await?;
        }
    }
    Ok(())
}

fn load_classifier(model_dir: &Path, max_length: usize) -> anyhow::Result<OnnxClassifier> {
    OnnxClassifier::load(model_dir, max_length)
        .with_context(|| format!("loading model from {}", model_dir.display()))
}
