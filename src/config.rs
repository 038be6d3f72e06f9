use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::finbert_engine::{DEFAULT_MODEL_ID, FinbertConfig};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Model ID from Hugging Face Hub
    #[arg(long, env = "MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Local path to model directory, used instead of the Hub when set
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Model revision/branch on Hugging Face
    #[arg(long, env = "MODEL_REVISION", default_value = "main")]
    pub model_revision: String,

    /// Use PyTorch weights instead of safetensors
    #[arg(long, env = "USE_PTH")]
    pub use_pth: bool,

    /// Run on CPU instead of GPU
    #[arg(long, env = "CPU_ONLY")]
    pub cpu_only: bool,

    /// Maximum sequence length; longer articles are truncated
    #[arg(long, env = "MAX_SEQUENCE_LENGTH", default_value = "512")]
    pub max_sequence_length: usize,

    /// Labels mapping in format "0=positive,1=negative,2=neutral"
    #[arg(long, env = "ID2LABEL")]
    pub id2label: Option<String>,

    /// Defer loading the model until the first request
    #[arg(long, env = "LAZY_LOAD")]
    pub lazy_load: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl From<&Config> for FinbertConfig {
    fn from(config: &Config) -> Self {
        Self {
            model_id: config.model_id.clone(),
            model_path: config.model_path.clone(),
            revision: config.model_revision.clone(),
            use_pth: config.use_pth,
            cpu: config.cpu_only,
            max_sequence_length: config.max_sequence_length,
            id2label: config.parse_id2label(),
        }
    }
}

impl Config {
    pub fn parse_id2label(&self) -> Option<HashMap<u32, String>> {
        self.id2label.as_ref().map(|labels| {
            labels
                .split(',')
                .filter_map(|pair| {
                    let mut parts = pair.split('=');
                    let id = parts.next()?.trim().parse().ok()?;
                    let label = parts.next()?.trim().to_string();
                    Some((id, label))
                })
                .collect()
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
