use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{D, Device, IndexOp, Tensor};
use candle_nn::ops::softmax;
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::tokio::Api};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use crate::engine::{ModelLoader, SentimentModel};
use crate::types::RawPrediction;

pub const DEFAULT_MODEL_ID: &str = "ProsusAI/finbert";

/// BERT encoder with the pooler and classification head of a sequence classifier.
pub struct FinbertEngine {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    id2label: HashMap<u32, String>,
}

#[derive(Debug, Clone)]
pub struct FinbertConfig {
    pub model_id: String,
    pub model_path: Option<PathBuf>,
    pub revision: String,
    pub use_pth: bool,
    pub cpu: bool,
    pub max_sequence_length: usize,
    pub id2label: Option<HashMap<u32, String>>,
}

impl Default for FinbertConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_path: None,
            revision: "main".to_string(),
            use_pth: false,
            cpu: false,
            max_sequence_length: 512,
            id2label: None,
        }
    }
}

/// Fields of `config.json` the candle BERT config does not carry.
#[derive(Debug, Deserialize)]
struct ClassifierHeadConfig {
    hidden_size: usize,
    max_position_embeddings: usize,
    #[serde(default)]
    id2label: Option<HashMap<u32, String>>,
}

enum TokenizerSource {
    Json(PathBuf),
    Vocab(PathBuf),
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: TokenizerSource,
    weights: PathBuf,
}

impl FinbertEngine {
    fn device(cpu: bool) -> Result<Device> {
        if cpu {
            Ok(Device::Cpu)
        } else if metal_is_available() {
            tracing::info!("Using metal acceleration");
            Ok(Device::new_metal(0)?)
        } else if cuda_is_available() {
            tracing::info!("Using CUDA GPU acceleration");
            Ok(Device::new_cuda(0)?)
        } else {
            tracing::info!(
                "CUDA not available, running on CPU. To run on GPU, build with `--features cuda`"
            );
            Ok(Device::Cpu)
        }
    }

    fn weights_name(use_pth: bool) -> &'static str {
        if use_pth {
            "pytorch_model.bin"
        } else {
            "model.safetensors"
        }
    }

    fn local_files(base_path: &Path, use_pth: bool) -> Result<ModelFiles> {
        if !base_path.is_dir() {
            bail!("Model path {} is not a directory.", base_path.display());
        }

        let tokenizer_json = base_path.join("tokenizer.json");
        let tokenizer = if tokenizer_json.is_file() {
            TokenizerSource::Json(tokenizer_json)
        } else {
            TokenizerSource::Vocab(base_path.join("vocab.txt"))
        };

        Ok(ModelFiles {
            config: base_path.join("config.json"),
            tokenizer,
            weights: base_path.join(Self::weights_name(use_pth)),
        })
    }

    async fn hub_files(model_id: &str, revision: &str, use_pth: bool) -> Result<ModelFiles> {
        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new()?;
        let api = api.repo(repo);

        let config = api.get("config.json").await?;
        // Older BERT checkpoints only publish the WordPiece vocabulary.
        let tokenizer = match api.get("tokenizer.json").await {
            Ok(path) => TokenizerSource::Json(path),
            Err(err) => {
                tracing::debug!(error = %err, "No tokenizer.json, falling back to vocab.txt");
                TokenizerSource::Vocab(api.get("vocab.txt").await?)
            }
        };
        let weights = api.get(Self::weights_name(use_pth)).await?;

        Ok(ModelFiles {
            config,
            tokenizer,
            weights,
        })
    }

    fn load_tokenizer(source: &TokenizerSource, max_sequence_length: usize) -> Result<Tokenizer> {
        let mut tokenizer = match source {
            TokenizerSource::Json(path) => {
                Tokenizer::from_file(path).map_err(|e| anyhow!("Tokenizer error: {e}"))?
            }
            TokenizerSource::Vocab(path) => {
                let vocab = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                wordpiece_tokenizer(&vocab)?
            }
        };
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Tokenizer truncation error: {e}"))?;
        Ok(tokenizer)
    }

    #[tracing::instrument(skip(config), fields(model_id = %config.model_id, cpu = config.cpu))]
    pub async fn new(config: FinbertConfig) -> Result<Self> {
        let device = Self::device(config.cpu)?;

        let files = match &config.model_path {
            Some(base_path) => Self::local_files(base_path, config.use_pth)?,
            None => Self::hub_files(&config.model_id, &config.revision, config.use_pth).await?,
        };

        let raw_config = std::fs::read_to_string(&files.config)
            .with_context(|| format!("reading {}", files.config.display()))?;
        let bert_config: BertConfig = serde_json::from_str(&raw_config)?;
        let head_config: ClassifierHeadConfig = serde_json::from_str(&raw_config)?;

        // Command-line id2label takes precedence. Otherwise, use model config's id2label.
        let id2label = if let Some(id2label) = config.id2label {
            id2label
        } else if let Some(id2label) = head_config.id2label {
            id2label
        } else {
            bail!("Id2Label not found in the model configuration nor specified as a parameter");
        };

        // Positions past the embedding table cannot be encoded.
        let max_sequence_length = config
            .max_sequence_length
            .min(head_config.max_position_embeddings);
        if max_sequence_length < config.max_sequence_length {
            tracing::warn!(
                requested = config.max_sequence_length,
                max_sequence_length,
                "Capping sequence length at the model's position embeddings"
            );
        }
        let tokenizer = Self::load_tokenizer(&files.tokenizer, max_sequence_length)?;

        let vb = if config.use_pth {
            VarBuilder::from_pth(&files.weights, DTYPE, &device)?
        } else {
            unsafe { VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, &device)? }
        };

        let hidden_size = head_config.hidden_size;
        let bert = BertModel::load(vb.pp("bert"), &bert_config)?;
        let pooler = candle_nn::linear(hidden_size, hidden_size, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(hidden_size, id2label.len(), vb.pp("classifier"))?;

        Ok(Self {
            bert,
            pooler,
            classifier,
            tokenizer,
            device,
            id2label,
        })
    }
}

#[async_trait]
impl SentimentModel for FinbertEngine {
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    async fn classify_raw(&self, text: &str) -> Result<RawPrediction> {
        let tokenizer = self.tokenizer.clone();
        let text = text.to_string();
        let encoding = tokio::task::spawn_blocking(move || {
            tokenizer
                .encode(text, true)
                .map_err(|e| anyhow!("Tokenization error: {e}"))
        })
        .await??;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        // Run inference
        let hidden = self
            .bert
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = self.pooler.forward(&hidden.i((.., 0))?)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        let probs = softmax(&logits, D::Minus1)?.squeeze(0)?.to_vec1::<f32>()?;

        let (prediction, score) =
            top_class(&probs).ok_or_else(|| anyhow!("Model produced no logits"))?;
        let label = self
            .id2label
            .get(&prediction)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{prediction}"));
        tracing::debug!(%label, score, tokens = encoding.len(), "Inference complete");

        Ok(RawPrediction { label, score })
    }
}

fn top_class(probs: &[f32]) -> Option<(u32, f32)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, score)| (index as u32, score))
}

/// Builds an uncased BERT WordPiece tokenizer from the lines of a `vocab.txt`.
fn wordpiece_tokenizer(vocab: &str) -> Result<Tokenizer> {
    let vocab: HashMap<&str, u32> = vocab
        .lines()
        .enumerate()
        .map(|(id, token)| (token.trim_end_matches('\r'), id as u32))
        .collect();
    let special = |token: &str| {
        vocab
            .get(token)
            .copied()
            .ok_or_else(|| anyhow!("vocab.txt has no {token} token"))
    };
    let sep = special("[SEP]")?;
    let cls = special("[CLS]")?;

    let definition = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "BertPreTokenizer" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", sep],
            "cls": ["[CLS]", cls]
        },
        "decoder": { "type": "WordPiece", "prefix": "##", "cleanup": true },
        "model": {
            "type": "WordPiece",
            "unk_token": "[UNK]",
            "continuing_subword_prefix": "##",
            "max_input_chars_per_word": 100,
            "vocab": vocab
        }
    });

    Tokenizer::from_str(&definition.to_string()).map_err(|e| anyhow!("Tokenizer error: {e}"))
}

/// Loads a [`FinbertEngine`] on first use.
pub struct FinbertLoader {
    config: FinbertConfig,
    name: String,
}

impl FinbertLoader {
    pub fn new(config: FinbertConfig) -> Self {
        let name = match &config.model_path {
            Some(path) => path.display().to_string(),
            None => config.model_id.clone(),
        };
        Self { config, name }
    }
}

#[async_trait]
impl ModelLoader for FinbertLoader {
    fn model_id(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Arc<dyn SentimentModel>> {
        let engine = FinbertEngine::new(self.config.clone()).await?;
        Ok(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\nstocks\nsoar\n##ed\ntoday\n.\n";

    const TINY_CONFIG: &str = r#"{
        "model_type": "bert",
        "vocab_size": 9,
        "hidden_size": 8,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "max_position_embeddings": 16,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0,
        "position_embedding_type": "absolute",
        "use_cache": true,
        "classifier_dropout": null,
        "id2label": { "0": "positive", "1": "negative", "2": "neutral" }
    }"#;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("finsent-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes a randomly initialized one-layer BERT classifier in the Hub file layout.
    fn tiny_model_dir() -> PathBuf {
        let dir = temp_dir();
        std::fs::write(dir.join("config.json"), TINY_CONFIG).unwrap();
        std::fs::write(dir.join("vocab.txt"), VOCAB).unwrap();

        let bert_config: BertConfig = serde_json::from_str(TINY_CONFIG).unwrap();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        BertModel::load(vb.pp("bert"), &bert_config).unwrap();
        candle_nn::linear(8, 8, vb.pp("bert.pooler.dense")).unwrap();
        candle_nn::linear(8, 3, vb.pp("classifier")).unwrap();
        varmap.save(dir.join("model.safetensors")).unwrap();
        dir
    }

    fn tiny_loader(dir: &Path, max_sequence_length: usize) -> FinbertLoader {
        FinbertLoader::new(FinbertConfig {
            model_path: Some(dir.to_path_buf()),
            cpu: true,
            max_sequence_length,
            ..Default::default()
        })
    }

    fn assert_top_class(prediction: &RawPrediction) {
        assert!(
            ["positive", "negative", "neutral"].contains(&prediction.label.as_str()),
            "{prediction:?}"
        );
        assert!(prediction.score >= 1.0 / 3.0 - 1e-6, "{prediction:?}");
        assert!(prediction.score <= 1.0, "{prediction:?}");
    }

    #[tokio::test]
    async fn tiny_bert_classifies_short_and_truncated_text() {
        let dir = tiny_model_dir();
        let model = tiny_loader(&dir, 8).load().await.unwrap();

        assert_top_class(&model.classify_raw("Stocks soared today.").await.unwrap());

        let long = "stocks soared today . ".repeat(40);
        assert_top_class(&model.classify_raw(&long).await.unwrap());
        assert_top_class(&model.classify_raw("Ümlaut stocks \u{0} today").await.unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn sequence_length_is_capped_at_position_embeddings() {
        let dir = tiny_model_dir();
        // 512 tokens requested against a 16-position model.
        let model = tiny_loader(&dir, 512).load().await.unwrap();

        let long = "stocks soared today . ".repeat(40);
        assert_top_class(&model.classify_raw(&long).await.unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn top_class_picks_highest_probability() {
        assert_eq!(top_class(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(top_class(&[]), None);
    }

    #[test]
    fn wordpiece_fallback_lowercases_and_wraps_special_tokens() {
        let tokenizer = wordpiece_tokenizer(VOCAB).unwrap();
        let encoding = tokenizer.encode("Stocks soared TODAY.", true).unwrap();
        assert_eq!(encoding.get_ids(), &[2, 4, 5, 6, 7, 8, 3]);
    }

    #[test]
    fn wordpiece_fallback_requires_special_tokens() {
        assert!(wordpiece_tokenizer("stocks\nsoar\n").is_err());
    }

    #[test]
    fn local_files_prefers_tokenizer_json() {
        let dir = temp_dir();

        let files = FinbertEngine::local_files(&dir, true).unwrap();
        assert!(matches!(files.tokenizer, TokenizerSource::Vocab(_)));
        assert!(files.weights.ends_with("pytorch_model.bin"));

        std::fs::write(dir.join("tokenizer.json"), "{}").unwrap();
        let files = FinbertEngine::local_files(&dir, false).unwrap();
        assert!(matches!(files.tokenizer, TokenizerSource::Json(_)));
        assert!(files.weights.ends_with("model.safetensors"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn loading_from_missing_directory_fails() {
        let loader = FinbertLoader::new(FinbertConfig {
            model_path: Some(PathBuf::from("/nonexistent/finbert")),
            cpu: true,
            ..Default::default()
        });
        assert_eq!(loader.model_id(), "/nonexistent/finbert");
        let err = match loader.load().await {
            Ok(_) => panic!("expected load failure"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("is not a directory"));
    }
}
