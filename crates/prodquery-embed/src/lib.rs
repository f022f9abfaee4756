use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use prodquery_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings};
use prodquery_core::traits::Embedder;
use prodquery_core::{Error, Result};

pub mod device;
mod fake;
pub mod pool;
pub mod tokenize;

pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;

/// Sentence embedder over a BERT checkpoint (all-MiniLM-L6-v2 layout):
/// mean pooling over unmasked tokens followed by L2 normalization.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let model_dir = resolve_model_dir(settings)?;
        Self::load(&model_dir, &settings.model, settings.max_len, device::select_device())
    }

    pub fn load(model_dir: &Path, model_name: &str, max_len: usize, device: Device) -> Result<Self> {
        let unavailable = |what: &str, path: &Path, e: &dyn std::fmt::Display| {
            Error::ModelUnavailable(format!("{what} {}: {e}", path.display()))
        };
        info!(model = model_name, dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable("failed to load tokenizer from", &tokenizer_path, &e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| unavailable("failed to read model config", &config_path, &e))?;
        let config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| unavailable("invalid model config", &config_path, &e))?;
        let raw: serde_json::Value = serde_json::from_str(&raw_config)
            .map_err(|e| unavailable("invalid model config", &config_path, &e))?;
        let dim = raw.get("hidden_size").and_then(serde_json::Value::as_u64).unwrap_or(0) as usize;
        if dim == 0 {
            return Err(unavailable("missing hidden_size in", &config_path, &"0"));
        }
        let pad_id = raw.get("pad_token_id").and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)
            .map_err(|e| unavailable("failed to build model from", model_dir, &e))?;

        let short_name = model_name.rsplit('/').next().unwrap_or(model_name);
        let id = format!("bert:{short_name}:d{dim}");
        info!(model_id = %id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, id, dim, max_len, pad_id })
    }

    fn forward(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) =
            tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let encode = || -> candle_core::Result<Vec<Vec<f32>>> {
            let token_type_ids = input_ids.zeros_like()?;
            let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
            let pooled = masked_mean_l2(&hidden, &attention_mask)?;
            pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2::<f32>()
        };
        let vectors = encode().map_err(|e| Error::Encoding(e.to_string()))?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 * texts.len() as u128 {
            warn!(batch = texts.len(), ?elapsed, "slow embedding batch");
        } else {
            debug!(batch = texts.len(), ?elapsed, "embedded batch");
        }
        Ok(vectors)
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let vectors = self.forward(texts)?;
        if vectors.len() != texts.len() {
            return Err(Error::Encoding(format!("model returned {} vectors for {} inputs", vectors.len(), texts.len())));
        }
        Ok(vectors)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        debug!(path = %safetensors.display(), "loading safetensors weights");
        return candle_core::safetensors::load(&safetensors, device)
            .map_err(|e| Error::ModelUnavailable(format!("failed to read {}: {e}", safetensors.display())));
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        debug!(path = %pickle.display(), "loading pytorch weights");
        let tensors = candle_core::pickle::read_all(&pickle)
            .map_err(|e| Error::ModelUnavailable(format!("failed to read {}: {e}", pickle.display())))?;
        return Ok(tensors.into_iter().collect());
    }
    Err(Error::ModelUnavailable(format!(
        "no model.safetensors or pytorch_model.bin in {}",
        model_dir.display()
    )))
}

/// Build the embedder selected by configuration.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the [`FakeEmbedder`] regardless of
/// `embedding.backend`, which keeps tests and development runs model-free.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if use_fake || settings.backend == EmbeddingBackend::Fake {
        info!(dim = settings.fake_dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(settings.fake_dim)));
    }
    Ok(Box::new(BertEmbedder::from_settings(settings)?))
}

/// Locate the model directory: `embedding.model_dir`, `APP_MODEL_DIR`,
/// `MODEL_DIR`, then `models/<name>` and `../models/<name>`.
pub fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    if !settings.model_dir.is_empty() {
        let p = expand_path(&settings.model_dir);
        if p.exists() { return Ok(p); }
        return Err(Error::ModelUnavailable(format!("configured model_dir {} does not exist", p.display())));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() { info!(var, dir = %p.display(), "using model dir from env"); return Ok(p); }
            warn!(var, dir = %p.display(), "model dir from env does not exist");
        }
    }
    let short_name = settings.model.rsplit('/').next().unwrap_or(&settings.model);
    for root in ["models", "../models"] {
        let p = Path::new(root).join(short_name);
        if p.exists() { info!(dir = %p.display(), "using model dir"); return Ok(p); }
    }
    Err(Error::ModelUnavailable(format!("could not locate model directory for {}", settings.model)))
}
