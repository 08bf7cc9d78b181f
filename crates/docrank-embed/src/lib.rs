//! docrank-embed
//!
//! Dense text embeddings: a local XLM-RoBERTa (multilingual E5) model run
//! with candle, and a hashing fake for tests and offline runs.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

pub use docrank_core::traits::Embedder;
use docrank_core::config::EmbeddingSettings;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

pub const DEFAULT_MODEL_DIR: &str = "models/multilingual-e5-large";
pub const EMBEDDING_DIM: usize = 1024;

pub struct EmbeddingModel {
    id: String,
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!("Loading embedding model from {}", model_dir.display());
        let tokenizer = tokenize::load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        let id = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "xlm-roberta".to_string());
        info!(model = %id, dim = config.hidden_size, "embedding model loaded");
        Ok(Self { id, model, tokenizer, device, dim: config.hidden_size, max_len })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_dtype(DType::F32)?.to_vec1()?;
        if emb.len() != self.dim {
            return Err(anyhow!("embedding has {} dims, model reports {}", emb.len(), self.dim));
        }
        if start.elapsed().as_millis() > 500 { debug!(ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let weights_path = model_dir.join("pytorch_model.bin");
    if !weights_path.exists() {
        return Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()));
    }
    let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&weights_path)?.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}

impl Embedder for EmbeddingModel {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Deterministic hashed bag-of-words vectors. Words are whitespace
/// separated; non-ASCII words also contribute each character, so Chinese
/// texts sharing characters land near each other.
pub struct FakeEmbedder {
    id: String,
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { id: format!("fake-{dim}"), dim } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, word) in text.split_whitespace().enumerate() {
            self.bump(&mut v, word, i);
            if !word.is_ascii() {
                let mut buf = [0u8; 4];
                for c in word.chars() {
                    self.bump(&mut v, c.encode_utf8(&mut buf), i);
                }
            }
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }

    fn bump(&self, v: &mut [f32], token: &str, i: usize) {
        let mut hasher = XxHash64::with_seed(0);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h as usize) % self.dim;
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        v[idx] += val + (i as f32 % 3.0) * 0.01;
    }
}

impl Embedder for FakeEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// The fake embedder when `use_fake` is set or `APP_USE_FAKE_EMBEDDINGS` is
/// truthy, otherwise the local model.
pub fn get_default_embedder(settings: &EmbeddingSettings, model_dir: Option<&Path>) -> Result<Box<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if settings.use_fake || env_fake {
        warn!("Using FakeEmbedder; rankings are not semantic");
        return Ok(Box::new(FakeEmbedder::new(EMBEDDING_DIM)));
    }
    let dir = resolve_model_dir(model_dir)?;
    Ok(Box::new(EmbeddingModel::load(&dir, settings.max_len)?))
}

/// Configured directory first, then `APP_MODEL_DIR`, `MODEL_DIR` and the
/// conventional relative locations.
pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.exists() { return Ok(p.to_path_buf()); }
        warn!("Configured model dir {} does not exist", p.display());
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { debug!("Using {}: {}", var, p.display()); return Ok(p); }
        }
    }
    for candidate in [PathBuf::from(DEFAULT_MODEL_DIR), Path::new("..").join(DEFAULT_MODEL_DIR)] {
        if candidate.exists() { return Ok(candidate); }
    }
    Err(anyhow!("Could not locate the embedding model directory"))
}
