use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use tracing::{debug, info};

use docrank_core::config::EmbeddingSettings;
use docrank_core::traits::Embedder;
use docrank_core::types::{ScoredCandidate, SourceId};

use crate::cache::{hash_content, CacheEntry, EmbeddingCache};
use crate::search::{top_k_flat, top_k_grouped};

const BATCH_SIZE: usize = 32;
const PROGRESS_MIN: usize = 64;

/// Wraps an embedder with the asymmetric query/passage prefixes the model
/// was trained with, plus the two ranking modes.
pub struct EmbeddingRanker {
	embedder: Box<dyn Embedder>,
	passage_prefix: String,
	query_prefix: String,
}

impl EmbeddingRanker {
	pub fn new(embedder: Box<dyn Embedder>, settings: &EmbeddingSettings) -> Self {
		Self {
			embedder,
			passage_prefix: settings.passage_prefix.clone(),
			query_prefix: settings.query_prefix.clone(),
		}
	}

	pub fn embedder(&self) -> &dyn Embedder { self.embedder.as_ref() }

	pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let mut out = self.embedder.embed_batch(&[format!("{}{}", self.query_prefix, text)])?;
		out.pop().ok_or_else(|| anyhow!("embedder returned no vector for the query"))
	}

	/// Embeds passages with the passage prefix, reusing cached vectors when
	/// a cache is given and recording fresh ones in it.
	pub fn embed_passages(&self, texts: &[String], cache: Option<&mut EmbeddingCache>) -> Result<Vec<Vec<f32>>> {
		let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{}", self.passage_prefix, t)).collect();
		let Some(cache) = cache else { return self.embed_all(&prefixed) };

		let embedder_id = self.embedder.id().to_string();
		let hashes: Vec<String> = prefixed.iter().map(|t| hash_content(t)).collect();
		let hits = cache.get_many(&embedder_id, &hashes);
		let misses: Vec<usize> = (0..prefixed.len()).filter(|&i| !hits.contains_key(&hashes[i])).collect();
		debug!(hits = prefixed.len() - misses.len(), misses = misses.len(), "embedding cache lookup");

		let miss_texts: Vec<String> = misses.iter().map(|&i| prefixed[i].clone()).collect();
		let fresh = self.embed_all(&miss_texts)?;
		let mut vectors: Vec<Option<Vec<f32>>> = hashes.iter().map(|h| hits.get(h).cloned()).collect();
		let mut new_entries = Vec::with_capacity(misses.len());
		for (i, v) in misses.into_iter().zip(fresh) {
			new_entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder_id.clone(), vector: v.clone() });
			vectors[i] = Some(v);
		}
		cache.put_many(new_entries);
		vectors
			.into_iter()
			.enumerate()
			.map(|(i, v)| v.ok_or_else(|| anyhow!("no embedding for passage {i}")))
			.collect()
	}

	fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() { return Ok(Vec::new()); }
		let pb = if texts.len() >= PROGRESS_MIN {
			info!("Embedding {} passages with {}", texts.len(), self.embedder.id());
			let pb = ProgressBar::new(texts.len() as u64);
			if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%)") {
				pb.set_style(style.progress_chars("#>-"));
			}
			pb
		} else {
			ProgressBar::hidden()
		};
		let mut out = Vec::with_capacity(texts.len());
		for batch in texts.chunks(BATCH_SIZE) {
			let vectors = self.embedder.embed_batch(batch)?;
			if vectors.len() != batch.len() {
				return Err(anyhow!("embedder returned {} vectors for {} texts", vectors.len(), batch.len()));
			}
			out.extend(vectors);
			pb.inc(batch.len() as u64);
		}
		pb.finish_and_clear();
		Ok(out)
	}

	/// Flat mode: candidate indices by similarity, best first.
	pub fn rank_flat<V: AsRef<[f32]>>(&self, query_vec: &[f32], candidates: &[V], k: usize) -> Vec<(usize, f32)> {
		top_k_flat(query_vec, candidates, k)
	}

	/// Grouped mode: documents by their best chunk similarity.
	pub fn rank_grouped(
		&self,
		query_vec: &[f32],
		scope: &[SourceId],
		groups: &HashMap<SourceId, Vec<Vec<f32>>>,
		k: usize,
	) -> Vec<ScoredCandidate> {
		top_k_grouped(query_vec, scope, groups, k)
	}
}
