use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

use docrank_core::types::{ScoredCandidate, SourceId};

/// Cosine of the angle between `a` and `b`; 0 when either is a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if na == 0.0 || nb == 0.0 {
		return 0.0;
	}
	dot / (na * nb)
}

fn by_score_desc(a: f32, b: f32) -> Ordering { b.partial_cmp(&a).unwrap_or(Ordering::Equal) }

/// Indices of the `k` candidates most similar to `query`, best first.
/// Equal similarities keep candidate order.
pub fn top_k_flat<V: AsRef<[f32]>>(query: &[f32], candidates: &[V], k: usize) -> Vec<(usize, f32)> {
	let mut scored: Vec<(usize, f32)> = candidates
		.iter()
		.enumerate()
		.map(|(i, v)| (i, cosine_similarity(query, v.as_ref())))
		.collect();
	scored.sort_by(|a, b| by_score_desc(a.1, b.1));
	scored.truncate(k);
	scored
}

/// Ranks the documents in `scope` by their best chunk similarity.
///
/// A document scores as its single most similar chunk, so one strong chunk
/// outranks a document that is moderately similar throughout. Documents with
/// no chunk vectors, or absent from `groups`, are skipped.
pub fn top_k_grouped(
	query: &[f32],
	scope: &[SourceId],
	groups: &HashMap<SourceId, Vec<Vec<f32>>>,
	k: usize,
) -> Vec<ScoredCandidate> {
	let mut scored = Vec::with_capacity(scope.len());
	for id in scope {
		let Some(chunks) = groups.get(id) else {
			warn!(%id, "document has no embeddings; skipping");
			continue;
		};
		let best = chunks
			.iter()
			.map(|v| cosine_similarity(query, v))
			.fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |m| m.max(s))));
		match best {
			Some(score) => scored.push(ScoredCandidate { id: id.clone(), score }),
			None => warn!(%id, "document has zero chunks; skipping"),
		}
	}
	scored.sort_by(|a, b| by_score_desc(a.score, b.score));
	scored.truncate(k);
	scored
}
