use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use docrank_core::config::EmbeddingSettings;
use docrank_core::traits::Embedder;
use docrank_core::types::SourceId;
use docrank_embed::FakeEmbedder;
use docrank_vector::{cosine_similarity, top_k_grouped, EmbeddingCache, EmbeddingRanker};

/// Records every text it is asked to embed.
struct RecordingEmbedder {
    id: String,
    seen: Arc<Mutex<Vec<String>>>,
    inner: FakeEmbedder,
}

impl RecordingEmbedder {
    fn new(id: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (Self { id: id.to_string(), seen: seen.clone(), inner: FakeEmbedder::new(64) }, seen)
    }
}

impl Embedder for RecordingEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { 64 }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.seen.lock().expect("lock").extend(texts.iter().cloned());
        self.inner.embed_batch(texts)
    }
}

fn texts(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

#[test]
fn a_vector_is_most_similar_to_itself() {
    let e = FakeEmbedder::new(128);
    let v = e.embed_text("保險 理賠 申請");
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
}

#[test]
fn queries_and_passages_get_their_prefixes() {
    let (embedder, seen) = RecordingEmbedder::new("rec");
    let ranker = EmbeddingRanker::new(Box::new(embedder), &EmbeddingSettings::default());
    ranker.embed_query("住院").expect("query");
    ranker.embed_passages(&texts(&["條款"]), None).expect("passages");
    let seen = seen.lock().expect("lock");
    assert_eq!(*seen, vec!["query: 住院".to_string(), "passage:條款".to_string()]);
}

#[test]
fn grouped_ranking_uses_the_best_chunk() {
    let q = vec![1.0, 0.0];
    let mut groups = HashMap::new();
    // doc 1: one strong chunk and one unrelated chunk
    groups.insert(SourceId::Int(1), vec![vec![1.0, 0.05], vec![0.0, 1.0]]);
    // doc 2: uniformly moderate chunks, higher mean than doc 1
    groups.insert(SourceId::Int(2), vec![vec![1.0, 0.6], vec![1.0, 0.6]]);
    let scope = vec![SourceId::Int(2), SourceId::Int(1)];
    let top = top_k_grouped(&q, &scope, &groups, 1);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, SourceId::Int(1));
}

#[test]
fn grouped_ranking_skips_documents_without_chunks() {
    let q = vec![1.0, 0.0];
    let mut groups = HashMap::new();
    groups.insert(SourceId::Int(1), Vec::new());
    groups.insert(SourceId::Int(2), vec![vec![0.0, 1.0]]);
    let scope = vec![SourceId::Int(1), SourceId::Int(2), SourceId::Int(3)];
    let top = top_k_grouped(&q, &scope, &groups, 3);
    assert_eq!(top.iter().map(|c| c.id.clone()).collect::<Vec<_>>(), vec![SourceId::Int(2)]);
}

#[test]
fn grouped_ties_keep_scope_order() {
    let q = vec![1.0, 0.0];
    let mut groups = HashMap::new();
    groups.insert(SourceId::Int(8), vec![vec![1.0, 0.0]]);
    groups.insert(SourceId::Int(3), vec![vec![2.0, 0.0]]);
    let top = top_k_grouped(&q, &[SourceId::Int(8), SourceId::Int(3)], &groups, 2);
    assert_eq!(top[0].id, SourceId::Int(8));
    assert_eq!(top[1].id, SourceId::Int(3));
}

#[test]
fn flat_ranking_through_the_ranker() {
    let ranker = EmbeddingRanker::new(Box::new(FakeEmbedder::new(256)), &EmbeddingSettings::default());
    let passages = ranker.embed_passages(&texts(&["旅遊 延誤 補償", "住院 醫療 給付", "汽車 竊盜"]), None).expect("passages");
    let q = ranker.embed_query("住院 醫療").expect("query");
    let top = ranker.rank_flat(&q, &passages, 1);
    assert_eq!(top[0].0, 1);
}

#[test]
fn cached_passages_are_not_embedded_twice() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("cache").join("embeddings.json");
    let (embedder, seen) = RecordingEmbedder::new("rec-1");
    let ranker = EmbeddingRanker::new(Box::new(embedder), &EmbeddingSettings::default());

    let mut cache = EmbeddingCache::open(&path).expect("open");
    let first = ranker.embed_passages(&texts(&["甲", "乙"]), Some(&mut cache)).expect("embed");
    cache.save().expect("save");
    assert_eq!(seen.lock().expect("lock").len(), 2);

    let mut reopened = EmbeddingCache::open(&path).expect("reopen");
    assert_eq!(reopened.len(), 2);
    let second = ranker.embed_passages(&texts(&["乙", "丙", "甲"]), Some(&mut reopened)).expect("embed");
    assert_eq!(seen.lock().expect("lock").len(), 3, "only the new passage is embedded");
    let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6);
    assert!(close(&second[0], &first[1]));
    assert!(close(&second[2], &first[0]));
}

#[test]
fn cache_entries_are_scoped_by_embedder() {
    let mut cache = EmbeddingCache::in_memory();
    let (a, _) = RecordingEmbedder::new("model-a");
    let (b, seen_b) = RecordingEmbedder::new("model-b");
    let settings = EmbeddingSettings::default();
    EmbeddingRanker::new(Box::new(a), &settings).embed_passages(&texts(&["同一段"]), Some(&mut cache)).expect("a");
    EmbeddingRanker::new(Box::new(b), &settings).embed_passages(&texts(&["同一段"]), Some(&mut cache)).expect("b");
    assert_eq!(seen_b.lock().expect("lock").len(), 1);
    assert_eq!(cache.len(), 2);
    cache.save().expect("in-memory save is a no-op");
}
