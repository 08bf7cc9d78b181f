use std::collections::HashMap;

use docrank_core::traits::LexicalScorer;
use docrank_core::types::SourceId;
use docrank_text::tokenizer::search_tokens;
use docrank_text::LexicalRanker;

fn corpus(texts: &[(&str, &str)]) -> Vec<(SourceId, String)> {
	texts.iter().map(|(id, t)| (SourceId::parse(id), t.to_string())).collect()
}

#[test]
fn empty_corpus_ranks_to_empty_list() {
	let ranked = LexicalRanker::new().rank("anything", &[]).expect("rank");
	assert!(ranked.is_empty());
}

#[test]
fn matching_candidate_ranks_first_and_everyone_is_returned() {
	let c = corpus(&[
		("1", "the weather report for tomorrow"),
		("2", "quarterly revenue grew sharply this year"),
		("3", "a recipe for dumplings"),
	]);
	let ranked = LexicalRanker::new().rank("revenue growth", &c).expect("rank");
	assert_eq!(ranked.len(), 3);
	assert_eq!(ranked[0].id, SourceId::Int(2));
	assert!(ranked[0].score > 0.0);
	// unmatched candidates score zero and keep their input order
	assert_eq!(ranked[1].id, SourceId::Int(1));
	assert_eq!(ranked[1].score, 0.0);
	assert_eq!(ranked[2].id, SourceId::Int(3));
}

#[test]
fn chinese_query_finds_the_page_that_mentions_it() {
	let c = corpus(&[
		("a_p1", "公司治理報告與董事會組成說明"),
		("a_p2", "本年度，營業收入，較去年同期成長"),
		("a_p3", "員工福利與退休金制度"),
	]);
	let ranked = LexicalRanker::new().rank("營業收入？", &c).expect("rank");
	assert_eq!(ranked[0].id, SourceId::Text("a_p2".into()));
	assert!(ranked[0].score > ranked[1].score);
}

#[test]
fn scores_do_not_depend_on_candidate_order() {
	let c = corpus(&[
		("1", "insurance claim for hospital stay"),
		("2", "hospital stay and surgery benefits"),
		("3", "travel delay compensation"),
		("4", "surgery benefits limits per claim"),
	]);
	let mut reversed = c.clone();
	reversed.reverse();
	let ranker = LexicalRanker::new();
	let by_id = |v: Vec<docrank_core::types::ScoredCandidate>| -> HashMap<SourceId, f32> {
		v.into_iter().map(|s| (s.id, s.score)).collect()
	};
	let forward = by_id(ranker.rank("hospital surgery claim", &c).expect("rank"));
	let backward = by_id(ranker.rank("hospital surgery claim", &reversed).expect("rank"));
	assert_eq!(forward, backward);
}

#[test]
fn identical_texts_tie_in_input_order() {
	let c = corpus(&[("9", "same words here"), ("4", "same words here"), ("7", "other")]);
	let ranked = LexicalRanker::new().rank("same words", &c).expect("rank");
	assert_eq!(ranked[0].id, SourceId::Int(9));
	assert_eq!(ranked[1].id, SourceId::Int(4));
	assert_eq!(ranked[0].score, ranked[1].score);
}

#[test]
fn scores_are_rounded_to_four_decimals() {
	let c = corpus(&[("1", "alpha beta gamma"), ("2", "beta delta"), ("3", "epsilon")]);
	let scorer: &dyn LexicalScorer = &LexicalRanker::new();
	for s in scorer.rank("beta gamma", &c).expect("rank") {
		let scaled = s.score * 10_000.0;
		assert!((scaled - scaled.round()).abs() < 1e-2, "{} not rounded", s.score);
	}
}

#[test]
fn query_and_documents_share_one_analyzer() {
	let tokens = search_tokens("Revenue 營業收入");
	assert!(tokens.contains(&"revenue".to_string()));
	assert!(tokens.iter().any(|t| t.chars().all(|c| !c.is_ascii())));
}
