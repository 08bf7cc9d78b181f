use std::fs;
use tempfile::TempDir;

use docrank_core::config::ChunkingConfig;
use docrank_core::data_processor::{read_document, DataProcessor, JsonLineExtractor};
use docrank_core::traits::LineExtractor;
use docrank_core::types::{Document, LayoutLine, Page, ScoredCandidate, SourceId};
use docrank_core::{AdaptiveThresholder, HeaderChunker, LengthSplitter};

fn line(text: &str, x1: f32, top: f32) -> LayoutLine {
    LayoutLine { text: text.to_string(), x0: 60.0, x1, top, bottom: top + 12.0 }
}

fn two_page_contract() -> Document {
    let page1 = vec![
        line("本保險契約之前言與說明文字", 520.0, 40.0),
        line("要保人應詳閱下列各項約定內容", 520.0, 60.0),
        line("【保險範圍】", 180.0, 80.0),
        line("被保險人於契約有效期間內遭受意外", 520.0, 100.0),
        line("事故致其身體蒙受傷害時依約給付", 520.0, 120.0),
        line("1", 300.0, 760.0),
    ];
    let page2 = vec![
        line("保險金之給付以保險金額為上限計算", 520.0, 40.0),
        line("並依約定扣除已給付之各項金額。", 520.0, 60.0),
        line("2", 300.0, 760.0),
    ];
    Document { id: SourceId::Int(42), pages: vec![Page { lines: page1 }, Page { lines: page2 }] }
}

#[test]
fn one_header_on_first_page_yields_two_chunks() {
    let chunks = HeaderChunker::new(ChunkingConfig { min_length: 8, ..ChunkingConfig::default() })
        .chunk(&two_page_contract(), None);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].header, None, "content before the first header has no header");
    assert_eq!(chunks[0].content, "本保險契約之前言與說明文字\n要保人應詳閱下列各項約定內容");
    assert_eq!(chunks[1].header.as_deref(), Some("【保險範圍】"));
    assert!(chunks[1].content.ends_with("並依約定扣除已給付之各項金額。"), "page 2 continues the open chunk");
    assert!(!chunks[1].content.contains('2'), "page-number footers are dropped");
}

#[test]
fn headerless_document_becomes_a_single_chunk() {
    let doc = Document {
        id: SourceId::Int(5),
        pages: vec![Page {
            lines: vec![
                line("沒有任何標題的文字內容第一行", 520.0, 40.0),
                line("沒有任何標題的文字內容第二行", 520.0, 60.0),
                line("3", 300.0, 760.0),
            ],
        }],
    };
    let chunks = HeaderChunker::default().chunk(&doc, None);
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].header.is_none());
}

#[test]
fn emitted_chunks_meet_the_length_floor() {
    let config = ChunkingConfig { min_length: 10, ..ChunkingConfig::default() };
    let chunks = HeaderChunker::new(config.clone()).chunk(&two_page_contract(), None);
    for c in &chunks {
        let len: usize = c.content.split('\n').map(|l| l.chars().count()).sum();
        assert!(len >= config.min_length, "chunk {:?} below floor", c.header);
    }
}

#[test]
fn page_range_limits_chunking() {
    let chunks = HeaderChunker::default().chunk(&two_page_contract(), Some(1..2));
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].header.is_none());
    assert!(chunks[0].content.starts_with("保險金之給付"));
}

#[test]
fn split_chunks_fit_the_threshold_unless_a_line_is_oversized() {
    let threshold = 24;
    let splitter = LengthSplitter::new(threshold, vec!['。']);
    let long_line = "長".repeat(40);
    let content = ["第一句話寫在這裡。", "第二句話寫在這裡", long_line.as_str(), "第三句。", "結尾"].join("\n");
    let chunk = docrank_core::types::Chunk { doc_id: SourceId::Int(1), header: None, content };

    for piece in splitter.split_chunk(&chunk) {
        let len = piece.content.chars().count();
        let single_line = piece.content.trim_end_matches('\n').split('\n').count() == 1;
        assert!(len <= threshold || (single_line && piece.content.contains(&long_line)), "piece too long: {len}");
    }
}

#[test]
fn processor_chunks_then_splits() {
    let processor = DataProcessor::new(ChunkingConfig { max_chars: 20, ..ChunkingConfig::default() });
    let chunks = processor.process_document(&two_page_contract());
    assert!(chunks.len() > 2);
    assert!(chunks.iter().all(|c| c.doc_id == SourceId::Int(42)));
    // the 27-character preamble no longer fits in one piece
    assert_eq!(chunks.iter().filter(|c| c.header.is_none()).count(), 2);
    assert!(chunks[2..].iter().all(|c| c.header.as_deref() == Some("【保險範圍】")));
}

#[test]
fn runner_up_cutoff_keeps_scores_above_it() {
    let ranked: Vec<ScoredCandidate> = [10.0f32, 4.0, 3.0, 1.0]
        .iter()
        .enumerate()
        .map(|(i, &score)| ScoredCandidate { id: SourceId::Int(i as u64), score })
        .collect();
    let t = AdaptiveThresholder::new(0.30);
    assert!((t.cutoff(&ranked).expect("cutoff") - 1.2).abs() < 1e-5);
    // 10.0, 4.0 and 3.0 exceed 1.2; 1.0 does not
    assert_eq!(t.kept_count(&ranked), 3);
    assert_eq!(t.select(&ranked).last().map(|c| c.score), Some(3.0));
}

#[test]
fn kept_count_grows_as_ratio_shrinks() {
    let ranked: Vec<ScoredCandidate> = [9.0f32, 6.5, 4.0, 2.0, 1.5, 0.5, 0.0]
        .iter()
        .enumerate()
        .map(|(i, &score)| ScoredCandidate { id: SourceId::Int(i as u64), score })
        .collect();
    let mut previous = 0;
    for step in (0..=20).rev() {
        let ratio = step as f32 * 0.1;
        let kept = AdaptiveThresholder::new(ratio).kept_count(&ranked);
        assert!(kept >= previous, "ratio {ratio}: {kept} < {previous}");
        previous = kept;
    }
}

#[test]
fn json_extractor_reads_documents_by_id() {
    let tmp = TempDir::new().expect("tmp");
    let doc = two_page_contract();
    let nested = tmp.path().join("insurance");
    fs::create_dir_all(&nested).expect("mkdir");
    fs::write(nested.join("42.json"), serde_json::json!({ "pages": doc.pages }).to_string()).expect("write");
    fs::write(tmp.path().join("notes.txt"), "ignored").expect("write");

    let extractor = JsonLineExtractor::open(tmp.path()).expect("open");
    assert_eq!(extractor.ids(), vec![SourceId::Int(42)]);

    let loaded = extractor.extract(&SourceId::Int(42), Some(0..1)).expect("extract");
    assert_eq!(loaded.pages.len(), 1);
    assert_eq!(loaded.pages[0], doc.pages[0]);

    assert!(extractor.extract(&SourceId::Int(7), None).is_err());
    let direct = read_document(&nested.join("42.json")).expect("read");
    assert_eq!(direct.id, SourceId::Int(42));
}

#[test]
fn processor_skips_unreadable_documents() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(tmp.path().join("1.json"), serde_json::json!({ "pages": two_page_contract().pages }).to_string()).expect("write");
    fs::write(tmp.path().join("2.json"), "{ not json").expect("write");

    let extractor = JsonLineExtractor::open(tmp.path()).expect("open");
    let processed = DataProcessor::default().process_all(&extractor, &extractor.ids(), None);
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].0, SourceId::Int(1));
    assert_eq!(processed[0].1.len(), 2);
}
