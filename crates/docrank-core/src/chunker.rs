//! Layout-driven header detection and header-bounded chunking.
//!
//! Contract text carries no explicit structure, so section breaks are inferred
//! from line geometry: header lines stop well short of the page's usual right
//! edge and either sit in `【…】` brackets or read like `第…條` article titles.

use std::collections::HashSet;
use std::ops::Range;

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document, HeaderCandidate, LayoutLine, Page};

const OPEN_BRACKET: char = '【';
const CLOSE_BRACKET: char = '】';
const ARTICLE_MARK: char = '第';
const CLAUSE_MARK: char = '條';
const CHINESE_NUMERALS: &str = "一二三四五六七八九十百千";

pub struct HeaderChunker {
    config: ChunkingConfig,
}

impl Default for HeaderChunker {
    fn default() -> Self { Self::new(ChunkingConfig::default()) }
}

impl HeaderChunker {
    pub fn new(config: ChunkingConfig) -> Self { Self { config } }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Finds header lines page by page.
    ///
    /// The trailing line of each page is ignored as a likely page number.
    /// Bracketed lines win; article-style lines are only considered on pages
    /// without any bracketed header.
    pub fn detect_headers(&self, doc: &Document, pages: Option<Range<usize>>) -> Vec<HeaderCandidate> {
        let mut headers = Vec::new();
        for (page_idx, page) in select_pages(&doc.pages, pages).iter().enumerate() {
            let mut lines: &[LayoutLine] = &page.lines;
            if lines.is_empty() {
                continue;
            }
            if lines.len() > 1 {
                lines = &lines[..lines.len() - 1];
            }
            let Some(majority_right) = majority(lines.iter().map(|l| l.x1)) else { continue };
            let limit = majority_right - self.config.header_margin;

            let bracketed: Vec<&LayoutLine> = lines
                .iter()
                .filter(|l| l.x1 < limit && is_bracketed(&l.text))
                .collect();
            let selected = if bracketed.is_empty() {
                lines.iter().filter(|l| l.x1 < limit && is_article_title(&l.text)).collect()
            } else {
                bracketed
            };

            headers.extend(selected.into_iter().map(|l| HeaderCandidate {
                page: page_idx + 1,
                text: l.text.clone(),
                x0: l.x0,
                x1: l.x1,
                right_margin: majority_right - l.x1,
            }));
        }
        debug!(doc = %doc.id, count = headers.len(), "detected headers");
        headers
    }

    /// Splits the document into header-led chunks.
    ///
    /// Content before the first header forms a headerless chunk. Chunks whose
    /// content is shorter than `min_length` characters are discarded. A
    /// document without headers yields one headerless chunk.
    pub fn chunk(&self, doc: &Document, pages: Option<Range<usize>>) -> Vec<Chunk> {
        let headers = self.detect_headers(doc, pages.clone());
        let header_texts: HashSet<&str> = headers.iter().map(|h| h.text.as_str()).collect();

        let mut chunks = Vec::new();
        let mut header: Option<String> = None;
        let mut body: Vec<&str> = Vec::new();
        for line in self.line_stream(select_pages(&doc.pages, pages)) {
            if header_texts.contains(line) {
                self.close_chunk(doc, header.take(), &body, &mut chunks);
                body.clear();
                header = Some(line.to_string());
            } else {
                body.push(line);
            }
        }
        self.close_chunk(doc, header, &body, &mut chunks);
        debug!(doc = %doc.id, chunks = chunks.len(), "chunked by headers");
        chunks
    }

    /// Concatenated page lines with running headers and page-number footers removed.
    fn line_stream<'a>(&self, pages: &'a [Page]) -> Vec<&'a str> {
        let mut stream = Vec::new();
        for page in pages {
            let mut lines: &[LayoutLine] = &page.lines;
            if lines.is_empty() {
                continue;
            }
            let heights: Vec<f32> = lines.iter().map(|l| round_tenth(l.height())).collect();
            if let Some(major_height) = majority(heights.iter().copied()) {
                if heights[0] < major_height * self.config.running_header_ratio {
                    lines = &lines[1..];
                }
            }
            if lines.len() > 1 {
                lines = &lines[..lines.len() - 1];
            }
            stream.extend(lines.iter().map(|l| l.text.as_str()));
        }
        stream
    }

    fn close_chunk(&self, doc: &Document, header: Option<String>, body: &[&str], out: &mut Vec<Chunk>) {
        if body.is_empty() {
            return;
        }
        let length: usize = body.iter().map(|l| l.chars().count()).sum();
        if length < self.config.min_length {
            debug!(doc = %doc.id, length, "dropping short chunk");
            return;
        }
        out.push(Chunk { doc_id: doc.id.clone(), header, content: body.join("\n") });
    }
}

/// Python-style clamped slice of a page range.
pub fn select_pages(pages: &[Page], range: Option<Range<usize>>) -> &[Page] {
    match range {
        Some(r) => {
            let end = r.end.min(pages.len());
            let start = r.start.min(end);
            &pages[start..end]
        }
        None => pages,
    }
}

fn is_bracketed(text: &str) -> bool {
    text.contains(OPEN_BRACKET) && text.contains(CLOSE_BRACKET)
}

fn is_article_title(text: &str) -> bool {
    text.contains(ARTICLE_MARK)
        && text.contains(CLAUSE_MARK)
        && text.chars().any(|c| CHINESE_NUMERALS.contains(c))
}

fn round_tenth(v: f32) -> f32 { (v * 10.0).round() / 10.0 }

/// Most frequent value; the earliest seen wins ties.
fn majority(values: impl IntoIterator<Item = f32>) -> Option<f32> {
    let mut counts: Vec<(f32, usize)> = Vec::new();
    for v in values {
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some(entry) => entry.1 += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best: Option<(f32, usize)> = None;
    for (v, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v)
}
