//! Domain types used by the chunking, ranking and orchestration crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of a retrievable source unit.
///
/// FAQ entries and insurance documents are numbered; finance pages carry
/// string ids of the form `{doc}_p{page}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Int(u64),
    Text(String),
}

impl SourceId {
    /// Numeric strings become `Int`, anything else stays `Text`.
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<u64>() {
            Ok(n) => SourceId::Int(n),
            Err(_) => SourceId::Text(s.to_string()),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Int(n) => write!(f, "{n}"),
            SourceId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for SourceId {
    fn from(n: u64) -> Self { SourceId::Int(n) }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self { SourceId::Text(s.to_string()) }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self { SourceId::Text(s) }
}

/// Splits a finance page id `{doc}_p{page}` into its document prefix and page number.
pub fn split_page_id(id: &str) -> Option<(&str, u32)> {
    let (doc, page) = id.rsplit_once("_p")?;
    page.parse().ok().map(|p| (doc, p))
}

/// One extracted text line with its layout box.
///
/// `x0`/`x1` are the left/right horizontal extent, `top`/`bottom` the
/// vertical extent, all in page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
}

impl LayoutLine {
    pub fn height(&self) -> f32 { self.bottom - self.top }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub lines: Vec<LayoutLine>,
}

/// A source document as delivered by the text extractor. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: SourceId,
    pub pages: Vec<Page>,
}

/// A line classified as a section header. `page` is 1-based within the
/// considered page range; `right_margin` is the distance from the page's
/// majority right edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCandidate {
    pub page: usize,
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub right_margin: f32,
}

/// A contiguous, header-attributed segment of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: SourceId,
    pub header: Option<String>,
    pub content: String,
}

impl Chunk {
    /// Text handed to the embedder: header and content with line breaks removed.
    pub fn embedding_text(&self) -> String {
        let mut text = self.header.clone().unwrap_or_default();
        text.push_str(&self.content);
        text.replace('\n', "")
    }
}

/// A candidate paired with a lexical or embedding score; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: SourceId,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Faq,
    Insurance,
    Finance,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Faq => "faq",
            Category::Insurance => "insurance",
            Category::Finance => "finance",
        })
    }
}

/// A user query scoped to a list of candidate source ids.
///
/// `rewrite` carries the externally rewritten query text used by the
/// finance lexical stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub qid: u64,
    pub category: Category,
    pub query: String,
    pub source: Vec<SourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
}

/// What a retriever returns for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Retrieved {
    Ranked(Vec<SourceId>),
    Single(SourceId),
    /// Unmapped judge output kept verbatim.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub qid: u64,
    pub retrieve: Retrieved,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the finance lexical stage before judging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceRanking {
    pub qid: u64,
    pub retrieve: Vec<SourceId>,
    pub scores: Vec<f32>,
}

/// A rendered page handed to the visual judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub id: SourceId,
    pub path: PathBuf,
}
