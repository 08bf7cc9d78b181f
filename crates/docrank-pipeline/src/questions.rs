//! JSON shapes of the question, rewrite and answer files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use docrank_core::error::{Error, Result};
use docrank_core::types::{Answer, Category, FinanceRanking, Query};

#[derive(Debug, Deserialize)]
struct QuestionFile {
    questions: Vec<Query>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerFile {
    pub answers: Vec<Answer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankingFile {
    pub answers: Vec<FinanceRanking>,
}

/// Reads `{"questions": [{qid, source, query, category}, …]}`.
pub fn read_questions(path: &Path) -> Result<Vec<Query>> {
    let raw = fs::read_to_string(path)?;
    let file: QuestionFile = serde_json::from_str(&raw)?;
    debug!(count = file.questions.len(), path = %path.display(), "read questions");
    Ok(file.questions)
}

/// Reads a `{"<qid>": "<rewritten query>"}` map.
pub fn read_rewrites(path: &Path) -> Result<HashMap<u64, String>> {
    let raw = fs::read_to_string(path)?;
    let map: HashMap<String, String> = serde_json::from_str(&raw)?;
    map.into_iter()
        .map(|(qid, text)| {
            qid.trim()
                .parse::<u64>()
                .map(|qid| (qid, text))
                .map_err(|_| Error::Operation(format!("rewrite key {qid:?} is not a query id")))
        })
        .collect()
}

/// Attaches rewrites to finance queries that do not already carry one.
pub fn apply_rewrites(queries: &mut [Query], rewrites: &HashMap<u64, String>) {
    for q in queries.iter_mut().filter(|q| q.category == Category::Finance && q.rewrite.is_none()) {
        match rewrites.get(&q.qid) {
            Some(text) => q.rewrite = Some(text.clone()),
            None => warn!(qid = q.qid, "no rewrite for finance query"),
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
