//! Visual-judge plumbing: output parsing and offline judges.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use docrank_core::error::Result;
use docrank_core::traits::VisualJudge;
use docrank_core::types::{PageImage, Retrieved, SourceId};

static OUTPUT_FORMAT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)<output_format>(.*?)</output_format>").ok());

const TOP_ONE_KEY: &str = "top 1";

/// Trimmed contents of the first `<output_format>` block, or the whole text
/// untouched when there is none.
pub fn extract_output_format(text: &str) -> &str {
    OUTPUT_FORMAT
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str().trim())
}

/// The judge's pick: the `"top 1"` member when the reduced text is a JSON
/// object carrying one, otherwise the reduced text itself.
pub fn judge_value(text: &str) -> String {
    let reduced = extract_output_format(text);
    match serde_json::from_str::<Value>(reduced) {
        Ok(Value::Object(obj)) => match obj.get(TOP_ONE_KEY) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
                (Some(i), _) => i.to_string(),
                (None, Some(f)) if f.fract() == 0.0 && f >= 0.0 => format!("{f:.0}"),
                _ => n.to_string(),
            },
            _ => {
                warn!("judge output has no usable \"{TOP_ONE_KEY}\" member");
                reduced.to_string()
            }
        },
        _ => {
            warn!("judge output is not a JSON object");
            reduced.to_string()
        }
    }
}

/// Maps the judge's 1-based pick back onto `shortlist`. Anything that is not
/// a position within the shortlist is kept verbatim.
pub fn map_judge_output(text: &str, shortlist: &[SourceId]) -> Retrieved {
    let value = judge_value(text);
    let picked = value
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| shortlist.get(i));
    match picked {
        Some(id) => {
            debug!(%id, "judge pick mapped");
            Retrieved::Single(id.clone())
        }
        None => {
            warn!(value = %value, candidates = shortlist.len(), "judge pick is not a shortlist position; keeping raw value");
            Retrieved::Raw(value)
        }
    }
}

/// Replays stored judge responses keyed by query text.
pub struct RecordedJudge {
    responses: HashMap<String, String>,
}

impl RecordedJudge {
    pub fn new(responses: HashMap<String, String>) -> Self { Self { responses } }

    /// Reads a `{"<query text>": "<response>"}` file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&raw)?))
    }
}

impl VisualJudge for RecordedJudge {
    fn judge(&self, query: &str, _pages: &[PageImage]) -> anyhow::Result<String> {
        self.responses
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no recorded judge response for query {query:?}"))
    }
}

/// Adapts a closure into a judge.
pub struct ClosureJudge<F>(pub F);

impl<F> ClosureJudge<F>
where
    F: Fn(&str, &[PageImage]) -> anyhow::Result<String> + Send + Sync,
{
    pub fn new(f: F) -> Self { Self(f) }
}

impl<F> VisualJudge for ClosureJudge<F>
where
    F: Fn(&str, &[PageImage]) -> anyhow::Result<String> + Send + Sync,
{
    fn judge(&self, query: &str, pages: &[PageImage]) -> anyhow::Result<String> { (self.0)(query, pages) }
}
