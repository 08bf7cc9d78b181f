//! Score-relative shortlist selection.
//!
//! Instead of a fixed top-k, keep every candidate whose score exceeds a
//! fraction of the runner-up's score.

use crate::types::ScoredCandidate;

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveThresholder {
    ratio: f32,
}

impl Default for AdaptiveThresholder {
    fn default() -> Self { Self { ratio: 0.30 } }
}

impl AdaptiveThresholder {
    pub fn new(ratio: f32) -> Self { Self { ratio } }

    /// `ratio * score[1]`, or `None` when fewer than two candidates exist.
    pub fn cutoff(&self, ranked: &[ScoredCandidate]) -> Option<f32> {
        ranked.get(1).map(|runner_up| self.ratio * runner_up.score)
    }

    /// Number of leading candidates to keep. With fewer than two candidates
    /// there is no runner-up and everything is kept.
    pub fn kept_count(&self, ranked: &[ScoredCandidate]) -> usize {
        match self.cutoff(ranked) {
            Some(cutoff) => ranked.iter().filter(|c| c.score > cutoff).count().min(ranked.len()),
            None => ranked.len(),
        }
    }

    /// The kept prefix of an already descending-sorted list.
    pub fn select<'a>(&self, ranked: &'a [ScoredCandidate]) -> &'a [ScoredCandidate] {
        &ranked[..self.kept_count(ranked)]
    }
}
