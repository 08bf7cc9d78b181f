//! Sentence-aligned subdivision of oversized chunks.

use std::mem;

use crate::config::ChunkingConfig;
use crate::types::Chunk;

pub struct LengthSplitter {
    max_chars: usize,
    terminals: Vec<char>,
}

impl LengthSplitter {
    pub fn new(max_chars: usize, terminals: Vec<char>) -> Self {
        Self { max_chars, terminals }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_chars, config.sentence_terminals.clone())
    }

    pub fn split(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        chunks.iter().flat_map(|c| self.split_chunk(c)).collect()
    }

    /// Every piece inherits the parent's header and document id.
    pub fn split_chunk(&self, chunk: &Chunk) -> Vec<Chunk> {
        self.split_content(&chunk.content)
            .into_iter()
            .map(|content| Chunk { doc_id: chunk.doc_id.clone(), header: chunk.header.clone(), content })
            .collect()
    }

    /// Packs lines (each keeping its trailing newline) into pieces of at most
    /// `max_chars` characters. A line that alone exceeds the budget becomes
    /// its own oversized piece. A sentence-final line closes the piece once
    /// the budget is reached. A short remainder is folded into the previous
    /// piece when both fit together.
    pub fn split_content(&self, content: &str) -> Vec<String> {
        let max = self.max_chars;
        let mut parts: Vec<(String, usize)> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for line in content.split('\n') {
            let line_len = line.chars().count() + 1;
            if current_len > 0 && current_len + line_len > max {
                parts.push((mem::take(&mut current), current_len));
                current_len = 0;
            }
            current.push_str(line);
            current.push('\n');
            current_len += line_len;

            if self.ends_sentence(line) && current_len >= max {
                parts.push((mem::take(&mut current), current_len));
                current_len = 0;
            }
        }

        if current_len > 0 {
            let fits_previous = parts
                .last()
                .map_or(false, |(_, last_len)| last_len + current_len <= max);
            if (current_len as f64) < max as f64 / 2.0 && fits_previous {
                if let Some((last, last_len)) = parts.last_mut() {
                    last.push_str(&current);
                    *last_len += current_len;
                }
            } else {
                parts.push((current, current_len));
            }
        }

        parts.into_iter().map(|(text, _)| text).collect()
    }

    fn ends_sentence(&self, line: &str) -> bool {
        line.chars().last().is_some_and(|c| self.terminals.contains(&c))
    }
}

impl Default for LengthSplitter {
    fn default() -> Self { Self::from_config(&ChunkingConfig::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceId;

    fn chars(s: &str) -> usize { s.chars().count() }

    #[test]
    fn short_content_stays_whole() {
        let splitter = LengthSplitter::new(20, vec!['。']);
        assert_eq!(splitter.split_content("一行。\n兩行"), vec!["一行。\n兩行\n".to_string()]);
    }

    #[test]
    fn pieces_respect_budget() {
        let splitter = LengthSplitter::new(10, vec!['。']);
        let parts = splitter.split_content("abcd\nefgh\nijkl\nmnop");
        assert_eq!(parts, vec!["abcd\nefgh\n".to_string(), "ijkl\nmnop\n".to_string()]);
        assert!(parts.iter().all(|p| chars(p) <= 10));
    }

    #[test]
    fn sentence_end_at_budget_closes_piece() {
        let splitter = LengthSplitter::new(6, vec!['。']);
        let parts = splitter.split_content("abcd。\nxyz");
        assert_eq!(parts, vec!["abcd。\n".to_string(), "xyz\n".to_string()]);
    }

    #[test]
    fn oversized_line_becomes_its_own_piece() {
        let splitter = LengthSplitter::new(8, vec!['。']);
        let long = "x".repeat(20);
        let parts = splitter.split_content(&format!("ab\n{long}\ncd"));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], format!("{long}\n"));
        for p in [&parts[0], &parts[2]] {
            assert!(chars(p) <= 8);
        }
    }

    #[test]
    fn split_pieces_inherit_header() {
        let chunk = Chunk {
            doc_id: SourceId::Int(7),
            header: Some("【給付】".to_string()),
            content: "甲乙丙丁\n戊己庚辛\n壬癸".to_string(),
        };
        let pieces = LengthSplitter::new(6, vec!['。']).split_chunk(&chunk);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.header.as_deref() == Some("【給付】") && p.doc_id == SourceId::Int(7)));
    }
}
