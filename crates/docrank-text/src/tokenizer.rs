use jieba_rs::{Jieba, TokenizeMode};
use once_cell::sync::Lazy;
use tantivy::tokenizer::{Token, TokenStream, Tokenizer};

static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Chinese word segmentation in jieba's search mode: long words are also
/// emitted as their shorter dictionary words. Whitespace tokens are dropped.
#[derive(Clone, Default)]
pub struct JiebaTokenizer;

pub struct JiebaTokenStream {
	tokens: Vec<Token>,
	index: usize,
}

impl Tokenizer for JiebaTokenizer {
	type TokenStream<'a> = JiebaTokenStream;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> JiebaTokenStream {
		// jieba reports char offsets, tantivy wants byte offsets
		let byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
		let byte_at = |c: usize| byte_offsets.get(c).copied().unwrap_or(text.len());
		let tokens = JIEBA
			.tokenize(text, TokenizeMode::Search, true)
			.into_iter()
			.filter(|t| !t.word.trim().is_empty())
			.enumerate()
			.map(|(position, t)| Token {
				offset_from: byte_at(t.start),
				offset_to: byte_at(t.end),
				position,
				text: t.word.to_string(),
				position_length: 1,
			})
			.collect();
		JiebaTokenStream { tokens, index: 0 }
	}
}

impl TokenStream for JiebaTokenStream {
	fn advance(&mut self) -> bool {
		if self.index < self.tokens.len() {
			self.index += 1;
			true
		} else {
			false
		}
	}

	fn token(&self) -> &Token { &self.tokens[self.index - 1] }

	fn token_mut(&mut self) -> &mut Token { &mut self.tokens[self.index - 1] }
}

/// Tokens the registered analyzer would produce for `text`, for inspection.
pub fn search_tokens(text: &str) -> Vec<String> {
	let mut analyzer = crate::tantivy_utils::analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut out = Vec::new();
	while stream.advance() {
		out.push(stream.token().text.clone());
	}
	out
}
