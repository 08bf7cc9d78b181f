use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer};
use tantivy::Index;

use crate::tokenizer::JiebaTokenizer;

pub const TOKENIZER_NAME: &str = "jieba_search";

/// `ord` is the candidate's position in the caller's input.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _id_field = schema_builder.add_text_field("id", STRING | STORED);
	let _ord_field = schema_builder.add_u64_field("ord", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(JiebaTokenizer)
		.filter(LowerCaser)
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, analyzer());
}
