pub mod tokenizer;
pub mod stopwords;
pub mod analyzer;
