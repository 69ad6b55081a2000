//! archivist: retrieval-augmented question answering over a private
//! document corpus.
//!
//! Documents are chunked, embedded and written to a vector store; questions
//! are answered from the best-matching chunks by an external language model.

pub mod artifact;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod context;
pub mod crawl;
pub mod document;
pub mod embed;
pub mod error;
pub mod normalize;
pub mod progress;
pub mod retrieve;
pub mod store;
pub mod synth;

pub use error::{Error, Result};
