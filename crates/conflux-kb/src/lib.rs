//! The C7 Hybrid Retrieval engine: chunking strategies, domain
//! classification, a keyword inverted index and brute-force vector search,
//! an optional reranker seam, query decomposition, and the [`query`]
//! pipeline that merges all of the above into a [`RetrievalResult`]
//!, grounded throughout on
//! the original implementation.
//!
//! [`GraphEnhancer`] is the seam `conflux-graph` implements to boost
//! entity-referenced chunks and append a triples context, without this
//! crate depending on `conflux-graph` directly.

pub mod chunking;
pub mod config;
pub mod decompose;
pub mod domain;
pub mod keyword_index;
pub mod rerank;
pub mod retrieval;
pub mod summary;
pub mod vector_search;

pub use chunking::{chunk_document, ChunkParams, ChunkStrategy, RawChunk};
pub use config::RetrievalConfig;
pub use keyword_index::{KeywordIndex, KeywordMatch};
pub use rerank::{PassthroughReranker, Reranker};
pub use retrieval::{query, GraphEnhancer, KbIndex, RetrievalResult, Source};
pub use vector_search::{vector_search, VectorMatch};
