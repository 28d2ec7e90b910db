//! Blob and vector persistence for the conflux runtime: an `object_store`
//! backend enum ([`store::ConfluxStore`]), a keyed snapshot surface
//! ([`snapshot::SnapshotStore`]), and an in-memory, persistable vector table
//! ([`vector_table::VectorTable`]) used by `conflux-kb` for chunk embeddings.

pub mod snapshot;
pub mod store;
pub mod vector_table;

pub use object_store::path::Path;
pub use store::ConfluxStore;
pub use vector_table::{VectorRow, VectorTable, cosine_similarity};
