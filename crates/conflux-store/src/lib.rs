//! The C3 Pipeline Context Store: a per-conversation key/value store
//! addressable either by flat namespace (`global`, `nodes`, ad-hoc isolated
//! namespaces) or by the `(user, topic, agent)` 3-D coordinate, plus
//! memory/context-engineering helpers and LLM-driven knowledge extraction
//! layered on top.
//!
//! Grounded throughout on
//! the original implementation's `Pipeline` class.

pub mod context_ops;
pub mod dimensions;
pub mod history;
pub mod knowledge;
pub mod memory;
pub mod pipeline;
pub mod snapshot;

pub use context_ops::{CompressionReport, CompressionStrategy, ContextItem, MergeReport, MergeStrategy, SortBy, WriteStrategy};
pub use dimensions::{Context, Dimensions};
pub use history::{History, HistoryEntry, HistoryScope, DEFAULT_HISTORY_CAP};
pub use knowledge::DimensionKnowledge;
pub use memory::MemoryMatch;
pub use pipeline::{FileEntry, Pipeline, Target, GLOBAL_NAMESPACE, NODES_NAMESPACE};
pub use snapshot::{load_snapshot, save_snapshot, FrontendExport, PipelineExport, PipelineImport};
