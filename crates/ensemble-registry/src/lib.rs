//! Tool registry, visibility model and semantic tool search.

pub mod embedding;
pub mod index;
pub mod registry;

pub use embedding::{cosine_similarity, EmbeddingProvider, LocalEmbedding};
pub use index::{SearchHit, SemanticToolIndex};
pub use registry::{LocalTool, ToolRegistration, ToolRegistry, Visibility};
