mod chunker;
mod conversation;
mod embedding;
pub mod extractor;
mod index;
mod retriever;
pub mod vector_store;

pub use chunker::TextChunker;
pub use conversation::ConversationStore;
pub use embedding::{EmbeddingClient, EmbeddingProvider, HashEmbedder, create_provider};
pub use extractor::{DocumentFormat, extract};
pub use index::VectorIndex;
pub use retriever::{IngestOutcome, IngestReport, Retriever};
