mod chunk;
mod config;
mod conversation;
mod search;

pub use chunk::{Chunk, ChunkMetadata};
pub use config::{
    Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_TOP_K,
    EmbeddingApi, EmbeddingConfig, IndexingConfig, SearchConfig, StorageConfig, VectorDriver,
    VectorStoreConfig,
};
pub use conversation::{Conversation, ConversationSummary, Message, Role};
pub use search::{IndexStats, IndexStatus, OutputFormat, ScoredChunk, SearchResults};
