pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod gamify;
pub mod interpreter;
pub mod models;
pub mod patterns;
pub mod similarity;

pub use config::OneiricConfig;
pub use embeddings::{
    EmbeddingBackend, EmbeddingClientConfig, EmbeddingError, FallbackEmbeddingClient,
    GeminiEmbeddingClient, GEMINI_DIMENSIONS,
};
pub use error::OneiricError;
pub use interpreter::{DreamAnalysis, GeminiInterpreter, InterpreterError};
pub use patterns::{aggregate_patterns, DreamPatterns};
pub use similarity::{cosine_similarity, rank_by_similarity, RankedMatch};
