pub mod embedder;
pub mod insights;
pub mod journal;
pub mod progress;
pub mod related;
