// Library interface for rivalscope modules
// This allows tests and other binaries to import modules

pub mod digest;
pub mod dispatch;
pub mod ingestion;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod recency;
pub mod scraping;
pub mod server;
pub mod storage;
pub mod tasks;
