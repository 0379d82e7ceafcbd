//! A small backend relaying text to an OpenAI-compatible chat API.
//!
//! Two flows are exposed over HTTP: a one-shot structured sentiment analysis
//! and a streamed chat. Every completed exchange is stored as one row in a
//! local SQLite table, and the latest rows can be listed.

pub mod accumulator;
pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod provider;
pub mod providers;
pub mod response;
pub mod server;
pub mod sse_stream;
pub mod store;
pub mod types;

pub use accumulator::ReplyAccumulator;
pub use analysis::AnalysisResult;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use provider::ChatProvider;
pub use providers::OpenAIProvider;
pub use response::Response;
pub use sse_stream::SseEvent;
pub use store::{AnalysisRecord, NewRecord, RecordStore};
pub use types::*;
