//! Core types shared by the provider, the flows and the server.

pub mod message;
pub mod prompt;
pub mod streaming;

pub use message::*;
pub use prompt::*;
pub use streaming::*;
