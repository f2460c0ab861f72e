// Public modules
pub mod accumulating_stream;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod error;
pub mod lines;
pub mod observability;
pub mod pacing;
pub mod reassembler;
pub mod render;
pub mod sse;
pub mod types;
pub mod utils;

// Re-exports
pub use accumulating_stream::{ReassemblingStream, Update};
pub use client::{ChatClient, ServerEventStream};
pub use client_logger::ClientLogger;
pub use config::{ClientConfig, Profile};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use pacing::{Reveal, Typewriter, pace};
pub use reassembler::{CompositeStyle, DisplayMessage, Phase, Reassembler};
pub use render::{PlainTextRenderer, Renderer};
pub use types::*;
