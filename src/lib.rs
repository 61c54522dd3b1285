//! docask - ask questions about a long manual through a bounded context window.
//!
//! A document is split into overlapping line-aligned chunks. For each question
//! the crate extracts Czech keywords, widens them with domain synonyms and
//! crude stem variants, scores every chunk by occurrence count, and assembles
//! the leading chunks plus the best matches into a context that never exceeds
//! a fixed character budget. The context is then sent to a completion service
//! together with the conversation so far.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docask::{Session, completion::AnthropicProvider};
//!
//! # async fn run() -> docask::Result<()> {
//! let session = Session::default()
//!     .with_provider(Arc::new(AnthropicProvider::new(
//!         "sk-...",
//!         docask::completion::DEFAULT_MODEL,
//!     )));
//! session.load_file(std::path::Path::new("navod.pdf"))?;
//!
//! let context = session.context("Jak vyměnit filtr?")?;
//! println!("keywords: {:?}", context.keywords);
//!
//! let answer = session.answer("Jak vyměnit filtr?", &[]).await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod completion;
pub mod config_db;
pub mod data_dir;
pub mod document;
pub mod error;
pub mod ingestion;
pub mod keywords;
pub mod mcp;
pub mod retrieval;
pub mod session;
pub mod stemming;
pub mod synonyms;

pub use chunking::{Chunk, ChunkingConfig};
pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use document::{Document, DocumentStore, DocumentSummary};
pub use error::{Error, Result};
pub use retrieval::{RetrievalConfig, RetrievedContext};
pub use session::Session;
