//! search-mcp - semantic search across many indexed folders at once.
//!
//! Every configured folder has its own collection in a local vector store.
//! A query is embedded once with [ColBERT](https://github.com/stanford-futuredata/ColBERT),
//! sent to every folder's collection concurrently, and the per-folder results
//! are merged into one ranked list. A folder that fails or times out shows up
//! as an error entry instead of failing the whole request.
//!
//! The same search is exposed as two MCP tools, `list_directories` and
//! `search`, over stdio.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use search_mcp::{
//!     ColbertEmbedder, DataDir, FolderConfig, ModelManager, Registry,
//!     SearchOptions, Searcher, VectorDb,
//! };
//!
//! # async fn run() -> search_mcp::Result<()> {
//! let config = FolderConfig::load(&FolderConfig::locate(None)?)?;
//! let data_dir = DataDir::resolve(None)?;
//! let store = VectorDb::open(&data_dir.vector_store())?;
//! let registry = Registry::build(&config.folders, &store)?;
//!
//! let searcher = Searcher::new(
//!     Arc::new(registry),
//!     Arc::new(ColbertEmbedder::new(ModelManager::new())),
//!     SearchOptions::default(),
//! );
//!
//! for hit in searcher.search("rust ownership", 5, None).await {
//!     if let Some(r) = hit.as_match() {
//!         println!("{} (score: {:.3})", r.file_path, r.score);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod identity;
pub mod mcp;
pub mod model_manager;
pub mod registry;
pub mod search;
pub mod text_util;
pub mod vector_store;

pub use config::FolderConfig;
pub use data_dir::DataDir;
pub use embedding::{ColbertEmbedder, Embedder};
pub use error::{Error, Result};
pub use executor::SearchResult;
pub use identity::{CollectionName, FolderIdentity};
pub use model_manager::ModelManager;
pub use registry::Registry;
pub use search::{SearchHit, SearchOptions, Searcher};
pub use vector_store::{VectorDb, VectorStore};
