//! In-memory document storage backend for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests, where running a MongoDB server is not worth it.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Schema-less storage** - Stores documents as BSON for flexibility
//! - **Query support** - Filtering, sorting and limits
//! - **Text search** - Word, negation and phrase matching over declared text-indexed fields
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{DocumentStore, memory::InMemoryStore, backend::StoreBackendBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .text_index("lessons", ["subject", "location"])
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!
//!     let found = store.collection("lessons").search("math").await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

pub mod store;
pub mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
