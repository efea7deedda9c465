//! A generic HTTP gateway over named document collections.
//!
//! This crate is the primary entry point of docgate. It exposes a small REST
//! surface whose first path segment after `/collections` names the collection
//! to operate on, translates positional path parameters into queries and maps
//! storage outcomes to HTTP responses. It also re-exports the core types and
//! the storage backends from the sub-crates.
//!
//! # Features
//!
//! - **Caller-named collections** - Any collection name is accepted and bound per request
//! - **Query translation** - `max`, sort field and direction path segments become a query descriptor
//! - **Full-text search** - Text search over the `lessons` collection
//! - **Multiple backends** - MongoDB for production, an in-memory store for development and tests
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{config::GatewayConfig, server::{GatewayServer, open_store}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::load("docgate.toml".as_ref())?;
//!     let store = open_store(&config).await?;
//!
//!     GatewayServer::new(config, store).start().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing Against The Router
//!
//! [`server::GatewayServer::router`] builds the complete `axum::Router`, so
//! requests can be driven through it with `tower::ServiceExt::oneshot` and an
//! in-memory store without binding a socket.
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod config;
pub mod error;
pub mod prelude;
pub mod resolve;
pub mod response;
pub mod routes;
pub mod server;

pub use docgate_core::{backend, collection, document, id, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
