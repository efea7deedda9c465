//! MongoDB backend implementation for docgate.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! storing documents with server-assigned `ObjectId` identifiers and delegating
//! filtering, sorting and full-text search to the MongoDB query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`
//! (it is enabled by default):
//!
//! ```toml
//! [dependencies]
//! docgate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Query support** - Leverages MongoDB's query engine for filtering and sorting
//! - **Text search** - `$text` queries over a text index created at startup
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//!
//! # Connection
//!
//! The builder takes a connection string and a database name. Building the
//! backend pings the server, so connection problems surface at startup.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "webstore")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_mongodb;

pub mod store;
pub mod query;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
