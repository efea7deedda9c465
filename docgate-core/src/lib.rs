//! Core types for a generic HTTP gateway over named document collections.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Identifiers** ([`id`]) - Conversion between external hex strings and stored object ids
//! - **Documents** ([`document`]) - JSON/BSON conversion and validated insert bodies
//! - **Query and filtering API** ([`query`]) - Query descriptors, route parameter parsing and updates
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Collections interface** ([`collection`]) - Per-request handles on named collections
//! - **Document store** ([`store`]) - Owner of the backend shared by all requests
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::{query::{Limit, Query}, store::DocumentStore};
//!
//! let store = DocumentStore::new(backend);
//! let cheapest = store
//!     .collection("lessons")
//!     .find(Query::sorted(Limit::parse("3"), "price", "asc"))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod id;
pub mod query;
pub mod store;
