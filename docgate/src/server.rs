//! # Gateway server
//!
//! Opens the document store described by the configuration, builds the
//! router and serves it until Ctrl-C, then closes the store once.

use std::{io, net::SocketAddr, sync::Arc};

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use docgate_core::{
    backend::StoreBackendBuilder,
    document::LESSONS_COLLECTION,
    error::{DocumentStoreError, DocumentStoreResult},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
};
use docgate_memory::InMemoryStore;

use crate::{
    config::{BackendKind, ConfigError, GatewayConfig},
    routes::{AppState, build_router},
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
    #[error(transparent)]
    Store(#[from] DocumentStoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Opens the configured backend and prepares the lessons text index.
///
/// # Errors
///
/// Fails if the backend cannot be reached or the index cannot be created.
pub async fn open_store(config: &GatewayConfig) -> DocumentStoreResult<DynDocumentStore> {
    let store = match config.database.backend {
        BackendKind::Memory => DocumentStore::new(InMemoryStore::builder().build().await?).into_dyn(),
        BackendKind::Mongodb => open_mongodb(config).await?,
    };
    info!(backend = %config.database.backend, database = %config.database.name, "document store ready");

    if config.search.ensure_index {
        store
            .create_text_index(LESSONS_COLLECTION, &config.search.fields)
            .await?;
    }

    Ok(store)
}

#[cfg(feature = "mongodb")]
async fn open_mongodb(config: &GatewayConfig) -> DocumentStoreResult<DynDocumentStore> {
    let backend = docgate_mongodb::MongoDbStore::builder(
        &config.database.connection_string(),
        &config.database.name,
    )
    .build()
    .await?;

    Ok(DocumentStore::new(backend).into_dyn())
}

#[cfg(not(feature = "mongodb"))]
async fn open_mongodb(_config: &GatewayConfig) -> DocumentStoreResult<DynDocumentStore> {
    Err(DocumentStoreError::Initialization(
        "docgate was built without the `mongodb` feature".to_string(),
    ))
}

/// HTTP server for the gateway
pub struct GatewayServer {
    config: GatewayConfig,
    store: Arc<DynDocumentStore>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, store: DynDocumentStore) -> Self {
        Self {
            config,
            store: Arc::new(store),
        }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.server.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Result<Router, ServerError> {
        Ok(build_router(AppState::new(Arc::clone(&self.store)), &self.config)?)
    }

    /// Serves until Ctrl-C, then shuts the store down.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .socket_addr()
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.socket_addr()))?;

        let router = self.router()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(%addr, "gateway listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServerError::Serve)?;

        info!("shutting down document store");
        match Arc::try_unwrap(self.store) {
            Ok(store) => store.shutdown().await?,
            Err(_) => warn!("document store still in use, skipping shutdown"),
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
