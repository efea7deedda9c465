//! Collection resolution.
//!
//! Every route under `/collections/{name}` names its collection in the path.
//! [`ResolvedCollection`] is the extractor that binds that segment to the
//! shared store for the duration of one request. Names are not checked
//! against a whitelist and the collection does not have to exist yet.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use tracing::debug;

use docgate_core::{collection::Collection, store::DynDocumentStore};

use crate::{error::ApiError, routes::AppState};

/// Path parameter naming the collection.
pub const COLLECTION_PARAM: &str = "name";

/// A collection name bound to the shared store.
#[derive(Debug, Clone)]
pub struct ResolvedCollection {
    name: String,
    store: Arc<DynDocumentStore>,
}

impl ResolvedCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a handle on the bound collection.
    pub fn handle(&self) -> Collection<'_> {
        self.store.collection(&self.name)
    }
}

impl FromRequestParts<AppState> for ResolvedCollection {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Path(mut params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let name = params
            .remove(COLLECTION_PARAM)
            .ok_or(ApiError::RouteNotMatched)?;
        debug!(collection = %name, "resolved collection");

        Ok(ResolvedCollection {
            name,
            store: state.store(),
        })
    }
}
