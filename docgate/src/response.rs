//! JSON response rendering.

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use bson::Document;
use serde::Serialize;
use serde_json::{Serializer, Value, ser::PrettyFormatter};

use docgate_core::document::document_to_json;

use crate::error::ApiError;

const INDENT: &[u8] = b"   ";

/// A JSON body pretty-printed with a three space indent.
#[derive(Debug, Clone)]
pub struct PrettyJson<T>(pub T);

impl PrettyJson<Value> {
    /// Renders a list of stored documents as a JSON array.
    pub fn documents(documents: &[Document]) -> Self {
        PrettyJson(Value::Array(documents.iter().map(document_to_json).collect()))
    }

    /// Renders a single stored document.
    pub fn document(document: &Document) -> Self {
        PrettyJson(document_to_json(document))
    }
}

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        let mut buf = Vec::with_capacity(256);
        let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));

        match self.0.serialize(&mut serializer) {
            Ok(()) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"))],
                buf,
            )
                .into_response(),
            Err(err) => ApiError::Storage(err.into()).into_response(),
        }
    }
}
