//! Document shapes and JSON/BSON conversion.
//!
//! Documents are schema-less [`bson::Document`] values. Request bodies arrive
//! as JSON and are validated at the boundary into a [`DocumentBody`], a tagged
//! union of the shapes the gateway knows about: generic documents and
//! [`OrderDocument`]s. Responses are rendered back to JSON with identifiers as
//! plain hex strings.

use bson::{Bson, Document, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    id::ID_FIELD,
};

/// Collection whose inserts must satisfy the [`OrderDocument`] shape.
pub const ORDERS_COLLECTION: &str = "orders";

/// Collection searched by free-text queries and holding bookable spaces.
pub const LESSONS_COLLECTION: &str = "lessons";

/// Remaining capacity counter on a lesson.
pub const SPACES_FIELD: &str = "spaces";

/// Converts a JSON request body into a BSON document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if the value is not a JSON object.
pub fn document_from_json(value: Value) -> DocumentStoreResult<Document> {
    if !value.is_object() {
        return Err(DocumentStoreError::InvalidDocument(format!(
            "expected a JSON object, found {}",
            json_kind(&value)
        )));
    }

    match serialize_to_bson(&value)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a document, found {:?}",
            other.element_type()
        ))),
    }
}

/// Renders a stored document as JSON.
pub fn document_to_json(document: &Document) -> Value {
    Value::Object(
        document
            .iter()
            .map(|(key, value)| (key.clone(), bson_to_json(value)))
            .collect::<Map<_, _>>(),
    )
}

/// Renders a single BSON value as JSON.
///
/// Object ids become their hex string so that they can be fed straight back
/// into a URL; everything else uses relaxed extended JSON.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(document) => document_to_json(document),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        other => other.clone().into_relaxed_extjson(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// An order placed against one or more lessons.
///
/// Besides arbitrary extra fields an order must carry a non-empty `name`, a
/// non-empty `phoneNumber` and a `lessonIDs` array of identifier-like scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDocument {
    document: Document,
}

impl OrderDocument {
    /// Returns the customer name.
    pub fn name(&self) -> &str {
        self.document.get_str("name").unwrap_or_default()
    }

    /// Returns the ordered lesson references.
    pub fn lesson_ids(&self) -> &[Bson] {
        self.document
            .get_array("lessonIDs")
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }

    /// Consumes the order, returning the document to store.
    pub fn into_document(self) -> Document {
        self.document
    }
}

impl TryFrom<Document> for OrderDocument {
    type Error = DocumentStoreError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        for field in ["name", "phoneNumber"] {
            match document.get(field) {
                Some(Bson::String(value)) if !value.is_empty() => {}
                _ => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "order field `{field}` must be a non-empty string"
                    )));
                }
            }
        }

        let lesson_ids = match document.get("lessonIDs") {
            Some(Bson::Array(ids)) => ids,
            _ => {
                return Err(DocumentStoreError::InvalidDocument(
                    "order field `lessonIDs` must be an array".to_string(),
                ));
            }
        };

        let is_identifier = |id: &Bson| {
            matches!(
                id,
                Bson::String(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::ObjectId(_)
            )
        };
        if !lesson_ids.iter().all(is_identifier) {
            return Err(DocumentStoreError::InvalidDocument(
                "order field `lessonIDs` must only contain identifiers".to_string(),
            ));
        }

        Ok(Self { document })
    }
}

/// A validated insert body.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    /// A schema-less document for any collection.
    Generic(Document),
    /// A document bound for the orders collection.
    Order(OrderDocument),
}

impl DocumentBody {
    /// Validates a JSON body for insertion into `collection`.
    ///
    /// Any client supplied `_id` is discarded since identifiers are assigned by
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the body is not an
    /// object, or if `collection` is the orders collection and the body is not
    /// a valid [`OrderDocument`].
    pub fn for_collection(collection: &str, value: Value) -> DocumentStoreResult<Self> {
        let mut document = document_from_json(value)?;
        document.remove(ID_FIELD);

        if collection == ORDERS_COLLECTION {
            Ok(DocumentBody::Order(OrderDocument::try_from(document)?))
        } else {
            Ok(DocumentBody::Generic(document))
        }
    }

    /// Consumes the body, returning the document to store.
    pub fn into_document(self) -> Document {
        match self {
            DocumentBody::Generic(document) => document,
            DocumentBody::Order(order) => order.into_document(),
        }
    }
}
