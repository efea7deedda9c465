//! Query descriptors, filter expressions and updates.
//!
//! A [`Query`] is the normalized form of the route parameters a request
//! carries: an optional filter, an optional limit and an optional sort. When a
//! route supplies none of them the query selects every document in
//! unspecified order.
//!
//! # Query Building
//!
//! ```ignore
//! use docgate::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::gt("spaces", 0))
//!     .limit(10)
//!     .sort("price", SortDirection::Desc)
//!     .build();
//! ```
//!
//! # Route Parameters
//!
//! [`Limit::parse`] and [`SortDirection::from_param`] translate the positional
//! `max` and `sortAscDesc` path segments, and [`Query::sorted`] /
//! [`Query::text`] assemble the descriptors used by the gateway routes.

use bson::{Bson, Document};
use serde_json::Value;

use crate::{
    document::document_from_json,
    error::{DocumentStoreError, DocumentStoreResult},
    id::{ID_FIELD, Identifier},
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Interprets a `sortAscDesc` route parameter.
    ///
    /// Only the exact, case-sensitive literal `"desc"` selects descending
    /// order. Every other value selects ascending order.
    pub fn from_param(raw: &str) -> Self {
        if raw == "desc" {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// Sort order for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// A parsed `max` route parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Return at most this many documents.
    Count(usize),
    /// Zero was requested, which the datastore treats as "no limit".
    Unbounded,
    /// The parameter had no leading digits.
    NotANumber,
}

impl Limit {
    /// Parses a `max` parameter the way `parseInt(raw, 10)` would.
    ///
    /// Leading whitespace and a sign are accepted and anything after the
    /// leading digits is ignored. A negative count limits to its absolute
    /// value. Values that do not fit in `usize` saturate.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        let unsigned = trimmed
            .strip_prefix('-')
            .or_else(|| trimmed.strip_prefix('+'))
            .unwrap_or(trimmed);

        let digits = unsigned
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .collect::<Vec<u8>>();

        if digits.is_empty() {
            return Limit::NotANumber;
        }

        let count = digits.iter().fold(0usize, |acc, digit| {
            acc.saturating_mul(10)
                .saturating_add(usize::from(digit - b'0'))
        });

        match count {
            0 => Limit::Unbounded,
            n => Limit::Count(n),
        }
    }

    /// Returns the limit to apply, `None` meaning "no limit".
    pub fn as_option(self) -> Option<usize> {
        match self {
            Limit::Count(n) => Some(n),
            Limit::Unbounded | Limit::NotANumber => None,
        }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
    /// Full-text search over the collection's text-indexed fields.
    ///
    /// The term is passed to the backend verbatim.
    Text(String),
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches the document with the given identifier.
    pub fn id(id: Identifier) -> Expr {
        Expr::field(ID_FIELD.to_string(), FieldOp::Eq, id.into())
    }

    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the specified value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the specified value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the specified value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the specified value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents whose text-indexed fields match `term`.
    pub fn text(term: impl Into<String>) -> Expr {
        Expr::Text(term.into())
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }
}

/// A structured query for retrieving documents.
///
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Sort order for results.
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates a query selecting every document in unspecified order.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Builds the descriptor for the `/{max}/{sortAspect}/{sortAscDesc}` route.
    pub fn sorted(max: Limit, sort_aspect: &str, sort_asc_desc: &str) -> Self {
        Query {
            filter: None,
            limit: max.as_option(),
            sort: Some(Sort {
                field: sort_aspect.to_string(),
                direction: SortDirection::from_param(sort_asc_desc),
            }),
        }
    }

    /// Builds the descriptor for a free-text search.
    pub fn text(term: impl Into<String>) -> Self {
        Query::builder()
            .filter(Filter::text(term))
            .build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the sort order for the query results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// A single-document modification.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrite the supplied fields, leaving every other field untouched.
    Set(Document),
    /// Add `by` to a numeric field (a missing field is treated as zero).
    Increment {
        /// The field to modify.
        field: String,
        /// The signed amount to add.
        by: i64,
    },
}

impl Update {
    /// Builds a partial set-fields update from a JSON body.
    ///
    /// A supplied `_id` is ignored since identifiers are immutable.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the body is not an
    /// object, has no fields left to set, or names a field by a dotted path
    /// or `$` operator. Only top-level fields can be set.
    pub fn set_from_json(value: Value) -> DocumentStoreResult<Self> {
        let mut fields = document_from_json(value)?;
        fields.remove(ID_FIELD);

        if let Some(key) = fields.keys().find(|key| key.contains('.') || key.starts_with('$')) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "update field `{key}` must be a top-level field name"
            )));
        }

        if fields.is_empty() {
            return Err(DocumentStoreError::InvalidDocument(
                "update body has no fields to set".to_string(),
            ));
        }

        Ok(Update::Set(fields))
    }

    /// Decrements a numeric field by one.
    pub fn decrement(field: impl Into<String>) -> Self {
        Update::Increment { field: field.into(), by: -1 }
    }
}

/// Visitor over [`Expr`] trees, used by backends to evaluate or translate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_text(&mut self, term: &str) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
            Expr::Text(term) => self.visit_text(term),
        }
    }
}
