//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions,
//! enabling filtering, comparison and text matching on BSON documents.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docgate_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// This enum wraps BSON values and provides comparison operations for
/// filtering and sorting. It normalizes numeric types to f64 for easy comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value (also used for missing fields)
    Null,
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(&'a str),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Object id value
    ObjectId(ObjectId),
    /// Boolean value
    Bool(bool),
    /// DateTime value
    DateTime(DateTime),
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total ordering used for sorting: values of different types order by
    /// type, incomparable values of the same type compare equal.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


/// A parsed free-text search term.
///
/// Bare words are alternatives, `-word` excludes documents containing the
/// word and `"quoted phrases"` must all be present. Matching is
/// case-insensitive on whole words (phrases on substrings).
#[derive(Debug, Default, PartialEq)]
pub(crate) struct TextSearch {
    words: Vec<String>,
    excluded: Vec<String>,
    phrases: Vec<String>,
}

impl TextSearch {
    pub fn parse(term: &str) -> Self {
        let mut search = TextSearch::default();
        let mut rest = term;

        while let Some(start) = rest.find('"') {
            let (before, after) = rest.split_at(start);
            search.push_words(before);

            match after[1..].find('"') {
                Some(end) => {
                    let phrase = after[1..=end].trim().to_lowercase();
                    if !phrase.is_empty() {
                        search.phrases.push(phrase);
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    rest = &after[1..];
                }
            }
        }
        search.push_words(rest);

        search
    }

    fn push_words(&mut self, text: &str) {
        for raw in text.split_whitespace() {
            match raw.strip_prefix('-') {
                Some(negated) => self.excluded.extend(tokenize(negated)),
                None => self.words.extend(tokenize(raw)),
            }
        }
    }

    /// Returns `true` if the indexed text satisfies this search.
    pub fn matches(&self, text: &str) -> bool {
        if self.words.is_empty() && self.phrases.is_empty() {
            return false;
        }

        let lowered = text.to_lowercase();
        let tokens = tokenize(&lowered);
        let has = |word: &String| tokens.iter().any(|token| token == word);

        if self.excluded.iter().any(has) {
            return false;
        }
        if !self.phrases.iter().all(|phrase| lowered.contains(phrase.as_str())) {
            return false;
        }

        !self.phrases.is_empty() || self.words.iter().any(has)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Concatenates the string content of the text-indexed fields of a document.
fn indexed_text(document: &Document, fields: &[String]) -> String {
    fn collect(value: &Bson, out: &mut Vec<String>) {
        match value {
            Bson::String(text) => out.push(text.clone()),
            Bson::Array(items) => items.iter().for_each(|item| collect(item, out)),
            _ => {}
        }
    }

    let mut parts = Vec::new();
    for field in fields {
        if let Some(value) = document.get(field) {
            collect(value, &mut parts);
        }
    }

    parts.join(" ")
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    text_fields: Option<&'a [String]>,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document, text_fields: Option<&'a [String]>) -> Self {
        Self { document, text_fields }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
        text_fields: Option<&'a [String]>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for doc in documents {
            if DocumentEvaluator::new(doc, text_fields).evaluate(expr)? {
                matched.push(doc.clone());
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = match self.document.get(field) {
            Some(field_value) => Comparable::from(field_value),
            None => return Ok(matches!(op, FieldOp::Ne)),
        };
        let value = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => field_value == value,
            FieldOp::Ne => field_value != value,
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match field_value.partial_cmp(&value) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
        })
    }

    fn visit_text(&mut self, term: &str) -> Result<Self::Output, Self::Error> {
        let fields = self.text_fields.ok_or_else(|| {
            DocumentStoreError::Backend("text index required for $text query".to_string())
        })?;

        Ok(TextSearch::parse(term).matches(&indexed_text(self.document, fields)))
    }
}
