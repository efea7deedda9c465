//! Query translation from docgate expressions to MongoDB query syntax.
//!
//! This module translates docgate's abstract filter expressions into
//! MongoDB BSON documents for execution by the MongoDB query engine.

use bson::{Document, Bson, doc};

use docgate_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::DocumentStoreError,
};


/// Translates docgate filter expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
            }
        })
    }

    // The term goes to the server untouched; `$search` has its own syntax for
    // negation and phrases.
    fn visit_text(&mut self, term: &str) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$text": { "$search": term },
        })
    }
}
