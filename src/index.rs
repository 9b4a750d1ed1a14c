//! Read-side index interfaces consumed by the query core.
//!
//! Storage and writing are outside this crate. Segments are reached through
//! the [`reader::LeafReader`] trait; [`memory`] provides an in-memory
//! implementation that the tests and benchmarks build on.

pub mod doc_values;
pub mod memory;
pub mod postings;
pub mod reader;
pub mod terms;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Document id within a segment, or globally when offset by a doc base.
pub type DocId = i32;

/// A term: a field name and the text of one token in that field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    field: String,
    text: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }

    /// The field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The term text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}
