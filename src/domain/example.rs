// ============================================================
// Layer 3 — Training Example Types
// ============================================================
// One dataset line becomes exactly one of these values:
//
//   classifier:  text_a \t text_b \t label      → PairExample
//   retriever:   query  \t pos_title \t neg_title → TripletExample
//
// Examples are immutable once read; the data layer only ever
// clones them into encoded form.

use serde::{Deserialize, Serialize};

use crate::domain::traits::{RecordError, TsvRecord};

/// A labelled text pair for the cross-encoder classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairExample {
    pub text_a: String,
    pub text_b: String,
    /// 1 = relevant / positive pair, 0 = negative pair
    pub label: u8,
}

impl PairExample {
    pub fn new(text_a: impl Into<String>, text_b: impl Into<String>, label: u8) -> Self {
        Self {
            text_a: text_a.into(),
            text_b: text_b.into(),
            label,
        }
    }
}

impl TsvRecord for PairExample {
    const FIELDS: usize = 3;

    fn from_fields(fields: &[&str]) -> Result<Self, RecordError> {
        let label = match fields[2].trim() {
            "0" => 0,
            "1" => 1,
            other => return Err(RecordError::InvalidLabel(other.to_string())),
        };
        Ok(Self::new(fields[0], fields[1], label))
    }
}

/// A (query, positive title, negative title) triple for the dual-encoder.
///
/// The negative title is a hard negative chosen by whoever built the
/// dataset; the other titles of the batch serve as extra negatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripletExample {
    pub query:     String,
    pub pos_title: String,
    pub neg_title: String,
}

impl TripletExample {
    pub fn new(
        query:     impl Into<String>,
        pos_title: impl Into<String>,
        neg_title: impl Into<String>,
    ) -> Self {
        Self {
            query:     query.into(),
            pos_title: pos_title.into(),
            neg_title: neg_title.into(),
        }
    }
}

impl TsvRecord for TripletExample {
    const FIELDS: usize = 3;

    fn from_fields(fields: &[&str]) -> Result<Self, RecordError> {
        Ok(Self::new(fields[0], fields[1], fields[2]))
    }
}
