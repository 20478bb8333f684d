// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The data layer reads any tab-separated dataset through the
// TsvRecord trait, so the same reader serves both the
// classifier pairs and the retriever triples.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use thiserror::Error;

/// Why a single line's fields could not become an example.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// Classifier labels must be exactly 0 or 1
    #[error("invalid label '{0}' (expected 0 or 1)")]
    InvalidLabel(String),
}

// ─── TsvRecord ────────────────────────────────────────────────────────────────
/// A training example that can be built from one tab-separated line.
///
/// Implementations:
///   - PairExample    → text_a, text_b, label
///   - TripletExample → query, positive title, negative title
pub trait TsvRecord: Sized {
    /// Exact number of fields every line must carry
    const FIELDS: usize;

    /// Build the example. `fields.len() == Self::FIELDS` is checked
    /// by the caller before this is invoked.
    fn from_fields(fields: &[&str]) -> Result<Self, RecordError>;
}
