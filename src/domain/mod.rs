// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing one line of training data and
// the trait that turns tab-separated fields into those types.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Training examples for the two ranking tasks
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;
