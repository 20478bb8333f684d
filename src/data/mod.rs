// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a tab-separated text file to padded
// tensor batches.
//
// The pipeline flows in this order:
//
//   train.tsv
//       │
//       ▼
//   TsvReader        → one PairExample / TripletExample per line
//       │
//       ▼
//   TextEncoder      → pretrained tokenizer, truncated token + segment ids
//       │
//       ▼
//   ExampleDataset   → implements Burn's Dataset trait, sharded per worker
//       │
//       ▼
//   Pair/TripletBatcher → pads each field to the batch-local max length
//       │
//       ▼
//   DataLoader       → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads tab-separated training files
pub mod reader;

/// Wraps the pretrained tokenizer with truncation
pub mod encoder;

/// Encoded examples and Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait with dynamic padding
pub mod batcher;
