//! Schema accumulation
//!
//! The schema is the ordered union of all key paths seen during one export.

pub mod accumulator;

pub use accumulator::KeySchema;
