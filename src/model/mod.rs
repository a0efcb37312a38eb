//! Core data model
//!
//! The line buffer owns the loaded window of the file; folding derives
//! structural ranges from it. Both are pure Rust with no async dependencies.

pub mod folding;
pub mod line_buffer;

pub use folding::{FoldId, FoldKind, FoldableRange, FoldingIndex, StructureKind};
pub use line_buffer::LineBuffer;
