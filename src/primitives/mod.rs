//! Low-level primitives
//!
//! Language detection, bounded search and the syntax highlight cache.
//! The syntect-backed highlighting service is behind the
//! `syntect-highlighter` feature.

pub mod highlight_cache;
pub mod language;
pub mod search;
#[cfg(feature = "syntect-highlighter")]
pub mod syntect_service;

pub use highlight_cache::{HighlightBatch, HighlightCoordinator, HighlightService, Theme};
pub use language::Language;
pub use search::{SearchEngine, SearchOutcome, SearchResult};
