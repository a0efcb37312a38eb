//! Asynchronous collaborators
//!
//! The loader decides when more content is needed and how to restore the
//! scroll position afterwards; the content itself comes from a host-supplied
//! [`loader::ContentSource`].

pub mod loader;

pub use loader::{
    ContentSource, Direction, IncrementalLoader, LoadRequest, LoadTicket, ScrollAnchor,
    ScrollEvent, ScrollRestore,
};
