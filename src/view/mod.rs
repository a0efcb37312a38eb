//! View layer
//!
//! Projection of the buffer through collapsed folds, and the windowing
//! arithmetic that decides which visible lines the host paints.

pub mod projection;
pub mod viewport;

pub use projection::VisibleSequence;
pub use viewport::{Align, LineHeight, Viewport};
