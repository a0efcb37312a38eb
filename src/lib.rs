// Large-file line engine - exposes all core modules for testing

// Core types and config are always available
pub mod config;
pub mod error;

// Engine layers, leaf-first: model -> view -> services/primitives -> engine
pub mod model;
pub mod primitives;
pub mod services;
pub mod view;

pub mod engine;

pub use config::EngineConfig;
pub use engine::{EngineEvent, LineEngine};
pub use error::EngineError;
