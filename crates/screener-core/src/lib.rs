//! Shared types, error taxonomy, and statistical helpers for the screening pipeline.

pub mod adaptive;
pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
