//! Core types shared by every layer: errors and progress reporting.

mod error;
mod progress;

pub use error::{Error, Result};
pub use progress::Progress;
