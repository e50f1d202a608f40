//! Core types shared by the gateway components.

mod generation;
mod mode;

pub use generation::GenerationResult;
pub use mode::Mode;
