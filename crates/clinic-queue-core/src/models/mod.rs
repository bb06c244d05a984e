//! Domain models for the clinic queue.

mod stats;
mod token;
mod visit;

pub use stats::*;
pub use token::*;
pub use visit::*;
