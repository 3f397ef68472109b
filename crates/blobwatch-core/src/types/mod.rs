//! Core types for Blobwatch

mod function;
mod message;
mod object;
mod pattern;
mod queue;
mod receipt;

pub use function::*;
pub use message::*;
pub use object::*;
pub use pattern::*;
pub use queue::*;
pub use receipt::*;
