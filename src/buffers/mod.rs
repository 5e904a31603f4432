//! Per-element buffers mirrored onto the registry's index spaces.
//!
//! A buffer is created once per concern (positions, weights, labels...) and
//! addressed through a copyable handle. The swapper owns the storage and
//! replays registry events on it, so slot `i` of every buffer of a kind
//! always belongs to the element currently at index `i`.

mod handle;
mod storage;
mod swapper;

pub use handle::{ArrayRef, BufferId, BufferRef, Primitive, PrimitiveType};
pub use storage::{Initializer, ValueFactory};
pub use swapper::{BufferSwapper, InitContext, Sizing, SwapperConfig};
