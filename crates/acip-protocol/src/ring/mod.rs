//! Ring Builder (C4) and the `RingContext` it produces.

pub mod builder;

pub use builder::{build_ring, RingContext};
