//! Metric store abstraction implemented by the storage crate.

mod traits;

pub use traits::*;
