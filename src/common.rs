//! Miscellaneous common structs used throughout the library.

mod endpoint;
mod id;

pub use endpoint::*;
pub use id::*;
