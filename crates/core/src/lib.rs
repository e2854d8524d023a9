//! Core types, envelope codec, and connection supervision for the lead worker.

pub mod codec;
pub mod dsn;
pub mod error;
pub mod lead;
pub mod supervisor;

pub use codec::*;
pub use error::{Error, ErrorKind, Result};
pub use lead::*;
pub use supervisor::{acquire, Dependency, RetryPolicy};
