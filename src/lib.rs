#![warn(clippy::nursery)]

pub mod error;
pub mod png;
pub mod util;

pub use error::{EncodeError, ErrorClass, Result};
pub use png::*;
