pub mod error;

pub use error::{ErrorCategory, EwhError, Result, excerpt};
