//! Model Output Validation
//!
//! - `json_repair`: best-effort recovery of JSON from raw model text
//! - `structured`: truncation check, repair, and required-field validation
//!
//! Fail fast on truncation, repair on format issues.

pub mod json_repair;
pub mod structured;

pub use json_repair::{RepairFailure, parse_or_repair, repair};
pub use structured::{StructuredDecoder, StructuredOutput, decode_structured};
