//! Structured Output Decoding
//!
//! Turns a provider's raw text into the JSON value a caller asked for:
//! truncation check → repair → strict parse → required top-level fields.
//! Truncated output is rejected before any repair is attempted.

use serde_json::Value;
use tracing::{debug, warn};

use super::json_repair::parse_or_repair;
use crate::ai::provider::ProviderResponse;
use crate::config::OutputConfig;
use crate::constants::output as output_constants;
use crate::types::{EwhError, Result, excerpt};

#[derive(Debug, Clone)]
pub struct StructuredOutput {
    pub value: Value,
    /// True when the raw text only parsed after repair
    pub was_repaired: bool,
}

#[derive(Debug, Clone)]
pub struct StructuredDecoder {
    excerpt_chars: usize,
}

impl Default for StructuredDecoder {
    fn default() -> Self {
        Self::new(output_constants::EXCERPT_CHARS)
    }
}

impl From<&OutputConfig> for StructuredDecoder {
    fn from(config: &OutputConfig) -> Self {
        Self::new(config.excerpt_chars)
    }
}

impl StructuredDecoder {
    pub fn new(excerpt_chars: usize) -> Self {
        Self { excerpt_chars }
    }

    pub fn decode(
        &self,
        provider: &str,
        response: &ProviderResponse,
        required_fields: &[&str],
    ) -> Result<StructuredOutput> {
        if response.finish_reason.is_truncated() {
            warn!(
                provider,
                output_chars = response.text.len(),
                "Response truncated at token limit"
            );
            return Err(EwhError::Truncated {
                provider: provider.to_string(),
            });
        }

        let (value, was_repaired) = parse_or_repair(&response.text).map_err(|failure| {
            warn!(
                error = %failure.error,
                json = %excerpt(&failure.repaired, self.excerpt_chars),
                "Failed to parse model output"
            );
            EwhError::malformed(
                format!("invalid JSON after repair: {}", failure.error),
                &failure.repaired,
                self.excerpt_chars,
            )
        })?;

        if was_repaired {
            debug!(provider, "Model output needed repair");
        }

        let missing = missing_fields(&value, required_fields);
        if !missing.is_empty() {
            let rendered = value.to_string();
            warn!(
                missing = %missing.join(", "),
                json = %excerpt(&rendered, self.excerpt_chars),
                "Model output is missing required fields"
            );
            return Err(EwhError::malformed(
                format!("missing required fields: {}", missing.join(", ")),
                &rendered,
                self.excerpt_chars,
            ));
        }

        Ok(StructuredOutput {
            value,
            was_repaired,
        })
    }
}

/// Decode with the default excerpt size, returning only the value
pub fn decode_structured(
    provider: &str,
    response: &ProviderResponse,
    required_fields: &[&str],
) -> Result<Value> {
    StructuredDecoder::default()
        .decode(provider, response, required_fields)
        .map(|output| output.value)
}

fn missing_fields<'a>(value: &Value, required: &[&'a str]) -> Vec<&'a str> {
    match value.as_object() {
        Some(object) => required
            .iter()
            .copied()
            .filter(|field| !object.contains_key(*field))
            .collect(),
        // A non-object cannot carry any named field
        None => required.to_vec(),
    }
}
