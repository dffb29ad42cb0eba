//! Generate Command
//!
//! Sends a prompt (optionally with a PDF) to a provider and prints the
//! decoded JSON on stdout. Status, usage and cost go to stderr.
//!
//! Usage:
//!   ewhgen generate --prompt exam.txt
//!   ewhgen generate --prompt prompt.txt --pdf exam.pdf
//!   ewhgen generate --provider openrouter --prompt - --require tasks

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

use crate::ai::{
    ApiKey, CallOptions, GeminiClient, OpenRouterClient, ProviderResponse, StructuredDecoder,
};
use crate::cli::{Output, read_text_input};
use crate::config::{Config, ConfigLoader};
use crate::types::{EwhError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    Gemini,
    Openrouter,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub provider: ProviderKind,
    pub prompt: PathBuf,
    pub pdf: Option<PathBuf>,
    pub code_execution: bool,
    pub require: Vec<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    fn call_options(&self) -> CallOptions {
        CallOptions {
            model: self.model.clone(),
            max_output_tokens: self.max_tokens,
            temperature: self.temperature,
            ..Default::default()
        }
    }
}

pub async fn run(options: GenerateOptions) -> Result<()> {
    let config = ConfigLoader::load()?;
    let prompt = read_text_input(&options.prompt)?;

    let (provider, response) = match options.provider {
        ProviderKind::Gemini => call_gemini(&config, &prompt, &options).await?,
        ProviderKind::Openrouter => {
            if options.pdf.is_some() || options.code_execution {
                return Err(EwhError::Config(
                    "--pdf and --code-execution require --provider gemini".to_string(),
                ));
            }
            let key = ApiKey::from_env(&config.openrouter.api_key_env)?;
            let client = OpenRouterClient::from_config(&config)?;
            let response = client.call(&prompt, &key, &options.call_options()).await?;
            (client.name(), response)
        }
    };

    let required: Vec<&str> = options.require.iter().map(String::as_str).collect();
    let decoded = StructuredDecoder::from(&config.output).decode(provider, &response, &required)?;

    println!("{}", serde_json::to_string_pretty(&decoded.value)?);

    let output = Output::new();
    output.code_artifacts(&response.code_artifacts);
    if let Some(usage) = &response.usage {
        output.usage(usage);
    }
    if decoded.was_repaired {
        output.warning("Model output needed JSON repair");
    }
    output.success(&format!("Generated with {}", provider));

    Ok(())
}

async fn call_gemini(
    config: &Config,
    prompt: &str,
    options: &GenerateOptions,
) -> Result<(&'static str, ProviderResponse)> {
    let key = ApiKey::from_env(&config.gemini.api_key_env)?;
    let client = GeminiClient::from_config(config)?;
    let call_options = options.call_options();

    let response = match (&options.pdf, options.code_execution) {
        (Some(_), true) => {
            return Err(EwhError::Config(
                "--pdf and --code-execution cannot be combined".to_string(),
            ));
        }
        (Some(pdf), false) => {
            let bytes = std::fs::read(pdf)?;
            info!(path = %pdf.display(), bytes = bytes.len(), "Sending PDF");
            let encoded = STANDARD.encode(bytes);
            client
                .call_with_attachment(prompt, &encoded, &key, &call_options)
                .await?
        }
        (None, true) => {
            client
                .call_with_code_execution(prompt, &key, &call_options)
                .await?
        }
        (None, false) => client.call(prompt, &key, &call_options).await?,
    };

    Ok((client.name(), response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_become_call_options() {
        let options = GenerateOptions {
            provider: ProviderKind::Gemini,
            prompt: PathBuf::from("-"),
            pdf: None,
            code_execution: false,
            require: vec!["tasks".into()],
            model: Some("gemini-2.5-pro".into()),
            max_tokens: Some(2048),
            temperature: None,
        };

        let call = options.call_options();
        assert_eq!(call.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(call.max_output_tokens, Some(2048));
        assert_eq!(call.temperature, None);
        assert_eq!(call.top_k, None);
    }
}
