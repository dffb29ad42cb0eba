use console::style;

use crate::ai::{CodeArtifact, TokenUsage};
use crate::types::EwhError;

/// Status output on stderr; stdout is reserved for the generated JSON
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        eprintln!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        eprintln!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        eprintln!("\n{}", style(message).bold());
        eprintln!("{}", "─".repeat(40));
    }

    /// User-facing message plus hint for a failed command
    pub fn failure(&self, error: &EwhError) {
        self.error(&error.user_message());
        if let Some(hint) = error.hint() {
            eprintln!("  {} {}", style("hint:").dim(), hint);
        }
    }

    pub fn usage(&self, usage: &TokenUsage) {
        let mut line = format!(
            "Tokens: {} prompt + {} completion = {}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
        if let Some(cost) = usage.estimated_cost_usd {
            line.push_str(&format!(" (~${:.4})", cost));
        }
        self.info(&line);
    }

    pub fn code_artifacts(&self, artifacts: &[CodeArtifact]) {
        if artifacts.is_empty() {
            return;
        }
        self.section("Code execution");
        for artifact in artifacts {
            match artifact {
                CodeArtifact::Code { language, code } => {
                    eprintln!("{} {}", style(language).cyan(), style("code").dim());
                    eprintln!("{}", code.trim_end());
                }
                CodeArtifact::ExecutionResult { outcome, output } => {
                    eprintln!("{} {}", style(outcome).cyan(), style("result").dim());
                    eprintln!("{}", output.trim_end());
                }
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
