//! Global Constants
//!
//! Centralized defaults for configuration and tuning.
//! Every value here is a default only; `config::Config` can override it.

/// Retry fetcher constants
pub mod retry {
    /// Total attempts per outbound call (first try included)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay before the first retry (milliseconds); doubles every attempt
    pub const BASE_DELAY_MS: u64 = 1000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Upper bound for a single backoff delay (seconds)
    pub const MAX_DELAY_SECS: u64 = 60;

    /// HTTP statuses treated as transient
    pub const RETRYABLE_STATUSES: [u16; 2] = [429, 503];
}

/// Gemini provider constants
pub mod gemini {
    pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

    /// Minimum spacing between two request starts (milliseconds)
    pub const MIN_INTERVAL_MS: u64 = 1000;

    pub const TEXT_MODEL: &str = "gemini-2.5-flash";
    pub const TEXT_MAX_OUTPUT_TOKENS: u32 = 16384;

    /// Separate quota from the text model; reads PDFs directly
    pub const VISION_MODEL: &str = "gemini-3-flash-preview";
    pub const VISION_MAX_OUTPUT_TOKENS: u32 = 65536;

    pub const CODE_EXECUTION_MODEL: &str = "gemini-2.0-flash";
    pub const CODE_EXECUTION_MAX_OUTPUT_TOKENS: u32 = 16384;
}

/// OpenRouter provider constants
pub mod openrouter {
    pub const API_BASE: &str = "https://openrouter.ai/api/v1";
    pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

    /// Minimum spacing between two request starts (milliseconds)
    pub const MIN_INTERVAL_MS: u64 = 500;

    pub const MODEL: &str = "deepseek/deepseek-r1";
    pub const MAX_OUTPUT_TOKENS: u32 = 8192;
    pub const TEMPERATURE: f32 = 0.2;

    pub const REFERER: &str = "https://ewhgen3.vercel.app";
    pub const TITLE: &str = "EWHgen3 Math Generator";

    /// Approximate DeepSeek-R1 pricing in USD per million tokens
    pub const INPUT_PRICE_PER_MILLION: f64 = 0.5;
    pub const OUTPUT_PRICE_PER_MILLION: f64 = 2.0;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds); vision calls on long exams are slow
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Model output handling constants
pub mod output {
    /// Maximum characters of offending output kept in errors and logs
    pub const EXCERPT_CHARS: usize = 1000;
}
