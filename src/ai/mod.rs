//! AI Integration Layer
//!
//! Reliable access to the Gemini and OpenRouter APIs plus decoding of the
//! structured JSON their models return.

pub mod provider;
pub mod queue;
pub mod retry;
pub mod transport;
pub mod validation;

pub use provider::{
    ApiKey, Attachment, CallOptions, CodeArtifact, FinishReason, GeminiClient, GeminiWire,
    GenerationConfig, OpenRouterClient, OpenRouterWire, ProviderRequest, ProviderResponse,
    ReliableClient, TokenUsage, WireFormat,
};
pub use queue::RequestQueue;
pub use retry::{RetryPolicy, fetch_with_retry};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use validation::{json_repair, structured};
pub use validation::{StructuredDecoder, StructuredOutput, decode_structured, parse_or_repair, repair};
