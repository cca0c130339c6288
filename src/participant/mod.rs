pub mod adapter;
pub mod personas;
pub mod provider_anthropic;
pub mod provider_gemini;
pub mod provider_openai;
