//! Generative model access.
//!
//! Stages talk to [`LlmGateway`], which owns the single active
//! [`GenerativeProvider`], the cache store and the [`CallLog`].

mod call_log;
mod gateway;
#[cfg(feature = "http")]
mod http;
mod provider;

pub use call_log::CallLog;
pub use gateway::{CacheMode, LlmGateway};
#[cfg(feature = "http")]
pub use http::{build_provider, AnthropicProvider, GeminiProvider, OpenAiProvider};
pub use provider::{GenerativeProvider, ProviderKind};
