//! HTTP providers for Coursewright.
//!
//! - [`ChatCompletionClient`]: plain completion over an OpenAI-compatible
//!   `/chat/completions` endpoint
//! - [`FileSearchClient`]: completion scoped to vector stores through the
//!   `/responses` endpoint's `file_search` tool
//! - [`ResearchClient`]: search-augmented completion over an
//!   OpenAI-compatible endpoint that returns citations
//! - [`HttpProviderFactory`]: builds all three from [`ModelSettings`] and the
//!   keys supplied with a run

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chat;
mod dto;
mod factory;
mod file_search;
mod http;
mod research;
mod settings;

pub use chat::ChatCompletionClient;
pub use factory::HttpProviderFactory;
pub use file_search::FileSearchClient;
pub use research::ResearchClient;
pub use settings::ModelSettings;
