//! Language model client and the shared HTTP client

mod http_client;
mod openai;

pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiLanguageModel;

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
