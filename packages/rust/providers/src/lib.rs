//! Clients for the two external model services the enrichment pipeline calls.
//!
//! Each service exposes single-attempt `try_*` methods that return a tagged
//! [`ServiceError`]; the free functions ([`get_response`],
//! [`get_structured_response`], [`get_plain_response`]) wrap them in the
//! service's [`RetryPolicy`].

mod generative;
mod http;
mod retry;
mod search;

pub use generative::{
    GenerativeService, OpenAiClient, ResponseSchema, get_plain_response, get_structured_response,
};
pub use retry::{RetryPolicy, ServiceError};
pub use search::{PerplexityClient, SearchService, get_response};
