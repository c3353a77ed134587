//! Request and response bodies for the HTTP surface

pub mod error;
pub mod inquiry;
pub mod json;

pub use error::{ApiError, ApiErrorResponse};
pub use inquiry::{QualityCheckRequest, SearchRequest};
pub use json::Json;
