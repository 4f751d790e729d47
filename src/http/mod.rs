//! HTTP protocol layer module
//!
//! Content sniffing, upload decoding and response building, decoupled from
//! request routing.

pub mod form;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use form::extract_payload;
pub use response::{build_500_response, Outcome};
