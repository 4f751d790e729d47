//! Request handler module
//!
//! Responsible for request routing dispatch and the share service's
//! business logic: serving the manual, fetching and storing blobs.

pub mod blobs;
pub mod manual;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
