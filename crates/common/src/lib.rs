//! fieldcheck Common Library
//!
//! Shared fixture state and wire-capture types for the fieldcheck
//! integration test runner.

pub mod capture;
pub mod error;
pub mod fixture;

// Re-export commonly used types
pub use capture::{
    format_response_size, mask_host, to_curl, Body, Headers, RequestData, ResponseData,
    MASKED_HOST, REDACTED_SECRET,
};
pub use error::{Error, Result};
pub use fixture::{FixtureStore, FixtureValue, SessionCredentials};

/// fieldcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
