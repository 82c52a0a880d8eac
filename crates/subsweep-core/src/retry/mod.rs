//! Retry policy for API sources
//!
//! Provides exponential backoff between attempts for transient transport,
//! status and payload errors.

mod backoff;

pub use backoff::RetryPolicy;
