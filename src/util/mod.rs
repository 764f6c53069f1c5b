//! Utility modules: timeout and cancellation.

pub mod timeout;

pub use timeout::{with_cancel, with_optional_timeout, with_timeout};
