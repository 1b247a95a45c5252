//! Request dispatch
//!
//! [`RequestProcessor`] drives each request through route matching, argument
//! resolution, the permission gate and the handler, then shapes the
//! [`Reply`] into response frames. [`ExceptionClassifier`] decides what every
//! failure along the way looks like to the caller.

pub mod classifier;
pub mod processor;
pub mod reply;

pub use classifier::{ExceptionClassifier, INTERNAL_ERROR_MESSAGE};
pub use processor::{DispatchStats, RequestProcessor, ResponseStream};
pub use reply::{Mono, Reply, ValueStream};
