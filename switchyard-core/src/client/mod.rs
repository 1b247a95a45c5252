//! Caller side: id allocation, timeouts and response demultiplexing

pub mod correlator;

pub use correlator::{CallHandle, ClientCorrelator, RequestSink};
