pub mod correlator_steps;
pub mod dispatch_steps;
pub mod permission_steps;
pub mod stream_steps;
