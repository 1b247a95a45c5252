//! Frame vocabulary shared by the dispatcher and the client correlator

pub mod frame;

pub use frame::{Frame, FrameKind, Payload, Request, RequestMethod, RequestType, Response, ResponseStatus};
