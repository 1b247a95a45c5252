//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use switchyard_core::prelude::*;
//! ```

// === Configuration and logging ===
pub use crate::config::SwitchyardConfig;
pub use crate::logging::{init_logging, LoggingConfig};

// === Frames ===
pub use crate::protocol::{Frame, Payload, Request, RequestMethod, Response, ResponseStatus};

// === Routing ===
pub use crate::routing::{AccessType, Controller, ParamType, ParameterSpec, RouteDescriptor, RouteTable};

// === Handlers ===
pub use crate::dispatch::{Mono, Reply, RequestProcessor};
pub use crate::resolve::Arguments;

// === Sessions and access ===
pub use crate::security::{Principal, RoleHolder};
pub use crate::session::{Session, SessionManager};

// === Client ===
pub use crate::client::{CallHandle, ClientCorrelator};

// === Errors ===
pub use crate::error::{ClientError, RpcError};
