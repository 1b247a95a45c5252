//! Switchyard - Core
//!
//! A transport-agnostic RPC dispatch core. Frames come in, get routed to
//! registered handlers with their arguments resolved from the path, the
//! payload and the caller's session, pass an access gate, and the handler's
//! value, deferred result or live stream goes back out as correlated response
//! frames. The client side multiplexes many outstanding calls (streams
//! included) over one channel with per-call timeouts.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use switchyard_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SwitchyardConfig::load()?;
//!     config.validate()?;
//!     init_logging(&LoggingConfig::from_section(&config.logging)?)?;
//!
//!     let mut routes = RouteTable::new();
//!     routes.register_controller(
//!         Controller::new("player").route(
//!             RouteDescriptor::get("{playerId}", |args| async move {
//!                 Reply::value(args.get::<i64>("playerId")?)
//!             })
//!             .param(ParameterSpec::path("playerId", ParamType::Integer)),
//!         ),
//!     )?;
//!
//!     let processor = RequestProcessor::from_config(routes, &config);
//!     // hand `processor.process(request)` every decoded frame
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`routing`] - route descriptors, patterns and the route table
//! - [`resolve`] - path, payload and session argument resolvers
//! - [`session`] - per-connection typed state and the session manager
//! - [`security`] - the permission gate
//! - [`dispatch`] - the request processor and failure classification
//! - [`client`] - the client correlator
//! - [`protocol`] - request and response frames

pub mod client;
pub mod config; // Layered TOML + env configuration
pub mod dispatch;
pub mod error;
pub mod logging; // Logger for the `log` facade with request context
pub mod prelude;
pub mod protocol;
pub mod resolve;
pub mod routing;
pub mod security;
pub mod session;

pub use error::{ClientError, FrameError, Result, RpcError};
