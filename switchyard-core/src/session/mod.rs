//! Session state for Switchyard
//!
//! This module provides per-connection state management:
//! - [`Session`]: a typed heterogeneous store keyed by type (or trait object),
//!   plus the registry of open streams that can be cancelled by id
//! - [`SessionManager`]: lazy, race-free creation by external session id and
//!   automatic eviction of idle sessions
//!
//! # Example
//!
//! ```no_run
//! use switchyard_core::session::{SessionManager, SessionManagerConfig};
//!
//! let manager = SessionManager::with_config(SessionManagerConfig::new().with_auto_cleanup(false));
//! let session = manager.session(&SessionManager::issue_id());
//! session.add(42u32)?;
//! assert_eq!(*session.get::<u32>()?.unwrap(), 42);
//! # Ok::<(), switchyard_core::RpcError>(())
//! ```

mod key;
mod manager;
mod store;

pub use key::TypeKey;
pub use manager::{SessionManager, SessionManagerConfig};
pub use store::{EmitterHandle, Session, SessionValue};
