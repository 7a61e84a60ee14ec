//! Controller subsystem for polled gamepad input
//!
//! Three layers over an [`InputBackend`](crate::backend::InputBackend):
//!
//! 1. [`session`] - one slot's connection lifecycle and button edge detection
//! 2. [`snapshot`] - immutable read projection of a session
//! 3. [`manager`] - fixed slot table and hot-plug reconciliation
//!
//! # Architecture
//!
//! ```text
//! caller ──► SessionManager::update() ──► get_session(i) ──► ControllerSession ──► backend
//!                                    └──► get_state(i)   ──► ControllerSnapshot
//! ```
//!
//! Everything runs on the caller's thread, typically once per frame.

pub mod manager;
pub mod session;
pub mod snapshot;
pub mod types;

pub use manager::{ManagerConfig, ManagerError, SessionManager, DEFAULT_MAX_SLOTS};
pub use session::{ControllerSession, SessionError, SessionState, UNNAMED_CONTROLLER};
pub use snapshot::ControllerSnapshot;
pub use types::{Axis, Button, ButtonSet, ControllerKind, PowerLevel, AXIS_MAX_RAW};
