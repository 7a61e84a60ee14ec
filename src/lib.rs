//! Polled gamepad sessions with hot-plug handling and edge detection.
//!
//! ```rust,no_run
//! use padsession::backend::memory::{MemoryBackend, VirtualDevice};
//! use padsession::controller::{Button, ManagerConfig, SessionManager};
//!
//! let mut backend = MemoryBackend::new();
//! backend.plug(VirtualDevice::named("Pad"));
//! let mut manager = SessionManager::init(ManagerConfig::default(), backend)?;
//!
//! manager.update();
//! if manager.get_session(0)?.is_button_just_pressed(Button::A)? {
//!     println!("jump");
//! }
//! # Ok::<(), padsession::controller::ManagerError>(())
//! ```

pub mod backend;
pub mod config;
pub mod controller;
