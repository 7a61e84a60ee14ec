//! Input backend abstraction
//!
//! Everything platform specific sits behind [`InputBackend`]: device enumeration,
//! opening and closing devices, raw button/axis reads, rumble, power and metadata.
//! Sessions and the manager only ever talk to this trait, which keeps the
//! lifecycle and edge-detection logic testable without hardware.
//!
//! Two implementations ship with the crate:
//!
//! - [`memory::MemoryBackend`] - scripted in-process devices
//! - [`gilrs_backend::GilrsBackend`] - real gamepads through `gilrs` (feature `gilrs`)

#[cfg(feature = "gilrs")]
pub mod gilrs_backend;
pub mod memory;

use crate::controller::types::{Axis, Button};
use std::fmt;
use std::num::NonZeroU64;

/// Stable identifier of a physical device, assigned by the backend.
///
/// Survives for as long as the device stays plugged in. A replugged device may
/// come back with a different id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Opaque handle to an opened device.
///
/// Owned by exactly one session and released through [`InputBackend::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(NonZeroU64);

impl DeviceHandle {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(DeviceHandle)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Hot-plug notification drained by [`InputBackend::poll_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Added(DeviceId),
    Removed(DeviceId),
}

// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to initialize input backend: {0}")]
    Initialization(String),
}

/// Capability set a platform driver has to provide.
///
/// Queries on a handle whose device is gone must not panic; they report the
/// neutral value (`false`, `0`, `None`) instead. Callers check
/// [`InputBackend::is_attached`] before trusting a reading.
pub trait InputBackend {
    /// Drains hot-plug notifications received since the previous call.
    fn poll_events(&mut self) -> Vec<DeviceEvent>;

    /// Devices currently attached, in enumeration order.
    fn devices(&self) -> Vec<DeviceId>;

    /// Opens a device. `None` if the device is not present.
    fn open(&mut self, device: DeviceId) -> Option<DeviceHandle>;

    fn close(&mut self, handle: DeviceHandle);

    /// Whether the device behind `handle` is still physically attached.
    fn is_attached(&self, handle: DeviceHandle) -> bool;

    fn button(&mut self, handle: DeviceHandle, button: Button) -> bool;

    fn has_button(&self, handle: DeviceHandle, button: Button) -> bool;

    /// Raw axis reading in `-32768..=32767`.
    fn axis(&mut self, handle: DeviceHandle, axis: Axis) -> i16;

    fn has_axis(&self, handle: DeviceHandle, axis: Axis) -> bool;

    /// Starts a rumble effect, replacing whatever effect was running.
    ///
    /// Returns `false` when the device cannot rumble or rejected the command.
    fn rumble(&mut self, handle: DeviceHandle, low: u16, high: u16, duration_ms: u32) -> bool;

    fn has_rumble(&self, handle: DeviceHandle) -> bool;

    fn name(&self, handle: DeviceHandle) -> Option<String>;

    /// Player index, `-1` when unset or unsupported.
    fn player_index(&self, handle: DeviceHandle) -> i32;

    fn set_player_index(&mut self, handle: DeviceHandle, index: i32);

    /// Raw power code, `-1` for unknown. See [`crate::controller::PowerLevel`].
    fn power_level(&self, handle: DeviceHandle) -> i32;

    /// Releases the backend binding. Called once by the manager on quit.
    fn shutdown(&mut self);
}
