//! Controller Session - one slot's connection lifecycle and edge detection
//!
//! A [`ControllerSession`] lives for the whole lifetime of its manager and owns
//! at most one backend handle at a time. The device behind it may come and go;
//! the session stays, and every query made while nothing is attached fails
//! with [`SessionError::ControllerUnavailable`].
//!
//! # Lifecycle
//!
//! ```text
//! Unbound ──open()──► Open ──unplug──► Disconnected
//!                      │                   │
//!                      └──close()──► Closed ◄┘
//!           Closed / Disconnected ──reconnect()──► Open
//! ```
//!
//! When the manager reconciles a removal it releases the handle and unbinds
//! the device, but the slot keeps reporting `Disconnected` until it is
//! rebound, reopened or explicitly closed.
//!
//! # Edge detection
//!
//! Each button keeps a held bit and a just-pressed bit. Every poll of a button
//! recomputes both from the raw reading:
//!
//! ```text
//! just_pressed = raw && !held
//! held         = raw
//! ```
//!
//! [`ControllerSession::is_button_pressed`] and
//! [`ControllerSession::is_button_just_pressed`] share this update, so a button
//! should be polled once per frame. Polling it twice before the physical state
//! changes collapses the transition.

use crate::backend::{DeviceHandle, DeviceId, InputBackend};
use crate::controller::types::{
    Axis, Button, ButtonSet, ControllerKind, PowerLevel, RUMBLE_MAX_RAW,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Name reported for devices the backend has no name for.
pub const UNNAMED_CONTROLLER: &str = "Unnamed Controller";

// Session errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Controller at slot {slot} is not connected")]
    ControllerUnavailable { slot: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Observable connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never opened
    Unbound,
    /// Handle held and device attached
    Open,
    /// Device gone, either still holding a stale handle or released by the
    /// manager after a removal event
    Disconnected,
    /// No handle held after an explicit close, or nothing to open
    Closed,
}

pub struct ControllerSession<B: InputBackend> {
    slot: usize,
    backend: Rc<RefCell<B>>,
    device: Option<DeviceId>,
    handle: Option<DeviceHandle>,
    touched: bool,
    // device unbound by a removal event
    removed: bool,
    held: ButtonSet,
    just_pressed: ButtonSet,
}

impl<B: InputBackend> ControllerSession<B> {
    /// Creates an unbound session for `slot`. Nothing is opened yet.
    pub fn new(slot: usize, backend: Rc<RefCell<B>>) -> Self {
        Self {
            slot,
            backend,
            device: None,
            handle: None,
            touched: false,
            removed: false,
            held: ButtonSet::EMPTY,
            just_pressed: ButtonSet::EMPTY,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Device currently assigned to this slot, if any.
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn state(&self) -> SessionState {
        if !self.touched {
            SessionState::Unbound
        } else if self.handle.is_none() && self.removed {
            SessionState::Disconnected
        } else if self.handle.is_none() {
            SessionState::Closed
        } else if self.is_connected() {
            SessionState::Open
        } else {
            SessionState::Disconnected
        }
    }

    /// Assigns a device without opening it.
    pub(crate) fn assign(&mut self, device: Option<DeviceId>) {
        self.device = device;
    }

    /// Drops the handle and the device after the device was unplugged.
    pub(crate) fn release(&mut self) {
        self.close();
        self.device = None;
        self.removed = true;
    }

    /// Opens the session on first use.
    pub(crate) fn touch(&mut self) {
        if !self.touched {
            self.open();
        }
    }

    /// Requests a handle for the assigned device and resets the edge baseline.
    ///
    /// The stored handle is `None` when no device is assigned or the backend
    /// could not open it.
    pub fn open(&mut self) {
        self.touched = true;
        self.removed = false;
        self.held.clear();
        self.just_pressed.clear();

        self.handle = match self.device {
            Some(device) => self.backend.borrow_mut().open(device),
            None => None,
        };

        match (self.device, self.handle) {
            (Some(device), Some(handle)) => info!(
                "Slot {} opened {} (handle {})",
                self.slot,
                device,
                handle.raw()
            ),
            (Some(device), None) => warn!("Slot {} failed to open {}", self.slot, device),
            (None, _) => debug!("Slot {} has no device to open", self.slot),
        }
    }

    /// Releases the handle if one is held. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.removed = false;
        if let Some(handle) = self.handle.take() {
            self.backend.borrow_mut().close(handle);
            info!("Slot {} closed handle {}", self.slot, handle.raw());
        }
    }

    /// Closes and reopens the slot's device. Returns whether it is connected afterwards.
    pub fn reconnect(&mut self) -> bool {
        debug!("Reconnecting slot {}", self.slot);
        self.close();
        self.open();
        self.is_connected()
    }

    /// True iff a handle is held and the backend still sees the device.
    pub fn is_connected(&self) -> bool {
        self.handle
            .is_some_and(|handle| self.backend.borrow().is_attached(handle))
    }

    fn ensure_connected(&self) -> Result<DeviceHandle, SessionError> {
        match self.handle {
            Some(handle) if self.backend.borrow().is_attached(handle) => Ok(handle),
            _ => Err(SessionError::ControllerUnavailable { slot: self.slot }),
        }
    }

    fn update_button(&mut self, button: Button) -> Result<(), SessionError> {
        let handle = self.ensure_connected()?;
        let pressed = self.backend.borrow_mut().button(handle, button);

        self.just_pressed
            .set(button, pressed && !self.held.contains(button));
        self.held.set(button, pressed);
        Ok(())
    }

    pub fn is_button_pressed(&mut self, button: Button) -> Result<bool, SessionError> {
        self.update_button(button)?;
        Ok(self.held.contains(button))
    }

    /// Edge bit from the most recent poll of `button`, without polling again.
    pub(crate) fn just_pressed_cached(&self, button: Button) -> bool {
        self.just_pressed.contains(button)
    }

    /// Whether this poll is the first to see `button` pressed since it was last
    /// seen released.
    pub fn is_button_just_pressed(&mut self, button: Button) -> Result<bool, SessionError> {
        self.update_button(button)?;
        Ok(self.just_pressed.contains(button))
    }

    pub fn is_button_available(&self, button: Button) -> Result<bool, SessionError> {
        let handle = self.ensure_connected()?;
        Ok(self.backend.borrow().has_button(handle, button))
    }

    /// Normalized axis value, `1.0` at the raw maximum.
    pub fn axis_state(&mut self, axis: Axis) -> Result<f32, SessionError> {
        let handle = self.ensure_connected()?;
        let raw = self.backend.borrow_mut().axis(handle, axis);
        Ok(Axis::normalize(raw))
    }

    pub fn is_axis_available(&self, axis: Axis) -> Result<bool, SessionError> {
        let handle = self.ensure_connected()?;
        Ok(self.backend.borrow().has_axis(handle, axis))
    }

    pub fn name(&self) -> Result<String, SessionError> {
        let handle = self.ensure_connected()?;
        Ok(self
            .backend
            .borrow()
            .name(handle)
            .unwrap_or_else(|| UNNAMED_CONTROLLER.to_string()))
    }

    pub fn kind(&self) -> Result<ControllerKind, SessionError> {
        let handle = self.ensure_connected()?;
        Ok(self
            .backend
            .borrow()
            .name(handle)
            .map_or(ControllerKind::Unknown, |name| ControllerKind::from_name(&name)))
    }

    /// Player index if set and supported, `-1` otherwise.
    pub fn player_index(&self) -> Result<i32, SessionError> {
        let handle = self.ensure_connected()?;
        Ok(self.backend.borrow().player_index(handle))
    }

    pub fn set_player_index(&mut self, index: i32) -> Result<(), SessionError> {
        let handle = self.ensure_connected()?;
        self.backend.borrow_mut().set_player_index(handle, index);
        Ok(())
    }

    pub fn can_vibrate(&self) -> Result<bool, SessionError> {
        let handle = self.ensure_connected()?;
        Ok(self.backend.borrow().has_rumble(handle))
    }

    /// Starts a rumble effect, replacing any effect already running.
    ///
    /// Both magnitudes must lie in `[0.0, 1.0]`. Passing `0.0` for both stops
    /// vibration. Returns `false` if the device cannot vibrate or failed to take
    /// the command.
    pub fn do_vibration(
        &mut self,
        left: f32,
        right: f32,
        duration_ms: u32,
    ) -> Result<bool, SessionError> {
        let handle = self.ensure_connected()?;

        let in_range = |m: f32| (0.0..=1.0).contains(&m);
        if !(in_range(left) && in_range(right)) {
            return Err(SessionError::InvalidArgument(format!(
                "vibration magnitudes must be within 0 and 1, got left={} right={}",
                left, right
            )));
        }

        let low = (RUMBLE_MAX_RAW * left) as u16;
        let high = (RUMBLE_MAX_RAW * right) as u16;
        debug!(
            "Slot {} rumble low={} high={} for {}ms",
            self.slot, low, high, duration_ms
        );

        let accepted = self
            .backend
            .borrow_mut()
            .rumble(handle, low, high, duration_ms);
        if !accepted {
            warn!("Slot {} rejected rumble command", self.slot);
        }
        Ok(accepted)
    }

    pub fn stop_vibration(&mut self) -> Result<bool, SessionError> {
        self.do_vibration(0.0, 0.0, 0)
    }

    pub fn power_level(&self) -> Result<PowerLevel, SessionError> {
        let handle = self.ensure_connected()?;
        let raw = self.backend.borrow().power_level(handle);
        Ok(PowerLevel::from_raw(raw).unwrap_or_else(|| {
            warn!("Slot {} reported unknown power code {}", self.slot, raw);
            PowerLevel::Unknown
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, VirtualDevice};

    fn bound_session() -> (ControllerSession<MemoryBackend>, Rc<RefCell<MemoryBackend>>, DeviceId) {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let id = backend.borrow_mut().plug(VirtualDevice::named("Test Pad"));
        let mut session = ControllerSession::new(0, backend.clone());
        session.assign(Some(id));
        session.open();
        (session, backend, id)
    }

    #[test]
    fn test_new_session_is_unbound() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let session = ControllerSession::new(3, backend);
        assert_eq!(session.state(), SessionState::Unbound);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_just_pressed_is_one_shot() {
        let (mut session, backend, id) = bound_session();

        assert!(!session.is_button_just_pressed(Button::A).unwrap());

        backend.borrow_mut().set_button(id, Button::A, true);
        assert!(session.is_button_just_pressed(Button::A).unwrap());
        assert!(!session.is_button_just_pressed(Button::A).unwrap());
        assert!(session.is_button_pressed(Button::A).unwrap());

        backend.borrow_mut().set_button(id, Button::A, false);
        assert!(!session.is_button_pressed(Button::A).unwrap());

        backend.borrow_mut().set_button(id, Button::A, true);
        assert!(session.is_button_just_pressed(Button::A).unwrap());
    }

    #[test]
    fn test_pressed_then_just_pressed_collapses_edge() {
        let (mut session, backend, id) = bound_session();
        backend.borrow_mut().set_button(id, Button::B, true);

        assert!(session.is_button_pressed(Button::B).unwrap());
        assert!(!session.is_button_just_pressed(Button::B).unwrap());
    }

    #[test]
    fn test_buttons_are_independent() {
        let (mut session, backend, id) = bound_session();
        backend.borrow_mut().set_button(id, Button::X, true);
        backend.borrow_mut().set_button(id, Button::Y, true);

        assert!(session.is_button_just_pressed(Button::X).unwrap());
        // Y was never polled, so its edge is still pending
        assert!(session.is_button_just_pressed(Button::Y).unwrap());
        assert!(!session.is_button_just_pressed(Button::X).unwrap());
    }

    #[test]
    fn test_reconnect_resets_edge_baseline() {
        let (mut session, backend, id) = bound_session();
        backend.borrow_mut().set_button(id, Button::Start, true);
        assert!(session.is_button_just_pressed(Button::Start).unwrap());
        assert!(!session.is_button_just_pressed(Button::Start).unwrap());

        assert!(session.reconnect());
        assert!(session.is_button_just_pressed(Button::Start).unwrap());
    }

    #[test]
    fn test_queries_fail_when_unplugged() {
        let (mut session, backend, id) = bound_session();
        backend.borrow_mut().unplug(id);

        assert_eq!(session.state(), SessionState::Disconnected);
        let unavailable = SessionError::ControllerUnavailable { slot: 0 };
        assert_eq!(session.is_button_pressed(Button::A), Err(unavailable.clone()));
        assert_eq!(session.axis_state(Axis::LeftX), Err(unavailable.clone()));
        assert_eq!(session.name(), Err(unavailable.clone()));
        assert_eq!(session.power_level(), Err(unavailable.clone()));
        assert_eq!(session.do_vibration(0.5, 0.5, 10), Err(unavailable));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut session, backend, _) = bound_session();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(backend.borrow().open_handles(), 0);
    }

    #[test]
    fn test_axis_normalization() {
        let (mut session, backend, id) = bound_session();
        backend.borrow_mut().set_axis(id, Axis::RightY, 32767);
        assert_eq!(session.axis_state(Axis::RightY).unwrap(), 1.0);
        assert_eq!(session.axis_state(Axis::LeftY).unwrap(), 0.0);
    }

    #[test]
    fn test_vibration_range_and_scaling() {
        let (mut session, backend, id) = bound_session();

        assert!(matches!(
            session.do_vibration(1.5, 0.5, 100),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.do_vibration(0.5, -0.1, 100),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.do_vibration(f32::NAN, 0.0, 100),
            Err(SessionError::InvalidArgument(_))
        ));

        assert!(session.do_vibration(1.0, 0.5, 250).unwrap());
        let rumble = backend.borrow().device(id).unwrap().rumble.unwrap();
        assert_eq!(rumble.low, 65535);
        assert_eq!(rumble.high, 32767);
        assert_eq!(rumble.duration_ms, 250);

        assert!(session.do_vibration(0.0, 0.0, 0).unwrap());
        assert!(backend.borrow().device(id).unwrap().rumble.is_none());

        assert!(session.do_vibration(0.2, 0.2, 1000).unwrap());
        assert!(session.stop_vibration().unwrap());
        assert!(backend.borrow().device(id).unwrap().rumble.is_none());
    }

    #[test]
    fn test_name_falls_back_to_default() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let id = backend.borrow_mut().plug(VirtualDevice::default());
        let mut session = ControllerSession::new(1, backend);
        session.assign(Some(id));
        session.open();

        assert_eq!(session.name().unwrap(), UNNAMED_CONTROLLER);
        assert_eq!(session.kind().unwrap(), ControllerKind::Unknown);
    }

    #[test]
    fn test_power_level_and_player_index() {
        let (mut session, backend, id) = bound_session();
        backend.borrow_mut().set_power(id, 2);
        assert_eq!(session.power_level().unwrap(), PowerLevel::Medium);

        backend.borrow_mut().set_power(id, 42);
        assert_eq!(session.power_level().unwrap(), PowerLevel::Unknown);

        assert_eq!(session.player_index().unwrap(), -1);
        session.set_player_index(2).unwrap();
        assert_eq!(session.player_index().unwrap(), 2);
    }

    #[test]
    fn test_open_without_device_stays_disconnected() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let mut session = ControllerSession::new(0, backend);
        session.open();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.reconnect());
    }
}
