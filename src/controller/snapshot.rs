//! Immutable per-instant view of one session.
//!
//! A snapshot is a pure projection over [`ControllerSession`]: capturing one
//! polls every button and axis through the session, so it advances the same
//! edge-detection state as the direct API does.
//!
//! Equality compares the captured state only. The capture timestamp is
//! metadata and never takes part in `==`.

use crate::backend::InputBackend;
use crate::controller::session::{ControllerSession, SessionError};
use crate::controller::types::{Axis, Button, ButtonSet, ControllerKind};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    slot: usize,
    connected: bool,
    pressed: ButtonSet,
    just_pressed: ButtonSet,
    axes: [f32; Axis::COUNT],
    name: String,
    kind: ControllerKind,
    captured_at: DateTime<Local>,
}

impl ControllerSnapshot {
    /// Reads the complete state of `session` in one pass.
    ///
    /// A session that is not connected, or that loses its device halfway
    /// through the pass, yields [`ControllerSnapshot::disconnected`].
    pub fn capture<B: InputBackend>(session: &mut ControllerSession<B>) -> Self {
        let slot = session.slot();
        if !session.is_connected() {
            return Self::disconnected(slot);
        }

        Self::read(session).unwrap_or_else(|e| {
            debug!("Snapshot of slot {} degraded: {}", slot, e);
            Self::disconnected(slot)
        })
    }

    fn read<B: InputBackend>(session: &mut ControllerSession<B>) -> Result<Self, SessionError> {
        let mut pressed = ButtonSet::EMPTY;
        let mut just_pressed = ButtonSet::EMPTY;
        for button in Button::ALL {
            // press check first so the just-pressed read reuses the same poll
            pressed.set(button, session.is_button_pressed(button)?);
            just_pressed.set(button, session.just_pressed_cached(button));
        }

        let mut axes = [0.0; Axis::COUNT];
        for axis in Axis::ALL {
            axes[axis.index()] = session.axis_state(axis)?;
        }

        Ok(Self {
            slot: session.slot(),
            connected: true,
            pressed,
            just_pressed,
            axes,
            name: session.name()?,
            kind: session.kind()?,
            captured_at: Local::now(),
        })
    }

    /// Zeroed snapshot: nothing pressed, every axis at rest, no name, and the
    /// Unix epoch as capture time.
    pub fn disconnected(slot: usize) -> Self {
        Self {
            slot,
            connected: false,
            pressed: ButtonSet::EMPTY,
            just_pressed: ButtonSet::EMPTY,
            axes: [0.0; Axis::COUNT],
            name: String::new(),
            kind: ControllerKind::Unknown,
            captured_at: DateTime::<Local>::default(),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed.contains(button)
    }

    pub fn is_just_pressed(&self, button: Button) -> bool {
        self.just_pressed.contains(button)
    }

    pub fn pressed(&self) -> ButtonSet {
        self.pressed
    }

    pub fn just_pressed(&self) -> ButtonSet {
        self.just_pressed
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.index()]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// Left stick direction in degrees, counter-clockwise from +X.
    pub fn left_stick_angle(&self) -> f32 {
        stick_angle(self.axis(Axis::LeftX), self.axis(Axis::LeftY))
    }

    pub fn left_stick_magnitude(&self) -> f32 {
        self.axis(Axis::LeftX).hypot(self.axis(Axis::LeftY))
    }

    pub fn right_stick_angle(&self) -> f32 {
        stick_angle(self.axis(Axis::RightX), self.axis(Axis::RightY))
    }

    pub fn right_stick_magnitude(&self) -> f32 {
        self.axis(Axis::RightX).hypot(self.axis(Axis::RightY))
    }
}

impl PartialEq for ControllerSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
            && self.connected == other.connected
            && self.pressed == other.pressed
            && self.just_pressed == other.just_pressed
            && self.axes == other.axes
            && self.name == other.name
            && self.kind == other.kind
    }
}

fn stick_angle(x: f32, y: f32) -> f32 {
    y.atan2(x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, VirtualDevice};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_unopened_session_gives_zeroed_snapshot() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let mut session = ControllerSession::new(2, backend);
        let snapshot = ControllerSnapshot::capture(&mut session);

        assert!(!snapshot.is_connected());
        assert_eq!(snapshot.slot(), 2);
        assert!(snapshot.pressed().is_empty());
        assert!(Axis::ALL.iter().all(|a| snapshot.axis(*a) == 0.0));
        assert_eq!(snapshot.kind(), ControllerKind::Unknown);
    }

    #[test]
    fn test_capture_reads_buttons_axes_and_name() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let id = backend
            .borrow_mut()
            .plug(VirtualDevice::named("Xbox Wireless Controller"));
        let mut session = ControllerSession::new(0, backend.clone());
        session.assign(Some(id));
        session.open();

        backend.borrow_mut().set_button(id, Button::LeftBumper, true);
        backend.borrow_mut().set_axis(id, Axis::LeftX, 32767);

        let first = ControllerSnapshot::capture(&mut session);
        assert!(first.is_connected());
        assert!(first.is_pressed(Button::LeftBumper));
        assert!(first.is_just_pressed(Button::LeftBumper));
        assert!(!first.is_pressed(Button::A));
        assert_eq!(first.axis(Axis::LeftX), 1.0);
        assert_eq!(first.name(), "Xbox Wireless Controller");
        assert_eq!(first.kind(), ControllerKind::Xbox);
        assert_eq!(first.left_stick_angle(), 0.0);
        assert_eq!(first.left_stick_magnitude(), 1.0);

        let second = ControllerSnapshot::capture(&mut session);
        assert!(second.is_pressed(Button::LeftBumper));
        assert!(!second.is_just_pressed(Button::LeftBumper));
    }

    #[test]
    fn test_equality_ignores_capture_time() {
        let backend = Rc::new(RefCell::new(MemoryBackend::new()));
        let id = backend.borrow_mut().plug(VirtualDevice::named("Pad"));
        let mut session = ControllerSession::new(0, backend.clone());
        session.assign(Some(id));
        session.open();
        backend.borrow_mut().set_button(id, Button::B, true);
        backend.borrow_mut().set_axis(id, Axis::RightX, -16000);

        // first capture carries the B edge
        let edge = ControllerSnapshot::capture(&mut session);
        let first = ControllerSnapshot::capture(&mut session);
        let second = ControllerSnapshot::capture(&mut session);
        assert_ne!(edge, first);
        assert_eq!(first, second);

        let mut shifted = second.clone();
        shifted.captured_at = first.captured_at + chrono::Duration::seconds(5);
        assert_eq!(first, shifted);

        assert_eq!(
            ControllerSnapshot::disconnected(0).captured_at(),
            ControllerSnapshot::disconnected(0).captured_at()
        );
    }

    #[test]
    fn test_stick_angle_quadrants() {
        let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
        assert!(close(stick_angle(0.0, 1.0), 90.0));
        assert!(close(stick_angle(-1.0, 0.0), 180.0));
        assert!(close(stick_angle(0.0, -1.0), -90.0));
    }
}
