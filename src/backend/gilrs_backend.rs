//! Gilrs Backend - real gamepads through the `gilrs` crate
//!
//! gilrs keeps its own cached gamepad state that only advances when events are
//! drained, so every read pumps the event queue first. Hot-plug events seen
//! while pumping are buffered until the manager asks for them through
//! [`InputBackend::poll_events`]. Only the latest event per gamepad is kept,
//! so the buffer stays bounded even when nobody reconciles for a while.
//!
//! Player indices are not a gilrs concept; they are stored per handle and
//! reported back unchanged.

use super::{BackendError, DeviceEvent, DeviceHandle, DeviceId, InputBackend};
use crate::controller::manager::{ManagerConfig, ManagerError, SessionManager};
use crate::controller::types::{Axis, Button, PowerLevel, AXIS_MAX_RAW};
use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Repeat, Replay, Ticks};
use gilrs::{Event, EventType, Gamepad, GamepadId, Gilrs, PowerInfo};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

pub struct GilrsBackend {
    // Gilrs context
    gilrs: Gilrs,

    // Open handles and the gamepad behind each
    handles: HashMap<DeviceHandle, GamepadId>,

    // Hot-plug events drained while pumping, not yet handed out.
    // At most one per device.
    pending: Vec<DeviceEvent>,

    // Running rumble effect per handle; dropping one stops it
    effects: HashMap<DeviceHandle, Effect>,

    player_indices: HashMap<DeviceHandle, i32>,
    next_handle: u64,
    shut_down: bool,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, BackendError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(BackendError::Initialization(e.to_string()));
            }
        };

        log_gamepads(&gilrs);

        Ok(Self {
            gilrs,
            handles: HashMap::new(),
            pending: Vec::new(),
            effects: HashMap::new(),
            player_indices: HashMap::new(),
            next_handle: 0,
            shut_down: false,
        })
    }

    fn pump(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    info!("Controller connected event detected: {}", id);
                    queue_event(&mut self.pending, DeviceEvent::Added(device_id(id)));
                }
                EventType::Disconnected => {
                    warn!("Controller disconnected event detected: {}", id);
                    queue_event(&mut self.pending, DeviceEvent::Removed(device_id(id)));
                }
                _ => {}
            }
        }
    }

    fn gamepad(&self, handle: DeviceHandle) -> Option<Gamepad<'_>> {
        let id = *self.handles.get(&handle)?;
        self.gilrs.connected_gamepad(id)
    }
}

impl InputBackend for GilrsBackend {
    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        self.pump();
        std::mem::take(&mut self.pending)
    }

    fn devices(&self) -> Vec<DeviceId> {
        self.gilrs.gamepads().map(|(id, _)| device_id(id)).collect()
    }

    fn open(&mut self, device: DeviceId) -> Option<DeviceHandle> {
        if self.shut_down {
            return None;
        }
        let (id, gamepad) = self
            .gilrs
            .gamepads()
            .find(|(id, _)| device_id(*id) == device)?;
        debug!("Opening gamepad {} ({})", gamepad.name(), id);

        self.next_handle += 1;
        let handle = DeviceHandle::new(self.next_handle)?;
        self.handles.insert(handle, id);
        Some(handle)
    }

    fn close(&mut self, handle: DeviceHandle) {
        self.effects.remove(&handle);
        self.player_indices.remove(&handle);
        if let Some(id) = self.handles.remove(&handle) {
            debug!("Closed handle {} for gamepad {}", handle.raw(), id);
        }
    }

    fn is_attached(&self, handle: DeviceHandle) -> bool {
        self.gamepad(handle).is_some()
    }

    fn button(&mut self, handle: DeviceHandle, button: Button) -> bool {
        self.pump();
        match (self.gamepad(handle), map_button(button)) {
            (Some(gamepad), Some(button)) => gamepad.is_pressed(button),
            _ => false,
        }
    }

    fn has_button(&self, handle: DeviceHandle, button: Button) -> bool {
        match (self.gamepad(handle), map_button(button)) {
            (Some(gamepad), Some(button)) => gamepad.button_code(button).is_some(),
            _ => false,
        }
    }

    fn axis(&mut self, handle: DeviceHandle, axis: Axis) -> i16 {
        self.pump();
        let Some(gamepad) = self.gamepad(handle) else {
            return 0;
        };

        let value = match map_axis(axis) {
            AxisSource::Stick(axis) => gamepad.value(axis),
            AxisSource::Trigger(button, fallback) => gamepad
                .button_data(button)
                .map(|data| data.value())
                .unwrap_or_else(|| gamepad.value(fallback)),
        };
        (value.clamp(-1.0, 1.0) * AXIS_MAX_RAW) as i16
    }

    fn has_axis(&self, handle: DeviceHandle, axis: Axis) -> bool {
        let Some(gamepad) = self.gamepad(handle) else {
            return false;
        };
        match map_axis(axis) {
            AxisSource::Stick(axis) => gamepad.axis_code(axis).is_some(),
            AxisSource::Trigger(button, fallback) => {
                gamepad.button_code(button).is_some() || gamepad.axis_code(fallback).is_some()
            }
        }
    }

    fn rumble(&mut self, handle: DeviceHandle, low: u16, high: u16, duration_ms: u32) -> bool {
        let Some(&id) = self.handles.get(&handle) else {
            return false;
        };

        // a new command always replaces the running effect
        self.effects.remove(&handle);

        let supported = self
            .gilrs
            .connected_gamepad(id)
            .is_some_and(|gamepad| gamepad.is_ff_supported());
        if !supported {
            debug!("Gamepad {} has no force feedback", id);
            return false;
        }
        if low == 0 && high == 0 {
            return true;
        }

        let ticks = Ticks::from_ms(duration_ms);
        let scheduling = Replay {
            play_for: ticks,
            ..Default::default()
        };
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong { magnitude: low },
                scheduling,
                ..Default::default()
            })
            .add_effect(BaseEffect {
                kind: BaseEffectType::Weak { magnitude: high },
                scheduling,
                ..Default::default()
            })
            .gamepads(&[id])
            .repeat(Repeat::For(ticks))
            .finish(&mut self.gilrs)
            .and_then(|effect| {
                effect.play()?;
                Ok(effect)
            });

        match effect {
            Ok(effect) => {
                self.effects.insert(handle, effect);
                true
            }
            Err(e) => {
                error!("Failed to start rumble on gamepad {}: {}", id, e);
                false
            }
        }
    }

    fn has_rumble(&self, handle: DeviceHandle) -> bool {
        self.gamepad(handle)
            .is_some_and(|gamepad| gamepad.is_ff_supported())
    }

    fn name(&self, handle: DeviceHandle) -> Option<String> {
        self.gamepad(handle)
            .map(|gamepad| gamepad.name().to_string())
            .filter(|name| !name.is_empty())
    }

    fn player_index(&self, handle: DeviceHandle) -> i32 {
        self.player_indices.get(&handle).copied().unwrap_or(-1)
    }

    fn set_player_index(&mut self, handle: DeviceHandle, index: i32) {
        if self.handles.contains_key(&handle) {
            self.player_indices.insert(handle, index);
        }
    }

    fn power_level(&self, handle: DeviceHandle) -> i32 {
        let level = match self.gamepad(handle).map(|gamepad| gamepad.power_info()) {
            Some(PowerInfo::Wired) => PowerLevel::Wired,
            Some(PowerInfo::Charged) => PowerLevel::Full,
            Some(PowerInfo::Charging(percent)) | Some(PowerInfo::Discharging(percent)) => {
                level_for_percent(percent)
            }
            _ => PowerLevel::Unknown,
        };
        level.raw()
    }

    fn shutdown(&mut self) {
        info!(
            "Releasing gilrs backend ({} open handles, {} running effects)",
            self.handles.len(),
            self.effects.len()
        );
        self.effects.clear();
        self.player_indices.clear();
        self.handles.clear();
        self.pending.clear();
        self.shut_down = true;
    }
}

impl SessionManager<GilrsBackend> {
    /// Initializes gilrs and a manager on top of it.
    pub fn with_gilrs(config: ManagerConfig) -> Result<Self, ManagerError> {
        let backend = GilrsBackend::new()?;
        SessionManager::init(config, backend)
    }
}

fn log_gamepads(gilrs: &Gilrs) {
    let gamepads: Vec<(GamepadId, Gamepad<'_>)> = gilrs.gamepads().collect();
    if gamepads.is_empty() {
        warn!("No gamepad connected, waiting for hot-plug");
    } else {
        info!("Found {} gamepads:", gamepads.len());
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            info!(
                "  [{}] ID: {}, Name: {}, UUID: {:?}",
                idx,
                id,
                gamepad.name(),
                gamepad.uuid()
            );
        }
    }
}

/// Appends `event`, replacing any older event still pending for the same device.
fn queue_event(pending: &mut Vec<DeviceEvent>, event: DeviceEvent) {
    let device = event_device(event);
    pending.retain(|e| event_device(*e) != device);
    pending.push(event);
}

fn event_device(event: DeviceEvent) -> DeviceId {
    match event {
        DeviceEvent::Added(id) | DeviceEvent::Removed(id) => id,
    }
}

fn device_id(id: GamepadId) -> DeviceId {
    DeviceId(usize::from(id))
}

enum AxisSource {
    Stick(gilrs::Axis),
    // analog triggers report through the button value, older mappings through Z
    Trigger(gilrs::Button, gilrs::Axis),
}

fn map_axis(axis: Axis) -> AxisSource {
    match axis {
        Axis::LeftX => AxisSource::Stick(gilrs::Axis::LeftStickX),
        Axis::LeftY => AxisSource::Stick(gilrs::Axis::LeftStickY),
        Axis::RightX => AxisSource::Stick(gilrs::Axis::RightStickX),
        Axis::RightY => AxisSource::Stick(gilrs::Axis::RightStickY),
        Axis::TriggerLeft => AxisSource::Trigger(gilrs::Button::LeftTrigger2, gilrs::Axis::LeftZ),
        Axis::TriggerRight => {
            AxisSource::Trigger(gilrs::Button::RightTrigger2, gilrs::Axis::RightZ)
        }
    }
}

// Helper function to map our Button to the gilrs layout
fn map_button(button: Button) -> Option<gilrs::Button> {
    match button {
        Button::A => Some(gilrs::Button::South),
        Button::B => Some(gilrs::Button::East),
        Button::X => Some(gilrs::Button::West),
        Button::Y => Some(gilrs::Button::North),
        Button::Back => Some(gilrs::Button::Select),
        Button::Guide => Some(gilrs::Button::Mode),
        Button::Start => Some(gilrs::Button::Start),
        Button::LeftStick => Some(gilrs::Button::LeftThumb),
        Button::RightStick => Some(gilrs::Button::RightThumb),
        Button::LeftBumper => Some(gilrs::Button::LeftTrigger),
        Button::RightBumper => Some(gilrs::Button::RightTrigger),
        Button::DPadUp => Some(gilrs::Button::DPadUp),
        Button::DPadDown => Some(gilrs::Button::DPadDown),
        Button::DPadLeft => Some(gilrs::Button::DPadLeft),
        Button::DPadRight => Some(gilrs::Button::DPadRight),
        // no gilrs equivalent
        Button::Misc1
        | Button::Paddle1
        | Button::Paddle2
        | Button::Paddle3
        | Button::Paddle4
        | Button::Touchpad => None,
    }
}

fn level_for_percent(percent: u8) -> PowerLevel {
    match percent {
        0..=5 => PowerLevel::Empty,
        6..=20 => PowerLevel::Low,
        21..=70 => PowerLevel::Medium,
        _ => PowerLevel::Full,
    }
}
