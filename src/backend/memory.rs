//! Scripted in-process backend.
//!
//! Devices are plugged, unplugged and driven by the host program. Handy for
//! headless runs and for exercising the session logic in tests.

use super::{DeviceEvent, DeviceHandle, DeviceId, InputBackend};
use crate::controller::types::{Axis, Button, ButtonSet, PowerLevel};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Last rumble command a virtual device accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rumble {
    pub low: u16,
    pub high: u16,
    pub duration_ms: u32,
}

/// Description and live state of a scripted device.
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub name: Option<String>,
    pub pressed: ButtonSet,
    pub available_buttons: ButtonSet,
    pub axes: [i16; Axis::COUNT],
    pub available_axes: [bool; Axis::COUNT],
    pub rumble_supported: bool,
    pub power: i32,
    pub player_index: i32,
    pub rumble: Option<Rumble>,
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self {
            name: None,
            pressed: ButtonSet::EMPTY,
            available_buttons: Button::ALL.into_iter().collect(),
            axes: [0; Axis::COUNT],
            available_axes: [true; Axis::COUNT],
            rumble_supported: true,
            power: PowerLevel::Unknown.raw(),
            player_index: -1,
            rumble: None,
        }
    }
}

impl VirtualDevice {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    attached: BTreeMap<DeviceId, VirtualDevice>,
    events: VecDeque<DeviceEvent>,
    handles: HashMap<DeviceHandle, DeviceId>,
    next_device: usize,
    next_handle: u64,
    shut_down: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a device and queues an `Added` notification for it.
    pub fn plug(&mut self, device: VirtualDevice) -> DeviceId {
        let id = DeviceId(self.next_device);
        self.next_device += 1;
        info!("Virtual device {} plugged: {:?}", id, device.name);
        self.attached.insert(id, device);
        self.events.push_back(DeviceEvent::Added(id));
        id
    }

    /// Detaches a device. Handles opened on it stay allocated but report detached.
    pub fn unplug(&mut self, id: DeviceId) -> bool {
        if self.attached.remove(&id).is_some() {
            info!("Virtual device {} unplugged", id);
            self.events.push_back(DeviceEvent::Removed(id));
            true
        } else {
            warn!("Unplug requested for unknown device {}", id);
            false
        }
    }

    pub fn set_button(&mut self, id: DeviceId, button: Button, pressed: bool) {
        if let Some(device) = self.attached.get_mut(&id) {
            device.pressed.set(button, pressed);
        }
    }

    pub fn set_axis(&mut self, id: DeviceId, axis: Axis, raw: i16) {
        if let Some(device) = self.attached.get_mut(&id) {
            device.axes[axis.index()] = raw;
        }
    }

    pub fn set_power(&mut self, id: DeviceId, raw: i32) {
        if let Some(device) = self.attached.get_mut(&id) {
            device.power = raw;
        }
    }

    pub fn device(&self, id: DeviceId) -> Option<&VirtualDevice> {
        self.attached.get(&id)
    }

    /// Number of handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn attached_device(&self, handle: DeviceHandle) -> Option<&VirtualDevice> {
        self.handles.get(&handle).and_then(|id| self.attached.get(id))
    }

    fn attached_device_mut(&mut self, handle: DeviceHandle) -> Option<&mut VirtualDevice> {
        let id = *self.handles.get(&handle)?;
        self.attached.get_mut(&id)
    }
}

impl InputBackend for MemoryBackend {
    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        self.events.drain(..).collect()
    }

    fn devices(&self) -> Vec<DeviceId> {
        self.attached.keys().copied().collect()
    }

    fn open(&mut self, device: DeviceId) -> Option<DeviceHandle> {
        if self.shut_down || !self.attached.contains_key(&device) {
            debug!("Cannot open {}: not attached", device);
            return None;
        }
        self.next_handle += 1;
        let handle = DeviceHandle::new(self.next_handle)?;
        self.handles.insert(handle, device);
        debug!("Opened {} as handle {}", device, handle.raw());
        Some(handle)
    }

    fn close(&mut self, handle: DeviceHandle) {
        if self.handles.remove(&handle).is_some() {
            debug!("Closed handle {}", handle.raw());
        }
    }

    fn is_attached(&self, handle: DeviceHandle) -> bool {
        self.attached_device(handle).is_some()
    }

    fn button(&mut self, handle: DeviceHandle, button: Button) -> bool {
        self.attached_device(handle)
            .is_some_and(|d| d.available_buttons.contains(button) && d.pressed.contains(button))
    }

    fn has_button(&self, handle: DeviceHandle, button: Button) -> bool {
        self.attached_device(handle)
            .is_some_and(|d| d.available_buttons.contains(button))
    }

    fn axis(&mut self, handle: DeviceHandle, axis: Axis) -> i16 {
        self.attached_device(handle)
            .filter(|d| d.available_axes[axis.index()])
            .map_or(0, |d| d.axes[axis.index()])
    }

    fn has_axis(&self, handle: DeviceHandle, axis: Axis) -> bool {
        self.attached_device(handle)
            .is_some_and(|d| d.available_axes[axis.index()])
    }

    fn rumble(&mut self, handle: DeviceHandle, low: u16, high: u16, duration_ms: u32) -> bool {
        match self.attached_device_mut(handle) {
            Some(device) if device.rumble_supported => {
                device.rumble = if low == 0 && high == 0 {
                    None
                } else {
                    Some(Rumble {
                        low,
                        high,
                        duration_ms,
                    })
                };
                true
            }
            _ => false,
        }
    }

    fn has_rumble(&self, handle: DeviceHandle) -> bool {
        self.attached_device(handle)
            .is_some_and(|d| d.rumble_supported)
    }

    fn name(&self, handle: DeviceHandle) -> Option<String> {
        self.attached_device(handle).and_then(|d| d.name.clone())
    }

    fn player_index(&self, handle: DeviceHandle) -> i32 {
        self.attached_device(handle).map_or(-1, |d| d.player_index)
    }

    fn set_player_index(&mut self, handle: DeviceHandle, index: i32) {
        if let Some(device) = self.attached_device_mut(handle) {
            device.player_index = index;
        }
    }

    fn power_level(&self, handle: DeviceHandle) -> i32 {
        self.attached_device(handle)
            .map_or(PowerLevel::Unknown.raw(), |d| d.power)
    }

    fn shutdown(&mut self) {
        info!(
            "Shutting down memory backend with {} open handles",
            self.handles.len()
        );
        self.handles.clear();
        self.shut_down = true;
    }
}
