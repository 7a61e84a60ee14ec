//! Session Manager - slot table and hot-plug reconciliation
//!
//! Owns a fixed array of [`ControllerSession`] slots and is the only way to
//! reach them. Callers keep the slot index, not the session, and look the
//! session up again each frame. A slot keeps its device until that device is
//! unplugged; other devices coming and going never renumber it.
//!
//! # Reconciliation
//!
//! ```text
//! backend.poll_events() ──► Added(id)   ──► lowest free slot ──► open
//!                       └─► Removed(id) ──► close + free slot (session kept)
//! ```
//!
//! Devices arriving while every slot is taken wait in arrival order and are
//! bound as soon as a slot frees up.

use crate::backend::{BackendError, DeviceEvent, DeviceId, InputBackend};
use crate::controller::session::{ControllerSession, SessionError};
use crate::controller::snapshot::ControllerSnapshot;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_SLOTS: usize = 4;

/// Settings for the slot table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Number of session slots, fixed for the manager's lifetime.
    pub max_slots: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
        }
    }
}

// Manager errors
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Slot {slot} is out of range (manager has {max_slots} slots)")]
    InvalidSlot { slot: usize, max_slots: usize },

    #[error("Invalid manager configuration: {0}")]
    InvalidConfig(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

pub struct SessionManager<B: InputBackend> {
    config: ManagerConfig,
    backend: Rc<RefCell<B>>,
    slots: Vec<ControllerSession<B>>,
    waiting: VecDeque<DeviceId>,
    quit: bool,
}

impl<B: InputBackend> SessionManager<B> {
    /// Binds to `backend` and preallocates every slot.
    ///
    /// Devices already attached are assigned to slots in enumeration order and
    /// opened on first use.
    pub fn init(config: ManagerConfig, backend: B) -> Result<Self, ManagerError> {
        info!("Initializing session manager with config: {:?}", config);
        if config.max_slots == 0 {
            return Err(ManagerError::InvalidConfig(
                "max_slots must be at least 1".to_string(),
            ));
        }

        let backend = Rc::new(RefCell::new(backend));
        let slots = (0..config.max_slots)
            .map(|slot| ControllerSession::new(slot, backend.clone()))
            .collect();

        let mut manager = Self {
            config,
            backend,
            slots,
            waiting: VecDeque::new(),
            quit: false,
        };

        let present = manager.backend.borrow().devices();
        info!("Found {} attached devices", present.len());
        for device in present {
            match manager.lowest_free_slot() {
                Some(slot) => {
                    debug!("Assigning {} to slot {}", device, slot);
                    manager.slots[slot].assign(Some(device));
                }
                None => {
                    warn!("No free slot for {}, queuing it", device);
                    manager.waiting.push_back(device);
                }
            }
        }

        info!("Session manager initialized");
        Ok(manager)
    }

    pub fn max_slots(&self) -> usize {
        self.config.max_slots
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    /// Slot currently assigned to `device`.
    pub fn slot_of(&self, device: DeviceId) -> Option<usize> {
        self.slots.iter().position(|s| s.device() == Some(device))
    }

    pub fn backend(&self) -> Ref<'_, B> {
        self.backend.borrow()
    }

    pub fn backend_mut(&self) -> RefMut<'_, B> {
        self.backend.borrow_mut()
    }

    /// Applies hot-plug events received since the previous call.
    pub fn update(&mut self) {
        if self.quit {
            debug!("Update ignored, manager has quit");
            return;
        }

        let events = self.backend.borrow_mut().poll_events();
        if !events.is_empty() {
            debug!("Reconciling {} hot-plug events", events.len());
        }

        for event in events {
            match event {
                DeviceEvent::Added(device) => self.attach(device),
                DeviceEvent::Removed(device) => self.detach(device),
            }
        }
    }

    fn attach(&mut self, device: DeviceId) {
        if let Some(slot) = self.slot_of(device) {
            debug!("{} already bound to slot {}", device, slot);
            return;
        }
        if self.waiting.contains(&device) {
            debug!("{} already waiting for a slot", device);
            return;
        }

        match self.lowest_free_slot() {
            Some(slot) => self.bind(slot, device),
            None => {
                warn!(
                    "All {} slots taken, {} waits for a free slot",
                    self.config.max_slots, device
                );
                self.waiting.push_back(device);
            }
        }
    }

    fn detach(&mut self, device: DeviceId) {
        if let Some(slot) = self.slot_of(device) {
            info!("{} removed from slot {}", device, slot);
            self.slots[slot].release();

            if let Some(next) = self.waiting.pop_front() {
                if let Some(free) = self.lowest_free_slot() {
                    self.bind(free, next);
                }
            }
        } else if let Some(pos) = self.waiting.iter().position(|d| *d == device) {
            debug!("{} left the wait queue", device);
            self.waiting.remove(pos);
        } else {
            debug!("Removal of unknown {}", device);
        }
    }

    fn bind(&mut self, slot: usize, device: DeviceId) {
        info!("Binding {} to slot {}", device, slot);
        let session = &mut self.slots[slot];
        session.close();
        session.assign(Some(device));
        session.open();
    }

    fn lowest_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.device().is_none())
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut ControllerSession<B>, ManagerError> {
        let max_slots = self.config.max_slots;
        self.slots
            .get_mut(slot)
            .ok_or(ManagerError::InvalidSlot { slot, max_slots })
    }

    /// Session for `slot`, opened on first access.
    pub fn get_session(&mut self, slot: usize) -> Result<&mut ControllerSession<B>, ManagerError> {
        let session = self.slot_mut(slot)?;
        session.touch();
        Ok(session)
    }

    /// Fresh snapshot of `slot`. Every call queries the backend.
    pub fn get_state(&mut self, slot: usize) -> Result<ControllerSnapshot, ManagerError> {
        let session = self.get_session(slot)?;
        Ok(ControllerSnapshot::capture(session))
    }

    /// Number of slots whose device is currently connected.
    pub fn count(&mut self) -> usize {
        let mut connected = 0;
        for session in &mut self.slots {
            session.touch();
            if session.is_connected() {
                connected += 1;
            }
        }
        connected
    }

    /// Closes every session and releases the backend. Safe to call twice.
    pub fn quit(&mut self) {
        if self.quit {
            return;
        }

        info!("Shutting down session manager");
        for session in &mut self.slots {
            session.close();
        }
        self.waiting.clear();
        self.backend.borrow_mut().shutdown();
        self.quit = true;
        info!("Session manager shut down");
    }
}

impl<B: InputBackend> Drop for SessionManager<B> {
    fn drop(&mut self) {
        self.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, VirtualDevice};
    use crate::controller::session::SessionState;

    #[test]
    fn test_zero_slots_rejected() {
        let result = SessionManager::init(ManagerConfig { max_slots: 0 }, MemoryBackend::new());
        assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
    }

    #[test]
    fn test_init_assigns_present_devices_lazily() {
        let mut backend = MemoryBackend::new();
        let a = backend.plug(VirtualDevice::default());
        let b = backend.plug(VirtualDevice::default());

        let mut manager = SessionManager::init(ManagerConfig::default(), backend).unwrap();
        assert_eq!(manager.slot_of(a), Some(0));
        assert_eq!(manager.slot_of(b), Some(1));
        assert_eq!(manager.backend().open_handles(), 0);

        assert_eq!(manager.get_session(0).unwrap().state(), SessionState::Open);
        assert_eq!(manager.backend().open_handles(), 1);

        // queued Added events for devices seen at init are duplicates
        manager.update();
        assert_eq!(manager.slot_of(a), Some(0));
        assert_eq!(manager.slot_of(b), Some(1));
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_invalid_slot() {
        let mut manager =
            SessionManager::init(ManagerConfig { max_slots: 2 }, MemoryBackend::new()).unwrap();
        assert!(matches!(
            manager.get_session(2),
            Err(ManagerError::InvalidSlot { slot: 2, max_slots: 2 })
        ));
        assert!(matches!(
            manager.get_state(7),
            Err(ManagerError::InvalidSlot { .. })
        ));
    }

    #[test]
    fn test_overflow_device_waits_for_free_slot() {
        let mut manager =
            SessionManager::init(ManagerConfig { max_slots: 1 }, MemoryBackend::new()).unwrap();
        let first = manager.backend_mut().plug(VirtualDevice::default());
        let second = manager.backend_mut().plug(VirtualDevice::default());
        manager.update();
        assert_eq!(manager.slot_of(first), Some(0));
        assert_eq!(manager.slot_of(second), None);

        manager.backend_mut().unplug(first);
        manager.update();
        assert_eq!(manager.slot_of(second), Some(0));
        assert!(manager.get_session(0).unwrap().is_connected());
    }

    #[test]
    fn test_waiting_device_unplugged_before_binding() {
        let mut manager =
            SessionManager::init(ManagerConfig { max_slots: 1 }, MemoryBackend::new()).unwrap();
        let first = manager.backend_mut().plug(VirtualDevice::default());
        let second = manager.backend_mut().plug(VirtualDevice::default());
        manager.update();

        manager.backend_mut().unplug(second);
        manager.backend_mut().unplug(first);
        manager.update();
        assert_eq!(manager.slot_of(second), None);
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_quit_is_idempotent() {
        let mut backend = MemoryBackend::new();
        backend.plug(VirtualDevice::default());
        let mut manager = SessionManager::init(ManagerConfig::default(), backend).unwrap();
        assert_eq!(manager.count(), 1);

        manager.quit();
        manager.quit();
        assert!(manager.is_quit());
        assert!(manager.backend().is_shut_down());
        assert_eq!(manager.backend().open_handles(), 0);
        assert_eq!(manager.count(), 0);
    }
}
