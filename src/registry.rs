//! Table of live sessions keyed by physical device.
//!
//! The lock is only held to look up, insert or remove entries. Decoding,
//! emission and channel registration all happen on a cloned `Arc` after it
//! is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::device::UsbDeviceId;
use crate::session::{lock, DeviceSession, SessionState};

#[derive(Default)]
pub struct DeviceRegistry {
    sessions: Mutex<HashMap<UsbDeviceId, Arc<DeviceSession>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device: UsbDeviceId) -> Option<Arc<DeviceSession>> {
        lock(&self.sessions).get(&device).cloned()
    }

    /// Return the live session for `device`, creating it if there is none.
    /// A session that is already detached counts as absent. The flag is true
    /// when the session was created by this call.
    pub fn get_or_insert_with(
        &self,
        device: UsbDeviceId,
        create: impl FnOnce() -> DeviceSession,
    ) -> (Arc<DeviceSession>, bool) {
        let mut sessions = lock(&self.sessions);
        if let Some(existing) = sessions.get(&device) {
            if existing.state() != SessionState::Detached {
                return (existing.clone(), false);
            }
        }
        let session = Arc::new(create());
        sessions.insert(device, session.clone());
        (session, true)
    }

    /// Remove `session` if it is still the one registered for its device.
    pub fn remove_if_same(&self, session: &Arc<DeviceSession>) -> bool {
        let mut sessions = lock(&self.sessions);
        match sessions.get(&session.device()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&session.device());
                true
            }
            _ => false,
        }
    }

    /// Snapshot of every session, for fan-out outside the lock.
    pub fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        lock(&self.sessions).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
