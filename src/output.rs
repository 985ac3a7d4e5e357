//! Boundary with the input-emission layer.
//!
//! The core never talks to evdev directly. It registers channels through an
//! [`InputBackend`] and writes events to the returned [`InputChannel`]s in a
//! fixed order per report: absolute axes and keys first, sync last.

use crate::error::BackendError;
use crate::event::{Axis, ChannelKind};

/// Absolute axis range requested at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub axis: Axis,
    pub min: i32,
    pub max: i32,
    pub resolution: i32,
}

/// Software autorepeat for held keys, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autorepeat {
    pub delay: u32,
    pub period: u32,
}

/// Everything a backend needs to create one logical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub kind: ChannelKind,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub axes: Vec<AxisRange>,
    pub keys: Vec<u16>,
    /// Set on key channels; those also report scan codes.
    pub autorepeat: Option<Autorepeat>,
}

impl ChannelSpec {
    pub fn axis(&self, axis: Axis) -> Option<&AxisRange> {
        self.axes.iter().find(|a| a.axis == axis)
    }
}

/// A registered channel. Dropping it unregisters the channel.
pub trait InputChannel: Send {
    fn emit_absolute(&mut self, axis: Axis, value: i32) -> Result<(), BackendError>;
    fn emit_key(&mut self, key: u16, pressed: bool) -> Result<(), BackendError>;
    fn emit_sync(&mut self) -> Result<(), BackendError>;
}

/// Creates channels on the downstream input subsystem.
pub trait InputBackend: Send + Sync {
    fn register(&self, spec: &ChannelSpec) -> Result<Box<dyn InputChannel>, BackendError>;
}

/// Backend that writes every event to the log; used by `replay --dry-run`.
#[derive(Debug, Default)]
pub struct LogBackend;

struct LogChannel {
    name: String,
}

impl InputBackend for LogBackend {
    fn register(&self, spec: &ChannelSpec) -> Result<Box<dyn InputChannel>, BackendError> {
        let ranges: Vec<String> = spec
            .axes
            .iter()
            .map(|a| format!("{}=[{}, {}]", a.axis, a.min, a.max))
            .collect();
        log::info!(
            "register {} channel \"{}\" axes: {} keys: {}",
            spec.kind,
            spec.name,
            ranges.join(" "),
            spec.keys.len()
        );
        Ok(Box::new(LogChannel {
            name: spec.name.clone(),
        }))
    }
}

impl InputChannel for LogChannel {
    fn emit_absolute(&mut self, axis: Axis, value: i32) -> Result<(), BackendError> {
        println!("{}: {} {}", self.name, axis, value);
        Ok(())
    }

    fn emit_key(&mut self, key: u16, pressed: bool) -> Result<(), BackendError> {
        println!(
            "{}: {} {}",
            self.name,
            crate::event::key_name(key),
            if pressed { "down" } else { "up" }
        );
        Ok(())
    }

    fn emit_sync(&mut self) -> Result<(), BackendError> {
        println!("{}: SYN_REPORT", self.name);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording backend used by the session and driver tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Recorded {
        Abs(Axis, i32),
        Key(u16, bool),
        Sync,
    }

    #[derive(Debug, Default)]
    pub struct Journal {
        pub registered: Vec<ChannelSpec>,
        pub dropped: Vec<(ChannelKind, u32)>,
        pub events: Vec<(ChannelKind, u32, Recorded)>,
    }

    /// Records registrations and events; channels get increasing serials so
    /// tests can tell a re-registered channel apart from the old one.
    #[derive(Clone, Default)]
    pub struct RecordingBackend {
        pub journal: Arc<Mutex<Journal>>,
        pub reject: Arc<Mutex<Option<ChannelKind>>>,
    }

    impl RecordingBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self, kind: ChannelKind) -> Vec<Recorded> {
            self.journal
                .lock()
                .unwrap()
                .events
                .iter()
                .filter(|(k, _, _)| *k == kind)
                .map(|(_, _, e)| e.clone())
                .collect()
        }

        pub fn registered(&self) -> Vec<ChannelSpec> {
            self.journal.lock().unwrap().registered.clone()
        }

        pub fn dropped(&self) -> Vec<(ChannelKind, u32)> {
            self.journal.lock().unwrap().dropped.clone()
        }

        pub fn clear_events(&self) {
            self.journal.lock().unwrap().events.clear();
        }

        pub fn reject(&self, kind: Option<ChannelKind>) {
            *self.reject.lock().unwrap() = kind;
        }
    }

    struct RecordingChannel {
        kind: ChannelKind,
        serial: u32,
        journal: Arc<Mutex<Journal>>,
    }

    impl RecordingChannel {
        fn push(&self, event: Recorded) {
            self.journal
                .lock()
                .unwrap()
                .events
                .push((self.kind, self.serial, event));
        }
    }

    impl Drop for RecordingChannel {
        fn drop(&mut self) {
            self.journal
                .lock()
                .unwrap()
                .dropped
                .push((self.kind, self.serial));
        }
    }

    impl InputBackend for RecordingBackend {
        fn register(&self, spec: &ChannelSpec) -> Result<Box<dyn InputChannel>, BackendError> {
            if *self.reject.lock().unwrap() == Some(spec.kind) {
                return Err(BackendError::Rejected("test rejection".into()));
            }
            let mut journal = self.journal.lock().unwrap();
            journal.registered.push(spec.clone());
            let serial = journal.registered.len() as u32;
            Ok(Box::new(RecordingChannel {
                kind: spec.kind,
                serial,
                journal: self.journal.clone(),
            }))
        }
    }

    impl InputChannel for RecordingChannel {
        fn emit_absolute(&mut self, axis: Axis, value: i32) -> Result<(), BackendError> {
            self.push(Recorded::Abs(axis, value));
            Ok(())
        }

        fn emit_key(&mut self, key: u16, pressed: bool) -> Result<(), BackendError> {
            self.push(Recorded::Key(key, pressed));
            Ok(())
        }

        fn emit_sync(&mut self) -> Result<(), BackendError> {
            self.push(Recorded::Sync);
            Ok(())
        }
    }
}
