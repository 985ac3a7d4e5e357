//! Per-device session: decode, map, track, emit.
//!
//! A physical tablet exposes its pen and its buttons on separate USB
//! interfaces. Both bind to one [`DeviceSession`], each contributing the
//! channels it carries, and reports are routed by what they decode to rather
//! than by the interface they arrived on.
//!
//! Lock order: `mapping` before `pen`, `tracker` before `buttons`/`pad`.
//! `binding` is never held while taking any other lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buttons::{ButtonStateTracker, KeyChange, Transitions};
use crate::config::Configuration;
use crate::device::{InterfaceId, ModelDescriptor, UsbDeviceId, PAD_KEY_MAP, WHEEL_KEY_MAP};
use crate::error::{BackendError, CoreError};
use crate::event::{Axis, ChannelKind, BTN_STYLUS, BTN_STYLUS2, BTN_TOUCH};
use crate::mapping::{compute_derived_mapping, map_pressure, DerivedMapping};
use crate::output::{Autorepeat, AxisRange, ChannelSpec, InputBackend, InputChannel};
use crate::report::{classify_and_decode, ButtonGroup, DecodedEvent, InterfaceKind, PenSample};

const POSITION_RESOLUTION: i32 = 100;
const KEY_AUTOREPEAT: Autorepeat = Autorepeat {
    delay: 100,
    period: 33,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no interface bound yet.
    Attaching,
    Active,
    /// Last interface gone; the session only lingers in in-flight calls.
    Detached,
}

struct Binding {
    state: SessionState,
    interfaces: BTreeMap<u8, InterfaceKind>,
}

struct MappingState {
    config: Arc<Configuration>,
    derived: DerivedMapping,
}

type ChannelSlot = Mutex<Option<Box<dyn InputChannel>>>;

pub struct DeviceSession {
    device: UsbDeviceId,
    model: &'static ModelDescriptor,
    binding: Mutex<Binding>,
    mapping: Mutex<MappingState>,
    tracker: Mutex<ButtonStateTracker>,
    pen: ChannelSlot,
    buttons: ChannelSlot,
    pad: ChannelSlot,
    reports: AtomicU64,
}

impl DeviceSession {
    pub fn new(
        device: UsbDeviceId,
        model: &'static ModelDescriptor,
        config: Arc<Configuration>,
    ) -> Self {
        let derived = derive(model, &config);
        Self {
            device,
            model,
            binding: Mutex::new(Binding {
                state: SessionState::Attaching,
                interfaces: BTreeMap::new(),
            }),
            mapping: Mutex::new(MappingState { config, derived }),
            tracker: Mutex::new(ButtonStateTracker::new()),
            pen: Mutex::new(None),
            buttons: Mutex::new(None),
            pad: Mutex::new(None),
            reports: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> UsbDeviceId {
        self.device
    }

    pub fn model(&self) -> &'static ModelDescriptor {
        self.model
    }

    pub fn state(&self) -> SessionState {
        lock(&self.binding).state
    }

    pub fn is_bound(&self, interface: u8) -> bool {
        lock(&self.binding).interfaces.contains_key(&interface)
    }

    pub fn interfaces(&self) -> Vec<(u8, InterfaceKind)> {
        lock(&self.binding)
            .interfaces
            .iter()
            .map(|(&i, &k)| (i, k))
            .collect()
    }

    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        lock(self.slot(kind)).is_some()
    }

    pub fn mapping(&self) -> DerivedMapping {
        lock(&self.mapping).derived
    }

    pub fn config_version(&self) -> u64 {
        lock(&self.mapping).config.version
    }

    /// Number of reports handled so far, including dropped ones.
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    fn slot(&self, kind: ChannelKind) -> &ChannelSlot {
        match kind {
            ChannelKind::Pen => &self.pen,
            ChannelKind::Buttons => &self.buttons,
            ChannelKind::Pad => &self.pad,
        }
    }

    /// Channels an interface of this kind carries on this model.
    fn channels_for(&self, kind: InterfaceKind) -> Vec<ChannelKind> {
        match kind {
            InterfaceKind::Pen => vec![ChannelKind::Pen],
            InterfaceKind::Keyboard => {
                let mut channels = Vec::new();
                if self.model.has_button_channel() {
                    channels.push(ChannelKind::Buttons);
                }
                if self.model.flags.has_gesture_pad {
                    channels.push(ChannelKind::Pad);
                }
                channels
            }
            InterfaceKind::Proprietary => Vec::new(),
        }
    }

    /// Bind an interface and register the channels it contributes.
    ///
    /// Returns `Ok(false)` if the session was detached in the meantime; the
    /// caller should start over with a fresh session. On error every channel
    /// registered by this call is released again.
    pub fn bind(
        &self,
        interface: u8,
        kind: InterfaceKind,
        backend: &dyn InputBackend,
    ) -> Result<bool, CoreError> {
        if self.state() == SessionState::Detached {
            return Ok(false);
        }

        let mut opened = Vec::new();
        for channel in self.channels_for(kind) {
            match self.open_channel(channel, backend) {
                Ok(true) => opened.push(channel),
                Ok(false) => {}
                Err(e) => {
                    self.close(&opened);
                    return Err(e);
                }
            }
        }

        let mut binding = lock(&self.binding);
        if binding.state == SessionState::Detached {
            drop(binding);
            self.close(&opened);
            return Ok(false);
        }
        binding.interfaces.insert(interface, kind);
        binding.state = SessionState::Active;
        Ok(true)
    }

    /// Unbind an interface, releasing the channels nothing else provides.
    /// Returns true if that was the last interface. Interfaces that were
    /// never bound leave the session untouched.
    pub fn unbind(&self, interface: u8) -> bool {
        let (kind, still_served, last) = {
            let mut binding = lock(&self.binding);
            let Some(kind) = binding.interfaces.remove(&interface) else {
                return false;
            };
            let still_served = binding.interfaces.values().any(|&k| k == kind);
            let last = binding.interfaces.is_empty();
            if last {
                binding.state = SessionState::Detached;
            }
            (kind, still_served, last)
        };

        if !still_served {
            if kind == InterfaceKind::Keyboard {
                self.release_held_keys();
            }
            self.close(&self.channels_for(kind));
        }
        last
    }

    /// Mark a session with no bound interface as detached. Used to abandon a
    /// session whose first bind failed.
    pub fn retire_if_unbound(&self) -> bool {
        let mut binding = lock(&self.binding);
        if binding.interfaces.is_empty() {
            binding.state = SessionState::Detached;
            true
        } else {
            false
        }
    }

    fn open_channel(&self, kind: ChannelKind, backend: &dyn InputBackend) -> Result<bool, CoreError> {
        // the pen spec depends on the mapping; hold it until the channel is in place
        let mapping = lock(&self.mapping);
        let mut slot = lock(self.slot(kind));
        if slot.is_some() {
            return Ok(false);
        }
        let spec = self.channel_spec(kind, &mapping.derived);
        *slot = Some(register(backend, &spec)?);
        log::info!("{}: {} channel \"{}\" registered", self.device, kind, spec.name);
        Ok(true)
    }

    fn close(&self, channels: &[ChannelKind]) {
        for &kind in channels {
            if lock(self.slot(kind)).take().is_some() {
                log::info!("{}: {} channel released", self.device, kind);
            }
        }
    }

    fn release_held_keys(&self) {
        let mut tracker = lock(&self.tracker);
        let released = tracker.release_all();
        for kind in [ChannelKind::Buttons, ChannelKind::Pad] {
            let changes: Vec<KeyChange> = released
                .changes
                .iter()
                .copied()
                .filter(|c| channel_for_group(c.group) == kind)
                .collect();
            if changes.is_empty() {
                continue;
            }
            let mut slot = lock(self.slot(kind));
            if let Some(channel) = slot.as_mut() {
                let transitions = Transitions {
                    modifier: false,
                    changes,
                };
                if let Err(e) = self.write_keys(channel.as_mut(), &transitions) {
                    log::warn!("{}: failed to release {} keys: {}", self.device, kind, e);
                }
            }
        }
    }

    pub fn channel_spec(&self, kind: ChannelKind, derived: &DerivedMapping) -> ChannelSpec {
        let model = self.model;
        let modifier = model.modifier_key.into_iter();
        let (suffix, axes, keys) = match kind {
            ChannelKind::Pen => {
                let mut axes: Vec<AxisRange> = derived
                    .axis_ranges()
                    .iter()
                    .map(|&(axis, min, max)| AxisRange {
                        axis,
                        min,
                        max,
                        resolution: POSITION_RESOLUTION,
                    })
                    .collect();
                axes.push(AxisRange {
                    axis: Axis::Pressure,
                    min: 0,
                    max: model.pressure_max,
                    resolution: 0,
                });
                let keys = vec![BTN_TOUCH, BTN_STYLUS, BTN_STYLUS2];
                ("Pen", axes, keys)
            }
            ChannelKind::Buttons => {
                let wheel: &[u16] = if model.flags.has_wheel {
                    &WHEEL_KEY_MAP[..]
                } else {
                    &[]
                };
                let mut keys: Vec<u16> = modifier
                    .chain(model.key_map().iter().copied())
                    .chain(wheel.iter().copied())
                    .filter(|&k| k != 0)
                    .collect();
                keys.sort_unstable();
                keys.dedup();
                ("Keyboard", Vec::new(), keys)
            }
            ChannelKind::Pad => {
                let mut keys: Vec<u16> = modifier.chain(PAD_KEY_MAP).collect();
                keys.sort_unstable();
                keys.dedup();
                ("Pad", Vec::new(), keys)
            }
        };
        ChannelSpec {
            kind,
            name: format!("{} {}", model.name, suffix),
            vendor_id: model.vendor_id,
            product_id: model.product_id,
            axes,
            keys,
            autorepeat: (kind != ChannelKind::Pen).then_some(KEY_AUTOREPEAT),
        }
    }

    /// Decode one report and emit what it carries.
    pub fn handle_report(&self, interface: InterfaceId, tag: u8, data: &[u8]) -> Result<(), CoreError> {
        if !self.is_bound(interface.interface) {
            return Err(CoreError::NotAttached(interface));
        }

        let count = self.reports.fetch_add(1, Ordering::Relaxed) + 1;
        if count == 1 {
            log::info!("{}: reports flowing", self.device);
        } else if count.is_multiple_of(500) {
            log::debug!("{}: reports handled: {}", self.device, count);
        }

        match classify_and_decode(self.model, tag, data)? {
            DecodedEvent::Pen(sample) => self.emit_pen(sample),
            DecodedEvent::ButtonDelta {
                group,
                pressed,
                bitmap,
            } => self.emit_buttons(group, |t| t.apply_delta(group, pressed, bitmap)),
            DecodedEvent::ButtonSnapshot { held } => {
                self.emit_buttons(ButtonGroup::Main, |t| t.apply_snapshot(ButtonGroup::Main, held))
            }
            DecodedEvent::Unrecognized(tag) => {
                log::debug!("{}: ignoring report {:#04x}", self.device, tag);
                Ok(())
            }
        }
    }

    fn emit_pen(&self, sample: PenSample) -> Result<(), CoreError> {
        let mapping = lock(&self.mapping);
        let mut slot = lock(&self.pen);
        let channel = slot
            .as_mut()
            .ok_or(CoreError::ChannelUnavailable(ChannelKind::Pen))?;

        let position = mapping.derived.map_point(sample.x, sample.y);
        let pressure = map_pressure(
            i32::from(sample.pressure),
            self.model.pressure_max,
            &mapping.config.pressure_curve,
        );
        write_pen(channel.as_mut(), position, pressure, &sample).map_err(|source| CoreError::Emit {
            kind: ChannelKind::Pen,
            source,
        })
    }

    fn emit_buttons(
        &self,
        group: ButtonGroup,
        apply: impl FnOnce(&mut ButtonStateTracker) -> Transitions,
    ) -> Result<(), CoreError> {
        let kind = channel_for_group(group);
        let mut tracker = lock(&self.tracker);
        let mut slot = lock(self.slot(kind));
        // checked before the tracker moves so a missing channel loses nothing
        let channel = slot.as_mut().ok_or(CoreError::ChannelUnavailable(kind))?;

        let transitions = apply(&mut *tracker);
        self.write_keys(channel.as_mut(), &transitions)
            .map_err(|source| CoreError::Emit { kind, source })
    }

    fn write_keys(
        &self,
        channel: &mut dyn InputChannel,
        transitions: &Transitions,
    ) -> Result<(), BackendError> {
        if let Some(modifier) = self.model.modifier_key {
            channel.emit_key(modifier, transitions.modifier)?;
        }
        for change in &transitions.changes {
            if let Some(key) = self.key_for(change.group, change.bit) {
                channel.emit_key(key, change.pressed)?;
            }
        }
        channel.emit_sync()
    }

    fn key_for(&self, group: ButtonGroup, bit: u8) -> Option<u16> {
        let table: &[u16] = match group {
            ButtonGroup::Main => self.model.key_map(),
            ButtonGroup::Wheel => &WHEEL_KEY_MAP,
            ButtonGroup::Pad => &PAD_KEY_MAP,
        };
        table.get(usize::from(bit)).copied().filter(|&k| k != 0)
    }

    /// Apply a newer configuration snapshot.
    ///
    /// Snapshots not newer than the one already applied are ignored. If the
    /// pen axis ranges move, the pen channel is registered again with the
    /// new ranges; returns true in that case. The snapshot is only committed
    /// once the replacement channel exists, so a failed registration leaves
    /// the previous mapping and channel in place and the same snapshot can be
    /// applied again later.
    pub fn reconfigure(
        &self,
        config: &Arc<Configuration>,
        backend: &dyn InputBackend,
    ) -> Result<bool, CoreError> {
        let mut mapping = lock(&self.mapping);
        if config.version <= mapping.config.version {
            return Ok(false);
        }
        let derived = derive(self.model, config);
        let ranges_changed = derived.axis_ranges() != mapping.derived.axis_ranges();

        let mut slot = lock(&self.pen);
        let replacement = if ranges_changed && slot.is_some() {
            let spec = self.channel_spec(ChannelKind::Pen, &derived);
            Some(register(backend, &spec)?)
        } else {
            None
        };

        mapping.config = Arc::clone(config);
        mapping.derived = derived;
        log::debug!(
            "{}: applied configuration v{} ({:?})",
            self.device,
            config.version,
            derived.rect
        );

        let Some(channel) = replacement else {
            return Ok(false);
        };
        *slot = Some(channel);
        log::info!("{}: pen channel re-registered with new axis ranges", self.device);
        Ok(true)
    }
}

fn derive(model: &ModelDescriptor, config: &Configuration) -> DerivedMapping {
    compute_derived_mapping(
        model.bounds(),
        config.screen_region,
        config.screen_size,
        config.orientation,
    )
}

fn channel_for_group(group: ButtonGroup) -> ChannelKind {
    match group {
        ButtonGroup::Main | ButtonGroup::Wheel => ChannelKind::Buttons,
        ButtonGroup::Pad => ChannelKind::Pad,
    }
}

fn register(backend: &dyn InputBackend, spec: &ChannelSpec) -> Result<Box<dyn InputChannel>, CoreError> {
    backend.register(spec).map_err(|source| match source {
        BackendError::OutOfResources => CoreError::AllocationFailure(spec.kind),
        source => CoreError::RegistrationFailure {
            kind: spec.kind,
            source,
        },
    })
}

fn write_pen(
    channel: &mut dyn InputChannel,
    position: [(Axis, i32); 2],
    pressure: i32,
    sample: &PenSample,
) -> Result<(), BackendError> {
    for (axis, value) in position {
        channel.emit_absolute(axis, value)?;
    }
    channel.emit_absolute(Axis::Pressure, pressure)?;
    channel.emit_key(BTN_TOUCH, sample.touch)?;
    channel.emit_key(BTN_STYLUS, sample.stylus1)?;
    channel.emit_key(BTN_STYLUS2, sample.stylus2)?;
    channel.emit_sync()
}
