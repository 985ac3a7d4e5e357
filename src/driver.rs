//! Transport and configuration boundary of the core.
//!
//! The transport calls [`Driver::on_attach`] once per USB interface,
//! [`Driver::on_raw_report`] per inbound report and [`Driver::on_detach`] when
//! an interface goes away. Reports from one physical device arrive one at a
//! time; different devices may be driven from different threads.

use std::sync::Arc;

use crate::config::{validate_rect, ConfigStore, Configuration};
use crate::device::{self, InterfaceId, ModelDescriptor, UsbDeviceId};
use crate::error::{ConfigError, CoreError};
use crate::handshake::{self, CommandScheduler};
use crate::mapping::{PressureCurve, Rect};
use crate::orientation::Orientation;
use crate::output::InputBackend;
use crate::registry::DeviceRegistry;
use crate::report::{identify_interface, InterfaceKind};
use crate::session::{DeviceSession, SessionState};

/// What an attach bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    pub interface: InterfaceId,
    pub kind: InterfaceKind,
    pub model: &'static ModelDescriptor,
    /// True if this interface created the session rather than joining a
    /// sibling's.
    pub created: bool,
}

impl SessionHandle {
    pub fn device(&self) -> UsbDeviceId {
        self.interface.device
    }
}

pub struct Driver {
    registry: DeviceRegistry,
    config: ConfigStore,
    backend: Arc<dyn InputBackend>,
    scheduler: Arc<dyn CommandScheduler>,
}

impl Driver {
    pub fn new(
        config: Configuration,
        backend: Arc<dyn InputBackend>,
        scheduler: Arc<dyn CommandScheduler>,
    ) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            config: ConfigStore::new(config),
            backend,
            scheduler,
        }
    }

    pub fn configuration(&self) -> Arc<Configuration> {
        self.config.snapshot()
    }

    pub fn session(&self, device: UsbDeviceId) -> Option<Arc<DeviceSession>> {
        self.registry.get(device)
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Attach one interface of a device.
    ///
    /// Returns `Ok(None)` for the vendor handshake interface, which carries
    /// no input. Devices outside the model table yield `UnknownDevice`.
    pub fn on_attach(
        &self,
        interface: InterfaceId,
        vendor_id: u16,
        product_id: u16,
        report_descriptor: &[u8],
    ) -> Result<Option<SessionHandle>, CoreError> {
        let unknown = CoreError::UnknownDevice {
            vendor: vendor_id,
            product: product_id,
        };
        let Some(model) = device::lookup(vendor_id, product_id) else {
            log::debug!("{}: not a supported tablet ({:04x}:{:04x})", interface, vendor_id, product_id);
            return Err(unknown);
        };
        let kind = match identify_interface(report_descriptor) {
            Ok(kind) => kind,
            Err(e) => {
                log::warn!("{}: unusable report descriptor: {}", interface, e);
                return Err(unknown);
            }
        };
        if kind == InterfaceKind::Proprietary {
            log::debug!("{}: vendor interface, nothing to register", interface);
            return Ok(None);
        }

        loop {
            let (session, created) = self.registry.get_or_insert_with(interface.device, || {
                DeviceSession::new(interface.device, model, self.config.snapshot())
            });

            match session.bind(interface.interface, kind, self.backend.as_ref()) {
                Ok(true) => {
                    if created {
                        self.scheduler.schedule(interface, handshake::plan(model));
                    }
                    // a setter may have run between the snapshot and the insert
                    if let Err(e) = session.reconfigure(&self.config.snapshot(), self.backend.as_ref()) {
                        log::warn!("{}: {}", interface, e);
                    }
                    log::info!(
                        "{}: {} attached as {:?} interface{}",
                        interface,
                        model.name,
                        kind,
                        if created { "" } else { " (joined sibling)" }
                    );
                    return Ok(Some(SessionHandle {
                        interface,
                        kind,
                        model,
                        created,
                    }));
                }
                // lost a race with the sibling's detach; start over
                Ok(false) => continue,
                Err(e) => {
                    if session.retire_if_unbound() {
                        self.registry.remove_if_same(&session);
                    }
                    log::warn!("{}: attach failed: {}", interface, e);
                    return Err(e);
                }
            }
        }
    }

    /// Handle one inbound report. Errors concern this report only.
    pub fn on_raw_report(&self, interface: InterfaceId, tag: u8, data: &[u8]) -> Result<(), CoreError> {
        let session = self
            .registry
            .get(interface.device)
            .ok_or(CoreError::NotAttached(interface))?;
        let result = session.handle_report(interface, tag, data);
        if let Err(ref e) = result {
            log::warn!("{}: dropped report {:#04x}: {}", interface, tag, e);
        }
        result
    }

    pub fn on_detach(&self, interface: InterfaceId) {
        let Some(session) = self.registry.get(interface.device) else {
            log::debug!("{}: detach without session", interface);
            return;
        };
        if session.unbind(interface.interface) && session.state() == SessionState::Detached {
            self.registry.remove_if_same(&session);
            log::info!("{}: {} detached", interface.device, session.model().name);
        }
    }

    pub fn set_screen_region(&self, rect: Rect) -> Result<(), ConfigError> {
        validate_rect("screen_map", &rect)?;
        self.publish(|c| c.screen_region = rect);
        Ok(())
    }

    pub fn set_screen_size(&self, rect: Rect) -> Result<(), ConfigError> {
        validate_rect("screen_size", &rect)?;
        self.publish(|c| c.screen_size = rect);
        Ok(())
    }

    pub fn set_orientation(&self, orientation: Orientation) -> Result<(), ConfigError> {
        self.publish(|c| c.orientation = orientation);
        Ok(())
    }

    /// Numeric form of the orientation parameter, `0..=3`.
    pub fn set_orientation_raw(&self, value: u32) -> Result<(), ConfigError> {
        self.set_orientation(Orientation::from_raw(value)?)
    }

    pub fn set_pressure_curve(&self, a0: i16, a1: i16, a2: i16, a3: i16) -> Result<(), ConfigError> {
        let curve = PressureCurve::new(a0, a1, a2, a3);
        self.publish(|c| c.pressure_curve = curve);
        Ok(())
    }

    fn publish(&self, change: impl FnOnce(&mut Configuration)) {
        let snapshot = self.config.update(change);
        log::info!(
            "Configuration v{}: orientation={} screen_map={:?} screen_size={:?} pressure={:?}",
            snapshot.version,
            snapshot.orientation,
            snapshot.screen_region,
            snapshot.screen_size,
            snapshot.pressure_curve
        );
        for session in self.registry.sessions() {
            if let Err(e) = session.reconfigure(&snapshot, self.backend.as_ref()) {
                log::warn!("{}: failed to apply configuration: {}", session.device(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{A15, A30, A50, S640, VEIKK_VENDOR_ID};
    use crate::event::{Axis, ChannelKind, BTN_0, KEY_F5, KEY_LEFTCTRL};
    use crate::handshake::testing::RecordingScheduler;
    use crate::output::testing::{Recorded, RecordingBackend};
    use crate::report::{BUTTON_REPORT, KEYBOARD_REPORT, PEN_REPORT};

    const PEN_RDESC: &[u8] = &[0x05, 0x0d, 0x09, 0x02, 0xa1, 0x01];
    const KBD_RDESC: &[u8] = &[0x05, 0x01, 0x09, 0x06, 0xa1, 0x01];
    const VENDOR_RDESC: &[u8] = &[0x06, 0x0a, 0xff, 0x09, 0x01];

    struct Harness {
        driver: Driver,
        backend: RecordingBackend,
        scheduler: RecordingScheduler,
    }

    fn harness() -> Harness {
        let backend = RecordingBackend::new();
        let scheduler = RecordingScheduler::default();
        let driver = Driver::new(
            Configuration::default(),
            Arc::new(backend.clone()),
            Arc::new(scheduler.clone()),
        );
        Harness {
            driver,
            backend,
            scheduler,
        }
    }

    fn pen_if() -> InterfaceId {
        InterfaceId::new(1, 9, 0)
    }

    fn kbd_if() -> InterfaceId {
        InterfaceId::new(1, 9, 1)
    }

    fn pen_report(x: u16, y: u16, p: u16) -> Vec<u8> {
        let mut v = vec![0x01];
        v.extend_from_slice(&x.to_le_bytes());
        v.extend_from_slice(&y.to_le_bytes());
        v.extend_from_slice(&p.to_le_bytes());
        v
    }

    fn attach(h: &Harness, interface: InterfaceId, rdesc: &[u8]) -> SessionHandle {
        attach_model(h, &A15, interface, rdesc)
    }

    fn attach_model(
        h: &Harness,
        model: &'static ModelDescriptor,
        interface: InterfaceId,
        rdesc: &[u8],
    ) -> SessionHandle {
        h.driver
            .on_attach(interface, VEIKK_VENDOR_ID, model.product_id, rdesc)
            .unwrap()
            .unwrap()
    }

    /// Sends one pen report and one button press/release through each
    /// interface and checks they land on the shared channels.
    fn check_merged(h: &Harness, press: (u8, &[u8]), release: (u8, &[u8]), key: u16) {
        assert_eq!(h.driver.session_count(), 1);
        let session = h.driver.session(pen_if().device).unwrap();
        assert!(session.has_channel(ChannelKind::Pen));
        assert!(session.has_channel(ChannelKind::Buttons));

        for (n, interface) in [pen_if(), kbd_if()].into_iter().enumerate() {
            let x = 5 + n as u16;
            h.driver.on_raw_report(interface, PEN_REPORT, &pen_report(x, 6, 0)).unwrap();
            h.driver.on_raw_report(interface, press.0, press.1).unwrap();
            h.driver.on_raw_report(interface, release.0, release.1).unwrap();
        }

        let pen = h.backend.events(ChannelKind::Pen);
        assert_eq!(pen.len(), 14);
        assert_eq!(pen[0], Recorded::Abs(Axis::X, 5));
        assert_eq!(pen[7], Recorded::Abs(Axis::X, 6));

        let buttons = h.backend.events(ChannelKind::Buttons);
        let presses = buttons.iter().filter(|&e| *e == Recorded::Key(key, true)).count();
        let releases = buttons.iter().filter(|&e| *e == Recorded::Key(key, false)).count();
        assert_eq!((presses, releases), (2, 2));
        // only one channel of each kind was ever created
        assert_eq!(h.backend.registered().len(), 2);
    }

    fn check_merged_bitmap(h: &Harness) {
        check_merged(
            h,
            (BUTTON_REPORT, &[1, 0x01, 0x00][..]),
            (BUTTON_REPORT, &[0, 0x01, 0x00][..]),
            KEY_F5,
        );
        assert_eq!(
            h.backend.events(ChannelKind::Buttons)[..3],
            [
                Recorded::Key(KEY_LEFTCTRL, true),
                Recorded::Key(KEY_F5, true),
                Recorded::Sync
            ]
        );
    }

    fn check_merged_scan_code(h: &Harness) {
        check_merged(
            h,
            (KEYBOARD_REPORT, &[0, 0x3e, 0, 0, 0, 0, 0][..]),
            (KEYBOARD_REPORT, &[0; 7][..]),
            BTN_0,
        );
        assert_eq!(
            h.backend.events(ChannelKind::Buttons)[..2],
            [Recorded::Key(BTN_0, true), Recorded::Sync]
        );
    }

    #[test]
    fn test_sibling_merge_pen_first() {
        let h = harness();
        assert!(attach(&h, pen_if(), PEN_RDESC).created);
        let second = attach(&h, kbd_if(), KBD_RDESC);
        assert!(!second.created);
        assert_eq!(second.kind, InterfaceKind::Keyboard);
        check_merged_bitmap(&h);
    }

    #[test]
    fn test_sibling_merge_keyboard_first() {
        let h = harness();
        assert!(attach(&h, kbd_if(), KBD_RDESC).created);
        assert!(!attach(&h, pen_if(), PEN_RDESC).created);
        check_merged_bitmap(&h);
    }

    #[test]
    fn test_sibling_merge_scan_code_model() {
        let h = harness();
        assert!(attach_model(&h, &A50, pen_if(), PEN_RDESC).created);
        assert!(!attach_model(&h, &A50, kbd_if(), KBD_RDESC).created);
        check_merged_scan_code(&h);

        let h = harness();
        assert!(attach_model(&h, &A50, kbd_if(), KBD_RDESC).created);
        assert!(!attach_model(&h, &A50, pen_if(), PEN_RDESC).created);
        check_merged_scan_code(&h);
    }

    #[test]
    fn test_handshake_scheduled_once_per_device() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        attach(&h, kbd_if(), KBD_RDESC);
        let scheduled = h.scheduler.scheduled.lock().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, pen_if());
        assert_eq!(scheduled[0].1, handshake::plan(&A15));
    }

    #[test]
    fn test_unknown_device() {
        let h = harness();
        let err = h
            .driver
            .on_attach(pen_if(), 0x056a, 0x0001, PEN_RDESC)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownDevice { vendor: 0x056a, .. }));
        assert!(!err.is_fatal());
        assert!(h.backend.registered().is_empty());

        // descriptor too short to classify
        assert!(matches!(
            h.driver.on_attach(pen_if(), VEIKK_VENDOR_ID, S640.product_id, &[0x05]),
            Err(CoreError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn test_vendor_interface_ignored() {
        let h = harness();
        let handle = h
            .driver
            .on_attach(InterfaceId::new(1, 9, 2), VEIKK_VENDOR_ID, A30.product_id, VENDOR_RDESC)
            .unwrap();
        assert!(handle.is_none());
        assert_eq!(h.driver.session_count(), 0);
        assert!(h.backend.registered().is_empty());
        assert!(h.scheduler.scheduled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_registration_failure_rolls_back() {
        let h = harness();
        h.backend.reject(Some(ChannelKind::Pen));
        let err = h
            .driver
            .on_attach(pen_if(), VEIKK_VENDOR_ID, S640.product_id, PEN_RDESC)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(h.driver.session_count(), 0);
        assert!(h.scheduler.scheduled.lock().unwrap().is_empty());

        // a later attempt starts clean
        h.backend.reject(None);
        h.driver
            .on_attach(pen_if(), VEIKK_VENDOR_ID, S640.product_id, PEN_RDESC)
            .unwrap();
        assert_eq!(h.driver.session_count(), 1);
    }

    #[test]
    fn test_bad_length_report_is_dropped() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        let err = h
            .driver
            .on_raw_report(pen_if(), PEN_REPORT, &[0x01, 0, 0, 0, 0, 0])
            .unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
        assert!(h.backend.events(ChannelKind::Pen).is_empty());
        assert_eq!(
            h.driver.session(pen_if().device).unwrap().state(),
            SessionState::Active
        );
    }

    #[test]
    fn test_report_without_session() {
        let h = harness();
        assert!(matches!(
            h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(0, 0, 0)),
            Err(CoreError::NotAttached(_))
        ));
    }

    #[test]
    fn test_detach_last_interface_removes_session() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        attach(&h, kbd_if(), KBD_RDESC);
        let session = h.driver.session(pen_if().device).unwrap();

        h.driver.on_detach(kbd_if());
        assert_eq!(h.driver.session_count(), 1);
        h.driver.on_detach(pen_if());
        assert_eq!(h.driver.session_count(), 0);
        assert_eq!(session.state(), SessionState::Detached);
        assert!(matches!(
            h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(0, 0, 0)),
            Err(CoreError::NotAttached(_))
        ));

        // re-plugging creates a fresh session and handshakes again
        assert!(attach(&h, pen_if(), PEN_RDESC).created);
        assert_eq!(h.scheduler.scheduled.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_detach_of_unbound_interface_during_attach() {
        let h = harness();
        // first half of an attach: the session is in the registry, not bound yet
        let (session, created) = h.driver.registry.get_or_insert_with(pen_if().device, || {
            DeviceSession::new(pen_if().device, &A15, h.driver.configuration())
        });
        assert!(created);

        // the vendor interface of the same device goes away meanwhile
        h.driver.on_detach(InterfaceId::new(1, 9, 2));
        assert_eq!(h.driver.session_count(), 1);
        assert_eq!(session.state(), SessionState::Attaching);

        assert!(session.bind(pen_if().interface, InterfaceKind::Pen, &h.backend).unwrap());
        h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(1, 2, 0)).unwrap();
        assert_eq!(h.backend.events(ChannelKind::Pen).len(), 7);

        h.driver.on_detach(pen_if());
        assert_eq!(h.driver.session_count(), 0);
        assert_eq!(h.backend.dropped(), vec![(ChannelKind::Pen, 1)]);
    }

    #[test]
    fn test_rejected_orientation_change_retries_on_next_update() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        let session = h.driver.session(pen_if().device).unwrap();

        h.backend.reject(Some(ChannelKind::Pen));
        h.driver.set_orientation(Orientation::Rotate180).unwrap();
        assert_eq!(h.driver.configuration().version, 1);
        assert_eq!(session.config_version(), 0);
        h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(100, 200, 0)).unwrap();
        assert_eq!(h.backend.events(ChannelKind::Pen)[0], Recorded::Abs(Axis::X, 100));

        h.backend.reject(None);
        h.backend.clear_events();
        h.driver.set_orientation(Orientation::Rotate180).unwrap();
        assert_eq!(session.config_version(), 2);
        h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(100, 200, 0)).unwrap();
        assert_eq!(h.backend.events(ChannelKind::Pen)[0], Recorded::Abs(Axis::X, -100));
    }

    #[test]
    fn test_orientation_change_reregisters_pen() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        attach(&h, kbd_if(), KBD_RDESC);
        let registrations = h.backend.registered().len();

        h.driver.set_orientation_raw(3).unwrap();
        let registered = h.backend.registered();
        assert_eq!(registered.len(), registrations + 1);
        let pen = registered.last().unwrap();
        assert_eq!(pen.kind, ChannelKind::Pen);
        // rotated 90°: raw X now drives the Y axis
        let y = pen.axis(Axis::Y).unwrap();
        assert_eq!((y.min, y.max), (0, 32768));

        h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(100, 200, 0)).unwrap();
        let events = h.backend.events(ChannelKind::Pen);
        assert_eq!(events[0], Recorded::Abs(Axis::Y, 100));
        assert_eq!(events[1], Recorded::Abs(Axis::X, -200));
    }

    #[test]
    fn test_setter_validation() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        assert_eq!(
            h.driver.set_orientation_raw(4),
            Err(ConfigError::OrientationOutOfRange(4))
        );
        assert!(matches!(
            h.driver.set_screen_region(Rect::new(0, 0, 0, 100)),
            Err(ConfigError::DegenerateRect { .. })
        ));
        assert_eq!(h.driver.configuration().version, 0);
        assert_eq!(h.backend.registered().len(), 1);
    }

    #[test]
    fn test_screen_region_applies_to_sessions() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        h.driver.set_screen_size(Rect::new(0, 0, 3840, 1080)).unwrap();
        // size alone has no region yet: still the identity mapping
        assert_eq!(h.backend.registered().len(), 1);

        h.driver.set_screen_region(Rect::new(1920, 0, 1920, 1080)).unwrap();
        let session = h.driver.session(pen_if().device).unwrap();
        assert_eq!(session.config_version(), 2);
        let rect = session.mapping().rect;
        assert_eq!((rect.x, rect.width), (-32768, 65536));
        assert_eq!(h.backend.registered().len(), 2);
    }

    #[test]
    fn test_pressure_curve_setter() {
        let h = harness();
        attach(&h, pen_if(), PEN_RDESC);
        h.driver.set_pressure_curve(0, 0, 100, 0).unwrap();
        h.driver.on_raw_report(pen_if(), PEN_REPORT, &pen_report(0, 0, 4096)).unwrap();
        // p^2 / pmax at half pressure is a quarter of the range
        assert_eq!(
            h.backend.events(ChannelKind::Pen)[2],
            Recorded::Abs(Axis::Pressure, 2048)
        );
    }
}
