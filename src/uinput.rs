//! uinput output backend: one virtual evdev device per channel.

use evdevil::event::{Abs, EventType, InputEvent, Key, Misc};
use evdevil::uinput::{AbsSetup, UinputDevice};
use evdevil::{AbsInfo, Bus, InputId, InputProp, KeyRepeat};

use crate::error::BackendError;
use crate::event::{Axis, ChannelKind, EV_ABS, EV_KEY, EV_SYN, SYN_REPORT};
use crate::output::{ChannelSpec, InputBackend, InputChannel};

const BUS_USB: u16 = 0x03;

#[derive(Debug, Default)]
pub struct UinputBackend;

struct UinputChannel {
    device: UinputDevice,
    batch: Vec<InputEvent>,
}

fn create_device(spec: &ChannelSpec) -> Result<UinputDevice, BackendError> {
    let axes: Vec<AbsSetup> = spec
        .axes
        .iter()
        .map(|a| {
            let info = AbsInfo::new(a.min, a.max);
            let info = if a.resolution > 0 {
                info.with_resolution(a.resolution)
            } else {
                info
            };
            AbsSetup::new(Abs::from_raw(a.axis.code()), info)
        })
        .collect();

    let mut builder = UinputDevice::builder()?.with_input_id(InputId::new(
        Bus::from_raw(BUS_USB),
        spec.vendor_id,
        spec.product_id,
        0,
    ))?;
    if spec.kind == ChannelKind::Pen {
        builder = builder.with_props([InputProp::DIRECT])?;
    }
    if !axes.is_empty() {
        builder = builder.with_abs_axes(axes)?;
    }
    if spec.autorepeat.is_some() {
        builder = builder.with_misc([Misc::SCAN])?.with_key_repeat()?;
    }
    let device = builder
        .with_keys(spec.keys.iter().map(|&k| Key::from_raw(k)))?
        .build(&spec.name)?;

    if let Some(repeat) = spec.autorepeat {
        device
            .writer()
            .set_key_repeat(KeyRepeat::new(repeat.delay, repeat.period))?
            .finish()?;
    }

    Ok(device)
}

impl InputBackend for UinputBackend {
    fn register(&self, spec: &ChannelSpec) -> Result<Box<dyn InputChannel>, BackendError> {
        log::info!("Creating {} uinput device \"{}\"", spec.kind, spec.name);
        let device = create_device(spec)?;

        if let Ok(name) = device.sysname() {
            log::info!(
                "{} device ready: /sys/devices/virtual/input/{}",
                spec.name,
                name.to_string_lossy()
            );
        }

        Ok(Box::new(UinputChannel {
            device,
            batch: Vec::with_capacity(16),
        }))
    }
}

impl InputChannel for UinputChannel {
    fn emit_absolute(&mut self, axis: Axis, value: i32) -> Result<(), BackendError> {
        self.batch
            .push(InputEvent::new(EventType::from_raw(EV_ABS), axis.code(), value));
        Ok(())
    }

    fn emit_key(&mut self, key: u16, pressed: bool) -> Result<(), BackendError> {
        self.batch
            .push(InputEvent::new(EventType::from_raw(EV_KEY), key, i32::from(pressed)));
        Ok(())
    }

    fn emit_sync(&mut self) -> Result<(), BackendError> {
        self.batch
            .push(InputEvent::new(EventType::from_raw(EV_SYN), SYN_REPORT, 0));
        let result = self.device.write(&self.batch);
        self.batch.clear();
        result?;
        Ok(())
    }
}
