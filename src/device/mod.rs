mod models;

use std::fmt;
use std::str::FromStr;

pub use models::{A15, A15_PRO, A30, A50, MODELS, S640, VK1560, VK640};

use crate::event::{
    KEY_C, KEY_DOWN, KEY_ENTER, KEY_EQUAL, KEY_F5, KEY_I, KEY_LEFT, KEY_LEFTBRACE, KEY_MINUS,
    KEY_RIGHT, KEY_RIGHTBRACE, KEY_S, KEY_SPACE, KEY_UP, KEY_V, KEY_Z, BTN_WHEEL,
};

pub const VEIKK_VENDOR_ID: u16 = 0x2feb;

/// Number of canonical button slots a scan-code report can address.
pub const BUTTON_SLOTS: usize = 13;

/// All-zero key table: the model has no dedicated mapping.
pub const NO_BUTTONS: [u16; BUTTON_SLOTS] = [0; BUTTON_SLOTS];

/// Fallback key table used when a model with buttons carries [`NO_BUTTONS`].
/// Slot 5 is the Ctrl+V chord, reported as plain V next to the modifier.
pub const DEFAULT_KEY_MAP: [u16; BUTTON_SLOTS] = [
    KEY_F5,
    KEY_I,
    KEY_SPACE,
    KEY_V,
    KEY_C,
    KEY_V,
    KEY_Z,
    KEY_S,
    KEY_ENTER,
    KEY_MINUS,
    KEY_EQUAL,
    KEY_LEFTBRACE,
    KEY_RIGHTBRACE,
];

/// Wheel bitmap positions: clockwise, counter-clockwise, centre press.
pub const WHEEL_KEY_MAP: [u16; 3] = [KEY_UP, KEY_DOWN, BTN_WHEEL];

/// Gesture pad bitmap positions: swipe up/down/left/right.
pub const PAD_KEY_MAP: [u16; 4] = [KEY_UP, KEY_DOWN, KEY_LEFT, KEY_RIGHT];

/// How a model encodes its buttons on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Press/release flag plus a bitmap of the positions that changed.
    Bitmap,
    /// Keyboard-style report of up to six scan codes ("pseudo-usages").
    ScanCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelFlags {
    pub has_buttons: bool,
    pub has_wheel: bool,
    pub has_gesture_pad: bool,
}

/// Static description of one tablet model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,

    // Raw digitizer ranges
    pub x_max: i32,
    pub y_max: i32,
    pub pressure_max: i32,

    pub button_count: u8,
    pub button_map: [u16; BUTTON_SLOTS],
    pub flags: ModelFlags,
    pub protocol: ProtocolVariant,

    /// Key held down while any tablet button is held, if the model emulates one.
    pub modifier_key: Option<u16>,
}

impl ModelDescriptor {
    /// Key table for the main button group.
    pub fn key_map(&self) -> &[u16; BUTTON_SLOTS] {
        if self.button_map == NO_BUTTONS {
            &DEFAULT_KEY_MAP
        } else {
            &self.button_map
        }
    }

    /// Whether a keyboard interface of this model contributes a buttons channel.
    pub fn has_button_channel(&self) -> bool {
        self.flags.has_buttons || self.flags.has_wheel
    }

    pub fn bounds(&self) -> ModelBounds {
        ModelBounds {
            x_max: self.x_max,
            y_max: self.y_max,
        }
    }
}

/// Raw coordinate domain of a digitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelBounds {
    pub x_max: i32,
    pub y_max: i32,
}

/// Look up a model by its USB ids. A miss means the device is not ours.
pub fn lookup(vendor: u16, product: u16) -> Option<&'static ModelDescriptor> {
    MODELS
        .iter()
        .copied()
        .find(|m| m.vendor_id == vendor && m.product_id == product)
}

/// Every model the driver knows about.
pub fn models() -> impl Iterator<Item = &'static ModelDescriptor> {
    MODELS.iter().copied()
}

/// Identity of the physical USB device; shared by all of its interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsbDeviceId {
    pub bus: u8,
    pub address: u8,
}

/// One HID interface of a physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId {
    pub device: UsbDeviceId,
    pub interface: u8,
}

impl InterfaceId {
    pub fn new(bus: u8, address: u8, interface: u8) -> Self {
        Self {
            device: UsbDeviceId { bus, address },
            interface,
        }
    }
}

impl fmt::Display for UsbDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus, self.address)
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.device, self.interface)
    }
}

impl FromStr for InterfaceId {
    type Err = String;

    /// Parses `bus:address.interface`, e.g. `1:7.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid interface '{}'. Expected bus:address.interface", s);
        let (device, interface) = s.split_once('.').ok_or_else(invalid)?;
        let (bus, address) = device.split_once(':').ok_or_else(invalid)?;
        Ok(Self::new(
            bus.parse().map_err(|_| invalid())?,
            address.parse().map_err(|_| invalid())?,
            interface.parse().map_err(|_| invalid())?,
        ))
    }
}
