//! VEIKK model table.
//!
//! Digitizer ranges are the values the tablets report in their HID
//! descriptors. Button tables index the 13 pseudo-usage slots
//! (see `report::USAGE_SLOT_MAP`); a zero entry leaves the slot unmapped.

use super::{ModelDescriptor, ModelFlags, ProtocolVariant, NO_BUTTONS, VEIKK_VENDOR_ID};
use crate::event::{
    BTN_0, BTN_1, BTN_2, BTN_3, BTN_4, BTN_5, BTN_6, BTN_7, BTN_WHEEL, KEY_0, KEY_1, KEY_2,
    KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8, KEY_9, KEY_DOWN, KEY_LEFT, KEY_LEFTCTRL,
    KEY_RIGHT, KEY_SPACE, KEY_UP,
};

const PEN_ONLY: ModelFlags = ModelFlags {
    has_buttons: false,
    has_wheel: false,
    has_gesture_pad: false,
};

pub static S640: ModelDescriptor = ModelDescriptor {
    name: "VEIKK S640",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x0001,
    x_max: 32768,
    y_max: 32768,
    pressure_max: 8192,
    button_count: 0,
    button_map: NO_BUTTONS,
    flags: PEN_ONLY,
    protocol: ProtocolVariant::Bitmap,
    modifier_key: None,
};

/// Four buttons and a gesture pad; no dedicated key table yet.
pub static A30: ModelDescriptor = ModelDescriptor {
    name: "VEIKK A30",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x0002,
    x_max: 32768,
    y_max: 32768,
    pressure_max: 8192,
    button_count: 4,
    button_map: NO_BUTTONS,
    flags: ModelFlags {
        has_buttons: true,
        has_wheel: false,
        has_gesture_pad: true,
    },
    protocol: ProtocolVariant::Bitmap,
    modifier_key: Some(KEY_LEFTCTRL),
};

pub static A50: ModelDescriptor = ModelDescriptor {
    name: "VEIKK A50",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x0003,
    x_max: 32768,
    y_max: 32768,
    pressure_max: 8192,
    button_count: 8,
    button_map: [
        BTN_0, BTN_1, BTN_2, BTN_3, BTN_4, BTN_5, BTN_6, BTN_7, 0, KEY_DOWN, KEY_UP, KEY_LEFT,
        KEY_RIGHT,
    ],
    flags: ModelFlags {
        has_buttons: true,
        has_wheel: false,
        has_gesture_pad: false,
    },
    protocol: ProtocolVariant::ScanCode,
    modifier_key: None,
};

/// Twelve buttons and a scroll wheel.
pub static A15: ModelDescriptor = ModelDescriptor {
    name: "VEIKK A15",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x0004,
    x_max: 32768,
    y_max: 32768,
    pressure_max: 8192,
    button_count: 12,
    button_map: NO_BUTTONS,
    flags: ModelFlags {
        has_buttons: true,
        has_wheel: true,
        has_gesture_pad: false,
    },
    protocol: ProtocolVariant::Bitmap,
    modifier_key: Some(KEY_LEFTCTRL),
};

pub static VK640: ModelDescriptor = ModelDescriptor {
    name: "VEIKK VK640",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x0005,
    x_max: 32768,
    y_max: 32768,
    pressure_max: 8192,
    button_count: 0,
    button_map: NO_BUTTONS,
    flags: PEN_ONLY,
    protocol: ProtocolVariant::Bitmap,
    modifier_key: None,
};

/// Wheel turns and presses arrive as scan codes (slots 2, 9, 10).
pub static A15_PRO: ModelDescriptor = ModelDescriptor {
    name: "VEIKK A15 Pro",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x0006,
    x_max: 32768,
    y_max: 32768,
    pressure_max: 8192,
    button_count: 13,
    button_map: [
        KEY_0, KEY_1, KEY_SPACE, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_DOWN, KEY_UP,
        KEY_8, KEY_9,
    ],
    flags: ModelFlags {
        has_buttons: true,
        has_wheel: false,
        has_gesture_pad: false,
    },
    protocol: ProtocolVariant::ScanCode,
    modifier_key: None,
};

pub static VK1560: ModelDescriptor = ModelDescriptor {
    name: "VEIKK VK1560",
    vendor_id: VEIKK_VENDOR_ID,
    product_id: 0x1001,
    x_max: 27536,
    y_max: 15488,
    pressure_max: 8192,
    button_count: 12,
    button_map: [
        BTN_0, BTN_1, BTN_2, 0, BTN_3, BTN_4, BTN_5, BTN_6, BTN_WHEEL, KEY_DOWN, KEY_UP,
        KEY_LEFT, KEY_RIGHT,
    ],
    flags: ModelFlags {
        has_buttons: true,
        has_wheel: false,
        has_gesture_pad: false,
    },
    protocol: ProtocolVariant::ScanCode,
    modifier_key: None,
};

pub static MODELS: [&ModelDescriptor; 7] = [&S640, &A30, &A50, &A15, &VK640, &A15_PRO, &VK1560];
