//! Linux input event codes emitted by the driver, plus the channel and axis
//! vocabulary used across the output boundary.

use std::fmt;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;
pub const SYN_REPORT: u16 = 0;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_PRESSURE: u16 = 0x18; // 24

pub const KEY_RESERVED: u16 = 0;
pub const KEY_1: u16 = 2;
pub const KEY_2: u16 = 3;
pub const KEY_3: u16 = 4;
pub const KEY_4: u16 = 5;
pub const KEY_5: u16 = 6;
pub const KEY_6: u16 = 7;
pub const KEY_7: u16 = 8;
pub const KEY_8: u16 = 9;
pub const KEY_9: u16 = 10;
pub const KEY_0: u16 = 11;
pub const KEY_MINUS: u16 = 12;
pub const KEY_EQUAL: u16 = 13;
pub const KEY_I: u16 = 23;
pub const KEY_LEFTBRACE: u16 = 26;
pub const KEY_RIGHTBRACE: u16 = 27;
pub const KEY_ENTER: u16 = 28;
pub const KEY_LEFTCTRL: u16 = 29;
pub const KEY_S: u16 = 31;
pub const KEY_Z: u16 = 44;
pub const KEY_C: u16 = 46;
pub const KEY_V: u16 = 47;
pub const KEY_SPACE: u16 = 57;
pub const KEY_F5: u16 = 63;
pub const KEY_UP: u16 = 103;
pub const KEY_LEFT: u16 = 105;
pub const KEY_RIGHT: u16 = 106;
pub const KEY_DOWN: u16 = 108;

pub const BTN_0: u16 = 0x100;
pub const BTN_1: u16 = 0x101;
pub const BTN_2: u16 = 0x102;
pub const BTN_3: u16 = 0x103;
pub const BTN_4: u16 = 0x104;
pub const BTN_5: u16 = 0x105;
pub const BTN_6: u16 = 0x106;
pub const BTN_7: u16 = 0x107;
pub const BTN_8: u16 = 0x108;
pub const BTN_9: u16 = 0x109;
pub const BTN_TOUCH: u16 = 0x14a;
pub const BTN_STYLUS: u16 = 0x14b;
pub const BTN_STYLUS2: u16 = 0x14c;
pub const BTN_WHEEL: u16 = 0x150;

/// Absolute axis of a pen channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Pressure,
}

impl Axis {
    pub fn code(self) -> u16 {
        match self {
            Axis::X => ABS_X,
            Axis::Y => ABS_Y,
            Axis::Pressure => ABS_PRESSURE,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "ABS_X"),
            Axis::Y => write!(f, "ABS_Y"),
            Axis::Pressure => write!(f, "ABS_PRESSURE"),
        }
    }
}

/// One logical input stream of a physical tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Pen,
    Buttons,
    Pad,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Pen => write!(f, "pen"),
            ChannelKind::Buttons => write!(f, "buttons"),
            ChannelKind::Pad => write!(f, "pad"),
        }
    }
}

/// Human-readable name for a key code, for dry-run output and logs.
pub fn key_name(code: u16) -> String {
    let name = match code {
        KEY_0 => "KEY_0",
        KEY_1 => "KEY_1",
        KEY_2 => "KEY_2",
        KEY_3 => "KEY_3",
        KEY_4 => "KEY_4",
        KEY_5 => "KEY_5",
        KEY_6 => "KEY_6",
        KEY_7 => "KEY_7",
        KEY_8 => "KEY_8",
        KEY_9 => "KEY_9",
        KEY_MINUS => "KEY_MINUS",
        KEY_EQUAL => "KEY_EQUAL",
        KEY_I => "KEY_I",
        KEY_LEFTBRACE => "KEY_LEFTBRACE",
        KEY_RIGHTBRACE => "KEY_RIGHTBRACE",
        KEY_ENTER => "KEY_ENTER",
        KEY_LEFTCTRL => "KEY_LEFTCTRL",
        KEY_S => "KEY_S",
        KEY_Z => "KEY_Z",
        KEY_C => "KEY_C",
        KEY_V => "KEY_V",
        KEY_SPACE => "KEY_SPACE",
        KEY_F5 => "KEY_F5",
        KEY_UP => "KEY_UP",
        KEY_LEFT => "KEY_LEFT",
        KEY_RIGHT => "KEY_RIGHT",
        KEY_DOWN => "KEY_DOWN",
        BTN_0..=BTN_9 => return format!("BTN_{}", code - BTN_0),
        BTN_TOUCH => "BTN_TOUCH",
        BTN_STYLUS => "BTN_STYLUS",
        BTN_STYLUS2 => "BTN_STYLUS2",
        BTN_WHEEL => "BTN_WHEEL",
        _ => return format!("KEY/{}", code),
    };
    name.to_string()
}
