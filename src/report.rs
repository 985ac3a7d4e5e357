//! Raw HID report decoding.
//!
//! Report payloads are handed over without their leading report-id byte;
//! the id travels separately as the report tag.
//!
//! | tag  | report      | length | layout                                   |
//! |------|-------------|--------|------------------------------------------|
//! | 0x01 | pen         | 7      | buttons, x (le16), y (le16), pressure (le16) |
//! | 0x02 | stylus      | 7      | same as pen                              |
//! | 0x03 | keyboard    | 7      | ctrl modifier, six scan codes            |
//! | 0x04 | buttons     | 3      | pressed flag, bitmap (le16)              |
//! | 0x05 | wheel       | 2      | pressed flag, bitmap                     |
//! | 0x06 | gesture pad | 2      | pressed flag, bitmap                     |

use thiserror::Error;

use crate::device::{ModelDescriptor, ProtocolVariant, BUTTON_SLOTS};

pub const PEN_REPORT: u8 = 0x01;
pub const STYLUS_REPORT: u8 = 0x02;
pub const KEYBOARD_REPORT: u8 = 0x03;
pub const BUTTON_REPORT: u8 = 0x04;
pub const WHEEL_REPORT: u8 = 0x05;
pub const PAD_REPORT: u8 = 0x06;

pub const PEN_REPORT_LEN: usize = 7;
pub const KEYBOARD_REPORT_LEN: usize = 7;
pub const BUTTON_REPORT_LEN: usize = 3;
pub const WHEEL_REPORT_LEN: usize = 2;
pub const PAD_REPORT_LEN: usize = 2;

const PEN_BTN_TOUCH: u8 = 0x01;
const PEN_BTN_STYLUS: u8 = 0x02;
const PEN_BTN_STYLUS2: u8 = 0x04;

/// Slot of the bare "V" key and of the device-generated "Ctrl+V" chord.
pub const SLOT_V: usize = 3;
pub const SLOT_CTRL_V: usize = 5;

/// Scan code to pseudo-usage slot; `-1` marks codes the tablets never send.
///
/// ```text
///  slot  0   1   2   3   4   5        6   7   8   9   10  11  12
///  code  3e  0c  2c  19  06  19+Ctrl  1d  16  28  2d  2e  2f  30
/// ```
pub const USAGE_SLOT_MAP: [i8; 64] = [
    -1, -1, -1, -1, -1, -1, 4, -1, -1, -1, -1, -1, 1, -1, -1, -1, // 0x00
    -1, -1, -1, -1, -1, -1, 7, -1, -1, 3, -1, -1, -1, 6, -1, -1, // 0x10
    -1, -1, -1, -1, -1, -1, -1, -1, 8, -1, -1, -1, 2, 9, 10, 11, // 0x20
    12, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, 0, -1, // 0x30
];

// Report descriptor signatures
const PROPRIETARY_PREFIX: [u8; 3] = [0x06, 0x0a, 0xff];
const KEYBOARD_USAGE: [u8; 4] = [0x05, 0x01, 0x09, 0x06];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("report {tag:#04x}: expected {expected} bytes, got {actual}")]
    BadLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },

    #[error("unknown scan code {0:#04x}")]
    UnknownUsage(u8),
}

/// Which button group a bitmap report addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonGroup {
    Main,
    Wheel,
    Pad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenSample {
    pub x: u16,
    pub y: u16,
    pub pressure: u16,
    pub touch: bool,
    pub stylus1: bool,
    pub stylus2: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedEvent {
    Pen(PenSample),
    /// Bits of `bitmap` were pressed (or released) in `group`.
    ButtonDelta {
        group: ButtonGroup,
        pressed: bool,
        bitmap: u16,
    },
    /// Full set of held main-group slots from a scan-code report.
    ButtonSnapshot { held: u16 },
    /// A report that carries nothing for this model.
    Unrecognized(u8),
}

/// Role of a HID interface, derived from its report descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Pen,
    Keyboard,
    /// The vendor interface used only for the mode handshake; emits nothing.
    Proprietary,
}

/// Classify an interface the way the tablets lay out their descriptors:
/// the vendor interface starts with a vendor usage page (`06 0A FF`), the
/// keyboard interface declares Generic Desktop / Keyboard, anything else is
/// the digitizer.
pub fn identify_interface(descriptor: &[u8]) -> Result<InterfaceKind, DecodeError> {
    if descriptor.len() < PROPRIETARY_PREFIX.len() {
        return Err(DecodeError::BadLength {
            tag: 0,
            expected: PROPRIETARY_PREFIX.len(),
            actual: descriptor.len(),
        });
    }
    if descriptor.starts_with(&PROPRIETARY_PREFIX) {
        return Ok(InterfaceKind::Proprietary);
    }
    if descriptor.windows(KEYBOARD_USAGE.len()).any(|w| w == KEYBOARD_USAGE) {
        return Ok(InterfaceKind::Keyboard);
    }
    Ok(InterfaceKind::Pen)
}

/// Decode one report for `model`.
pub fn classify_and_decode(
    model: &ModelDescriptor,
    tag: u8,
    data: &[u8],
) -> Result<DecodedEvent, DecodeError> {
    match (tag, model.protocol) {
        (PEN_REPORT | STYLUS_REPORT, _) => decode_pen(tag, data).map(DecodedEvent::Pen),
        (KEYBOARD_REPORT, ProtocolVariant::ScanCode) => decode_scan_codes(tag, data),
        (BUTTON_REPORT, ProtocolVariant::Bitmap) => {
            let [pressed, lo, hi] = expect_len::<BUTTON_REPORT_LEN>(tag, data)?;
            Ok(DecodedEvent::ButtonDelta {
                group: ButtonGroup::Main,
                pressed: pressed != 0,
                bitmap: u16::from_le_bytes([lo, hi]),
            })
        }
        (WHEEL_REPORT, ProtocolVariant::Bitmap) => decode_narrow(tag, data, ButtonGroup::Wheel),
        (PAD_REPORT, ProtocolVariant::Bitmap) => decode_narrow(tag, data, ButtonGroup::Pad),
        _ => Ok(DecodedEvent::Unrecognized(tag)),
    }
}

fn expect_len<const N: usize>(tag: u8, data: &[u8]) -> Result<[u8; N], DecodeError> {
    data.try_into().map_err(|_| DecodeError::BadLength {
        tag,
        expected: N,
        actual: data.len(),
    })
}

fn decode_pen(tag: u8, data: &[u8]) -> Result<PenSample, DecodeError> {
    let [buttons, x0, x1, y0, y1, p0, p1] = expect_len::<PEN_REPORT_LEN>(tag, data)?;
    Ok(PenSample {
        x: u16::from_le_bytes([x0, x1]),
        y: u16::from_le_bytes([y0, y1]),
        pressure: u16::from_le_bytes([p0, p1]),
        touch: buttons & PEN_BTN_TOUCH != 0,
        stylus1: buttons & PEN_BTN_STYLUS != 0,
        stylus2: buttons & PEN_BTN_STYLUS2 != 0,
    })
}

fn decode_narrow(tag: u8, data: &[u8], group: ButtonGroup) -> Result<DecodedEvent, DecodeError> {
    let [pressed, bits] = expect_len::<2>(tag, data)?;
    Ok(DecodedEvent::ButtonDelta {
        group,
        pressed: pressed != 0,
        bitmap: u16::from(bits),
    })
}

/// Scan codes fill the report from the front; the first zero ends the list.
/// A Ctrl-modified report folds the bare V slot into the Ctrl+V slot.
fn decode_scan_codes(tag: u8, data: &[u8]) -> Result<DecodedEvent, DecodeError> {
    let report = expect_len::<KEYBOARD_REPORT_LEN>(tag, data)?;
    let ctrl = report[0] != 0;

    let mut held: u16 = 0;
    for &code in report[1..].iter().take_while(|&&c| c != 0) {
        let slot = USAGE_SLOT_MAP
            .get(usize::from(code))
            .copied()
            .filter(|&s| s >= 0)
            .ok_or(DecodeError::UnknownUsage(code))?;
        held |= 1u16 << slot;
    }

    if ctrl && held & (1u16 << SLOT_V) != 0 {
        held &= !(1u16 << SLOT_V);
        held |= 1u16 << SLOT_CTRL_V;
    }

    debug_assert!(u32::from(held) < (1 << BUTTON_SLOTS));
    Ok(DecodedEvent::ButtonSnapshot { held })
}
