//! Packed module-parameter encodings.
//!
//! The tablets' setup tools pass configuration as single integers. These are
//! decoded here into structured values; nothing past this module sees the
//! packed form.
//!
//! ```text
//! screen_size   u32  [ width:16 | height:16 ]                 (low bits first)
//! screen_map    u64  [ x:i16 | y:i16 | width:16 | height:16 ]
//! pressure_map  u64  [ a0:i16 | a1:i16 | a2:i16 | a3:i16 ]
//! ```

use crate::mapping::{PressureCurve, Rect};

/// Packed form of [`PressureCurve::LINEAR`].
pub const DEFAULT_PRESSURE_MAP: u64 = 100 << 16;

fn lane(value: u64, index: u32) -> u16 {
    (value >> (16 * index)) as u16
}

pub fn decode_screen_size(value: u32) -> Rect {
    let value = u64::from(value);
    Rect::new(0, 0, u32::from(lane(value, 0)), u32::from(lane(value, 1)))
}

pub fn decode_screen_map(value: u64) -> Rect {
    Rect::new(
        i32::from(lane(value, 0) as i16),
        i32::from(lane(value, 1) as i16),
        u32::from(lane(value, 2)),
        u32::from(lane(value, 3)),
    )
}

pub fn decode_pressure_map(value: u64) -> PressureCurve {
    PressureCurve::new(
        lane(value, 0) as i16,
        lane(value, 1) as i16,
        lane(value, 2) as i16,
        lane(value, 3) as i16,
    )
}

/// Parse an unsigned integer in decimal or `0x` hex.
pub fn parse_packed(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid packed value '{}': {}", s, e))
}

fn parse_fields<const N: usize>(s: &str, sep: &[char]) -> Option<[i64; N]> {
    let parts: Vec<i64> = s
        .split(sep)
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;
    parts.try_into().ok()
}

fn to_extent(v: i64) -> Result<u32, String> {
    u32::try_from(v).map_err(|_| format!("extent {} out of range", v))
}

fn to_offset(v: i64) -> Result<i32, String> {
    i32::try_from(v).map_err(|_| format!("offset {} out of range", v))
}

/// CLI form of `screen_size`: `WIDTHxHEIGHT` or the packed integer.
pub fn parse_screen_size(s: &str) -> Result<Rect, String> {
    let is_hex = s.trim_start().to_lowercase().starts_with("0x");
    if !is_hex {
        if let Some([w, h]) = parse_fields::<2>(s, &['x', 'X']) {
            return Ok(Rect::new(0, 0, to_extent(w)?, to_extent(h)?));
        }
    }
    let packed = parse_packed(s)?;
    let packed = u32::try_from(packed).map_err(|_| format!("screen size {:#x} wider than 32 bits", packed))?;
    Ok(decode_screen_size(packed))
}

/// CLI form of `screen_map`: `X,Y,WIDTH,HEIGHT` or the packed integer.
pub fn parse_screen_map(s: &str) -> Result<Rect, String> {
    if let Some([x, y, w, h]) = parse_fields::<4>(s, &[',']) {
        return Ok(Rect::new(to_offset(x)?, to_offset(y)?, to_extent(w)?, to_extent(h)?));
    }
    parse_packed(s).map(decode_screen_map)
}

/// CLI form of `pressure_map`: `A0,A1,A2,A3` (hundredths) or the packed integer.
pub fn parse_pressure_map(s: &str) -> Result<PressureCurve, String> {
    if let Some([a0, a1, a2, a3]) = parse_fields::<4>(s, &[',']) {
        let coeff = |c: i64| i16::try_from(c).map_err(|_| format!("coefficient {} out of range", c));
        return Ok(PressureCurve::new(coeff(a0)?, coeff(a1)?, coeff(a2)?, coeff(a3)?));
    }
    parse_packed(s).map(decode_pressure_map)
}
