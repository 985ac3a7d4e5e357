//! Tablet orientation and the raw-to-output axis table it selects.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::event::Axis;

/// Physical rotation of the tablet relative to its default position.
///
/// Discriminants are the numeric form accepted by the `orientation`
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Default = 0,
    /// Rotated 90° counter-clockwise.
    RotateCcw90 = 1,
    /// Rotated 180°.
    #[serde(rename = "rotate-180")]
    Rotate180 = 2,
    /// Rotated 90° clockwise.
    RotateCw90 = 3,
}

impl Orientation {
    pub fn from_raw(value: u32) -> Result<Self, ConfigError> {
        match value {
            0 => Ok(Orientation::Default),
            1 => Ok(Orientation::RotateCcw90),
            2 => Ok(Orientation::Rotate180),
            3 => Ok(Orientation::RotateCw90),
            other => Err(ConfigError::OrientationOutOfRange(other)),
        }
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Whether the raw axes keep their roles (no 90° rotation).
    fn keeps_axes(self) -> bool {
        matches!(self, Orientation::Default | Orientation::Rotate180)
    }

    /// Output axis fed by the raw X coordinate.
    pub fn x_map_axis(self) -> Axis {
        if self.keeps_axes() {
            Axis::X
        } else {
            Axis::Y
        }
    }

    /// Output axis fed by the raw Y coordinate.
    pub fn y_map_axis(self) -> Axis {
        if self.keeps_axes() {
            Axis::Y
        } else {
            Axis::X
        }
    }

    /// Sign applied to raw X.
    pub fn x_map_dir(self) -> i32 {
        match self {
            Orientation::Default | Orientation::RotateCw90 => 1,
            Orientation::RotateCcw90 | Orientation::Rotate180 => -1,
        }
    }

    /// Sign applied to raw Y.
    pub fn y_map_dir(self) -> i32 {
        match self {
            Orientation::Default | Orientation::RotateCcw90 => 1,
            Orientation::RotateCw90 | Orientation::Rotate180 => -1,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Default => write!(f, "default"),
            Orientation::RotateCcw90 => write!(f, "rotate-ccw90"),
            Orientation::Rotate180 => write!(f, "rotate-180"),
            Orientation::RotateCw90 => write!(f, "rotate-cw90"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<u32>() {
            return Orientation::from_raw(raw).map_err(|e| e.to_string());
        }
        match s.to_lowercase().as_str() {
            "default" | "normal" => Ok(Orientation::Default),
            "rotate-ccw90" | "ccw" | "rotate_ccw90" => Ok(Orientation::RotateCcw90),
            "rotate-180" | "flip" | "rotate_180" => Ok(Orientation::Rotate180),
            "rotate-cw90" | "cw" | "rotate_cw90" => Ok(Orientation::RotateCw90),
            _ => Err(format!(
                "Invalid orientation '{}'. Valid values: default, rotate-cw90, rotate-180, rotate-ccw90, 0-3",
                s
            )),
        }
    }
}
