//! Geometry and pressure mapping from the raw sensor domain to output space.
//!
//! Everything here is pure arithmetic. The pen channel reports raw X on
//! `x_map_axis` as `x_map_dir * x` (same for Y), and registers each axis with
//! the range `[origin, origin + extent]` from [`DerivedMapping::rect`], so the
//! input subsystem scales the requested screen region onto the digitizer.

use serde::Deserialize;

use crate::device::ModelBounds;
use crate::event::Axis;
use crate::orientation::Orientation;

/// Coefficients of the pressure curve are stored as hundredths.
const PRESSURE_SCALE: i64 = 100;

/// Screen rectangle. All-zero means "use the default mapping".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rect {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const ZERO: Rect = Rect::new(0, 0, 0, 0);
    pub const UNIT: Rect = Rect::new(0, 0, 1, 1);

    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn is_zero(&self) -> bool {
        *self == Rect::ZERO
    }
}

/// Cubic pressure curve `P = a3·p³ + a2·p² + a1·p + a0` on the unit square,
/// each coefficient stored multiplied by 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PressureCurve {
    #[serde(default)]
    pub a0: i16,
    #[serde(default)]
    pub a1: i16,
    #[serde(default)]
    pub a2: i16,
    #[serde(default)]
    pub a3: i16,
}

impl PressureCurve {
    pub const LINEAR: PressureCurve = PressureCurve {
        a0: 0,
        a1: 100,
        a2: 0,
        a3: 0,
    };

    pub fn new(a0: i16, a1: i16, a2: i16, a3: i16) -> Self {
        Self { a0, a1, a2, a3 }
    }
}

impl Default for PressureCurve {
    fn default() -> Self {
        Self::LINEAR
    }
}

/// Output range for the two position axes, in the order raw X, raw Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Session-local transform from raw digitizer space to output space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedMapping {
    pub x_map_axis: Axis,
    pub y_map_axis: Axis,
    pub x_map_dir: i32,
    pub y_map_dir: i32,
    pub rect: OutputRect,
}

impl DerivedMapping {
    /// Output axis values for one raw sample: `[(axis, value); 2]`.
    pub fn map_point(&self, x: u16, y: u16) -> [(Axis, i32); 2] {
        [
            (self.x_map_axis, self.x_map_dir * i32::from(x)),
            (self.y_map_axis, self.y_map_dir * i32::from(y)),
        ]
    }

    /// Registration range of each output position axis.
    pub fn axis_ranges(&self) -> [(Axis, i32, i32); 2] {
        [
            (
                self.x_map_axis,
                self.rect.x,
                self.rect.x.saturating_add(self.rect.width),
            ),
            (
                self.y_map_axis,
                self.rect.y,
                self.rect.y.saturating_add(self.rect.height),
            ),
        ]
    }
}

/// Compute the axis table and output rectangle for a model.
///
/// A region or screen size without area falls back to the 1×1 identity rect
/// for both, which maps the full digitizer onto the full screen.
pub fn compute_derived_mapping(
    bounds: ModelBounds,
    screen_region: Rect,
    screen_size: Rect,
    orientation: Orientation,
) -> DerivedMapping {
    let x_map_axis = orientation.x_map_axis();
    let y_map_axis = orientation.y_map_axis();
    let x_map_dir = orientation.x_map_dir();
    let y_map_dir = orientation.y_map_dir();

    let (region, size) = if screen_region.has_area() && screen_size.has_area() {
        (screen_region, screen_size)
    } else {
        (Rect::UNIT, Rect::UNIT)
    };

    let (x, width) = axis_extent(region, size, x_map_axis, x_map_dir, bounds.x_max);
    let (y, height) = axis_extent(region, size, y_map_axis, y_map_dir, bounds.y_max);

    DerivedMapping {
        x_map_axis,
        y_map_axis,
        x_map_dir,
        y_map_dir,
        rect: OutputRect {
            x,
            y,
            width,
            height,
        },
    }
}

/// Origin and extent of one output axis: the region's offset and the whole
/// screen, both scaled so that the region's extent spans `max` raw units.
fn axis_extent(region: Rect, size: Rect, axis: Axis, dir: i32, max: i32) -> (i32, i32) {
    let (offset, extent, screen) = match axis {
        Axis::X => (region.x, region.width, size.width),
        _ => (region.y, region.height, size.height),
    };
    let max = i64::from(max);
    let extent = i64::from(extent);
    let flipped = if dir < 0 { extent } else { 0 };

    let origin = -((i64::from(offset) + flipped) * max / extent);
    let span = i64::from(screen) * max / extent;
    (saturate(origin), saturate(span))
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Apply the pressure curve, scaled to a `[0, pressure_max]` domain and range.
///
/// Arithmetic is 64-bit with divisions after multiplications; the result is
/// not clamped.
pub fn map_pressure(raw: i32, pressure_max: i32, curve: &PressureCurve) -> i32 {
    let p = i64::from(raw);
    let pmax = i64::from(pressure_max.max(1));
    let (a0, a1, a2, a3) = (
        i64::from(curve.a0),
        i64::from(curve.a1),
        i64::from(curve.a2),
        i64::from(curve.a3),
    );

    let cubic = a3 * p * p * p / pmax / pmax;
    let square = a2 * p * p / pmax;
    let value = (cubic + square + a1 * p + a0 * pmax) / PRESSURE_SCALE;
    value as i32
}
