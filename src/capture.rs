//! Text captures of tablet traffic, and replaying them through a [`Driver`].
//!
//! One command per line; `#` starts a comment:
//!
//! ```text
//! attach 1:7.0 2feb:0004 050d0902a101
//! report 1:7.0 01 01 0010 0020 0008
//! set orientation rotate-cw90
//! detach 1:7.0
//! ```
//!
//! Hex payloads may be split by whitespace; `-` stands for an empty payload.
//! `set` accepts the same value forms as the command-line flags.

use std::io::BufRead;

use thiserror::Error;

use crate::config::params::{parse_pressure_map, parse_screen_map, parse_screen_size};
use crate::device::InterfaceId;
use crate::driver::Driver;
use crate::error::{ConfigError, CoreError};
use crate::mapping::{PressureCurve, Rect};
use crate::orientation::Orientation;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("line {line}: {source}")]
    Config {
        line: usize,
        #[source]
        source: ConfigError,
    },

    #[error("line {line}: {source}")]
    Attach {
        line: usize,
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Orientation(Orientation),
    ScreenMap(Rect),
    ScreenSize(Rect),
    PressureMap(PressureCurve),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Attach {
        interface: InterfaceId,
        vendor_id: u16,
        product_id: u16,
        descriptor: Vec<u8>,
    },
    Report {
        interface: InterfaceId,
        tag: u8,
        data: Vec<u8>,
    },
    Detach {
        interface: InterfaceId,
    },
    Set(Setting),
}

/// A command and the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub line: usize,
    pub command: Command,
}

/// Totals from a replay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub attached: usize,
    pub ignored_interfaces: usize,
    pub reports: usize,
    pub dropped: usize,
    pub detached: usize,
    pub settings: usize,
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    if s == "-" {
        return Ok(Vec::new());
    }
    if s.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", s));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(|| format!("invalid hex '{}'", s))
        })
        .collect()
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|_| format!("invalid id '{}'", s))
}

fn parse_tag(s: &str) -> Result<u8, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u8::from_str_radix(digits, 16).map_err(|_| format!("invalid report tag '{}'", s))
}

fn parse_setting(name: &str, value: &str) -> Result<Setting, String> {
    match name {
        "orientation" => value.parse().map(Setting::Orientation),
        "screen-map" | "screen_map" => parse_screen_map(value).map(Setting::ScreenMap),
        "screen-size" | "screen_size" => parse_screen_size(value).map(Setting::ScreenSize),
        "pressure-map" | "pressure_map" => parse_pressure_map(value).map(Setting::PressureMap),
        other => Err(format!("unknown setting '{}'", other)),
    }
}

/// Parse one line; `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.split('#').next().unwrap_or("").trim();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let mut next = |what: &str| words.next().ok_or_else(|| format!("{}: missing {}", verb, what));

    let command = match verb {
        "attach" => {
            let interface = next("interface")?.parse::<InterfaceId>()?;
            let ids = next("vendor:product")?;
            let (vendor, product) = ids
                .split_once(':')
                .ok_or_else(|| format!("invalid ids '{}'", ids))?;
            let descriptor = parse_hex(next("report descriptor")?)?;
            Command::Attach {
                interface,
                vendor_id: parse_hex_u16(vendor)?,
                product_id: parse_hex_u16(product)?,
                descriptor,
            }
        }
        "report" => {
            let interface = next("interface")?.parse::<InterfaceId>()?;
            let tag = parse_tag(next("tag")?)?;
            let hex: String = words.by_ref().collect();
            let data = if hex.is_empty() {
                return Err("report: missing payload".into());
            } else {
                parse_hex(&hex)?
            };
            Command::Report {
                interface,
                tag,
                data,
            }
        }
        "detach" => Command::Detach {
            interface: next("interface")?.parse::<InterfaceId>()?,
        },
        "set" => {
            let name = next("setting")?;
            let value = next("value")?;
            Command::Set(parse_setting(name, value)?)
        }
        other => return Err(format!("unknown command '{}'", other)),
    };

    if words.next().is_some() {
        return Err(format!("{}: trailing input", verb));
    }
    Ok(Some(command))
}

pub fn parse(input: impl BufRead) -> Result<Vec<Entry>, CaptureError> {
    let mut entries = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let text = line?;
        match parse_line(&text) {
            Ok(Some(command)) => entries.push(Entry {
                line: line_no,
                command,
            }),
            Ok(None) => {}
            Err(reason) => {
                return Err(CaptureError::Syntax {
                    line: line_no,
                    reason,
                })
            }
        }
    }
    Ok(entries)
}

/// Feed `entries` through `driver`.
///
/// Per-report failures are counted and skipped the way a live transport
/// would. Failed attaches and rejected settings stop the replay.
pub fn replay(driver: &Driver, entries: &[Entry]) -> Result<ReplayStats, CaptureError> {
    let mut stats = ReplayStats::default();
    for entry in entries {
        let line = entry.line;
        match &entry.command {
            Command::Attach {
                interface,
                vendor_id,
                product_id,
                descriptor,
            } => match driver.on_attach(*interface, *vendor_id, *product_id, descriptor) {
                Ok(Some(_)) => stats.attached += 1,
                Ok(None) => stats.ignored_interfaces += 1,
                Err(e) if e.is_fatal() => return Err(CaptureError::Attach { line, source: e }),
                Err(e) => {
                    log::warn!("line {}: {}", line, e);
                    stats.ignored_interfaces += 1;
                }
            },
            Command::Report {
                interface,
                tag,
                data,
            } => {
                stats.reports += 1;
                if driver.on_raw_report(*interface, *tag, data).is_err() {
                    stats.dropped += 1;
                }
            }
            Command::Detach { interface } => {
                driver.on_detach(*interface);
                stats.detached += 1;
            }
            Command::Set(setting) => {
                let result = match *setting {
                    Setting::Orientation(o) => driver.set_orientation(o),
                    Setting::ScreenMap(r) => driver.set_screen_region(r),
                    Setting::ScreenSize(r) => driver.set_screen_size(r),
                    Setting::PressureMap(c) => driver.set_pressure_curve(c.a0, c.a1, c.a2, c.a3),
                };
                result.map_err(|source| CaptureError::Config { line, source })?;
                stats.settings += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Configuration;
    use crate::event::{Axis, ChannelKind, KEY_F5};
    use crate::handshake::NoHandshake;
    use crate::output::testing::{Recorded, RecordingBackend};

    const CAPTURE: &str = "\
# A15: pen on interface 0, buttons on 1, vendor interface 2
attach 1:7.0 2feb:0004 050d0902a101
attach 1:7.1 2feb:0004 05010906a101
attach 1:7.2 2feb:0004 060aff0901

report 1:7.0 01 01 6400 c800 0010   # x=100 y=200 p=4096
report 1:7.1 04 010100
report 1:7.1 04 000100
report 1:7.0 01 0164                 # truncated
set orientation rotate-180
report 1:7.0 01 01 6400 c800 0000
detach 1:7.1
detach 1:7.0
";

    #[test]
    fn test_parse_line_forms() {
        assert_eq!(parse_line("   # nothing here"), Ok(None));
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(
            parse_line("report 3:12.1 0x05 01 02"),
            Ok(Some(Command::Report {
                interface: InterfaceId::new(3, 12, 1),
                tag: 0x05,
                data: vec![0x01, 0x02],
            }))
        );
        assert_eq!(
            parse_line("set screen-size 1920x1080"),
            Ok(Some(Command::Set(Setting::ScreenSize(Rect::new(0, 0, 1920, 1080)))))
        );
        assert_eq!(
            parse_line("set pressure-map 6553600"),
            Ok(Some(Command::Set(Setting::PressureMap(PressureCurve::LINEAR))))
        );
        assert_eq!(
            parse_line("report 1:2.0 06 -"),
            Ok(Some(Command::Report {
                interface: InterfaceId::new(1, 2, 0),
                tag: 0x06,
                data: Vec::new(),
            }))
        );
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(parse_line("attach 1:7.0 2feb0004 00").is_err());
        assert!(parse_line("report 1:7.0 01 0g").is_err());
        assert!(parse_line("report 1:7.0 01 012").is_err());
        assert!(parse_line("report 1:7.0 01").is_err());
        assert!(parse_line("detach 1:7.0 extra").is_err());
        assert!(parse_line("set tilt 3").is_err());
        assert!(parse_line("unplug 1:7.0").is_err());
    }

    #[test]
    fn test_parse_reports_line_numbers() {
        let err = parse("attach 1:7.0 2feb:0004 050d\n\nbogus\n".as_bytes()).unwrap_err();
        match err {
            CaptureError::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_replay() {
        let entries = parse(CAPTURE.as_bytes()).unwrap();
        let backend = RecordingBackend::new();
        let driver = Driver::new(
            Configuration::default(),
            Arc::new(backend.clone()),
            Arc::new(NoHandshake),
        );

        let stats = replay(&driver, &entries).unwrap();
        assert_eq!(
            stats,
            ReplayStats {
                attached: 2,
                ignored_interfaces: 1,
                reports: 5,
                dropped: 1,
                detached: 2,
                settings: 1,
            }
        );
        assert_eq!(driver.session_count(), 0);

        let pen = backend.events(ChannelKind::Pen);
        assert_eq!(pen[0], Recorded::Abs(Axis::X, 100));
        assert_eq!(pen[2], Recorded::Abs(Axis::Pressure, 4096));
        // after the rotation the same sample lands mirrored
        assert_eq!(pen[7], Recorded::Abs(Axis::X, -100));
        assert_eq!(pen[8], Recorded::Abs(Axis::Y, -200));

        let buttons = backend.events(ChannelKind::Buttons);
        assert!(buttons.contains(&Recorded::Key(KEY_F5, true)));
        assert!(buttons.contains(&Recorded::Key(KEY_F5, false)));
    }

    #[test]
    fn test_replay_stops_on_rejected_setting() {
        let entries = parse("set screen-map 0,0,0,10\n".as_bytes()).unwrap();
        let driver = Driver::new(
            Configuration::default(),
            Arc::new(RecordingBackend::new()),
            Arc::new(NoHandshake),
        );
        assert!(matches!(
            replay(&driver, &entries),
            Err(CaptureError::Config { line: 1, .. })
        ));
    }
}
