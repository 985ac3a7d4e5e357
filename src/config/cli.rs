use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::params::{parse_pressure_map, parse_screen_map, parse_screen_size};
use crate::mapping::{PressureCurve, Rect};
use crate::orientation::Orientation;

#[derive(Parser)]
#[command(name = "veikk-pad")]
#[command(about = "Translate VEIKK tablet HID reports into input events")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Tablet orientation (default, rotate-cw90, rotate-180, rotate-ccw90, or 0-3)
    #[arg(long, global = true, value_parser = clap::value_parser!(Orientation))]
    pub orientation: Option<Orientation>,

    /// Screen region the tablet maps to: X,Y,WIDTH,HEIGHT or packed u64
    #[arg(long, global = true, value_parser = parse_screen_map)]
    pub screen_map: Option<Rect>,

    /// Total screen size: WIDTHxHEIGHT or packed u32
    #[arg(long, global = true, value_parser = parse_screen_size)]
    pub screen_size: Option<Rect>,

    /// Pressure curve coefficients in hundredths: A0,A1,A2,A3 or packed u64
    #[arg(long, global = true, value_parser = parse_pressure_map)]
    pub pressure_map: Option<PressureCurve>,

    /// Path to config file
    #[arg(long, global = true, env = "VEIKK_PAD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List supported tablet models
    Models,
    /// Feed a recorded report capture through the driver
    Replay {
        /// Capture file ("-" for stdin)
        file: PathBuf,

        /// Print emitted events instead of creating uinput devices
        #[arg(long)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_with_overrides() {
        let cli = Cli::try_parse_from([
            "veikk-pad",
            "replay",
            "capture.txt",
            "--dry-run",
            "--orientation",
            "cw",
            "--screen-size",
            "1920x1080",
            "--pressure-map",
            "6553600",
        ])
        .unwrap();
        match cli.command {
            Command::Replay { ref file, dry_run } => {
                assert_eq!(file, &PathBuf::from("capture.txt"));
                assert!(dry_run);
            }
            Command::Models => panic!("expected replay"),
        }
        assert_eq!(cli.orientation, Some(Orientation::RotateCw90));
        assert_eq!(cli.screen_size, Some(Rect::new(0, 0, 1920, 1080)));
        assert_eq!(cli.pressure_map, Some(PressureCurve::LINEAR));
        assert!(cli.screen_map.is_none());
    }

    #[test]
    fn test_bad_orientation_rejected() {
        assert!(Cli::try_parse_from(["veikk-pad", "models", "--orientation", "5"]).is_err());
    }
}
