use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::mapping::{PressureCurve, Rect};
use crate::orientation::Orientation;

const FILE_NAME: &str = "veikk-pad.toml";

/// `veikk-pad.toml`. Every field is optional; missing tables mean the
/// default mapping.
///
/// ```toml
/// orientation = "rotate-cw90"
///
/// [screen_map]
/// x = 1920
/// width = 1920
/// height = 1080
///
/// [screen_size]
/// width = 3840
/// height = 1080
///
/// [pressure_curve]
/// a1 = 50
/// a2 = 50
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub orientation: Orientation,
    pub screen_map: Option<Rect>,
    pub screen_size: Option<Rect>,
    pub pressure_curve: Option<PressureCurve>,
}

pub fn load_from_path(path: &Path) -> Option<FileConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match parse(&content) {
        Ok(config) => {
            log::debug!("Loaded config from {}", path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

pub fn load_from_default_paths() -> Option<FileConfig> {
    for path in default_config_paths() {
        if path.exists() {
            if let Some(config) = load_from_path(&path) {
                return Some(config);
            }
        }
    }
    None
}

fn parse(content: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(content)
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from(FILE_NAME));

    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".config").join(FILE_NAME));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = parse("").unwrap();
        assert_eq!(config.orientation, Orientation::Default);
        assert!(config.screen_map.is_none());
        assert!(config.pressure_curve.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
            orientation = "rotate-180"

            [screen_map]
            x = -1920
            width = 1920
            height = 1080

            [screen_size]
            width = 3840
            height = 1080

            [pressure_curve]
            a1 = 50
            a2 = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.orientation, Orientation::Rotate180);
        assert_eq!(config.screen_map, Some(Rect::new(-1920, 0, 1920, 1080)));
        assert_eq!(config.screen_size, Some(Rect::new(0, 0, 3840, 1080)));
        assert_eq!(config.pressure_curve, Some(PressureCurve::new(0, 50, 50, 0)));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(parse("host = \"10.11.99.1\"").is_err());
        assert!(parse("[screen_map]\nwidth = 1\nheight = 1\ndepth = 1").is_err());
        assert!(parse("orientation = \"sideways\"").is_err());
    }
}
