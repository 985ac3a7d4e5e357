//! Process-wide mapping configuration.
//!
//! The live configuration is an immutable [`Configuration`] snapshot behind
//! an `RwLock<Arc<_>>`. Each setter swaps in a whole new snapshot with a
//! higher version, so a reader sees either all of an update or none of it.

mod cli;
mod file;
pub mod params;

pub use cli::{Cli, Command};

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ConfigError;
use crate::mapping::{PressureCurve, Rect};
use crate::orientation::Orientation;

/// One complete configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    /// Bumped by every successful setter; startup snapshots are version 0.
    pub version: u64,
    pub screen_region: Rect,
    pub screen_size: Rect,
    pub orientation: Orientation,
    pub pressure_curve: PressureCurve,
}

impl Configuration {
    /// Load startup configuration by merging the TOML file with CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file_config = cli
            .config
            .as_ref()
            .and_then(|p| file::load_from_path(p))
            .or_else(file::load_from_default_paths)
            .unwrap_or_default();

        let config = Self {
            version: 0,
            screen_region: cli
                .screen_map
                .or(file_config.screen_map)
                .unwrap_or(Rect::ZERO),
            screen_size: cli
                .screen_size
                .or(file_config.screen_size)
                .unwrap_or(Rect::ZERO),
            orientation: cli.orientation.unwrap_or(file_config.orientation),
            pressure_curve: cli
                .pressure_map
                .or(file_config.pressure_curve)
                .unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rect("screen_map", &self.screen_region)?;
        validate_rect("screen_size", &self.screen_size)
    }
}

/// A rect is valid when it is all-zero (default mapping) or has area.
pub fn validate_rect(field: &'static str, rect: &Rect) -> Result<(), ConfigError> {
    if rect.is_zero() || rect.has_area() {
        Ok(())
    } else {
        Err(ConfigError::DegenerateRect { field })
    }
}

/// Holder of the current snapshot.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<Configuration>>,
}

impl ConfigStore {
    pub fn new(initial: Configuration) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Derive a new snapshot from the current one and publish it.
    pub fn update(&self, change: impl FnOnce(&mut Configuration)) -> Arc<Configuration> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Configuration::clone(&current);
        change(&mut next);
        next.version = current.version + 1;
        let next = Arc::new(next);
        *current = next.clone();
        next
    }
}
