//! Event-translation core for VEIKK USB graphics tablets.
//!
//! Raw HID reports go in through [`Driver`]; normalized pen, button and
//! gesture-pad events come out through an [`output::InputBackend`].

pub mod buttons;
pub mod capture;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod handshake;
pub mod mapping;
pub mod orientation;
pub mod output;
pub mod registry;
pub mod report;
pub mod session;
pub mod uinput;

pub use driver::{Driver, SessionHandle};
pub use error::CoreError;
