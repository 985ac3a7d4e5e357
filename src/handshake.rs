//! "Enable proprietary reporting" handshake.
//!
//! Until a tablet receives one command per logical channel it only speaks
//! its generic HID mode. The commands must be spaced out: sent back to back
//! the hardware silently drops all but the first.

use std::time::Duration;

use crate::device::{InterfaceId, ModelDescriptor};
use crate::event::ChannelKind;

pub const COMMAND_LEN: usize = 9;

const FEATURE_REPORT_ID: u8 = 0x09;
const OP_ENABLE: u8 = 0x01;

pub const PEN_DELAY: Duration = Duration::from_millis(100);
pub const BUTTONS_DELAY: Duration = Duration::from_millis(300);
pub const PAD_DELAY: Duration = Duration::from_millis(500);

/// One command buffer and how long after attach it is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeCommand {
    pub channel: ChannelKind,
    pub delay: Duration,
    pub bytes: [u8; COMMAND_LEN],
}

/// Sends handshake commands to the device at their delays.
///
/// Implementations must not block the caller; the driver schedules from
/// inside `on_attach`.
pub trait CommandScheduler: Send + Sync {
    fn schedule(&self, interface: InterfaceId, commands: Vec<HandshakeCommand>);
}

/// Scheduler that drops every command; for sources that replay reports
/// recorded from an already-initialized tablet.
#[derive(Debug, Default)]
pub struct NoHandshake;

impl CommandScheduler for NoHandshake {
    fn schedule(&self, interface: InterfaceId, commands: Vec<HandshakeCommand>) {
        log::debug!("{}: skipping {} handshake commands", interface, commands.len());
    }
}

fn command(channel: ChannelKind, delay: Duration) -> HandshakeCommand {
    let selector = match channel {
        ChannelKind::Pen => 0x01,
        ChannelKind::Buttons => 0x02,
        ChannelKind::Pad => 0x03,
    };
    let mut bytes = [0u8; COMMAND_LEN];
    bytes[0] = FEATURE_REPORT_ID;
    bytes[1] = OP_ENABLE;
    bytes[2] = selector;
    HandshakeCommand {
        channel,
        delay,
        bytes,
    }
}

/// Commands for every channel `model` exposes, in send order.
pub fn plan(model: &ModelDescriptor) -> Vec<HandshakeCommand> {
    let mut commands = vec![command(ChannelKind::Pen, PEN_DELAY)];
    if model.has_button_channel() {
        commands.push(command(ChannelKind::Buttons, BUTTONS_DELAY));
    }
    if model.flags.has_gesture_pad {
        commands.push(command(ChannelKind::Pad, PAD_DELAY));
    }
    commands
}
