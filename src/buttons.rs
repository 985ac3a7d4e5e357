//! Held-button bookkeeping for the tablet's button groups.

use crate::report::ButtonGroup;

/// One bit that flipped in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChange {
    pub group: ButtonGroup,
    pub bit: u8,
    pub pressed: bool,
}

/// What to emit after one report: the modifier first, then the key changes
/// in ascending bit order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transitions {
    /// True while any button of any group is held. Re-emitted on every
    /// report so it is asserted before the keys it modifies.
    pub modifier: bool,
    pub changes: Vec<KeyChange>,
}

/// Bitmask of held raw positions per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub main: u16,
    pub wheel: u16,
    pub pad: u16,
}

impl ButtonState {
    fn get(&self, group: ButtonGroup) -> u16 {
        match group {
            ButtonGroup::Main => self.main,
            ButtonGroup::Wheel => self.wheel,
            ButtonGroup::Pad => self.pad,
        }
    }

    fn slot(&mut self, group: ButtonGroup) -> &mut u16 {
        match group {
            ButtonGroup::Main => &mut self.main,
            ButtonGroup::Wheel => &mut self.wheel,
            ButtonGroup::Pad => &mut self.pad,
        }
    }

    pub fn any_held(&self) -> bool {
        (self.main | self.wheel | self.pad) != 0
    }
}

#[derive(Debug, Default)]
pub struct ButtonStateTracker {
    state: ButtonState,
}

impl ButtonStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Apply a press or release of `bitmap` in `group`.
    pub fn apply_delta(&mut self, group: ButtonGroup, pressed: bool, bitmap: u16) -> Transitions {
        let old = self.state.get(group);
        let new = if pressed { old | bitmap } else { old & !bitmap };
        self.replace(group, new)
    }

    /// Replace the held set of `group` with a full snapshot.
    pub fn apply_snapshot(&mut self, group: ButtonGroup, held: u16) -> Transitions {
        self.replace(group, held)
    }

    /// Release everything; used when the channel is about to go away.
    pub fn release_all(&mut self) -> Transitions {
        let mut changes = Vec::new();
        for group in [ButtonGroup::Main, ButtonGroup::Wheel, ButtonGroup::Pad] {
            changes.extend(self.replace(group, 0).changes);
        }
        Transitions {
            modifier: false,
            changes,
        }
    }

    fn replace(&mut self, group: ButtonGroup, new: u16) -> Transitions {
        let slot = self.state.slot(group);
        let old = std::mem::replace(slot, new);
        let flipped = old ^ new;

        let changes = (0..u16::BITS as u8)
            .filter(|bit| flipped & (1 << bit) != 0)
            .map(|bit| KeyChange {
                group,
                bit,
                pressed: new & (1 << bit) != 0,
            })
            .collect();

        Transitions {
            modifier: self.state.any_held(),
            changes,
        }
    }
}
