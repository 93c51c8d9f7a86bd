// mode.rs
use crate::config::FRAME_PERIOD;
use crate::types::Mode;

/// Buttons currently held on a hub. Single-button hubs only ever report `CENTER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(pub u8);

impl Buttons {
    pub const CENTER: u8 = 0b001;
    pub const LEFT: u8 = 0b010;
    pub const RIGHT: u8 = 0b100;

    pub const NONE: Buttons = Buttons(0);
    pub const PRIMARY: Buttons = Buttons(Self::CENTER);

    pub const fn any(self) -> bool {
        self.0 != 0
    }

    pub const fn held(self, button: u8) -> bool {
        self.0 & button != 0
    }

    /// Exactly `button` and nothing else.
    pub const fn only(self, button: u8) -> bool {
        self.0 == button
    }
}

/// What the last `update` did, for the role to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeEvent {
    /// Still IDLE, following the bus.
    Idle,
    /// IDLE -> ACTIVE on a primary press.
    Engaged,
    /// Button still held in ACTIVE or INACTIVE; frame counter restarted.
    Holding,
    /// ACTIVE -> SELECT once every button is released.
    Selected,
    /// SELECT -> INACTIVE on a primary press.
    Confirm,
    /// SELECT -> ACTIVE on a left press.
    Previous,
    /// SELECT -> ACTIVE on a right press.
    Next,
    /// Staying in SELECT.
    Manual,
    /// INACTIVE -> IDLE.
    Released,
}

/// Button driven mode machine shared by both roles.
///
/// Every node starts in `Mode::Idle`. There is no terminal state; shutting
/// down is an action taken by the role on `Confirm` or on a SHUTDOWN command.
pub struct ModeMachine {
    pub mode: Mode,
    /// Repeating tick counter in `0..FRAME_PERIOD`, used by displays and
    /// the actuator self-test.
    pub frame: u16,
}

impl ModeMachine {
    pub const fn new() -> Self {
        Self {
            mode: Mode::Idle,
            frame: 0,
        }
    }

    pub fn update(&mut self, buttons: Buttons) -> ModeEvent {
        let (next, event) = match self.mode {
            Mode::Idle => {
                if buttons.only(Buttons::CENTER) {
                    (Mode::Active, ModeEvent::Engaged)
                } else {
                    (Mode::Idle, ModeEvent::Idle)
                }
            }
            Mode::Active => {
                if buttons.any() {
                    (Mode::Active, ModeEvent::Holding)
                } else {
                    (Mode::Select, ModeEvent::Selected)
                }
            }
            Mode::Select => {
                if buttons.only(Buttons::CENTER) {
                    (Mode::Inactive, ModeEvent::Confirm)
                } else if buttons.only(Buttons::LEFT) {
                    (Mode::Active, ModeEvent::Previous)
                } else if buttons.only(Buttons::RIGHT) {
                    (Mode::Active, ModeEvent::Next)
                } else {
                    (Mode::Select, ModeEvent::Manual)
                }
            }
            Mode::Inactive => {
                if buttons.held(Buttons::CENTER) {
                    (Mode::Inactive, ModeEvent::Holding)
                } else {
                    (Mode::Idle, ModeEvent::Released)
                }
            }
        };

        if event == ModeEvent::Holding {
            self.frame = 0;
        }
        self.mode = next;
        event
    }

    /// Called once at the end of every tick.
    pub fn advance_frame(&mut self) {
        self.frame = (self.frame + 1) % FRAME_PERIOD;
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self.mode, Mode::Idle)
    }
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
