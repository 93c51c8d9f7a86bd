// driver/mod.rs
//! Per-node control loops. Each node owns one driver and calls `tick` once
//! every `config::TICK_PERIOD` with the current time.
pub mod actuator;
pub mod commander;

pub use actuator::*;
pub use commander::*;

use crate::config::{ANGLE_DEGREES_PER_LSB, BEEP_HZ, BEEP_MS, BATTERY_OK_MV, SHUTDOWN_BEEPS, SHUTDOWN_PAUSE, SPEED_FULL_SCALE};
use crate::display::Hsv;
use crate::hardware::{DeviceError, Hub, Motor};
use crate::mode::ModeEvent;
use crate::status::StatusFlags;
use crate::types::Opcode;

/// Applies one slot target to a motor.
pub fn command_motor<M: Motor>(motor: &mut M, opcode: Opcode, target: i16) -> Result<(), DeviceError> {
    let target = target as i32;
    match opcode {
        Opcode::SetSpeed if target == 0 => motor.brake(),
        Opcode::SetSpeed => {
            let limit = motor.speed_limit()?;
            motor.run(limit * target / SPEED_FULL_SCALE)
        }
        Opcode::SetAngle => motor.track_target(target * ANGLE_DEGREES_PER_LSB),
        Opcode::ResetAngle => motor.reset_angle(target * ANGLE_DEGREES_PER_LSB),
        Opcode::KeepAlive | Opcode::Shutdown => Ok(()),
    }
}

/// Motor angle in telemetry units, rounded down.
pub fn angle_field(degrees: i32) -> i16 {
    degrees
        .div_euclid(ANGLE_DEGREES_PER_LSB)
        .clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Battery and manual bits, common to both roles.
pub fn base_status<H: Hub>(hub: &mut H, manual: bool) -> StatusFlags {
    let mut status = StatusFlags::empty();
    status.set(StatusFlags::BATTERY_OK, hub.battery_mv() > BATTERY_OK_MV);
    status.set(StatusFlags::MANUAL, manual);
    status
}

/// Audible confirmation, then power off. The hub does not come back from this.
pub fn shutdown_sequence<H: Hub>(hub: &mut H) {
    crate::event!("shutdown");
    for _ in 0..SHUTDOWN_BEEPS {
        hub.beep(BEEP_HZ, BEEP_MS);
        hub.pause(SHUTDOWN_PAUSE);
    }
    hub.set_light(Hsv::WHITE);
    hub.power_off();
}

/// Events that change the mode and are worth a recorder entry.
pub(crate) const fn is_transition(event: ModeEvent) -> bool {
    matches!(
        event,
        ModeEvent::Engaged
            | ModeEvent::Selected
            | ModeEvent::Confirm
            | ModeEvent::Previous
            | ModeEvent::Next
            | ModeEvent::Released
    )
}
