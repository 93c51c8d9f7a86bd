// hardware.rs
//! Seams to the hub firmware. Drivers only ever see these traits; the
//! simulator and the tests provide the implementations.
use embassy_time::Duration;

use crate::display::{Hsv, Icon};
use crate::mode::Buttons;
use crate::packet::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// Nothing (or the wrong device) is plugged into the port.
    Disconnected,
    /// The device stopped answering.
    Timeout,
    /// The device answered with something unusable.
    InvalidData,
}

pub trait Motor {
    /// Runs at `speed` degrees per second until told otherwise.
    fn run(&mut self, speed: i32) -> Result<(), DeviceError>;
    /// Holds an absolute angle (degrees).
    fn track_target(&mut self, angle: i32) -> Result<(), DeviceError>;
    /// Redefines the current position as `angle` degrees without moving.
    fn reset_angle(&mut self, angle: i32) -> Result<(), DeviceError>;
    fn brake(&mut self) -> Result<(), DeviceError>;
    /// Current angle in degrees.
    fn angle(&mut self) -> Result<i32, DeviceError>;
    /// Maximum speed in degrees per second.
    fn speed_limit(&mut self) -> Result<i32, DeviceError>;
}

pub trait TiltSensor {
    /// Raw per-axis tilt in degrees, clamped at the sensor's saturation bound.
    fn read(&mut self) -> Result<[i16; 3], DeviceError>;
}

pub trait DistanceSensor {
    fn distance(&mut self) -> Result<i16, DeviceError>;
}

/// The hub a node runs on: power, buttons, inertial unit, light and speaker.
pub trait Hub {
    fn battery_mv(&mut self) -> u16;
    fn buttons(&mut self) -> Buttons;
    /// Hub acceleration per axis, milli-g.
    fn acceleration(&mut self) -> [i32; 3];
    /// Hub (pitch, roll) in degrees.
    fn orientation(&mut self) -> (i16, i16);
    fn set_light(&mut self, color: Hsv);
    /// Hubs without a light matrix ignore icons.
    fn set_icons(&mut self, _icon: &Icon) {}
    fn beep(&mut self, frequency_hz: u16, duration_ms: u16);
    /// Blocks for `duration`. Only used by the shutdown sequence.
    fn pause(&mut self, duration: Duration);
    fn power_off(&mut self);
}

/// A hub with devices on its ports.
pub trait PortHub: Hub {
    type Motor: Motor;
    type Tilt: TiltSensor;
    type Distance: DistanceSensor;

    /// Tries to open the device on `port`. `None` when nothing usable is attached.
    fn connect_motor(&mut self, port: usize) -> Option<Self::Motor>;
    fn connect_tilt(&mut self, port: usize) -> Option<Self::Tilt>;
    fn connect_distance(&mut self, port: usize) -> Option<Self::Distance>;
}

/// Connectionless broadcast radio. Every node transmits on its own channel
/// and may observe any other.
pub trait Radio {
    /// Replaces the payload this node advertises.
    fn broadcast(&mut self, payload: &[u8]);
    /// Newest datagram on `channel` not returned before, if any.
    fn observe(&mut self, channel: u8) -> Option<Frame>;
}
