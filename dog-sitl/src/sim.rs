// sim.rs
//! Simulated hubs and port devices. Each hub's state sits behind a mutex so
//! the scenario thread can press buttons and pull cables while the node runs.
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::sleep;

use dog_core::config::{TICK_PERIOD, TILT_SATURATION};
use dog_core::display::{BLANK, Hsv, Icon};
use dog_core::topology::{NodeSpec, PortKind};
use dog_core::{Buttons, DeviceError, DistanceSensor, Hub, Motor, PortHub, TiltSensor, debug};
use embassy_time::Duration;

/// Speed limit of every simulated motor (degrees per second).
pub const MOTOR_SPEED_LIMIT: i32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Motor,
    Tilt,
    Distance,
}

#[derive(Debug, Clone, Copy)]
pub struct SimPort {
    pub device: Option<Device>,
    pub plugged: bool,
    /// Degrees per second while running free.
    pub speed: i32,
    /// Held angle, when tracking.
    pub target: Option<i32>,
    pub angle: i32,
    pub distance: i16,
}

impl SimPort {
    const EMPTY: SimPort = SimPort {
        device: None,
        plugged: false,
        speed: 0,
        target: None,
        angle: 0,
        distance: 0,
    };

    fn usable(&self, device: Device) -> bool {
        self.plugged && self.device == Some(device)
    }

    /// Moves the shaft by one tick worth of motion.
    fn advance(&mut self) {
        let ticks_per_second = (1_000 / TICK_PERIOD.as_millis().max(1)) as i32;
        let step = MOTOR_SPEED_LIMIT / ticks_per_second;
        match self.target {
            Some(target) => self.angle += (target - self.angle).clamp(-step, step),
            None => self.angle += self.speed / ticks_per_second,
        }
    }
}

#[derive(Debug)]
pub struct SimState {
    pub name: &'static str,
    pub buttons: Buttons,
    pub battery_mv: u16,
    pub acceleration: [i32; 3],
    pub orientation: (i16, i16),
    /// True body tilt in degrees; the sensor clamps it.
    pub tilt: [i16; 3],
    pub ports: [SimPort; 4],
    pub light: Hsv,
    pub icon: Icon,
    pub beeps: u32,
    pub powered: bool,
}

impl SimState {
    pub fn for_node(node: &NodeSpec) -> Self {
        let mut ports = [SimPort::EMPTY; 4];
        for (port, kind) in ports.iter_mut().zip(node.ports) {
            port.plugged = true;
            port.device = Some(match kind {
                PortKind::Motor { .. } => Device::Motor,
                PortKind::Tilt => Device::Tilt,
                PortKind::Distance => Device::Distance,
            });
            port.distance = 250;
        }
        Self {
            name: node.name,
            buttons: Buttons::NONE,
            battery_mv: 7_800,
            acceleration: [0, 0, -1_000],
            orientation: (0, 0),
            tilt: [0; 3],
            ports,
            light: Hsv::OFF,
            icon: BLANK,
            beeps: 0,
            powered: true,
        }
    }
}

pub type SharedState = Arc<Mutex<SimState>>;

/// A poisoned lock only means another thread panicked mid-update; the
/// state itself is still usable for the simulation.
pub fn lock(state: &SharedState) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SimHub {
    state: SharedState,
}

impl SimHub {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn connect(&self, port: usize, device: Device) -> Option<SimDevice> {
        let usable = lock(&self.state).ports.get(port)?.usable(device);
        usable.then(|| SimDevice {
            state: Arc::clone(&self.state),
            port,
            device,
        })
    }
}

impl Hub for SimHub {
    fn battery_mv(&mut self) -> u16 {
        lock(&self.state).battery_mv
    }

    fn buttons(&mut self) -> Buttons {
        lock(&self.state).buttons
    }

    fn acceleration(&mut self) -> [i32; 3] {
        lock(&self.state).acceleration
    }

    fn orientation(&mut self) -> (i16, i16) {
        lock(&self.state).orientation
    }

    fn set_light(&mut self, color: Hsv) {
        lock(&self.state).light = color;
    }

    fn set_icons(&mut self, icon: &Icon) {
        lock(&self.state).icon = *icon;
    }

    fn beep(&mut self, frequency_hz: u16, duration_ms: u16) {
        let mut state = lock(&self.state);
        state.beeps += 1;
        debug!("{}: beep {} Hz for {} ms", state.name, frequency_hz, duration_ms);
    }

    fn pause(&mut self, duration: Duration) {
        sleep(std::time::Duration::from_micros(duration.as_micros()));
    }

    fn power_off(&mut self) {
        let mut state = lock(&self.state);
        state.powered = false;
        state.light = Hsv::OFF;
    }
}

impl PortHub for SimHub {
    type Motor = SimDevice;
    type Tilt = SimDevice;
    type Distance = SimDevice;

    fn connect_motor(&mut self, port: usize) -> Option<SimDevice> {
        self.connect(port, Device::Motor)
    }

    fn connect_tilt(&mut self, port: usize) -> Option<SimDevice> {
        self.connect(port, Device::Tilt)
    }

    fn connect_distance(&mut self, port: usize) -> Option<SimDevice> {
        self.connect(port, Device::Distance)
    }
}

/// Handle to one simulated port. Fails as soon as the cable is pulled.
pub struct SimDevice {
    state: SharedState,
    port: usize,
    device: Device,
}

impl SimDevice {
    fn with<R>(&mut self, f: impl FnOnce(&mut SimPort, [i16; 3]) -> R) -> Result<R, DeviceError> {
        let mut state = lock(&self.state);
        let tilt = state.tilt;
        let port = state.ports.get_mut(self.port).ok_or(DeviceError::Disconnected)?;
        if !port.usable(self.device) {
            return Err(DeviceError::Disconnected);
        }
        Ok(f(port, tilt))
    }
}

impl Motor for SimDevice {
    fn run(&mut self, speed: i32) -> Result<(), DeviceError> {
        self.with(|port, _| {
            port.target = None;
            port.speed = speed.clamp(-MOTOR_SPEED_LIMIT, MOTOR_SPEED_LIMIT);
        })
    }

    fn track_target(&mut self, angle: i32) -> Result<(), DeviceError> {
        self.with(|port, _| {
            port.speed = 0;
            port.target = Some(angle);
        })
    }

    fn reset_angle(&mut self, angle: i32) -> Result<(), DeviceError> {
        self.with(|port, _| {
            port.target = None;
            port.angle = angle;
        })
    }

    fn brake(&mut self) -> Result<(), DeviceError> {
        self.with(|port, _| {
            port.target = None;
            port.speed = 0;
        })
    }

    // Sampled once per tick, so this is where the shaft moves.
    fn angle(&mut self) -> Result<i32, DeviceError> {
        self.with(|port, _| {
            port.advance();
            port.angle
        })
    }

    fn speed_limit(&mut self) -> Result<i32, DeviceError> {
        self.with(|_, _| MOTOR_SPEED_LIMIT)
    }
}

impl TiltSensor for SimDevice {
    fn read(&mut self) -> Result<[i16; 3], DeviceError> {
        self.with(|_, tilt| tilt.map(|axis| axis.clamp(-TILT_SATURATION, TILT_SATURATION)))
    }
}

impl DistanceSensor for SimDevice {
    fn distance(&mut self) -> Result<i16, DeviceError> {
        self.with(|port, _| port.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dog_core::topology::NODES;

    fn leg() -> (SharedState, SimHub) {
        let state = Arc::new(Mutex::new(SimState::for_node(&NODES[1])));
        let hub = SimHub::new(Arc::clone(&state));
        (state, hub)
    }

    #[test]
    fn test_ports_follow_topology() {
        let (_, mut hub) = leg();
        assert!(hub.connect_motor(0).is_some());
        assert!(hub.connect_tilt(1).is_some());
        assert!(hub.connect_distance(2).is_some());
        assert!(hub.connect_motor(1).is_none());
        assert!(hub.connect_motor(3).is_none());
    }

    #[test]
    fn test_unplugged_device_fails() {
        let (state, mut hub) = leg();
        let mut motor = hub.connect_motor(0).unwrap();
        assert!(motor.run(100).is_ok());
        lock(&state).ports[0].plugged = false;
        assert_eq!(motor.angle(), Err(DeviceError::Disconnected));
        assert!(hub.connect_motor(0).is_none());
    }

    #[test]
    fn test_motor_moves_per_sample() {
        let (_, mut hub) = leg();
        let mut motor = hub.connect_motor(0).unwrap();
        motor.run(500).unwrap();
        assert_eq!(motor.angle(), Ok(5));
        assert_eq!(motor.angle(), Ok(10));

        motor.track_target(12).unwrap();
        assert_eq!(motor.angle(), Ok(12));
        motor.brake().unwrap();
        assert_eq!(motor.angle(), Ok(12));
    }

    #[test]
    fn test_tilt_sensor_saturates() {
        let (state, mut hub) = leg();
        lock(&state).tilt = [60, -10, -90];
        let mut tilt = hub.connect_tilt(1).unwrap();
        assert_eq!(tilt.read(), Ok([45, -10, -45]));
    }
}
