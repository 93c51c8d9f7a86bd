// driver/actuator.rs
use embassy_time::Instant;

use super::{angle_field, base_status, command_motor, is_transition, shutdown_sequence};
use crate::config::{
    SELF_TEST_BACKWARD_BEFORE, SELF_TEST_FORWARD_BEFORE, SELF_TEST_SHUTDOWN_BEFORE, SMOOTHING_DEPTH, SPEED_FULL_SCALE,
    WATCHDOG_WINDOW,
};
use crate::display::{StatusPattern, status_light};
use crate::estimator::{SmoothingBuffer, TiltEstimator};
use crate::handle::Handle;
use crate::hardware::{DistanceSensor, Motor, PortHub, Radio, TiltSensor};
use crate::liveness::LivenessTracker;
use crate::log::{CommandRecord, LogEntry, ModeRecord, record};
use crate::mode::{ModeEvent, ModeMachine};
use crate::packet::{CommandPacket, MAX_TELEMETRY_FIELDS, PacketError, decode_command, encode_telemetry, xor_checksum};
use crate::status::StatusFlags;
use crate::topology::{EchoMode, NodeSpec, PortKind, TopologyError};
use crate::types::{Mode, NodeAddress, Opcode, TickOutcome};
use crate::{debug, info, trace, warn};

// Actuators only track the commander.
const COMMANDER_SOURCE: usize = 0;

/// A hub port as the actuator sees it.
pub enum PortDevice<H: PortHub> {
    Motor { slot: u8, handle: Handle<H::Motor> },
    Tilt(Handle<H::Tilt>),
    Distance(Handle<H::Distance>),
}

impl<H: PortHub> PortDevice<H> {
    fn new(port: usize, kind: PortKind) -> Self {
        match kind {
            PortKind::Motor { slot } => PortDevice::Motor {
                slot,
                handle: Handle::new(port),
            },
            PortKind::Tilt => PortDevice::Tilt(Handle::new(port)),
            PortKind::Distance => PortDevice::Distance(Handle::new(port)),
        }
    }

    pub fn is_bound(&self) -> bool {
        match self {
            PortDevice::Motor { handle, .. } => handle.is_bound(),
            PortDevice::Tilt(handle) => handle.is_bound(),
            PortDevice::Distance(handle) => handle.is_bound(),
        }
    }
}

/// Hub that follows the commander: applies the slots it owns, reports its
/// sensors and stops its motors when the commander goes quiet.
pub struct ActuatorNode<H: PortHub, R: Radio> {
    node: &'static NodeSpec,
    hub: H,
    radio: R,
    mode: ModeMachine,
    liveness: LivenessTracker<1>,
    devices: heapless::Vec<PortDevice<H>, { StatusFlags::MAX_PORTS }>,
    /// Last good reading per port, in telemetry units.
    readings: [[i16; 3]; StatusFlags::MAX_PORTS],
    acceleration: SmoothingBuffer<SMOOTHING_DEPTH, 3>,
    tilt: TiltEstimator,
    echo: u8,
    last_applied: Option<CommandPacket>,
    commanded: bool,
    status: StatusFlags,
}

impl<H: PortHub, R: Radio> ActuatorNode<H, R> {
    pub fn new(node: &'static NodeSpec, hub: H, radio: R) -> Result<Self, TopologyError> {
        if node.is_commander() {
            return Err(TopologyError::RoleMismatch { address: node.address.0 });
        }
        let mut devices = heapless::Vec::new();
        for (port, kind) in node.ports.iter().enumerate() {
            devices
                .push(PortDevice::new(port, *kind))
                .map_err(|_| TopologyError::TooManyPorts { address: node.address.0 })?;
        }
        Ok(Self {
            node,
            hub,
            radio,
            mode: ModeMachine::new(),
            liveness: LivenessTracker::new(),
            devices,
            readings: [[0; 3]; StatusFlags::MAX_PORTS],
            acceleration: SmoothingBuffer::new(),
            tilt: TiltEstimator::new(),
            echo: 0,
            last_applied: None,
            commanded: false,
            status: StatusFlags::empty(),
        })
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let event = self.mode.update(self.hub.buttons());
        if is_transition(event) {
            debug!("{}: {:?} -> {:?}", self.node.name, event, self.mode.mode);
            record(LogEntry::Mode(ModeRecord::new(now, self.node.address, self.mode.mode, self.mode.frame)));
        }

        let outcome = match event {
            // Released has already put the node back in IDLE.
            ModeEvent::Idle | ModeEvent::Released => self.poll_bus(now),
            // Hand control over to the local user with the motors stopped.
            ModeEvent::Engaged => self.apply_local(now, CommandPacket::new(Opcode::SetSpeed)),
            ModeEvent::Confirm => self.self_test(now),
            _ => TickOutcome::Continue,
        };
        if outcome == TickOutcome::Shutdown {
            shutdown_sequence(&mut self.hub);
            return TickOutcome::Shutdown;
        }

        self.check_watchdog(now, event);
        self.sample();
        self.status = self.compute_status(now);
        self.transmit();
        self.hub
            .set_light(status_light(self.status, StatusPattern::for_node(self.node), self.mode.frame));
        self.mode.advance_frame();
        TickOutcome::Continue
    }

    fn poll_bus(&mut self, now: Instant) -> TickOutcome {
        let Some(frame) = self.radio.observe(NodeAddress::COMMANDER.channel()) else {
            return TickOutcome::Continue;
        };
        match decode_command(&frame) {
            Ok(packet) => {
                self.liveness.record_seen(COMMANDER_SOURCE, now);
                self.apply(now, &packet, &frame)
            }
            Err(PacketError::UnknownOpcode(raw)) => {
                // Newer commander: proof of life, nothing to do.
                self.liveness.record_seen(COMMANDER_SOURCE, now);
                self.echo = match self.node.echo {
                    EchoMode::LastOpcode => raw,
                    EchoMode::Checksum => xor_checksum(&frame),
                };
                debug!("{}: ignoring opcode {}", self.node.name, raw);
                TickOutcome::Continue
            }
            Err(e) => {
                trace!("{}: dropped frame {:?}", self.node.name, e);
                TickOutcome::Continue
            }
        }
    }

    /// Runs a locally generated command as if it came from the bus, without
    /// counting it as proof of life from the commander.
    fn apply_local(&mut self, now: Instant, packet: CommandPacket) -> TickOutcome {
        let frame = packet.encode();
        self.apply(now, &packet, &frame)
    }

    fn apply(&mut self, now: Instant, packet: &CommandPacket, frame: &[u8]) -> TickOutcome {
        self.echo = match self.node.echo {
            EchoMode::LastOpcode => packet.opcode as u8,
            EchoMode::Checksum => xor_checksum(frame),
        };

        let window = self.node.window.first as usize..self.node.window.end();
        let changed = match &self.last_applied {
            Some(last) => last.opcode != packet.opcode || last.slice(window.clone()) != packet.slice(window),
            None => true,
        };
        if changed && packet.opcode != Opcode::KeepAlive {
            record(LogEntry::Command(CommandRecord::new(now, self.node.address, packet)));
        }
        self.last_applied = Some(*packet);

        match packet.opcode {
            Opcode::KeepAlive => TickOutcome::Continue,
            Opcode::Shutdown => {
                info!("{}: shutdown requested", self.node.name);
                TickOutcome::Shutdown
            }
            opcode => {
                self.drive_motors(opcode, packet);
                TickOutcome::Continue
            }
        }
    }

    fn drive_motors(&mut self, opcode: Opcode, packet: &CommandPacket) {
        let hub = &mut self.hub;
        for device in self.devices.iter_mut() {
            let PortDevice::Motor { slot, handle } = device else {
                continue;
            };
            let target = packet.slot(*slot as usize);
            if let Err(e) = handle.access(|port| hub.connect_motor(port), |m| command_motor(m, opcode, target)) {
                debug!("{}: motor on port {}: {:?}", self.node.name, handle.port(), e);
            }
        }
    }

    /// Confirm in SELECT: what happens depends on how long the user waited.
    fn self_test(&mut self, now: Instant) -> TickOutcome {
        let frame = self.mode.frame;
        let speed = if frame < SELF_TEST_FORWARD_BEFORE {
            SPEED_FULL_SCALE as i16
        } else if frame < SELF_TEST_BACKWARD_BEFORE {
            -SPEED_FULL_SCALE as i16
        } else if frame < SELF_TEST_SHUTDOWN_BEFORE {
            return self.apply_local(now, CommandPacket::shutdown());
        } else {
            return TickOutcome::Continue;
        };

        let mut packet = CommandPacket::new(Opcode::SetSpeed);
        for kind in self.node.ports {
            if let PortKind::Motor { slot } = kind {
                packet = packet.with_slot(*slot as usize, speed);
            }
        }
        info!("{}: self-test at {}", self.node.name, speed);
        self.apply_local(now, packet)
    }

    /// Safe stop: brake once on the tick the commander turns stale while
    /// IDLE, and on every return to IDLE without a live commander. The
    /// fresh/stale edge is only tracked in IDLE.
    fn check_watchdog(&mut self, now: Instant, event: ModeEvent) {
        if !self.mode.is_idle() {
            return;
        }
        let fresh = self.liveness.is_fresh(COMMANDER_SOURCE, now, WATCHDOG_WINDOW);
        let lost = self.commanded && !fresh;
        let unattended = event == ModeEvent::Released && !fresh;
        if lost || unattended {
            warn!("{}: commander lost, braking", self.node.name);
            self.drive_motors(Opcode::SetSpeed, &CommandPacket::new(Opcode::SetSpeed));
        }
        self.commanded = fresh;
    }

    fn sample(&mut self) {
        let accel = self.hub.acceleration();
        self.acceleration.push(accel);

        let hub = &mut self.hub;
        let tilt = &mut self.tilt;
        for (device, reading) in self.devices.iter_mut().zip(self.readings.iter_mut()) {
            match device {
                PortDevice::Motor { handle, .. } => {
                    if let Ok(angle) = handle.access(|port| hub.connect_motor(port), |m| m.angle()) {
                        reading[0] = angle_field(angle);
                    }
                }
                PortDevice::Tilt(handle) => {
                    if let Ok(raw) = handle.access(|port| hub.connect_tilt(port), |t| t.read()) {
                        if handle.take_rebound() {
                            tilt.reset();
                        }
                        tilt.update(raw);
                        *reading = tilt.estimate_fields();
                    }
                }
                PortDevice::Distance(handle) => {
                    if let Ok(distance) = handle.access(|port| hub.connect_distance(port), |d| d.distance()) {
                        reading[0] = distance;
                    }
                }
            }
        }
    }

    fn compute_status(&mut self, now: Instant) -> StatusFlags {
        let mut status = base_status(&mut self.hub, !self.mode.is_idle());
        for (port, device) in self.devices.iter().enumerate() {
            status.set(StatusFlags::port_bit(port), device.is_bound());
        }
        status.set(
            StatusFlags::FRESH,
            self.liveness.is_fresh(COMMANDER_SOURCE, now, WATCHDOG_WINDOW),
        );
        status
    }

    /// Acceleration, then every port's fields in port order.
    pub fn telemetry_fields(&self) -> heapless::Vec<i16, MAX_TELEMETRY_FIELDS> {
        let mut fields = heapless::Vec::new();
        for axis in self.acceleration.mean() {
            let _ = fields.push(axis.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }
        for (device, reading) in self.devices.iter().zip(self.readings.iter()) {
            let count = match device {
                PortDevice::Tilt(_) => 3,
                _ => 1,
            };
            // The topology check keeps every layout within a frame.
            let _ = fields.extend_from_slice(&reading[..count]);
        }
        fields
    }

    fn transmit(&mut self) {
        let fields = self.telemetry_fields();
        match encode_telemetry(self.status, self.echo, &fields) {
            Ok(frame) => self.radio.broadcast(&frame),
            Err(e) => {
                warn!("{}: telemetry not sent: {:?}", self.node.name, e);
            }
        }
    }

    pub fn node(&self) -> &'static NodeSpec {
        self.node
    }

    pub fn status(&self) -> StatusFlags {
        self.status
    }

    pub fn echo(&self) -> u8 {
        self.echo
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode
    }

    pub fn frame(&self) -> u16 {
        self.mode.frame
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut H {
        &mut self.hub
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}
