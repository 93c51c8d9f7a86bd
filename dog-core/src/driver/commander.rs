// driver/commander.rs
use embassy_time::Instant;

use super::{base_status, is_transition, shutdown_sequence};
use crate::config::{BEEP_HZ, BEEP_MS, DISPLAY_WINDOW, JOG_GAIN_PER_DEGREE, RECORD_EVERY_FRAMES, SPEED_FULL_SCALE, WATCHDOG_WINDOW};
use crate::display::{StatusPattern, commander_icon, status_light};
use crate::hardware::{Hub, Radio};
use crate::liveness::LivenessTracker;
use crate::log::{CommandRecord, LogEntry, ModeRecord, TelemetryRecord, record};
use crate::mode::{ModeEvent, ModeMachine};
use crate::packet::{CommandPacket, TelemetryPacket, decode_telemetry};
use crate::status::StatusFlags;
use crate::topology::{COMMANDER, NODES, PEER_COUNT, peers};
use crate::types::{Mode, NodeAddress, Opcode, TickOutcome};
use crate::{debug, info, trace, warn};

/// Entries of the commander's SELECT menu, cycled with left/right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuEntry {
    Overview,
    /// Jog one joint of leg 1-4 (mount, top or bottom by roll).
    JogLeg(u8),
    /// Jog one motor of body hub 5 or 6 (by roll).
    JogBody(u8),
    Return,
    Shutdown,
}

pub const MENU: [MenuEntry; 9] = [
    MenuEntry::Overview,
    MenuEntry::JogLeg(1),
    MenuEntry::JogLeg(2),
    MenuEntry::JogLeg(3),
    MenuEntry::JogLeg(4),
    MenuEntry::JogBody(5),
    MenuEntry::JogBody(6),
    MenuEntry::Return,
    MenuEntry::Shutdown,
];

/// Where the menu starts after every engage.
pub const MENU_RETURN: usize = 7;

impl MenuEntry {
    /// Command slot a jog entry drives for the given roll (degrees).
    /// Tilting the commander sideways picks the joint, pitch sets the speed.
    pub fn jog_slot(self, roll: i16) -> Option<usize> {
        match self {
            MenuEntry::JogLeg(leg @ 1..=4) => {
                let joint = if roll < -15 {
                    2
                } else if roll > 15 {
                    0
                } else {
                    1
                };
                Some(joint + 3 * (leg as usize - 1))
            }
            MenuEntry::JogBody(body @ 5..=6) => {
                let motor = if roll < -20 {
                    1
                } else if roll < 0 {
                    0
                } else if roll < 20 {
                    3
                } else {
                    4
                };
                Some(motor + 6 * (body as usize - 5))
            }
            _ => None,
        }
    }
}

/// Jog speed (per-mille) for a commander pitch in degrees.
pub fn jog_speed(pitch: i16) -> i16 {
    (pitch as i32 * JOG_GAIN_PER_DEGREE).clamp(-SPEED_FULL_SCALE, SPEED_FULL_SCALE) as i16
}

/// The node that broadcasts commands and watches every peer's telemetry.
pub struct CommanderNode<H: Hub, R: Radio> {
    hub: H,
    radio: R,
    mode: ModeMachine,
    liveness: LivenessTracker<{ NODES.len() }>,
    telemetry: [Option<TelemetryPacket>; NODES.len()],
    peers_fresh: [bool; NODES.len()],
    selection: usize,
    last_sent: Option<CommandPacket>,
    status: StatusFlags,
}

impl<H: Hub, R: Radio> CommanderNode<H, R> {
    pub fn new(hub: H, radio: R) -> Self {
        Self {
            hub,
            radio,
            mode: ModeMachine::new(),
            liveness: LivenessTracker::new(),
            telemetry: core::array::from_fn(|_| None),
            peers_fresh: [false; NODES.len()],
            selection: MENU_RETURN,
            last_sent: None,
            status: StatusFlags::empty(),
        }
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let event = self.mode.update(self.hub.buttons());
        if is_transition(event) {
            debug!("commander: {:?} -> {:?}", event, self.mode.mode);
            record(LogEntry::Mode(ModeRecord::new(now, COMMANDER.address, self.mode.mode, self.mode.frame)));
        }

        // Something goes out every tick; silence is how actuators detect a lost commander.
        match event {
            ModeEvent::Idle => self.send_command(now, CommandPacket::keep_alive()),
            ModeEvent::Engaged => {
                self.hold(now);
                self.hub.beep(BEEP_HZ, BEEP_MS);
                self.selection = MENU_RETURN;
            }
            ModeEvent::Previous => {
                self.selection = (self.selection + MENU.len() - 1) % MENU.len();
                self.hold(now);
            }
            ModeEvent::Next => {
                self.selection = (self.selection + 1) % MENU.len();
                self.hold(now);
            }
            ModeEvent::Confirm if self.selection() == MenuEntry::Shutdown => {
                info!("commander: shutting the dog down");
                self.send_command(now, CommandPacket::shutdown());
                shutdown_sequence(&mut self.hub);
                return TickOutcome::Shutdown;
            }
            ModeEvent::Manual => self.jog(now),
            _ => self.hold(now),
        }

        self.listen(now);
        self.status = self.compute_status(now);
        self.show(now);
        self.mode.advance_frame();
        TickOutcome::Continue
    }

    /// Broadcasts `packet` on the command channel, replacing the previous one.
    pub fn send_command(&mut self, now: Instant, packet: CommandPacket) {
        self.radio.broadcast(&packet.encode());
        if packet.opcode != Opcode::KeepAlive && self.last_sent != Some(packet) {
            record(LogEntry::Command(CommandRecord::new(now, COMMANDER.address, &packet)));
        }
        self.last_sent = Some(packet);
    }

    fn jog(&mut self, now: Instant) {
        let (pitch, roll) = self.hub.orientation();
        match self.selection().jog_slot(roll) {
            Some(slot) => {
                let packet = CommandPacket::new(Opcode::SetSpeed).with_slot(slot, jog_speed(pitch));
                self.send_command(now, packet);
            }
            None => self.hold(now),
        }
    }

    /// Outside IDLE and jogging: every motor stopped.
    fn hold(&mut self, now: Instant) {
        self.send_command(now, CommandPacket::new(Opcode::SetSpeed));
    }

    /// Collects telemetry. A peer only counts as alive when it reports itself
    /// healthy and commanded.
    fn listen(&mut self, now: Instant) {
        let record_now = self.mode.frame % RECORD_EVERY_FRAMES == 0;
        for peer in peers() {
            let index = peer.address.index();
            if let Some(frame) = self.radio.observe(peer.address.channel()) {
                match decode_telemetry(&frame, peer.telemetry_fields()) {
                    Ok(packet) => {
                        if packet.status.bits() & peer.health_mask() == peer.healthy_status() {
                            self.liveness.record_seen(index, now);
                        }
                        if record_now {
                            record(LogEntry::Telemetry(TelemetryRecord::new(now, peer.address, &packet)));
                        }
                        self.telemetry[index] = Some(packet);
                    }
                    Err(e) => {
                        trace!("commander: bad frame from {}: {:?}", peer.name, e);
                    }
                }
            }

            let fresh = self.liveness.is_fresh(index, now, WATCHDOG_WINDOW);
            if fresh != self.peers_fresh[index] {
                if fresh {
                    info!("commander: {} healthy", peer.name);
                } else {
                    warn!("commander: {} lost", peer.name);
                }
                self.peers_fresh[index] = fresh;
            }
        }
    }

    fn compute_status(&mut self, now: Instant) -> StatusFlags {
        let mut status = base_status(&mut self.hub, !self.mode.is_idle());
        let all_fresh = self
            .liveness
            .all_fresh(peers().iter().map(|p| p.address.index()), now, WATCHDOG_WINDOW);
        status.set(StatusFlags::FRESH, all_fresh);
        status
    }

    fn show(&mut self, now: Instant) {
        let pattern = StatusPattern::for_node(COMMANDER);
        let mut heard = [false; PEER_COUNT];
        for (slot, peer) in heard.iter_mut().zip(peers()) {
            *slot = self.liveness.is_fresh(peer.address.index(), now, DISPLAY_WINDOW);
        }
        self.hub.set_light(status_light(self.status, pattern, self.mode.frame));
        self.hub
            .set_icons(&commander_icon(self.status, pattern, self.selection, &heard));
    }

    pub fn selection(&self) -> MenuEntry {
        MENU[self.selection % MENU.len()]
    }

    /// Latest telemetry from `address`, healthy or not.
    pub fn telemetry(&self, address: NodeAddress) -> Option<&TelemetryPacket> {
        self.telemetry.get(address.index())?.as_ref()
    }

    pub fn is_peer_fresh(&self, address: NodeAddress, now: Instant) -> bool {
        self.liveness.is_fresh(address.index(), now, WATCHDOG_WINDOW)
    }

    pub fn status(&self) -> StatusFlags {
        self.status
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode
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
