// display.rs
use crate::config::FRAME_PERIOD;
use crate::status::StatusFlags;
use crate::topology::NodeSpec;

/// Light colour: hue in degrees, saturation and value in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hsv {
    pub h: u16,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const OFF: Hsv = Hsv { h: 0, s: 0, v: 0 };
    pub const WHITE: Hsv = Hsv { h: 0, s: 0, v: 100 };
}

/// Which status bits the light looks at and what "healthy" means for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPattern {
    pub mask: u8,
    /// Healthy and commanded (or, on the commander, all peers fresh).
    pub healthy: u8,
}

impl StatusPattern {
    pub const fn for_node(node: &NodeSpec) -> Self {
        Self {
            mask: node.health_mask() | StatusFlags::MANUAL,
            healthy: node.healthy_status(),
        }
    }
}

const HUE_COMMANDED: u16 = 240;
const HUE_UNCOMMANDED: u16 = 160;

/// Status light for one frame of the animation cycle.
///
/// Blue when healthy and commanded, cyan when healthy without a commander,
/// a hue stepping every quarter cycle in manual mode. Each cycle starts and
/// ends with a white flash followed by a short dark gap.
pub fn status_light(status: StatusFlags, pattern: StatusPattern, frame: u16) -> Hsv {
    let masked = status.bits() & pattern.mask;
    let mut color = Hsv { h: 0, s: 100, v: 0 };

    if masked == pattern.healthy {
        color.h = HUE_COMMANDED;
    } else if masked == pattern.healthy & !StatusFlags::FRESH {
        color.h = HUE_UNCOMMANDED;
    } else if status.manual() {
        color = Hsv {
            h: 10 + (frame / 250) * 30,
            s: 90,
            v: 100,
        };
    }

    let last = FRAME_PERIOD - 1;
    if frame < 10 || frame > last - 9 {
        return Hsv::WHITE;
    }
    if frame < 15 || frame > last - 14 {
        return Hsv::OFF;
    }
    if !status.manual() {
        color.v = breathing(frame);
    }
    color
}

// 20 + 2e-4 * (500 - frame)^2, in integer percent.
fn breathing(frame: u16) -> u8 {
    let d = 500 - frame as i32;
    (20 + d * d / 5_000).clamp(0, 100) as u8
}

/// 5x5 brightness matrix, percent per pixel.
pub type Icon = [[u8; 5]; 5];

pub const BLANK: Icon = [[0; 5]; 5];

/// Commander icons, indexed by menu entry: overview, legs 1-4 (one per
/// corner), front and rear body, return, shutdown. Entries 0-6 double as
/// the per-node icons of the overview.
pub const ICONS: [Icon; 9] = [
    [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 50, 100, 50, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
    [[100, 50, 0, 0, 0], [80, 50, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
    [[0, 0, 0, 50, 100], [0, 0, 0, 50, 80], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
    [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [80, 50, 0, 0, 0], [100, 50, 0, 0, 0]],
    [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 50, 80], [0, 0, 0, 50, 100]],
    [[0, 30, 0, 30, 0], [0, 50, 100, 50, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0]],
    [[0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 0, 0, 0, 0], [0, 50, 100, 50, 0], [0, 30, 0, 30, 0]],
    [[0, 60, 80, 60, 0], [60, 100, 0, 100, 60], [80, 0, 100, 0, 80], [60, 100, 0, 100, 60], [0, 60, 80, 60, 0]],
    [[0, 60, 80, 60, 0], [60, 20, 0, 20, 60], [80, 0, 0, 0, 80], [60, 20, 100, 20, 60], [0, 60, 100, 60, 0]],
];

/// Pixel-wise saturating sum.
pub fn overlay(base: &mut Icon, layer: &Icon) {
    for (row, layer_row) in base.iter_mut().zip(layer) {
        for (px, add) in row.iter_mut().zip(layer_row) {
            *px = px.saturating_add(*add).min(100);
        }
    }
}

/// Commander matrix: the whole dog while everything is fresh, the overview
/// plus every recently heard peer when running without command, the menu
/// entry while in manual mode.
pub fn commander_icon(status: StatusFlags, pattern: StatusPattern, selection: usize, peers_heard: &[bool]) -> Icon {
    let masked = status.bits() & pattern.mask;
    let mut icon = BLANK;
    if masked == pattern.healthy {
        for layer in ICONS.iter().take(1 + peers_heard.len()) {
            overlay(&mut icon, layer);
        }
    } else if masked == pattern.healthy & !StatusFlags::FRESH {
        overlay(&mut icon, &ICONS[0]);
        for (layer, _) in ICONS[1..].iter().zip(peers_heard).filter(|(_, heard)| **heard) {
            overlay(&mut icon, layer);
        }
    } else if status.manual() {
        if let Some(layer) = ICONS.get(selection) {
            icon = *layer;
        }
    }
    icon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{COMMANDER, NODES};

    const LEG: StatusPattern = StatusPattern::for_node(&NODES[1]);

    #[test]
    fn test_healthy_commanded_is_blue() {
        let status = StatusFlags(0b0010_0011);
        assert_eq!(status_light(status, LEG, 500).h, 240);
        // Tilt and distance presence do not matter.
        assert_eq!(status_light(StatusFlags(0b0010_1111), LEG, 500).h, 240);
    }

    #[test]
    fn test_healthy_uncommanded_is_cyan() {
        assert_eq!(status_light(StatusFlags(0b0000_0011), LEG, 500).h, 160);
    }

    #[test]
    fn test_missing_motor_is_dark_red() {
        let color = status_light(StatusFlags(0b0010_0001), LEG, 500);
        assert_eq!(color.h, 0);
        assert_eq!(color.v, 20);
    }

    #[test]
    fn test_manual_hue_steps_each_quarter() {
        let manual = StatusFlags(0b0110_0011);
        assert_eq!(status_light(manual, LEG, 100), Hsv { h: 10, s: 90, v: 100 });
        assert_eq!(status_light(manual, LEG, 300).h, 40);
        assert_eq!(status_light(manual, LEG, 600).h, 70);
        assert_eq!(status_light(manual, LEG, 900).h, 100);
    }

    #[test]
    fn test_cycle_boundaries_flash() {
        let status = StatusFlags(0b0010_0011);
        for frame in [0, 9, 991, 999] {
            assert_eq!(status_light(status, LEG, frame), Hsv::WHITE, "frame {}", frame);
        }
        for frame in [10, 14, 986, 990] {
            assert_eq!(status_light(status, LEG, frame), Hsv::OFF, "frame {}", frame);
        }
        assert_ne!(status_light(status, LEG, 15).v, 0);
    }

    #[test]
    fn test_breathing_curve() {
        assert_eq!(breathing(500), 20);
        assert_eq!(breathing(15), 67);
        assert_eq!(breathing(250), 32);
    }

    #[test]
    fn test_commander_icons() {
        let pattern = StatusPattern::for_node(COMMANDER);
        let heard = [true, false, false, false, false, true];

        let standalone = commander_icon(StatusFlags(0b0000_0001), pattern, 0, &heard);
        assert_eq!(standalone[0][0], 100);
        assert_eq!(standalone[0][4], 0);
        assert_eq!(standalone[4][2], 0);
        assert_eq!(standalone[2][2], 100);
        assert_eq!(standalone[1][2], 100);

        let manual = commander_icon(StatusFlags(0b0100_0001), pattern, 8, &heard);
        assert_eq!(manual, ICONS[8]);

        let everything = commander_icon(StatusFlags(0b0010_0001), pattern, 0, &heard);
        assert_eq!(everything[4][4], 100);
        assert_eq!(everything[4][1], 80);
    }
}
