// mode/tests.rs
#[cfg(test)]
mod tests {
    use crate::config::FRAME_PERIOD;
    use crate::mode::{Buttons, ModeEvent, ModeMachine};
    use crate::types::Mode;

    const LEFT: Buttons = Buttons(Buttons::LEFT);
    const RIGHT: Buttons = Buttons(Buttons::RIGHT);
    const CENTER_LEFT: Buttons = Buttons(Buttons::CENTER | Buttons::LEFT);

    fn drive(sm: &mut ModeMachine, inputs: &[Buttons]) -> ModeEvent {
        let mut last = ModeEvent::Idle;
        for buttons in inputs {
            last = sm.update(*buttons);
            sm.advance_frame();
        }
        last
    }

    #[test]
    fn test_initial_state() {
        let sm = ModeMachine::new();
        assert_eq!(sm.mode, Mode::Idle);
        assert_eq!(sm.frame, 0);
        assert!(sm.is_idle());
    }

    #[test]
    fn test_idle_ignores_everything_but_primary() {
        let mut sm = ModeMachine::new();
        for buttons in [Buttons::NONE, LEFT, RIGHT, CENTER_LEFT] {
            assert_eq!(sm.update(buttons), ModeEvent::Idle);
            assert_eq!(sm.mode, Mode::Idle);
        }
    }

    #[test]
    fn test_full_cycle_back_to_idle() {
        let mut sm = ModeMachine::new();
        assert_eq!(sm.update(Buttons::PRIMARY), ModeEvent::Engaged);
        assert_eq!(sm.mode, Mode::Active);
        assert_eq!(sm.update(Buttons::PRIMARY), ModeEvent::Holding);
        assert_eq!(sm.update(Buttons::NONE), ModeEvent::Selected);
        assert_eq!(sm.mode, Mode::Select);
        assert_eq!(sm.update(Buttons::NONE), ModeEvent::Manual);
        assert_eq!(sm.update(Buttons::PRIMARY), ModeEvent::Confirm);
        assert_eq!(sm.mode, Mode::Inactive);
        assert_eq!(sm.update(Buttons::PRIMARY), ModeEvent::Holding);
        assert_eq!(sm.update(Buttons::NONE), ModeEvent::Released);
        assert_eq!(sm.mode, Mode::Idle);
    }

    #[test]
    fn test_left_and_right_go_back_to_active() {
        let mut sm = ModeMachine::new();
        drive(&mut sm, &[Buttons::PRIMARY, Buttons::NONE]);
        assert_eq!(sm.mode, Mode::Select);

        assert_eq!(sm.update(LEFT), ModeEvent::Previous);
        assert_eq!(sm.mode, Mode::Active);
        assert_eq!(sm.update(Buttons::NONE), ModeEvent::Selected);

        assert_eq!(sm.update(RIGHT), ModeEvent::Next);
        assert_eq!(sm.mode, Mode::Active);
        // Any button keeps ACTIVE, not just the primary one.
        assert_eq!(sm.update(RIGHT), ModeEvent::Holding);
        assert_eq!(sm.update(Buttons::NONE), ModeEvent::Selected);
    }

    #[test]
    fn test_chord_in_select_stays_manual() {
        let mut sm = ModeMachine::new();
        drive(&mut sm, &[Buttons::PRIMARY, Buttons::NONE]);
        assert_eq!(sm.update(CENTER_LEFT), ModeEvent::Manual);
        assert_eq!(sm.mode, Mode::Select);
    }

    #[test]
    fn test_inactive_only_holds_on_primary() {
        let mut sm = ModeMachine::new();
        drive(&mut sm, &[Buttons::PRIMARY, Buttons::NONE, Buttons::PRIMARY]);
        assert_eq!(sm.mode, Mode::Inactive);
        assert_eq!(sm.update(CENTER_LEFT), ModeEvent::Holding);
        assert_eq!(sm.update(LEFT), ModeEvent::Released);
        assert_eq!(sm.mode, Mode::Idle);
    }

    #[test]
    fn test_frame_counter_wraps() {
        let mut sm = ModeMachine::new();
        for _ in 0..FRAME_PERIOD - 1 {
            sm.advance_frame();
        }
        assert_eq!(sm.frame, FRAME_PERIOD - 1);
        sm.advance_frame();
        assert_eq!(sm.frame, 0);
    }

    #[test]
    fn test_holding_restarts_frame_counter() {
        let mut sm = ModeMachine::new();
        drive(&mut sm, &[Buttons::NONE; 40]);
        assert_eq!(sm.frame, 40);

        drive(&mut sm, &[Buttons::PRIMARY, Buttons::PRIMARY]);
        assert_eq!(sm.frame, 1);

        // Time spent in SELECT is what the self-test thresholds look at.
        drive(&mut sm, &[Buttons::NONE; 300]);
        assert_eq!(sm.mode, Mode::Select);
        assert_eq!(sm.frame, 301);
    }
}
