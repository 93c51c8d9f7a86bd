// config.rs
// Build-time tuning shared by every node. All nodes must be flashed with the
// same values or the watchdog and filter behaviour diverge between hubs.
use embassy_time::Duration;

/// Period of one control loop iteration. The tilt filter gains assume it.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

/// Maximum age of a command (actuator) or a healthy report (commander)
/// before its source counts as stale.
pub const WATCHDOG_WINDOW: Duration = Duration::from_millis(100);

/// Wider window used only for the commander's per-peer icons.
pub const DISPLAY_WINDOW: Duration = Duration::from_millis(200);

/// Battery voltage (mV) above which the battery-ok flag is set.
pub const BATTERY_OK_MV: u16 = 7_000;

/// Frame counter wraps at this value (one animation cycle).
pub const FRAME_PERIOD: u16 = 1_000;

/// Actuator self-test bands on the frame counter: run forward, run backward, shut down.
pub const SELF_TEST_FORWARD_BEFORE: u16 = 250;
pub const SELF_TEST_BACKWARD_BEFORE: u16 = 500;
pub const SELF_TEST_SHUTDOWN_BEFORE: u16 = 750;

/// Speed targets are per-mille of the motor's speed limit.
pub const SPEED_FULL_SCALE: i32 = 1_000;

/// One slot / telemetry angle LSB in motor degrees.
pub const ANGLE_DEGREES_PER_LSB: i32 = 10;

/// Commander jog: slot speed per degree of pitch.
pub const JOG_GAIN_PER_DEGREE: i32 = 30;

/// Depth of the acceleration moving average.
pub const SMOOTHING_DEPTH: usize = 10;

/// Raw tilt readings are pinned at +/- this value when truncated.
pub const TILT_SATURATION: i16 = 45;

/// Fixed position gain of the tilt predictor/corrector (per tick).
pub const TILT_GAIN_POSITION: f32 = 0.133;

/// Fixed velocity gain of the tilt predictor/corrector (per tick).
pub const TILT_GAIN_VELOCITY: f32 = 0.00931;

/// Tilt telemetry is sent in tenths of a degree.
pub const TILT_FIELD_SCALE: f32 = 10.0;

/// Confirmation beep (engage and shutdown).
pub const BEEP_HZ: u16 = 1_000;
pub const BEEP_MS: u16 = 20;

/// Shutdown sequence: this many beeps, each followed by a pause.
pub const SHUTDOWN_BEEPS: u8 = 4;
pub const SHUTDOWN_PAUSE: Duration = Duration::from_millis(100);

/// The commander records peer telemetry once every this many frames.
pub const RECORD_EVERY_FRAMES: u16 = 10;
