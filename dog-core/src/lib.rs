// lib.rs
//! Control core of a modular robot dog: one commander hub broadcasting
//! fixed-layout commands, actuator hubs answering with telemetry.
#![no_std]

mod macros;

pub mod config;
pub mod datacells;
pub mod display;
pub mod driver;
pub mod estimator;
pub mod handle;
pub mod hardware;
pub mod liveness;
pub mod log;
pub mod mode;
pub mod packet;
pub mod status;
pub mod topology;
pub mod types;

pub use driver::{ActuatorNode, CommanderNode, MenuEntry};
pub use estimator::{SmoothingBuffer, TiltEstimator};
pub use handle::Handle;
pub use hardware::{DeviceError, DistanceSensor, Hub, Motor, PortHub, Radio, TiltSensor};
pub use liveness::LivenessTracker;
pub use mode::{Buttons, ModeEvent, ModeMachine};
pub use packet::*;
pub use status::StatusFlags;
pub use topology::{NODES, NodeSpec, PortKind};
pub use types::*;
