//! Application core — orchestration, zero I/O.
//!
//! The [`service::LightingService`] wires the control loops in
//! [`crate::control`] to the outside world.  All interaction with sensors,
//! dimmers, clocks and storage happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
