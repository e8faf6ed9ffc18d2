//! luxloop — closed-loop light-intensity control.
//!
//! PID regulation of dimmable light zones against intensity sensors, with
//! a relay-free auto-tuner, online gain adaptation and multi-zone
//! coordination.  The control core in [`control`] is pure and takes time
//! as an argument; [`app`] orchestrates it behind port traits and
//! [`adapters`] provides host-side implementations of those ports.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod sim;
