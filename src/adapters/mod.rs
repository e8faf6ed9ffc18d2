//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                        |
//! |------------|--------------|------------------------------------|
//! | `log_sink` | EventSink    | `log` facade (stderr on the host)  |
//! | `pwm`      | DimmerPort   | any `embedded-hal` PWM channel     |
//! | `store`    | ConfigPort   | JSON file / in-memory blob         |
//! | `time`     | Clock        | `std::time::Instant` / manual      |
//!
//! The simulated plant in [`crate::sim`] implements `SensorPort` and
//! `DimmerPort` together for closed-loop runs without hardware.

pub mod log_sink;
pub mod pwm;
pub mod store;
pub mod time;
