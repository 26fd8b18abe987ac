//! Hardware drivers and low-level helpers.
//!
//! Everything here is either `cfg(target_os = "espidf")`-gated raw ESP-IDF
//! access with a host stub, or a thin adapter mapping a port trait onto
//! those helpers.

pub mod hw_init;
pub mod onewire;
pub mod pwm_out;
pub mod relay_out;
pub mod task_pin;
