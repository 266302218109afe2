//! Keyswitch firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod power;
pub mod safety;

// Hardware-facing modules; on host builds they fall back to simulation
// cells and caller-supplied `embedded-hal` pins.
pub mod adapters;
pub mod drivers;
pub mod sensors;

// Host test builds link the std critical-section implementation that
// backs the command queue.
#[cfg(all(test, not(target_os = "espidf")))]
use critical_section as _;
