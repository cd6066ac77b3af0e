//! Infrastructure Layer - External Technology Stack
//!
//! Concrete pieces that touch the outside world: configuration files and
//! RNG seeding.

pub mod config;
pub mod random;

pub use config::{load_config, parse_config};
pub use random::{rng_for, time_seed};
