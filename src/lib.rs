//! Discrete-time PID control core.
//!
//! [`control::pid::PidController`] is the numeric core: no I/O, no heap,
//! no locks.  Around it sit the configuration boundary ([`config`]) that
//! maps a block-style parameter set onto the core, and a caller-side
//! supervisor ([`control::supervisor`]) for manual/automatic switching and
//! rejected-tick handling.

#![deny(unused_must_use)]

pub mod config;
pub mod control;
pub mod error;

pub use control::pid::{IntegratorMethod, OutputLimits, PidController, PidOptions};
pub use error::{ConfigError, Error, InputError, Result};
