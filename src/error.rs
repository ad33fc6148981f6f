//! Unified error types for the PID core.
//!
//! Two failure kinds exist: a configuration that breaks the controller's
//! invariants (raised at construction, retune or config-load time), and an
//! input rejected at update time before it can reach the integral
//! accumulator: either non-finite itself, or finite but large enough that
//! the tick's arithmetic leaves the f64 range.  All variants are `Copy` so a control loop can
//! pass them around without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Gains, sample time, limits or filter settings are invalid.
    InvalidConfiguration(ConfigError),
    /// A setpoint or measurement handed to `update` was NaN or infinite,
    /// or drove the tick's arithmetic out of range.
    InvalidInput(InputError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(e) => write!(f, "invalid configuration: {e}"),
            Self::InvalidInput(e) => write!(f, "invalid input: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A proportional, integral or derivative gain is NaN or infinite.
    NonFiniteGain,
    /// Sample time is zero, negative, NaN or infinite.
    InvalidSampleTime,
    /// Sample time is set to "inherit" but no loop period was supplied.
    UnresolvedSampleTime,
    /// Lower output limit is above the upper one, or a bound is NaN.
    InvalidOutputLimits,
    /// Derivative filter coefficient is negative or non-finite.
    InvalidFilterCoefficient,
    /// The configuration document could not be parsed.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteGain => write!(f, "gain is not finite"),
            Self::InvalidSampleTime => write!(f, "sample time must be finite and > 0"),
            Self::UnresolvedSampleTime => {
                write!(f, "inherited sample time requires a loop period")
            }
            Self::InvalidOutputLimits => write!(f, "output limits inverted or NaN"),
            Self::InvalidFilterCoefficient => {
                write!(f, "filter coefficient must be finite and >= 0")
            }
            Self::Malformed => write!(f, "malformed configuration document"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfiguration(e)
    }
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    NonFiniteSetpoint,
    NonFiniteMeasurement,
    /// Operator output for manual mode is NaN or infinite.
    NonFiniteManualOutput,
    /// Inputs are finite but a term, the accumulator or the output
    /// overflowed to infinity or NaN.
    NumericOverflow,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteSetpoint => write!(f, "setpoint is not finite"),
            Self::NonFiniteMeasurement => write!(f, "measurement is not finite"),
            Self::NonFiniteManualOutput => write!(f, "manual output is not finite"),
            Self::NumericOverflow => write!(f, "inputs overflow the controller arithmetic"),
        }
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Self::InvalidInput(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_kind_and_cause() {
        let e: Error = ConfigError::InvalidSampleTime.into();
        assert_eq!(
            e.to_string(),
            "invalid configuration: sample time must be finite and > 0"
        );

        let e: Error = InputError::NonFiniteMeasurement.into();
        assert_eq!(e.to_string(), "invalid input: measurement is not finite");

        let e: Error = InputError::NumericOverflow.into();
        assert_eq!(
            e.to_string(),
            "invalid input: inputs overflow the controller arithmetic"
        );
    }

    #[test]
    fn converts_into_anyhow() {
        let e: anyhow::Error = Error::from(ConfigError::NonFiniteGain).into();
        assert!(e.to_string().contains("gain is not finite"));
    }
}
