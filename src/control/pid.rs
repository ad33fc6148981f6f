//! Discrete-time PID controller.
//!
//! Turns a setpoint/measurement pair into an actuator command once per
//! fixed sample period.  The integrator discretization, derivative
//! placement and filtering, output clamping and anti-windup are chosen at
//! construction through [`PidOptions`].
//!
//! ```text
//!  setpoint ──▶(+)── e ──┬──▶ kp·e ──────────────────────┐
//!              ▲(−)      └──▶ Σ ki·e·Ts (method) ─────────┤(+)
//!              │                                          ▼
//!  measurement ┴──▶ Δpv/Ts ──▶ LPF(N) ──▶ kd·(·) ───(−)──▶ clamp ──▶ command
//! ```
//!
//! [`PidController::update`] never allocates, never logs and runs in
//! constant time, so it can sit inside a fixed-period tick.  There is no
//! internal locking; callers that share an instance across threads must
//! serialize access themselves.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, InputError, Result};

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Discretization used for the integral term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegratorMethod {
    /// `I += ki·e·Ts`, applied before the output is formed.
    #[default]
    #[serde(rename = "Forward Euler")]
    ForwardEuler,
    /// `I += ki·e·Ts`, committed after the output is formed, so the output
    /// only depends on errors from previous ticks.
    #[serde(rename = "Backward Euler")]
    BackwardEuler,
    /// `I += ki·Ts·(e + e_prev)/2`, applied before the output is formed.
    #[serde(rename = "Trapezoidal")]
    Trapezoidal,
}

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    fn validate(&self) -> Result<()> {
        if self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::NonFiniteGain.into())
        }
    }
}

/// Inclusive `[min, max]` bounds on the controller output.
/// Either bound may be infinite; neither may be NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputLimits {
    pub min: f64,
    pub max: f64,
}

impl OutputLimits {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let limits = Self { min, max };
        limits.validate()?;
        Ok(limits)
    }

    fn validate(&self) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(ConfigError::InvalidOutputLimits.into());
        }
        Ok(())
    }
}

/// Structural options fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidOptions {
    /// Differentiate the measurement instead of the error, so setpoint
    /// steps do not kick the derivative term.
    pub derivative_on_measurement: bool,
    /// Derivative low-pass corner `N` (rad/s).  `0` disables filtering.
    pub filter_coefficient: f64,
    pub output_limits: Option<OutputLimits>,
    /// Drop the tick's integral increment whenever the output is clamped.
    pub anti_windup: bool,
    pub integrator: IntegratorMethod,
}

impl Default for PidOptions {
    fn default() -> Self {
        Self {
            derivative_on_measurement: true,
            filter_coefficient: 0.0,
            output_limits: None,
            anti_windup: true,
            integrator: IntegratorMethod::ForwardEuler,
        }
    }
}

impl PidOptions {
    fn validate(&self) -> Result<()> {
        if !self.filter_coefficient.is_finite() || self.filter_coefficient < 0.0 {
            return Err(ConfigError::InvalidFilterCoefficient.into());
        }
        if let Some(limits) = &self.output_limits {
            limits.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Logical controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerMode {
    /// Accumulators are zero; no update has run since construction or
    /// the last [`PidController::reset`].
    Reset,
    /// At least one update has run.
    Armed,
}

/// Snapshot of the controller's internal state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidState {
    pub integral: f64,
    pub last_measurement: f64,
    pub last_filtered_derivative: f64,
    pub integrator: IntegratorMethod,
    pub mode: ControllerMode,
}

/// Per-term breakdown of a single update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidTerms {
    pub proportional: f64,
    /// Integral contribution used for this tick's output.
    pub integral: f64,
    /// Derivative contribution; subtracted from the output.
    pub derivative: f64,
    pub unclamped: f64,
    pub output: f64,
    /// The output was clamped to one of the limits.
    pub saturated: bool,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Discrete-time PID controller with a fixed sample time.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    sample_time: f64,
    options: PidOptions,

    integral: f64,
    last_measurement: f64,
    last_error: f64,
    last_filtered_derivative: f64,
    mode: ControllerMode,
}

impl PidController {
    /// Build a controller.  `sample_time` is in seconds and must already be
    /// resolved by the caller: there is no "inherit" value here.
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
        sample_time: f64,
        options: PidOptions,
    ) -> Result<Self> {
        let gains = PidGains::new(kp, ki, kd);
        gains.validate()?;
        if !sample_time.is_finite() || sample_time <= 0.0 {
            return Err(ConfigError::InvalidSampleTime.into());
        }
        options.validate()?;

        Ok(Self {
            gains,
            sample_time,
            options,
            integral: 0.0,
            last_measurement: 0.0,
            last_error: 0.0,
            last_filtered_derivative: 0.0,
            mode: ControllerMode::Reset,
        })
    }

    /// Run one control tick and return the actuator command.
    pub fn update(&mut self, setpoint: f64, measurement: f64) -> Result<f64> {
        self.update_terms(setpoint, measurement).map(|t| t.output)
    }

    /// Run one control tick and return the full term breakdown.
    ///
    /// Non-finite inputs are rejected before any state is touched; a NaN
    /// that reached the accumulator could only be cleared by a reset.
    /// Finite inputs large enough to overflow a term are rejected the same
    /// way with [`InputError::NumericOverflow`].
    pub fn update_terms(&mut self, setpoint: f64, measurement: f64) -> Result<PidTerms> {
        if !setpoint.is_finite() {
            return Err(InputError::NonFiniteSetpoint.into());
        }
        if !measurement.is_finite() {
            return Err(InputError::NonFiniteMeasurement.into());
        }

        let ts = self.sample_time;
        let PidGains { kp, ki, kd } = self.gains;
        let error = setpoint - measurement;

        // Proportional
        let proportional = kp * error;

        // Integral
        let increment = match self.options.integrator {
            IntegratorMethod::ForwardEuler | IntegratorMethod::BackwardEuler => ki * error * ts,
            IntegratorMethod::Trapezoidal => ki * ts * 0.5 * (error + self.last_error),
        };
        let integral = match self.options.integrator {
            IntegratorMethod::BackwardEuler => self.integral,
            _ => self.integral + increment,
        };

        // Derivative, expressed as a rate of the process variable so the
        // term is always subtracted.
        let raw = if self.options.derivative_on_measurement {
            (measurement - self.last_measurement) / ts
        } else {
            -(error - self.last_error) / ts
        };
        let filtered = self.filter_derivative(raw);
        let derivative = kd * filtered;

        let unclamped = proportional + integral - derivative;

        let (output, saturated) = match self.options.output_limits {
            Some(OutputLimits { min, max }) => {
                (unclamped.clamp(min, max), unclamped > max || unclamped < min)
            }
            None => (unclamped, false),
        };

        // Clamping anti-windup: the increment is only kept while the
        // actuator is within its limits.
        let keep_increment = !(saturated && self.options.anti_windup);
        let committed = if keep_increment {
            self.integral + increment
        } else {
            self.integral
        };

        // Nothing below may store an infinity or NaN.
        if !(error.is_finite()
            && filtered.is_finite()
            && unclamped.is_finite()
            && committed.is_finite())
        {
            return Err(InputError::NumericOverflow.into());
        }

        self.integral = committed;
        self.last_measurement = measurement;
        self.last_error = error;
        self.last_filtered_derivative = filtered;
        self.mode = ControllerMode::Armed;

        Ok(PidTerms {
            proportional,
            integral,
            derivative,
            unclamped,
            output,
            saturated,
        })
    }

    /// Zero the accumulators.  Gains, sample time and limits are kept.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_measurement = 0.0;
        self.last_error = 0.0;
        self.last_filtered_derivative = 0.0;
        self.mode = ControllerMode::Reset;
    }

    /// Replace the gains, keeping the accumulated state.
    ///
    /// The accumulator already carries `ki`, so changing `ki` does not
    /// step the output.  On error the previous gains stay in effect.
    pub fn retune(&mut self, kp: f64, ki: f64, kd: f64) -> Result<()> {
        let gains = PidGains::new(kp, ki, kd);
        gains.validate()?;
        self.gains = gains;
        Ok(())
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn sample_time(&self) -> f64 {
        self.sample_time
    }

    pub fn options(&self) -> &PidOptions {
        &self.options
    }

    pub fn integrator_method(&self) -> IntegratorMethod {
        self.options.integrator
    }

    /// Current value of the integral accumulator.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn state(&self) -> PidState {
        PidState {
            integral: self.integral,
            last_measurement: self.last_measurement,
            last_filtered_derivative: self.last_filtered_derivative,
            integrator: self.options.integrator,
            mode: self.mode,
        }
    }

    /// First-order low-pass, forward-Euler discretized with corner `N`.
    fn filter_derivative(&self, raw: f64) -> f64 {
        let n = self.options.filter_coefficient;
        if n > 0.0 {
            let alpha = n * self.sample_time / (1.0 + n * self.sample_time);
            self.last_filtered_derivative + (raw - self.last_filtered_derivative) * alpha
        } else {
            raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    fn with(options: PidOptions, kp: f64, ki: f64, kd: f64, ts: f64) -> PidController {
        PidController::new(kp, ki, kd, ts, options).unwrap()
    }

    #[test]
    fn reference_two_tick_scenario() {
        let mut pid = with(PidOptions::default(), 1.5, 0.8, 0.2, 0.01);

        let t1 = pid.update_terms(10.0, 0.0).unwrap();
        assert!(close(t1.integral, 0.08));
        assert!(close(t1.derivative, 0.0));
        assert!(close(t1.output, 15.08), "tick 1 = {}", t1.output);

        let t2 = pid.update_terms(10.0, 1.0).unwrap();
        assert!(close(pid.integral(), 0.152));
        assert!(close(t2.derivative, 20.0));
        assert!(close(t2.output, -6.348), "tick 2 = {}", t2.output);
    }

    #[test]
    fn rejects_bad_sample_time() {
        for ts in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = PidController::new(1.0, 0.0, 0.0, ts, PidOptions::default()).unwrap_err();
            assert_eq!(err, Error::InvalidConfiguration(ConfigError::InvalidSampleTime));
        }
    }

    #[test]
    fn rejects_non_finite_gains() {
        let err = PidController::new(f64::NAN, 0.0, 0.0, 0.1, PidOptions::default()).unwrap_err();
        assert_eq!(err, Error::InvalidConfiguration(ConfigError::NonFiniteGain));
        let err =
            PidController::new(1.0, f64::INFINITY, 0.0, 0.1, PidOptions::default()).unwrap_err();
        assert_eq!(err, Error::InvalidConfiguration(ConfigError::NonFiniteGain));
    }

    #[test]
    fn rejects_malformed_limits_and_filter() {
        let inverted = PidOptions {
            output_limits: Some(OutputLimits { min: 1.0, max: -1.0 }),
            ..PidOptions::default()
        };
        assert_eq!(
            PidController::new(1.0, 0.0, 0.0, 0.1, inverted).unwrap_err(),
            Error::InvalidConfiguration(ConfigError::InvalidOutputLimits)
        );

        assert!(OutputLimits::new(f64::NAN, 1.0).is_err());
        assert!(OutputLimits::new(2.0, 2.0).is_ok());
        assert!(OutputLimits::new(f64::NEG_INFINITY, 0.0).is_ok());

        let negative_n = PidOptions {
            filter_coefficient: -5.0,
            ..PidOptions::default()
        };
        assert_eq!(
            PidController::new(1.0, 0.0, 0.0, 0.1, negative_n).unwrap_err(),
            Error::InvalidConfiguration(ConfigError::InvalidFilterCoefficient)
        );
    }

    #[test]
    fn backward_euler_defers_the_increment() {
        let options = PidOptions {
            integrator: IntegratorMethod::BackwardEuler,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 1.0, 0.0, 0.1);

        assert!(close(pid.update(1.0, 0.0).unwrap(), 0.0));
        assert!(close(pid.integral(), 0.1));
        assert!(close(pid.update(1.0, 0.0).unwrap(), 0.1));
        assert!(close(pid.update(1.0, 0.0).unwrap(), 0.2));
    }

    #[test]
    fn trapezoidal_averages_consecutive_errors() {
        let options = PidOptions {
            integrator: IntegratorMethod::Trapezoidal,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 2.0, 0.0, 0.5);

        // (2 + 0)/2 · 2 · 0.5
        assert!(close(pid.update(2.0, 0.0).unwrap(), 1.0));
        // + (2 + 2)/2 · 2 · 0.5
        assert!(close(pid.update(2.0, 0.0).unwrap(), 3.0));
        // + (0 + 2)/2 · 2 · 0.5
        assert!(close(pid.update(0.0, 0.0).unwrap(), 4.0));
        assert_eq!(pid.state().integrator, IntegratorMethod::Trapezoidal);
    }

    #[test]
    fn derivative_filter_smooths_a_measurement_step() {
        // N·Ts = 1 → alpha = 0.5
        let options = PidOptions {
            filter_coefficient: 10.0,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 0.0, 1.0, 0.1);

        // raw = 10, filtered = 5
        assert!(close(pid.update(0.0, 1.0).unwrap(), -5.0));
        // raw = 0, filtered = 2.5
        assert!(close(pid.update(0.0, 1.0).unwrap(), -2.5));
        assert!(close(pid.state().last_filtered_derivative, 2.5));
    }

    #[test]
    fn derivative_on_error_kicks_on_setpoint_step() {
        let options = PidOptions {
            derivative_on_measurement: false,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 0.0, 1.0, 0.5);
        // de/dt = 2 → +2
        assert!(close(pid.update(1.0, 0.0).unwrap(), 2.0));
        assert!(close(pid.update(1.0, 0.0).unwrap(), 0.0));

        let mut on_measurement = with(PidOptions::default(), 0.0, 0.0, 1.0, 0.5);
        assert!(close(on_measurement.update(1.0, 0.0).unwrap(), 0.0));
    }

    #[test]
    fn clamping_holds_integral_while_saturated() {
        let limits = Some(OutputLimits { min: -1.0, max: 1.0 });
        let options = PidOptions {
            output_limits: limits,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 1.0, 0.0, 1.0);

        let terms = pid.update_terms(5.0, 0.0).unwrap();
        assert!(terms.saturated);
        assert!(close(terms.output, 1.0));
        assert!(close(terms.unclamped, 5.0));
        assert!(close(pid.integral(), 0.0));

        let mut windup = with(
            PidOptions {
                anti_windup: false,
                ..options
            },
            0.0,
            1.0,
            0.0,
            1.0,
        );
        assert!(close(windup.update(5.0, 0.0).unwrap(), 1.0));
        assert!(close(windup.integral(), 5.0));
    }

    #[test]
    fn output_at_the_limit_is_not_saturation() {
        let options = PidOptions {
            output_limits: Some(OutputLimits { min: 0.0, max: 1.0 }),
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 1.0, 0.0, 1.0);
        let terms = pid.update_terms(1.0, 0.0).unwrap();
        assert!(!terms.saturated);
        assert!(close(pid.integral(), 1.0));
    }

    #[test]
    fn non_finite_input_leaves_state_untouched() {
        let mut pid = with(PidOptions::default(), 1.0, 1.0, 1.0, 0.1);
        pid.update(1.0, 0.5).unwrap();
        let before = pid.state();

        assert_eq!(
            pid.update(f64::NAN, 0.0).unwrap_err(),
            Error::InvalidInput(InputError::NonFiniteSetpoint)
        );
        assert_eq!(
            pid.update(0.0, f64::NEG_INFINITY).unwrap_err(),
            Error::InvalidInput(InputError::NonFiniteMeasurement)
        );
        assert_eq!(pid.state(), before);
    }

    #[test]
    fn overflowing_finite_inputs_are_rejected_before_the_limits() {
        let options = PidOptions {
            output_limits: Some(OutputLimits { min: -1.0, max: 1.0 }),
            ..PidOptions::default()
        };
        let mut pid = with(options, 10.0, 0.0, 1.0, 1e-3);
        let before = pid.state();

        // kp·e and the measurement rate both overflow; inf - inf is NaN.
        assert_eq!(
            pid.update(1.7e308, 1e306).unwrap_err(),
            Error::InvalidInput(InputError::NumericOverflow)
        );
        assert_eq!(pid.state(), before);

        let out = pid.update(1.0, 0.0).unwrap();
        assert!(out.is_finite() && (-1.0..=1.0).contains(&out));
    }

    #[test]
    fn overflow_never_reaches_the_accumulator() {
        let options = PidOptions {
            anti_windup: false,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 1.0, 0.0, 1.0);

        // The error itself overflows.
        assert_eq!(
            pid.update(1e308, -1e308).unwrap_err(),
            Error::InvalidInput(InputError::NumericOverflow)
        );
        assert_eq!(pid.integral(), 0.0);

        // Each increment fits, but the running sum would not.
        pid.update(1.5e308, 0.0).unwrap();
        assert_eq!(
            pid.update(1.5e308, 0.0).unwrap_err(),
            Error::InvalidInput(InputError::NumericOverflow)
        );
        assert!(close(pid.integral(), 1.5e308));

        assert!(close(pid.update(-1.5e308, 0.0).unwrap(), 0.0));
        assert!(close(pid.update(1.0, 0.0).unwrap(), 1.0));
    }

    #[test]
    fn backward_euler_rejects_an_overflowing_deferred_increment() {
        let options = PidOptions {
            anti_windup: false,
            integrator: IntegratorMethod::BackwardEuler,
            ..PidOptions::default()
        };
        let mut pid = with(options, 0.0, 1.0, 0.0, 1.0);
        pid.update(1.5e308, 0.0).unwrap();
        let before = pid.state();

        // The output only sees the old accumulator, but the commit overflows.
        assert_eq!(
            pid.update(1.5e308, 0.0).unwrap_err(),
            Error::InvalidInput(InputError::NumericOverflow)
        );
        assert_eq!(pid.state(), before);
    }

    #[test]
    fn reset_clears_state_and_keeps_configuration() {
        let options = PidOptions {
            output_limits: Some(OutputLimits { min: -10.0, max: 10.0 }),
            filter_coefficient: 5.0,
            ..PidOptions::default()
        };
        let mut pid = with(options, 1.0, 2.0, 0.5, 0.1);
        assert_eq!(pid.mode(), ControllerMode::Reset);

        pid.update(3.0, 1.0).unwrap();
        pid.update(3.0, 2.0).unwrap();
        assert_eq!(pid.mode(), ControllerMode::Armed);

        pid.reset();
        let state = pid.state();
        assert_eq!(state.mode, ControllerMode::Reset);
        assert_eq!(state.integral, 0.0);
        assert_eq!(state.last_measurement, 0.0);
        assert_eq!(state.last_filtered_derivative, 0.0);
        assert_eq!(pid.gains(), PidGains::new(1.0, 2.0, 0.5));
        assert_eq!(pid.options(), &options);
        assert_eq!(pid.sample_time(), 0.1);
    }

    #[test]
    fn retune_is_bumpless_for_integral_gain() {
        let mut pid = with(PidOptions::default(), 0.0, 1.0, 0.0, 1.0);
        pid.update(2.0, 0.0).unwrap();
        let held = pid.integral();

        pid.retune(0.0, 10.0, 0.0).unwrap();
        assert_eq!(pid.integral(), held);
        // Zero error: output is the carried accumulator, unchanged by the new ki.
        assert!(close(pid.update(0.0, 0.0).unwrap(), held));
    }

    #[test]
    fn retune_rejects_non_finite_and_keeps_old_gains() {
        let mut pid = with(PidOptions::default(), 1.0, 2.0, 3.0, 0.1);
        assert_eq!(
            pid.retune(1.0, f64::NAN, 3.0).unwrap_err(),
            Error::InvalidConfiguration(ConfigError::NonFiniteGain)
        );
        assert_eq!(pid.gains(), PidGains::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn state_serializes_with_method_name() {
        let pid = with(PidOptions::default(), 1.0, 0.0, 0.0, 0.1);
        let json = serde_json::to_string(&pid.state()).unwrap();
        assert!(json.contains("\"integrator\":\"Forward Euler\""), "{json}");
        assert!(json.contains("\"mode\":\"Reset\""), "{json}");
    }
}
