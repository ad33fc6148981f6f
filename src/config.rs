//! Controller configuration.
//!
//! Block-diagram tools expose a PID as a flat bag of named parameters.
//! [`ControllerConfig`] is that parameter set as an explicit, typed
//! structure, validated once when the controller is built.  None of the
//! tool's conventions leak into [`PidController`]: the "inherit" sample
//! time and the `UseKiTs` gain scaling are resolved here.
//!
//! | Tool parameter                        | Field                                            |
//! |---------------------------------------|--------------------------------------------------|
//! | `P`, `I`, `D`                         | `p`, `i`, `d`                                    |
//! | `SampleTime` (`-1` = inherit)         | `sample_time`                                    |
//! | `UseKiTs`                             | `use_ki_ts` (`I` holds `Ki·Ts`)                  |
//! | `IntegratorMethod`                    | `integrator_method`                              |
//! | `UseFilter`, `N`                      | `use_filter`, `filter_coefficient`               |
//! | `LimitOutput`                         | `limit_output`                                   |
//! | `UpperSaturationLimit`                | `upper_saturation_limit` (`None` = unbounded)    |
//! | `LowerSaturationLimit`                | `lower_saturation_limit` (`None` = unbounded)    |
//! | `AntiWindupMode`                      | `anti_windup_mode`                               |

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::control::pid::{IntegratorMethod, OutputLimits, PidController, PidOptions};
use crate::error::{ConfigError, Result};

/// `sample_time` value meaning "use the loop period supplied at build time".
pub const INHERIT_SAMPLE_TIME: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntiWindupMode {
    None,
    #[default]
    Clamping,
}

/// PID configuration as loaded from a file or provisioning channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Gains ---
    pub p: f64,
    /// Integral gain; `Ki·Ts` when `use_ki_ts` is set.
    pub i: f64,
    pub d: f64,

    // --- Timing ---
    /// Seconds, or [`INHERIT_SAMPLE_TIME`].
    pub sample_time: f64,
    pub use_ki_ts: bool,
    pub integrator_method: IntegratorMethod,

    // --- Derivative ---
    pub derivative_on_measurement: bool,
    pub use_filter: bool,
    /// Filter corner `N`, only used with `use_filter`.
    pub filter_coefficient: f64,

    // --- Output ---
    pub limit_output: bool,
    pub upper_saturation_limit: Option<f64>,
    pub lower_saturation_limit: Option<f64>,
    pub anti_windup_mode: AntiWindupMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Gains
            p: 1.0,
            i: 0.0,
            d: 0.0,

            // Timing
            sample_time: 0.01, // 100 Hz
            use_ki_ts: false,
            integrator_method: IntegratorMethod::ForwardEuler,

            // Derivative
            derivative_on_measurement: true,
            use_filter: true,
            filter_coefficient: 100.0,

            // Output
            limit_output: false,
            upper_saturation_limit: None,
            lower_saturation_limit: None,
            anti_windup_mode: AntiWindupMode::Clamping,
        }
    }
}

impl ControllerConfig {
    /// Parse a JSON document.  Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            warn!("Config parse failed: {e}");
            ConfigError::Malformed.into()
        })
    }

    /// Decode the compact binary form written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|e| {
            warn!("Config decode failed: {e}");
            ConfigError::Malformed.into()
        })
    }

    /// Compact binary form for flash or provisioning storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| {
            warn!("Config encode failed: {e}");
            ConfigError::Malformed.into()
        })
    }

    /// Sample time the controller will run at.  `inherited` is the period
    /// of the loop that will drive it, if the caller knows it.
    #[allow(clippy::float_cmp)]
    pub fn effective_sample_time(&self, inherited: Option<f64>) -> Result<f64> {
        let ts = if self.sample_time == INHERIT_SAMPLE_TIME {
            let ts = inherited.ok_or(ConfigError::UnresolvedSampleTime)?;
            info!("Sample time inherited from loop: {ts}s");
            ts
        } else {
            self.sample_time
        };

        if !ts.is_finite() || ts <= 0.0 {
            return Err(ConfigError::InvalidSampleTime.into());
        }
        Ok(ts)
    }

    /// Integral gain in the controller's convention (per second).
    pub fn effective_ki(&self, ts: f64) -> f64 {
        if self.use_ki_ts { self.i / ts } else { self.i }
    }

    /// Structural options for the controller.
    pub fn options(&self) -> Result<PidOptions> {
        let output_limits = if self.limit_output {
            Some(OutputLimits::new(
                self.lower_saturation_limit.unwrap_or(f64::NEG_INFINITY),
                self.upper_saturation_limit.unwrap_or(f64::INFINITY),
            )?)
        } else {
            None
        };

        Ok(PidOptions {
            derivative_on_measurement: self.derivative_on_measurement,
            filter_coefficient: if self.use_filter {
                self.filter_coefficient
            } else {
                0.0
            },
            output_limits,
            anti_windup: self.anti_windup_mode == AntiWindupMode::Clamping,
            integrator: self.integrator_method,
        })
    }

    /// Validate and build the controller.
    pub fn build(&self, inherited: Option<f64>) -> Result<PidController> {
        let ts = self.effective_sample_time(inherited)?;
        let options = self.options()?;
        let ki = self.effective_ki(ts);

        debug!(
            "PID config: kp={} ki={} kd={} Ts={}s method={:?} N={} limits={:?} anti_windup={}",
            self.p,
            ki,
            self.d,
            ts,
            options.integrator,
            options.filter_coefficient,
            options.output_limits,
            options.anti_windup,
        );

        PidController::new(self.p, ki, self.d, ts, options)
    }
}
