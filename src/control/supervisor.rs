//! Loop supervisor.
//!
//! Sits between the caller's periodic scheduler and the [`PidController`].
//! The controller itself only reports a rejected tick; what the actuator
//! receives on that tick is decided here.
//!
//! ## Tick lifecycle
//!
//! 1. The scheduler calls [`LoopSupervisor::tick`] once per sample period.
//! 2. In `Manual` the operator's output is passed through untouched and
//!    the controller is not run.
//! 3. In `Automatic` the controller runs.  If it rejects the inputs the
//!    [`FaultPolicy`] picks a substitute output, or fails the tick.
//! 4. Switching `Manual → Automatic` resets the controller so integral
//!    history from an earlier engagement cannot bump the output.
//!
//! Only mode changes and the start/end of a rejection streak are logged;
//! a steady tick never touches the logger.

use heapless::HistoryBuffer;
use log::{info, warn};

use crate::control::pid::PidController;
use crate::error::{Error, InputError, Result};

/// Number of recent outputs kept for inspection.
pub const HISTORY_LEN: usize = 16;

/// Who drives the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Manual,
    Automatic,
}

/// What to output on a tick whose inputs the controller rejected.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FaultPolicy {
    /// Repeat the previous output.
    #[default]
    HoldLastOutput,
    /// Output a fixed safe value.
    Neutral(f64),
    /// Propagate the error to the caller.
    Fail,
}

/// Result of one supervised tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Fresh command from the controller.
    Controlled(f64),
    /// Operator output while in manual mode.
    Manual(f64),
    /// The controller rejected the tick and the policy supplied `output`.
    Substituted { output: f64, cause: InputError },
}

impl TickOutcome {
    pub fn output(&self) -> f64 {
        match *self {
            Self::Controlled(v) | Self::Manual(v) => v,
            Self::Substituted { output, .. } => output,
        }
    }
}

/// Drives a [`PidController`] on behalf of a periodic control loop.
pub struct LoopSupervisor {
    pid: PidController,
    mode: LoopMode,
    policy: FaultPolicy,
    manual_output: f64,
    last_output: f64,
    /// Rejected ticks since construction.
    rejected_ticks: u32,
    /// Rejected ticks since the last accepted one.
    consecutive_rejects: u32,
    history: HistoryBuffer<f64, HISTORY_LEN>,
}

impl LoopSupervisor {
    /// Wrap `pid`, starting in automatic mode.
    pub fn new(pid: PidController, policy: FaultPolicy) -> Self {
        Self {
            pid,
            mode: LoopMode::Automatic,
            policy,
            manual_output: 0.0,
            last_output: 0.0,
            rejected_ticks: 0,
            consecutive_rejects: 0,
            history: HistoryBuffer::new(),
        }
    }

    /// Run one supervised tick.
    pub fn tick(&mut self, setpoint: f64, measurement: f64) -> Result<TickOutcome> {
        let outcome = match self.mode {
            LoopMode::Manual => TickOutcome::Manual(self.manual_output),
            LoopMode::Automatic => match self.pid.update(setpoint, measurement) {
                Ok(output) => {
                    if self.consecutive_rejects > 0 {
                        info!(
                            "Loop recovered after {} rejected tick(s)",
                            self.consecutive_rejects
                        );
                    }
                    self.consecutive_rejects = 0;
                    TickOutcome::Controlled(output)
                }
                Err(Error::InvalidInput(cause)) => {
                    self.rejected_ticks = self.rejected_ticks.saturating_add(1);
                    self.consecutive_rejects = self.consecutive_rejects.saturating_add(1);
                    if self.consecutive_rejects == 1 {
                        warn!("Tick rejected: {cause} (policy {:?})", self.policy);
                    }
                    match self.policy {
                        FaultPolicy::HoldLastOutput => TickOutcome::Substituted {
                            output: self.last_output,
                            cause,
                        },
                        FaultPolicy::Neutral(output) => TickOutcome::Substituted { output, cause },
                        FaultPolicy::Fail => return Err(cause.into()),
                    }
                }
                Err(e) => return Err(e),
            },
        };

        self.last_output = outcome.output();
        self.history.write(self.last_output);
        Ok(outcome)
    }

    /// Hand the actuator to the operator at `output`.
    pub fn set_manual(&mut self, output: f64) -> Result<()> {
        if !output.is_finite() {
            return Err(InputError::NonFiniteManualOutput.into());
        }
        if self.mode != LoopMode::Manual {
            info!("Loop -> Manual at {output:.3}");
        }
        self.mode = LoopMode::Manual;
        self.manual_output = output;
        Ok(())
    }

    /// Return to automatic control with a freshly reset controller.
    pub fn engage(&mut self) {
        if self.mode == LoopMode::Automatic {
            return;
        }
        self.pid.reset();
        self.consecutive_rejects = 0;
        self.mode = LoopMode::Automatic;
        info!("Loop -> Automatic (controller reset)");
    }

    pub fn retune(&mut self, kp: f64, ki: f64, kd: f64) -> Result<()> {
        self.pid.retune(kp, ki, kd)?;
        info!("Loop retuned: kp={kp} ki={ki} kd={kd}");
        Ok(())
    }

    pub fn set_policy(&mut self, policy: FaultPolicy) {
        self.policy = policy;
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    pub fn controller(&self) -> &PidController {
        &self.pid
    }

    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    pub fn rejected_ticks(&self) -> u32 {
        self.rejected_ticks
    }

    pub fn consecutive_rejects(&self) -> u32 {
        self.consecutive_rejects
    }

    /// Recent outputs, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &f64> {
        self.history.oldest_ordered()
    }
}
