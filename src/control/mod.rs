//! Closed-loop control: the discrete PID core and the caller-side
//! supervisor that drives it from a periodic loop.

pub mod pid;
pub mod supervisor;

pub use pid::{
    ControllerMode, IntegratorMethod, OutputLimits, PidController, PidGains, PidOptions, PidState,
    PidTerms,
};
pub use supervisor::{FaultPolicy, LoopMode, LoopSupervisor, TickOutcome};
