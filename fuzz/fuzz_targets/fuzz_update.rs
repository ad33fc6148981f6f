//! Fuzz target: `PidController::update`
//!
//! Builds a controller from the first bytes (gains, sample time, method,
//! limits) and drives the rest through `update` as (setpoint, measurement)
//! pairs, raw f32 bit patterns included.  Asserts that:
//! - nothing panics
//! - non-finite or overflowing inputs are rejected and leave the state
//!   untouched
//! - every accepted command is finite and, with limits, lies inside them
//! - the state never holds an infinity or NaN
//!
//! cargo fuzz run fuzz_update

#![no_main]

use libfuzzer_sys::fuzz_target;
use pidcore::control::{IntegratorMethod, OutputLimits, PidController, PidOptions, PidState};
use pidcore::error::{Error, InputError};

fn take_f32(data: &mut &[u8]) -> Option<f32> {
    let (head, rest) = data.split_first_chunk::<4>()?;
    *data = rest;
    Some(f32::from_le_bytes(*head))
}

fn state_is_finite(s: &PidState) -> bool {
    s.integral.is_finite() && s.last_measurement.is_finite() && s.last_filtered_derivative.is_finite()
}

fuzz_target!(|data: &[u8]| {
    let mut data = data;
    let Some(&[method, flags, n, limit]) = data.first_chunk::<4>() else {
        return;
    };
    data = &data[4..];

    let integrator = match method % 3 {
        0 => IntegratorMethod::ForwardEuler,
        1 => IntegratorMethod::BackwardEuler,
        _ => IntegratorMethod::Trapezoidal,
    };
    let output_limits = (flags & 0b100 != 0).then(|| OutputLimits {
        min: -f64::from(limit),
        max: f64::from(limit),
    });
    let options = PidOptions {
        derivative_on_measurement: flags & 0b001 != 0,
        anti_windup: flags & 0b010 != 0,
        filter_coefficient: f64::from(n),
        output_limits,
        integrator,
    };

    let (Some(kp), Some(ki), Some(kd), Some(ts)) = (
        take_f32(&mut data),
        take_f32(&mut data),
        take_f32(&mut data),
        take_f32(&mut data),
    ) else {
        return;
    };
    let Ok(mut pid) = PidController::new(
        f64::from(kp),
        f64::from(ki),
        f64::from(kd),
        f64::from(ts),
        options,
    ) else {
        return;
    };

    while let (Some(sp), Some(pv)) = (take_f32(&mut data), take_f32(&mut data)) {
        let (sp, pv) = (f64::from(sp), f64::from(pv));
        let before = pid.state();
        match pid.update(sp, pv) {
            Ok(output) => {
                assert!(output.is_finite(), "accepted tick produced {output}");
                if let Some(OutputLimits { min, max }) = output_limits {
                    assert!(output >= min && output <= max, "{output} outside limits");
                }
            }
            Err(Error::InvalidInput(InputError::NumericOverflow)) => {
                assert!(sp.is_finite() && pv.is_finite());
                assert_eq!(pid.state(), before, "rejected tick mutated state");
            }
            Err(e) => {
                assert!(!sp.is_finite() || !pv.is_finite(), "unexpected {e}");
                assert_eq!(pid.state(), before, "rejected tick mutated state");
            }
        }
        assert!(state_is_finite(&pid.state()), "state left the f64 range");
    }
});
