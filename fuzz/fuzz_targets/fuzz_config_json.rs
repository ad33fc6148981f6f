//! Fuzz target: `ControllerConfig::from_json` → `build`
//!
//! Arbitrary documents must either be rejected with a typed error or
//! produce a controller whose invariants hold.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use pidcore::config::ControllerConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = ControllerConfig::from_json(text) else {
        return;
    };
    if let Ok(pid) = config.build(Some(0.01)) {
        assert!(pid.sample_time() > 0.0 && pid.sample_time().is_finite());
        let gains = pid.gains();
        assert!(gains.kp.is_finite() && gains.ki.is_finite() && gains.kd.is_finite());
        if let Some(limits) = pid.options().output_limits {
            assert!(limits.min <= limits.max);
        }
    }
});
