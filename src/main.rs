//! pid-replay: feed recorded samples through a configured PID controller.
//!
//! ```text
//! pid-replay <config.json> [--loop-period <secs>] < samples.jsonl > commands.jsonl
//! ```
//!
//! Each stdin line is `{"setpoint": .., "measurement": ..}`; blank lines
//! and lines starting with `#` are skipped.  Each stdout line carries the
//! tick number and the controller's term breakdown.  No plant is
//! simulated: the measurements are replayed as recorded.
//!
//! Logs go to stderr.  Set `PID_REPLAY_LOG` (`env_logger` filter syntax,
//! default `info`) to change the level.
#![deny(unused_must_use)]

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use env_logger::Env;
use log::info;
use serde::{Deserialize, Serialize};

use pidcore::config::ControllerConfig;
use pidcore::control::PidTerms;

#[derive(Debug, Deserialize)]
struct Sample {
    setpoint: f64,
    measurement: f64,
}

#[derive(Debug, Serialize)]
struct Record {
    tick: u64,
    terms: PidTerms,
}

struct Args {
    config_path: String,
    loop_period: Option<f64>,
}

fn parse_args() -> Result<Args> {
    let mut config_path = None;
    let mut loop_period = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--loop-period" => {
                let value = args.next().context("--loop-period needs a value")?;
                let secs: f64 = value
                    .parse()
                    .with_context(|| format!("bad --loop-period '{value}'"))?;
                loop_period = Some(secs);
            }
            _ if config_path.is_none() => config_path = Some(arg),
            other => bail!("unexpected argument '{other}'"),
        }
    }

    Ok(Args {
        config_path: config_path
            .context("usage: pid-replay <config.json> [--loop-period <secs>]")?,
        loop_period,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::new().filter_or("PID_REPLAY_LOG", "info")).init();

    let args = parse_args()?;

    // ── Load config ───────────────────────────────────────────
    let text = std::fs::read_to_string(&args.config_path)
        .with_context(|| format!("reading {}", args.config_path))?;
    let config = ControllerConfig::from_json(&text)
        .with_context(|| format!("parsing {}", args.config_path))?;
    let mut pid = config
        .build(args.loop_period)
        .context("building controller")?;
    info!(
        "Replaying with Ts={}s, integrator {:?}",
        pid.sample_time(),
        pid.integrator_method()
    );

    // ── Replay ────────────────────────────────────────────────
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut tick = 0u64;

    for (idx, line) in stdin.lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let sample: Sample = serde_json::from_str(line)
            .with_context(|| format!("line {}: bad sample", idx + 1))?;
        let terms = pid
            .update_terms(sample.setpoint, sample.measurement)
            .with_context(|| format!("line {}: tick rejected", idx + 1))?;
        tick += 1;

        let record = serde_json::to_string(&Record { tick, terms })?;
        writeln!(out, "{record}")?;
    }

    out.flush()?;
    let state = pid.state();
    info!(
        "Replayed {tick} tick(s); integral={:.6} last_measurement={:.6}",
        state.integral, state.last_measurement
    );
    Ok(())
}
