//! # Velocity Smoother
//!
//! Stand-alone smoothing process speaking JSON lines.
//!
//! stdin, one object per line:
//! - command: `{"x": 0.3, "y": 0.0, "angular": 0.5, "stamp": 12.5}`
//!   (`stamp` in seconds on the process clock, optional)
//! - odometry: `{"odom": {"x": 0.28, "y": 0.0, "angular": 0.47}}`
//! - reconfiguration: `{"set": {"max_accel": [1.0, 0.0, 2.0]}}`
//!
//! stdout: one smoothed sample per tick while streaming,
//! `{"x": .., "y": .., "angular": .., "stamp": ..}`. Logs go to stderr.
//!
//! Stops on Ctrl-C or end of input.

use clap::Parser;
use serde::{Deserialize, Serialize};
use smoother_common::config::{ConfigError, LogLevel};
use smoother_common::consts::DEFAULT_CONFIG_PATH;
use smoother_common::twist::{StampedTwist, Twist3};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use velocity_smoother::clock::{Clock, MonotonicClock};
use velocity_smoother::config::{
    LoadedConfig, ParamValue, Parameter, SmootherFileConfig, load_config,
};
use velocity_smoother::runner::{SmootherHandle, SmootherRunner};

/// Velocity Smoother: fixed-rate acceleration-limited command smoothing
#[derive(Parser, Debug)]
#[command(name = "velocity_smoother")]
#[command(version)]
#[command(about = "Smooth velocity commands to respect per-axis acceleration limits")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

// ─── Wire Format ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TwistLine {
    x: f64,
    y: f64,
    angular: f64,
    /// Seconds on the process clock.
    stamp: Option<f64>,
}

impl TwistLine {
    fn twist(&self) -> Twist3 {
        Twist3::new(self.x, self.y, self.angular)
    }

    fn stamp(&self) -> Option<Duration> {
        self.stamp.and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Odometry { odom: TwistLine },
    Parameters { set: BTreeMap<String, ParamValue> },
    Command(TwistLine),
}

#[derive(Debug, Serialize)]
struct OutputLine {
    x: f64,
    y: f64,
    angular: f64,
    stamp: f64,
}

impl From<StampedTwist> for OutputLine {
    fn from(s: StampedTwist) -> Self {
        Self {
            x: s.twist.x,
            y: s.twist.y,
            angular: s.twist.angular,
            stamp: s.stamp.as_secs_f64(),
        }
    }
}

// ─── Entry Point ────────────────────────────────────────────────────

fn main() {
    let args = Args::parse();
    let loaded = load_config(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("Velocity Smoother v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| config_error(&args, e))
        .and_then(|config| {
            if args.print_config {
                print_config(&config)
            } else {
                run(config)
            }
        });
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Velocity Smoother shutdown complete");
}

fn config_error(args: &Args, e: ConfigError) -> Box<dyn std::error::Error> {
    format!("{}: {e}", args.config.display()).into()
}

fn print_config(config: &LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let file = SmootherFileConfig {
        shared: config.shared.clone(),
        smoother: config.live.params().clone(),
    };
    print!("{}", toml::to_string_pretty(&file)?);
    Ok(())
}

fn run(config: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let live = config.live;
    info!(
        service = %config.shared.service_name,
        frequency = live.frequency(),
        feedback = live.feedback().as_str(),
        timeout_s = live.velocity_timeout().as_secs_f64(),
        "Config OK"
    );

    let clock = Arc::new(MonotonicClock::new());
    let stdout = std::io::stdout();
    let sink = move |sample: StampedTwist| {
        let mut out = stdout.lock();
        let written = serde_json::to_writer(&mut out, &OutputLine::from(sample))
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            warn!("failed to write sample: {e}");
        }
    };
    let mut runner = SmootherRunner::start(live, sink, clock.clone())?;
    let handle = runner.handle();
    info!("Smoother running, reading JSON lines from stdin");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let (line_tx, line_rx) = mpsc::channel::<String>();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read error: {e}");
                        break;
                    }
                }
            }
        })?;

    while running.load(Ordering::SeqCst) {
        match line_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => handle_line(&handle, clock.as_ref(), &line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("End of input");
                break;
            }
        }
    }

    runner.stop();
    Ok(())
}

fn handle_line(handle: &SmootherHandle, clock: &dyn Clock, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let parsed: InputLine = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(e) => {
            warn!("ignoring malformed input line: {e}");
            return;
        }
    };
    match parsed {
        InputLine::Command(cmd) => {
            let stamp = cmd.stamp().unwrap_or(Duration::ZERO);
            handle.submit_stamped(StampedTwist::new(cmd.twist(), stamp));
        }
        InputLine::Odometry { odom } => {
            let stamp = odom.stamp().unwrap_or_else(|| clock.now());
            handle.submit_odometry(StampedTwist::new(odom.twist(), stamp));
        }
        InputLine::Parameters { set } => {
            let params: Vec<Parameter> = set
                .into_iter()
                .map(|(name, value)| Parameter { name, value })
                .collect();
            let outcome = handle.set_parameters(&params);
            debug!(?outcome, "reconfiguration processed");
        }
    }
}

/// Setup tracing subscriber based on CLI arguments and `[shared]` log level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        "debug"
    } else {
        log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
