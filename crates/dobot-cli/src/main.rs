//! `dobot-tcp` – Dobot TCP front-end
//!
//! This binary stands in for the controller's network interface:
//!
//! 1. Loads `~/.dobot/config.toml` (writing the defaults on first run) and
//!    applies `DOBOT_*` environment overrides.
//! 2. Builds a simulated controller and a background driver that executes
//!    queued motions.
//! 3. Serves the motion-command channel and the realtime feedback channel
//!    until either listener fails or **Ctrl-C** arrives, then closes every
//!    live connection.

mod config;
mod driver;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use dobot_hal::{DobotHardware, SimHardware, SimLimits};
use dobot_server::{ConnectionRegistry, FeedbackServer, MotionServer};

#[tokio::main]
async fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); DOBOT_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("DOBOT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => info!(path = %config::config_path().display(), "default config written"),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config unreadable; using defaults");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    if let Err(e) = cfg.validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    // ── Controller ────────────────────────────────────────────────────────
    let limits = SimLimits {
        reach_mm: cfg.reach_mm,
        ..SimLimits::default()
    };
    let sim = Arc::new(
        SimHardware::new()
            .with_limits(limits.clone())
            .with_feedback_period(cfg.feedback_period()),
    );
    let hardware: Arc<dyn DobotHardware> = sim.clone();
    let registry = Arc::new(ConnectionRegistry::new());

    let motion = MotionServer::new(cfg.motion_addr(), Arc::clone(&hardware))
        .with_dispatch_target(Box::new(SimHardware::new().with_limits(limits)))
        .with_registry(Arc::clone(&registry))
        .with_max_receive_bytes(cfg.max_receive_bytes);
    let feedback = FeedbackServer::new(cfg.feedback_addr(), hardware)
        .with_registry(Arc::clone(&registry));

    tokio::spawn(driver::run(sim, cfg.motion_step()));

    println!(
        "  Motion channel   {}\n  Feedback channel {}\n",
        cfg.motion_addr().to_string().bold(),
        cfg.feedback_addr().to_string().bold()
    );

    // ── Serve until failure or Ctrl-C ─────────────────────────────────────
    let result = tokio::select! {
        r = motion.run() => r,
        r = feedback.run() => r,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            println!();
            println!("{}", "⚠  Ctrl-C received – closing connections …".yellow().bold());
            Ok(())
        }
    };

    let closed = registry.shutdown_all();
    info!(closed, "connections closed");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "dobot-tcp".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Motion and realtime feedback front-end");
    println!();
}
