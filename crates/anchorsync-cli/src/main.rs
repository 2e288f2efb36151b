//! `anchorsync` – headless shared-anchor synchronisation runner.
//!
//! This binary:
//!
//! 1. Loads `~/.anchorsync/config.toml`, writing the defaults on first run.
//! 2. Spins up one authority and `dependents` simulated devices, each with
//!    its own tracking space, and runs them for `ticks` ticks.
//! 3. Prints per-device placement error and a diagnostics dump.
//! 4. Intercepts **Ctrl-C** to stop the run after the current tick.

mod config;
mod sim;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

fn main() {
    // RUST_LOG sets the filter, ANCHORSYNC_LOG_FORMAT=json switches to JSON
    // lines, OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    let _guard = anchorsync_runtime::init_tracing("anchorsync");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after the current tick …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; the run cannot be interrupted cleanly"
        );
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => write_default_config(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    println!(
        "  {} dependent(s), {} tick(s), {} convention\n",
        cfg.dependents.to_string().bold(),
        cfg.ticks.to_string().bold(),
        cfg.axis_convention.to_string().bold()
    );

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build Tokio runtime");
            std::process::exit(1);
        }
    };

    match runtime.block_on(sim::run(&cfg, shutdown)) {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            println!("{}: {}", "Simulation failed".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn write_default_config() -> config::Config {
    let mut cfg = config::Config::default();
    println!("  No configuration found.  Writing defaults.");
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___             __               ____              "#.bold().cyan());
    println!("{}", r#"  / _ | ___  ____/ /  ___  ____   / __/_ _____  ____"#.bold().cyan());
    println!("{}", r#" / __ |/ _ \/ __/ _ \/ _ \/ __/  _\ \/ // / _ \/ __/"#.bold().cyan());
    println!("{}", r#"/_/ |_/_//_/\__/_//_/\___/_/    /___/\_, /_//_/\__/ "#.bold().cyan());
    println!("{}", r#"                                   /___/           "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "AnchorSync".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Shared-anchor pose synchronisation");
    println!();
}

fn print_summary(summary: &sim::SimSummary) {
    println!();
    println!("  Ran {} tick(s).\n", summary.ticks_run.to_string().bold());
    for device in &summary.devices {
        let mode = format!("{:?}", device.final_mode);
        let mode = match device.final_mode {
            anchorsync_runtime::SessionMode::FrameEstablished => mode.green(),
            anchorsync_runtime::SessionMode::NoFrame => mode.yellow(),
        };
        println!("  {} ({:?}) {}", device.name.bold(), device.role, mode);
        if device.role == anchorsync_runtime::Role::Dependent {
            println!(
                "    synced ticks: {}  max position error: {:.5} m  max rotation error: {:.3}°",
                device.synced_ticks, device.max_position_error, device.max_rotation_error_deg
            );
        }
        for line in device.diagnostics.to_string().lines() {
            println!("    {}", line.dimmed());
        }
        println!();
    }
}
