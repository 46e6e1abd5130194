use anyhow::Result;
use camping::paths::{default_config_file, default_log_dir};
use camping::{
    init_logging, CredentialResolver, LogOptions, RunOutcome, Watchdog, WatchdogConfig,
    DEFAULT_CONFIG_TEMPLATE,
};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

const SEPARATOR: &str = "============================================================";

#[derive(Parser, Debug)]
#[command(name = "camping")]
#[command(about = "Camera watchdog that reports Blue Iris and camera health to heartbeat checks")]
#[command(version)]
#[command(long_about = "Checks, once per invocation, that the Blue Iris server answers and that \
every camera is up (or probes cameras directly over TCP), then reports the result to \
healthchecks.io-style ping URLs. Meant to be run from cron or a systemd timer.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", help = "Path to TOML configuration file")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Include targets, thread ids and source locations in log lines
    #[arg(short, long, help = "Enable verbose log lines")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Directory for the rolling log file
    #[arg(long, value_name = "DIR", help = "Directory for camping.log")]
    log_dir: Option<PathBuf>,

    /// Log to stderr only
    #[arg(long, help = "Do not write a log file")]
    no_log_file: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without probing")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print an annotated configuration template and exit")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", DEFAULT_CONFIG_TEMPLATE);
        return Ok(());
    }

    let guard = init_logging(&log_options(&args))?;

    let exit_code = run(&args).await;

    // process::exit skips destructors; flush the file writer first
    drop(guard);
    std::process::exit(exit_code);
}

fn log_options(args: &Args) -> LogOptions {
    let mut options = LogOptions::from_flags(args.debug, args.verbose, args.quiet);
    options.format = args.log_format.clone();
    if !args.no_log_file {
        options.log_dir = args.log_dir.clone().or_else(default_log_dir);
    }
    options
}

async fn run(args: &Args) -> i32 {
    let config_path = args.config.clone().unwrap_or_else(default_config_file);

    info!("{}", SEPARATOR);
    info!("CamPing v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    let config = match WatchdogConfig::load_from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            critical(&e.to_string());
            return 1;
        }
    };

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid ({} strategy)", config.strategy_name());
        return 0;
    }

    let watchdog = match Watchdog::new(config, CredentialResolver::default()) {
        Ok(watchdog) => watchdog,
        Err(e) => {
            critical(&e.to_string());
            return 1;
        }
    };

    let outcome = watchdog.run().await;
    match &outcome {
        RunOutcome::Healthy => info!("All checks passed"),
        RunOutcome::Unhealthy { message } => critical(message),
        RunOutcome::NotifyFailed(e) => critical(&format!("Heartbeat delivery failed: {}", e)),
    }

    info!("{}", SEPARATOR);
    outcome.exit_code()
}

/// Fatal conditions go to the log and, in a fixed format, to stderr
fn critical(message: &str) {
    error!("CRITICAL - {}; exiting.", message);
    eprintln!(
        "{} - CRITICAL - {}; exiting.",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    );
}
