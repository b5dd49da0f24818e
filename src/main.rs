//! PWM binary entry point
//!
//! Runs a session on the headless platform, driven by a policy process.

use pwm_core::config::Config;
use pwm_core::runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pwm=info,pwm_core=info,smithay=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.len() < 2 {
        eprintln!("Usage: pwm <SEAT> <POLICY-COMMAND> [ARGS...]");
        eprintln!("Examples:");
        eprintln!("  pwm seat0 ./policy.sh       # Run a shell script as the policy");
        eprintln!("  pwm seat0 python3 wm.py     # Run a python policy process");
        eprintln!();
        eprintln!("The policy process reads notifications on stdin and writes requests on stdout.");
        std::process::exit(1);
    }

    let seat = &args[0];
    let command = args[1..].join(" ");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting PWM on {}", seat);
    info!("Policy process: {}", command);

    if let Err(e) = runtime::run(config, seat, &command) {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}
