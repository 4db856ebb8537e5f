use std::process::ExitCode;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use relaunch::{
    cli::{Cli, parse_args},
    config::load_config,
    console::Console,
    health::HttpProbe,
    launcher::ServiceLauncher,
    orchestrator::Restarter,
    system::{SystemPorts, SystemProcesses},
};

fn main() -> ExitCode {
    let args = parse_args();
    init_logging(&args);

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load configuration: {err}");
            eprintln!("relaunch: {err}");
            return ExitCode::from(1);
        }
    };
    let port = args.port.unwrap_or(config.default_port);
    debug!("Resolved configuration: {config:?}");

    let console = Console::new(!args.no_color);
    console.banner("relaunch: graceful restart");

    let probe = match HttpProbe::new(&config.health) {
        Ok(probe) => probe,
        Err(err) => {
            console.error(format!("Cannot build the health probe: {err}"));
            return ExitCode::from(1);
        }
    };
    let processes = SystemProcesses::new();
    let ports = SystemPorts::new();
    let launcher = ServiceLauncher::new(&config);

    let restarter = Restarter::new(&config, &processes, &ports, &launcher, &probe, console);

    if args.dry_run {
        restarter.plan(port);
        return ExitCode::SUCCESS;
    }

    match restarter.run(port) {
        Ok(summary) if summary.healthy => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(err) => {
            error!("Restart failed: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
