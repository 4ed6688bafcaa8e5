//! bridgespoof - ephemeral Linux bridge with MAC spoofing
//!
//! Joins two interfaces into a transparent bridge, optionally spoofs the
//! first interface's hardware address and captures traffic, then restores
//! the host when interrupted.

mod capture;
mod cli;
mod error;
mod lifecycle;
mod manifest;
mod network;
mod privilege;
mod prompt;

use capture::{CaptureSupervisor, Tcpdump};
use cli::{Cli, Commands, UpArgs};
use error::Result;
use lifecycle::{Orchestrator, signals};
use manifest::Config;
use network::{Inventory, IpRoute2};
use prompt::Prompter;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        if e.is_input_error() {
            eprintln!("Nothing on the host was changed.");
        }
        std::process::exit(1);
    }
}

/// Sets up the tracing subscriber for logging.
fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let mut cli = Cli::parse_args();
    setup_tracing(cli.verbose);

    match cli.take_command() {
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
            Ok(())
        }

        // Read-only; never elevates
        Commands::Interfaces { json } => {
            let config = manifest::load_or_default(cli.config.as_deref())?;
            list_interfaces(&config, json)
        }

        Commands::Up(args) => {
            let config = manifest::load_or_default(cli.config.as_deref())?;
            privilege::ensure_root(cli.no_elevate)?;
            up(&config, &args)
        }
    }
}

fn links(config: &Config) -> IpRoute2 {
    IpRoute2::new(&config.system.ip, &config.system.sysfs)
}

fn list_interfaces(config: &Config, json: bool) -> Result<()> {
    let links = links(config);
    let info = Inventory::scan(&links)?.describe(&links)?;

    if json {
        let rendered = serde_json::to_string_pretty(&info)
            .map_err(|e| error::Error::Io(std::io::Error::other(e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("{:<4} {:<16} {:<18} MASTER", "IDX", "NAME", "MAC");
    for (i, iface) in info.iter().enumerate() {
        let kind = if iface.bridge { " (bridge)" } else { "" };
        println!(
            "{:<4} {:<16} {:<18} {}{}",
            i,
            iface.name,
            iface.mac.as_deref().unwrap_or("-"),
            iface.master.as_deref().unwrap_or("-"),
            kind
        );
    }
    Ok(())
}

fn up(config: &Config, args: &UpArgs) -> Result<()> {
    let links = links(config);
    let inventory = Inventory::scan(&links)?;
    let plan = prompt::build_plan(args, config, &inventory, &mut Prompter::terminal())?;

    let launcher = Tcpdump::new(&config.capture.program, config.capture.args.clone());
    let supervisor =
        CaptureSupervisor::new(Box::new(launcher)).stop_timeout(config.capture.stop_timeout());

    // Signal delivery and the parked wait share one thread with setup
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let mut signals = signals::install()?;
        let mut orchestrator = Orchestrator::new(links, supervisor);

        orchestrator.configure(plan)?;
        orchestrator.setup()?;

        let state = orchestrator.state();
        info!(
            bridge = state.map(|s| s.bridge()).unwrap_or_default(),
            captures = state.map(|s| s.captures().len()).unwrap_or_default(),
            "ready"
        );
        println!("Bridge is up. Press Ctrl+C to tear it down.");

        if let Some(report) = orchestrator.wait_for_termination(&mut signals).await {
            if !report.is_clean() {
                warn!("some teardown steps failed; check the host manually");
            }
        }
        Ok::<(), error::Error>(())
    })
}
