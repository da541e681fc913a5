use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use ps_app::{AppError, AppResult, CycleDriver, MainSettings};
use ps_config::{AddressMap, load_signal_map};
use ps_core::{Clock, SystemClock};
use ps_process::ControlMode;
use ps_protocol::ProtocolKind;
use ps_protocol::discovery::{self, DEFAULT_MAX_WORKERS};
use ps_sim::{FieldMap, read_state, validate_state_file};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ps-cli")]
#[command(about = "Process simulator CLI - tank process synchronized with controller I/O", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cycle loop for a while
    Run {
        /// Main settings file (YAML or JSON)
        #[arg(short, long)]
        settings: Option<PathBuf>,
        /// Seconds to run
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Override the protocol from the settings file
        #[arg(long, value_parser = parse_protocol)]
        protocol: Option<ProtocolKind>,
        /// Override the control mode (plc or gui)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ControlMode>,
        /// Signal map to apply
        #[arg(long)]
        io: Option<PathBuf>,
        /// Print a status line every N cycles
        #[arg(long, default_value_t = 10)]
        report_every: u64,
        /// Print cycle timing when done
        #[arg(long)]
        timing: bool,
    },
    /// Check a signal map file: enabled signals, byte range, conflicts
    CheckIo {
        /// Signal map file (JSON or YAML)
        path: PathBuf,
    },
    /// Inspect saved session files
    #[command(subcommand)]
    State(StateCommands),
    /// Find the first listening port on a host
    Probe {
        /// Host address
        host: IpAddr,
        /// Candidate ports, in order of preference
        #[arg(long, value_delimiter = ',', default_value = "102,502")]
        ports: Vec<u16>,
        /// Per-port connect timeout in milliseconds
        #[arg(long, default_value_t = 200)]
        timeout_ms: u64,
        /// Concurrent probes
        #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
        workers: usize,
        /// Keep polling for up to this many milliseconds (e.g. while a driver starts)
        #[arg(long)]
        wait_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// Check that a state file can be loaded
    Validate {
        /// Path to the state file
        path: PathBuf,
    },
    /// Print the contents of a state file
    Show {
        /// Path to the state file
        path: PathBuf,
    },
}

fn parse_protocol(s: &str) -> Result<ProtocolKind, String> {
    ProtocolKind::parse(s).ok_or_else(|| {
        let names: Vec<_> = ProtocolKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown protocol '{s}', expected one of {}", names.join(", "))
    })
}

fn parse_mode(s: &str) -> Result<ControlMode, String> {
    ControlMode::parse(s).ok_or_else(|| format!("unknown control mode '{s}', expected plc or gui"))
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            settings,
            duration,
            protocol,
            mode,
            io,
            report_every,
            timing,
        } => cmd_run(
            settings.as_deref(),
            duration,
            protocol,
            mode,
            io,
            report_every,
            timing,
        ),
        Commands::CheckIo { path } => cmd_check_io(&path),
        Commands::State(state_cmd) => match state_cmd {
            StateCommands::Validate { path } => cmd_state_validate(&path),
            StateCommands::Show { path } => cmd_state_show(&path),
        },
        Commands::Probe {
            host,
            ports,
            timeout_ms,
            workers,
            wait_ms,
        } => cmd_probe(host, &ports, timeout_ms, workers, wait_ms),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    settings_path: Option<&Path>,
    duration: f64,
    protocol: Option<ProtocolKind>,
    mode: Option<ControlMode>,
    io: Option<PathBuf>,
    report_every: u64,
    timing: bool,
) -> AppResult<()> {
    let mut settings = match settings_path {
        Some(path) => MainSettings::load(path)?,
        None => MainSettings::default(),
    };
    if let Some(protocol) = protocol {
        settings.connection.protocol = protocol;
    }
    if let Some(mode) = mode {
        settings.control_mode = mode;
    }
    if io.is_some() {
        settings.io_config_path = io;
    }
    if timing {
        ps_core::timing::enable_timing();
    }

    let clock = SystemClock;
    let mut driver = CycleDriver::from_settings(settings)?;
    println!(
        "Running {} in {} mode over {} for {:.1}s",
        driver.settings().simulation,
        driver.control_mode(),
        driver.settings().connection.protocol,
        duration
    );
    if let Err(e) = driver.connect(clock.now()) {
        warn!(error = %e, "running without controller");
    }
    driver.sims_mut().start()?;

    let started = clock.now();
    let end = started + Duration::from_secs_f64(duration.max(0.0));
    let mut cycles = 0u64;
    loop {
        let now = clock.now();
        if now >= end {
            break;
        }
        if !driver.is_due(now) {
            thread::sleep(Duration::from_millis(2));
            continue;
        }
        let report = driver.run_cycle(now);
        cycles += 1;
        if report.link_lost {
            println!("Controller link lost");
        }
        if report_every > 0 && cycles % report_every == 0 {
            print_status_line(&driver, now - started);
        }
    }

    driver.sims_mut().stop()?;
    driver.disconnect();
    println!("✓ {cycles} cycles completed");
    if let Some(summary) = driver.timings().summary() {
        println!("Timing: {summary}");
    }
    Ok(())
}

fn print_status_line(driver: &CycleDriver, elapsed: Duration) {
    let Some(sim) = driver.sims().active() else {
        return;
    };
    let status = sim.status();
    println!(
        "  t={:6.1}s  volume={:7.2} l  temp={:6.2} °C  in={:.2} out={:.2} heat={:.2}  {}",
        elapsed.as_secs_f64(),
        status.volume,
        status.temperature,
        status.valve_in_fraction,
        status.valve_out_fraction,
        status.heater_fraction,
        if driver.is_connected() { "connected" } else { "offline" }
    );
}

fn cmd_check_io(path: &Path) -> AppResult<()> {
    println!("Checking signal map: {}", path.display());
    let file = load_signal_map(path)?;
    let (map, report) = AddressMap::with_defaults().reloaded(&file);

    println!(
        "{} applied, {} unknown, {} skipped",
        report.applied,
        report.unknown.len(),
        report.skipped.len()
    );
    for name in &report.unknown {
        println!("  unknown: {name}");
    }
    for skipped in &report.skipped {
        println!("  skipped: {} ({})", skipped.name, skipped.reason);
    }

    println!("Enabled signals:");
    for signal in map.enabled_signals() {
        println!(
            "  {:<36} {:<6} {:?}",
            map.signal_name(signal),
            map.address(signal).to_string(),
            signal.direction()
        );
    }
    let (lo, hi) = map.byte_range();
    println!("Byte range: {lo}..={hi}");

    if map.conflicts().is_empty() {
        println!("✓ No address conflicts");
    } else {
        println!("Address conflicts:");
        for c in map.conflicts() {
            println!(
                "  {} and {} share {} ({:?})",
                map.signal_name(c.first),
                map.signal_name(c.second),
                c.at,
                c.direction
            );
        }
    }
    Ok(())
}

fn cmd_state_validate(path: &Path) -> AppResult<()> {
    let summary = validate_state_file(path)?;
    println!("{summary}");
    Ok(())
}

fn cmd_state_show(path: &Path) -> AppResult<()> {
    let doc = read_state(path)?;
    println!("{}", doc.summary());
    print_fields("Main config", &doc.main_config);
    print_fields("Simulation config", &doc.simulation_config);
    print_fields("Simulation status", &doc.simulation_status);
    if let Some(io) = &doc.io_config {
        println!("Signal map: {} entries", io.signals.len());
    }
    if let Some(original) = &doc.io_config_original_path {
        println!("Signal map source: {original}");
    }
    Ok(())
}

fn print_fields(title: &str, fields: &FieldMap) {
    if fields.is_empty() {
        return;
    }
    println!("{title}:");
    for (key, value) in fields {
        println!("  {key} = {value}");
    }
}

fn cmd_probe(
    host: IpAddr,
    ports: &[u16],
    timeout_ms: u64,
    workers: usize,
    wait_ms: Option<u64>,
) -> AppResult<()> {
    if ports.is_empty() {
        return Err(AppError::Settings("no candidate ports given".to_string()));
    }
    let timeout = Duration::from_millis(timeout_ms);
    let found = match wait_ms {
        Some(wait) => {
            println!("Waiting up to {wait} ms for {host} on ports {ports:?}");
            discovery::wait_for_port(
                host,
                ports,
                timeout,
                Duration::from_millis(wait),
                Duration::from_millis(250),
            )
        }
        None => {
            println!("Probing {host} on ports {ports:?}");
            discovery::probe_ports(host, ports, timeout, workers)
        }
    };
    match found {
        Some(port) => println!("✓ Listening on port {port}"),
        None => println!("No candidate port is listening"),
    }
    Ok(())
}
