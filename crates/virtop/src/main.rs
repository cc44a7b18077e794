//! virtop - Interactive terminal dashboard for virtual machines.
//!
//! Usage:
//!   virtop                          # qemu:///system, 1 second refresh
//!   virtop -c qemu+ssh://host/system
//!   virtop -i 5                     # refresh every 5 seconds
//!   virtop --demo                   # built-in simulated host

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "libvirt")]
use virtop_core::hypervisor::LibvirtHypervisor;
use virtop_core::hypervisor::{Hypervisor, HypervisorError, MockHypervisor};
use virtop_core::tui::App;

/// Interactive terminal dashboard for virtual machines.
#[derive(Parser)]
#[command(name = "virtop", about = "Virtual machine monitor", version)]
struct Args {
    /// Hypervisor connection URI.
    #[arg(short = 'c', long = "connect", default_value = "qemu:///system")]
    connect: String,

    /// Refresh interval in seconds.
    #[arg(short = 'i', long = "interval", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Log file. The terminal belongs to the dashboard, so logs go here.
    #[arg(long, value_name = "PATH", default_value = "virtop.log")]
    log_file: PathBuf,

    /// Use the built-in simulated hypervisor instead of connecting.
    #[arg(long)]
    demo: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_file, args.verbose, args.quiet) {
        eprintln!(
            "Error: cannot open log file '{}': {}",
            args.log_file.display(),
            e
        );
        std::process::exit(1);
    }

    let hypervisor = if args.demo {
        demo_backend()
    } else {
        match open_backend(&args.connect) {
            Ok(h) => h,
            Err(e) => {
                error!(uri = %args.connect, error = %e, "connection failed");
                eprintln!("Error: failed to connect to '{}': {}", args.connect, e);
                std::process::exit(1);
            }
        }
    };

    let interval = Duration::from_secs(args.interval);
    info!(uri = hypervisor.uri(), ?interval, "starting virtop");

    if let Err(e) = App::new(hypervisor, interval).run() {
        error!(error = %e, "terminal error");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn demo_backend() -> Arc<dyn Hypervisor> {
    Arc::new(MockHypervisor::typical_host().simulated())
}

#[cfg(feature = "libvirt")]
fn open_backend(uri: &str) -> Result<Arc<dyn Hypervisor>, HypervisorError> {
    Ok(Arc::new(LibvirtHypervisor::connect(uri)?))
}

#[cfg(not(feature = "libvirt"))]
fn open_backend(_uri: &str) -> Result<Arc<dyn Hypervisor>, HypervisorError> {
    Err(HypervisorError::Other(
        "built without libvirt support; rebuild with --features libvirt or pass --demo".into(),
    ))
}

/// Default level: INFO, `-v` DEBUG, `-vv` TRACE, `-q` ERROR.
fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn init_logging(path: &Path, verbose: u8, quiet: bool) -> io::Result<()> {
    let file = open_log_file(path)?;
    let filter = EnvFilter::builder()
        .with_default_directive(log_level(verbose, quiet).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
