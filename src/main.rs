use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fusecomm::modules::resolver::HelperResolver;
use fusecomm::{unmount_privileged, MountManager};
use log::{error, info, LevelFilter};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Mount helper to run instead of the one found on PATH
    #[arg(long, global = true)]
    helper: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a FUSE filesystem and hold the session until interrupted
    Mount {
        /// Mount point
        mount_point: PathBuf,
        /// Mount option, may be repeated
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },
    /// Unmount a FUSE filesystem
    Unmount {
        /// Mount point
        mount_point: PathBuf,
        /// Call umount(2) directly instead of running the helper
        #[arg(short = 'p', long = "privileged")]
        privileged: bool,
    },
    /// Print the mount helper that would be used
    Which,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger based on verbose flag
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new().filter_level(log_level).init();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.helper {
        Some(helper) => MountManager::with_helper(helper),
        None => MountManager::new(),
    };

    match cli.command {
        Commands::Mount {
            mount_point,
            options,
        } => {
            // Registered before mounting so an early signal still unmounts.
            let mut signals = Signals::new([SIGINT, SIGTERM])?;
            let options = options.join(",");
            let (session, mount_point) = manager
                .mount(&mount_point, &options)
                .with_context(|| format!("mounting {}", mount_point.display()))?;
            println!("Mounted {} (session fd {})", mount_point.display(), session.as_raw_fd());

            if let Some(sig) = signals.forever().next() {
                info!("Received signal {}, unmounting...", sig);
            }

            drop(session);
            manager
                .unmount(&mount_point)
                .with_context(|| format!("unmounting {}", mount_point.display()))?;
            println!("Unmounted {}", mount_point.display());
        }
        Commands::Unmount {
            mount_point,
            privileged,
        } => {
            if privileged {
                unmount_privileged(&mount_point)?;
            } else {
                manager.unmount(&mount_point)?;
            }
            println!("Unmounted {}", mount_point.display());
        }
        Commands::Which => match &cli.helper {
            Some(helper) => println!("{}", helper.display()),
            None => println!("{}", HelperResolver::global().path().display()),
        },
    }

    Ok(())
}
