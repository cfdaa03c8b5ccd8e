use std::path::PathBuf;
use std::process;
use std::sync::mpsc;

use clap::{Arg, ArgAction, Command};
use tracing::{error, info};

use camcast::config::RecorderConfig;
use camcast::recorder::RecorderJob;
use camcast::{logging, paths};

fn main() {
    let matches = Command::new("camcast")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a JSON configuration file.")
                .required(false),
        )
        .arg(
            Arg::new("record")
                .long("record")
                .help("Enable archive recording at startup.")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let _log_guards = logging::init_logging(&paths::log_dir());

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let config = RecorderConfig::load_or_default(config_path.as_deref());

    if let Err(e) = config.ensure_dirs() {
        error!("Failed to create recorder directories: {}", e);
        process::exit(1);
    }

    let handle = match RecorderJob::spawn(config) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start recorder thread: {}", e);
            process::exit(1);
        }
    };

    if matches.get_flag("record") {
        handle.set_is_recording(true);
    }

    // gracefully stop the recorder when receiving SIGINT or SIGTERM
    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .expect("Error setting Ctrl-C handler");

    info!("camcast running; press Ctrl-C to stop");
    let _ = stop_rx.recv();

    info!("Shutdown requested");
    handle.disconnect();
}
