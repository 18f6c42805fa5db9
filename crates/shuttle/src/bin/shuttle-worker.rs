//! Runs the job pool against the configured database until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use shuttle::{init_logging, load_config, Config, Shuttle};

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("SHUTTLE_CONFIG").map(PathBuf::from))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path() {
        Some(path) => load_config(&path)?,
        None => Config::default(),
    };
    init_logging(&config.logging)?;
    log::info!("Starting shuttle-worker v{}", env!("CARGO_PKG_VERSION"));

    let worker_count = config.worker_count;
    let shuttle = Shuttle::builder(config).build()?;
    let pool = shuttle.start_pool(worker_count)?;

    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    // Any message or a dropped sender means stop.
    let _ = rx.recv();

    pool.shutdown();
    pool.wait();
    let failed = shuttle.failed_jobs();
    if !failed.is_empty() {
        log::warn!("{} job(s) failed permanently during this run", failed.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shuttle-worker: {}", e);
            ExitCode::FAILURE
        }
    }
}
