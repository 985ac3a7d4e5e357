use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::Parser;

use veikk_pad::capture;
use veikk_pad::config::{Cli, Command, Configuration};
use veikk_pad::device::{self, InterfaceId};
use veikk_pad::handshake::{CommandScheduler, HandshakeCommand};
use veikk_pad::output::{InputBackend, LogBackend};
use veikk_pad::uinput::UinputBackend;
use veikk_pad::Driver;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends each handshake command from a background thread once its delay has
/// passed. Captures carry no device handle, so sending means logging.
#[derive(Default)]
struct ThreadScheduler {
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadScheduler {
    /// Block until every scheduled command has been sent.
    fn wait(&self) {
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            if worker.join().is_err() {
                log::warn!("Handshake thread panicked");
            }
        }
    }
}

impl CommandScheduler for ThreadScheduler {
    fn schedule(&self, interface: InterfaceId, commands: Vec<HandshakeCommand>) {
        let worker = thread::spawn(move || {
            let mut elapsed = Duration::ZERO;
            for command in commands {
                thread::sleep(command.delay.saturating_sub(elapsed));
                elapsed = command.delay;
                log::info!(
                    "[{}] handshake {} after {}ms: {:02x?}",
                    interface,
                    command.channel,
                    command.delay.as_millis(),
                    command.bytes
                );
            }
        });
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(worker);
    }
}

fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Models => {
            list_models();
            Ok(())
        }
        Command::Replay { ref file, dry_run } => run_replay(&cli, file, dry_run),
    }
}

fn list_models() {
    println!("{:<16} {:>9}  {:>13}  {:>8}  {:<8}  extras", "model", "id", "digitizer", "pressure", "protocol");
    for model in device::models() {
        let mut extras = Vec::new();
        if model.flags.has_buttons {
            extras.push(format!("{} buttons", model.button_count));
        }
        if model.flags.has_wheel {
            extras.push("wheel".to_string());
        }
        if model.flags.has_gesture_pad {
            extras.push("gesture pad".to_string());
        }
        println!(
            "{:<16} {:04x}:{:04x}  {:>13}  {:>8}  {:<8}  {}",
            model.name,
            model.vendor_id,
            model.product_id,
            format!("{}x{}", model.x_max, model.y_max),
            model.pressure_max,
            format!("{:?}", model.protocol),
            extras.join(", ")
        );
    }
}

fn run_replay(cli: &Cli, file: &Path, dry_run: bool) -> Result<(), BoxError> {
    let config = Configuration::load(cli)?;

    log::info!(
        "veikk-pad replaying {} (orientation={}, screen_map={:?}, screen_size={:?}, output={})",
        file.display(),
        config.orientation,
        config.screen_region,
        config.screen_size,
        if dry_run { "stdout" } else { "uinput" }
    );

    let reader: Box<dyn BufRead> = if file == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(file)?))
    };
    let entries = capture::parse(reader)?;
    log::debug!("Parsed {} capture entries", entries.len());

    let backend: Arc<dyn InputBackend> = if dry_run {
        Arc::new(LogBackend)
    } else {
        Arc::new(UinputBackend)
    };
    let scheduler = Arc::new(ThreadScheduler::default());
    let driver = Driver::new(config, backend, scheduler.clone());

    let stats = capture::replay(&driver, &entries);
    scheduler.wait();
    let stats = stats?;
    log::info!(
        "Replay done: {} interfaces attached ({} ignored), {} reports ({} dropped), {} settings, {} detached",
        stats.attached,
        stats.ignored_interfaces,
        stats.reports,
        stats.dropped,
        stats.settings,
        stats.detached
    );

    if driver.session_count() > 0 {
        log::warn!("{} device(s) still attached at end of capture", driver.session_count());
    }

    Ok(())
}
