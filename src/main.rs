use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError, TrySendError, bounded};
use dotmatrix::{
    config::{self, Config},
    screenshot,
};
use dotmatrix_core::{
    GameBoy, SystemOptions, cpu::CpuState, debug_view::DebugBuffers, joypad::SharedJoypad,
};
use log::{debug, info, warn};

const FRAME_QUEUE: usize = 4;
const IDLE_WAIT: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(version, about = "Headless DMG emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Start at 0x0100 with post-boot register state
    #[arg(long)]
    skip_boot: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Run as fast as possible instead of at 60 frames per second
    #[arg(long)]
    no_pace: bool,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Write the background, window, sprite and tile images to this directory
    #[arg(long)]
    debug_dump: Option<PathBuf>,

    /// Config file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// What the worker thread hands back once the machine stops.
struct RunReport {
    cpu: CpuState,
    serial: Vec<u8>,
    debug_buffers: Option<DebugBuffers>,
    faulted: bool,
}

fn init_logging(debug: bool) {
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else {
        env_logger::init();
    }
}

fn system_options(args: &Args, cfg: &Config) -> Result<SystemOptions, String> {
    let skip_boot = args.skip_boot || cfg.skip_boot;
    let boot_rom = match args.bootrom.as_ref().or(cfg.bootrom_path.as_ref()) {
        Some(path) if !skip_boot => Some(
            std::fs::read(path)
                .map_err(|e| format!("Failed to load boot ROM {}: {e}", path.display()))?,
        ),
        _ => None,
    };

    Ok(SystemOptions {
        skip_boot,
        boot_rom,
        debug_buffers: args.debug_dump.is_some() || cfg.debug_buffers,
        pace: cfg.pace && !args.no_pace,
        flush_interval: cfg.flush_interval(),
    })
}

fn set_joypad(joypad: &SharedJoypad, cfg: &Config, frame: u64) {
    let state = cfg.joypad_at(frame);
    match joypad.lock() {
        Ok(mut held) => *held = state,
        Err(poisoned) => *poisoned.into_inner() = state,
    }
}

/// Pump frames until a limit is hit or the worker goes away. Returns the
/// last frame seen.
fn consume(
    frames: &Receiver<(u64, Box<[u8]>)>,
    faults: &Receiver<String>,
    joypad: &SharedJoypad,
    cfg: &Config,
    args: &Args,
) -> Option<Box<[u8]>> {
    let deadline = args
        .seconds
        .map(|s| Instant::now() + Duration::from_secs(s));
    let mut last = None;

    loop {
        let wait = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    info!("Time limit reached");
                    break;
                }
                (d - now).min(IDLE_WAIT)
            }
            None => IDLE_WAIT,
        };

        match frames.recv_timeout(wait) {
            Ok((number, pixels)) => {
                set_joypad(joypad, cfg, number);
                last = Some(pixels);
                if args.frames.is_some_and(|limit| number >= limit) {
                    info!("Frame limit reached after {number} frames");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            // The worker dropped its sender: it faulted or was cancelled.
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Ok(err) = faults.try_recv() {
        eprintln!("Emulation fault: {err}");
    }
    last
}

fn print_serial(serial: &[u8]) {
    if serial.is_empty() {
        return;
    }
    print!("[SERIAL] ");
    for b in serial {
        if b.is_ascii_graphic() || *b == b' ' || *b == b'\n' {
            print!("{}", *b as char);
        } else {
            print!("\\x{b:02X}");
        }
    }
    println!();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);
    debug!("Using config {}", config_path.display());

    let options = match system_options(&args, &cfg) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let joypad = SharedJoypad::default();
    set_joypad(&joypad, &cfg, 0);

    let mut gb = match GameBoy::from_rom_file(&args.rom, Arc::clone(&joypad), options) {
        Ok(gb) => gb,
        Err(e) => {
            eprintln!("Failed to load ROM {}: {e}", args.rom.display());
            return ExitCode::FAILURE;
        }
    };

    let (frame_tx, frame_rx) = bounded(FRAME_QUEUE);
    let (fault_tx, fault_rx) = bounded(1);
    gb.on_frame(move |frame| match frame_tx.try_send((frame.number, frame.pixels)) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(_)) => debug!("Dropped frame {}", frame.number),
    });
    gb.on_fault(move |err| {
        let _ = fault_tx.try_send(err.to_string());
    });

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let worker = thread::Builder::new()
        .name("emulator".into())
        .spawn(move || {
            gb.run(&worker_cancel);
            RunReport {
                cpu: gb.cpu_state(),
                serial: gb.serial_output().to_vec(),
                debug_buffers: gb.mmu.ppu.debug_buffers().cloned(),
                faulted: gb.faulted(),
            }
        });
    let worker = match worker {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start emulator thread: {e}");
            return ExitCode::FAILURE;
        }
    };

    let last_frame = consume(&frame_rx, &fault_rx, &joypad, &cfg, &args);
    cancel.store(true, Ordering::Relaxed);
    drop(frame_rx);

    let report = match worker.join() {
        Ok(report) => report,
        Err(_) => {
            eprintln!("Emulator thread panicked");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.screenshot {
        match &last_frame {
            Some(frame) => {
                if let Err(e) = screenshot::write_frame(path, frame) {
                    eprintln!("Failed to write screenshot {}: {e}", path.display());
                }
            }
            None => warn!("No frame was produced; skipping screenshot"),
        }
    }

    if let Some(dir) = &args.debug_dump {
        match &report.debug_buffers {
            Some(buffers) => {
                if let Err(e) = screenshot::dump_debug_buffers(dir, buffers) {
                    eprintln!("Failed to write debug images to {}: {e}", dir.display());
                }
            }
            None => warn!("No debug images were rendered"),
        }
    }

    print_serial(&report.serial);
    println!("{}", report.cpu);

    if report.faulted {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
