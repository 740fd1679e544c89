//! NVDA-Linux main entry point
//!
//! The main loop waits on one channel fed by three sources:
//! 1. the keyboard listener thread (screen reader commands)
//! 2. the BrlAPI reader thread (braille display keys)
//! 3. a 100 ms timeout, on which the focus is polled

use log::{debug, error, info, warn};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nvda_linux::accessibility::{create_provider, AccessibilityProvider, MemoryProvider};
use nvda_linux::braille::CommandSink;
use nvda_linux::input::InputListener;
use nvda_linux::platform::{is_wsl, Platform};
use nvda_linux::spatial::Vec3;
use nvda_linux::state::config::Config;
use nvda_linux::state::{Event, Outputs, State};
use nvda_linux::{NvdaError, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

/// How long the loop waits for an event before polling the focus
const TICK: Duration = Duration::from_millis(100);

/// Global flag set by the SIGINT/SIGTERM handler
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    debug: bool,
    config: Option<PathBuf>,
    no_speech: bool,
    no_braille: bool,
    version: bool,
    help: bool,
}

fn usage() -> String {
    format!(
        "Usage: {} [OPTIONS]\n\n\
         Options:\n  \
         -d, --debug          Debug logging to nvda_linux.log\n      \
         --config PATH    Use PATH instead of {}\n      \
         --no-speech      Start without speech\n      \
         --no-braille     Start without braille\n  \
         -V, --version        Print version and exit\n  \
         -h, --help           Print this help and exit",
        nvda_linux::APP_NAME,
        Config::default_path().display()
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> std::result::Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-d" | "--debug" => parsed.debug = true,
            "--no-speech" => parsed.no_speech = true,
            "--no-braille" => parsed.no_braille = true,
            "-V" | "--version" => parsed.version = true,
            "-h" | "--help" => parsed.help = true,
            "--config" => match iter.next() {
                Some(path) => parsed.config = Some(PathBuf::from(path)),
                None => return Err("--config needs a path".to_string()),
            },
            other => match other.strip_prefix("--config=") {
                Some(path) => parsed.config = Some(PathBuf::from(path)),
                None => return Err(format!("Unknown argument: {}", other)),
            },
        }
    }
    Ok(parsed)
}

fn init_logging(debug_mode: bool, level: log::LevelFilter) {
    if debug_mode {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("nvda_linux.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open nvda_linux.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }
        info!(
            "NVDA-Linux version {} starting (debug mode, logging to nvda_linux.log)",
            nvda_linux::VERSION
        );
    } else {
        // RUST_LOG, when set, overrides the configured level
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .init();
    }
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, usage());
            process::exit(2);
        }
    };

    if args.help {
        println!("{}", usage());
        return;
    }
    if args.version {
        println!("{} {}", nvda_linux::APP_NAME, nvda_linux::VERSION);
        return;
    }

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    init_logging(args.debug || config.debug_mode(), config.log_level());

    if let Err(e) = run(config, &args) {
        error!("Fatal error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config: Config, args: &Args) -> Result<()> {
    debug!("Initializing NVDA-Linux from {:?}", config.path());
    for issue in config.validate() {
        eprintln!("Warning: {}", issue);
    }

    let platform = Platform::detect();
    info!("Platform: {}", platform.name());
    if !config.current_platform_enabled() {
        warn!("Platform {} is disabled in [platforms]", platform.name());
    }
    if is_wsl() {
        warn!("Running under WSL: keyboards and AT-SPI may be unavailable");
    }

    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe {
            signal::signal(sig, SigHandler::Handler(handle_shutdown)).map_err(|e| {
                NvdaError::Other(format!("Failed to set {:?} handler: {}", sig, e))
            })?;
        }
    }

    let (tx, rx) = mpsc::channel::<Event>();

    let braille_tx = tx.clone();
    let braille_sink: CommandSink = Box::new(move |cmd| {
        let _ = braille_tx.send(Event::Braille(cmd));
    });
    let outputs = Outputs::from_config(&config, args.no_speech, args.no_braille, Some(braille_sink));

    let provider: Box<dyn AccessibilityProvider> = match create_provider(&config) {
        Ok(provider) => provider,
        Err(e) => {
            warn!("{}; running without accessibility events", e);
            Box::new(MemoryProvider::empty())
        }
    };
    let startup_sound = config.startup_sound();
    let mut state = State::new(config, outputs, provider)?;
    info!("Keymap has {} bindings", state.keymap.len());

    let mut listener = match InputListener::discover() {
        Ok(mut listener) => {
            let key_tx = tx.clone();
            match listener.start(Box::new(move |key| {
                let _ = key_tx.send(Event::Key(key));
            })) {
                Ok(()) => Some(listener),
                Err(e) => {
                    warn!("Keyboard commands unavailable: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("Keyboard commands unavailable: {}", e);
            None
        }
    };

    if startup_sound {
        if let Some(output) = state.outputs_mut().spatial.as_mut() {
            if let Err(e) = output.play_at(Vec3::new(0.0, 1.0, 0.0)) {
                debug!("Startup sound failed: {}", e);
            }
        }
    }
    if !args.no_speech {
        state.speak("NVDA-Linux started");
    }
    println!("{} {} ready", nvda_linux::APP_NAME, nvda_linux::VERSION);

    while !SHUTDOWN.load(Ordering::Relaxed) {
        let event = match rx.recv_timeout(TICK) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => Event::Tick,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if let Err(e) = state.handle_event(event) {
            error!("Event handling failed: {}", e);
        }
        if state.should_quit() {
            break;
        }
    }

    info!("Shutting down");
    if let Some(listener) = listener.as_mut() {
        listener.stop();
    }
    state.cleanup();
    Ok(())
}
