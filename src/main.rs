//! conbridge - interactive console demo
//!
//! Opens the process console, starts the reader worker, and runs a small
//! owner loop that handles typed commands one at a time on the main thread.
//!
//! # Quick Start
//!
//! ```text
//! conbridge                  # Console with settings from config.toml
//! conbridge --capture        # Save everything written to console.log on exit
//! conbridge --preface "Hi"   # Line shown before the first prompt
//! ```
//!
//! # Commands
//!
//! | Command | Action |
//! |---------|--------|
//! | help | List commands |
//! | status | Show worker state |
//! | mute / unmute | Suppress or restore console output |
//! | hide / show | Hide or re-show the console window |
//! | ps NAME | Check whether a process is running |
//! | probe HOST [PATH] | HTTPS HEAD reachability check |
//! | exit | Close the console |

use std::env;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use conbridge::collab::probe::{HttpsProbe, Method};
use conbridge::collab::process::{self, Pick, SystemProcessTable};
use conbridge::config::{config_dir, Config};
use conbridge::core::session::{ConsoleSession, SessionOptions};
use conbridge::core::surface::SurfaceProvider;
use conbridge::{LogLevel, PumpStatus};

/// Command line overrides
#[derive(Default)]
struct Args {
    capture: bool,
    preface: Option<String>,
    title: Option<String>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

const PUMP_INTERVAL: Duration = Duration::from_millis(100);

fn print_version() {
    eprintln!("conbridge {}", VERSION);
}

fn print_help() {
    eprintln!("conbridge {} - interactive console bridged to an owner thread", VERSION);
    eprintln!();
    eprintln!("Usage: conbridge [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --capture             Save console output beside the executable on exit");
    eprintln!("  --preface <TEXT>      Line shown before the first prompt");
    eprintln!("  --title <TEXT>        Console window title");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.conbridge/config.toml");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--capture" => {
                parsed.capture = true;
            }
            "--preface" | "--title" => {
                let flag = args[i].clone();
                i += 1;
                if i >= args.len() {
                    return Err(format!("Missing argument for {}", flag));
                }
                if flag == "--preface" {
                    parsed.preface = Some(args[i].clone());
                } else {
                    parsed.title = Some(args[i].clone());
                }
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to ~/.conbridge/conbridge.log so diagnostics stay off the console
fn init_logging() {
    let log_path = config_dir()
        .map(|dir| dir.join("conbridge.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("conbridge.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

#[cfg(windows)]
fn surface() -> impl SurfaceProvider {
    conbridge::core::win_console::WinConsole
}

#[cfg(not(windows))]
fn surface() -> impl SurfaceProvider {
    conbridge::core::tty::TtySurface
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("conbridge starting...");

    Config::save_default_if_missing();
    let config = Config::load();
    let mut options = SessionOptions::from_config(&config);
    options.capture |= args.capture;
    if args.preface.is_some() {
        options.preface = args.preface;
    }
    if args.title.is_some() {
        options.title = args.title;
    }

    let (mut session, mut queue) = match ConsoleSession::start_with_queue(&surface(), options) {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start console: {}", e);
            return Err(e.into());
        }
    };
    session.show_with(config.placement.mode, None, config.placement.monitor);

    run_owner_loop(&mut session, &mut queue);

    session.close();
    info!("conbridge exiting");
    Ok(())
}

/// Owner loop: every typed line is handled here, in order, on this thread
fn run_owner_loop(session: &mut ConsoleSession, queue: &mut conbridge::OwnerQueue) {
    let mut pending: Vec<String> = Vec::new();
    loop {
        let status = queue.pump_timeout(&mut |line: &str| pending.push(line.to_string()), PUMP_INTERVAL);

        for line in pending.drain(..) {
            if !handle_command(session, &line) {
                return;
            }
        }

        if status == PumpStatus::Disconnected {
            info!("Console input closed");
            return;
        }
    }
}

/// Returns false when the session should end
fn handle_command(session: &mut ConsoleSession, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or("");

    match command {
        "" => session.prompted_write("", false, true),
        "exit" | "quit" => return false,
        "help" => {
            session.write_line("help, status, mute, unmute, hide, show, ps NAME, probe HOST [PATH], exit");
            session.prompted_write("", false, true);
        }
        "status" => session.info("worker", Some(session.worker_state().as_str())),
        "mute" => session.set_blocked(true),
        "unmute" => {
            session.set_blocked(false);
            session.prompted_write("output restored", true, true);
        }
        "hide" => session.hide(),
        "show" => {
            session.show();
            session.bring_to_foreground();
        }
        "ps" => match words.next() {
            Some(name) => report_process(session, name),
            None => session.warning("usage", Some("ps NAME")),
        },
        "probe" => match words.next() {
            Some(host) => {
                let path = words.next().unwrap_or("/");
                match HttpsProbe::default().check(host, path, Method::Head) {
                    Ok(ok) => session.notice(host, Some(if ok { "reachable" } else { "unreachable" })),
                    Err(e) => session.error(&e.to_string(), None),
                }
            }
            None => session.warning("usage", Some("probe HOST [PATH]")),
        },
        _ => session.log_entry(LogLevel::Log, line),
    }
    true
}

fn report_process(session: &ConsoleSession, name: &str) {
    let table = SystemProcessTable;
    match process::creation_time(&table, name, Pick::Earliest) {
        Ok(Some(started)) => session.notice(name, Some(&format!("running since {}", started.to_rfc3339()))),
        Ok(None) => match process::is_running(&table, name) {
            Ok(true) => session.notice(name, Some("running")),
            Ok(false) => session.notice(name, Some("not running")),
            Err(e) => session.error(&e.to_string(), None),
        },
        Err(e) => session.error(&e.to_string(), None),
    }
}
