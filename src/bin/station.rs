//! Console command station.
//!
//! Runs a heap-backed station with ramps on the tokio scheduler and reads
//! cab commands from stdin, one per line:
//!
//! ```text
//! throttle <addr> <0-28>     set target speed
//! direction <addr> <fwd|rev> change direction (only at rest)
//! status [addr]              show one or all moving channels
//! estop                      emergency stop every train
//! resume                     clear the broadcast stop
//! quit                       bring trains to rest and exit
//! ```
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin station
//!
//! # With a JSON config (needs the serde-json feature)
//! cargo run --bin station --features serde-json -- station.json
//! ```

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context};
use dcc_station::hal::HeapMemory;
use dcc_station::services::TokioScheduler;
use dcc_station::{ChannelRegistry, ChannelStatus, Config, Direction, DirectionChange};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// One parsed console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Throttle { address: u8, throttle: u8 },
    Direction { address: u8, direction: Direction },
    Status(Option<u8>),
    EmergencyStop,
    Resume,
    Quit,
}

fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "throttle" | "t" => Command::Throttle {
            address: parse_number(words.next(), "address")?,
            throttle: parse_number(words.next(), "throttle")?,
        },
        "direction" | "d" => {
            let address = parse_number(words.next(), "address")?;
            let text = words.next().context("missing direction")?;
            let direction =
                Direction::from_text(text).ok_or_else(|| anyhow!("unknown direction '{text}'"))?;
            Command::Direction { address, direction }
        }
        "status" | "s" => Command::Status(match words.next() {
            Some(word) => Some(parse_number(Some(word), "address")?),
            None => None,
        }),
        "estop" => Command::EmergencyStop,
        "resume" => Command::Resume,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command '{other}'"),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected argument '{extra}'");
    }
    Ok(Some(command))
}

fn parse_number(word: Option<&str>, what: &str) -> anyhow::Result<u8> {
    let word = word.with_context(|| format!("missing {what}"))?;
    word.parse()
        .with_context(|| format!("{what} must be a number, got '{word}'"))
}

fn print_status(status: &ChannelStatus) {
    println!(
        "  {:>3}  {:<7}  speed {:>2} -> {:>2}{}",
        status.address,
        status.direction.as_str(),
        status.speed,
        status.throttle,
        if status.ramping { "  (ramping)" } else { "" }
    );
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::args().nth(1) {
        None => Ok(Config::default()),
        #[cfg(feature = "serde-json")]
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            Config::from_json(&text).with_context(|| format!("parsing config {path}"))
        }
        #[cfg(not(feature = "serde-json"))]
        Some(_) => bail!("config files need the serde-json feature"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    config
        .layout
        .validate()
        .context("invalid layout in config")?;

    let scheduler = TokioScheduler::new(&config.scheduler).context("starting scheduler")?;
    let memory = HeapMemory::new(config.layout.memory_bytes());
    let registry = ChannelRegistry::with_memory(memory, scheduler, &config)?;
    registry.start()?;

    println!(
        "{} ready: addresses 1..={}, type 'quit' to exit",
        config.station.name,
        registry.max_addr()
    );

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {e:#}");
                continue;
            }
        };

        let outcome = match command {
            Command::Throttle { address, throttle } => registry.set_throttle(address, throttle),
            Command::Direction { address, direction } => registry
                .set_direction(address, direction)
                .map(|change| {
                    if change == DirectionChange::Ignored {
                        println!("  {address} is moving; slow to 0 before reversing");
                    }
                }),
            Command::Status(Some(address)) => {
                registry.status(address).map(|status| print_status(&status))
            }
            Command::Status(None) => registry.statuses().map(|statuses| {
                statuses
                    .iter()
                    .filter(|s| s.speed != 0 || s.throttle != 0)
                    .for_each(print_status);
            }),
            Command::EmergencyStop => registry.emergency_stop(true),
            Command::Resume => registry.clear_stop(),
            Command::Quit => break,
        };
        if let Err(e) = outcome {
            println!("error: {e}");
        }
        io::stdout().flush()?;
    }

    info!("shutting down");
    registry.stop()?;
    Ok(())
}
