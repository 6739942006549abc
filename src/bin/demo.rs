//! Thin demonstration binary: wires `aerostate` to a line-delimited JSON
//! `PositionUpdate` source and prints whatever events fall out.
//!
//! Not part of the library's public contract (spec §6: the wire parser,
//! persistence, and UI are all external collaborators) — this is ambient
//! scaffolding showing how a consumer assembles the pieces.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aerostate::log_format::TargetFirstFormat;
use aerostate::{FlightContextFactory, FlightEvent, Options, PositionUpdate, StreamKind, TomlOptions};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "aerostate-demo",
    about = "Feed newline-delimited JSON position reports through aerostate and print emitted flight events."
)]
struct Args {
    /// TOML config file (see `TomlOptions`). Falls back to built-in defaults if absent.
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// NDJSON file of `PositionUpdate`s, one per line. Reads stdin if omitted.
    #[arg(long = "input")]
    input: Option<PathBuf>,
}

fn load_options(path: Option<&PathBuf>) -> Options {
    let Some(path) = path else {
        return Options::default();
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<TomlOptions>(&contents) {
            Ok(toml_options) => toml_options.into_options(),
            Err(err) => {
                warn!(%err, path = %path.display(), "failed to parse config, using defaults");
                Options::default()
            }
        },
        Err(err) => {
            warn!(%err, path = %path.display(), "failed to read config, using defaults");
            Options::default()
        }
    }
}

fn spawn_stream_printer(factory: &Arc<FlightContextFactory>, kind: StreamKind, label: &'static str) {
    let mut receiver = factory.subscribe(kind);
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => print_event(label, &event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(label, skipped, "stream subscriber lagged, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn print_event(label: &str, event: &FlightEvent) {
    match event {
        FlightEvent::CompletedWithErrors {
            aircraft_id,
            reasons,
            ..
        } => {
            println!("[{label}] {aircraft_id}: incomplete arrival ({reasons:?})");
        }
        other => {
            println!("[{label}] {}", other.aircraft_id());
        }
    }
}

fn read_reports(input: Option<&PathBuf>) -> Vec<PositionUpdate> {
    let mut reports = Vec::new();
    let lock;
    let reader: Box<dyn BufRead> = match input {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => Box::new(io::BufReader::new(file)),
            Err(err) => {
                error!(%err, path = %path.display(), "failed to open input");
                return reports;
            }
        },
        None => {
            lock = io::stdin();
            Box::new(lock.lock())
        }
    };

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!(%err, "failed to read line");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PositionUpdate>(&line) {
            Ok(report) => reports.push(report),
            Err(err) => warn!(%err, "skipping unparseable line"),
        }
    }
    reports
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .event_format(TargetFirstFormat)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let options = load_options(args.config.as_ref());

    let factory = FlightContextFactory::without_aerotow_detection(options);
    factory.start_expiry_tick(Duration::from_secs(10));

    spawn_stream_printer(&factory, StreamKind::Takeoff, "takeoff");
    spawn_stream_printer(&factory, StreamKind::Landing, "landing");
    spawn_stream_printer(&factory, StreamKind::RadarContact, "radar_contact");
    spawn_stream_printer(&factory, StreamKind::CompletedWithErrors, "incomplete");
    spawn_stream_printer(&factory, StreamKind::ContextDisposed, "disposed");

    let reports = read_reports(args.input.as_ref());
    info!(count = reports.len(), "loaded position reports");
    factory.enqueue(reports).await;

    // Give the printer tasks a moment to drain the channels before exiting.
    tokio::time::sleep(Duration::from_millis(100)).await;
}
