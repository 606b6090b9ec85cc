use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use emberhost::config::Config;
use emberhost::host::Host;

/// Emberhost - reference command-line host
///
/// Drives the extension host the way an embedding application would: a
/// stdin reader feeds input lines into the dispatcher while the main loop
/// ticks the scheduler and renders new log entries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Plugin directory (overrides the configured one)
    #[arg(short, long)]
    plugins: Option<String>,

    /// Main tick interval in milliseconds
    #[arg(long, default_value_t = 33)]
    tick_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Log to stderr so diagnostics never interleave with console output.
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let mut config = if let Some(config_path) = args.config {
        Config::load_from_file(&config_path)?
    } else {
        Config::load_default()?
    };
    if let Some(plugins) = args.plugins {
        config.plugins.dir = plugins.into();
    }

    let host = Host::new(config);
    host.load_plugins();

    // One reader thread; the channel disconnects on EOF.
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    // The external heartbeat: without this loop calling tick(), main-queued
    // and delayed work would never run.
    let mut rendered_seq: u64 = 0;
    loop {
        loop {
            match rx.try_recv() {
                Ok(line) => {
                    host.dispatch(&line);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    host.request_exit();
                    break;
                }
            }
        }

        host.tick();
        rendered_seq = render_new_entries(&host, rendered_seq);

        if host.should_exit() {
            break;
        }
        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    host.shutdown();
    render_new_entries(&host, rendered_seq);
    Ok(())
}

/// Print log entries appended since the last call, returning the highest
/// sequence number seen.
fn render_new_entries(host: &Host, rendered_seq: u64) -> u64 {
    let mut latest = rendered_seq;
    for entry in host.log().snapshot() {
        if entry.seq > latest {
            println!("{}", entry.rendered());
            latest = entry.seq;
        }
    }
    latest
}
