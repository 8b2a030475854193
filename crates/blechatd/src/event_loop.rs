//! The single task that owns the node and the radio.
//!
//! Waits on Ctrl-C, the broadcast deadline, operator input, HCI events and a
//! poll tick that keeps the minute clock current even when nothing else
//! happens. The minute is refreshed before every wake-up is handled.

use std::io::{self, BufRead};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use blechat_core::command::{CommandOutcome, HELP};
use blechat_core::config::TimingConfig;
use blechat_core::{minute, ChatNode, Reception, Scheduler, Slot, Submission};

use crate::hci::{HciDevice, HCI_MAX_EVENT_SIZE};
use crate::LogControl;

/// Run until Ctrl-C or `/quit`.
pub async fn run(node: &mut ChatNode, radio: &mut HciDevice, timing: &TimingConfig, log: &LogControl) {
    let mut rng = StdRng::from_entropy();
    let mut scheduler = Scheduler::new(Instant::now(), timing);

    let mut poll = time::interval(timing.poll().max(Duration::from_millis(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut input = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut hci_paused = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut buf = [0u8; HCI_MAX_EVENT_SIZE];

    loop {
        node.set_minute(minute::current());
        if node.quit_requested() {
            tracing::info!("quit requested");
            break;
        }

        let deadline = time::Instant::from_std(scheduler.deadline());

        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("signal received");
                break;
            }

            _ = time::sleep_until(deadline) => {
                match scheduler.fire(Instant::now(), node, radio, &mut rng) {
                    Slot::Broadcast { checksum, hold } => {
                        tracing::debug!(checksum, hold_ms = hold.as_millis() as u64, "slot on air");
                    }
                    Slot::Quiet => tracing::trace!("slot quiet"),
                }
            }

            line = input.recv(), if stdin_open => match line {
                Some(Ok(line)) => handle_line(node, &line, log),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    stdin_open = false;
                }
                None => {
                    tracing::info!("stdin closed, relaying only");
                    stdin_open = false;
                }
            },

            read = radio.read_event(&mut buf), if !hci_paused => match read {
                Ok(len) => handle_event(node, &buf[..len]),
                Err(e) if pauses_reads(&e) => {
                    tracing::debug!(error = %e, "hci read failed, pausing until next tick");
                    hci_paused = true;
                }
                Err(_) => {}
            },

            _ = poll.tick() => hci_paused = false,
        }
    }
}

/// Operator lines, read on a detached thread so a pending read never holds
/// up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || forward_lines(io::stdin().lock(), &tx));
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to start stdin reader");
    }
    rx
}

/// Send every line of `reader` until EOF, a read error, or the receiver
/// going away.
fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::UnboundedSender<io::Result<String>>) {
    for line in reader.lines() {
        let failed = line.is_err();
        if tx.send(line).is_err() || failed {
            return;
        }
    }
}

/// Errors that leave the socket readable (EOF, adapter gone) would spin
/// the loop; they pause HCI reads until the next poll tick.
fn pauses_reads(e: &io::Error) -> bool {
    !matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
}

fn handle_line(node: &mut ChatNode, line: &str, log: &LogControl) {
    match node.submit_line(line) {
        Submission::Empty => {}
        Submission::Command(outcome) => report(&outcome, log),
        Submission::Queued(checksums) => {
            tracing::debug!(packets = checksums.len(), "queued for broadcast");
        }
    }
}

fn handle_event(node: &mut ChatNode, event: &[u8]) {
    tracing::debug!(event = %hex::encode_upper(event), "hci packet in");
    match node.receive_frame(event) {
        Ok(Reception::Delivered { heard, .. }) => println!("{heard}"),
        Ok(_) => {}
        Err(reason) => tracing::trace!(%reason, "hci event skipped"),
    }
}

/// Print or apply the result of a slash command.
pub fn report(outcome: &CommandOutcome, log: &LogControl) {
    match outcome {
        CommandOutcome::Status(settings) => println!("{settings}"),
        CommandOutcome::Help => println!("{HELP}"),
        CommandOutcome::DebugLevel(level) => {
            log.apply(*level);
            tracing::info!(level = level.as_digit(), "debug mode");
        }
        CommandOutcome::PrivateCode(code) => tracing::info!(code = %format!("{code:02X}"), "private code"),
        CommandOutcome::MeshMode(on) => tracing::info!(on, "mesh mode"),
        CommandOutcome::ManufacturerCode(code) => {
            tracing::info!(code = %format!("{code:04X}"), "manufacturer code");
        }
        CommandOutcome::Quit => {}
    }
}
