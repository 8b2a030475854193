//! The chat node: all protocol state, owned by the event loop.
//!
//! Holds the runtime settings, both holding pools, the duplicate table and
//! the current clock minute. Inbound frames, typed lines and broadcast slots
//! all go through here, so there is exactly one owner and no locking.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::command::{self, CommandOutcome, COMMAND_PREFIX};
use crate::config::{Settings, TimingConfig};
use crate::dedup::DuplicateFilter;
use crate::engine::{Disseminator, Outgoing};
use crate::packet::{split_on_char_boundaries, AppPacket, TEXT_LEN};
use crate::wire::{self, SkipReason};

/// Result of a line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Nothing to send.
    Empty,
    /// A slash command ran; nothing was queued.
    Command(CommandOutcome),
    /// Text was queued for broadcast, one checksum per packet.
    Queued(Vec<u8>),
}

/// A message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heard {
    pub distance: u8,
    pub text: String,
}

impl fmt::Display for Heard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.distance, self.text)
    }
}

/// What happened to a packet heard over the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception {
    /// Older than the previous minute.
    Expired,
    /// Seen within the suppression window.
    Duplicate,
    /// Private code differs; not shown, possibly relayed.
    Squelched { relayed: bool },
    /// Shown to the operator, possibly relayed.
    Delivered { relayed: bool, heard: Heard },
}

#[derive(Debug, Clone)]
pub struct ChatNode {
    settings: Settings,
    engine: Disseminator,
    dedup: DuplicateFilter,
    minute: u8,
    local_hold: Duration,
    relay_hold: Duration,
    quit_requested: bool,
}

impl ChatNode {
    pub fn new(settings: Settings, timing: &TimingConfig, minute: u8) -> Self {
        let mut dedup = DuplicateFilter::new();
        dedup.tick(minute);
        Self {
            settings,
            engine: Disseminator::new(),
            dedup,
            minute,
            local_hold: timing.local_hold(),
            relay_hold: timing.relay_hold(),
            quit_requested: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &Disseminator {
        &self.engine
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Adopt the wall-clock minute. Returns true on rollover.
    pub fn set_minute(&mut self, minute: u8) -> bool {
        if minute == self.minute {
            return false;
        }
        tracing::debug!(from = self.minute, to = minute, "minute rollover");
        self.minute = minute;
        self.dedup.tick(minute);
        true
    }

    /// Handle one line of operator input.
    ///
    /// Slash text is offered to the command interpreter first. Unrecognised
    /// slash text is still sent, as ordinary chat. Plain text longer than a
    /// packet is split across several packets.
    pub fn submit_line(&mut self, line: &str) -> Submission {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            return Submission::Empty;
        }

        if line.as_bytes()[0] == COMMAND_PREFIX {
            let packet = AppPacket::local(self.settings.private_code, self.minute, line);
            tracing::info!(packet = %hex::encode_upper(packet.payload()), "app packet");
            if let Some(outcome) = command::try_handle(&mut self.settings, &packet) {
                if outcome == CommandOutcome::Quit {
                    self.quit_requested = true;
                }
                return Submission::Command(outcome);
            }
            tracing::debug!(text = %packet.text_lossy(), "unrecognised command sent as text");
            let checksum = packet.checksum();
            self.engine.push_local(packet, self.local_hold);
            return Submission::Queued(vec![checksum]);
        }

        let checksums = split_on_char_boundaries(line, TEXT_LEN)
            .into_iter()
            .map(|piece| {
                let packet = AppPacket::local(self.settings.private_code, self.minute, piece);
                tracing::info!(packet = %hex::encode_upper(packet.payload()), "app packet");
                let checksum = packet.checksum();
                self.engine.push_local(packet, self.local_hold);
                checksum
            })
            .collect();
        Submission::Queued(checksums)
    }

    /// Decode a raw HCI event with the current manufacturer code and, if it
    /// is one of ours, run it through [`ChatNode::receive`].
    pub fn receive_frame(&mut self, event: &[u8]) -> Result<Reception, SkipReason> {
        let packet = wire::decode_incoming(event, self.settings.manufacturer_code)?;
        tracing::info!(
            packet = %hex::encode_upper(packet.payload()),
            checksum = packet.checksum(),
            rssi = packet.rssi(),
            "app packet in"
        );
        Ok(self.receive(packet))
    }

    /// Apply the inbound gates: freshness, duplicate check, relay (mesh mode
    /// only), then the private-code filter for display. Relay and display
    /// are independent.
    pub fn receive(&mut self, packet: AppPacket) -> Reception {
        if !packet.is_fresh(self.minute) {
            tracing::info!(minute = packet.minute(), "expired app packet");
            return Reception::Expired;
        }
        if self.dedup.test(self.minute, packet.checksum()) {
            tracing::info!(checksum = packet.checksum(), "duplicate app packet");
            return Reception::Duplicate;
        }
        self.dedup.mark(self.minute, packet.checksum());

        let relayed = self.settings.mesh;
        if relayed {
            self.engine.push_relay(packet.clone(), self.relay_hold);
        }

        if !packet.matches_private_code(self.settings.private_code) {
            tracing::info!(private_code = packet.private_code(), "squelched app packet");
            return Reception::Squelched { relayed };
        }

        Reception::Delivered {
            relayed,
            heard: Heard {
                distance: packet.distance(),
                text: packet.text_lossy().into_owned(),
            },
        }
    }

    /// Packet for the next broadcast slot, if any.
    pub fn select_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Outgoing> {
        self.engine.select_next(self.minute, rng)
    }
}
