//! Transmission scheduler with one jittered deadline driving the radio.
//!
//! Each time the deadline passes, the node picks the next packet. If there is
//! one it goes on air and holds the slot for its hold time; otherwise the
//! radio goes quiet for the idle period. Every re-arm adds a random offset so
//! nodes reset together do not keep advertising in lockstep.

use std::time::{Duration, Instant};

use rand::Rng;
use zerocopy::AsBytes;

use crate::config::TimingConfig;
use crate::node::ChatNode;
use crate::radio::Radio;
use crate::wire::encode_outgoing;

/// What the radio was told to do for this slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Broadcast { checksum: u8, hold: Duration },
    Quiet,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    deadline: Instant,
    idle: Duration,
    jitter_ms: u64,
}

impl Scheduler {
    /// A scheduler that is due immediately.
    pub fn new(now: Instant, timing: &TimingConfig) -> Self {
        Self {
            deadline: now,
            idle: timing.idle(),
            jitter_ms: timing.jitter_ms,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Run one broadcast slot and re-arm.
    ///
    /// Radio errors are logged and otherwise ignored; the next slot retries.
    pub fn fire<R, G>(&mut self, now: Instant, node: &mut ChatNode, radio: &mut R, rng: &mut G) -> Slot
    where
        R: Radio + ?Sized,
        G: Rng + ?Sized,
    {
        let slot = match node.select_next(rng) {
            Some(outgoing) => {
                let frame = encode_outgoing(&outgoing.packet, node.settings().manufacturer_code);
                tracing::debug!(frame = %hex::encode_upper(frame.as_bytes()), "beacon packet out");
                if let Err(e) = radio.broadcast(&frame) {
                    tracing::debug!(error = %e, "set beacon failed");
                }
                Slot::Broadcast {
                    checksum: outgoing.packet.checksum(),
                    hold: outgoing.hold,
                }
            }
            None => {
                if let Err(e) = radio.set_advertise_enable(false) {
                    tracing::trace!(error = %e, "advertise disable failed");
                }
                Slot::Quiet
            }
        };

        let base = match slot {
            Slot::Broadcast { hold, .. } => hold,
            Slot::Quiet => self.idle,
        };
        self.deadline = now + base + self.jitter(rng);
        slot
    }

    fn jitter<G: Rng + ?Sized>(&self, rng: &mut G) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..self.jitter_ms))
    }
}
