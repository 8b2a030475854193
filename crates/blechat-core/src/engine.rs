//! Dissemination engine: picks the one packet that gets the next broadcast
//! slot.
//!
//! Self-originated packets go first, strictly FIFO. Otherwise a relay packet
//! is drawn at random, weighted by the signal strength it was heard at, and
//! removed from the pool. Expired packets found along the way are dropped.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;

use crate::packet::AppPacket;

/// A packet ready for the air, with the time it holds the broadcast slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub packet: AppPacket,
    pub hold: Duration,
}

/// A relay-eligible packet and its selection weight.
#[derive(Debug, Clone)]
pub struct RelayEntry {
    pub outgoing: Outgoing,
    pub weight: u32,
}

/// Unordered relay pool with a running weight total.
#[derive(Debug, Clone, Default)]
pub struct RelayPool {
    entries: Vec<RelayEntry>,
    total_weight: u64,
}

impl RelayPool {
    pub fn push(&mut self, outgoing: Outgoing) {
        let weight = outgoing.packet.relay_weight();
        self.total_weight += u64::from(weight);
        self.entries.push(RelayEntry { outgoing, weight });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    fn swap_remove(&mut self, index: usize) -> RelayEntry {
        let entry = self.entries.swap_remove(index);
        self.total_weight -= u64::from(entry.weight);
        entry
    }

    /// Index of a weighted-random entry. None only when the pool is empty.
    ///
    /// The draw `r` is uniform in `[1, total]` and the first entry whose
    /// running sum reaches `r` wins, so zero-weight entries are passed over.
    /// A pool of only zero weights falls back to a uniform pick.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        if self.total_weight == 0 {
            return Some(rng.gen_range(0..self.entries.len()));
        }

        let target = rng.gen_range(1..=self.total_weight);
        let mut running = 0u64;
        for (index, entry) in self.entries.iter().enumerate() {
            running += u64::from(entry.weight);
            if running >= target {
                return Some(index);
            }
        }
        // Unreachable while total_weight matches the entries.
        tracing::info!("relay pick overflow, taking last entry");
        Some(self.entries.len() - 1)
    }
}

/// The two holding pools.
#[derive(Debug, Clone, Default)]
pub struct Disseminator {
    local: VecDeque<Outgoing>,
    relay: RelayPool,
}

impl Disseminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a packet this node authored.
    pub fn push_local(&mut self, packet: AppPacket, hold: Duration) {
        self.local.push_back(Outgoing { packet, hold });
    }

    /// Queue a packet heard from a peer for relaying.
    pub fn push_relay(&mut self, packet: AppPacket, hold: Duration) {
        self.relay.push(Outgoing { packet, hold });
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    pub fn relay_pool(&self) -> &RelayPool {
        &self.relay
    }

    /// Choose the packet for the next broadcast slot at `clock_minute`.
    pub fn select_next<R: Rng + ?Sized>(&mut self, clock_minute: u8, rng: &mut R) -> Option<Outgoing> {
        while let Some(outgoing) = self.local.pop_front() {
            if outgoing.packet.is_fresh(clock_minute) {
                return Some(outgoing);
            }
            tracing::info!(
                checksum = outgoing.packet.checksum(),
                minute = outgoing.packet.minute(),
                "skipping expired local packet"
            );
        }

        while let Some(index) = self.relay.draw(rng) {
            let entry = self.relay.swap_remove(index);
            if entry.outgoing.packet.is_fresh(clock_minute) {
                return Some(entry.outgoing);
            }
            tracing::info!(
                checksum = entry.outgoing.packet.checksum(),
                minute = entry.outgoing.packet.minute(),
                "skipping expired relay packet"
            );
        }

        None
    }
}
