//! blechat integration test harness.
//!
//! Every station is a `ChatNode` with a `Scheduler` and an in-memory radio.
//! "Air" is simulated by wrapping whatever a station has on air in the LE
//! Advertising Report a nearby scanner would receive and feeding it to the
//! listener's `receive_frame`. No adapter or root needed:
//!
//!   cargo test --test integration

use std::io;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use blechat_core::config::{Settings, TimingConfig};
use blechat_core::wire::{advertising_report, AdvertisingData, SkipReason};
use blechat_core::{ChatNode, Radio, Reception, Scheduler, Slot};

mod commands;
mod dissemination;
mod scenarios;
mod scheduling;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Radio that keeps what is currently advertised and a log of calls.
#[derive(Default)]
pub struct Air {
    staged: Option<AdvertisingData>,
    pub on_air: Option<AdvertisingData>,
    pub calls: Vec<&'static str>,
}

impl Radio for Air {
    fn set_advertise_enable(&mut self, enable: bool) -> io::Result<()> {
        if enable {
            self.calls.push("enable");
            self.on_air = self.staged.clone();
        } else {
            self.calls.push("disable");
            self.on_air = None;
        }
        Ok(())
    }

    fn set_advertising_parameters(&mut self) -> io::Result<()> {
        self.calls.push("parameters");
        Ok(())
    }

    fn set_advertising_data(&mut self, frame: &AdvertisingData) -> io::Result<()> {
        self.calls.push("data");
        self.staged = Some(frame.clone());
        Ok(())
    }
}

pub struct Station {
    pub node: ChatNode,
    pub radio: Air,
    pub scheduler: Scheduler,
    pub rng: StdRng,
    address: [u8; 6],
}

impl Station {
    pub fn new(settings: Settings, minute: u8, seed: u64) -> Self {
        let timing = TimingConfig::default();
        Self {
            node: ChatNode::new(settings, &timing, minute),
            radio: Air::default(),
            scheduler: Scheduler::new(Instant::now(), &timing),
            rng: StdRng::seed_from_u64(seed),
            address: [seed as u8, 0x11, 0x22, 0x33, 0x44, 0x55],
        }
    }

    pub fn meshing(minute: u8, seed: u64) -> Self {
        let settings = Settings {
            mesh: true,
            ..Settings::default()
        };
        Self::new(settings, minute, seed)
    }

    /// Run one broadcast slot now, regardless of the deadline.
    pub fn fire(&mut self) -> Slot {
        self.scheduler
            .fire(Instant::now(), &mut self.node, &mut self.radio, &mut self.rng)
    }

    /// The report a scanner `rssi` away would get for this station's beacon.
    pub fn heard_at(&self, rssi: i8) -> Result<Vec<u8>> {
        let frame = self.radio.on_air.as_ref().context("nothing on air")?;
        Ok(advertising_report(frame, self.address, rssi))
    }
}

/// Deliver what `speaker` is advertising to `listener`.
pub fn hear(speaker: &Station, listener: &mut Station, rssi: i8) -> Result<Result<Reception, SkipReason>> {
    let event = speaker.heard_at(rssi)?;
    Ok(listener.node.receive_frame(&event))
}
