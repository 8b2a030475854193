//! blechatd — text chat over BLE advertisements.
//!
//! Usage: `blechatd [hciN]`

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use blechat_core::config::{BlechatConfig, DebugLevel, Settings};
use blechat_core::{minute, ChatNode, Submission};

mod event_loop;
mod hci;

/// Live control over the log filter.
///
/// `/dm` maps the debug level onto a filter directive. When `RUST_LOG` is
/// set it wins and `/dm` leaves the filter alone.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogControl {
    fn init() -> Self {
        let pinned = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
        let filter = if pinned {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(DebugLevel::Silent.filter_directive())
        };
        let (filter, handle) = reload::Layer::new(filter);
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        Self { handle, pinned }
    }

    pub fn apply(&self, level: DebugLevel) {
        if self.pinned {
            return;
        }
        if let Err(e) = self.handle.reload(EnvFilter::new(level.filter_directive())) {
            tracing::warn!(error = %e, "failed to change log filter");
        }
    }
}

/// `hci1` or `1`.
fn parse_device(arg: &str) -> Option<u16> {
    arg.strip_prefix("hci").unwrap_or(arg).parse().ok()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let log = LogControl::init();

    // Load config
    if let Err(e) = BlechatConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = BlechatConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BlechatConfig::default()
    });

    if let Some(arg) = std::env::args().nth(1) {
        config.radio.device = parse_device(&arg)
            .with_context(|| format!("expected an adapter like hci0, got '{arg}'"))?;
    }

    let settings = Settings::from(&config.chat);
    log.apply(settings.debug);
    tracing::info!(dev = config.radio.device, "blechatd starting");

    let mut node = ChatNode::new(settings, &config.timing, minute::current());
    if let Submission::Command(outcome) = node.submit_line("/status") {
        event_loop::report(&outcome, &log);
    }

    let mut radio = hci::HciDevice::open(config.radio.device)?;
    event_loop::run(&mut node, &mut radio, &config.timing, &log).await;

    tracing::info!(dev = radio.dev_id(), "blechatd stopped");
    Ok(())
}
