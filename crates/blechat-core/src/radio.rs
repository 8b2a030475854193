//! The radio as the scheduler sees it.
//!
//! Implemented by the daemon on a raw HCI socket, and by recording mocks in
//! tests.

use std::io;

use crate::wire::AdvertisingData;

pub trait Radio {
    /// Start or stop advertising.
    fn set_advertise_enable(&mut self, enable: bool) -> io::Result<()>;

    /// Program interval, type and channel map for our beacon.
    fn set_advertising_parameters(&mut self) -> io::Result<()>;

    /// Load the advertisement payload.
    fn set_advertising_data(&mut self, frame: &AdvertisingData) -> io::Result<()>;

    /// Replace whatever is on air with `frame`.
    ///
    /// Advertising must be off while parameters change; failing to turn it
    /// off is not an error since it may already be off.
    fn broadcast(&mut self, frame: &AdvertisingData) -> io::Result<()> {
        if let Err(e) = self.set_advertise_enable(false) {
            tracing::trace!(error = %e, "advertise disable before update failed");
        }
        self.set_advertising_parameters()?;
        self.set_advertising_data(frame)?;
        self.set_advertise_enable(true)
    }
}
