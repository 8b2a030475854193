//! Minute-of-hour freshness clock.
//!
//! Packets carry only the wall-clock minute (0-59) they were created in.
//! A packet is fresh during its own minute and the one after it.

use chrono::Timelike;

pub const MINUTES_PER_HOUR: u8 = 60;

/// Current local wall-clock minute, 0-59.
pub fn current() -> u8 {
    chrono::Local::now().minute() as u8
}

/// True when `packet_minute` is the clock minute or the one just before it.
///
/// Depends only on `(packet_minute - clock_minute) mod 60`, which must be
/// 0 or 59. A minute byte of 60 or more is never fresh.
pub fn is_fresh(packet_minute: u8, clock_minute: u8) -> bool {
    if packet_minute >= MINUTES_PER_HOUR {
        return false;
    }
    let diff = (i16::from(packet_minute) - i16::from(clock_minute)).rem_euclid(60);
    diff == 0 || diff == 59
}

/// The minute after `minute`, wrapping at the hour.
pub fn next(minute: u8) -> u8 {
    (minute % MINUTES_PER_HOUR + 1) % MINUTES_PER_HOUR
}
