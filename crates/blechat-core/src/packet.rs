//! The application packet, the 20-byte unit of chat content.
//!
//! Layout: `[private code][origination minute][text, 18 bytes, NUL padded]`.
//! The checksum is kept next to the payload, never inside it, and is
//! recomputed by every constructor so it always matches the bytes.

use std::borrow::Cow;

use crate::crc::crc8;
use crate::minute;

/// Payload size in bytes. Fixed by the advertisement layout.
pub const PAYLOAD_LEN: usize = 20;

/// Offset of the text within the payload.
pub const TEXT_OFFSET: usize = 2;

/// Maximum text bytes per packet.
pub const TEXT_LEN: usize = PAYLOAD_LEN - TEXT_OFFSET;

/// Signal strength recorded on self-originated packets.
/// Reads as the closest possible station, i.e. the highest relay weight.
pub const LOCAL_RSSI: i8 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPacket {
    payload: [u8; PAYLOAD_LEN],
    checksum: u8,
    rssi: i8,
}

impl AppPacket {
    /// Build a self-originated packet. Text past 18 bytes is cut at the last
    /// char boundary that fits; a trailing line ending is dropped.
    pub fn local(private_code: u8, minute: u8, text: &str) -> Self {
        let text = truncate_on_char_boundary(text.trim_end_matches(&['\r', '\n'][..]), TEXT_LEN);
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = private_code;
        payload[1] = minute;
        payload[TEXT_OFFSET..TEXT_OFFSET + text.len()].copy_from_slice(text.as_bytes());
        Self::from_payload(payload, LOCAL_RSSI)
    }

    /// Build a packet from raw payload bytes, e.g. copied off the air.
    pub fn from_payload(payload: [u8; PAYLOAD_LEN], rssi: i8) -> Self {
        Self {
            checksum: crc8(&payload),
            payload,
            rssi,
        }
    }

    pub fn payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.payload
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    pub fn private_code(&self) -> u8 {
        self.payload[0]
    }

    pub fn minute(&self) -> u8 {
        self.payload[1]
    }

    /// Text bytes up to the first NUL.
    pub fn text(&self) -> &[u8] {
        let text = &self.payload[TEXT_OFFSET..];
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        &text[..end]
    }

    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.text())
    }

    pub fn is_fresh(&self, clock_minute: u8) -> bool {
        minute::is_fresh(self.minute(), clock_minute)
    }

    pub fn matches_private_code(&self, private_code: u8) -> bool {
        self.private_code() == private_code
    }

    /// Distance proxy shown to the operator: the negated RSSI as an
    /// unsigned byte. Larger is farther.
    pub fn distance(&self) -> u8 {
        (self.rssi as u8).wrapping_neg()
    }

    /// Relay priority: `0xFF - distance`. Stronger signal, larger weight.
    pub fn relay_weight(&self) -> u32 {
        u32::from(0xFF - self.distance())
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a char.
pub fn truncate_on_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Split `text` into consecutive pieces of at most `max` bytes each,
/// never splitting a char.
pub fn split_on_char_boundaries(text: &str, max: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let piece = truncate_on_char_boundary(rest, max);
        if piece.is_empty() {
            // A single char wider than `max`; cannot happen for max >= 4.
            break;
        }
        pieces.push(piece);
        rest = &rest[piece.len()..];
    }
    pieces
}
