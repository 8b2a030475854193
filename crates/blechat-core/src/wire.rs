//! blechat wire format: the advertisement we emit and the HCI event we parse.
//!
//! These layouts are the protocol. Other implementations parse the same bytes
//! at the same offsets, so every field and size here is fixed.
//!
//! All types are #[repr(C, packed)] and use zerocopy derives; there is no
//! unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::packet::{AppPacket, PAYLOAD_LEN};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default manufacturer code carried in the manufacturer-specific AD.
pub const DEFAULT_MANUFACTURER_CODE: u16 = 0x1122;

/// Beacon-type marker following the manufacturer code (`BE AC` on air).
pub const BEACON_MARKER: u16 = 0xACBE;

/// Declared transmit power byte, -50 dBm.
pub const TX_POWER: u8 = (-50i8) as u8;

/// HCI packet indicator for events.
pub const HCI_EVENT_PKT: u8 = 0x04;

/// HCI event code for LE meta events.
pub const EVT_LE_META_EVENT: u8 = 0x3E;

/// LE meta subevent carrying advertising reports.
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

/// Significant bytes in the advertising data block.
const ADV_SIGNIFICANT_LEN: u8 = 0x1F;

/// Flags AD: LE general discoverable, BR/EDR not supported, simultaneous LE
/// and BR/EDR capable (controller and host).
const FLAGS_AD: [u8; 3] = [0x02, 0x01, 0x1A];

/// Manufacturer-specific AD header: 27 bytes follow, type 0xFF.
const MANUFACTURER_AD_HEADER: [u8; 2] = [0x1B, 0xFF];

/// Manufacturer AD bytes that precede the payload: type, code, marker.
const MANUFACTURER_PREAMBLE_LEN: usize = 5;

// ── Outgoing advertisement ────────────────────────────────────────────────────

/// Parameter block for "LE Set Advertising Data".
///
/// Example (manufacturer 0x1122, text "4455555"):
/// `1F 02011A 1BFF 2211 BEAC 001D343435353535350000000000000000000000 CE 00`
///
/// Wire size: 32 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct AdvertisingData {
    /// Number of significant bytes that follow. Always 0x1F.
    pub significant_len: u8,
    /// Flags AD structure.
    pub flags: [u8; 3],
    /// Manufacturer-specific AD length and type.
    pub manufacturer_ad: [u8; 2],
    /// Manufacturer code, little-endian.
    pub manufacturer_code: [u8; 2],
    /// `BE AC`.
    pub beacon_marker: [u8; 2],
    /// The application packet.
    pub payload: [u8; PAYLOAD_LEN],
    /// Declared transmit power.
    pub tx_power: u8,
    /// Reserved, zero.
    pub reserved: u8,
}

assert_eq_size!(AdvertisingData, [u8; 32]);

/// Wrap a packet in the advertisement template.
pub fn encode_outgoing(packet: &AppPacket, manufacturer_code: u16) -> AdvertisingData {
    AdvertisingData {
        significant_len: ADV_SIGNIFICANT_LEN,
        flags: FLAGS_AD,
        manufacturer_ad: MANUFACTURER_AD_HEADER,
        manufacturer_code: manufacturer_code.to_le_bytes(),
        beacon_marker: BEACON_MARKER.to_le_bytes(),
        payload: *packet.payload(),
        tx_power: TX_POWER,
        reserved: 0,
    }
}

// ── Incoming event ────────────────────────────────────────────────────────────

/// Fixed prefix of an HCI LE Advertising Report event with one report.
///
/// ```text
/// 04 3E 28 02 01 02 01 3A2D0161166D 1C 1BFF0552BEAC2F23... C2
/// |  |  |  |  |  |  |  address      |  advertising data   rssi
/// |  |  |  |  |  |  address type    data length
/// |  |  |  |  |  event type
/// |  |  |  |  number of reports
/// |  |  |  subevent
/// |  |  parameter length
/// |  LE meta event
/// event packet
/// ```
///
/// Wire size: 14 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ReportHeader {
    pub packet_type: u8,
    pub event_code: u8,
    pub param_len: u8,
    pub subevent: u8,
    pub num_reports: u8,
    pub event_type: u8,
    pub address_type: u8,
    pub address: [u8; 6],
    pub data_len: u8,
}

assert_eq_size!(ReportHeader, [u8; 14]);

/// Start of the manufacturer-specific AD carrying a beacon.
///
/// Wire size: 6 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct BeaconHeader {
    pub ad_len: u8,
    pub ad_type: u8,
    pub manufacturer_code: [u8; 2],
    pub beacon_marker: [u8; 2],
}

assert_eq_size!(BeaconHeader, [u8; 6]);

const REPORT_DATA_OFFSET: usize = std::mem::size_of::<ReportHeader>();

/// Why an inbound frame was not turned into a packet.
/// None of these are faults; most frames on a busy channel are not ours.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("not an LE meta event: {0:02x} {1:02x}")]
    NotLeMeta(u8, u8),

    #[error("LE meta subevent 0x{0:02x} is not an advertising report")]
    NotAdvertisingReport(u8),

    #[error("frame truncated at {0} bytes")]
    Truncated(usize),

    #[error("not a beacon: marker 0x{0:04x}")]
    NotBeacon(u16),

    #[error("not our beacon: manufacturer 0x{0:04x}")]
    ForeignManufacturer(u16),
}

/// Parse a raw HCI event into a packet.
///
/// The beacon header sits at a fixed offset in the advertising data, either
/// first or right after a 3-byte flags AD. The checksum is recomputed from
/// the copied bytes and the RSSI is the trailing byte of the report.
pub fn decode_incoming(event: &[u8], manufacturer_code: u16) -> Result<AppPacket, SkipReason> {
    if event.len() < 2 || event[0] != HCI_EVENT_PKT || event[1] != EVT_LE_META_EVENT {
        let packet_type = event.first().copied().unwrap_or(0);
        let event_code = event.get(1).copied().unwrap_or(0);
        return Err(SkipReason::NotLeMeta(packet_type, event_code));
    }

    let report = ReportHeader::read_from_prefix(event).ok_or(SkipReason::Truncated(event.len()))?;
    if report.subevent != EVT_LE_ADVERTISING_REPORT {
        return Err(SkipReason::NotAdvertisingReport(report.subevent));
    }

    let data = &event[REPORT_DATA_OFFSET..];
    let beacon_offset = if data.starts_with(&FLAGS_AD[..2]) { FLAGS_AD.len() } else { 0 };
    let beacon = data
        .get(beacon_offset..)
        .and_then(BeaconHeader::read_from_prefix)
        .ok_or(SkipReason::Truncated(event.len()))?;

    let marker = u16::from_le_bytes(beacon.beacon_marker);
    if marker != BEACON_MARKER {
        return Err(SkipReason::NotBeacon(marker));
    }
    let code = u16::from_le_bytes(beacon.manufacturer_code);
    if code != manufacturer_code {
        return Err(SkipReason::ForeignManufacturer(code));
    }

    let body_len = usize::from(beacon.ad_len)
        .saturating_sub(MANUFACTURER_PREAMBLE_LEN)
        .min(PAYLOAD_LEN);
    let body_start = beacon_offset + std::mem::size_of::<BeaconHeader>();
    let body = data
        .get(body_start..body_start + body_len)
        .ok_or(SkipReason::Truncated(event.len()))?;

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[..body_len].copy_from_slice(body);

    let rssi = *data
        .get(usize::from(report.data_len))
        .ok_or(SkipReason::Truncated(event.len()))? as i8;

    Ok(AppPacket::from_payload(payload, rssi))
}

/// The single-report LE Advertising Report event a scanner's controller
/// delivers when it hears `frame` at `rssi`.
pub fn advertising_report(frame: &AdvertisingData, address: [u8; 6], rssi: i8) -> Vec<u8> {
    let data_len = frame.significant_len;
    let data = &frame.as_bytes()[1..1 + usize::from(data_len)];
    let header = ReportHeader {
        packet_type: HCI_EVENT_PKT,
        event_code: EVT_LE_META_EVENT,
        // Everything after param_len: subevent..data_len, data, rssi.
        param_len: (REPORT_DATA_OFFSET - 3) as u8 + data_len + 1,
        subevent: EVT_LE_ADVERTISING_REPORT,
        num_reports: 1,
        event_type: 0x03, // ADV_NONCONN_IND
        address_type: 0x00,
        address,
        data_len,
    };

    let mut event = Vec::with_capacity(REPORT_DATA_OFFSET + data.len() + 1);
    event.extend_from_slice(header.as_bytes());
    event.extend_from_slice(data);
    event.push(rssi as u8);
    event
}

// ── Tests ─────────────────────────────────────────────────────────────────────
