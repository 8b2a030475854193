use std::time::{Duration, Instant};

use blechat_core::AppPacket;

use crate::*;

/// Broadcast order on the radio: off, parameters, data, on.
#[test]
fn test_broadcast_sequence() {
    let mut station = Station::new(Settings::default(), 8, 1);
    station.node.submit_line("ping");

    assert!(matches!(station.fire(), Slot::Broadcast { .. }));
    assert_eq!(station.radio.calls, ["disable", "parameters", "data", "enable"]);
    assert!(station.radio.on_air.is_some());
}

/// With nothing to send the radio goes quiet and the slot is the idle time.
#[test]
fn test_idle_slot() {
    let mut station = Station::new(Settings::default(), 8, 2);
    let before = Instant::now();

    assert_eq!(station.fire(), Slot::Quiet);
    assert_eq!(station.radio.calls, ["disable"]);

    let wait = station.scheduler.deadline().saturating_duration_since(before);
    assert!(wait >= Duration::from_millis(1000));
    assert!(wait < Duration::from_secs(2));
}

/// Local packets hold the slot longer than relays.
#[test]
fn test_hold_times() {
    let mut station = Station::meshing(8, 3);
    station.node.submit_line("local");
    let relay = AppPacket::from_payload(*AppPacket::local(0, 8, "relay").payload(), -30);
    station.node.receive(relay);

    assert_eq!(
        station.fire(),
        Slot::Broadcast {
            checksum: AppPacket::local(0, 8, "local").checksum(),
            hold: Duration::from_millis(3000)
        }
    );
    assert!(matches!(
        station.fire(),
        Slot::Broadcast { hold, .. } if hold == Duration::from_millis(2000)
    ));
    assert_eq!(station.fire(), Slot::Quiet);
}

/// A queue drains one packet per slot, in order.
#[test]
fn test_long_line_spans_slots() {
    let mut station = Station::new(Settings::default(), 8, 4);
    station.node.submit_line("a message that needs two packets");

    let mut texts = Vec::new();
    while let Slot::Broadcast { .. } = station.fire() {
        let frame = station.radio.on_air.as_ref().unwrap();
        let text: Vec<u8> = frame.payload[2..].iter().copied().take_while(|&b| b != 0).collect();
        texts.push(String::from_utf8(text).unwrap());
    }
    assert_eq!(texts, ["a message that nee", "ds two packets"]);
}
